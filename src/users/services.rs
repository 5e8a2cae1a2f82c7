use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::{
    cache::UserCache,
    dto::{NewUserInput, UserPublicView, UserUpdateInput},
    error::ServiceError,
    repo::{StoreError, UserStore},
    repo_types::{NewUser, UserChanges},
};
use crate::auth::{
    jwt::JwtKeys,
    password::{hash_password, verify_password},
};

/// Orchestrates the store, the cache, the hasher and the token issuer.
pub struct UserService {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn UserCache>,
    keys: JwtKeys,
    cache_ttl: Duration,
    deadline: Duration,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        cache: Arc<dyn UserCache>,
        keys: JwtKeys,
        cache_ttl: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            keys,
            cache_ttl,
            deadline,
        }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<Result<T, StoreError>, ServiceError> {
        timeout(self.deadline, fut)
            .await
            .map_err(|_| ServiceError::DeadlineExceeded(op))
    }

    async fn cached(&self, id: i64) -> Option<UserPublicView> {
        match timeout(self.deadline, self.cache.get(id)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => {
                warn!(error = %e, user_id = id, "cache get failed");
                None
            }
            Err(_) => {
                warn!(user_id = id, "cache get timed out");
                None
            }
        }
    }

    async fn remember(&self, view: &UserPublicView) {
        match timeout(self.deadline, self.cache.set(view, self.cache_ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, user_id = view.id, "cache set failed"),
            Err(_) => warn!(user_id = view.id, "cache set timed out"),
        }
    }

    async fn forget(&self, id: i64) {
        match timeout(self.deadline, self.cache.invalidate(id)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, user_id = id, "cache invalidate failed"),
            Err(_) => warn!(user_id = id, "cache invalidate timed out"),
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(&self, input: NewUserInput) -> Result<UserPublicView, ServiceError> {
        // Advisory only: the unique index decides races.
        match self.bounded("get_by_email", self.store.get_by_email(&input.email)).await? {
            Ok(_) => return Err(ServiceError::EmailExists),
            Err(StoreError::NotFound) => {}
            Err(e) => warn!(error = %e, "email pre-check failed; relying on constraint"),
        }

        let password_hash = hash_password(&input.password)?;
        let new_user = NewUser {
            email: input.email,
            password_hash,
            name: input.name,
            role: input.role,
        };
        let user = match self.bounded("create", self.store.create(new_user)).await? {
            Ok(u) => u,
            Err(StoreError::DuplicateEmail) => return Err(ServiceError::EmailExists),
            Err(e) => return Err(anyhow::Error::new(e).context("create user").into()),
        };
        debug!(user_id = user.id, "user created");
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: i64) -> Result<UserPublicView, ServiceError> {
        if let Some(view) = self.cached(id).await {
            debug!(user_id = id, "cache hit");
            return Ok(view);
        }

        let user = match self.bounded("get_by_id", self.store.get_by_id(id)).await? {
            Ok(u) => u,
            Err(StoreError::NotFound) => return Err(ServiceError::UserNotFound),
            Err(e) => return Err(anyhow::Error::new(e).context("load user").into()),
        };
        let view = UserPublicView::from(user);
        self.remember(&view).await;
        Ok(view)
    }

    #[instrument(skip(self))]
    pub async fn get_by_email(&self, email: &str) -> Result<UserPublicView, ServiceError> {
        match self.bounded("get_by_email", self.store.get_by_email(email)).await? {
            Ok(u) => Ok(u.into()),
            Err(StoreError::NotFound) => Err(ServiceError::UserNotFound),
            Err(e) => Err(anyhow::Error::new(e).context("load user by email").into()),
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn update(&self, id: i64, input: UserUpdateInput) -> Result<(), ServiceError> {
        let password_hash = match input.password.as_deref() {
            Some(p) if !p.is_empty() => Some(hash_password(p)?),
            _ => None,
        };
        let changes = UserChanges {
            id,
            email: input.email,
            name: input.name,
            role: input.role,
            password_hash,
        };
        match self.bounded("update", self.store.update(changes)).await? {
            Ok(_) => {}
            Err(StoreError::NotFound) => return Err(ServiceError::UserNotFound),
            Err(StoreError::DuplicateEmail) => return Err(ServiceError::EmailExists),
            Err(e) => return Err(anyhow::Error::new(e).context("update user").into()),
        }
        self.forget(id).await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        match self.bounded("delete", self.store.delete(id)).await? {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(ServiceError::UserNotFound),
            Err(e) => return Err(anyhow::Error::new(e).context("delete user").into()),
        }
        self.forget(id).await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<UserPublicView>, ServiceError> {
        let users = self
            .bounded("list", self.store.list(offset, limit))
            .await?
            .map_err(|e| anyhow::Error::new(e).context("list users"))?;
        Ok(users.into_iter().map(UserPublicView::from).collect())
    }

    /// Unknown email and wrong password are deliberately indistinguishable.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ServiceError> {
        let user = match self.bounded("get_by_email", self.store.get_by_email(email)).await? {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                warn!("login unknown email");
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => {
                warn!(error = %e, "login lookup failed");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash) {
            warn!(user_id = user.id, "login invalid password");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = self.keys.sign(user.id, user.role)?;
        debug!(user_id = user.id, "user logged in");
        Ok(token)
    }
}
