use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::{
    auth::jwt::JwtKeys,
    config::AppConfig,
    db,
    users::{cache::RedisUserCache, repo::PgUserStore, services::UserService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub users: Arc<UserService>,
}

impl AppState {
    /// Connects Postgres and Redis and wires the user service. Also returns the
    /// pool so the caller can run migrations against it.
    pub async fn init(config: AppConfig) -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(config);

        let pool = db::connect(&config).await?;
        let cache = RedisUserCache::connect(&config.redis_url)
            .await
            .context("init redis cache")?;

        let keys = JwtKeys::from_config(&config.jwt);
        let users = UserService::new(
            Arc::new(PgUserStore::new(pool.clone())),
            Arc::new(cache),
            keys.clone(),
            config.cache_ttl(),
            config.operation_timeout(),
        );

        Ok((Self::from_parts(config, keys, Arc::new(users)), pool))
    }

    pub fn from_parts(config: Arc<AppConfig>, keys: JwtKeys, users: Arc<UserService>) -> Self {
        Self {
            config,
            keys,
            users,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::users::{cache::memory::MemoryUserCache, repo::memory::MemoryUserStore};

        let config = Arc::new(AppConfig::for_tests());
        let keys = JwtKeys::from_config(&config.jwt);
        let users = UserService::new(
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryUserCache::new()),
            keys.clone(),
            config.cache_ttl(),
            config.operation_timeout(),
        );
        Self::from_parts(config, keys, Arc::new(users))
    }
}
