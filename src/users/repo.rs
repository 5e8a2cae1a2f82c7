use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{NewUser, User, UserChanges, UserRow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,
    #[error("email already in use")]
    DuplicateEmail,
    #[error("corrupt user row: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Durable user records. Every method ignores soft-deleted rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn get_by_id(&self, id: i64) -> Result<User, StoreError>;
    async fn get_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn update(&self, changes: UserChanges) -> Result<User, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateEmail
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => StoreError::Database(other),
    }
}

fn into_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(StoreError::Corrupt)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, name, role, created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)?;
        into_user(row)
    }

    async fn get_by_id(&self, id: i64) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, role, created_at, updated_at
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        into_user(row)
    }

    async fn get_by_email(&self, email: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, role, created_at, updated_at
            FROM users
            WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)?;
        into_user(row)
    }

    async fn update(&self, changes: UserChanges) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET email = $2,
                   name = $3,
                   role = $4,
                   password_hash = COALESCE($5, password_hash),
                   updated_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, email, password_hash, name, role, created_at, updated_at
            "#,
        )
        .bind(changes.id)
        .bind(&changes.email)
        .bind(&changes.name)
        .bind(changes.role.as_str())
        .bind(changes.password_hash.as_deref())
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_err)?
        .ok_or(StoreError::NotFound)?;
        into_user(row)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET deleted_at = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, name, role, created_at, updated_at
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(into_user).collect()
    }
}
