use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{Role, User};

/// Public part of the user: what the cache holds and read endpoints return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublicView {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl From<&User> for UserPublicView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            created_at: u.created_at,
            email: u.email.clone(),
            name: u.name.clone(),
            role: u.role,
        }
    }
}

impl From<User> for UserPublicView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            created_at: u.created_at,
            email: u.email,
            name: u.name,
            role: u.role,
        }
    }
}

/// Request body for create and update. Every field defaults so that missing
/// fields come back as validation errors instead of a decode failure.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// Checked create input.
#[derive(Debug, Clone)]
pub struct NewUserInput {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

/// Checked update input; `password: None` leaves the stored hash alone.
#[derive(Debug, Clone)]
pub struct UserUpdateInput {
    pub email: String,
    pub password: Option<String>,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Exact-match lookup; pagination is ignored when present.
    pub email: Option<String>,
}

impl ListQuery {
    pub const DEFAULT_LIMIT: i64 = 10;

    /// Returns `(page, limit)` with out-of-range values replaced by defaults.
    pub fn clamped(&self) -> (i64, i64) {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = self.limit.filter(|l| *l >= 1).unwrap_or(Self::DEFAULT_LIMIT);
        (page, limit)
    }

    /// Row offset for a clamped `(page, limit)`; `None` when it does not fit
    /// in an `i64`, which can only mean the page lies past every row.
    pub fn offset(page: i64, limit: i64) -> Option<i64> {
        (page - 1).checked_mul(limit)
    }
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserPublicView>,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
