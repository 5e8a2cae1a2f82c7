use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::{
    claims::Claims,
    jwt::{JwtKeys, TokenError},
};
use crate::users::{error::error_response, repo_types::Role};

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingHeader,
    BadScheme,
    Token(TokenError),
    Forbidden,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingHeader => {
                error_response(StatusCode::UNAUTHORIZED, "missing authorization header")
            }
            AuthError::BadScheme => {
                error_response(StatusCode::UNAUTHORIZED, "invalid authorization header format")
            }
            AuthError::Token(TokenError::Expired) => {
                error_response(StatusCode::UNAUTHORIZED, "token expired")
            }
            AuthError::Token(TokenError::Invalid) => {
                error_response(StatusCode::UNAUTHORIZED, "invalid token")
            }
            AuthError::Forbidden => error_response(StatusCode::FORBIDDEN, "admin access required"),
        }
    }
}

/// Extracts and validates the bearer JWT, yielding its claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::BadScheme)?;

        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            AuthError::Token(e)
        })?;

        Ok(AuthUser(claims))
    }
}

/// Like [`AuthUser`], but the token's role must be `admin`.
pub struct AdminUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Admin {
            warn!(user_id = claims.sub, "admin route refused");
            return Err(AuthError::Forbidden);
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Request;

    use super::*;

    #[derive(Clone)]
    struct TestState {
        keys: JwtKeys,
    }

    impl FromRef<TestState> for JwtKeys {
        fn from_ref(s: &TestState) -> Self {
            s.keys.clone()
        }
    }

    fn state() -> TestState {
        TestState {
            keys: JwtKeys::new("extractor-secret", Duration::from_secs(600)),
        }
    }

    fn parts(auth: Option<&str>) -> Parts {
        let mut req = Request::builder().uri("/api/v1/users");
        if let Some(v) = auth {
            req = req.header("Authorization", v);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn accepts_valid_bearer() {
        let st = state();
        let token = st.keys.sign(9, Role::User).unwrap();
        let mut p = parts(Some(&format!("Bearer {token}")));
        let AuthUser(claims) = AuthUser::from_request_parts(&mut p, &st).await.unwrap();
        assert_eq!(claims.sub, 9);
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_header() {
        let st = state();
        let err = AuthUser::from_request_parts(&mut parts(None), &st).await.err().unwrap();
        assert_eq!(err, AuthError::MissingHeader);

        let err = AuthUser::from_request_parts(&mut parts(Some("Token abc")), &st)
            .await
            .err()
            .unwrap();
        assert_eq!(err, AuthError::BadScheme);

        let err = AuthUser::from_request_parts(&mut parts(Some("Bearer abc")), &st)
            .await
            .err()
            .unwrap();
        assert_eq!(err, AuthError::Token(TokenError::Invalid));
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_requires_admin_role() {
        let st = state();
        let user_token = st.keys.sign(1, Role::User).unwrap();
        let err = AdminUser::from_request_parts(&mut parts(Some(&format!("Bearer {user_token}"))), &st)
            .await
            .err()
            .unwrap();
        assert_eq!(err, AuthError::Forbidden);
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let admin_token = st.keys.sign(2, Role::Admin).unwrap();
        let AdminUser(claims) =
            AdminUser::from_request_parts(&mut parts(Some(&format!("Bearer {admin_token}"))), &st)
                .await
                .unwrap();
        assert_eq!(claims.role, Role::Admin);
    }
}
