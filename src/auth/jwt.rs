use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::{config::JwtConfig, state::AppState, users::repo_types::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

/// Signing and verification keys plus the token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        let ttl_secs = u64::try_from(cfg.ttl_minutes)
            .unwrap_or(0)
            .saturating_mul(60);
        Self::new(&cfg.secret, Duration::from_secs(ttl_secs))
    }

    fn sign_at(&self, user_id: i64, role: Role, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|secs| now.checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| anyhow::anyhow!("token ttl {:?} out of range", self.ttl))?;
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, %role, "jwt signed");
        Ok(token)
    }

    pub fn sign(&self, user_id: i64, role: Role) -> anyhow::Result<String> {
        self.sign_at(user_id, role, OffsetDateTime::now_utc())
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(user_id = data.claims.sub, role = %data.claims.role, "jwt verified");
        Ok(data.claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(secret, Duration::from_secs(60 * 60))
    }

    #[test]
    fn sign_and_verify_roundtrip() {
        let keys = make_keys("dev-secret");
        let token = keys.sign(42, Role::Admin).expect("sign");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn ttl_comes_from_config() {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "s".into(),
            ttl_minutes: 24 * 60,
        });
        assert_eq!(keys.ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn oversized_ttl_fails_to_sign() {
        let keys = JwtKeys::new("dev-secret", Duration::from_secs(u64::MAX));
        assert!(keys.sign(1, Role::User).is_err());

        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "s".into(),
            ttl_minutes: i64::MAX,
        });
        assert!(keys.sign(1, Role::User).is_err());
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = make_keys("dev-secret");
        let issued = OffsetDateTime::now_utc() - TimeDuration::hours(3);
        let token = keys.sign_at(1, Role::User, issued).expect("sign");
        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let keys = make_keys("dev-secret");
        let token = keys.sign(1, Role::User).expect("sign");
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        // flip the payload to another user's claims, keep the old signature
        let forged = make_keys("dev-secret").sign(2, Role::Admin).expect("sign");
        parts[1] = forged.split('.').nth(1).unwrap().to_string();
        let tampered = parts.join(".");
        assert_eq!(keys.verify(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_and_wrong_secret_are_invalid() {
        let keys = make_keys("dev-secret");
        assert_eq!(keys.verify("not.a.jwt"), Err(TokenError::Invalid));
        assert_eq!(keys.verify(""), Err(TokenError::Invalid));

        let other = make_keys("other-secret").sign(1, Role::User).expect("sign");
        assert_eq!(keys.verify(&other), Err(TokenError::Invalid));
    }
}
