use std::{fmt, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

use super::dto::UserPublicView;

pub fn cache_key(id: i64) -> String {
    format!("user:{}", id)
}

/// Best-effort store of public user views. Callers treat every error as a miss.
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn get(&self, id: i64) -> anyhow::Result<Option<UserPublicView>>;
    async fn set(&self, view: &UserPublicView, ttl: Duration) -> anyhow::Result<()>;
    async fn invalidate(&self, id: i64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RedisUserCache {
    connection: ConnectionManager,
}

impl fmt::Debug for RedisUserCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisUserCache")
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisUserCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = Client::open(url).context("create redis client")?;
        let mut connection = ConnectionManager::new(client)
            .await
            .context("connect to redis")?;
        let _: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .context("ping redis")?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn get(&self, id: i64) -> anyhow::Result<Option<UserPublicView>> {
        let key = cache_key(id);
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn
            .get(&key)
            .await
            .with_context(|| format!("redis GET {}", key))?;
        raw.map(|s| serde_json::from_str(&s).with_context(|| format!("decode {}", key)))
            .transpose()
    }

    async fn set(&self, view: &UserPublicView, ttl: Duration) -> anyhow::Result<()> {
        let key = cache_key(view.id);
        let value = serde_json::to_string(view)?;
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(&key, value, ttl.as_secs().max(1))
            .await
            .with_context(|| format!("redis SET {}", key))?;
        Ok(())
    }

    async fn invalidate(&self, id: i64) -> anyhow::Result<()> {
        let key = cache_key(id);
        let mut conn = self.connection.clone();
        let _: i64 = conn
            .del(&key)
            .await
            .with_context(|| format!("redis DEL {}", key))?;
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::{
        collections::HashMap,
        sync::Mutex,
        time::Instant,
    };

    use super::*;

    /// In-memory cache storing serialized views, like Redis does.
    #[derive(Default)]
    pub struct MemoryUserCache {
        entries: Mutex<HashMap<String, (String, Instant)>>,
        fail: Mutex<bool>,
    }

    impl MemoryUserCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_should_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub fn contains(&self, id: i64) -> bool {
            self.entries
                .lock()
                .unwrap()
                .get(&cache_key(id))
                .is_some_and(|(_, expires)| *expires > Instant::now())
        }

        /// Overwrite an entry's raw value, e.g. with garbage.
        pub fn put_raw(&self, id: i64, raw: &str) {
            self.entries.lock().unwrap().insert(
                cache_key(id),
                (raw.to_string(), Instant::now() + Duration::from_secs(60)),
            );
        }

        fn check(&self) -> anyhow::Result<()> {
            if *self.fail.lock().unwrap() {
                anyhow::bail!("cache unavailable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserCache for MemoryUserCache {
        async fn get(&self, id: i64) -> anyhow::Result<Option<UserPublicView>> {
            self.check()?;
            let entries = self.entries.lock().unwrap();
            match entries.get(&cache_key(id)) {
                Some((raw, expires)) if *expires > Instant::now() => {
                    Ok(Some(serde_json::from_str(raw)?))
                }
                _ => Ok(None),
            }
        }

        async fn set(&self, view: &UserPublicView, ttl: Duration) -> anyhow::Result<()> {
            self.check()?;
            let raw = serde_json::to_string(view)?;
            self.entries
                .lock()
                .unwrap()
                .insert(cache_key(view.id), (raw, Instant::now() + ttl));
            Ok(())
        }

        async fn invalidate(&self, id: i64) -> anyhow::Result<()> {
            self.check()?;
            self.entries.lock().unwrap().remove(&cache_key(id));
            Ok(())
        }
    }
}
