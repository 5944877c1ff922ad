//! The cache backend abstraction: key/value storage plus pub/sub, reached
//! either through Redis or (for `REDIS_DISABLED=true` and tests) an
//! in-process fallback.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use crate::error::{LoaderError, Result};

/// Storage and notification primitives the contract loaders need: get/set
/// for the two contract key forms, a prefix scan for the cold-load pass,
/// and publish/subscribe for the `contract:approved` channel.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// All entries whose key starts with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;
    async fn publish(&self, channel: &str, message: &str) -> Result<()>;
    /// Subscribe to `channel`; messages arrive on the returned receiver
    /// until the backend is dropped or the subscription errors out.
    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>>;
}

/// `RwLock<Vec<_>>`-style fallback backend, mirroring the shape of this
/// workspace's other in-process stores. Good enough for tests and for
/// `REDIS_DISABLED=true` single-process deployments.
pub struct InMemoryCacheBackend {
    entries: RwLock<HashMap<String, String>>,
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()), channels: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(channel) {
            // No subscribers is not an error; the message is simply dropped.
            let _ = sender.send(message.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>> {
        let mut channels = self.channels.write().await;
        let sender = channels.entry(channel.to_string()).or_insert_with(|| broadcast::channel(64).0);
        Ok(sender.subscribe())
    }
}

#[cfg(feature = "redis-backend")]
pub struct RedisCacheBackend {
    manager: redis::aio::ConnectionManager,
    client: redis::Client,
}

#[cfg(feature = "redis-backend")]
impl RedisCacheBackend {
    pub async fn connect(host: &str, port: u16, password: Option<&str>) -> Result<Self> {
        let url = match password {
            Some(pw) if !pw.is_empty() => format!("redis://:{pw}@{host}:{port}"),
            _ => format!("redis://{host}:{port}"),
        };
        let client = redis::Client::open(url).map_err(|e| LoaderError::Cache(e.to_string()))?;
        let manager = client.get_connection_manager().await.map_err(|e| LoaderError::Cache(e.to_string()))?;
        Ok(Self { manager, client })
    }
}

#[cfg(feature = "redis-backend")]
#[async_trait]
impl CacheBackend for RedisCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        redis::cmd("GET").arg(key).query_async(&mut conn).await.map_err(|e| LoaderError::Cache(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("SET").arg(key).arg(value).query_async::<()>(&mut conn).await.map_err(|e| LoaderError::Cache(e.to_string()))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.manager.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> =
            redis::cmd("KEYS").arg(&pattern).query_async(&mut conn).await.map_err(|e| LoaderError::Cache(e.to_string()))?;

        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(&key).await? {
                out.push((key, value));
            }
        }
        Ok(out)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(message)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| LoaderError::Cache(e.to_string()))
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>> {
        let (tx, rx) = broadcast::channel(64);
        let mut pubsub =
            self.client.get_async_pubsub().await.map_err(|e| LoaderError::Cache(e.to_string()))?;
        pubsub.subscribe(channel).await.map_err(|e| LoaderError::Cache(e.to_string()))?;

        tokio::spawn(async move {
            use futures::StreamExt;
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if tx.send(payload).is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

pub type SharedCacheBackend = Arc<dyn CacheBackend>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let backend = InMemoryCacheBackend::new();
        backend.set("tenant:acme:contract:hc-v1", "{}").await.unwrap();
        assert_eq!(backend.get("tenant:acme:contract:hc-v1").await.unwrap(), Some("{}".to_string()));
    }

    #[tokio::test]
    async fn scan_prefix_filters_by_prefix() {
        let backend = InMemoryCacheBackend::new();
        backend.set("tenant:acme:contract:a", "1").await.unwrap();
        backend.set("tenant:acme:contract:b", "2").await.unwrap();
        backend.set("contract:tenant-acme:a", "3").await.unwrap();
        let scanned = backend.scan_prefix("tenant:").await.unwrap();
        assert_eq!(scanned.len(), 2);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let backend = InMemoryCacheBackend::new();
        backend.publish("contract:approved", "{}").await.unwrap();
    }

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let backend = InMemoryCacheBackend::new();
        let mut rx = backend.subscribe("contract:approved").await.unwrap();
        backend.publish("contract:approved", "hello").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }
}
