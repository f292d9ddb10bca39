mod config;
mod error;
mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub use config::Config;
pub use error::Error;

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait Cache: Debug + Send + Sync {
    /// Store `value` under `key` for `expires_in` seconds.
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error>;

    /// Returns `Ok(None)` when the key is unknown or expired.
    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error>;
}

pub async fn retrieve<T>(cache: &dyn Cache, key: &str) -> Result<Option<T>, Error>
where
    T: DeserializeOwned,
{
    let Some(cached) = cache.retrieve_value(key).await.map_err(|err| {
        warn!("Failed to retrieve value from cache for key {key}: {err}");
        Error::Execution(format!("Failed to retrieve value from cache: {err}"))
    })?
    else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&cached) {
        Ok(value) => {
            debug!("Using cached value for key: {key}");
            Ok(Some(value))
        }
        Err(e) => {
            warn!("Failed to deserialize cached value for key {key}: {e}");
            let msg = format!("Failed to deserialize cached value: {e}");
            Err(Error::Execution(msg))
        }
    }
}

pub async fn store<T>(cache: &dyn Cache, key: &str, value: &T, ttl: u64) -> Result<(), Error>
where
    T: Serialize,
{
    let serialized = serde_json::to_string(value).map_err(|e| {
        warn!("Failed to serialize value for caching for key {key}: {e}");
        Error::Execution(format!("Failed to serialize value for caching: {e}"))
    })?;

    cache
        .store_value(key, &serialized, ttl)
        .await
        .map_err(|err| {
            warn!("Failed to store value in cache for key {key}: {err}");
            Error::Execution(format!("Failed to store value in cache: {err}"))
        })
}
