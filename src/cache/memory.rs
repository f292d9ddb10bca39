use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{Cache, Error};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct Backend {
    entries: RwLock<HashMap<String, Entry>>,
    operations: AtomicUsize,
    sweep_interval: usize,
}

impl Backend {
    pub fn new(sweep_interval: usize) -> Self {
        info!("Using in-memory cache store");
        Backend {
            entries: RwLock::new(HashMap::new()),
            operations: AtomicUsize::new(0),
            sweep_interval: sweep_interval.max(1),
        }
    }

    async fn maybe_sweep(&self) {
        let count = self.operations.fetch_add(1, Ordering::Relaxed);
        if count % self.sweep_interval != 0 {
            return;
        }

        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        debug!("Swept {} expired cache entries", before - entries.len());
    }
}

#[async_trait]
impl Cache for Backend {
    async fn store_value(&self, key: &str, value: &str, expires_in: u64) -> Result<(), Error> {
        self.maybe_sweep().await;

        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn retrieve_value(&self, key: &str) -> Result<Option<String>, Error> {
        self.maybe_sweep().await;

        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }
}
