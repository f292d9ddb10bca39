use std::sync::Arc;

use serde::Deserialize;

use crate::cache::memory::Backend;
use crate::cache::Cache;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Number of cache operations between two sweeps of expired entries.
    #[serde(default = "Config::default_sweep_interval")]
    pub sweep_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: Self::default_sweep_interval(),
        }
    }
}

impl Config {
    fn default_sweep_interval() -> usize {
        1000
    }

    pub fn to_backend(&self) -> Arc<dyn Cache> {
        Arc::new(Backend::new(self.sweep_interval))
    }
}
