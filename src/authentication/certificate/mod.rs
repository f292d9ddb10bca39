mod chain;
mod client_certificate;
#[cfg(test)]
pub mod fixtures;
mod forwarding;
mod handler;
mod policy;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::authentication::Error;

pub use chain::{ChainPolicy, RevocationFlag, RevocationMode, TrustStore};
pub use client_certificate::{ClientCertificate, KeyPurposes};
pub use forwarding::{CertificateForwarding, Config as ForwardingConfig};
pub use handler::{CertificateAuthenticationHandler, SCHEME};
pub use policy::{evaluate, Rejection};

/// DER certificate presented on the connection, by the TLS layer or a forwarding proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerCertificate(pub Arc<Vec<u8>>);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    SelfSigned,
    Chained,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_allowed_certificate_types")]
    pub allowed_certificate_types: Vec<CertificateType>,
    #[serde(default = "Config::default_true")]
    pub validate_certificate_use: bool,
    #[serde(default = "Config::default_true")]
    pub validate_validity_period: bool,
    #[serde(default)]
    pub revocation_mode: RevocationMode,
    #[serde(default)]
    pub revocation_flag: RevocationFlag,
    #[serde(default = "Config::default_true")]
    pub use_platform_roots: bool,
    pub ca_bundle: Option<PathBuf>,
    #[serde(default)]
    pub crl_files: Vec<PathBuf>,
    #[serde(default = "Config::default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_certificate_types: Self::default_allowed_certificate_types(),
            validate_certificate_use: true,
            validate_validity_period: true,
            revocation_mode: RevocationMode::default(),
            revocation_flag: RevocationFlag::default(),
            use_platform_roots: true,
            ca_bundle: None,
            crl_files: Vec::new(),
            cache_ttl_seconds: Self::default_cache_ttl_seconds(),
        }
    }
}

impl Config {
    fn default_allowed_certificate_types() -> Vec<CertificateType> {
        vec![CertificateType::SelfSigned, CertificateType::Chained]
    }

    fn default_true() -> bool {
        true
    }

    fn default_cache_ttl_seconds() -> u64 {
        120
    }
}

/// Immutable policy inputs shared by every certificate request.
#[derive(Clone, Debug)]
pub struct CertificateOptions {
    pub allowed_certificate_types: HashSet<CertificateType>,
    pub validate_certificate_use: bool,
    pub validate_validity_period: bool,
    pub chain: ChainPolicy,
}

impl Default for CertificateOptions {
    fn default() -> Self {
        Self {
            allowed_certificate_types: HashSet::from([
                CertificateType::SelfSigned,
                CertificateType::Chained,
            ]),
            validate_certificate_use: true,
            validate_validity_period: true,
            chain: ChainPolicy::default(),
        }
    }
}

impl CertificateOptions {
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let mut trust = TrustStore::default();
        if config.use_platform_roots {
            trust = trust.with_platform_roots();
        }
        if let Some(bundle) = &config.ca_bundle {
            trust = trust.load_ca_bundle(bundle)?;
        }
        for crl in &config.crl_files {
            trust = trust.load_crl(crl)?;
        }

        Ok(Self {
            allowed_certificate_types: config.allowed_certificate_types.iter().copied().collect(),
            validate_certificate_use: config.validate_certificate_use,
            validate_validity_period: config.validate_validity_period,
            chain: ChainPolicy::new(trust, config.revocation_mode, config.revocation_flag),
        })
    }

    pub fn allows(&self, certificate_type: CertificateType) -> bool {
        self.allowed_certificate_types.contains(&certificate_type)
    }
}
