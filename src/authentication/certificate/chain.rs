use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustls::crypto::CryptoProvider;
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, CertificateRevocationListDer, UnixTime};
use serde::Deserialize;
use tracing::{debug, info, warn};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::authentication::Error;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevocationMode {
    NoCheck,
    /// Check against configured revocation lists, tolerating certificates they do not cover.
    #[default]
    Offline,
    /// Check against configured revocation lists, rejecting certificates they do not cover.
    Online,
}

/// Which certificates of the path are checked against revocation lists.
///
/// `EntireChain` and `ExcludeRoot` behave the same: trust anchors are never
/// checked for revocation during path building.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RevocationFlag {
    EndCertificateOnly,
    EntireChain,
    #[default]
    ExcludeRoot,
}

/// Trust anchors and revocation lists used to validate chained certificates.
#[derive(Clone)]
pub struct TrustStore {
    pub roots: RootCertStore,
    pub intermediates: Vec<CertificateDer<'static>>,
    pub crls: Vec<CertificateRevocationListDer<'static>>,
}

impl Default for TrustStore {
    fn default() -> Self {
        Self {
            roots: RootCertStore::empty(),
            intermediates: Vec::new(),
            crls: Vec::new(),
        }
    }
}

impl fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustStore")
            .field("roots", &self.roots.len())
            .field("intermediates", &self.intermediates.len())
            .field("crls", &self.crls.len())
            .finish()
    }
}

impl TrustStore {
    pub fn with_platform_roots(mut self) -> Self {
        let native = rustls_native_certs::load_native_certs();
        for error in &native.errors {
            warn!("Failed to load platform certificate: {error}");
        }

        let (added, ignored) = self.roots.add_parsable_certificates(native.certs);
        info!("Loaded {added} platform trust anchors ({ignored} ignored)");
        self
    }

    pub fn with_root(mut self, der: Vec<u8>) -> Result<Self, Error> {
        self.roots
            .add(CertificateDer::from(der))
            .map_err(|e| Error::Configuration(format!("Invalid trust anchor: {e}")))?;
        Ok(self)
    }

    pub fn with_crl(mut self, der: Vec<u8>) -> Self {
        self.crls.push(CertificateRevocationListDer::from(der));
        self
    }

    pub fn load_ca_bundle<P: AsRef<Path>>(mut self, path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        info!("Loading CA bundle from {}", path.display());

        let certs = CertificateDer::pem_file_iter(path)
            .and_then(|items| items.collect::<Result<Vec<_>, _>>())
            .map_err(|e| {
                Error::Configuration(format!("Unable to read CA bundle {}: {e}", path.display()))
            })?;

        for cert in certs {
            if is_self_issued(&cert) {
                self.roots.add(cert).map_err(|e| {
                    Error::Configuration(format!("Invalid CA in {}: {e}", path.display()))
                })?;
            } else {
                debug!("Using non self-issued CA from {} as intermediate", path.display());
                self.intermediates.push(cert);
            }
        }

        Ok(self)
    }

    pub fn load_crl<P: AsRef<Path>>(mut self, path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        info!("Loading revocation list from {}", path.display());

        let crls = CertificateRevocationListDer::pem_file_iter(path)
            .and_then(|items| items.collect::<Result<Vec<_>, _>>())
            .map_err(|e| {
                Error::Configuration(format!(
                    "Unable to read revocation list {}: {e}",
                    path.display()
                ))
            })?;

        self.crls.extend(crls);
        Ok(self)
    }
}

fn is_self_issued(cert: &CertificateDer<'_>) -> bool {
    X509Certificate::from_der(cert.as_ref())
        .map(|(_, parsed)| parsed.subject().as_raw() == parsed.issuer().as_raw())
        .unwrap_or(true)
}

/// Prebuilt chain verifier honoring the configured revocation policy.
#[derive(Clone)]
pub struct ChainPolicy {
    verifier: Result<Arc<dyn ClientCertVerifier>, String>,
    intermediates: Vec<CertificateDer<'static>>,
}

impl fmt::Debug for ChainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainPolicy")
            .field("usable", &self.verifier.is_ok())
            .field("intermediates", &self.intermediates.len())
            .finish()
    }
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self::new(
            TrustStore::default(),
            RevocationMode::default(),
            RevocationFlag::default(),
        )
    }
}

impl ChainPolicy {
    pub fn new(trust: TrustStore, mode: RevocationMode, flag: RevocationFlag) -> Self {
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        Self::with_provider(trust, mode, flag, provider)
    }

    pub fn with_provider(
        trust: TrustStore,
        mode: RevocationMode,
        flag: RevocationFlag,
        provider: Arc<CryptoProvider>,
    ) -> Self {
        let TrustStore {
            roots,
            intermediates,
            crls,
        } = trust;

        let mut builder = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);

        if mode == RevocationMode::NoCheck {
            debug!("Revocation checking disabled");
        } else {
            builder = builder.with_crls(crls);
            if flag == RevocationFlag::EndCertificateOnly {
                builder = builder.only_check_end_entity_revocation();
            }
            if mode == RevocationMode::Offline {
                builder = builder.allow_unknown_revocation_status();
            }
        }

        let verifier = builder.build().map_err(|error| {
            debug!("Chain validation unavailable: {error}");
            error.to_string()
        });

        Self {
            verifier,
            intermediates,
        }
    }

    /// Build a path from `der` to a trust anchor as seen at `at`.
    pub fn verify(&self, der: &[u8], at: DateTime<Utc>) -> Result<(), String> {
        let verifier = self
            .verifier
            .as_ref()
            .map_err(|e| format!("no usable trust anchors: {e}"))?;

        let seconds = u64::try_from(at.timestamp()).unwrap_or_default();
        let now = UnixTime::since_unix_epoch(Duration::from_secs(seconds));
        let end_entity = CertificateDer::from(der);

        verifier
            .verify_client_cert(&end_entity, &self.intermediates, now)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
