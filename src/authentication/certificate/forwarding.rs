use std::sync::Arc;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::HeaderName;
use hyper::http::request;
use serde::Deserialize;
use tracing::debug;

use crate::authentication::certificate::PeerCertificate;
use crate::authentication::request_ext::HeaderExt;
use crate::authentication::Error;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "Config::default_header")]
    pub header: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            header: Self::default_header(),
        }
    }
}

impl Config {
    fn default_header() -> String {
        "X-Client-Cert".to_string()
    }
}

/// Installs a certificate forwarded by a TLS-terminating proxy as the connection certificate.
#[derive(Clone, Debug)]
pub struct CertificateForwarding {
    header: HeaderName,
}

impl CertificateForwarding {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let header = HeaderName::try_from(config.header.as_str()).map_err(|e| {
            Error::Configuration(format!(
                "Invalid certificate forwarding header '{}': {e}",
                config.header
            ))
        })?;

        Ok(Self { header })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    pub fn apply(&self, parts: &mut request::Parts) {
        if parts.extensions.get::<PeerCertificate>().is_some() {
            return;
        }

        let Some(value) = parts.get_header(&self.header) else {
            return;
        };

        match BASE64_STANDARD.decode(value.trim()) {
            Ok(der) => {
                parts.extensions.insert(PeerCertificate(Arc::new(der)));
            }
            Err(error) => {
                debug!("Ignoring forwarded certificate in '{}': {error}", self.header);
            }
        }
    }
}
