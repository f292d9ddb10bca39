mod certificate_claims;
mod users;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::authentication::basic::{self, BasicAuthenticationHandler};
use crate::authentication::certificate::{
    self, CertificateAuthenticationHandler, CertificateForwarding, CertificateOptions,
    ForwardingConfig,
};
use crate::authentication::{AuthenticationPipeline, Error};
use crate::cache::Cache;

pub use certificate_claims::{certificate_principal, CertificateClaimsValidator};
pub use users::{UserConfig, UsersValidator};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthConfig {
    pub default_scheme: Option<String>,
    pub basic: Option<BasicConfig>,
    pub certificate: Option<CertificateConfig>,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BasicConfig {
    #[serde(flatten)]
    pub options: basic::Options,
    #[serde(default)]
    pub users: HashMap<String, UserConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CertificateConfig {
    #[serde(flatten)]
    pub policy: certificate::Config,
    #[serde(default)]
    pub allowed_thumbprints: Vec<String>,
}

impl AuthConfig {
    /// Registration order: certificate, then basic.
    pub fn build_pipeline(&self, cache: &Arc<dyn Cache>) -> Result<AuthenticationPipeline, Error> {
        let default_scheme = match (&self.default_scheme, &self.basic, &self.certificate) {
            (Some(scheme), _, _) => scheme.clone(),
            (None, Some(_), _) => basic::SCHEME.to_string(),
            (None, None, Some(_)) => certificate::SCHEME.to_string(),
            (None, None, None) => {
                return Err(Error::Configuration(
                    "At least one authentication scheme must be configured".to_string(),
                ))
            }
        };

        let mut pipeline = AuthenticationPipeline::new(&default_scheme);

        if self.forwarding.enabled {
            let forwarding = CertificateForwarding::new(&self.forwarding)?;
            info!(
                "Accepting forwarded client certificates from header '{}'",
                forwarding.header()
            );
            pipeline = pipeline.with_forwarding(forwarding);
        }

        if let Some(config) = &self.certificate {
            let options = CertificateOptions::from_config(&config.policy)?;
            let validator = Arc::new(CertificateClaimsValidator::new(
                &config.allowed_thumbprints,
            ));
            let handler = CertificateAuthenticationHandler::new(options, validator)
                .with_cache(Arc::clone(cache), config.policy.cache_ttl_seconds);
            pipeline = pipeline.with_handler(Arc::new(handler));
        }

        if let Some(config) = &self.basic {
            let validator = Arc::new(UsersValidator::new(&config.users));
            let handler = BasicAuthenticationHandler::new(config.options.clone(), validator);
            pipeline = pipeline.with_handler(Arc::new(handler));
        }

        pipeline.validate()?;
        info!(
            "Authentication schemes: {} (default '{default_scheme}')",
            pipeline.schemes().collect::<Vec<_>>().join(", ")
        );

        Ok(pipeline)
    }
}
