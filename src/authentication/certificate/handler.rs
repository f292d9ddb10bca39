use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hyper::http::{request, response};
use hyper::StatusCode;
use tracing::{debug, instrument, warn};

use crate::authentication::certificate::{
    evaluate, CertificateOptions, ClientCertificate, PeerCertificate,
};
use crate::authentication::events::{dispatch, CertificateContext, CertificateValidator};
use crate::authentication::request_ext::HeaderExt;
use crate::authentication::{AuthenticateResult, AuthenticationHandler, Error, Principal, Ticket};
use crate::cache;
use crate::cache::Cache;

pub const SCHEME: &str = "certificate";

struct ValidationCache {
    backend: Arc<dyn Cache>,
    ttl: u64,
}

pub struct CertificateAuthenticationHandler {
    scheme: String,
    options: CertificateOptions,
    validator: Arc<dyn CertificateValidator>,
    cache: Option<ValidationCache>,
}

impl CertificateAuthenticationHandler {
    pub fn new(options: CertificateOptions, validator: Arc<dyn CertificateValidator>) -> Self {
        Self {
            scheme: SCHEME.to_string(),
            options,
            validator,
            cache: None,
        }
    }

    /// Remember successful validations per certificate thumbprint for `ttl` seconds.
    pub fn with_cache(mut self, backend: Arc<dyn Cache>, ttl: u64) -> Self {
        if ttl > 0 {
            self.cache = Some(ValidationCache { backend, ttl });
        }
        self
    }

    fn cache_key(&self, certificate: &ClientCertificate) -> String {
        format!("{}:{}", self.scheme, certificate.thumbprint)
    }

    async fn cached_principal(&self, certificate: &ClientCertificate) -> Option<Principal> {
        let cache = self.cache.as_ref()?;
        let key = self.cache_key(certificate);

        cache::retrieve(cache.backend.as_ref(), &key)
            .await
            .ok()
            .flatten()
    }

    async fn remember(&self, certificate: &ClientCertificate, principal: &Principal) {
        let Some(cache) = &self.cache else {
            return;
        };

        let key = self.cache_key(certificate);
        if let Err(error) = cache::store(cache.backend.as_ref(), &key, principal, cache.ttl).await {
            debug!("Certificate validation not cached: {error}");
        }
    }
}

#[async_trait]
impl AuthenticationHandler for CertificateAuthenticationHandler {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    #[instrument(skip(self, parts), fields(scheme = %self.scheme))]
    async fn authenticate(&self, parts: &request::Parts) -> Result<AuthenticateResult, Error> {
        let Some(PeerCertificate(der)) = parts.peer_certificate() else {
            debug!("No client certificate on connection");
            return Ok(AuthenticateResult::NoResult);
        };

        let certificate = match ClientCertificate::from_der(der.clone()) {
            Ok(certificate) => certificate,
            Err(error) => {
                warn!("Client certificate rejected: {error}");
                return Ok(AuthenticateResult::NoResult);
            }
        };

        if let Err(rejection) = evaluate(&certificate, &self.options, Utc::now()) {
            warn!(
                "Client certificate '{}' rejected: {rejection}",
                certificate.subject
            );
            return Ok(AuthenticateResult::NoResult);
        }

        if let Some(principal) = self.cached_principal(&certificate).await {
            debug!("Using cached validation for '{}'", certificate.thumbprint);
            return Ok(AuthenticateResult::Success(Ticket::new(
                principal,
                &self.scheme,
            )));
        }

        let context = CertificateContext {
            scheme: self.scheme.clone(),
            certificate,
            remote_address: parts.remote_address(),
        };

        let validator = &self.validator;
        let result = dispatch(
            &self.scheme,
            validator.validate_certificate(&context),
            move |failed| async move { validator.authentication_failed(&failed).await },
        )
        .await?;

        if let AuthenticateResult::Success(ticket) = &result {
            self.remember(&context.certificate, &ticket.principal).await;
        }

        Ok(result)
    }

    fn challenge(&self, parts: &request::Parts, response: &mut response::Parts) -> Result<(), Error> {
        self.forbid(parts, response)
    }

    fn forbid(&self, _parts: &request::Parts, response: &mut response::Parts) -> Result<(), Error> {
        response.status = StatusCode::FORBIDDEN;
        Ok(())
    }
}
