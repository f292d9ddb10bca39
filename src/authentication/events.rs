use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::authentication::certificate::ClientCertificate;
use crate::authentication::{AuthenticateResult, Error, Principal, Ticket};

/// Error raised from inside validation logic.
pub type Fault = Box<dyn std::error::Error + Send + Sync>;

/// Single decision returned by a validator.
#[derive(Clone, Debug, PartialEq)]
pub enum Validation {
    Success(Principal),
    Fail(String),
    NoResult,
}

pub struct CredentialsContext {
    pub scheme: String,
    pub username: String,
    pub password: String,
    pub remote_address: Option<SocketAddr>,
}

impl fmt::Debug for CredentialsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsContext")
            .field("scheme", &self.scheme)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("remote_address", &self.remote_address)
            .finish()
    }
}

#[derive(Debug)]
pub struct CertificateContext {
    pub scheme: String,
    pub certificate: ClientCertificate,
    pub remote_address: Option<SocketAddr>,
}

/// Offered to the failure hook when a validator faults.
#[derive(Debug)]
pub struct AuthenticationFailedContext {
    pub scheme: String,
    pub fault: Fault,
}

/// Validation logic for the Basic scheme.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialsValidator: Send + Sync {
    async fn validate_credentials(&self, context: &CredentialsContext)
        -> Result<Validation, Fault>;

    /// Return a reason to fail the request, or `None` to let the fault surface.
    async fn authentication_failed(&self, _context: &AuthenticationFailedContext) -> Option<String> {
        None
    }
}

/// Validation logic for the client certificate scheme, run after the policy accepted the certificate.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CertificateValidator: Send + Sync {
    async fn validate_certificate(&self, context: &CertificateContext)
        -> Result<Validation, Fault>;

    async fn authentication_failed(&self, _context: &AuthenticationFailedContext) -> Option<String> {
        None
    }
}

/// Await a validation and map it to the scheme's result.
///
/// A fault goes through `on_failed` exactly once; when the hook returns no reason the fault
/// becomes `Error::Fault`.
pub(crate) async fn dispatch<V, H, F>(
    scheme: &str,
    validation: V,
    on_failed: H,
) -> Result<AuthenticateResult, Error>
where
    V: Future<Output = Result<Validation, Fault>>,
    H: FnOnce(AuthenticationFailedContext) -> F,
    F: Future<Output = Option<String>>,
{
    match validation.await {
        Ok(Validation::Success(principal)) => {
            debug!("Scheme '{scheme}' validated credentials");
            Ok(AuthenticateResult::Success(Ticket::new(principal, scheme)))
        }
        Ok(Validation::Fail(reason)) => {
            debug!("Scheme '{scheme}' rejected credentials: {reason}");
            Ok(AuthenticateResult::Fail(reason))
        }
        Ok(Validation::NoResult) => {
            debug!("Scheme '{scheme}' validator made no decision");
            Ok(AuthenticateResult::NoResult)
        }
        Err(fault) => {
            let message = fault.to_string();
            warn!("Scheme '{scheme}' validator fault: {message}");

            let context = AuthenticationFailedContext {
                scheme: scheme.to_string(),
                fault,
            };

            match on_failed(context).await {
                Some(reason) => Ok(AuthenticateResult::Fail(reason)),
                None => Err(Error::Fault {
                    scheme: scheme.to_string(),
                    message,
                }),
            }
        }
    }
}
