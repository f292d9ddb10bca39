pub mod basic;
pub mod certificate;
mod error;
pub mod events;
pub mod pipeline;
pub mod principal;
pub mod request_ext;

use std::net::SocketAddr;

use async_trait::async_trait;
use hyper::http::{request, response};

pub use error::Error;
pub use events::{
    AuthenticationFailedContext, CertificateContext, CertificateValidator, CredentialsContext,
    CredentialsValidator, Fault, Validation,
};
pub use pipeline::AuthenticationPipeline;
pub use principal::{claim_types, Claim, Principal};

/// Connection attributes the listener attaches to every request it serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub remote_address: SocketAddr,
    pub secure: bool,
}

/// A principal bound to the scheme that authenticated it.
#[derive(Clone, Debug, PartialEq)]
pub struct Ticket {
    pub scheme: String,
    pub principal: Principal,
}

impl Ticket {
    pub fn new(principal: Principal, scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            principal,
        }
    }
}

/// Terminal outcome of one handler for one request.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthenticateResult {
    Success(Ticket),
    /// No credentials for this scheme, or credentials the scheme does not accept.
    NoResult,
    Fail(String),
}

impl AuthenticateResult {
    pub fn label(&self) -> &'static str {
        match self {
            AuthenticateResult::Success(_) => "success",
            AuthenticateResult::NoResult => "none",
            AuthenticateResult::Fail(_) => "failed",
        }
    }
}

/// Protocol entry points a scheme exposes to the request pipeline.
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    fn scheme(&self) -> &str;

    /// Extract credentials and run validation.
    ///
    /// Returns:
    /// - `Ok(AuthenticateResult::Success(_))` when the validator accepted the credentials
    /// - `Ok(AuthenticateResult::NoResult)` when nothing usable was presented
    /// - `Ok(AuthenticateResult::Fail(_))` when the validator explicitly rejected them
    /// - `Err(Error::Fault { .. })` when the validator faulted and nobody handled it
    async fn authenticate(&self, parts: &request::Parts) -> Result<AuthenticateResult, Error>;

    /// Ask the client to supply credentials.
    fn challenge(
        &self,
        parts: &request::Parts,
        response: &mut response::Parts,
    ) -> Result<(), Error>;

    /// Deny access without offering a way to supply credentials.
    fn forbid(&self, parts: &request::Parts, response: &mut response::Parts) -> Result<(), Error>;
}
