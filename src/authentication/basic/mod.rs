
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::{HeaderValue, WWW_AUTHENTICATE};
use hyper::http::{request, response};
use hyper::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::authentication::events::{dispatch, CredentialsContext, CredentialsValidator};
use crate::authentication::request_ext::HeaderExt;
use crate::authentication::{AuthenticateResult, AuthenticationHandler, Error};

pub const SCHEME: &str = "basic";

/// Protection space label sent with challenges. Only printable US-ASCII is accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Realm(String);

impl Realm {
    pub fn new(value: impl Into<String>) -> Result<Self, Error> {
        let value = value.into();

        if !value.is_ascii() {
            let msg = format!("realm '{value}' contains non US-ASCII characters");
            return Err(Error::Configuration(msg));
        }

        if value.chars().any(|c| c.is_ascii_control()) {
            let msg = format!("realm {value:?} contains control characters");
            return Err(Error::Configuration(msg));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as an HTTP quoted-string.
    pub fn quoted(&self) -> String {
        let mut quoted = String::with_capacity(self.0.len() + 2);
        quoted.push('"');
        for c in self.0.chars() {
            if c == '"' || c == '\\' {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('"');
        quoted
    }
}

impl TryFrom<String> for Realm {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Realm::new(value)
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Options {
    #[serde(default)]
    pub realm: Realm,
    #[serde(default)]
    pub allow_insecure_protocol: bool,
    #[serde(default)]
    pub suppress_www_authenticate_header: bool,
}

pub struct BasicAuthenticationHandler {
    scheme: String,
    options: Options,
    validator: Arc<dyn CredentialsValidator>,
}

impl BasicAuthenticationHandler {
    pub fn new(options: Options, validator: Arc<dyn CredentialsValidator>) -> Self {
        Self::with_scheme(SCHEME, options, validator)
    }

    pub fn with_scheme(
        scheme: &str,
        options: Options,
        validator: Arc<dyn CredentialsValidator>,
    ) -> Self {
        Self {
            scheme: scheme.to_string(),
            options,
            validator,
        }
    }

    fn challenge_value(&self) -> Result<HeaderValue, Error> {
        let value = format!("Basic realm={}", self.options.realm.quoted());
        HeaderValue::from_str(&value).map_err(|error| {
            Error::Configuration(format!("Invalid challenge header value: {error}"))
        })
    }
}

#[async_trait]
impl AuthenticationHandler for BasicAuthenticationHandler {
    fn scheme(&self) -> &str {
        &self.scheme
    }

    #[instrument(skip(self, parts), fields(scheme = %self.scheme))]
    async fn authenticate(&self, parts: &request::Parts) -> Result<AuthenticateResult, Error> {
        let Some((username, password)) = parts.basic_auth() else {
            debug!("No usable Basic credentials on request");
            return Ok(AuthenticateResult::NoResult);
        };

        if !parts.is_secure() && !self.options.allow_insecure_protocol {
            debug!("Basic credentials received over an insecure transport");
        }

        let context = CredentialsContext {
            scheme: self.scheme.clone(),
            username,
            password,
            remote_address: parts.remote_address(),
        };

        let validator = &self.validator;
        dispatch(
            &self.scheme,
            validator.validate_credentials(&context),
            move |failed| async move { validator.authentication_failed(&failed).await },
        )
        .await
    }

    fn challenge(
        &self,
        parts: &request::Parts,
        response: &mut response::Parts,
    ) -> Result<(), Error> {
        if !parts.is_secure() && !self.options.allow_insecure_protocol {
            warn!(
                "Refusing Basic challenge over an insecure transport for scheme '{}'",
                self.scheme
            );
            return Err(Error::InsecureTransport {
                scheme: self.scheme.clone(),
            });
        }

        response.status = StatusCode::UNAUTHORIZED;
        if !self.options.suppress_www_authenticate_header {
            response
                .headers
                .append(WWW_AUTHENTICATE, self.challenge_value()?);
        }

        Ok(())
    }

    fn forbid(&self, _parts: &request::Parts, response: &mut response::Parts) -> Result<(), Error> {
        response.status = StatusCode::FORBIDDEN;
        Ok(())
    }
}
