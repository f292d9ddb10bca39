use std::sync::Arc;

use hyper::http::{request, response};
use tracing::{debug, instrument, warn};

use crate::authentication::certificate::CertificateForwarding;
use crate::authentication::{AuthenticateResult, AuthenticationHandler, Error, Ticket};
use crate::metrics_provider::AUTH_ATTEMPTS;

/// Ordered set of authentication handlers run for every request.
pub struct AuthenticationPipeline {
    forwarding: Option<CertificateForwarding>,
    handlers: Vec<Arc<dyn AuthenticationHandler>>,
    default_scheme: String,
}

impl AuthenticationPipeline {
    pub fn new(default_scheme: &str) -> Self {
        Self {
            forwarding: None,
            handlers: Vec::new(),
            default_scheme: default_scheme.to_string(),
        }
    }

    pub fn with_forwarding(mut self, forwarding: CertificateForwarding) -> Self {
        self.forwarding = Some(forwarding);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn AuthenticationHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn default_scheme(&self) -> &str {
        &self.default_scheme
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|handler| handler.scheme())
    }

    fn handler(&self, scheme: &str) -> Result<&Arc<dyn AuthenticationHandler>, Error> {
        self.handlers
            .iter()
            .find(|handler| handler.scheme() == scheme)
            .ok_or_else(|| Error::Configuration(format!("No handler registered for scheme '{scheme}'")))
    }

    /// Check that the default scheme resolves to a registered handler.
    pub fn validate(&self) -> Result<(), Error> {
        self.handler(&self.default_scheme).map(|_| ())
    }

    /// Run every handler in registration order until one succeeds.
    #[instrument(skip(self, parts), fields(auth_scheme = tracing::field::Empty))]
    pub async fn authenticate(&self, parts: &mut request::Parts) -> Result<Option<Ticket>, Error> {
        if let Some(forwarding) = &self.forwarding {
            forwarding.apply(parts);
        }

        for handler in &self.handlers {
            let scheme = handler.scheme();

            let result = match handler.authenticate(parts).await {
                Ok(result) => result,
                Err(error) => {
                    AUTH_ATTEMPTS.with_label_values(&[scheme, "error"]).inc();
                    return Err(error);
                }
            };

            if result != AuthenticateResult::NoResult {
                AUTH_ATTEMPTS
                    .with_label_values(&[scheme, result.label()])
                    .inc();
            }

            match result {
                AuthenticateResult::Success(ticket) => {
                    tracing::Span::current().record("auth_scheme", scheme);
                    return Ok(Some(ticket));
                }
                AuthenticateResult::Fail(reason) => {
                    warn!("Authentication with scheme '{scheme}' failed: {reason}");
                }
                AuthenticateResult::NoResult => {}
            }
        }

        debug!("Request is anonymous");
        tracing::Span::current().record("auth_scheme", "anonymous");
        Ok(None)
    }

    pub fn challenge(
        &self,
        parts: &request::Parts,
        response: &mut response::Parts,
    ) -> Result<(), Error> {
        self.handler(&self.default_scheme)?
            .challenge(parts, response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::prelude::BASE64_STANDARD;
    use base64::Engine;
    use hyper::{Request, Response, StatusCode};

    use super::*;
    use crate::authentication::certificate::fixtures::Fixtures;
    use crate::authentication::certificate::{ForwardingConfig, PeerCertificate};
    use crate::authentication::Principal;

    struct StubHandler {
        scheme: &'static str,
        result: Result<AuthenticateResult, Error>,
        calls: AtomicUsize,
        status: StatusCode,
    }

    impl StubHandler {
        fn new(scheme: &'static str, result: Result<AuthenticateResult, Error>) -> Arc<Self> {
            Arc::new(Self {
                scheme,
                result,
                calls: AtomicUsize::new(0),
                status: StatusCode::UNAUTHORIZED,
            })
        }

        fn succeeding(scheme: &'static str) -> Arc<Self> {
            let ticket = Ticket::new(Principal::new(scheme), scheme);
            Self::new(scheme, Ok(AuthenticateResult::Success(ticket)))
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthenticationHandler for StubHandler {
        fn scheme(&self) -> &str {
            self.scheme
        }

        async fn authenticate(&self, _parts: &request::Parts) -> Result<AuthenticateResult, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        fn challenge(
            &self,
            _parts: &request::Parts,
            response: &mut response::Parts,
        ) -> Result<(), Error> {
            response.status = self.status;
            Ok(())
        }

        fn forbid(
            &self,
            _parts: &request::Parts,
            response: &mut response::Parts,
        ) -> Result<(), Error> {
            response.status = StatusCode::FORBIDDEN;
            Ok(())
        }
    }

    fn parts() -> request::Parts {
        let (parts, ()) = Request::new(()).into_parts();
        parts
    }

    fn response() -> response::Parts {
        let (parts, ()) = Response::new(()).into_parts();
        parts
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let first = StubHandler::new("first", Ok(AuthenticateResult::NoResult));
        let second = StubHandler::succeeding("second");
        let third = StubHandler::succeeding("third");
        let pipeline = AuthenticationPipeline::new("first")
            .with_handler(first.clone())
            .with_handler(second.clone())
            .with_handler(third.clone());

        let ticket = pipeline.authenticate(&mut parts()).await.unwrap();

        assert_eq!(ticket.map(|t| t.scheme), Some("second".to_string()));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_continues_with_next_handler() {
        let failing = StubHandler::new("failing", Ok(AuthenticateResult::Fail("nope".into())));
        let succeeding = StubHandler::succeeding("succeeding");
        let pipeline = AuthenticationPipeline::new("failing")
            .with_handler(failing)
            .with_handler(succeeding);

        let ticket = pipeline.authenticate(&mut parts()).await.unwrap();
        assert_eq!(ticket.map(|t| t.scheme), Some("succeeding".to_string()));
    }

    #[tokio::test]
    async fn test_anonymous_request() {
        let pipeline = AuthenticationPipeline::new("none")
            .with_handler(StubHandler::new("none", Ok(AuthenticateResult::NoResult)));

        let ticket = pipeline.authenticate(&mut parts()).await.unwrap();
        assert_eq!(ticket, None);
    }

    #[tokio::test]
    async fn test_fault_stops_pipeline() {
        let fault = Error::Fault {
            scheme: "broken".to_string(),
            message: "store offline".to_string(),
        };
        let broken = StubHandler::new("broken", Err(fault.clone()));
        let after = StubHandler::succeeding("after");
        let pipeline = AuthenticationPipeline::new("broken")
            .with_handler(broken)
            .with_handler(after.clone());

        let result = pipeline.authenticate(&mut parts()).await;

        assert_eq!(result, Err(fault));
        assert_eq!(after.calls(), 0);
    }

    #[tokio::test]
    async fn test_forwarding_runs_before_handlers() {
        let fixtures = Fixtures::generate();
        let der = fixtures.self_signed_client();
        let forwarding = CertificateForwarding::new(&ForwardingConfig::default()).unwrap();
        let pipeline = AuthenticationPipeline::new("none")
            .with_forwarding(forwarding)
            .with_handler(StubHandler::new("none", Ok(AuthenticateResult::NoResult)));

        let (mut parts, ()) = Request::builder()
            .header("X-Client-Cert", BASE64_STANDARD.encode(der.as_slice()))
            .body(())
            .unwrap()
            .into_parts();
        pipeline.authenticate(&mut parts).await.unwrap();

        assert_eq!(
            parts.extensions.get::<PeerCertificate>(),
            Some(&PeerCertificate(der))
        );
    }

    #[test]
    fn test_challenge_uses_default_scheme() {
        let pipeline = AuthenticationPipeline::new("default")
            .with_handler(StubHandler::succeeding("other"))
            .with_handler(StubHandler::succeeding("default"));

        let mut response = response();
        pipeline.challenge(&parts(), &mut response).unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unknown_default_scheme() {
        let pipeline =
            AuthenticationPipeline::new("missing").with_handler(StubHandler::succeeding("other"));

        assert!(matches!(pipeline.validate(), Err(Error::Configuration(_))));
        assert!(matches!(
            pipeline.challenge(&parts(), &mut response()),
            Err(Error::Configuration(_))
        ));
    }
}
