use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::authentication::certificate::ClientCertificate;
use crate::authentication::{
    claim_types, CertificateContext, CertificateValidator, Claim, Fault, Principal, Validation,
};

/// Builds a principal from the certificate itself, optionally restricted to known thumbprints.
pub struct CertificateClaimsValidator {
    allowed_thumbprints: Option<HashSet<String>>,
}

impl CertificateClaimsValidator {
    pub fn new(allowed_thumbprints: &[String]) -> Self {
        let allowed_thumbprints = if allowed_thumbprints.is_empty() {
            None
        } else {
            Some(
                allowed_thumbprints
                    .iter()
                    .map(|thumbprint| normalize(thumbprint))
                    .collect(),
            )
        };

        Self {
            allowed_thumbprints,
        }
    }

    fn is_allowed(&self, certificate: &ClientCertificate) -> bool {
        self.allowed_thumbprints
            .as_ref()
            .is_none_or(|allowed| allowed.contains(&certificate.thumbprint))
    }
}

fn normalize(thumbprint: &str) -> String {
    thumbprint
        .chars()
        .filter(char::is_ascii_hexdigit)
        .collect::<String>()
        .to_ascii_uppercase()
}

pub fn certificate_principal(scheme: &str, certificate: &ClientCertificate) -> Principal {
    let issuer = certificate.issuer.as_str();
    let mut principal = Principal::new(scheme)
        .with_claim(Claim::new(
            claim_types::THUMBPRINT,
            certificate.thumbprint.clone(),
            issuer,
        ))
        .with_claim(Claim::new(
            claim_types::X500_DISTINGUISHED_NAME,
            certificate.subject.clone(),
            issuer,
        ))
        .with_claim(Claim::new(
            claim_types::SERIAL_NUMBER,
            certificate.serial_number.clone(),
            issuer,
        ));

    if let Some(name) = certificate.common_names.first() {
        principal.add_claim(Claim::new(claim_types::NAME, name.clone(), issuer));
    }
    principal.add_claim(Claim::new(
        claim_types::NAME_IDENTIFIER,
        certificate.subject.clone(),
        issuer,
    ));

    for dns in &certificate.dns_names {
        principal.add_claim(Claim::new(claim_types::DNS, dns.clone(), issuer));
    }
    for email in &certificate.emails {
        principal.add_claim(Claim::new(claim_types::EMAIL, email.clone(), issuer));
    }
    for uri in &certificate.uris {
        principal.add_claim(Claim::new(claim_types::URI, uri.clone(), issuer));
    }

    principal
}

#[async_trait]
impl CertificateValidator for CertificateClaimsValidator {
    #[instrument(skip(self, context), fields(subject = %context.certificate.subject))]
    async fn validate_certificate(
        &self,
        context: &CertificateContext,
    ) -> Result<Validation, Fault> {
        if !self.is_allowed(&context.certificate) {
            debug!(
                "Thumbprint {} is not in the allowed list",
                context.certificate.thumbprint
            );
            return Ok(Validation::Fail("Certificate is not allowed".to_string()));
        }

        Ok(Validation::Success(certificate_principal(
            &context.scheme,
            &context.certificate,
        )))
    }
}
