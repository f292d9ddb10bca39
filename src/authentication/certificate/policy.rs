use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::authentication::certificate::{CertificateOptions, CertificateType, ClientCertificate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    CertificateTypeNotAllowed(CertificateType),
    InvalidSignature,
    ServerAuthenticationUsage,
    MissingClientAuthenticationUsage,
    NotYetValid(DateTime<Utc>),
    Expired(DateTime<Utc>),
    UntrustedChain(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Rejection::CertificateTypeNotAllowed(certificate_type) => {
                write!(f, "Certificate type {certificate_type:?} is not allowed")
            }
            Rejection::InvalidSignature => {
                write!(f, "Self-signed certificate signature does not verify")
            }
            Rejection::ServerAuthenticationUsage => {
                write!(f, "Certificate is only valid for server authentication")
            }
            Rejection::MissingClientAuthenticationUsage => {
                write!(f, "Certificate is not valid for client authentication")
            }
            Rejection::NotYetValid(not_before) => {
                write!(f, "Certificate is not valid before {not_before}")
            }
            Rejection::Expired(not_after) => write!(f, "Certificate expired at {not_after}"),
            Rejection::UntrustedChain(reason) => {
                write!(f, "Certificate chain is not trusted: {reason}")
            }
        }
    }
}

impl std::error::Error for Rejection {}

/// Apply the certificate policy, stopping at the first failing check.
pub fn evaluate(
    certificate: &ClientCertificate,
    options: &CertificateOptions,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    let certificate_type = if certificate.self_signed {
        CertificateType::SelfSigned
    } else {
        CertificateType::Chained
    };

    if !options.allows(certificate_type) {
        return Err(Rejection::CertificateTypeNotAllowed(certificate_type));
    }

    if certificate_type == CertificateType::SelfSigned && !certificate.self_signature_valid {
        return Err(Rejection::InvalidSignature);
    }

    if options.validate_certificate_use {
        check_usage(certificate)?;
    }

    if options.validate_validity_period {
        if now < certificate.not_before {
            return Err(Rejection::NotYetValid(certificate.not_before));
        }
        if now > certificate.not_after {
            return Err(Rejection::Expired(certificate.not_after));
        }
    }

    if certificate_type == CertificateType::Chained {
        let at = if options.validate_validity_period {
            now
        } else {
            certificate.not_before
        };

        options
            .chain
            .verify(&certificate.der, at)
            .map_err(Rejection::UntrustedChain)?;
    }

    debug!("Certificate '{}' accepted by policy", certificate.subject);
    Ok(())
}

fn check_usage(certificate: &ClientCertificate) -> Result<(), Rejection> {
    match certificate.extended_key_usage {
        None => Ok(()),
        Some(purposes) if purposes.client_auth => Ok(()),
        Some(purposes) if purposes.server_auth => Err(Rejection::ServerAuthenticationUsage),
        Some(_) => Err(Rejection::MissingClientAuthenticationUsage),
    }
}
