use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

/// Extended key usage purposes relevant to client authentication.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KeyPurposes {
    pub client_auth: bool,
    pub server_auth: bool,
}

/// Owned summary of a presented client certificate.
#[derive(Clone, Debug, Serialize)]
pub struct ClientCertificate {
    #[serde(skip)]
    pub der: Arc<Vec<u8>>,
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub thumbprint: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub common_names: Vec<String>,
    pub organizations: Vec<String>,
    pub dns_names: Vec<String>,
    pub emails: Vec<String>,
    pub uris: Vec<String>,
    /// `None` when the certificate carries no extended key usage extension.
    pub extended_key_usage: Option<KeyPurposes>,
    pub self_signed: bool,
    #[serde(skip)]
    pub(crate) self_signature_valid: bool,
}

impl ClientCertificate {
    #[instrument(skip(der))]
    pub fn from_der(der: Arc<Vec<u8>>) -> Result<Self, String> {
        let (_, cert) = X509Certificate::from_der(&der)
            .map_err(|e| format!("Malformed client certificate: {e}"))?;

        let subject = cert.subject();
        let issuer = cert.issuer();
        let self_signed = subject.as_raw() == issuer.as_raw();

        let self_signature_valid = self_signed && cert.verify_signature(None).is_ok();
        if self_signed && !self_signature_valid {
            debug!("Self-signed certificate does not verify against its own key");
        }

        let extended_key_usage = cert
            .extended_key_usage()
            .map_err(|e| format!("Malformed extended key usage extension: {e}"))?
            .map(|eku| KeyPurposes {
                client_auth: eku.value.client_auth,
                server_auth: eku.value.server_auth,
            });

        let (dns_names, mut emails, uris) = Self::subject_alternative_names(&cert)?;
        emails.extend(
            subject
                .iter_email()
                .filter_map(|e| e.as_str().ok().map(String::from)),
        );

        let validity = cert.validity();
        let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0)
            .ok_or_else(|| "Certificate notBefore is out of range".to_string())?;
        let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0)
            .ok_or_else(|| "Certificate notAfter is out of range".to_string())?;

        Ok(Self {
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            serial_number: hex::encode_upper(cert.raw_serial()),
            thumbprint: hex::encode_upper(Sha256::digest(der.as_slice())),
            not_before,
            not_after,
            common_names: subject
                .iter_common_name()
                .filter_map(|cn| cn.as_str().ok().map(String::from))
                .collect(),
            organizations: subject
                .iter_organization()
                .filter_map(|o| o.as_str().ok().map(String::from))
                .collect(),
            dns_names,
            emails,
            uris,
            extended_key_usage,
            self_signed,
            self_signature_valid,
            der,
        })
    }

    #[allow(clippy::type_complexity)]
    fn subject_alternative_names(
        cert: &X509Certificate,
    ) -> Result<(Vec<String>, Vec<String>, Vec<String>), String> {
        let mut dns_names = Vec::new();
        let mut emails = Vec::new();
        let mut uris = Vec::new();

        let san = cert
            .subject_alternative_name()
            .map_err(|e| format!("Malformed subject alternative name extension: {e}"))?;

        if let Some(san) = san {
            for name in &san.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => dns_names.push((*dns).to_string()),
                    GeneralName::RFC822Name(email) => emails.push((*email).to_string()),
                    GeneralName::URI(uri) => uris.push((*uri).to_string()),
                    _ => {}
                }
            }
        }

        Ok((dns_names, emails, uris))
    }
}
