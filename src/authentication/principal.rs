use serde::{Deserialize, Serialize};

pub const DEFAULT_ISSUER: &str = "LOCAL AUTHORITY";

pub mod claim_types {
    pub const NAME_IDENTIFIER: &str = "nameidentifier";
    pub const NAME: &str = "name";
    pub const THUMBPRINT: &str = "thumbprint";
    pub const X500_DISTINGUISHED_NAME: &str = "x500distinguishedname";
    pub const SERIAL_NUMBER: &str = "serialnumber";
    pub const DNS: &str = "dns";
    pub const EMAIL: &str = "emailaddress";
    pub const URI: &str = "uri";
}

/// An attested fact about a principal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
    pub issuer: String,
}

impl Claim {
    pub fn new(claim_type: &str, value: impl Into<String>, issuer: &str) -> Self {
        Self {
            claim_type: claim_type.to_string(),
            value: value.into(),
            issuer: issuer.to_string(),
        }
    }
}

/// Authenticated identity handed to authorization logic.
///
/// Claims keep their insertion order; nothing here checks where they came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub authentication_type: String,
    pub claims: Vec<Claim>,
}

impl Principal {
    pub fn new(authentication_type: &str) -> Self {
        Self {
            authentication_type: authentication_type.to_string(),
            claims: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    pub fn name(&self) -> Option<&str> {
        self.find_first(claim_types::NAME).map(|c| c.value.as_str())
    }
}
