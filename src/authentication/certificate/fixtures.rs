//! Test certificates minted into a directory and loaded back as owned DER blobs.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use rcgen::{
    date_time_ymd, BasicConstraints, Certificate, CertificateParams,
    CertificateRevocationListParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyIdMethod, KeyPair, KeyUsagePurpose, RevocationReason, RevokedCertParams, SerialNumber,
};

pub const SELF_SIGNED_CLIENT: &str = "validSelfSignedClientEkuCertificate";
pub const SELF_SIGNED_NO_EKU: &str = "validSelfSignedNoEkuCertificate";
pub const SELF_SIGNED_SERVER: &str = "validSelfSignedServerEkuCertificate";
pub const SELF_SIGNED_EXPIRED: &str = "selfSignedExpiredCertificate";
pub const SELF_SIGNED_NOT_YET_VALID: &str = "selfSignedNotYetValidCertificate";
pub const ROOT_CA: &str = "rootCertificate";
pub const CHAINED_CLIENT: &str = "validChainedClientCertificate";
pub const CHAINED_REVOKED: &str = "revokedChainedClientCertificate";
pub const UNTRUSTED_CHAINED_CLIENT: &str = "untrustedChainedClientCertificate";
pub const ROOT_CRL: &str = "rootRevocationList";

const REVOKED_SERIAL: [u8; 2] = [0x0B, 0xAD];

pub struct Fixtures {
    blobs: HashMap<String, Vec<u8>>,
}

impl Fixtures {
    /// Mint a fresh set into a temporary directory and load it back.
    pub fn generate() -> Self {
        let dir = tempfile::tempdir().expect("failed to create fixture directory");
        mint(dir.path()).expect("failed to mint fixture certificates");
        Self::load(dir.path()).expect("failed to load fixture certificates")
    }

    /// Load every `*.der` file in `dir`, keyed by file stem.
    pub fn load(dir: &Path) -> io::Result<Self> {
        let mut blobs = HashMap::new();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("der") {
                continue;
            }

            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                blobs.insert(stem.to_string(), fs::read(&path)?);
            }
        }

        Ok(Self { blobs })
    }

    pub fn get(&self, name: &str) -> Arc<Vec<u8>> {
        let blob = self
            .blobs
            .get(name)
            .unwrap_or_else(|| panic!("missing fixture {name}"));
        Arc::new(blob.clone())
    }

    pub fn self_signed_client(&self) -> Arc<Vec<u8>> {
        self.get(SELF_SIGNED_CLIENT)
    }

    pub fn self_signed_no_eku(&self) -> Arc<Vec<u8>> {
        self.get(SELF_SIGNED_NO_EKU)
    }

    pub fn self_signed_server(&self) -> Arc<Vec<u8>> {
        self.get(SELF_SIGNED_SERVER)
    }

    pub fn self_signed_expired(&self) -> Arc<Vec<u8>> {
        self.get(SELF_SIGNED_EXPIRED)
    }

    pub fn self_signed_not_yet_valid(&self) -> Arc<Vec<u8>> {
        self.get(SELF_SIGNED_NOT_YET_VALID)
    }

    pub fn root(&self) -> Arc<Vec<u8>> {
        self.get(ROOT_CA)
    }

    pub fn chained_client(&self) -> Arc<Vec<u8>> {
        self.get(CHAINED_CLIENT)
    }

    pub fn chained_revoked(&self) -> Arc<Vec<u8>> {
        self.get(CHAINED_REVOKED)
    }

    pub fn untrusted_chained_client(&self) -> Arc<Vec<u8>> {
        self.get(UNTRUSTED_CHAINED_CLIENT)
    }

    pub fn root_crl(&self) -> Arc<Vec<u8>> {
        self.get(ROOT_CRL)
    }
}

fn leaf_params(
    common_name: &str,
    purposes: Vec<ExtendedKeyUsagePurpose>,
    validity: ((i32, u8, u8), (i32, u8, u8)),
) -> CertificateParams {
    let mut params = CertificateParams::new(vec!["client.example.com".to_string()])
        .expect("valid subject alternative names");

    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name.push(DnType::OrganizationName, "Test Org");
    params.distinguished_name = name;
    params.extended_key_usages = purposes;

    let ((from_y, from_m, from_d), (to_y, to_m, to_d)) = validity;
    params.not_before = date_time_ymd(from_y, from_m, from_d);
    params.not_after = date_time_ymd(to_y, to_m, to_d);
    params
}

fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();

    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    params.distinguished_name = name;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(2099, 1, 1);
    params
}

fn self_signed(params: CertificateParams) -> Result<Vec<u8>, rcgen::Error> {
    let key = KeyPair::generate()?;
    Ok(params.self_signed(&key)?.der().to_vec())
}

fn signed_by(
    params: CertificateParams,
    issuer: &Certificate,
    issuer_key: &KeyPair,
) -> Result<Vec<u8>, rcgen::Error> {
    let key = KeyPair::generate()?;
    Ok(params.signed_by(&key, issuer, issuer_key)?.der().to_vec())
}

fn write(dir: &Path, name: &str, der: &[u8]) -> io::Result<()> {
    fs::write(dir.join(format!("{name}.der")), der)
}

/// Write the full fixture set as DER files into `dir`.
pub fn mint(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let current = ((2020, 1, 1), (2099, 1, 1));
    let client = || vec![ExtendedKeyUsagePurpose::ClientAuth];

    write(
        dir,
        SELF_SIGNED_CLIENT,
        &self_signed(leaf_params(SELF_SIGNED_CLIENT, client(), current))?,
    )?;
    write(
        dir,
        SELF_SIGNED_NO_EKU,
        &self_signed(leaf_params(SELF_SIGNED_NO_EKU, vec![], current))?,
    )?;
    write(
        dir,
        SELF_SIGNED_SERVER,
        &self_signed(leaf_params(
            SELF_SIGNED_SERVER,
            vec![ExtendedKeyUsagePurpose::ServerAuth],
            current,
        ))?,
    )?;
    write(
        dir,
        SELF_SIGNED_EXPIRED,
        &self_signed(leaf_params(
            SELF_SIGNED_EXPIRED,
            client(),
            ((2000, 1, 1), (2001, 1, 1)),
        ))?,
    )?;
    write(
        dir,
        SELF_SIGNED_NOT_YET_VALID,
        &self_signed(leaf_params(
            SELF_SIGNED_NOT_YET_VALID,
            client(),
            ((2090, 1, 1), (2099, 1, 1)),
        ))?,
    )?;

    let root_key = KeyPair::generate()?;
    let root = ca_params("Test Root CA").self_signed(&root_key)?;
    write(dir, ROOT_CA, root.der().as_ref())?;

    write(
        dir,
        CHAINED_CLIENT,
        &signed_by(leaf_params(CHAINED_CLIENT, client(), current), &root, &root_key)?,
    )?;

    let mut revoked = leaf_params(CHAINED_REVOKED, client(), current);
    revoked.serial_number = Some(SerialNumber::from(REVOKED_SERIAL.to_vec()));
    write(dir, CHAINED_REVOKED, &signed_by(revoked, &root, &root_key)?)?;

    let crl = CertificateRevocationListParams {
        this_update: date_time_ymd(2021, 1, 1),
        next_update: date_time_ymd(2098, 1, 1),
        crl_number: SerialNumber::from(vec![1]),
        issuing_distribution_point: None,
        revoked_certs: vec![RevokedCertParams {
            serial_number: SerialNumber::from(REVOKED_SERIAL.to_vec()),
            revocation_time: date_time_ymd(2021, 1, 1),
            reason_code: Some(RevocationReason::KeyCompromise),
            invalidity_date: None,
        }],
        key_identifier_method: KeyIdMethod::Sha256,
    }
    .signed_by(&root, &root_key)?;
    write(dir, ROOT_CRL, crl.der().as_ref())?;

    let rogue_key = KeyPair::generate()?;
    let rogue = ca_params("Rogue Root CA").self_signed(&rogue_key)?;
    write(
        dir,
        UNTRUSTED_CHAINED_CLIENT,
        &signed_by(
            leaf_params(UNTRUSTED_CHAINED_CLIENT, client(), current),
            &rogue,
            &rogue_key,
        )?,
    )?;

    Ok(())
}
