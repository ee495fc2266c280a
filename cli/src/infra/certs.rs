//! Local certificate authority and server certificate issuance (rcgen).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose, PKCS_RSA_SHA256, RsaKeySize, SanType,
};

use crate::application::ports::CertGenerator;
use crate::domain::certs::{SERVER_KEY_BITS, ServerCertRequest};
use crate::infra::fs::write_atomic;

/// CA and client credential locations under the certs directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaPaths {
    pub ca_cert: PathBuf,
    pub ca_key: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl CaPaths {
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            ca_cert: dir.join("ca.pem"),
            ca_key: dir.join("ca-key.pem"),
            client_cert: dir.join("cert.pem"),
            client_key: dir.join("key.pem"),
        }
    }
}

fn rsa_key(bits: usize) -> Result<KeyPair> {
    let size = match bits {
        2048 => RsaKeySize::_2048,
        3072 => RsaKeySize::_3072,
        4096 => RsaKeySize::_4096,
        other => anyhow::bail!("unsupported RSA key size {other}"),
    };
    KeyPair::generate_rsa_for(&PKCS_RSA_SHA256, size).context("generating RSA key")
}

fn organization(org: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, org);
    dn
}

fn load_issuer(ca_cert: &Path, ca_key: &Path) -> Result<Issuer<'static, KeyPair>> {
    let cert_pem = std::fs::read_to_string(ca_cert)
        .with_context(|| format!("reading CA cert {}", ca_cert.display()))?;
    let key_pem = std::fs::read_to_string(ca_key)
        .with_context(|| format!("reading CA key {}", ca_key.display()))?;
    let key = KeyPair::from_pem(&key_pem).context("parsing CA key")?;
    Issuer::from_ca_cert_pem(&cert_pem, key).context("loading CA certificate")
}

fn san(host: &str) -> Result<SanType> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(SanType::IpAddress(ip));
    }
    let name = host
        .to_string()
        .try_into()
        .with_context(|| format!("invalid DNS name {host:?}"))?;
    Ok(SanType::DnsName(name))
}

/// Creates the CA and the client certificate when they do not exist yet.
/// Existing material is never touched. Returns true when anything was created.
///
/// # Errors
///
/// Returns an error if key generation, signing or writing fails.
pub fn ensure_ca(paths: &CaPaths, org: &str) -> Result<bool> {
    let mut created = false;
    if !paths.ca_cert.exists() || !paths.ca_key.exists() {
        tracing::info!(path = %paths.ca_cert.display(), "creating local CA");
        let key = rsa_key(SERVER_KEY_BITS)?;
        let mut params = CertificateParams::default();
        params.distinguished_name = organization(org);
        params.distinguished_name.push(DnType::CommonName, "kmachineCA");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let cert = params.self_signed(&key).context("self-signing CA")?;
        write_atomic(&paths.ca_key, key.serialize_pem().as_bytes())?;
        write_atomic(&paths.ca_cert, cert.pem().as_bytes())?;
        created = true;
    }

    if !paths.client_cert.exists() || !paths.client_key.exists() {
        tracing::info!(path = %paths.client_cert.display(), "creating client certificate");
        let issuer = load_issuer(&paths.ca_cert, &paths.ca_key)?;
        let key = rsa_key(SERVER_KEY_BITS)?;
        let mut params = CertificateParams::default();
        params.distinguished_name = organization(org);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        let cert = params.signed_by(&key, &issuer).context("signing client cert")?;
        write_atomic(&paths.client_key, key.serialize_pem().as_bytes())?;
        write_atomic(&paths.client_cert, cert.pem().as_bytes())?;
        created = true;
    }
    Ok(created)
}

/// Issues server certificates from the CA files named in each request.
pub struct RcgenCertGenerator;

impl CertGenerator for RcgenCertGenerator {
    fn generate_server_cert(&self, request: &ServerCertRequest) -> Result<()> {
        let issuer = load_issuer(&request.ca_file, &request.ca_key_file)?;
        let key = rsa_key(request.bits)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = organization(&request.org);
        params.subject_alt_names = request
            .hosts
            .iter()
            .map(|h| san(h))
            .collect::<Result<Vec<_>>>()?;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
            KeyUsagePurpose::KeyAgreement,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let cert = params
            .signed_by(&key, &issuer)
            .context("signing server cert")?;
        write_atomic(&request.key_file, key.serialize_pem().as_bytes())?;
        write_atomic(&request.cert_file, cert.pem().as_bytes())?;
        Ok(())
    }
}
