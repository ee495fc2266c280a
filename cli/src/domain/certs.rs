//! Server certificate request construction.

use std::path::PathBuf;

use crate::domain::host::AuthOptions;

/// RSA modulus size for generated server keys.
pub const SERVER_KEY_BITS: usize = 2048;

/// Loopback identities every server certificate carries.
pub const LOOPBACK_SANS: [&str; 2] = ["localhost", "127.0.0.1"];

/// Caller SANs followed by the machine IP and the loopback names.
///
/// Order is preserved and duplicates are kept.
#[must_use]
pub fn server_cert_hosts(sans: &[String], ip: &str) -> Vec<String> {
    let mut hosts = Vec::with_capacity(sans.len() + 1 + LOOPBACK_SANS.len());
    hosts.extend_from_slice(sans);
    hosts.push(ip.to_string());
    hosts.extend(LOOPBACK_SANS.iter().map(|h| (*h).to_string()));
    hosts
}

/// `<local-username>.<machine-name>`.
#[must_use]
pub fn cert_organization(username: &str, machine_name: &str) -> String {
    format!("{username}.{machine_name}")
}

/// Everything needed to issue one server certificate from the local CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCertRequest {
    pub hosts: Vec<String>,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    pub ca_file: PathBuf,
    pub ca_key_file: PathBuf,
    pub org: String,
    pub bits: usize,
}

impl ServerCertRequest {
    #[must_use]
    pub fn new(auth: &AuthOptions, ip: &str, username: &str, machine_name: &str) -> Self {
        Self {
            hosts: server_cert_hosts(&auth.server_cert_sans, ip),
            cert_file: auth.server_cert_path.clone(),
            key_file: auth.server_key_path.clone(),
            ca_file: auth.ca_cert_path.clone(),
            ca_key_file: auth.ca_private_key_path.clone(),
            org: cert_organization(username, machine_name),
            bits: SERVER_KEY_BITS,
        }
    }
}
