//! Shared mTLS configuration, used by both the Node's client transport and
//! the Sink's accept loop.
//!
//! Grounded on `original_source/internal/infrastructure/tlsconfig/config.go`.

use crate::error::ConfigError;
use clap::Args;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Args)]
pub struct TlsArgs {
    /// Enable TLS/mTLS for transport.
    #[arg(long = "tls-enabled", default_value_t = true)]
    pub enabled: bool,

    /// Path to CA certificate (PEM).
    #[arg(long = "tls-ca", default_value = "certs/ca/ca.pem")]
    pub ca_cert_path: PathBuf,

    /// Path to this peer's certificate (PEM).
    #[arg(long = "tls-cert", default_value = "certs/node/node.pem")]
    pub cert_path: PathBuf,

    /// Path to this peer's private key (PEM).
    #[arg(long = "tls-key", default_value = "certs/node/node.key")]
    pub key_path: PathBuf,

    /// TLS server name override.
    #[arg(long = "tls-server-name", default_value = "telemetry-sink")]
    pub server_name: String,

    /// Skip TLS verification. Development only.
    #[arg(long = "tls-insecure", default_value_t = false)]
    pub insecure_skip_verify: bool,
}

impl TlsArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.ca_cert_path.as_os_str().is_empty()
            || self.cert_path.as_os_str().is_empty()
            || self.key_path.as_os_str().is_empty()
        {
            return Err(ConfigError::TlsIncomplete);
        }
        Ok(())
    }
}

fn load_cert_chain(path: &Path) -> std::io::Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let f = std::fs::File::open(path)?;
    let mut reader = BufReader::new(f);
    rustls_pemfile::certs(&mut reader).collect()
}

fn load_private_key(path: &Path) -> std::io::Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let f = std::fs::File::open(path)?;
    let mut reader = BufReader::new(f);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "no private key found"))
}

/// Build a client-side `rustls::ClientConfig` for the Node's outbound
/// transport. Returns `None` when TLS is disabled.
pub fn client_tls_config(cfg: &TlsArgs) -> Result<Option<Arc<rustls::ClientConfig>>, ConfigError> {
    if !cfg.enabled {
        return Ok(None);
    }
    cfg.validate()?;

    let certs = load_cert_chain(&cfg.cert_path).map_err(|_| ConfigError::TlsIncomplete)?;
    let key = load_private_key(&cfg.key_path).map_err(|_| ConfigError::TlsIncomplete)?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in load_cert_chain(&cfg.ca_cert_path).map_err(|_| ConfigError::TlsIncomplete)? {
        roots.add(cert).map_err(|_| ConfigError::TlsIncomplete)?;
    }

    let mut client_config = if cfg.insecure_skip_verify {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoServerVerification))
            .with_client_auth_cert(certs, key)
            .map_err(|_| ConfigError::TlsIncomplete)?
    } else {
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .map_err(|_| ConfigError::TlsIncomplete)?
    };
    client_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Some(Arc::new(client_config)))
}

/// Dev-only verifier wired up behind `--tls-insecure`.
#[derive(Debug)]
struct NoServerVerification;

impl rustls::client::danger::ServerCertVerifier for NoServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Build a server-side `rustls::ServerConfig` requiring client certs,
/// for the Sink's accept loop. Returns `None` when TLS is disabled.
pub fn server_tls_config(cfg: &TlsArgs) -> Result<Option<Arc<rustls::ServerConfig>>, ConfigError> {
    if !cfg.enabled {
        return Ok(None);
    }
    cfg.validate()?;

    let certs = load_cert_chain(&cfg.cert_path).map_err(|_| ConfigError::TlsIncomplete)?;
    let key = load_private_key(&cfg.key_path).map_err(|_| ConfigError::TlsIncomplete)?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in load_cert_chain(&cfg.ca_cert_path).map_err(|_| ConfigError::TlsIncomplete)? {
        roots.add(cert).map_err(|_| ConfigError::TlsIncomplete)?;
    }
    let client_verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|_| ConfigError::TlsIncomplete)?;

    let server_config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(certs, key)
        .map_err(|_| ConfigError::TlsIncomplete)?;

    Ok(Some(Arc::new(server_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tls_skips_validation() {
        let cfg = TlsArgs {
            enabled: false,
            ca_cert_path: PathBuf::new(),
            cert_path: PathBuf::new(),
            key_path: PathBuf::new(),
            server_name: String::new(),
            insecure_skip_verify: false,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn enabled_tls_rejects_missing_paths() {
        let cfg = TlsArgs {
            enabled: true,
            ca_cert_path: PathBuf::new(),
            cert_path: PathBuf::new(),
            key_path: PathBuf::new(),
            server_name: String::new(),
            insecure_skip_verify: false,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::TlsIncomplete)));
    }
}
