//! TLS listener material.
//!
//! Certificates are handed to axum-server's rustls acceptor as-is; the relay
//! itself never inspects TLS.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;
use crate::net::listener::ListenerError;

fn require_file(path: &Path, what: &str) -> Result<(), ListenerError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ListenerError::Tls(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{what} not found: {}", path.display()),
        )))
    }
}

/// Load the listener's certificate chain and private key (PEM).
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, ListenerError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);
    require_file(cert_path, "certificate file")?;
    require_file(key_path, "private key file")?;

    RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(ListenerError::Tls)
}
