//! Certificate loading for TLS listeners.

use std::io;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

fn ensure_file(path: &Path, kind: &str) -> io::Result<()> {
    if path.is_file() {
        return Ok(());
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found at {}", kind, path.display()),
    ))
}

/// Read the PEM certificate chain and private key named in `config`.
pub async fn load_tls_config(config: &TlsConfig) -> io::Result<RustlsConfig> {
    ensure_file(Path::new(&config.cert_path), "TLS certificate")?;
    ensure_file(Path::new(&config.key_path), "TLS private key")?;

    RustlsConfig::from_pem_file(&config.cert_path, &config.key_path).await
}
