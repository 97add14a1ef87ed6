//! TLS connector construction for `sslmode` values other than `disable`

use crate::config::{PostgresConfig, SslMode};
use native_tls::{Certificate, Identity, TlsConnector, TlsConnectorBuilder};
use pgprobe_core::{ProbeError, Result};
use postgres_native_tls::MakeTlsConnector;
use std::fs;
use std::path::Path;

/// Builds a connector whose certificate checks follow `config.ssl_mode`.
///
/// `prefer` and `require` without a CA certificate accept any server
/// certificate, matching libpq. `verify-ca` checks the chain but not the host
/// name; `verify-full` checks both.
pub(crate) fn make_tls_connector(config: &PostgresConfig) -> Result<MakeTlsConnector> {
    if !config.ssl_mode.uses_tls() {
        return Err(ProbeError::Configuration(
            "TLS connector requested with ssl_mode disable".into(),
        ));
    }

    let mut builder = TlsConnector::builder();
    configure_verification(&mut builder, config);

    if let Some(ca_path) = &config.ssl_ca_cert {
        apply_ca_cert(&mut builder, ca_path)?;
    }
    if let (Some(cert_path), Some(key_path)) = (&config.ssl_client_cert, &config.ssl_client_key) {
        apply_client_identity(&mut builder, cert_path, key_path)?;
    }

    let connector = builder.build().map_err(|e| {
        ProbeError::ConnectionFailure(format!("Failed to build TLS connector: {}", e))
    })?;
    tracing::debug!(ssl_mode = %config.ssl_mode, "TLS connector built");

    Ok(MakeTlsConnector::new(connector))
}

fn configure_verification(builder: &mut TlsConnectorBuilder, config: &PostgresConfig) {
    match config.ssl_mode {
        SslMode::Disable | SslMode::VerifyFull => {}
        SslMode::Prefer | SslMode::Require => {
            if config.ssl_ca_cert.is_none() {
                builder.danger_accept_invalid_certs(true);
            }
            builder.danger_accept_invalid_hostnames(true);
        }
        SslMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
    }
}

fn apply_ca_cert(builder: &mut TlsConnectorBuilder, path: &Path) -> Result<()> {
    let pem = read_pem(path, "CA certificate")?;
    let cert = Certificate::from_pem(&pem).map_err(|e| {
        ProbeError::ConnectionFailure(format!(
            "Failed to parse CA certificate {}: {}",
            path.display(),
            e
        ))
    })?;
    builder.add_root_certificate(cert);
    Ok(())
}

fn apply_client_identity(
    builder: &mut TlsConnectorBuilder,
    cert_path: &Path,
    key_path: &Path,
) -> Result<()> {
    let cert = read_pem(cert_path, "client certificate")?;
    let key = read_pem(key_path, "client key")?;
    let identity = Identity::from_pkcs8(&cert, &key).map_err(|e| {
        ProbeError::ConnectionFailure(format!(
            "Failed to create identity from certificate and key: {}",
            e
        ))
    })?;
    builder.identity(identity);
    Ok(())
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        ProbeError::ConnectionFailure(format!(
            "Failed to read {} from {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests;
