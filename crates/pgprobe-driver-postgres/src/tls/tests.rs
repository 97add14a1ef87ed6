use super::*;
use std::path::PathBuf;

#[test]
fn test_disable_mode_has_no_connector() {
    let config = PostgresConfig::default().with_ssl_mode(SslMode::Disable);
    assert!(matches!(
        make_tls_connector(&config),
        Err(ProbeError::Configuration(_))
    ));
}

#[test]
fn test_missing_ca_certificate_is_a_connection_failure() {
    let config = PostgresConfig::default()
        .with_ssl_mode(SslMode::VerifyFull)
        .with_ca_cert(PathBuf::from("/nonexistent/pgprobe/root.crt"));

    let err = make_tls_connector(&config).err().unwrap();
    assert!(matches!(err, ProbeError::ConnectionFailure(_)));
    assert!(err.to_string().contains("CA certificate"));
}

#[test]
fn test_missing_client_key_is_a_connection_failure() {
    let config = PostgresConfig::default()
        .with_ssl_mode(SslMode::Require)
        .with_client_identity("/nonexistent/client.crt", "/nonexistent/client.key");

    let err = make_tls_connector(&config).err().unwrap();
    assert!(err.to_string().contains("client certificate"));
}
