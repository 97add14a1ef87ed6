use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_db_error_includes_code_and_context() {
    let text = describe_db_error(
        "23505",
        "duplicate key value violates unique constraint \"users_email_key\"",
        Some("Key (email)=(a@b.c) already exists."),
        None,
        None,
    );
    assert_eq!(
        text,
        "duplicate key value violates unique constraint \"users_email_key\" (detail: Key (email)=(a@b.c) already exists.) [SQLSTATE 23505]"
    );
}

#[test]
fn test_db_error_skips_blank_parts() {
    let text = describe_db_error(
        "42P01",
        "relation \"nope\" does not exist",
        Some("  "),
        Some("Check the search_path."),
        Some(""),
    );
    assert_eq!(
        text,
        "relation \"nope\" does not exist (hint: Check the search_path.) [SQLSTATE 42P01]"
    );
}

#[tokio::test]
async fn test_invalid_config_fails_before_connecting() {
    let config = PostgresConfig::new("", "shop");
    let err = PostgresConnection::connect(&config).await.err().unwrap();
    assert_eq!(err.kind(), "ConfigurationError");
}

#[tokio::test]
async fn test_unparseable_connection_string() {
    let err = PostgresConnection::connect_str("host=db port=notaport")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ProbeError::Configuration(_)));
}
