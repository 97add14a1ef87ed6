use super::*;
use indoc::indoc;
use pgprobe_driver_postgres::SslMode;
use pretty_assertions::assert_eq;

#[test]
fn test_empty_document_is_all_defaults() {
    assert_eq!(ProbeConfig::from_toml_str("").unwrap(), ProbeConfig::default());
}

#[test]
fn test_partial_sections_keep_other_defaults() {
    let config = ProbeConfig::from_toml_str(indoc! {r#"
        [analyzer]
        seq_scan_min_rows = 50000
        cost_significance_ratio = 0.3

        [comparator]
        tolerance = 1e-9

        [prober]
        min_improvement_pct = 20.0
    "#})
    .unwrap();

    assert_eq!(config.analyzer.seq_scan_min_rows, 50_000);
    assert_eq!(config.analyzer.cost_significance_ratio, 0.3);
    assert_eq!(config.analyzer.sort_high_cost, 100_000.0);
    assert_eq!(config.comparator.tolerance, 1e-9);
    assert_eq!(config.comparator.max_examples, 3);
    assert_eq!(config.prober.min_improvement_pct, 20.0);
    assert_eq!(config.database, None);
}

#[test]
fn test_database_section() {
    let config = ProbeConfig::from_toml_str(indoc! {r#"
        [database]
        host = "db.internal"
        database = "shop"
        user = "reporter"
        ssl_mode = "verify-full"
        statement_timeout_ms = 15000
    "#})
    .unwrap();

    let database = config.database.unwrap();
    assert_eq!(database.host, "db.internal");
    assert_eq!(database.port, 5432);
    assert_eq!(database.user.as_deref(), Some("reporter"));
    assert_eq!(database.ssl_mode, SslMode::VerifyFull);
    assert_eq!(database.statement_timeout_ms, Some(15_000));
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = ProbeConfig::from_toml_str(indoc! {r#"
        [analyzer]
        seq_scan_rows = 10
    "#})
    .unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");

    let err = ProbeConfig::from_toml_str("[planner]\nenabled = true\n").unwrap_err();
    assert!(matches!(err, ProbeError::Configuration(_)));
}

#[test]
fn test_out_of_range_values_name_their_section() {
    let err = ProbeConfig::from_toml_str(indoc! {r#"
        [prober]
        min_improvement_pct = 250.0
    "#})
    .unwrap_err();
    assert!(err.to_string().contains("[prober]"));

    let err = ProbeConfig::from_toml_str(indoc! {r#"
        [analyzer]
        estimate_error_ratio = 0.5
    "#})
    .unwrap_err();
    assert!(err.to_string().contains("[analyzer]"));
}

#[test]
fn test_toml_round_trip() {
    let config = ProbeConfig::new()
        .with_prober(ProberConfig::new().with_min_improvement_pct(15.0))
        .with_database(PostgresConfig::new("db", "shop"));

    let text = config.to_toml_string().unwrap();
    assert_eq!(ProbeConfig::from_toml_str(&text).unwrap(), config);
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let config = ProbeConfig::load("/nonexistent/pgprobe/pgprobe.toml").unwrap();
    assert_eq!(config, ProbeConfig::default());
}

#[test]
fn test_load_reads_file() {
    let path = std::env::temp_dir().join(format!("pgprobe-config-{}.toml", std::process::id()));
    std::fs::write(&path, "[comparator]\norder_sensitive = true\n").unwrap();

    let config = ProbeConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert!(config.comparator.order_sensitive);
}
