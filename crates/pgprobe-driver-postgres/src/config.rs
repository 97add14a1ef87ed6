//! Connection settings for the PostgreSQL driver

use pgprobe_core::{ProbeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio_postgres::config::Host;

/// TLS negotiation mode, spelled the way libpq spells `sslmode`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl SslMode {
    /// Parses a libpq `sslmode` value; `allow` is treated as `prefer`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "disable" => Some(Self::Disable),
            "allow" | "prefer" => Some(Self::Prefer),
            "require" => Some(Self::Require),
            "verify-ca" | "verify_ca" => Some(Self::VerifyCa),
            "verify-full" | "verify_full" => Some(Self::VerifyFull),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }

    pub fn uses_tls(&self) -> bool {
        *self != Self::Disable
    }

    /// The wire-level mode handed to tokio-postgres; certificate checks are
    /// enforced by the TLS connector rather than the protocol setting
    pub(crate) fn to_wire(self) -> tokio_postgres::config::SslMode {
        match self {
            Self::Disable => tokio_postgres::config::SslMode::Disable,
            Self::Prefer => tokio_postgres::config::SslMode::Prefer,
            Self::Require | Self::VerifyCa | Self::VerifyFull => {
                tokio_postgres::config::SslMode::Require
            }
        }
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to connect.
///
/// Deserializes from a `[database]` TOML table; every key is optional.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
    /// PEM file with the root certificate to trust
    pub ssl_ca_cert: Option<PathBuf>,
    /// PEM client certificate, used together with `ssl_client_key`
    pub ssl_client_cert: Option<PathBuf>,
    /// PKCS#8 PEM client key
    pub ssl_client_key: Option<PathBuf>,
    pub application_name: String,
    pub connect_timeout_secs: Option<u64>,
    /// Applied with `SET statement_timeout` right after connecting
    pub statement_timeout_ms: Option<u64>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: None,
            password: None,
            ssl_mode: SslMode::default(),
            ssl_ca_cert: None,
            ssl_client_cert: None,
            ssl_client_key: None,
            application_name: "pgprobe".to_string(),
            connect_timeout_secs: None,
            statement_timeout_ms: None,
        }
    }
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_mode", &self.ssl_mode)
            .field("ssl_ca_cert", &self.ssl_ca_cert)
            .field("ssl_client_cert", &self.ssl_client_cert)
            .field("ssl_client_key", &self.ssl_client_key)
            .field("application_name", &self.application_name)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

impl PostgresConfig {
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    /// Reads a libpq key/value string (`host=... dbname=...`) or a
    /// `postgresql://` URL
    pub fn from_connection_string(s: &str) -> Result<Self> {
        let parsed = tokio_postgres::Config::from_str(s).map_err(|e| {
            ProbeError::Configuration(format!("Invalid connection string: {}", e))
        })?;

        let mut config = Self::default();
        if let Some(host) = parsed.get_hosts().iter().find_map(|h| match h {
            Host::Tcp(name) => Some(name.clone()),
            #[allow(unreachable_patterns)]
            _ => None,
        }) {
            config.host = host;
        }
        if let Some(port) = parsed.get_ports().first() {
            config.port = *port;
        }
        if let Some(dbname) = parsed.get_dbname() {
            config.database = dbname.to_string();
        }
        config.user = parsed.get_user().map(String::from);
        config.password = parsed
            .get_password()
            .map(|p| String::from_utf8_lossy(p).into_owned());
        if let Some(name) = parsed.get_application_name() {
            config.application_name = name.to_string();
        }
        config.connect_timeout_secs = parsed.get_connect_timeout().map(|d| d.as_secs());
        config.ssl_mode = match parsed.get_ssl_mode() {
            tokio_postgres::config::SslMode::Disable => SslMode::Disable,
            tokio_postgres::config::SslMode::Require => SslMode::Require,
            _ => SslMode::Prefer,
        };

        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: Option<String>) -> Self {
        self.user = Some(user.into());
        self.password = password;
        self
    }

    pub fn with_ssl_mode(mut self, mode: SslMode) -> Self {
        self.ssl_mode = mode;
        self
    }

    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_cert = Some(path.into());
        self
    }

    pub fn with_client_identity(
        mut self,
        cert: impl Into<PathBuf>,
        key: impl Into<PathBuf>,
    ) -> Self {
        self.ssl_client_cert = Some(cert.into());
        self.ssl_client_key = Some(key.into());
        self
    }

    pub fn with_statement_timeout_ms(mut self, ms: u64) -> Self {
        self.statement_timeout_ms = Some(ms);
        self
    }

    pub fn with_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = Some(secs);
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("port must be non-zero".to_string());
        }
        if self.database.trim().is_empty() {
            return Err("database must not be empty".to_string());
        }
        if self.ssl_client_cert.is_some() != self.ssl_client_key.is_some() {
            return Err("ssl_client_cert and ssl_client_key must be set together".to_string());
        }
        if !self.ssl_mode.uses_tls()
            && (self.ssl_ca_cert.is_some() || self.ssl_client_cert.is_some())
        {
            return Err("certificates are configured but ssl_mode is disable".to_string());
        }
        Ok(())
    }

    /// Builds the tokio-postgres configuration
    pub(crate) fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .application_name(&self.application_name)
            .ssl_mode(self.ssl_mode.to_wire());

        if let Some(user) = &self.user {
            config.user(user);
        }
        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout(Duration::from_secs(secs));
        }
        config
    }
}
