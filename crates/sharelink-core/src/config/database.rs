//! Database configuration.

use serde::{Deserialize, Serialize};

/// TLS negotiation mode for the provisioning connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Plain TCP.
    Disable,
    /// TLS if the server offers it.
    Prefer,
    /// TLS is mandatory, certificate not verified.
    #[default]
    Require,
    /// TLS with CA verification.
    VerifyCa,
    /// TLS with CA and host name verification.
    VerifyFull,
}

/// Connection settings for the single provisioning connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL, normally taken from `DATABASE_URL`.
    #[serde(default)]
    pub url: Option<String>,
    /// TLS mode. Overrides any `sslmode` in the URL.
    #[serde(default)]
    pub ssl_mode: SslMode,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            ssl_mode: SslMode::default(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    10
}
