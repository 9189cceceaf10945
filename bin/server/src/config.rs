//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`RealmSettings`](cluster_login_platform_access::RealmSettings) for
//! the operator-facing realm settings; anything left unset there is filled
//! in by auto-discovery at startup.

use cluster_login_platform_access::RealmSettings;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address and port to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Realm settings; every field is optional and falls back to
    /// auto-discovered defaults.
    #[serde(default)]
    pub realm: RealmSettings,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Where to persist the permission matrix as a JSON snapshot. Unset
    /// means the matrix lives in memory only and is lost on restart.
    #[serde(default)]
    pub policy_snapshot_path: Option<String>,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How long a pending authorization may sit between the initial
    /// redirect and the provider callback, in minutes.
    #[serde(default = "default_pending_ttl_minutes")]
    pub pending_ttl_minutes: i64,

    /// Interval between purges of expired pending authorizations, in seconds.
    #[serde(default = "default_purge_interval_seconds")]
    pub purge_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_pending_ttl_minutes() -> i64 {
    10
}

fn default_purge_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pending_ttl_minutes: default_pending_ttl_minutes(),
            purge_interval_seconds: default_purge_interval_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if present configuration values are invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
