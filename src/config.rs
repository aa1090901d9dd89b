//! Application configuration management.
//!
//! Both the session server and the client hook are configured from
//! environment variables. The `envy` crate deserializes them into type-safe
//! structs; a `.env` file is honoured when present.

use std::path::PathBuf;

use serde::Deserialize;

/// Server configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `CORS_ALLOWED_ORIGINS` (optional): comma-separated origins, `*` or unset allows any
/// - `TRUST_FORWARDED_HEADERS` (optional): derive the requester address from
///   `X-Forwarded-For` / `X-Real-IP`, defaults to true
/// - `EXPIRY_SWEEP_INTERVAL_SECS` (optional): run a periodic expiry sweep in
///   addition to the per-request one
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[serde(default = "default_true")]
    pub trust_forwarded_headers: bool,

    #[serde(default)]
    pub expiry_sweep_interval_secs: Option<u64>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        envy::from_env::<Config>()
    }

    /// Origins accepted by the CORS layer. `None` means any origin.
    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        let raw = self.cors_allowed_origins.as_deref()?.trim();
        if raw.is_empty() || raw == "*" {
            return None;
        }

        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
        )
    }
}

/// Client hook configuration, read from `PARTNER_SESSION_*` variables.
///
/// - `PARTNER_SESSION_ENDPOINT_URL` (required): full URL of the session endpoint
/// - `PARTNER_SESSION_API_KEY` (optional): sent as a bearer token
/// - `PARTNER_SESSION_CACHE_DIR` (optional): where the local mirror lives
/// - `PARTNER_SESSION_REQUEST_TIMEOUT_SECS` (optional): defaults to 10
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub endpoint_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".partner-session")
}

fn default_request_timeout() -> u64 {
    10
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        Self::from_vars(std::env::vars())
    }

    /// Read the `PARTNER_SESSION_*` entries out of `vars`.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("PARTNER_SESSION_").from_iter(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_origins(origins: Option<&str>) -> Config {
        Config {
            database_url: "postgres://localhost/test".to_string(),
            server_port: 3000,
            cors_allowed_origins: origins.map(String::from),
            trust_forwarded_headers: true,
            expiry_sweep_interval_secs: None,
        }
    }

    #[test]
    fn wildcard_or_missing_origins_allow_any() {
        assert_eq!(config_with_origins(None).allowed_origins(), None);
        assert_eq!(config_with_origins(Some("*")).allowed_origins(), None);
        assert_eq!(config_with_origins(Some("  ")).allowed_origins(), None);
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let config = config_with_origins(Some("https://learn.example.com, https://admin.example.com,"));
        assert_eq!(
            config.allowed_origins(),
            Some(vec![
                "https://learn.example.com".to_string(),
                "https://admin.example.com".to_string(),
            ])
        );
    }

    #[test]
    fn server_config_defaults_apply() {
        let vars = vec![("DATABASE_URL".to_string(), "postgres://db/app".to_string())];
        let config: Config = envy::from_iter(vars).unwrap();

        assert_eq!(config.server_port, 3000);
        assert!(config.trust_forwarded_headers);
        assert_eq!(config.expiry_sweep_interval_secs, None);
    }

    #[test]
    fn client_config_reads_prefixed_vars() {
        let vars = vec![
            (
                "PARTNER_SESSION_ENDPOINT_URL".to_string(),
                "https://api.example.com/api/v1/partner-session".to_string(),
            ),
            ("PARTNER_SESSION_REQUEST_TIMEOUT_SECS".to_string(), "3".to_string()),
            ("DATABASE_URL".to_string(), "postgres://db/app".to_string()),
        ];
        let config = ClientConfig::from_vars(vars).unwrap();

        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.cache_dir, PathBuf::from(".partner-session"));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn client_config_sets_the_mirror_location() {
        let vars = vec![
            (
                "PARTNER_SESSION_ENDPOINT_URL".to_string(),
                "https://api.example.com/api/v1/partner-session".to_string(),
            ),
            ("PARTNER_SESSION_CACHE_DIR".to_string(), "/var/cache/learn".to_string()),
            ("PARTNER_SESSION_API_KEY".to_string(), "pk_live_123".to_string()),
        ];
        let config = ClientConfig::from_vars(vars).unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/learn"));
        assert_eq!(config.api_key.as_deref(), Some("pk_live_123"));
        assert!(ClientConfig::from_vars(Vec::new()).is_err());
    }
}
