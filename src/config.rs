//! Provider configuration.
//!
//! The host passes the provider block as JSON to `configure`. Any field left
//! out falls back to its `DELTASTREAM_*` environment variable, then to a
//! default.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Default control-plane endpoint.
pub const DEFAULT_SERVER: &str = "https://api.deltastream.io/v2";

/// Default role statements run as.
pub const DEFAULT_ROLE: &str = "sysadmin";

/// Default total wait, in seconds, for an object to settle.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 300;

/// Default per-request HTTP timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

const ENV_SERVER: &str = "DELTASTREAM_SERVER";
const ENV_API_KEY: &str = "DELTASTREAM_API_KEY";
const ENV_ORGANIZATION: &str = "DELTASTREAM_ORGANIZATION";
const ENV_ROLE: &str = "DELTASTREAM_ROLE";

/// Raw provider block as sent by the host; every field is optional here.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    server: Option<String>,
    api_key: Option<String>,
    organization: Option<String>,
    role: Option<String>,
    insecure_skip_verify: Option<bool>,
    poll_timeout: Option<u64>,
    request_timeout: Option<u64>,
}

/// Resolved provider configuration.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    /// Base URL of the statements API.
    pub server: String,
    /// API token sent as a bearer token.
    pub api_key: String,
    /// Organization every session runs in.
    pub organization: String,
    /// Role used when a resource does not name an owner.
    pub role: String,
    /// Skip TLS certificate verification.
    pub insecure_skip_verify: bool,
    /// Total time to wait for an object to settle.
    pub poll_timeout: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("server", &self.server)
            .field("api_key", &"<redacted>")
            .field("organization", &self.organization)
            .field("role", &self.role)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("poll_timeout", &self.poll_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Resolve a config from the host payload and the process environment.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        Self::resolve(value, |key| std::env::var(key).ok())
    }

    /// Resolve a config with a custom environment lookup.
    pub fn resolve(
        value: serde_json::Value,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let raw: RawConfig = match value {
            serde_json::Value::Null => RawConfig::default(),
            other => serde_json::from_value(other)?,
        };

        let pick = |field: Option<String>, key: &str| {
            field
                .filter(|s| !s.trim().is_empty())
                .or_else(|| env(key).filter(|s| !s.trim().is_empty()))
        };

        let api_key = pick(raw.api_key, ENV_API_KEY).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "api_key must be set in the provider config or {}",
                ENV_API_KEY
            ))
        })?;
        let organization = pick(raw.organization, ENV_ORGANIZATION).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "organization must be set in the provider config or {}",
                ENV_ORGANIZATION
            ))
        })?;

        let server = pick(raw.server, ENV_SERVER).unwrap_or_else(|| DEFAULT_SERVER.to_string());
        if !(server.starts_with("https://") || server.starts_with("http://")) {
            return Err(ProviderError::Configuration(format!(
                "server must be an http(s) URL, got '{}'",
                server
            )));
        }

        let poll_timeout = raw.poll_timeout.unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);
        if poll_timeout == 0 {
            return Err(ProviderError::Configuration(
                "poll_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            api_key,
            organization,
            role: pick(raw.role, ENV_ROLE).unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            insecure_skip_verify: raw.insecure_skip_verify.unwrap_or(false),
            poll_timeout: Duration::from_secs(poll_timeout),
            request_timeout: Duration::from_secs(
                raw.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        })
    }

    /// Polling policy bounded by `poll_timeout`.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_elapsed(self.poll_timeout)
    }

    /// Non-fatal remarks about the resolved config.
    pub fn warnings(&self) -> Vec<Diagnostic> {
        let mut warnings = Vec::new();
        if self.insecure_skip_verify {
            warnings.push(
                Diagnostic::warning("TLS certificate verification is disabled")
                    .with_attribute("insecure_skip_verify"),
            );
        }
        if self.server.starts_with("http://") {
            warnings.push(
                Diagnostic::warning("The API key is sent over plain HTTP")
                    .with_attribute("server"),
            );
        }
        warnings
    }
}

/// Schema of the provider block.
pub fn provider_schema() -> Schema {
    Schema::v0()
        .with_description("Connection settings for the DeltaStream control plane")
        .with_attribute(
            "server",
            Attribute::optional_string()
                .with_description("Statements API URL (env DELTASTREAM_SERVER)")
                .with_default(json!(DEFAULT_SERVER)),
        )
        .with_attribute(
            "api_key",
            Attribute::optional_string()
                .sensitive()
                .with_description("API token (env DELTASTREAM_API_KEY)"),
        )
        .with_attribute(
            "organization",
            Attribute::optional_string()
                .with_description("Organization id or name (env DELTASTREAM_ORGANIZATION)"),
        )
        .with_attribute(
            "role",
            Attribute::optional_string()
                .with_description("Default role (env DELTASTREAM_ROLE)")
                .with_default(json!(DEFAULT_ROLE)),
        )
        .with_attribute("insecure_skip_verify", Attribute::optional_bool())
        .with_attribute(
            "poll_timeout",
            Attribute::optional_int64()
                .with_description("Seconds to wait for objects to settle")
                .with_default(json!(DEFAULT_POLL_TIMEOUT_SECS)),
        )
        .with_attribute("request_timeout", Attribute::optional_int64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::resolve(
            json!({"api_key": "secret", "organization": "acme"}),
            env(&[]),
        )
        .unwrap();

        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.role, DEFAULT_ROLE);
        assert_eq!(config.poll_timeout, Duration::from_secs(300));
        assert!(!config.insecure_skip_verify);
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_env_fallback() {
        let config = ProviderConfig::resolve(
            serde_json::Value::Null,
            env(&[
                ("DELTASTREAM_API_KEY", "from-env"),
                ("DELTASTREAM_ORGANIZATION", "acme"),
                ("DELTASTREAM_ROLE", "orgadmin"),
                ("DELTASTREAM_SERVER", "https://localhost:8080/v2/"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.role, "orgadmin");
        assert_eq!(config.server, "https://localhost:8080/v2");
    }

    #[test]
    fn test_explicit_value_wins_over_env() {
        let config = ProviderConfig::resolve(
            json!({"api_key": "explicit", "organization": "acme"}),
            env(&[("DELTASTREAM_API_KEY", "from-env")]),
        )
        .unwrap();
        assert_eq!(config.api_key, "explicit");
    }

    #[test]
    fn test_missing_credentials() {
        let err = ProviderConfig::resolve(json!({"organization": "acme"}), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.message().contains("api_key"));

        let err = ProviderConfig::resolve(json!({"api_key": "k"}), env(&[])).unwrap_err();
        assert!(err.message().contains("organization"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = ProviderConfig::resolve(
            json!({"api_key": "k", "organization": "o", "server": "ftp://x"}),
            env(&[]),
        )
        .unwrap_err();
        assert!(err.message().contains("http(s)"));

        let err = ProviderConfig::resolve(
            json!({"api_key": "k", "organization": "o", "poll_timeout": 0}),
            env(&[]),
        )
        .unwrap_err();
        assert!(err.message().contains("poll_timeout"));

        let err = ProviderConfig::resolve(
            json!({"api_key": "k", "organization": "o", "bogus": true}),
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config =
            ProviderConfig::resolve(json!({"api_key": "hunter2", "organization": "o"}), env(&[]))
                .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_insecure_warnings() {
        let config = ProviderConfig::resolve(
            json!({
                "api_key": "k",
                "organization": "o",
                "server": "http://localhost:8080",
                "insecure_skip_verify": true
            }),
            env(&[]),
        )
        .unwrap();
        assert_eq!(config.warnings().len(), 2);
        assert_eq!(config.retry_policy().max_elapsed, Duration::from_secs(300));
    }
}
