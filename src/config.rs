//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::wizard::persistence::PROGRESS_KEY;

/// Onboarding service configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// JSON file backing client progress storage.
    pub store_path: PathBuf,
    /// Key the progress document is stored under.
    pub store_key: String,
    /// Port the REST API listens on.
    pub port: u16,
    /// Base URL of the account-creation service.
    pub account_service_url: String,
    /// Upper bound on a single account-service call.
    pub finalize_timeout: Duration,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("./data/onboarding.json"),
            store_key: PROGRESS_KEY.to_string(),
            port: 8080,
            account_service_url: "http://127.0.0.1:9000".to_string(),
            finalize_timeout: Duration::from_secs(15),
        }
    }
}

impl WizardConfig {
    /// Build from `ONBOARDING_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("ONBOARDING_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(key) = lookup("ONBOARDING_STORE_KEY") {
            if key.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "ONBOARDING_STORE_KEY".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            config.store_key = key;
        }
        if let Some(port) = lookup("ONBOARDING_PORT") {
            config.port = port.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "ONBOARDING_PORT".to_string(),
                message: format!("{e}"),
            })?;
        }
        if let Some(url) = lookup("ONBOARDING_ACCOUNT_URL") {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key: "ONBOARDING_ACCOUNT_URL".to_string(),
                    message: format!("expected an http(s) URL, got {url:?}"),
                });
            }
            config.account_service_url = url;
        }
        if let Some(secs) = lookup("ONBOARDING_FINALIZE_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "ONBOARDING_FINALIZE_TIMEOUT_SECS".to_string(),
                message: format!("{e}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "ONBOARDING_FINALIZE_TIMEOUT_SECS".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            config.finalize_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = WizardConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store_key, "onboarding_progress");
        assert_eq!(config.finalize_timeout, Duration::from_secs(15));
    }

    #[test]
    fn overrides_from_env() {
        let config = WizardConfig::from_lookup(lookup(&[
            ("ONBOARDING_STORE_PATH", "/tmp/progress.json"),
            ("ONBOARDING_PORT", "3001"),
            ("ONBOARDING_ACCOUNT_URL", "https://accounts.example.com"),
            ("ONBOARDING_FINALIZE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/progress.json"));
        assert_eq!(config.port, 3001);
        assert_eq!(config.account_service_url, "https://accounts.example.com");
        assert_eq!(config.finalize_timeout, Duration::from_secs(30));
    }

    #[test]
    fn rejects_bad_values() {
        let err = WizardConfig::from_lookup(lookup(&[("ONBOARDING_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref key, .. } if key == "ONBOARDING_PORT"
        ));

        let err = WizardConfig::from_lookup(lookup(&[("ONBOARDING_FINALIZE_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = WizardConfig::from_lookup(lookup(&[("ONBOARDING_ACCOUNT_URL", "accounts.local")]))
            .unwrap_err();
        assert!(err.to_string().contains("ONBOARDING_ACCOUNT_URL"));
    }
}
