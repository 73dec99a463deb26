use std::env;
use std::path::PathBuf;

use chrono::Duration;
use portal_core::model::QuestionBank;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://portal.sqlite3";
pub const DEFAULT_INDUCTION_TTL_SECS: i64 = 86_400;

/// Runtime settings for the portal services.
#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub db_url: String,
    pub question_bank_path: Option<PathBuf>,
    pub induction_ttl: Duration,
    pub role_service_url: Option<Url>,
    pub permissions_url: Option<Url>,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_string(),
            question_bank_path: None,
            induction_ttl: Duration::seconds(DEFAULT_INDUCTION_TTL_SECS),
            role_service_url: None,
            permissions_url: None,
        }
    }
}

impl PortalConfig {
    /// Read settings from `PORTAL_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL or number is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a URL or number is malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let induction_ttl = match get("PORTAL_INDUCTION_TTL_SECS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::seconds)
                .ok_or(ConfigError::InvalidNumber {
                    var: "PORTAL_INDUCTION_TTL_SECS",
                    raw,
                })?,
            None => defaults.induction_ttl,
        };

        Ok(Self {
            db_url: get("PORTAL_DB_URL").unwrap_or(defaults.db_url),
            question_bank_path: get("PORTAL_QUESTION_BANK").map(PathBuf::from),
            induction_ttl,
            role_service_url: parse_url("PORTAL_ROLE_SERVICE_URL", get("PORTAL_ROLE_SERVICE_URL"))?,
            permissions_url: parse_url("PORTAL_PERMISSIONS_URL", get("PORTAL_PERMISSIONS_URL"))?,
        })
    }

    /// Load the configured question bank, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or fails validation.
    pub fn load_question_bank(&self) -> Result<QuestionBank, ConfigError> {
        let Some(path) = self.question_bank_path.as_ref() else {
            return Ok(QuestionBank::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::QuestionBankIo {
            path: path.display().to_string(),
            source,
        })?;
        Ok(QuestionBank::from_json(&raw)?)
    }
}

/// Parse an optional URL setting.
///
/// # Errors
///
/// Returns `ConfigError::InvalidUrl` if the value is present but not a URL.
pub fn parse_url(var: &'static str, raw: Option<String>) -> Result<Option<Url>, ConfigError> {
    raw.map(|raw| Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl { var, raw }))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = PortalConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_url, DEFAULT_DB_URL);
        assert_eq!(config.induction_ttl, Duration::days(1));
        assert!(config.role_service_url.is_none());
        assert_eq!(config.load_question_bank().unwrap().len(), 10);
    }

    #[test]
    fn reads_values() {
        let config = PortalConfig::from_lookup(lookup(&[
            ("PORTAL_DB_URL", "sqlite::memory:"),
            ("PORTAL_INDUCTION_TTL_SECS", "60"),
            ("PORTAL_ROLE_SERVICE_URL", "https://roles.example.com/v1"),
            ("PORTAL_PERMISSIONS_URL", "  "),
        ]))
        .unwrap();
        assert_eq!(config.db_url, "sqlite::memory:");
        assert_eq!(config.induction_ttl, Duration::seconds(60));
        assert_eq!(
            config.role_service_url.unwrap().as_str(),
            "https://roles.example.com/v1"
        );
        assert!(config.permissions_url.is_none());
    }

    #[test]
    fn rejects_bad_url() {
        let err = PortalConfig::from_lookup(lookup(&[("PORTAL_PERMISSIONS_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { var: "PORTAL_PERMISSIONS_URL", .. }));
    }

    #[test]
    fn rejects_bad_ttl() {
        for raw in ["soon", "0", "-5"] {
            let err = PortalConfig::from_lookup(lookup(&[("PORTAL_INDUCTION_TTL_SECS", raw)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidNumber { .. }));
        }
    }

    #[test]
    fn missing_bank_file_is_reported() {
        let config = PortalConfig {
            question_bank_path: Some(PathBuf::from("/nonexistent/bank.json")),
            ..PortalConfig::default()
        };
        assert!(matches!(
            config.load_question_bank(),
            Err(ConfigError::QuestionBankIo { .. })
        ));
    }
}
