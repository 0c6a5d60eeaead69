use std::time::Duration;

use tracing::warn;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime settings, read once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Credential for the comment service. Blank values count as absent.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_api_base: DEFAULT_API_BASE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    /// Reads settings from the process environment. Call `dotenvy::dotenv()`
    /// first if a `.env` file should be honoured.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let http_timeout = match non_blank("GRADEBOOK_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(value = %raw, "Invalid GRADEBOOK_HTTP_TIMEOUT_SECS, using default");
                    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Self {
            gemini_api_key: non_blank("GEMINI_API_KEY"),
            gemini_model: non_blank("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: non_blank("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            http_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(settings(&[]), Settings::default());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert_eq!(settings(&[("GEMINI_API_KEY", "   ")]).gemini_api_key, None);
        assert_eq!(
            settings(&[("GEMINI_API_KEY", " abc ")]).gemini_api_key.as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn reads_overrides() {
        let s = settings(&[
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_API_BASE", "http://localhost:8080/"),
            ("GRADEBOOK_HTTP_TIMEOUT_SECS", "5"),
        ]);
        assert_eq!(s.gemini_model, "gemini-2.0-flash");
        assert_eq!(s.gemini_api_base, "http://localhost:8080");
        assert_eq!(s.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_timeout_falls_back() {
        let s = settings(&[("GRADEBOOK_HTTP_TIMEOUT_SECS", "soon")]);
        assert_eq!(s.http_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
