use crate::error::{RedactError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Default chunk size in characters
pub const DEFAULT_CHUNK_SIZE: i64 = 6000;

/// Default upper bound for audit log payload snippets, in characters
pub const DEFAULT_LOG_SNIPPET_CHARS: usize = 2000;

/// How the mask renderer replaces a redacted span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskStyle {
    /// A run of `*` as long as the span
    #[default]
    Asterisks,
    /// A bracketed entity type, e.g. `[PERSON]`
    Tags,
}

impl FromStr for MaskStyle {
    type Err = RedactError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asterisks" => Ok(MaskStyle::Asterisks),
            "tags" => Ok(MaskStyle::Tags),
            other => Err(RedactError::configuration(format!(
                "unknown mask style '{other}' (expected 'asterisks' or 'tags')"
            ))),
        }
    }
}

impl fmt::Display for MaskStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskStyle::Asterisks => f.write_str("asterisks"),
            MaskStyle::Tags => f.write_str("tags"),
        }
    }
}

/// Configuration shared by every stage of a redaction run
///
/// Passed by reference into each component; there is no process-wide copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionConfig {
    /// Maximum chunk length in characters; must be positive
    pub chunk_size: i64,
    /// Replacement style for masked output
    pub mask_style: MaskStyle,
    /// Number of oracle calls allowed in flight at once
    pub max_concurrent_calls: usize,
    /// Upper bound for payload snippets stored in the detection log
    pub log_snippet_chars: usize,
    /// Per-call timeout handed to oracle transports
    pub call_timeout_secs: u64,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            mask_style: MaskStyle::Asterisks,
            max_concurrent_calls: 4,
            log_snippet_chars: DEFAULT_LOG_SNIPPET_CHARS,
            call_timeout_secs: 60,
        }
    }
}

impl RedactionConfig {
    /// Build a configuration from the process environment, loading `.env` first
    ///
    /// Recognised variables: `CHUNK_SIZE`, `MASK_STYLE`, `MAX_CONCURRENT_CALLS`,
    /// `LOG_SNIPPET_CHARS`, `ORACLE_TIMEOUT_SECS`. Unset variables keep defaults.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("CHUNK_SIZE") {
            config.chunk_size = parse_var("CHUNK_SIZE", &value)?;
        }
        if let Some(value) = lookup("MASK_STYLE") {
            config.mask_style = value.parse()?;
        }
        if let Some(value) = lookup("MAX_CONCURRENT_CALLS") {
            config.max_concurrent_calls = parse_var("MAX_CONCURRENT_CALLS", &value)?;
        }
        if let Some(value) = lookup("LOG_SNIPPET_CHARS") {
            config.log_snippet_chars = parse_var("LOG_SNIPPET_CHARS", &value)?;
        }
        if let Some(value) = lookup("ORACLE_TIMEOUT_SECS") {
            config.call_timeout_secs = parse_var("ORACLE_TIMEOUT_SECS", &value)?;
        }

        Ok(config)
    }

    /// Reject values that would make a detection pass meaningless
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size <= 0 {
            return Err(RedactError::configuration(format!(
                "chunk size must be a positive integer, got {}",
                self.chunk_size
            )));
        }
        if self.max_concurrent_calls == 0 {
            return Err(RedactError::configuration(
                "max concurrent oracle calls must be at least 1",
            ));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RedactError::configuration(format!("{key} has an invalid value: '{value}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let config = RedactionConfig::default();
        assert_eq!(config.chunk_size, 6000);
        assert_eq!(config.mask_style, MaskStyle::Asterisks);
        assert_eq!(config.log_snippet_chars, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = RedactionConfig::from_lookup(lookup_from(&[
            ("CHUNK_SIZE", "120"),
            ("MASK_STYLE", "Tags"),
            ("MAX_CONCURRENT_CALLS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.chunk_size, 120);
        assert_eq!(config.mask_style, MaskStyle::Tags);
        assert_eq!(config.max_concurrent_calls, 2);
        assert_eq!(config.call_timeout_secs, 60);
    }

    #[test]
    fn test_unparsable_value_is_configuration_error() {
        let err = RedactionConfig::from_lookup(lookup_from(&[("CHUNK_SIZE", "lots")])).unwrap_err();
        assert!(matches!(err, RedactError::Configuration { .. }));

        let err = RedactionConfig::from_lookup(lookup_from(&[("MASK_STYLE", "blur")])).unwrap_err();
        assert!(err.to_string().contains("blur"));
    }

    #[test]
    fn test_validate_rejects_non_positive_chunk_size() {
        for size in [0, -1, -6000] {
            let config = RedactionConfig {
                chunk_size: size,
                ..RedactionConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(RedactError::Configuration { .. })
            ));
        }
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = RedactionConfig {
            max_concurrent_calls: 0,
            ..RedactionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_style_display_round_trips_through_parse() {
        for style in [MaskStyle::Asterisks, MaskStyle::Tags] {
            assert_eq!(style.to_string().parse::<MaskStyle>().unwrap(), style);
        }
    }
}
