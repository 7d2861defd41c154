//! Configuration management for Page Archiver

use serde::Deserialize;
use std::env;

use crate::cleaner::CleanPolicy;
use crate::error::ConfigError;

/// Default chat-completions endpoint for the text corrector
pub const DEFAULT_CORRECTOR_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default corrector model
pub const DEFAULT_CORRECTOR_MODEL: &str = "gpt-4o-mini";

/// Default object key prefix
pub const DEFAULT_KEY_PREFIX: &str = "legaltech";

/// Default network timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub corrector: Option<CorrectorConfig>,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrectorConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub clean: bool,
    pub correct: bool,
    pub timeout_secs: u64,
    pub key_prefix: String,
    pub policy: CleanPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            clean: true,
            correct: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            policy: CleanPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |name: &'static str, default: bool| parse_flag(name, optional(name), default);

        let storage = StorageConfig {
            endpoint: required("S3_ENDPOINT")?,
            bucket: optional("S3_BUCKET"),
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
        };

        let corrector = optional("CORRECTOR_API_KEY").map(|api_key| CorrectorConfig {
            api_url: optional("CORRECTOR_API_URL")
                .unwrap_or_else(|| DEFAULT_CORRECTOR_URL.to_string()),
            api_key,
            model: optional("CORRECTOR_MODEL")
                .unwrap_or_else(|| DEFAULT_CORRECTOR_MODEL.to_string()),
        });

        let defaults = CleanPolicy::default();
        let policy = CleanPolicy {
            remove_progress: flag("CLEAN_REMOVE_PROGRESS", defaults.remove_progress)?,
            remove_a11y: flag("CLEAN_REMOVE_A11Y", defaults.remove_a11y)?,
            remove_print: flag("CLEAN_REMOVE_PRINT", defaults.remove_print)?,
            remove_css_classes: flag("CLEAN_REMOVE_CSS_CLASSES", defaults.remove_css_classes)?,
            preserve_text: flag("CLEAN_PRESERVE_TEXT", defaults.preserve_text)?,
            max_depth: parse_number(
                "CLEAN_MAX_DEPTH",
                optional("CLEAN_MAX_DEPTH"),
                defaults.max_depth,
            )?,
        };

        let pipeline = PipelineConfig {
            clean: flag("PIPELINE_CLEAN", true)?,
            correct: flag("PIPELINE_CORRECT", corrector.is_some())?,
            timeout_secs: parse_number(
                "PIPELINE_TIMEOUT_SECS",
                optional("PIPELINE_TIMEOUT_SECS"),
                DEFAULT_TIMEOUT_SECS,
            )?,
            key_prefix: optional("PIPELINE_KEY_PREFIX")
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            policy,
        };

        if pipeline.correct && corrector.is_none() {
            return Err(ConfigError::Missing("CORRECTOR_API_KEY"));
        }

        Ok(Config {
            storage,
            corrector,
            pipeline,
        })
    }
}

fn parse_flag(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn parse_number<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("S3_ENDPOINT", "https://account.r2.cloudflarestorage.com"),
        ("S3_ACCESS_KEY", "AKIDEXAMPLE"),
        ("S3_SECRET_KEY", "secret"),
    ];

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();

        assert_eq!(config.storage.access_key, "AKIDEXAMPLE");
        assert!(config.storage.bucket.is_none());
        assert!(config.corrector.is_none());
        assert!(config.pipeline.clean);
        assert!(!config.pipeline.correct);
        assert_eq!(config.pipeline.timeout_secs, 30);
        assert_eq!(config.pipeline.key_prefix, "legaltech");
        assert_eq!(config.pipeline.policy.max_depth, 10);
    }

    #[test]
    fn test_missing_secret_fails_fast() {
        let err = Config::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("S3_SECRET_KEY"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = BASE.to_vec();
        vars[1] = ("S3_ACCESS_KEY", "   ");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("S3_ACCESS_KEY"));
    }

    #[test]
    fn test_corrector_enables_correction() {
        let mut vars = BASE.to_vec();
        vars.push(("CORRECTOR_API_KEY", "sk-test"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        let corrector = config.corrector.unwrap();
        assert_eq!(corrector.api_url, DEFAULT_CORRECTOR_URL);
        assert_eq!(corrector.model, DEFAULT_CORRECTOR_MODEL);
        assert!(config.pipeline.correct);
    }

    #[test]
    fn test_correction_without_key_is_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("PIPELINE_CORRECT", "true"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("CORRECTOR_API_KEY"));
    }

    #[test]
    fn test_policy_overrides() {
        let mut vars = BASE.to_vec();
        vars.push(("CLEAN_MAX_DEPTH", "4"));
        vars.push(("CLEAN_REMOVE_PRINT", "no"));
        vars.push(("PIPELINE_CLEAN", "0"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.pipeline.policy.max_depth, 4);
        assert!(!config.pipeline.policy.remove_print);
        assert!(config.pipeline.policy.remove_progress);
        assert!(!config.pipeline.clean);
    }

    #[test]
    fn test_invalid_boolean() {
        let mut vars = BASE.to_vec();
        vars.push(("PIPELINE_CLEAN", "maybe"));
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PIPELINE_CLEAN", .. }));
    }
}
