//! Build configuration
//!
//! Loaded from YAML. Every field has a default, so a file may set any
//! subset, and an absent file means the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HemisphereConfig {
    pub limits: Limits,
    pub narrative: NarrativeConfig,
}

impl HemisphereConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.limits;
        if !(0.0..=1.0).contains(&l.similarity_threshold) {
            return Err(ConfigError::Invalid {
                field: "limits.similarity_threshold",
                reason: format!("{} is outside [0, 1]", l.similarity_threshold),
            });
        }
        if !(0.0..=1.0).contains(&l.cooccur_strength) {
            return Err(ConfigError::Invalid {
                field: "limits.cooccur_strength",
                reason: format!("{} is outside [0, 1]", l.cooccur_strength),
            });
        }
        if l.central_count < l.driver_count {
            return Err(ConfigError::Invalid {
                field: "limits.central_count",
                reason: "must be at least driver_count".to_string(),
            });
        }
        if self.narrative.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "narrative.timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Caps, thresholds and fixed strengths of the build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub similarity_node_cap: usize,
    pub similarity_threshold: f64,
    pub cooccur_per_session: usize,
    pub cooccur_strength: f64,
    pub driver_count: usize,
    pub central_count: usize,
    pub evidence_candidates: usize,
    pub evidence_min_words: usize,
    pub quote_limit: usize,
    pub root_weight: f64,
    pub cause_hint_base: f64,
    pub cause_hint_step: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            similarity_node_cap: 140,
            similarity_threshold: 0.22,
            cooccur_per_session: 18,
            cooccur_strength: 0.25,
            driver_count: 6,
            central_count: 10,
            evidence_candidates: 45,
            evidence_min_words: 18,
            quote_limit: 10,
            root_weight: 10.0,
            cause_hint_base: 0.95,
            cause_hint_step: 0.04,
        }
    }
}

impl Limits {
    /// CAUSE_HINT strength for the central node at `rank` (0-based).
    pub fn cause_hint_strength(&self, rank: usize) -> f64 {
        (self.cause_hint_base - self.cause_hint_step * rank as f64).clamp(0.0, 1.0)
    }
}

/// How strictly service sentences are checked before use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentencePolicy {
    /// Reject only empty sentences.
    #[default]
    Permissive,
    /// Also require 16–28 words, a causal connective, and no meta-references.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub temperature: f64,
    pub sentence_policy: SentencePolicy,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "HEMISPHERE_NARRATIVE_API_KEY".to_string(),
            timeout_secs: 12,
            temperature: 0.2,
            sentence_policy: SentencePolicy::Permissive,
        }
    }
}

impl NarrativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = HemisphereConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, HemisphereConfig::default());
        assert_eq!(config.limits.similarity_node_cap, 140);
        assert_eq!(config.limits.evidence_candidates, 45);
        assert!(!config.narrative.enabled);
    }

    #[test]
    fn partial_yaml_overrides_only_given_fields() {
        let yaml = "limits:\n  driver_count: 4\nnarrative:\n  enabled: true\n  sentence_policy: strict\n";
        let config = HemisphereConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.limits.driver_count, 4);
        assert_eq!(config.limits.central_count, 10);
        assert!(config.narrative.enabled);
        assert_eq!(config.narrative.sentence_policy, SentencePolicy::Strict);
        assert_eq!(config.narrative.timeout(), Duration::from_secs(12));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = HemisphereConfig::from_yaml_str("limits:\n  similarity_threshold: 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "limits.similarity_threshold", .. }));
    }

    #[test]
    fn rejects_fewer_central_than_drivers() {
        let err = HemisphereConfig::from_yaml_str("limits:\n  driver_count: 8\n  central_count: 4\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "limits.central_count", .. }));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = HemisphereConfig::from_yaml_str("limits: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = HemisphereConfig::from_yaml_file(Path::new("/nonexistent/hemisphere.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn cause_hint_strength_decreases_linearly() {
        let limits = Limits::default();
        assert!((limits.cause_hint_strength(0) - 0.95).abs() < 1e-9);
        assert!((limits.cause_hint_strength(1) - 0.91).abs() < 1e-9);
        assert!((limits.cause_hint_strength(9) - 0.59).abs() < 1e-9);
        assert_eq!(limits.cause_hint_strength(100), 0.0);
    }
}
