use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::reasoning::ReasoningError;

/// Application-level constants
pub const APP_NAME: &str = "clinical-reasoning";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable pointing at an engine config file.
pub const CONFIG_ENV_VAR: &str = "CLINICAL_REASONING_CONFIG";

/// Config file name looked up under the application data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "clinical_reasoning=info,warn"
}

/// Get the application data directory (~/.clinical-reasoning/).
/// `None` when the home directory cannot be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".clinical-reasoning"))
}

// ═══════════════════════════════════════════════════════════
// Engine configuration
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Fraction beyond a lab bound after which a value is critical.
    pub critical_margin: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            critical_margin: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Upper bound on merged diagnoses returned.
    pub max_diagnoses: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self { max_diagnoses: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Per-source timeout when gathering differentials.
    pub model_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            model_timeout_secs: 60,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.model_timeout_secs)
    }
}

/// Engine tuning. Every field has a default, so `{}` is a valid file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub consensus: ConsensusConfig,
    pub sources: SourceConfig,
    /// Directory holding externally maintained reference tables.
    /// Absent: the bundled tables are used.
    pub resources_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ReasoningError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ReasoningError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| ReasoningError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve config from `$CLINICAL_REASONING_CONFIG`, then the app data
    /// directory, then defaults.
    pub fn resolve() -> Result<Self, ReasoningError> {
        let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::resolve_from(from_env, app_data_dir())
    }

    pub fn resolve_from(
        explicit: Option<PathBuf>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self, ReasoningError> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "Loading engine config from environment");
            return Self::load(&path);
        }
        if let Some(path) = data_dir.map(|d| d.join(CONFIG_FILE)) {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "Loading engine config from data dir");
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ReasoningError> {
        let margin = self.classifier.critical_margin;
        if !margin.is_finite() || margin < 0.0 {
            return Err(ReasoningError::Config(format!(
                "classifier.critical_margin must be a non-negative number, got {}",
                margin
            )));
        }
        if self.consensus.max_diagnoses == 0 {
            return Err(ReasoningError::Config(
                "consensus.max_diagnoses must be at least 1".into(),
            ));
        }
        if self.sources.model_timeout_secs == 0 {
            return Err(ReasoningError::Config(
                "sources.model_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
