//! Rules document loader
//!
//! Resolves, reads and compiles the rules document. Resolution order:
//!
//! 1. An explicit path
//! 2. `REQCONFLICT_RULES` environment variable
//! 3. `config/rules.yaml` under the working directory
//! 4. The default document compiled into the binary

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::types::RulesConfig;
use crate::rules::RuleSet;

pub const RULES_ENV_VAR: &str = "REQCONFLICT_RULES";
pub const DEFAULT_RULES_PATH: &str = "config/rules.yaml";

/// The default rules document
pub const BUILTIN_RULES: &str = include_str!("../../config/rules.yaml");

/// Where a rules document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesSource {
    File(PathBuf),
    Builtin,
}

impl std::fmt::Display for RulesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RulesSource::File(path) => write!(f, "{}", path.display()),
            RulesSource::Builtin => f.write_str("<built-in rules>"),
        }
    }
}

pub struct ConfigLoader {
    source: RulesSource,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            source: RulesSource::File(path.into()),
        }
    }

    /// Loader for the built-in document
    pub fn builtin() -> Self {
        Self {
            source: RulesSource::Builtin,
        }
    }

    /// Create loader from REQCONFLICT_RULES, else config/rules.yaml if it
    /// exists, else the built-in document
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var(RULES_ENV_VAR) {
            return Self::new(path);
        }
        if Path::new(DEFAULT_RULES_PATH).is_file() {
            return Self::new(DEFAULT_RULES_PATH);
        }
        Self::builtin()
    }

    /// Explicit path if given, otherwise [`ConfigLoader::from_env`]
    pub fn resolve(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::new(path),
            None => Self::from_env(),
        }
    }

    pub fn source(&self) -> &RulesSource {
        &self.source
    }

    /// Read and deserialize the rules document
    pub fn load(&self) -> Result<RulesConfig> {
        info!("Loading rules from {}", self.source);

        let config = match &self.source {
            RulesSource::File(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                parse_rules_yaml(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            RulesSource::Builtin => {
                parse_rules_yaml(BUILTIN_RULES).context("Failed to parse built-in rules")?
            }
        };

        Ok(config)
    }

    /// Load and compile the rules document into a rule set
    pub fn load_rule_set(&self) -> Result<RuleSet> {
        let config = self.load()?;
        let rules = RuleSet::from_config(&config)
            .with_context(|| format!("Invalid rules document {}", self.source))?;

        info!("Loaded {} rules from {}", rules.len(), self.source);
        Ok(rules)
    }
}

/// Deserialize a rules document from YAML text
pub fn parse_rules_yaml(content: &str) -> std::result::Result<RulesConfig, serde_yaml::Error> {
    serde_yaml::from_str(content)
}
