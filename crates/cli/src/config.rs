//! Configuration for the `brms` CLI.
//!
//! Read from TOML, then overridden by environment variables.
//!
//! # Example
//!
//! ```toml
//! [api]
//! url = "http://localhost:3000/api"
//! token = "..."
//! timeout_secs = 30
//!
//! [rules]
//! rule_dir = "brms-rules/rules"
//! ```

use std::path::Path;
use std::time::Duration;

use brms_api::HttpConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "brms.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_RULE_DIR: &str = "rules";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrmsConfig {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub rules: RuleSettings,
}

/// `[api]` section: where the decision service lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_url")]
    pub url: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// `[rules]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSettings {
    /// Rules directory; rule file paths are reported relative to it.
    #[serde(default = "default_rule_dir")]
    pub rule_dir: String,
}

fn default_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_rule_dir() -> String {
    DEFAULT_RULE_DIR.to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            url: default_url(),
            token: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RuleSettings {
    fn default() -> Self {
        RuleSettings {
            rule_dir: default_rule_dir(),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl BrmsConfig {
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("invalid configuration: {}", e))
    }

    /// Load the configuration.
    ///
    /// An explicit `path` must exist. Without one, `brms.toml` in the current
    /// directory is used when present, else the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let mut config = match path {
            Some(p) => read_config(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                read_config(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => BrmsConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `BRMS_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("BRMS_API_URL") {
            self.api.url = url;
        }
        if let Some(token) = lookup("BRMS_API_TOKEN") {
            self.api.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(dir) = lookup("BRMS_RULE_DIR") {
            self.rules.rule_dir = dir;
        }
        if let Some(secs) = lookup("BRMS_TIMEOUT_SECS") {
            self.api.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| format!("BRMS_TIMEOUT_SECS must be a whole number of seconds, got '{}'", secs))?;
        }
        Ok(())
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            base_url: self.api.url.clone(),
            rule_dir: self.rules.rule_dir.clone(),
            token: self.api.token.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }
}

fn read_config(path: &Path) -> Result<BrmsConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}
