//! Runtime configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a three-layer resolution:
//! 1. An explicit path (`--config`)
//! 2. Override in data dir (~/.local/share/ledgerlens/config.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! Environment overrides (`LEDGERLENS_LLM_*`) are applied once by the
//! binary through [`Config::apply_env`]. Library components only ever see
//! the resulting [`Config`] value.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/ledgerlens.toml");

pub const LLM_HOST_ENV: &str = "LEDGERLENS_LLM_HOST";
pub const LLM_MODEL_ENV: &str = "LEDGERLENS_LLM_MODEL";
pub const LLM_API_KEY_ENV: &str = "LEDGERLENS_LLM_API_KEY";

/// Language-model endpoint settings
#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl LlmConfig {
    pub fn base_url(&self) -> Option<&str> {
        non_blank(&self.base_url)
    }

    pub fn model(&self) -> Option<&str> {
        non_blank(&self.model)
    }

    /// True when both an endpoint and a model are set
    pub fn is_configured(&self) -> bool {
        self.base_url().is_some() && self.model().is_some()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Autonomous report agent settings
#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub max_iterations: usize,
    pub temperature: f32,
    pub default_period_days: u32,
    /// Provenance tag stored in every document's context
    pub generated_from: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_iterations: 6,
            temperature: 0.2,
            default_period_days: 60,
            generated_from: "ledgerlens-agent-v1".to_string(),
        }
    }
}

/// Conversational advisor settings
#[derive(Debug, Clone, Serialize)]
pub struct AdvisorConfig {
    pub max_iterations: usize,
    pub temperature: f32,
    /// Prior conversation messages carried into each question
    pub history_window: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            temperature: 0.3,
            history_window: 6,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub report: ReportConfig,
    pub advisor: AdvisorConfig,
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgerlens").join("config.toml"))
}

impl Config {
    /// Load configuration (explicit path, then data-dir override, then defaults)
    ///
    /// An explicit path that does not exist is an error; a missing data-dir
    /// override is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("Failed to read config {}: {}", path.display(), e))
            })?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read config {}: {}", path.display(), e))
                })?,
                None => DEFAULT_CONFIG.to_string(),
            },
        };
        Self::parse(&content)
    }

    /// Parse TOML over the defaults; omitted keys keep their default
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = raw.llm {
            if llm.base_url.is_some() {
                config.llm.base_url = llm.base_url;
            }
            if llm.model.is_some() {
                config.llm.model = llm.model;
            }
            if llm.api_key.is_some() {
                config.llm.api_key = llm.api_key;
            }
            if let Some(timeout) = llm.timeout_secs {
                config.llm.timeout_secs = timeout;
            }
        }

        if let Some(report) = raw.report {
            if let Some(max) = report.max_iterations {
                config.report.max_iterations = max;
            }
            if let Some(temperature) = report.temperature {
                config.report.temperature = temperature;
            }
            if let Some(days) = report.default_period_days {
                config.report.default_period_days = days;
            }
            if let Some(tag) = report.generated_from {
                config.report.generated_from = tag;
            }
        }

        if let Some(advisor) = raw.advisor {
            if let Some(max) = advisor.max_iterations {
                config.advisor.max_iterations = max;
            }
            if let Some(temperature) = advisor.temperature {
                config.advisor.temperature = temperature;
            }
            if let Some(window) = advisor.history_window {
                config.advisor.history_window = window;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.report.max_iterations == 0 || self.advisor.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }
        if self.report.default_period_days == 0 {
            return Err(Error::Config("default_period_days must be at least 1".into()));
        }
        Ok(())
    }

    /// Apply `LEDGERLENS_LLM_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup(LLM_HOST_ENV) {
            self.llm.base_url = Some(host);
        }
        if let Some(model) = lookup(LLM_MODEL_ENV) {
            self.llm.model = Some(model);
        }
        if let Some(key) = lookup(LLM_API_KEY_ENV) {
            self.llm.api_key = Some(key);
        }
    }

    /// Copy safe to print, with the API key masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.llm.api_key.is_some() {
            config.llm.api_key = Some("***".to_string());
        }
        config
    }
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    llm: Option<RawLlm>,
    report: Option<RawReport>,
    advisor: Option<RawAdvisor>,
}

#[derive(Debug, Deserialize)]
struct RawLlm {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawReport {
    max_iterations: Option<usize>,
    temperature: Option<f32>,
    default_period_days: Option<u32>,
    generated_from: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAdvisor {
    max_iterations: Option<usize>,
    temperature: Option<f32>,
    history_window: Option<usize>,
}
