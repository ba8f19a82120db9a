use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "monthgate.yaml";

/// Windows beyond this many months are almost certainly a typo.
const WINDOW_WARN_MONTHS: u32 = 120;
/// Hard ceiling on a tier window.
const WINDOW_MAX_MONTHS: u32 = 1200;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TierConfig
// ---------------------------------------------------------------------------

/// One membership tier: the role that represents it and how many months
/// before the current one it may see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    pub role_id: String,
    pub window_months: u32,
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
}

fn default_max_concurrent_writes() -> usize {
    4
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: default_max_concurrent_writes(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScheduleConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Reconcile once at startup so a boundary missed while down is caught up.
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_on_start: true,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub category_id: String,
    /// Guild the category lives in. Optional for validation purposes; the
    /// Discord directory requires it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn new(category_id: impl Into<String>, tiers: Vec<TierConfig>) -> Self {
        Self {
            category_id: category_id.into(),
            guild_id: None,
            tiers,
            sync: SyncConfig::default(),
            schedule: ScheduleConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Parse without validating. Prefer [`Config::load`].
    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Read, parse, and validate a config file. Any error-level finding
    /// rejects the whole file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GateError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg = Self::from_yaml(&data)?;
        cfg.ensure_valid()?;
        Ok(cfg)
    }

    pub fn tier(&self, name: &str) -> Option<&TierConfig> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Fail with [`GateError::InvalidConfig`] if `validate` reports errors.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GateError::InvalidConfig(errors.join("; ")))
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.category_id.trim().is_empty() {
            warnings.push(ConfigWarning::error("category_id is empty"));
        }

        if let Some(guild) = &self.guild_id {
            if guild.trim().is_empty() {
                warnings.push(ConfigWarning::error("guild_id is set but empty"));
            }
        }

        if self.tiers.is_empty() {
            warnings.push(ConfigWarning::error("no tiers configured"));
        }

        let mut names = HashSet::new();
        let mut roles = HashSet::new();
        for (idx, tier) in self.tiers.iter().enumerate() {
            let label = if tier.name.trim().is_empty() {
                format!("tiers[{idx}]")
            } else {
                format!("tier '{}'", tier.name)
            };

            if tier.name.trim().is_empty() {
                warnings.push(ConfigWarning::error(format!("{label} has an empty name")));
            } else if !names.insert(tier.name.as_str()) {
                warnings.push(ConfigWarning::error(format!("duplicate {label}")));
            }

            if tier.role_id.trim().is_empty() {
                warnings.push(ConfigWarning::error(format!("{label} has an empty role_id")));
            } else if !roles.insert(tier.role_id.as_str()) {
                warnings.push(ConfigWarning::error(format!(
                    "{label} reuses role_id {} from another tier",
                    tier.role_id
                )));
            }

            // On Discord the @everyone role shares the guild's id.
            if self.guild_id.as_deref() == Some(tier.role_id.as_str()) {
                warnings.push(ConfigWarning::error(format!(
                    "{label} points at the @everyone role"
                )));
            }

            if tier.window_months > WINDOW_MAX_MONTHS {
                warnings.push(ConfigWarning::error(format!(
                    "{label} has window_months={} (max {WINDOW_MAX_MONTHS})",
                    tier.window_months
                )));
            } else if tier.window_months > WINDOW_WARN_MONTHS {
                warnings.push(ConfigWarning::warning(format!(
                    "{label} has window_months={} (>{WINDOW_WARN_MONTHS} is unusual)",
                    tier.window_months
                )));
            }
        }

        if self
            .tiers
            .windows(2)
            .any(|pair| pair[1].window_months < pair[0].window_months)
        {
            warnings.push(ConfigWarning::warning(
                "tier windows are not increasing in listed order",
            ));
        }

        if self.sync.max_concurrent_writes == 0 {
            warnings.push(ConfigWarning::error("sync.max_concurrent_writes must be at least 1"));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
