//! Configuration for the upgrade engine.
//!
//! All knobs have serde defaults matching the documented constants, so
//! an empty YAML document yields a fully usable configuration. Hosts
//! load a file via [`EngineConfig::from_file`] or embed YAML via
//! [`EngineConfig::parse`]; both validate the result.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A knob holds a value the engine cannot operate with.
    #[error("invalid config value: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Tunables for the upgrade decision and swap engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)] // independent feature toggles
pub struct EngineConfig {
    /// Score a candidate must reach, as a percentage of the held item's
    /// score, before an upgrade triggers (default: 115). This is a
    /// hysteresis band preventing oscillation between near-equal items.
    pub upgrade_threshold_pct: u32,

    /// Maximum number of nearby candidates examined per scan
    /// (default: 20). Bounds per-agent evaluation cost.
    pub scan_sample_cap: usize,

    /// Radius of the candidate scan, in world units (default: 50).
    pub scan_radius: u64,

    /// Lifetime of a memoized score, in ticks (default: 60).
    pub score_ttl_ticks: u64,

    /// Backoff window after the first failed search, in ticks
    /// (default: 30). Doubles per consecutive failure.
    pub backoff_base_ticks: u64,

    /// Ceiling on the backoff window, as a multiple of the base
    /// (default: 1200).
    pub backoff_ceiling_factor: u64,

    /// Age at which a pending upgrade is treated as stuck and
    /// force-rolled-back, in ticks (default: 600).
    pub pending_upgrade_timeout_ticks: u64,

    /// Interval between periodic cleanup sweeps, in ticks
    /// (default: 1000). Sweeps run on this cadence, never every tick.
    pub cleanup_interval_ticks: u64,

    /// How long a freshly dropped item is ignored as a pick-up
    /// candidate, in ticks (default: 300).
    pub drop_cooldown_ticks: u64,

    /// Whether an agent may hold two items of the same type
    /// (default: false).
    pub allow_duplicates: bool,

    /// Whether a capacity rejection may be answered by dropping the
    /// worst-scoring held item (default: true).
    pub upgrade_by_replacement: bool,

    /// Whether held items may be replaced by better instances of the
    /// same type (default: true).
    pub same_type_upgrades: bool,

    /// Whether individually pinned items may still be upgraded
    /// (default: false).
    pub forced_upgrades: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            upgrade_threshold_pct: 115,
            scan_sample_cap: 20,
            scan_radius: 50,
            score_ttl_ticks: 60,
            backoff_base_ticks: 30,
            backoff_ceiling_factor: 1200,
            pending_upgrade_timeout_ticks: 600,
            cleanup_interval_ticks: 1000,
            drop_cooldown_ticks: 300,
            allow_duplicates: false,
            upgrade_by_replacement: true,
            same_type_upgrades: true,
            forced_upgrades: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a knob fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed YAML or
    /// [`ConfigError::Invalid`] if a knob fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate knob values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the threshold is below 100%
    /// (which would cause downgrade thrash) or any window/cap is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upgrade_threshold_pct < 100 {
            return Err(ConfigError::Invalid {
                reason: "upgrade_threshold_pct must be at least 100".to_owned(),
            });
        }
        if self.scan_sample_cap == 0 {
            return Err(ConfigError::Invalid {
                reason: "scan_sample_cap must be at least 1".to_owned(),
            });
        }
        if self.backoff_base_ticks == 0 {
            return Err(ConfigError::Invalid {
                reason: "backoff_base_ticks must be at least 1".to_owned(),
            });
        }
        if self.backoff_ceiling_factor == 0 {
            return Err(ConfigError::Invalid {
                reason: "backoff_ceiling_factor must be at least 1".to_owned(),
            });
        }
        if self.pending_upgrade_timeout_ticks == 0 {
            return Err(ConfigError::Invalid {
                reason: "pending_upgrade_timeout_ticks must be at least 1".to_owned(),
            });
        }
        if self.cleanup_interval_ticks == 0 {
            return Err(ConfigError::Invalid {
                reason: "cleanup_interval_ticks must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// The upgrade threshold as a decimal multiplier (115 -> 1.15).
    pub fn upgrade_threshold(&self) -> Decimal {
        Decimal::from(self.upgrade_threshold_pct)
            .checked_div(Decimal::ONE_HUNDRED)
            .unwrap_or(Decimal::ONE)
    }

    /// The maximum backoff window in ticks (`base * ceiling_factor`).
    pub const fn backoff_ceiling_ticks(&self) -> u64 {
        self.backoff_base_ticks.saturating_mul(self.backoff_ceiling_factor)
    }
}
