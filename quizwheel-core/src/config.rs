//! Wheel configuration loaded from JSON.
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::identifier::DEFAULT_MAX_IDENTIFIER_LEN;

/// Default odds: one win in fifty spins.
pub const WIN_ODDS: u32 = 50;

const MAX_OFFSET_MINUTES: u32 = 18 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelConfig {
    /// A spin wins with probability `1 / win_odds`.
    #[serde(default = "WheelConfig::default_win_odds")]
    pub win_odds: u32,
    /// Reference timezone for calendar days, as minutes east of UTC.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    #[serde(default = "WheelConfig::default_max_identifier_len")]
    pub max_identifier_len: usize,
}

impl WheelConfig {
    const fn default_win_odds() -> u32 {
        WIN_ODDS
    }

    const fn default_max_identifier_len() -> usize {
        DEFAULT_MAX_IDENTIFIER_LEN
    }

    /// Check invariants the wheel relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.win_odds == 0 {
            return Err(ConfigError::ZeroOdds(self.win_odds));
        }
        self.offset()?;
        if self.max_identifier_len == 0 {
            return Err(ConfigError::ZeroIdentifierLen);
        }
        Ok(())
    }

    /// Reference timezone as a chrono offset.
    ///
    /// # Errors
    ///
    /// Returns `OffsetOutOfRange` when the offset is not representable.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        let out_of_range = ConfigError::OffsetOutOfRange(self.utc_offset_minutes);
        if self.utc_offset_minutes.unsigned_abs() > MAX_OFFSET_MINUTES {
            return Err(out_of_range);
        }
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or(out_of_range)
    }
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            win_odds: Self::default_win_odds(),
            utc_offset_minutes: 0,
            max_identifier_len: Self::default_max_identifier_len(),
        }
    }
}

/// Errors raised while reading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum LoadConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load and validate a JSON configuration file. Missing keys take defaults.
///
/// # Errors
///
/// Returns a `LoadConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> Result<WheelConfig, LoadConfigError> {
    let label = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| LoadConfigError::Io {
        path: label.clone(),
        source,
    })?;
    let cfg: WheelConfig =
        serde_json::from_str(&raw).map_err(|source| LoadConfigError::Parse {
            path: label,
            source,
        })?;
    cfg.validate()?;
    Ok(cfg)
}
