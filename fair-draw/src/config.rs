//! Animation and pacing parameters for the draw engine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing and shape of one draw's scan animation and the pauses around it.
///
/// All delays are in milliseconds. Values are checked by [`DrawConfig::validate`]
/// before the engine accepts them; nothing is clamped silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    /// Delay before the first scan step.
    pub scan_fast_delay_ms: u64,
    /// Ceiling the scan delay grows towards.
    pub scan_slow_delay_ms: u64,
    /// Multiplier applied to the scan delay after every step.
    pub scan_growth_factor: f64,
    /// Full laps over the candidate pool before the rollout walk.
    pub spin_rounds: u32,
    /// Minimum rollout length as a multiple of the pool size.
    pub rollout_factor: f64,
    /// Number of on/off toggles of the winner mark.
    pub blink_toggle_count: u32,
    pub blink_interval_ms: u64,
    /// Pause between the end of blinking and the counter commit.
    pub settle_pause_ms: u64,
    /// Pause between two draws of the same batch.
    pub next_draw_pause_ms: u64,
    /// Pause between the last commit and batch completion.
    pub finish_pause_ms: u64,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            scan_fast_delay_ms: 18,
            scan_slow_delay_ms: 240,
            scan_growth_factor: 1.12,
            spin_rounds: 3,
            rollout_factor: 1.5,
            blink_toggle_count: 6,
            blink_interval_ms: 180,
            settle_pause_ms: 100,
            next_draw_pause_ms: 300,
            finish_pause_ms: 150,
        }
    }
}

impl DrawConfig {
    /// Reads a JSON config. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("scan_fast_delay_ms", self.scan_fast_delay_ms)?;
        positive("blink_interval_ms", self.blink_interval_ms)?;
        positive("settle_pause_ms", self.settle_pause_ms)?;
        positive("next_draw_pause_ms", self.next_draw_pause_ms)?;
        positive("finish_pause_ms", self.finish_pause_ms)?;

        if self.scan_slow_delay_ms < self.scan_fast_delay_ms {
            return Err(ConfigError::OutOfRange {
                field: "scan_slow_delay_ms",
                requirement: "at least scan_fast_delay_ms",
                value: self.scan_slow_delay_ms.to_string(),
            });
        }
        if !(self.scan_growth_factor.is_finite() && self.scan_growth_factor > 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "scan_growth_factor",
                requirement: "a finite number greater than 1.0",
                value: self.scan_growth_factor.to_string(),
            });
        }
        if !(self.rollout_factor.is_finite() && self.rollout_factor >= 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "rollout_factor",
                requirement: "a finite number of at least 0.0",
                value: self.rollout_factor.to_string(),
            });
        }
        Ok(())
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    pub fn settle_pause(&self) -> Duration {
        Duration::from_millis(self.settle_pause_ms)
    }

    pub fn next_draw_pause(&self) -> Duration {
        Duration::from_millis(self.next_draw_pause_ms)
    }

    pub fn finish_pause(&self) -> Duration {
        Duration::from_millis(self.finish_pause_ms)
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::OutOfRange {
            field,
            requirement: "greater than 0",
            value: value.to_string(),
        });
    }
    Ok(())
}
