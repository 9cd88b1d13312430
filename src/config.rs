//! Configuration loaded from `pipetime.toml`
//!
//! # Example pipetime.toml
//!
//! ```toml
//! [export]
//! pretty = true
//! time_precision = 3
//! percentage_precision = 2
//!
//! [timeline]
//! resolution_secs = 0.1
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Highest number of decimal places accepted for exported values
pub const MAX_PRECISION: u32 = 9;

/// Finest stacked-timeline bucket width accepted from configuration
pub const MIN_RESOLUTION_SECS: f64 = 0.001;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipetimeConfig {
    pub export: ExportConfig,
    pub timeline: TimelineConfig,
}

/// Snapshot export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Indent the exported JSON
    pub pretty: bool,
    /// Decimal places for times (seconds)
    pub time_precision: u32,
    /// Decimal places for percentages
    pub percentage_precision: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            time_precision: 3,
            percentage_precision: 2,
        }
    }
}

/// Stacked timeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Bucket width in seconds
    pub resolution_secs: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            resolution_secs: 0.1,
        }
    }
}

impl TimelineConfig {
    /// Bucket width as a [`Duration`]; call after [`PipetimeConfig::validate`]
    pub fn resolution(&self) -> Duration {
        Duration::try_from_secs_f64(self.resolution_secs).unwrap_or(Duration::from_millis(100))
    }
}

impl PipetimeConfig {
    /// Load configuration from a TOML file
    ///
    /// ```no_run
    /// use pipetime::config::PipetimeConfig;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = PipetimeConfig::from_file("pipetime.toml")?;
    /// println!("resolution: {}s", config.timeline.resolution_secs);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        let resolution = self.timeline.resolution_secs;
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(format!(
                "timeline.resolution_secs must be a positive number, got {}",
                resolution
            ));
        }

        if resolution < MIN_RESOLUTION_SECS {
            return Err(format!(
                "timeline.resolution_secs must be >= {}, got {}",
                MIN_RESOLUTION_SECS, resolution
            ));
        }

        if self.export.time_precision > MAX_PRECISION {
            return Err(format!(
                "export.time_precision must be <= {}, got {}",
                MAX_PRECISION, self.export.time_precision
            ));
        }

        if self.export.percentage_precision > MAX_PRECISION {
            return Err(format!(
                "export.percentage_precision must be <= {}, got {}",
                MAX_PRECISION, self.export.percentage_precision
            ));
        }

        Ok(())
    }
}
