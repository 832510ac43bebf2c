//! Runtime tunables for persistence and reorder behavior.
//!
//! # Responsibility
//! - Define defaults for debounce windows and autoscroll geometry.
//! - Parse and validate caller-provided overrides.
//!
//! # Invariants
//! - Debounce windows are non-zero.
//! - The order window is never shorter than the edit window.
//! - Autoscroll band and step are positive and finite.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const DEFAULT_EDIT_DEBOUNCE_MS: u64 = 120;
const DEFAULT_ORDER_DEBOUNCE_MS: u64 = 250;
const DEFAULT_EDGE_BAND_PX: f64 = 60.0;
const DEFAULT_MAX_STEP_PX: f64 = 18.0;

/// Configuration validation/parse failure.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    ZeroWindow(&'static str),
    OrderWindowTooShort { edit_ms: u64, order_ms: u64 },
    InvalidAutoscroll(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::ZeroWindow(name) => write!(f, "debounce window `{name}` must be > 0"),
            Self::OrderWindowTooShort { edit_ms, order_ms } => write!(
                f,
                "order debounce ({order_ms}ms) must not be shorter than edit debounce ({edit_ms}ms)"
            ),
            Self::InvalidAutoscroll(name) => {
                write!(f, "autoscroll `{name}` must be a positive finite number")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Debounce windows for the write coalescer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoalescerConfig {
    /// Quiet period before per-record snapshots are written.
    pub edit_debounce_ms: u64,
    /// Quiet period before the collection order is written.
    pub order_debounce_ms: u64,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            edit_debounce_ms: DEFAULT_EDIT_DEBOUNCE_MS,
            order_debounce_ms: DEFAULT_ORDER_DEBOUNCE_MS,
        }
    }
}

impl CoalescerConfig {
    pub fn edit_window(&self) -> Duration {
        Duration::from_millis(self.edit_debounce_ms)
    }

    pub fn order_window(&self) -> Duration {
        Duration::from_millis(self.order_debounce_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.edit_debounce_ms == 0 {
            return Err(ConfigError::ZeroWindow("edit_debounce_ms"));
        }
        if self.order_debounce_ms == 0 {
            return Err(ConfigError::ZeroWindow("order_debounce_ms"));
        }
        if self.order_debounce_ms < self.edit_debounce_ms {
            return Err(ConfigError::OrderWindowTooShort {
                edit_ms: self.edit_debounce_ms,
                order_ms: self.order_debounce_ms,
            });
        }
        Ok(())
    }
}

/// Edge-band autoscroll geometry, in the host's vertical units.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutoscrollConfig {
    /// Height of the active band inside the top and bottom viewport edges.
    pub edge_band_px: f64,
    /// Scroll distance per frame at the very edge.
    pub max_step_px: f64,
}

impl Default for AutoscrollConfig {
    fn default() -> Self {
        Self {
            edge_band_px: DEFAULT_EDGE_BAND_PX,
            max_step_px: DEFAULT_MAX_STEP_PX,
        }
    }
}

impl AutoscrollConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.edge_band_px.is_finite() && self.edge_band_px > 0.0) {
            return Err(ConfigError::InvalidAutoscroll("edge_band_px"));
        }
        if !(self.max_step_px.is_finite() && self.max_step_px > 0.0) {
            return Err(ConfigError::InvalidAutoscroll("max_step_px"));
        }
        Ok(())
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub coalescer: CoalescerConfig,
    pub autoscroll: AutoscrollConfig,
}

impl CoreConfig {
    /// Parses a JSON document; absent keys keep their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coalescer.validate()?;
        self.autoscroll.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};

    #[test]
    fn empty_document_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").expect("empty object should parse");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.coalescer.edit_debounce_ms, 120);
        assert_eq!(config.coalescer.order_debounce_ms, 250);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = CoreConfig::from_json_str(r#"{"coalescer": {"edit_debounce_ms": 150}}"#)
            .expect("partial override should parse");
        assert_eq!(config.coalescer.edit_debounce_ms, 150);
        assert_eq!(config.coalescer.order_debounce_ms, 250);
        assert_eq!(config.autoscroll.max_step_px, 18.0);
    }

    #[test]
    fn order_window_shorter_than_edit_window_is_rejected() {
        let err = CoreConfig::from_json_str(
            r#"{"coalescer": {"edit_debounce_ms": 300, "order_debounce_ms": 200}}"#,
        )
        .expect_err("inverted windows must be rejected");
        assert!(matches!(
            err,
            ConfigError::OrderWindowTooShort {
                edit_ms: 300,
                order_ms: 200
            }
        ));
    }

    #[test]
    fn zero_band_is_rejected() {
        let err = CoreConfig::from_json_str(r#"{"autoscroll": {"edge_band_px": 0}}"#)
            .expect_err("zero band must be rejected");
        assert!(matches!(err, ConfigError::InvalidAutoscroll("edge_band_px")));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = CoreConfig::from_json_str("{").expect_err("truncated json must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
