//! Engine configuration with environment overrides.
//!
//! Every knob has a production default; `BOXSCAN_*` variables override
//! individual fields for station tuning without a redeploy. Unparsable
//! values fall back to the default rather than failing startup.

use std::time::Duration;

use crate::capture::{CaptureConfig, Facing};
use crate::scan::DecodeGate;

fn parse_env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_env_facing(name: &str, default: Facing) -> Facing {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<Facing>().ok())
        .unwrap_or(default)
}

/// Top-level engine knobs: capture geometry plus loop pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Camera request handed to the capture session.
    pub capture: CaptureConfig,
    /// Pacing between empty scan cycles.
    pub frame_interval: Duration,
    /// Post-accept debounce shared by camera and manual paths.
    pub debounce_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            capture: CaptureConfig::default(),
            frame_interval: Duration::from_millis(33),
            debounce_window: DecodeGate::DEFAULT_DEBOUNCE,
        }
    }
}

impl EngineConfig {
    /// Defaults with `BOXSCAN_*` overrides applied.
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        let capture = CaptureConfig {
            facing: parse_env_facing("BOXSCAN_CAMERA_FACING", defaults.capture.facing),
            width: parse_env_u32("BOXSCAN_CAPTURE_WIDTH", defaults.capture.width),
            height: parse_env_u32("BOXSCAN_CAPTURE_HEIGHT", defaults.capture.height),
            frame_rate: parse_env_u32("BOXSCAN_FRAME_RATE", defaults.capture.frame_rate)
                .clamp(1, 120),
            open_timeout: Duration::from_millis(parse_env_u64(
                "BOXSCAN_OPEN_TIMEOUT_MS",
                defaults.capture.open_timeout.as_millis() as u64,
            )),
        };
        EngineConfig {
            capture,
            frame_interval: Duration::from_millis(
                parse_env_u64(
                    "BOXSCAN_FRAME_INTERVAL_MS",
                    defaults.frame_interval.as_millis() as u64,
                )
                .clamp(5, 1000),
            ),
            debounce_window: Duration::from_millis(parse_env_u64(
                "BOXSCAN_DEBOUNCE_MS",
                defaults.debounce_window.as_millis() as u64,
            )),
        }
    }

    /// A gate configured with this engine's debounce window.
    pub fn gate(&self) -> DecodeGate {
        DecodeGate::new(self.debounce_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.capture.facing, Facing::Rear);
        assert_eq!(config.frame_interval, Duration::from_millis(33));
        assert_eq!(config.debounce_window, Duration::from_millis(1500));
    }

    #[test]
    fn test_gate_uses_configured_window() {
        let config = EngineConfig {
            debounce_window: Duration::ZERO,
            ..EngineConfig::default()
        };
        let mut gate = config.gate();
        assert!(gate.try_begin());
        gate.finish(true);
        assert!(gate.try_begin(), "zero window must not block the next decode");
    }
}
