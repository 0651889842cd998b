//! System configuration parameters
//!
//! All tunable parameters for the Waterly node.  Defaults match the
//! reference deployment; a partial JSON document can override any subset
//! of fields (see [`SystemConfig::from_json`]).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::control::sequencer::{MeasurementSequencer, SequencerSettings};
use crate::sensors::registers::{BulbCurrent, Gain};

/// Version-manifest location checked by the update client.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/LManuXx/Waterly/main/waterly/version.json";

/// Upper bound for [`SystemConfig::poll_margin_ms`].
pub const MAX_POLL_MARGIN_MS: u32 = 5000;
/// Upper bound for [`SystemConfig::bulb_settle_ms`].
pub const MAX_BULB_SETTLE_MS: u32 = 5000;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Sampling ---
    /// Period between training-mode measurement cycles (milliseconds)
    pub sampling_period_ms: u32,
    /// Deep-sleep duration after a stop command (seconds)
    pub deep_sleep_secs: u32,

    // --- Acquisition ---
    /// Illumination bulb drive current during a cycle
    pub bulb_current: BulbCurrent,
    /// Analog gain for one-shot acquisitions
    pub gain: Gain,
    /// Integration time in 2.8 ms units
    pub integration_units: u8,
    /// Light-stabilisation delay after switching the bulb on (milliseconds)
    pub bulb_settle_ms: u32,
    /// Data-ready poll interval (milliseconds)
    pub poll_interval_ms: u32,
    /// Extra data-ready budget on top of the conversion time (milliseconds)
    pub poll_margin_ms: u32,

    // --- Controller timing ---
    /// Yield in Idle between event checks (milliseconds)
    pub idle_yield_ms: u32,
    /// Log/telemetry flush before deep sleep (milliseconds)
    pub sleep_flush_ms: u32,
    /// Pause showing the update result before restarting (milliseconds)
    pub update_grace_ms: u32,
    /// Task watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,

    // --- Update ---
    /// Version of this build, compared against the manifest
    pub firmware_version: u32,
    pub update_manifest_url: heapless::String<128>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut update_manifest_url = heapless::String::new();
        // Fits: the constant is shorter than the capacity.
        let _ = update_manifest_url.push_str(DEFAULT_MANIFEST_URL);

        Self {
            // Sampling
            sampling_period_ms: 3000,
            deep_sleep_secs: 60,

            // Acquisition
            bulb_current: BulbCurrent::Ma12_5,
            gain: Gain::X64,
            integration_units: 50, // 140 ms
            bulb_settle_ms: 50,
            poll_interval_ms: 10,
            poll_margin_ms: 500,

            // Controller timing
            idle_yield_ms: 100,
            sleep_flush_ms: 1000,
            update_grace_ms: 3000,
            watchdog_timeout_ms: 10_000,

            // Update
            firmware_version: 1,
            update_manifest_url,
        }
    }
}

impl SystemConfig {
    /// Parse a (possibly partial) JSON override on top of the defaults and
    /// validate the result.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Malformed)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deep-sleep duration in microseconds, as the sleep timer expects it.
    pub fn deep_sleep_us(&self) -> u64 {
        u64::from(self.deep_sleep_secs) * 1_000_000
    }

    /// Worst-case time one measurement cycle spends waiting: the bulb
    /// settle plus a data-ready poll that never succeeds.
    pub fn measurement_wait_ms(&self) -> u32 {
        let sequencer = MeasurementSequencer::new(SequencerSettings::from_config(self));
        let poll = sequencer.poll_policy(self.integration_units).budget_ms();
        self.bulb_settle_ms.saturating_add(poll)
    }

    /// Range-check every field.  Out-of-range values are rejected, never
    /// clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_period_ms < 100 {
            return Err(ConfigError::ValidationFailed(
                "sampling_period_ms must be >= 100",
            ));
        }
        if self.deep_sleep_secs == 0 {
            return Err(ConfigError::ValidationFailed("deep_sleep_secs must be > 0"));
        }
        if self.integration_units == 0 {
            return Err(ConfigError::ValidationFailed(
                "integration_units must be > 0",
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 1000 {
            return Err(ConfigError::ValidationFailed(
                "poll_interval_ms must be 1-1000",
            ));
        }
        if self.poll_margin_ms > MAX_POLL_MARGIN_MS {
            return Err(ConfigError::ValidationFailed(
                "poll_margin_ms must be <= 5000",
            ));
        }
        if self.bulb_settle_ms > MAX_BULB_SETTLE_MS {
            return Err(ConfigError::ValidationFailed(
                "bulb_settle_ms must be <= 5000",
            ));
        }
        // Every blocking wait in one iteration must end before the watchdog.
        let longest_wait = self
            .sampling_period_ms
            .max(self.idle_yield_ms)
            .max(self.measurement_wait_ms())
            .max(self.sleep_flush_ms)
            .max(self.update_grace_ms);
        if self.watchdog_timeout_ms <= longest_wait {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must exceed every controller delay",
            ));
        }
        if self.update_manifest_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "update_manifest_url must not be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let c = SystemConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.deep_sleep_us(), 60_000_000);
        assert_eq!(c.update_manifest_url.as_str(), DEFAULT_MANIFEST_URL);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let c = SystemConfig::from_json(r#"{"sampling_period_ms": 5000, "gain": "X16"}"#).unwrap();
        assert_eq!(c.sampling_period_ms, 5000);
        assert_eq!(c.gain, Gain::X16);
        assert_eq!(c.integration_units, 50);
        assert_eq!(c.firmware_version, 1);
    }

    #[test]
    fn malformed_override_is_rejected() {
        assert_eq!(
            SystemConfig::from_json("{sampling_period_ms"),
            Err(ConfigError::Malformed)
        );
    }

    #[test]
    fn out_of_range_values_are_rejected_not_clamped() {
        let r = SystemConfig::from_json(r#"{"integration_units": 0}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));

        let r = SystemConfig::from_json(r#"{"poll_interval_ms": 0}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn watchdog_must_outlast_the_sampling_period() {
        let r = SystemConfig::from_json(r#"{"sampling_period_ms": 12000}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));
        let ok = SystemConfig::from_json(
            r#"{"sampling_period_ms": 12000, "watchdog_timeout_ms": 15000}"#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn oversized_poll_margin_is_rejected() {
        let r = SystemConfig::from_json(r#"{"poll_margin_ms": 4294967295}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));
        let r = SystemConfig::from_json(r#"{"poll_margin_ms": 5001}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));
        assert!(SystemConfig::from_json(r#"{"poll_margin_ms": 5000}"#).is_ok());
    }

    #[test]
    fn idle_yield_must_fit_the_watchdog() {
        let r = SystemConfig::from_json(r#"{"idle_yield_ms": 20000}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn bulb_settle_must_fit_the_watchdog() {
        let r = SystemConfig::from_json(r#"{"bulb_settle_ms": 6000}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));
        let r = SystemConfig::from_json(r#"{"bulb_settle_ms": 5000, "watchdog_timeout_ms": 5500}"#);
        assert!(matches!(r, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn data_ready_budget_must_fit_the_watchdog() {
        // 255 units: ceil(255 × 2.8 × 3) = 2142 ms, + 5000 ms margin.
        let cfg = SystemConfig {
            integration_units: 255,
            poll_margin_ms: 5000,
            watchdog_timeout_ms: 7000,
            ..SystemConfig::default()
        };
        assert!(cfg.measurement_wait_ms() > 7000);
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationFailed(_))));

        let cfg = SystemConfig {
            watchdog_timeout_ms: 10_000,
            ..cfg
        };
        assert!(cfg.validate().is_ok());
    }
}
