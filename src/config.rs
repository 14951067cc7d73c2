//! Configuration for sensors and registration, stored as JSON.
//!
//! Each sensor profile bundles the identification and wire settings of one physical device along
//! with the assembly thresholds tied to its rotation speed. `AppConfig` fields all fall back to
//! defaults, so a file only needs to mention what it changes. A sensor profile which is present,
//! however, must be complete.

use crate::geom2::align2::IcpOptions;
use crate::{Result, SensorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection and assembly settings for one sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorProfile {
    pub kind: SensorKind,

    /// Substring of the serial device's hardware id which identifies this sensor
    pub hwid: String,

    pub baud_rate: u32,

    /// Serial read timeout. This also bounds how long a stop request can go unnoticed.
    pub timeout_ms: u64,

    /// A scan must hold more than this many points to be emitted
    pub min_scan_points: usize,

    /// Length of the wall-clock read window for sensors assembled in time-boxed batches
    pub batch_window_ms: u64,

    /// Motor PWM duty written at start-up, for sensors with a controllable motor
    pub motor_pwm: u16,

    /// Pause after a device reset before the input buffer is cleared
    pub reset_delay_ms: u64,

    /// Reject packets which fail the protocol's sync/checksum test
    pub verify_checksum: bool,
}

impl SensorProfile {
    /// The STL27L streams frames as soon as it is powered, at roughly 21600 samples per second.
    /// A 100 ms window therefore sees a little over 2000 points when the sensor is healthy.
    pub fn stl27l() -> Self {
        Self {
            kind: SensorKind::Stl27l,
            hwid: "1C6DF6D68E44ED11BFABCEC90A86E0B4".to_string(),
            baud_rate: 921_600,
            timeout_ms: 500,
            min_scan_points: 2000,
            batch_window_ms: 100,
            motor_pwm: 0,
            reset_delay_ms: 0,
            verify_checksum: false,
        }
    }

    pub fn a2m8() -> Self {
        Self {
            kind: SensorKind::A2m8,
            hwid: "0001".to_string(),
            baud_rate: 115_200,
            timeout_ms: 1000,
            min_scan_points: 100,
            batch_window_ms: 0,
            motor_pwm: 660,
            reset_delay_ms: 2000,
            verify_checksum: false,
        }
    }

    pub fn for_kind(kind: SensorKind) -> Self {
        match kind {
            SensorKind::Stl27l => Self::stl27l(),
            SensorKind::A2m8 => Self::a2m8(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

fn default_sensors() -> Vec<SensorProfile> {
    vec![SensorProfile::a2m8(), SensorProfile::stl27l()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensors: Vec<SensorProfile>,
    pub icp: IcpOptions,

    /// Directory receiving full scans written during capture
    pub scans_dir: PathBuf,

    /// Directory holding cropped slices used for registration and analysis
    pub slices_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sensors: default_sensors(),
            icp: IcpOptions::default(),
            scans_dir: PathBuf::from("Scans"),
            slices_dir: PathBuf::from("Slices"),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Returns the configured profile for `kind`, or the built-in preset if the file doesn't
    /// mention that sensor.
    pub fn sensor(&self, kind: SensorKind) -> SensorProfile {
        self.sensors
            .iter()
            .find(|s| s.kind == kind)
            .cloned()
            .unwrap_or_else(|| SensorProfile::for_kind(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom2::align2::Minimizer;

    #[test]
    fn partial_file_uses_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"scans_dir": "/tmp/scans"}"#).unwrap();
        assert_eq!(config.scans_dir, PathBuf::from("/tmp/scans"));
        assert_eq!(config.slices_dir, PathBuf::from("Slices"));
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.icp.seeds.len(), 9);
        assert_eq!(config.icp.minimizer, Minimizer::Bfgs);
    }

    #[test]
    fn sensor_override_replaces_preset() {
        let mut profile = SensorProfile::stl27l();
        profile.min_scan_points = 1500;
        let config = AppConfig {
            sensors: vec![profile],
            ..AppConfig::default()
        };

        let text = serde_json::to_string(&config).unwrap();
        let back: AppConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back.sensor(SensorKind::Stl27l).min_scan_points, 1500);
        assert_eq!(back.sensor(SensorKind::A2m8), SensorProfile::a2m8());
    }

    #[test]
    fn sensor_kind_is_lowercase_in_json() {
        let text = serde_json::to_string(&SensorProfile::a2m8()).unwrap();
        assert!(text.contains(r#""kind":"a2m8""#));
    }
}
