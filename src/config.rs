use crate::error::{DResult, DetectorError};
use crate::threshold::ThresholdParameters;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Detection engine configuration.
///
/// Every field has a default so a partial JSON file only needs the values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub threshold: ThresholdParameters,
    /// Sliding window size (~1 s at 50 Hz)
    pub buffer_capacity: usize,
    /// Samples required before any detection logic runs
    pub min_history: usize,
    /// Sub-window width on each side of the peak
    pub extremum_window: usize,
    /// Minimum gap between accepted detections
    pub cooldown_ms: i64,
    /// Driving gate, strict greater-than (km/h)
    pub driving_speed_kmh: f64,
    /// Max length of `raw_signature_window` in emitted events
    pub signature_len: usize,
    /// When false, crossings emit without local extrema (fixed-threshold mode)
    pub feature_extraction: bool,
    /// Skip crossings while no position fix has been received
    pub require_location: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdParameters::default(),
            buffer_capacity: 50,
            min_history: 10,
            extremum_window: 5,
            cooldown_ms: 3000,
            driving_speed_kmh: 10.0,
            signature_len: 20,
            feature_extraction: true,
            require_location: true,
        }
    }
}

impl DetectorConfig {
    /// Plain magnitude detector: constant threshold, no extrema extraction
    pub fn fixed_threshold(threshold: f64) -> Self {
        Self {
            threshold: ThresholdParameters::fixed(threshold),
            feature_extraction: false,
            ..Self::default()
        }
    }

    /// Load from a JSON file, then validate
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> DResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: DetectorConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DResult<()> {
        let t = &self.threshold;
        if !(t.base.is_finite() && t.speed_scale.is_finite() && t.speed_offset.is_finite()) {
            return Err(invalid("threshold parameters must be finite"));
        }
        if t.speed_scale < 0.0 {
            return Err(invalid("speed_scale must not be negative"));
        }
        if self.cooldown_ms < 0 {
            return Err(invalid(format!("cooldown_ms must not be negative (got {})", self.cooldown_ms)));
        }
        if !self.driving_speed_kmh.is_finite() {
            return Err(invalid("driving_speed_kmh must be finite"));
        }
        if self.buffer_capacity == 0 {
            return Err(invalid("buffer_capacity must be at least 1"));
        }
        if self.min_history > self.buffer_capacity {
            return Err(invalid(format!(
                "min_history ({}) exceeds buffer_capacity ({})",
                self.min_history, self.buffer_capacity
            )));
        }
        if self.min_history <= self.extremum_window {
            return Err(invalid(format!(
                "min_history ({}) must be larger than extremum_window ({})",
                self.min_history, self.extremum_window
            )));
        }
        if self.signature_len == 0 {
            return Err(invalid("signature_len must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> DetectorError {
    DetectorError::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let config = DetectorConfig {
            cooldown_ms: -1,
            ..DetectorConfig::default()
        };
        assert!(matches!(config.validate(), Err(DetectorError::InvalidConfig(_))));
    }

    #[test]
    fn test_history_must_cover_extremum_window() {
        let config = DetectorConfig {
            min_history: 5,
            extremum_window: 5,
            ..DetectorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = DetectorConfig {
            min_history: 60,
            ..DetectorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let mut config = DetectorConfig::default();
        config.threshold.base = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fixed_threshold_preset() {
        let config = DetectorConfig::fixed_threshold(12.0);
        assert_eq!(config.threshold.speed_scale, 0.0);
        assert!(!config.feature_extraction);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cooldown_ms": 1500, "threshold": {{"base": 9.0}}}}"#).unwrap();

        let config = DetectorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.cooldown_ms, 1500);
        assert_eq!(config.threshold.base, 9.0);
        assert_eq!(config.threshold.speed_scale, 0.1);
        assert_eq!(config.buffer_capacity, 50);
    }

    #[test]
    fn test_invalid_json_file_refused() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cooldown_ms": -20}}"#).unwrap();
        assert!(DetectorConfig::from_json_file(file.path()).is_err());
    }
}
