use serde::{Deserialize, Serialize};

/// Coefficients of the speed-adaptive threshold `T = base + speed_scale * (v - speed_offset)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParameters {
    /// Threshold at `speed_offset` km/h (m/s²)
    pub base: f64,
    /// Threshold increase per km/h
    pub speed_scale: f64,
    /// Speed (km/h) at which the threshold equals `base`
    pub speed_offset: f64,
}

impl Default for ThresholdParameters {
    fn default() -> Self {
        Self {
            base: 8.0,
            speed_scale: 0.1,
            speed_offset: 5.0,
        }
    }
}

impl ThresholdParameters {
    /// Speed-independent threshold (degenerate fixed-magnitude detector)
    pub fn fixed(base: f64) -> Self {
        Self {
            base,
            speed_scale: 0.0,
            speed_offset: 0.0,
        }
    }
}

/// Linear speed-to-threshold model.
///
/// The vertical acceleration noise floor grows with vehicle speed, so a single
/// fixed threshold misses hits at low speed and over-reports at high speed.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdModel {
    params: ThresholdParameters,
}

impl ThresholdModel {
    pub fn new(params: ThresholdParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ThresholdParameters {
        &self.params
    }

    pub fn base(&self) -> f64 {
        self.params.base
    }

    /// Detection threshold (m/s²) for the given speed in km/h
    pub fn threshold(&self, speed_kmh: f64) -> f64 {
        self.params.base + self.params.speed_scale * (speed_kmh - self.params.speed_offset)
    }
}

impl Default for ThresholdModel {
    fn default() -> Self {
        Self::new(ThresholdParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_threshold_at_rest() {
        let model = ThresholdModel::default();
        assert_relative_eq!(model.threshold(0.0), 7.5, epsilon = 1e-9);
        assert_relative_eq!(model.threshold(5.0), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_threshold_at_highway_speed() {
        let model = ThresholdModel::default();
        assert_relative_eq!(model.threshold(44.2), 11.92, epsilon = 1e-9);
    }

    #[test]
    fn test_threshold_strictly_increasing() {
        let model = ThresholdModel::default();
        let speeds = [0.0, 0.5, 10.0, 10.01, 44.2, 80.0, 130.0];
        for pair in speeds.windows(2) {
            assert!(model.threshold(pair[1]) > model.threshold(pair[0]));
        }
    }

    #[test]
    fn test_fixed_threshold_ignores_speed() {
        let model = ThresholdModel::new(ThresholdParameters::fixed(12.0));
        assert_eq!(model.threshold(0.0), 12.0);
        assert_eq!(model.threshold(120.0), 12.0);
    }
}
