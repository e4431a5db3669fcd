use crate::buffer::SlidingWindowBuffer;
use serde::{Deserialize, Serialize};

/// Features of one candidate crossing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PotholeFeatures {
    pub peak_z: f64,
    /// Largest-magnitude value in the sub-window before the peak (sign kept)
    pub prev_extremum: f64,
    /// Largest-magnitude value in the sub-window after the peak (sign kept)
    pub next_extremum: f64,
    pub interval_since_last_ms: i64,
    pub speed_kmh: f64,
}

/// Local-extrema feature extraction around a threshold crossing.
///
/// The peak is normally the newest buffered sample, so the following side is
/// clamped to what has arrived; when nothing follows the peak its own value
/// stands in. The preceding side must be fully populated.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    window: usize,
}

impl FeatureExtractor {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Returns `None` when the preceding sub-window does not fit in the buffer.
    ///
    /// `last_detection_ms = None` means no prior detection; the interval is
    /// then measured from the sample clock's epoch.
    pub fn extract(
        &self,
        buffer: &SlidingWindowBuffer,
        peak_index: usize,
        speed_kmh: f64,
        now_ms: i64,
        last_detection_ms: Option<i64>,
    ) -> Option<PotholeFeatures> {
        let values = buffer.snapshot();
        let peak_z = *values.get(peak_index)?;

        if peak_index < self.window {
            return None;
        }
        let prev_extremum = max_abs(values.range(peak_index - self.window..peak_index))?;

        let next_end = (peak_index + 1 + self.window).min(values.len());
        let next_extremum =
            max_abs(values.range(peak_index + 1..next_end)).unwrap_or(peak_z);

        Some(PotholeFeatures {
            peak_z,
            prev_extremum,
            next_extremum,
            interval_since_last_ms: now_ms.saturating_sub(last_detection_ms.unwrap_or(0)),
            speed_kmh,
        })
    }

    /// Features for the fixed-threshold mode: the peak stands in for both extrema
    pub fn peak_only(
        peak_z: f64,
        speed_kmh: f64,
        now_ms: i64,
        last_detection_ms: Option<i64>,
    ) -> PotholeFeatures {
        PotholeFeatures {
            peak_z,
            prev_extremum: peak_z,
            next_extremum: peak_z,
            interval_since_last_ms: now_ms.saturating_sub(last_detection_ms.unwrap_or(0)),
            speed_kmh,
        }
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(5)
    }
}

/// First value of largest magnitude, sign preserved
fn max_abs<'a>(values: impl Iterator<Item = &'a f64>) -> Option<f64> {
    values.copied().fold(None, |best, v| match best {
        Some(b) if v.abs() <= f64::abs(b) => Some(b),
        _ => Some(v),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_of(values: &[f64]) -> SlidingWindowBuffer {
        let mut buffer = SlidingWindowBuffer::new(50);
        for v in values {
            buffer.push(*v);
        }
        buffer
    }

    #[test]
    fn test_extrema_around_newest_peak() {
        let buffer = buffer_of(&[0.1, 0.2, 0.3, -8.2, 1.0, 0.5, 2.0, 15.5]);
        let extractor = FeatureExtractor::default();

        let features = extractor.extract(&buffer, 7, 44.2, 10_000, Some(5_000)).unwrap();
        assert_eq!(features.peak_z, 15.5);
        assert_eq!(features.prev_extremum, -8.2);
        assert_eq!(features.next_extremum, 15.5);
        assert_eq!(features.interval_since_last_ms, 5_000);
        assert_eq!(features.speed_kmh, 44.2);
    }

    #[test]
    fn test_following_side_uses_samples_after_peak() {
        let buffer = buffer_of(&[0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 12.0, -9.1, 4.0, 0.0]);
        let extractor = FeatureExtractor::default();

        let features = extractor.extract(&buffer, 6, 30.0, 100, None).unwrap();
        assert_eq!(features.prev_extremum, 3.0);
        assert_eq!(features.next_extremum, -9.1);
        assert_eq!(features.interval_since_last_ms, 100);
    }

    #[test]
    fn test_short_history_fails() {
        let buffer = buffer_of(&[0.0, 0.0, 0.0, 0.0, 14.0]);
        let extractor = FeatureExtractor::default();
        assert!(extractor.extract(&buffer, 4, 30.0, 0, None).is_none());
    }

    #[test]
    fn test_out_of_range_peak_fails() {
        let buffer = buffer_of(&[0.0; 12]);
        let extractor = FeatureExtractor::default();
        assert!(extractor.extract(&buffer, 12, 30.0, 0, None).is_none());
    }

    #[test]
    fn test_ties_keep_first_value() {
        assert_eq!(max_abs([2.0, -2.0, 1.0].iter()), Some(2.0));
        assert_eq!(max_abs([-3.0, 3.0].iter()), Some(-3.0));
        assert_eq!(max_abs(std::iter::empty()), None);
    }

    #[test]
    fn test_peak_only_features() {
        let features = FeatureExtractor::peak_only(13.0, 25.0, 9_000, Some(4_000));
        assert_eq!(features.prev_extremum, 13.0);
        assert_eq!(features.next_extremum, 13.0);
        assert_eq!(features.interval_since_last_ms, 5_000);
    }

    #[test]
    fn test_interval_saturates_on_clock_underflow() {
        let features = FeatureExtractor::peak_only(13.0, 25.0, i64::MIN, Some(4_000));
        assert_eq!(features.interval_since_last_ms, i64::MIN);
    }
}
