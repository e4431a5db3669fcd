use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::{interval, Duration, Instant};

/// One accelerometer reading paired with the current speed.
///
/// `timestamp_ms` is a monotonic clock in milliseconds; only differences are meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub speed_kmh: f64,
}

impl Sample {
    pub fn new(timestamp_ms: i64, accel_x: f64, accel_y: f64, accel_z: f64, speed_kmh: f64) -> Self {
        Self {
            timestamp_ms,
            accel_x,
            accel_y,
            accel_z,
            speed_kmh,
        }
    }

    /// Vertical-only sample, the common case in tests and replays
    pub fn vertical(timestamp_ms: i64, accel_z: f64, speed_kmh: f64) -> Self {
        Self::new(timestamp_ms, 0.0, 0.0, accel_z, speed_kmh)
    }

    pub fn is_finite(&self) -> bool {
        self.accel_x.is_finite()
            && self.accel_y.is_finite()
            && self.accel_z.is_finite()
            && self.speed_kmh.is_finite()
    }

    pub fn accel(&self) -> AccelVector {
        AccelVector {
            x: self.accel_x,
            y: self.accel_y,
            z: self.accel_z,
        }
    }
}

/// Raw accelerometer triple as carried on every event record
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccelVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelVector {
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Last known position fix
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, altitude: Option<f64>, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            accuracy,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.altitude.map_or(true, f64::is_finite)
            && self.accuracy.map_or(true, f64::is_finite)
    }
}

/// Inbound sensor traffic, delivered to the engine in arrival order
#[derive(Clone, Debug, PartialEq)]
pub enum SensorMessage {
    Sample(Sample),
    Location(Location),
}

/// Synthetic drive used when no hardware feed is attached
#[derive(Clone, Debug)]
pub struct DriveProfile {
    pub cruise_speed_kmh: f64,
    /// Seconds between simulated potholes
    pub pothole_every_secs: f64,
    pub pothole_peak: f64,
    pub start_latitude: f64,
    pub start_longitude: f64,
}

impl Default for DriveProfile {
    fn default() -> Self {
        Self {
            cruise_speed_kmh: 40.0,
            pothole_every_secs: 7.0,
            pothole_peak: 15.0,
            start_latitude: 19.0760,
            start_longitude: 72.8777,
        }
    }
}

impl DriveProfile {
    /// Linear vertical acceleration and speed at `t` seconds into the drive
    pub fn sample_at(&self, t: f64, timestamp_ms: i64) -> Sample {
        use std::f64::consts::PI;

        // ramp up over the first 10 s, then cruise with a slow wobble
        let speed = if t < 10.0 {
            self.cruise_speed_kmh * t / 10.0
        } else {
            self.cruise_speed_kmh + (t * 0.2).sin() * 5.0
        };

        let mut z = (t * 2.0 * PI * 3.0).sin() * 0.6 + (t * 2.0 * PI * 7.0).cos() * 0.3;

        // decaying ring after each hit
        let since_hit = t % self.pothole_every_secs;
        if t > self.pothole_every_secs && since_hit < 0.3 {
            let decay = (-since_hit * 12.0).exp();
            z += self.pothole_peak * decay * (since_hit * 2.0 * PI * 8.0).cos();
        }

        Sample {
            timestamp_ms,
            accel_x: (t * 2.0 * PI).sin() * 0.5,
            accel_y: (t * 2.0 * PI).cos() * 0.3,
            accel_z: z,
            speed_kmh: speed.max(0.0),
        }
    }

    pub fn location_at(&self, t: f64) -> Location {
        // ~11 m per 1e-4 degree; good enough for a synthetic track
        let meters = self.cruise_speed_kmh / 3.6 * t;
        Location {
            latitude: self.start_latitude + meters / 111_000.0,
            longitude: self.start_longitude,
            altitude: Some(14.0),
            accuracy: Some(5.0 + (t * 0.1).sin() * 2.0),
        }
    }
}

pub async fn sample_loop(tx: Sender<SensorMessage>, profile: DriveProfile) {
    let mut interval = interval(Duration::from_millis(20)); // ~50Hz sampling
    let start = Instant::now();
    let mut sample_count = 0u64;

    loop {
        interval.tick().await;

        let elapsed = start.elapsed();
        let sample = profile.sample_at(elapsed.as_secs_f64(), elapsed.as_millis() as i64);

        match tx.try_send(SensorMessage::Sample(sample)) {
            Ok(_) => {
                sample_count += 1;
                if sample_count % 500 == 0 {
                    log::debug!("[accel] {} samples", sample_count);
                }
            }
            Err(TrySendError::Closed(_)) => {
                log::info!("[accel] Channel closed after {} samples", sample_count);
                break;
            }
            Err(TrySendError::Full(_)) => {
                // Channel full, drop this sample
            }
        }
    }
}

pub async fn location_loop(tx: Sender<SensorMessage>, profile: DriveProfile) {
    let mut interval = interval(Duration::from_secs(1));
    let start = Instant::now();
    let mut fix_count = 0u64;

    loop {
        interval.tick().await;

        let location = profile.location_at(start.elapsed().as_secs_f64());
        match tx.try_send(SensorMessage::Location(location)) {
            Ok(_) => fix_count += 1,
            Err(TrySendError::Closed(_)) => {
                log::info!("[gps] Channel closed after {} fixes", fix_count);
                break;
            }
            Err(TrySendError::Full(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accel_magnitude() {
        let accel = Sample::new(0, 3.0, 4.0, 0.0, 0.0).accel();
        assert_eq!(accel.magnitude(), 5.0);
    }

    #[test]
    fn test_non_finite_sample_detected() {
        assert!(Sample::vertical(0, 1.0, 20.0).is_finite());
        assert!(!Sample::vertical(0, f64::NAN, 20.0).is_finite());
        assert!(!Sample::vertical(0, 1.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_location_finiteness() {
        assert!(Location::new(19.0, 72.8, None, Some(4.0)).is_finite());
        assert!(!Location::new(f64::NAN, 72.8, None, None).is_finite());
    }

    #[test]
    fn test_drive_profile_produces_hits() {
        let profile = DriveProfile::default();
        let quiet = profile.sample_at(3.5, 3_500);
        assert!(quiet.accel_z.abs() < 1.0);

        let hit = profile.sample_at(profile.pothole_every_secs * 2.0, 14_000);
        assert!(hit.accel_z > 10.0);
        assert!(hit.speed_kmh > 10.0);
    }
}
