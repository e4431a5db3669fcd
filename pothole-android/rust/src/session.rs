use crate::error::{JResult, PotholeJniError};
use crate::storage::DetectionBatch;
use crossbeam::channel::{unbounded, Receiver};
use pothole_detector::{
    ChannelSink, DetectionEngine, DetectionEvent, DetectorConfig, DeviceInfo, EngineStatus,
    Location, Sample, SharedEngine, StartRequest,
};

/// Host-side wrapper: the sensor callback thread pushes samples, the UI
/// thread reads counters and polls finished detection records.
pub struct DetectionSession {
    engine: SharedEngine<ChannelSink>,
    events: Receiver<DetectionEvent>,
}

impl DetectionSession {
    pub fn new(device: DeviceInfo, config: DetectorConfig) -> JResult<Self> {
        let (tx, rx) = unbounded();
        let engine = DetectionEngine::new(config, device, ChannelSink::new(tx))?;
        Ok(Self {
            engine: SharedEngine::new(engine),
            events: rx,
        })
    }

    /// Returns the new session id
    pub fn start(&self, user_id: Option<String>, location_permission: bool) -> JResult<String> {
        let session = self.engine.start(&StartRequest {
            user_id,
            location_permission,
        })?;
        Ok(session.session_id.to_string())
    }

    pub fn stop(&self) {
        self.engine.stop();
    }

    /// Returns true when the sample produced a detection
    pub fn push_accel_sample(&self, x: f64, y: f64, z: f64, speed_kmh: f64, timestamp_ms: i64) -> JResult<bool> {
        if timestamp_ms < 0 {
            return Err(PotholeJniError::InvalidParameters(format!(
                "negative timestamp {}",
                timestamp_ms
            )));
        }
        let outcome = self
            .engine
            .on_sample(Sample::new(timestamp_ms, x, y, z, speed_kmh));
        Ok(outcome.is_detection())
    }

    /// Non-positive accuracy or NaN altitude from the platform means "unknown"
    pub fn push_location(&self, latitude: f64, longitude: f64, altitude: f64, accuracy: f64) {
        let altitude = altitude.is_finite().then_some(altitude);
        let accuracy = (accuracy.is_finite() && accuracy > 0.0).then_some(accuracy);
        self.engine
            .on_location(Location::new(latitude, longitude, altitude, accuracy));
    }

    /// Returns whether the record reached the outgoing queue
    pub fn submit_image_detection(&self, image_url: &str, confidence: Option<i32>) -> JResult<bool> {
        if image_url.trim().is_empty() {
            return Err(PotholeJniError::InvalidParameters("empty image url".to_string()));
        }
        let emission = self.engine.submit_image_detection(image_url, confidence)?;
        Ok(emission.delivered)
    }

    pub fn is_active(&self) -> bool {
        self.engine.is_active()
    }

    pub fn detection_count(&self) -> u64 {
        self.engine.detection_count()
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }

    /// Everything emitted since the last poll
    pub fn drain_events(&self) -> DetectionBatch {
        let events: Vec<DetectionEvent> = self.events.try_iter().collect();
        DetectionBatch::new(self.status(), events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> DetectionSession {
        DetectionSession::new(DeviceInfo::new("Pixel 7", "Google"), DetectorConfig::default()).unwrap()
    }

    fn drive(session: &DetectionSession, samples: i64, speed: f64) -> i64 {
        let mut t = 0;
        for _ in 0..samples {
            session.push_accel_sample(0.1, 0.2, 0.0, speed, t).unwrap();
            t += 20;
        }
        t
    }

    #[test]
    fn test_start_preconditions() {
        let session = session();
        assert!(matches!(
            session.start(Some("user".to_string()), false),
            Err(PotholeJniError::PermissionDenied)
        ));
        assert!(matches!(session.start(None, true), Err(PotholeJniError::MissingIdentity)));
        assert!(!session.is_active());

        let first = session.start(Some("user".to_string()), true).unwrap();
        let second = session.start(Some("user".to_string()), true).unwrap();
        assert_ne!(first, second);
        assert!(session.is_active());
    }

    #[test]
    fn test_detections_are_polled_once() {
        let session = session();
        session.start(Some("user".to_string()), true).unwrap();
        session.push_location(19.07, 72.87, f64::NAN, 0.0);

        let t = drive(&session, 20, 44.2);
        assert!(session.push_accel_sample(0.3, 0.1, 15.5, 44.2, t).unwrap());
        assert_eq!(session.detection_count(), 1);

        let batch = session.drain_events();
        assert_eq!(batch.events.len(), 1);
        let event = &batch.events[0];
        assert_eq!(event.zt_peak, Some(15.5));
        assert_eq!(event.latitude, Some(19.07));
        assert_eq!(event.altitude, None);
        assert_eq!(event.gps_accuracy, None);
        assert_eq!(event.device_model, "Pixel 7");

        assert!(session.drain_events().events.is_empty());
    }

    #[test]
    fn test_image_detection_requires_active_session() {
        let session = session();
        assert!(matches!(
            session.submit_image_detection("https://img/1.jpg", Some(80)),
            Err(PotholeJniError::NotActive)
        ));

        session.start(Some("user".to_string()), true).unwrap();
        assert!(session.submit_image_detection("https://img/1.jpg", Some(80)).unwrap());
        assert!(session.submit_image_detection(" ", None).is_err());
        assert_eq!(session.detection_count(), 0);
        assert_eq!(session.drain_events().events.len(), 1);
    }

    #[test]
    fn test_stop_twice_keeps_count() {
        let session = session();
        session.start(Some("user".to_string()), true).unwrap();
        session.push_location(19.07, 72.87, 12.0, 4.0);
        let t = drive(&session, 20, 44.2);
        session.push_accel_sample(0.0, 0.0, -16.0, 44.2, t).unwrap();

        session.stop();
        session.stop();
        assert!(!session.is_active());
        assert_eq!(session.status().buffer_len, 0);
        assert_eq!(session.detection_count(), 1);
    }

    #[test]
    fn test_crossing_before_first_fix_not_reported() {
        let session = session();
        session.start(Some("user".to_string()), true).unwrap();
        let t = drive(&session, 20, 44.2);
        assert!(!session.push_accel_sample(0.0, 0.0, 15.5, 44.2, t).unwrap());
        assert_eq!(session.detection_count(), 0);
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn test_photo_report_after_stop_uses_last_session() {
        let session = session();
        let id = session.start(Some("user".to_string()), true).unwrap();
        session.stop();

        assert!(session.submit_image_detection("https://img/2.jpg", Some(60)).unwrap());
        let batch = session.drain_events();
        assert_eq!(batch.events[0].session_id, id);
        assert!(!batch.active);
    }

    #[test]
    fn test_negative_timestamp_rejected() {
        let session = session();
        assert!(session.push_accel_sample(0.0, 0.0, 0.0, 20.0, -1).is_err());
    }
}
