use pothole_detector::{DetectionEvent, EngineStatus};
use serde::Serialize;

/// Detections handed to the Kotlin uploader in one poll (JSON-serializable)
#[derive(Debug, Clone, Serialize)]
pub struct DetectionBatch {
    pub polled_at: String,
    pub session_id: Option<String>,
    pub active: bool,
    pub detection_count: u64,
    pub events: Vec<DetectionEvent>,
}

impl DetectionBatch {
    pub fn new(status: EngineStatus, events: Vec<DetectionEvent>) -> Self {
        Self {
            polled_at: chrono::Utc::now().to_rfc3339(),
            session_id: status.session_id,
            active: status.active,
            detection_count: status.detection_count,
            events,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> EngineStatus {
        EngineStatus {
            active: true,
            driving: false,
            detection_count: 4,
            delivery_failures: 0,
            buffer_len: 12,
            speed_kmh: 3.0,
            accel_magnitude: 0.4,
            dynamic_threshold: 7.8,
            session_id: Some("test_session".to_string()),
            last_detection_ms: None,
        }
    }

    #[test]
    fn test_batch_json_shape() {
        let batch = DetectionBatch::new(status(), Vec::new());
        assert!(batch.is_empty());

        let json: serde_json::Value = serde_json::from_str(&batch.to_json().unwrap()).unwrap();
        assert_eq!(json["session_id"], "test_session");
        assert_eq!(json["detection_count"], 4);
        assert!(json["events"].as_array().unwrap().is_empty());
    }
}
