use crate::features::PotholeFeatures;
use crate::sensors::{AccelVector, Location};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionType {
    Sensor,
    Image,
}

/// One detection run, bounded by start/stop
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl SessionContext {
    /// Fresh session with a random v4 id
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub manufacturer: String,
    pub vehicle_type: String,
    pub phone_placement: String,
}

impl DeviceInfo {
    pub fn new(model: impl Into<String>, manufacturer: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            manufacturer: manufacturer.into(),
            ..Self::default()
        }
    }
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            model: "unknown".to_string(),
            manufacturer: "unknown".to_string(),
            vehicle_type: "unknown".to_string(),
            phone_placement: "unknown".to_string(),
        }
    }
}

/// Unified detection record for both sensor and image detections.
///
/// Fields that do not apply to `detection_type` serialize as `null`, so every
/// record has the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub timestamp: String,
    pub user_id: String,
    pub session_id: String,
    pub detection_type: DetectionType,
    pub device_model: String,
    pub device_manufacturer: String,
    pub vehicle_type: String,
    pub phone_placement: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub gps_accuracy: Option<f64>,
    /// km/h
    pub speed: f64,

    // SENSOR only
    pub zt_peak: Option<f64>,
    pub z_prev_extrema: Option<f64>,
    pub z_next_extrema: Option<f64>,
    pub interval_since_last_detection_ms: Option<i64>,
    pub dynamic_threshold: Option<f64>,
    pub base_threshold: Option<f64>,
    pub raw_signature_window: Option<Vec<f64>>,

    // IMAGE only
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub confidence: Option<u8>,

    pub accelerometer_data: AccelVector,
}

/// Shared context every record is assembled from
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub session: &'a SessionContext,
    pub user_id: &'a str,
    pub device: &'a DeviceInfo,
    pub location: Option<&'a Location>,
    pub speed_kmh: f64,
    pub accel: AccelVector,
}

/// Threshold values in force when a sensor detection fired
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSnapshot {
    pub dynamic: f64,
    pub base: f64,
}

impl DetectionEvent {
    fn base(ctx: &EventContext<'_>, detection_type: DetectionType) -> Self {
        DetectionEvent {
            timestamp: Utc::now().to_rfc3339(),
            user_id: ctx.user_id.to_string(),
            session_id: ctx.session.session_id.to_string(),
            detection_type,
            device_model: ctx.device.model.clone(),
            device_manufacturer: ctx.device.manufacturer.clone(),
            vehicle_type: ctx.device.vehicle_type.clone(),
            phone_placement: ctx.device.phone_placement.clone(),
            latitude: ctx.location.map(|l| l.latitude),
            longitude: ctx.location.map(|l| l.longitude),
            altitude: ctx.location.and_then(|l| l.altitude),
            gps_accuracy: ctx.location.and_then(|l| l.accuracy),
            speed: ctx.speed_kmh,
            zt_peak: None,
            z_prev_extrema: None,
            z_next_extrema: None,
            interval_since_last_detection_ms: None,
            dynamic_threshold: None,
            base_threshold: None,
            raw_signature_window: None,
            image_url: None,
            confidence: None,
            accelerometer_data: ctx.accel,
        }
    }

    pub fn sensor(
        ctx: &EventContext<'_>,
        features: &PotholeFeatures,
        threshold: ThresholdSnapshot,
        signature: Vec<f64>,
    ) -> Self {
        DetectionEvent {
            speed: features.speed_kmh,
            zt_peak: Some(features.peak_z),
            z_prev_extrema: Some(features.prev_extremum),
            z_next_extrema: Some(features.next_extremum),
            interval_since_last_detection_ms: Some(features.interval_since_last_ms),
            dynamic_threshold: Some(threshold.dynamic),
            base_threshold: Some(threshold.base),
            raw_signature_window: Some(signature),
            ..Self::base(ctx, DetectionType::Sensor)
        }
    }

    /// Confidence is clamped to 0..=100
    pub fn image(ctx: &EventContext<'_>, image_url: impl Into<String>, confidence: Option<i32>) -> Self {
        DetectionEvent {
            image_url: Some(image_url.into()),
            confidence: confidence.map(|c| c.clamp(0, 100) as u8),
            ..Self::base(ctx, DetectionType::Image)
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
