use crate::engine::EngineStatus;
use crate::pipeline::PipelineStats;
use crate::sensors::Location;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub session_id: Option<String>,
    pub active: bool,
    pub driving: bool,
    pub detections: u64,
    pub delivery_failures: u64,
    pub samples: u64,
    pub gps_fixes: u64,
    pub buffer_len: usize,
    pub speed_kmh: f64,
    pub accel_magnitude: f64,
    pub dynamic_threshold: f64,
    pub uptime_seconds: u64,
    // GPS data
    pub gps_lat: Option<f64>,
    pub gps_lon: Option<f64>,
    pub gps_accuracy: Option<f64>,
}

impl LiveStatus {
    pub fn new(status: &EngineStatus, location: Option<&Location>, uptime_seconds: u64) -> Self {
        Self {
            timestamp: current_timestamp(),
            session_id: status.session_id.clone(),
            active: status.active,
            driving: status.driving,
            detections: status.detection_count,
            delivery_failures: status.delivery_failures,
            buffer_len: status.buffer_len,
            speed_kmh: status.speed_kmh,
            accel_magnitude: status.accel_magnitude,
            dynamic_threshold: status.dynamic_threshold,
            uptime_seconds,
            gps_lat: location.map(|l| l.latitude),
            gps_lon: location.map(|l| l.longitude),
            gps_accuracy: location.and_then(|l| l.accuracy),
            ..Self::default()
        }
    }

    pub fn with_stats(mut self, stats: &PipelineStats) -> Self {
        self.samples = stats.samples;
        self.gps_fixes = stats.locations;
        self
    }

    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
