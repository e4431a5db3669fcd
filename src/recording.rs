use crate::event::DetectionEvent;
use crate::sensors::{Location, Sample, SensorMessage};
use anyhow::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccelData {
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GpsData {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    pub accuracy: f64,
    /// m/s
    pub speed: f64,
}

/// One row of a recorded drive. Timestamps are seconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: f64,
    pub accel: Option<AccelData>,
    pub gps: Option<GpsData>,
    /// Per-sample speed when the source had one; otherwise the last GPS speed is used
    #[serde(default)]
    pub speed_kmh: Option<f64>,
}

/// Recorded drive: `{ "readings": [...] }`, optionally with the detections it produced
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Recording {
    pub readings: Vec<Reading>,
    #[serde(default)]
    pub detections: Vec<DetectionEvent>,
}

impl Recording {
    /// Loads `.json` or `.json.gz`
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        if is_gzip(path) {
            let reader = BufReader::new(GzDecoder::new(file));
            Ok(serde_json::from_reader(reader)?)
        } else {
            Ok(serde_json::from_reader(BufReader::new(file))?)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        if is_gzip(path) {
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?;
        } else {
            serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        }
        Ok(())
    }

    /// Hand back everything collected so far once `max_readings` is reached,
    /// leaving an empty recording behind
    pub fn take_if_full(&mut self, max_readings: usize) -> Option<Recording> {
        if self.readings.len() < max_readings {
            return None;
        }
        Some(std::mem::take(self))
    }

    /// Append a live message, timestamped in seconds since recording start
    pub fn push_message(&mut self, message: &SensorMessage) {
        match message {
            SensorMessage::Sample(sample) => {
                let timestamp = sample.timestamp_ms as f64 / 1000.0;
                self.readings.push(Reading {
                    timestamp,
                    accel: Some(AccelData {
                        timestamp,
                        x: sample.accel_x,
                        y: sample.accel_y,
                        z: sample.accel_z,
                    }),
                    gps: None,
                    speed_kmh: Some(sample.speed_kmh),
                });
            }
            SensorMessage::Location(location) => {
                let timestamp = self.readings.last().map(|r| r.timestamp).unwrap_or(0.0);
                let speed = self
                    .readings
                    .iter()
                    .rev()
                    .find_map(|r| r.speed_kmh)
                    .unwrap_or(0.0)
                    / 3.6;
                self.readings.push(Reading {
                    timestamp,
                    accel: None,
                    gps: Some(GpsData {
                        timestamp,
                        latitude: location.latitude,
                        longitude: location.longitude,
                        altitude: location.altitude,
                        accuracy: location.accuracy.unwrap_or(0.0),
                        speed,
                    }),
                    speed_kmh: None,
                });
            }
        }
    }

    /// Engine input in recorded order. Sample clocks start at 0 ms; GPS speed is converted to km/h.
    pub fn to_messages(&self) -> Vec<SensorMessage> {
        let t0 = self.readings.first().map(|r| r.timestamp).unwrap_or(0.0);
        let mut speed_kmh = 0.0;
        let mut messages = Vec::with_capacity(self.readings.len());

        for reading in &self.readings {
            if let Some(gps) = &reading.gps {
                speed_kmh = gps.speed * 3.6;
                let accuracy = (gps.accuracy > 0.0).then_some(gps.accuracy);
                messages.push(SensorMessage::Location(Location::new(
                    gps.latitude,
                    gps.longitude,
                    gps.altitude,
                    accuracy,
                )));
            }
            if let Some(accel) = &reading.accel {
                let speed = reading.speed_kmh.unwrap_or(speed_kmh);
                let timestamp_ms = ((reading.timestamp - t0) * 1000.0).round() as i64;
                messages.push(SensorMessage::Sample(Sample::new(
                    timestamp_ms,
                    accel.x,
                    accel.y,
                    accel.z,
                    speed,
                )));
            }
        }

        messages
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map(|e| e == "gz").unwrap_or(false)
}
