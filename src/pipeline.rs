//! Message-passing front end for the engine.
//!
//! Sensor and location callbacks push [`SensorMessage`]s into a channel; one
//! consumer feeds them to the engine in arrival order. The same dispatch is
//! used for synchronous replay so recorded drives run deterministically.

use crate::engine::{DetectionEngine, SampleOutcome};
use crate::event::DetectionEvent;
use crate::sensors::SensorMessage;
use crate::shared::SharedEngine;
use crate::sink::EventSink;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub samples: u64,
    pub locations: u64,
    pub invalid_samples: u64,
    pub cooldown_suppressed: u64,
    pub extraction_failures: u64,
    pub no_location: u64,
    pub detections: u64,
    pub undelivered: u64,
}

impl PipelineStats {
    pub fn record(&mut self, outcome: &SampleOutcome) {
        self.samples += 1;
        match outcome {
            SampleOutcome::InvalidSample => self.invalid_samples += 1,
            SampleOutcome::CoolingDown => self.cooldown_suppressed += 1,
            SampleOutcome::ExtractionFailed => self.extraction_failures += 1,
            SampleOutcome::NoLocation => self.no_location += 1,
            SampleOutcome::Detected(emission) => {
                self.detections += 1;
                if !emission.delivered {
                    self.undelivered += 1;
                }
            }
            _ => {}
        }
    }
}

/// Feed one message to the engine; `None` for location updates
pub fn dispatch<S: EventSink>(
    engine: &mut DetectionEngine<S>,
    message: SensorMessage,
) -> Option<SampleOutcome> {
    match message {
        SensorMessage::Sample(sample) => Some(engine.on_sample(sample)),
        SensorMessage::Location(location) => {
            engine.on_location(location);
            None
        }
    }
}

/// Synchronous replay; returns stats and every emitted event in order
pub fn replay_messages<S, I>(engine: &mut DetectionEngine<S>, messages: I) -> (PipelineStats, Vec<DetectionEvent>)
where
    S: EventSink,
    I: IntoIterator<Item = SensorMessage>,
{
    let mut stats = PipelineStats::default();
    let mut events = Vec::new();

    for message in messages {
        match dispatch(engine, message) {
            Some(outcome) => {
                stats.record(&outcome);
                if let SampleOutcome::Detected(emission) = outcome {
                    events.push(emission.event);
                }
            }
            None => stats.locations += 1,
        }
    }

    (stats, events)
}

/// Drain `rx` into the shared engine until every sender is dropped
pub async fn run_detection<S: EventSink>(
    mut rx: Receiver<SensorMessage>,
    engine: Arc<SharedEngine<S>>,
) -> PipelineStats {
    let mut stats = PipelineStats::default();

    while let Some(message) = rx.recv().await {
        match message {
            SensorMessage::Sample(sample) => {
                let outcome = engine.on_sample(sample);
                stats.record(&outcome);
            }
            SensorMessage::Location(location) => {
                engine.on_location(location);
                stats.locations += 1;
            }
        }
    }

    log::info!(
        "Sensor channel closed: {} samples, {} detections",
        stats.samples,
        stats.detections
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::engine::StartRequest;
    use crate::event::DeviceInfo;
    use crate::sensors::{Location, Sample};
    use crate::sink::MemorySink;
    use tokio::sync::mpsc;

    fn drive() -> Vec<SensorMessage> {
        let mut messages = vec![SensorMessage::Location(Location::new(19.07, 72.87, Some(10.0), Some(5.0)))];
        // 5 s at 50 Hz, hits at 1 s, 1.5 s (inside cooldown) and 4.5 s
        for i in 0..250i64 {
            let t = i * 20;
            let z = match t {
                1000 | 1500 | 4500 => 16.0,
                _ => 0.2,
            };
            messages.push(SensorMessage::Sample(Sample::vertical(t, z, 45.0)));
        }
        messages
    }

    fn started_engine() -> (DetectionEngine<MemorySink>, MemorySink) {
        let sink = MemorySink::new();
        let mut engine = DetectionEngine::new(DetectorConfig::default(), DeviceInfo::default(), sink.clone()).unwrap();
        engine.start(&StartRequest::new("user-1", true)).unwrap();
        (engine, sink)
    }

    #[test]
    fn test_replay_is_deterministic() {
        let (mut engine, _) = started_engine();
        let (stats, events) = replay_messages(&mut engine, drive());

        assert_eq!(stats.samples, 250);
        assert_eq!(stats.locations, 1);
        assert_eq!(stats.detections, 2);
        assert_eq!(stats.cooldown_suppressed, 1);

        let peaks: Vec<Option<f64>> = events.iter().map(|e| e.zt_peak).collect();
        assert_eq!(peaks, vec![Some(16.0), Some(16.0)]);
        assert_eq!(events[1].interval_since_last_detection_ms, Some(3500));
        assert_eq!(events[0].latitude, Some(19.07));

        let (mut other, _) = started_engine();
        let (again, _) = replay_messages(&mut other, drive());
        assert_eq!(stats, again);
    }

    #[tokio::test]
    async fn test_channel_feeds_engine_in_order() {
        let (engine, sink) = started_engine();
        let engine = Arc::new(SharedEngine::new(engine));
        let (tx, rx) = mpsc::channel(64);

        let consumer = tokio::spawn(run_detection(rx, Arc::clone(&engine)));
        for message in drive() {
            tx.send(message).await.unwrap();
        }
        drop(tx);

        let stats = consumer.await.unwrap();
        assert_eq!(stats.detections, 2);
        assert_eq!(engine.detection_count(), 2);
        assert_eq!(sink.len(), 2);
    }
}
