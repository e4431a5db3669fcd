use crate::engine::{DetectionEngine, EngineStatus, Emission, SampleOutcome, StartRequest};
use crate::error::DResult;
use crate::event::SessionContext;
use crate::sensors::{Location, Sample};
use crate::sink::EventSink;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe handle around a [`DetectionEngine`].
///
/// Every state transition and sample runs under one lock, so a restart either
/// fully precedes or fully follows any in-flight sample. `active` and
/// `detection_count` are mirrored into atomics for lock-free UI reads.
pub struct SharedEngine<S: EventSink> {
    engine: Mutex<DetectionEngine<S>>,
    active: AtomicBool,
    detection_count: AtomicU64,
}

impl<S: EventSink> SharedEngine<S> {
    pub fn new(engine: DetectionEngine<S>) -> Self {
        let active = engine.is_active();
        let count = engine.detection_count();
        Self {
            engine: Mutex::new(engine),
            active: AtomicBool::new(active),
            detection_count: AtomicU64::new(count),
        }
    }

    pub fn start(&self, request: &StartRequest) -> DResult<SessionContext> {
        let mut engine = self.lock();
        let result = engine.start(request);
        self.publish(&engine);
        result
    }

    pub fn stop(&self) {
        let mut engine = self.lock();
        engine.stop();
        self.publish(&engine);
    }

    pub fn on_sample(&self, sample: Sample) -> SampleOutcome {
        let mut engine = self.lock();
        let outcome = engine.on_sample(sample);
        self.publish(&engine);
        outcome
    }

    pub fn on_location(&self, location: Location) {
        self.lock().on_location(location);
    }

    pub fn submit_image_detection(&self, image_url: &str, confidence: Option<i32>) -> DResult<Emission> {
        self.lock().submit_image_detection(image_url, confidence)
    }

    pub fn status(&self) -> EngineStatus {
        self.lock().status()
    }

    /// Run `f` with exclusive access to the engine
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut DetectionEngine<S>) -> R) -> R {
        let mut engine = self.lock();
        let result = f(&mut engine);
        self.publish(&engine);
        result
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn detection_count(&self) -> u64 {
        self.detection_count.load(Ordering::Acquire)
    }

    // poisoned: keep using the inner engine
    fn lock(&self) -> MutexGuard<'_, DetectionEngine<S>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, engine: &DetectionEngine<S>) {
        self.active.store(engine.is_active(), Ordering::Release);
        self.detection_count
            .store(engine.detection_count(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::event::DeviceInfo;
    use crate::sink::MemorySink;
    use std::sync::Arc;
    use std::thread;

    fn shared() -> (Arc<SharedEngine<MemorySink>>, MemorySink) {
        let sink = MemorySink::new();
        let engine = DetectionEngine::new(DetectorConfig::default(), DeviceInfo::default(), sink.clone()).unwrap();
        (Arc::new(SharedEngine::new(engine)), sink)
    }

    #[test]
    fn test_counters_visible_without_lock() {
        let (engine, _) = shared();
        assert!(!engine.is_active());

        engine.start(&StartRequest::new("user-1", true)).unwrap();
        engine.on_location(Location::new(19.07, 72.87, None, None));
        assert!(engine.is_active());

        let mut t = 0;
        for _ in 0..20 {
            engine.on_sample(Sample::vertical(t, 0.0, 44.2));
            t += 20;
        }
        assert!(engine.on_sample(Sample::vertical(t, 15.5, 44.2)).is_detection());
        assert_eq!(engine.detection_count(), 1);

        engine.stop();
        engine.stop();
        assert!(!engine.is_active());
        assert_eq!(engine.detection_count(), 1);
        assert_eq!(engine.status().buffer_len, 0);
    }

    #[test]
    fn test_failed_start_leaves_engine_idle() {
        let (engine, _) = shared();
        assert!(engine.start(&StartRequest::new("user-1", false)).is_err());
        assert!(!engine.is_active());
    }

    #[test]
    fn test_restart_races_with_sensor_thread() {
        let (engine, _) = shared();
        engine.start(&StartRequest::new("user-1", true)).unwrap();

        let producer = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..2_000i64 {
                    engine.on_sample(Sample::vertical(i * 20, 0.5, 30.0));
                }
            })
        };
        for _ in 0..50 {
            engine.start(&StartRequest::new("user-1", true)).unwrap();
            let len = engine.status().buffer_len;
            assert!(len <= 50);
        }
        producer.join().unwrap();

        assert!(engine.is_active());
        assert!(engine.with_engine(|e| e.state().buffer.len()) <= 50);
    }
}
