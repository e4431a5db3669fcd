use crate::buffer::SlidingWindowBuffer;
use crate::config::DetectorConfig;
use crate::debounce::DebounceGate;
use crate::error::{DResult, DetectorError, SinkError};
use crate::event::{DetectionEvent, DeviceInfo, EventContext, SessionContext, ThresholdSnapshot};
use crate::features::{FeatureExtractor, PotholeFeatures};
use crate::sensors::{AccelVector, Location, Sample};
use crate::sink::EventSink;
use crate::threshold::ThresholdModel;
use log::{debug, info, warn};
use serde::Serialize;

/// External preconditions checked once at `start()`
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub user_id: Option<String>,
    pub location_permission: bool,
}

impl StartRequest {
    pub fn new(user_id: impl Into<String>, location_permission: bool) -> Self {
        Self {
            user_id: Some(user_id.into()),
            location_permission,
        }
    }
}

/// Everything the engine mutates, kept in one place
#[derive(Debug, Clone)]
pub struct EngineState {
    pub active: bool,
    pub driving: bool,
    pub last_detection_ms: Option<i64>,
    /// Survives stop/start for the lifetime of the engine
    pub detection_count: u64,
    pub delivery_failures: u64,
    pub speed_kmh: f64,
    pub session: Option<SessionContext>,
    /// Session of the most recent run, kept after stop for image reports
    pub last_session: Option<SessionContext>,
    pub user_id: Option<String>,
    pub location: Option<Location>,
    pub last_accel: AccelVector,
    pub buffer: SlidingWindowBuffer,
}

impl EngineState {
    fn new(buffer_capacity: usize) -> Self {
        Self {
            active: false,
            driving: false,
            last_detection_ms: None,
            detection_count: 0,
            delivery_failures: 0,
            speed_kmh: 0.0,
            session: None,
            last_session: None,
            user_id: None,
            location: None,
            last_accel: AccelVector::default(),
            buffer: SlidingWindowBuffer::new(buffer_capacity),
        }
    }
}

/// A record handed to the sink, and whether the sink took it
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub event: DetectionEvent,
    pub delivered: bool,
}

/// What happened to one incoming sample
#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Inactive,
    InvalidSample,
    NotDriving,
    InsufficientHistory,
    BelowThreshold { threshold: f64 },
    CoolingDown,
    ExtractionFailed,
    NoLocation,
    Detected(Box<Emission>),
}

impl SampleOutcome {
    pub fn is_detection(&self) -> bool {
        matches!(self, SampleOutcome::Detected(_))
    }

    pub fn event(&self) -> Option<&DetectionEvent> {
        match self {
            SampleOutcome::Detected(emission) => Some(&emission.event),
            _ => None,
        }
    }
}

/// Read-only snapshot for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub active: bool,
    pub driving: bool,
    pub detection_count: u64,
    pub delivery_failures: u64,
    pub buffer_len: usize,
    pub speed_kmh: f64,
    pub accel_magnitude: f64,
    pub dynamic_threshold: f64,
    pub session_id: Option<String>,
    pub last_detection_ms: Option<i64>,
}

/// Streaming pothole detector.
///
/// `Idle --start()--> Active --stop()--> Idle`. Per sample the gates run
/// cheapest first: driving, history length, threshold, cooldown, and only
/// then feature extraction. A candidate without a position fix is skipped
/// when `require_location` is set.
pub struct DetectionEngine<S: EventSink> {
    config: DetectorConfig,
    threshold: ThresholdModel,
    extractor: FeatureExtractor,
    gate: DebounceGate,
    device: DeviceInfo,
    sink: S,
    state: EngineState,
}

impl<S: EventSink> DetectionEngine<S> {
    pub fn new(config: DetectorConfig, device: DeviceInfo, sink: S) -> DResult<Self> {
        config.validate()?;
        Ok(Self {
            threshold: ThresholdModel::new(config.threshold),
            extractor: FeatureExtractor::new(config.extremum_window),
            gate: DebounceGate::new(config.cooldown_ms),
            state: EngineState::new(config.buffer_capacity),
            config,
            device,
            sink,
        })
    }

    /// Begin a new session. Calling this while active restarts with a fresh session id.
    pub fn start(&mut self, request: &StartRequest) -> DResult<SessionContext> {
        self.config.validate()?;
        if !request.location_permission {
            return Err(DetectorError::MissingPermission);
        }
        let user_id = match request.user_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => return Err(DetectorError::MissingIdentity),
        };

        if self.state.active {
            info!("Restarting detection, previous session discarded");
        }

        let session = SessionContext::new();
        self.state.buffer.clear();
        self.state.last_detection_ms = None;
        self.state.driving = false;
        self.state.user_id = Some(user_id);
        self.state.session = Some(session.clone());
        self.state.last_session = None;
        self.state.active = true;

        info!("Pothole detection started (session {})", session.session_id);
        Ok(session)
    }

    /// Idempotent
    pub fn stop(&mut self) {
        if let Some(session) = self.state.session.take() {
            info!(
                "Pothole detection stopped (session {}, {} detections total)",
                session.session_id, self.state.detection_count
            );
            self.state.last_session = Some(session);
        }
        self.state.active = false;
        self.state.driving = false;
        self.state.buffer.clear();
    }

    /// Store the latest position fix. Never gates detection.
    pub fn on_location(&mut self, location: Location) {
        if !location.is_finite() {
            debug!("Dropping non-finite location fix");
            return;
        }
        self.state.location = Some(location);
    }

    pub fn on_sample(&mut self, sample: Sample) -> SampleOutcome {
        if !self.state.active || self.state.session.is_none() {
            return SampleOutcome::Inactive;
        }
        if !sample.is_finite() {
            debug!("Dropping non-finite sample at {} ms", sample.timestamp_ms);
            return SampleOutcome::InvalidSample;
        }

        let z = sample.accel_z;
        let now = sample.timestamp_ms;
        self.state.buffer.push(z);
        self.state.last_accel = sample.accel();
        self.state.speed_kmh = sample.speed_kmh;

        self.state.driving = sample.speed_kmh > self.config.driving_speed_kmh;
        if !self.state.driving {
            return SampleOutcome::NotDriving;
        }
        if self.state.buffer.len() < self.config.min_history {
            return SampleOutcome::InsufficientHistory;
        }

        let threshold = self.threshold.threshold(sample.speed_kmh);
        if z.abs() <= threshold {
            return SampleOutcome::BelowThreshold { threshold };
        }
        if !self.gate.allow(now, self.state.last_detection_ms) {
            debug!("Crossing {:.2} at {} ms suppressed by cooldown", z, now);
            return SampleOutcome::CoolingDown;
        }

        let Some(features) = self.features_for(z, sample.speed_kmh, now) else {
            debug!("Feature extraction failed for crossing {:.2} at {} ms", z, now);
            return SampleOutcome::ExtractionFailed;
        };
        if self.config.require_location && self.state.location.is_none() {
            debug!("Crossing {:.2} at {} ms skipped, no location fix yet", z, now);
            return SampleOutcome::NoLocation;
        }

        let Some(event) = self.sensor_event(&features, threshold) else {
            return SampleOutcome::Inactive;
        };
        self.state.last_detection_ms = Some(now);
        self.state.detection_count += 1;

        info!(
            "Pothole detected: z={:.2} threshold={:.2} speed={:.1} km/h",
            features.peak_z, threshold, features.speed_kmh
        );

        SampleOutcome::Detected(Box::new(self.deliver(event)))
    }

    /// Assemble and emit an image-based detection. Leaves counters and cooldown untouched.
    ///
    /// Works while idle too, stamped with the most recent session; fails only
    /// before the first `start()`.
    pub fn submit_image_detection(
        &mut self,
        image_url: &str,
        confidence: Option<i32>,
    ) -> DResult<Emission> {
        let event = match self.event_context() {
            Some(ctx) => DetectionEvent::image(&ctx, image_url, confidence),
            None => return Err(DetectorError::NotActive),
        };
        Ok(self.deliver(event))
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            active: self.state.active,
            driving: self.state.driving,
            detection_count: self.state.detection_count,
            delivery_failures: self.state.delivery_failures,
            buffer_len: self.state.buffer.len(),
            speed_kmh: self.state.speed_kmh,
            accel_magnitude: self.state.last_accel.magnitude(),
            dynamic_threshold: self.threshold.threshold(self.state.speed_kmh),
            session_id: self.state.session.as_ref().map(|s| s.session_id.to_string()),
            last_detection_ms: self.state.last_detection_ms,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn detection_count(&self) -> u64 {
        self.state.detection_count
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn features_for(&self, z: f64, speed_kmh: f64, now: i64) -> Option<PotholeFeatures> {
        let last = self.state.last_detection_ms;
        if self.config.feature_extraction {
            let peak_index = self.state.buffer.len().checked_sub(1)?;
            self.extractor
                .extract(&self.state.buffer, peak_index, speed_kmh, now, last)
        } else {
            Some(FeatureExtractor::peak_only(z, speed_kmh, now, last))
        }
    }

    fn event_context(&self) -> Option<EventContext<'_>> {
        Some(EventContext {
            session: self
                .state
                .session
                .as_ref()
                .or(self.state.last_session.as_ref())?,
            user_id: self.state.user_id.as_deref()?,
            device: &self.device,
            location: self.state.location.as_ref(),
            speed_kmh: self.state.speed_kmh,
            accel: self.state.last_accel,
        })
    }

    fn sensor_event(&self, features: &PotholeFeatures, dynamic: f64) -> Option<DetectionEvent> {
        let ctx = self.event_context()?;
        let snapshot = ThresholdSnapshot {
            dynamic,
            base: self.threshold.base(),
        };
        let signature = self.state.buffer.tail(self.config.signature_len);
        Some(DetectionEvent::sensor(&ctx, features, snapshot, signature))
    }

    fn deliver(&mut self, event: DetectionEvent) -> Emission {
        let session = self.state.session.as_ref().or(self.state.last_session.as_ref());
        let result = match session {
            Some(session) => self.sink.emit(session, event.clone()),
            None => Err(SinkError::Rejected("no active session".to_string())),
        };

        let delivered = match result {
            Ok(()) => true,
            Err(e) => {
                self.state.delivery_failures += 1;
                warn!("Failed to deliver {:?} detection: {}", event.detection_type, e);
                false
            }
        };
        Emission { event, delivered }
    }
}
