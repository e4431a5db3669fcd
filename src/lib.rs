//! Streaming pothole detection from accelerometer and speed samples.
//!
//! Samples flow through a bounded z-axis history, a speed-adaptive threshold,
//! a cooldown gate and local-extrema feature extraction; accepted crossings
//! become [`DetectionEvent`]s handed to an [`EventSink`].

pub mod buffer;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod event;
pub mod features;
pub mod live_status;
pub mod pipeline;
pub mod recording;
pub mod sensors;
pub mod shared;
pub mod sink;
pub mod threshold;

pub use buffer::SlidingWindowBuffer;
pub use config::DetectorConfig;
pub use debounce::DebounceGate;
pub use engine::{DetectionEngine, EngineState, EngineStatus, Emission, SampleOutcome, StartRequest};
pub use error::{DResult, DetectorError, SinkError};
pub use event::{DetectionEvent, DetectionType, DeviceInfo, SessionContext};
pub use features::{FeatureExtractor, PotholeFeatures};
pub use sensors::{AccelVector, Location, Sample, SensorMessage};
pub use shared::SharedEngine;
pub use sink::{ChannelSink, EventSink, JsonLinesSink, MemorySink};
pub use threshold::{ThresholdModel, ThresholdParameters};
