// Pothole Detector Android JNI Library
// Exposes the Rust detection engine to Kotlin via JNI

pub mod android_jni;
pub mod error;
pub mod session;
pub mod storage;

pub use error::{JResult, PotholeJniError};
pub use session::DetectionSession;
pub use storage::DetectionBatch;
