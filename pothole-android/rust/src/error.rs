use jni::JNIEnv;
use pothole_detector::DetectorError;
use thiserror::Error;

/// Errors surfaced to the Kotlin layer
#[derive(Error, Debug, Clone)]
pub enum PotholeJniError {
    #[error("Detection not active")]
    NotActive,

    #[error("Location permission required for detection")]
    PermissionDenied,

    #[error("Login required")]
    MissingIdentity,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("JNI error: {0}")]
    JniError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for JNI operations
pub type JResult<T> = Result<T, PotholeJniError>;

impl From<DetectorError> for PotholeJniError {
    fn from(error: DetectorError) -> Self {
        match error {
            DetectorError::InvalidConfig(msg) => PotholeJniError::InvalidConfig(msg),
            DetectorError::MissingPermission => PotholeJniError::PermissionDenied,
            DetectorError::MissingIdentity => PotholeJniError::MissingIdentity,
            DetectorError::NotActive => PotholeJniError::NotActive,
            DetectorError::Io(e) => PotholeJniError::StorageError(e.to_string()),
            DetectorError::Json(e) => PotholeJniError::StorageError(e.to_string()),
        }
    }
}

impl From<jni::errors::Error> for PotholeJniError {
    fn from(error: jni::errors::Error) -> Self {
        PotholeJniError::JniError(error.to_string())
    }
}

/// Java exception class for an error
pub fn exception_class(error: &PotholeJniError) -> &'static str {
    match error {
        PotholeJniError::NotActive | PotholeJniError::MissingIdentity => {
            "java/lang/IllegalStateException"
        }
        PotholeJniError::PermissionDenied => "java/lang/SecurityException",
        PotholeJniError::InvalidConfig(_) | PotholeJniError::InvalidParameters(_) => {
            "java/lang/IllegalArgumentException"
        }
        PotholeJniError::StorageError(_) => "java/io/IOException",
        PotholeJniError::JniError(_) | PotholeJniError::Internal(_) => {
            "java/lang/RuntimeException"
        }
    }
}

/// Throw Java exception from Rust error
pub fn throw_java_exception(env: &mut JNIEnv, error: &PotholeJniError) -> JResult<()> {
    let message = error.to_string();
    env.throw_new(exception_class(error), message)
        .map_err(|_| PotholeJniError::JniError("Failed to throw exception".to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_errors_map_to_exceptions() {
        let denied: PotholeJniError = DetectorError::MissingPermission.into();
        assert_eq!(exception_class(&denied), "java/lang/SecurityException");

        let config: PotholeJniError = DetectorError::InvalidConfig("cooldown".to_string()).into();
        assert_eq!(exception_class(&config), "java/lang/IllegalArgumentException");

        let inactive: PotholeJniError = DetectorError::NotActive.into();
        assert_eq!(exception_class(&inactive), "java/lang/IllegalStateException");
    }
}
