use crate::error::{throw_java_exception, JResult, PotholeJniError};
use crate::session::DetectionSession;
use jni::objects::{JClass, JString};
use jni::sys::{jboolean, jdouble, jint, jlong, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use log::info;
use pothole_detector::{DetectorConfig, DeviceInfo};
use std::sync::{Arc, Mutex};

// Global session state - stored as static to persist across JNI calls
lazy_static::lazy_static! {
    static ref GLOBAL_SESSION: Mutex<Option<Arc<DetectionSession>>> = Mutex::new(None);
}

/// Get or create the current session
fn get_session() -> JResult<Arc<DetectionSession>> {
    let mut session_guard = GLOBAL_SESSION.lock().map_err(|_| {
        PotholeJniError::Internal("Failed to acquire global session lock".to_string())
    })?;

    match session_guard.as_ref() {
        Some(session) => Ok(Arc::clone(session)),
        None => {
            let session = Arc::new(DetectionSession::new(DeviceInfo::default(), DetectorConfig::default())?);
            *session_guard = Some(Arc::clone(&session));
            Ok(session)
        }
    }
}

fn init_logging() {
    #[cfg(target_os = "android")]
    {
        let _ = android_log::init("PotholeDetector");
    }
}

fn read_string(env: &mut JNIEnv, value: &JString) -> JResult<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    let text: String = env.get_string(value)?.into();
    Ok(Some(text))
}

fn new_jstring(env: &mut JNIEnv, value: JResult<String>) -> jstring {
    let result = value.and_then(|text| env.new_string(text).map_err(PotholeJniError::from));
    match result {
        Ok(jstr) => jstr.into_raw(),
        Err(e) => {
            let _ = throw_java_exception(env, &e);
            std::ptr::null_mut()
        }
    }
}

/// JNI: Create the engine with device identity and optional JSON config
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_init<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    device_model: JString<'local>,
    device_manufacturer: JString<'local>,
    config_json: JString<'local>,
) -> jint {
    init_logging();
    match init_impl(&mut env, &device_model, &device_manufacturer, &config_json) {
        Ok(_) => 0,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

fn init_impl(
    env: &mut JNIEnv,
    device_model: &JString,
    device_manufacturer: &JString,
    config_json: &JString,
) -> JResult<()> {
    let model = read_string(env, device_model)?.unwrap_or_else(|| "unknown".to_string());
    let manufacturer = read_string(env, device_manufacturer)?.unwrap_or_else(|| "unknown".to_string());
    let config = match read_string(env, config_json)? {
        Some(json) if !json.trim().is_empty() => serde_json::from_str::<DetectorConfig>(&json)
            .map_err(|e| PotholeJniError::InvalidConfig(e.to_string()))?,
        _ => DetectorConfig::default(),
    };

    let session = Arc::new(DetectionSession::new(DeviceInfo::new(model, manufacturer), config)?);
    let mut guard = GLOBAL_SESSION.lock().map_err(|_| {
        PotholeJniError::Internal("Failed to acquire global session lock".to_string())
    })?;
    if let Some(previous) = guard.replace(session) {
        previous.stop();
    }

    info!("Pothole engine initialised");
    Ok(())
}

/// JNI: Start (or restart) detection
/// Returns: new session id, or null on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_startDetection<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    user_id: JString<'local>,
    has_location_permission: jboolean,
) -> jstring {
    let result = start_detection_impl(&mut env, &user_id, has_location_permission != JNI_FALSE);
    new_jstring(&mut env, result)
}

fn start_detection_impl(env: &mut JNIEnv, user_id: &JString, has_permission: bool) -> JResult<String> {
    let user_id = read_string(env, user_id)?;
    let session = get_session()?;
    session.start(user_id, has_permission)
}

/// JNI: Stop detection. Safe to call repeatedly.
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_stopDetection(
    mut env: JNIEnv,
    _class: JClass,
) -> jint {
    match get_session() {
        Ok(session) => {
            session.stop();
            0
        }
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

/// JNI: Push accelerometer sample
/// Parameters: x, y, z (m/s²), speed (km/h), timestamp (monotonic ms)
/// Returns: 1 if a pothole was detected, 0 if not, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_pushAccelSample(
    mut env: JNIEnv,
    _class: JClass,
    x: jdouble,
    y: jdouble,
    z: jdouble,
    speed_kmh: jdouble,
    timestamp_ms: jlong,
) -> jint {
    let result = get_session()
        .and_then(|session| session.push_accel_sample(x, y, z, speed_kmh, timestamp_ms));
    match result {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

/// JNI: Push location fix
/// Parameters: latitude, longitude, altitude (m, NaN if unknown), accuracy (m, <= 0 if unknown)
/// Returns: 0 on success, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_pushLocation(
    mut env: JNIEnv,
    _class: JClass,
    latitude: jdouble,
    longitude: jdouble,
    altitude: jdouble,
    accuracy: jdouble,
) -> jint {
    match get_session() {
        Ok(session) => {
            session.push_location(latitude, longitude, altitude, accuracy);
            0
        }
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

/// JNI: Record an image-based detection after the photo upload finished
/// Parameters: download url, confidence 0-100 (negative = none)
/// Returns: 1 if queued, 0 if the queue refused it, -1 on error (throws Java exception)
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_submitImageDetection<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    image_url: JString<'local>,
    confidence: jint,
) -> jint {
    match submit_image_impl(&mut env, &image_url, confidence) {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

fn submit_image_impl(env: &mut JNIEnv, image_url: &JString, confidence: jint) -> JResult<bool> {
    let url = read_string(env, image_url)?
        .ok_or_else(|| PotholeJniError::InvalidParameters("image url is null".to_string()))?;
    let confidence = (confidence >= 0).then_some(confidence);
    get_session()?.submit_image_detection(&url, confidence)
}

/// JNI: Total detections since the engine was created
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_getDetectionCount(
    mut env: JNIEnv,
    _class: JClass,
) -> jlong {
    match get_session() {
        Ok(session) => session.detection_count() as jlong,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            -1
        }
    }
}

#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_isActive(
    mut env: JNIEnv,
    _class: JClass,
) -> jboolean {
    match get_session() {
        Ok(session) if session.is_active() => JNI_TRUE,
        Ok(_) => JNI_FALSE,
        Err(e) => {
            let _ = throw_java_exception(&mut env, &e);
            JNI_FALSE
        }
    }
}

/// JNI: Engine status as JSON (for the sensor readout screen)
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_getStatusJson(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let result = get_session().and_then(|session| {
        serde_json::to_string(&session.status())
            .map_err(|_| PotholeJniError::Internal("JSON serialization failed".to_string()))
    });
    new_jstring(&mut env, result)
}

/// JNI: Drain detections emitted since the last poll as a JSON batch
#[no_mangle]
pub extern "C" fn Java_com_example_potholedetector_JniBinding_pollDetectionsJson(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    let result = get_session().and_then(|session| {
        session
            .drain_events()
            .to_json()
            .map_err(|_| PotholeJniError::Internal("JSON serialization failed".to_string()))
    });
    new_jstring(&mut env, result)
}
