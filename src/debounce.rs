/// Minimum-gap gate between accepted detections.
///
/// A single pothole rings the vertical axis for several samples; the gate
/// keeps that oscillation from fanning out into multiple reports. The caller
/// owns the last-detection timestamp and only advances it on a confirmed
/// emission.
#[derive(Debug, Clone, Copy)]
pub struct DebounceGate {
    cooldown_ms: i64,
}

impl DebounceGate {
    pub fn new(cooldown_ms: i64) -> Self {
        Self { cooldown_ms }
    }

    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown_ms
    }

    /// True iff strictly more than the cooldown has elapsed (or nothing was detected yet)
    pub fn allow(&self, now_ms: i64, last_detection_ms: Option<i64>) -> bool {
        allow(now_ms, last_detection_ms, self.cooldown_ms)
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(3000)
    }
}

pub fn allow(now_ms: i64, last_detection_ms: Option<i64>, cooldown_ms: i64) -> bool {
    match last_detection_ms {
        Some(last) => now_ms.saturating_sub(last) > cooldown_ms,
        None => true,
    }
}
