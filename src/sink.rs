use crate::error::SinkError;
use crate::event::{DetectionEvent, SessionContext};
use crossbeam::channel::Sender;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Downstream collaborator that receives finished detection records.
///
/// Emission is fire-and-forget from the engine's side: a returned error is
/// logged and counted, never retried and never rolled back.
pub trait EventSink: Send {
    fn emit(&mut self, session: &SessionContext, event: DetectionEvent) -> Result<(), SinkError>;
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, session: &SessionContext, event: DetectionEvent) -> Result<(), SinkError> {
        (**self).emit(session, event)
    }
}

/// Hands events to another thread over an unbounded channel
pub struct ChannelSink {
    tx: Sender<DetectionEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<DetectionEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&mut self, _session: &SessionContext, event: DetectionEvent) -> Result<(), SinkError> {
        self.tx.send(event).map_err(|_| SinkError::Disconnected)
    }
}

/// Collects events in memory; clones share the same store
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<DetectionEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DetectionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn emit(&mut self, _session: &SessionContext, event: DetectionEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|_| SinkError::Rejected("memory sink lock poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

/// Appends one JSON object per line to a file
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&mut self, _session: &SessionContext, event: DetectionEvent) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceInfo, EventContext};
    use crate::sensors::AccelVector;

    fn image_event(session: &SessionContext) -> DetectionEvent {
        let device = DeviceInfo::default();
        let ctx = EventContext {
            session,
            user_id: "u",
            device: &device,
            location: None,
            speed_kmh: 0.0,
            accel: AccelVector::default(),
        };
        DetectionEvent::image(&ctx, "https://img/x.jpg", None)
    }

    #[test]
    fn test_channel_sink_disconnect_reported() {
        let session = SessionContext::new();
        let (tx, rx) = crossbeam::channel::unbounded();
        let mut sink = ChannelSink::new(tx);

        sink.emit(&session, image_event(&session)).unwrap();
        assert_eq!(rx.try_recv().unwrap().detection_type, crate::event::DetectionType::Image);

        drop(rx);
        assert!(matches!(
            sink.emit(&session, image_event(&session)),
            Err(SinkError::Disconnected)
        ));
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.jsonl");
        let session = SessionContext::new();

        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.emit(&session, image_event(&session)).unwrap();
        sink.emit(&session, image_event(&session)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: DetectionEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.session_id, session.session_id.to_string());
    }

    #[test]
    fn test_memory_sink_clones_share_store() {
        let session = SessionContext::new();
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.emit(&session, image_event(&session)).unwrap();
        assert_eq!(sink.len(), 1);
    }
}
