use descale_simulation::Frame;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[cfg(feature = "websocket")]
mod websocket;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketSender;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary serialization error: {0}")]
    Binary(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

// --- Traits ---
/// Turns a frame description into text a drawing host can consume.
pub trait Serializer: Send + Sync {
    fn serialize(&self, frame: &Frame) -> Result<String, TransportError>;
}

/// Sends serialized data to a destination.
pub trait Sender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

// --- Serializers ---

/// Serializes frames as JSON objects, each primitive keyed by its kind.
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, frame: &Frame) -> Result<String, TransportError> {
        Ok(serde_json::to_string(frame)?)
    }
}

/// Serializes frames with bincode and base64-encodes the bytes so they can
/// travel over line- and text-oriented senders.
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn serialize(&self, frame: &Frame) -> Result<String, TransportError> {
        let bytes = bincode::serialize(frame)?;
        Ok(base64::encode(bytes))
    }
}

// --- Senders ---

/// Writes one frame per line to standard output.
pub struct StdioSender {
    stdout: io::Stdout,
}

impl StdioSender {
    pub fn new() -> Self {
        StdioSender { stdout: io::stdout() }
    }
}

impl Default for StdioSender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender for StdioSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut out = self.stdout.lock();
        out.write_all(data)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// Appends one frame per line to a file.
pub struct FileSender {
    writer: BufWriter<File>,
}

impl FileSender {
    pub fn create(path: &Path) -> Result<Self, TransportError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl Sender for FileSender {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.writer.write_all(data)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use descale_simulation::{ParticleSimulation, Primitive};

    fn frame() -> Frame {
        let mut sim = ParticleSimulation::seeded(1000.0, 400.0, 3);
        for _ in 0..10 {
            sim.tick();
        }
        sim.frame()
    }

    #[test]
    fn json_serializer_is_readable_by_hosts() {
        let frame = frame();
        let text = JsonSerializer.serialize(&frame).unwrap();
        assert!(text.starts_with(r#"{"tick":10,"#));

        let decoded: Frame = serde_json::from_str(&text).unwrap();
        assert_eq!(decoded.tick, frame.tick);
        assert_eq!(decoded.active_layer, frame.active_layer);
        assert_eq!(decoded.primitives.len(), frame.primitives.len());
        assert!(matches!(decoded.primitives[0], Primitive::Clear { .. }));
    }

    #[test]
    fn binary_serializer_decodes_back_to_the_frame() {
        let frame = frame();
        let text = BinarySerializer.serialize(&frame).unwrap();
        assert!(!text.contains('\n'));

        let bytes = base64::decode(&text).unwrap();
        let decoded: Frame = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn file_sender_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.jsonl");

        let mut sender = FileSender::create(&path).unwrap();
        sender.send(b"first").unwrap();
        sender.send(b"second").unwrap();
        drop(sender);

        let mut reopened = FileSender::create(&path).unwrap();
        reopened.send(b"third").unwrap();
        drop(reopened);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\nthird\n");
    }
}
