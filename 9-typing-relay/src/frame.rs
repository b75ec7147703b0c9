use serde::{Deserialize, Serialize};

/// What a frame's payload means to the receiving terminal.
///
/// The hub never looks at this; it relays every frame opaquely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// The sender's whole uncommitted input line, not a delta.
    TypingUpdate,
    /// A complete committed line.
    FinalMessage,
}

/// One chat protocol message.
///
/// `sender` is whatever label the sending client chose; nothing verifies it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame {
    pub sender: String,
    pub payload: Vec<u8>,
    pub kind: FrameKind,
}

impl Frame {
    pub fn typing(sender: impl Into<String>, line: impl Into<Vec<u8>>) -> Self {
        Self {
            sender: sender.into(),
            payload: line.into(),
            kind: FrameKind::TypingUpdate,
        }
    }

    pub fn message(sender: impl Into<String>, line: impl Into<Vec<u8>>) -> Self {
        Self {
            sender: sender.into(),
            payload: line.into(),
            kind: FrameKind::FinalMessage,
        }
    }

    /// Payload decoded for display; invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
