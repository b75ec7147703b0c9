//! The client's single model of what is on screen.
//!
//! Every transition here is synchronous and free of I/O; the duties in
//! [`super::Session`] apply them under the state lock and then ask the
//! render engine for the redraw each transition calls for.

use std::{collections::BTreeMap, io};

use crate::frame::{Frame, FrameKind};

use super::input::KeyEvent;

/// Which render path a transition needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// History changed: clear and repaint everything.
    Full,
    /// Only typing indicators or the prompt changed.
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    Send { frame: Frame, redraw: Redraw },
    Interrupt,
}

/// Row accounting of the last paint, needed to find the top of the live
/// region again without repainting history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaintedLayout {
    pub status_lines: usize,
    /// Rows the prompt wrapped onto above the cursor's row.
    pub prompt_rows: usize,
}

#[derive(Debug, Clone)]
pub struct TerminalState {
    username: String,
    own_line: Vec<u8>,
    typing_lines: BTreeMap<String, Vec<u8>>,
    history: Vec<String>,
    painted: PaintedLayout,
}

impl TerminalState {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            own_line: Vec::new(),
            typing_lines: BTreeMap::new(),
            history: Vec::new(),
            painted: PaintedLayout::default(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn own_line(&self) -> &[u8] {
        &self.own_line
    }

    pub fn typing_lines(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.typing_lines
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn painted(&self) -> PaintedLayout {
        self.painted
    }

    pub fn record_paint(&mut self, layout: PaintedLayout) {
        self.painted = layout;
    }

    pub fn prompt(&self) -> String {
        format!("{}: {}", self.username, String::from_utf8_lossy(&self.own_line))
    }

    pub fn apply_frame(&mut self, frame: &Frame) -> Redraw {
        match frame.kind {
            FrameKind::FinalMessage => {
                self.history.push(format!("{}: {}", frame.sender, frame.text()));
                self.typing_lines.remove(&frame.sender);
                Redraw::Full
            }
            FrameKind::TypingUpdate => {
                if frame.payload.is_empty() {
                    self.typing_lines.remove(&frame.sender);
                } else {
                    self.typing_lines
                        .insert(frame.sender.clone(), frame.payload.clone());
                }
                Redraw::Incremental
            }
        }
    }

    /// Records that the hub stream is gone; `None` means it ended cleanly.
    pub fn connection_lost(&mut self, error: Option<&io::Error>) -> Redraw {
        let notice = match error {
            Some(error) => format!("*** connection to hub lost: {error}"),
            None => "*** hub closed the connection".to_string(),
        };
        self.history.push(notice);
        Redraw::Full
    }

    pub fn apply_key(&mut self, key: KeyEvent) -> KeyOutcome {
        match key {
            KeyEvent::Enter if self.own_line.is_empty() => KeyOutcome::Ignored,
            KeyEvent::Enter => {
                let line = std::mem::take(&mut self.own_line);
                self.history.push(format!(
                    "{}: {}",
                    self.username,
                    String::from_utf8_lossy(&line)
                ));
                KeyOutcome::Send {
                    frame: Frame::message(self.username.clone(), line),
                    redraw: Redraw::Full,
                }
            }
            KeyEvent::Delete => match self.own_line.pop() {
                Some(_) => self.typing_outcome(),
                None => KeyOutcome::Ignored,
            },
            KeyEvent::Interrupt => KeyOutcome::Interrupt,
            KeyEvent::Printable(byte) => {
                self.own_line.push(byte);
                self.typing_outcome()
            }
        }
    }

    fn typing_outcome(&self) -> KeyOutcome {
        KeyOutcome::Send {
            frame: Frame::typing(self.username.clone(), self.own_line.clone()),
            redraw: Redraw::Incremental,
        }
    }
}
