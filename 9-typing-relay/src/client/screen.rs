use std::io::{self, Write};

use crossterm::{
    cursor::{MoveTo, MoveToColumn, MoveUp},
    queue,
    style::Print,
    terminal::{self, Clear, ClearType},
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

use super::render::ScreenOp;

pub const DEFAULT_WIDTH: usize = 80;

enum WidthSource {
    Terminal,
    Fixed(usize),
}

/// The physical output, behind its own lock so paints from the two duties
/// never interleave their escape sequences.
pub struct Screen<W> {
    out: Mutex<W>,
    width: WidthSource,
}

impl Screen<io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: Mutex::new(io::stdout()),
            width: WidthSource::Terminal,
        }
    }
}

impl<W: Write> Screen<W> {
    pub fn with_fixed_width(out: W, width: usize) -> Self {
        Self {
            out: Mutex::new(out),
            width: WidthSource::Fixed(width),
        }
    }

    pub fn width(&self) -> usize {
        let width = match self.width {
            WidthSource::Terminal => terminal::size()
                .map(|(cols, _)| usize::from(cols))
                .unwrap_or(DEFAULT_WIDTH),
            WidthSource::Fixed(width) => width,
        };
        width.max(1)
    }

    pub async fn lock(&self) -> MutexGuard<'_, W> {
        self.out.lock().await
    }
}

pub fn apply_ops<W: Write>(out: &mut W, ops: &[ScreenOp]) -> io::Result<()> {
    for op in ops {
        match op {
            ScreenOp::ClearAll => queue!(out, Clear(ClearType::All), MoveTo(0, 0))?,
            ScreenOp::MoveUp(rows) => {
                queue!(out, MoveToColumn(0))?;
                // CSI 0 A still moves one row on most terminals.
                if *rows > 0 {
                    let rows = u16::try_from(*rows).unwrap_or(u16::MAX);
                    queue!(out, MoveUp(rows))?;
                }
            }
            ScreenOp::ClearBelow => queue!(out, Clear(ClearType::FromCursorDown))?,
            ScreenOp::Print(text) => queue!(out, Print(text))?,
            // Raw mode turns off output post-processing, so LF alone won't return.
            ScreenOp::NewLine => queue!(out, Print("\r\n"))?,
        }
    }
    out.flush()
}

/// Keeps the terminal in raw mode for as long as it lives.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(error) = terminal::disable_raw_mode() {
            warn!(?error, "failed to restore terminal mode");
        }
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\r\n").and_then(|()| stdout.flush());
    }
}
