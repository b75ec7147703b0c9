//! Screen painting as pure functions.
//!
//! Both redraw paths read a [`TerminalState`] and return the operations to
//! apply plus the row accounting to record; neither touches the terminal.
//! The screen layout, top to bottom:
//!
//! ```text
//! banner
//! history...
//! <peer> is typing: <line>      one row per non-empty indicator
//! ----------------------------
//! <username>: <own line>        cursor stays at the end
//! ```

use unicode_width::UnicodeWidthChar;

use super::state::{PaintedLayout, TerminalState};

pub const SEPARATOR_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenOp {
    /// Erase the whole screen and home the cursor.
    ClearAll,
    /// Move to column zero, `n` rows up.
    MoveUp(usize),
    /// Erase from the cursor to the end of the screen.
    ClearBelow,
    Print(String),
    NewLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paint {
    pub ops: Vec<ScreenOp>,
    pub layout: PaintedLayout,
}

pub fn banner(username: &str) -> String {
    format!("typing-relay: connected as {} (Ctrl+C to quit)", visible(username))
}

pub fn full_redraw(state: &TerminalState, width: usize) -> Paint {
    let mut ops = vec![
        ScreenOp::ClearAll,
        ScreenOp::Print(banner(state.username())),
        ScreenOp::NewLine,
    ];
    for line in state.history() {
        ops.push(ScreenOp::Print(visible(line)));
        ops.push(ScreenOp::NewLine);
    }
    let layout = paint_live_region(state, width, &mut ops);
    Paint { ops, layout }
}

/// Repaints indicators, separator and prompt in place.
///
/// Must follow a previous paint of the same state lineage: the rows to climb
/// come from the accounting that paint recorded.
pub fn incremental_redraw(state: &TerminalState, width: usize) -> Paint {
    let painted = state.painted();
    let lines_up = painted.status_lines + 1 + painted.prompt_rows;

    let mut ops = vec![ScreenOp::MoveUp(lines_up), ScreenOp::ClearBelow];
    let layout = paint_live_region(state, width, &mut ops);
    Paint { ops, layout }
}

fn paint_live_region(
    state: &TerminalState,
    width: usize,
    ops: &mut Vec<ScreenOp>,
) -> PaintedLayout {
    let width = width.max(1);
    let mut status_lines = 0;
    for (peer, line) in state.typing_lines() {
        if line.is_empty() {
            continue;
        }
        let indicator = format!("{peer} is typing: {}", String::from_utf8_lossy(line));
        // One row each, so the climb back up stays a plain count.
        ops.push(ScreenOp::Print(truncate_to_width(&visible(&indicator), width)));
        ops.push(ScreenOp::NewLine);
        status_lines += 1;
    }

    ops.push(ScreenOp::Print("-".repeat(SEPARATOR_WIDTH.min(width))));
    ops.push(ScreenOp::NewLine);

    let prompt = visible(&state.prompt());
    let prompt_rows = rows_above_cursor(&prompt, width);
    ops.push(ScreenOp::Print(prompt));

    PaintedLayout {
        status_lines,
        prompt_rows,
    }
}

/// Shows control characters in caret notation (`^[` for ESC) so payload
/// bytes are printed as text and never reach the terminal as commands.
fn visible(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{7f}' => out.push_str("^?"),
            c if u32::from(c) < 0x20 => {
                out.push('^');
                out.push(char::from(c as u8 + b'@'));
            }
            c if c.is_control() => out.extend(c.escape_default()),
            c => out.push(c),
        }
    }
    out
}

fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = char_width(ch);
        if used + w > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out
}

/// Rows between the first row of `text` and the cursor once it is printed
/// from column zero. A character that does not fit on the current row starts
/// the next one, and a row filled exactly leaves the cursor on it.
fn rows_above_cursor(text: &str, width: usize) -> usize {
    let mut row = 0;
    let mut col = 0;
    for ch in text.chars() {
        let w = char_width(ch);
        if w == 0 {
            continue;
        }
        if col > 0 && col + w > width {
            row += 1;
            col = 0;
        }
        col += w;
    }
    row
}
