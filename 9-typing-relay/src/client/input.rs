/// One raw keystroke, as the outbound duty understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Printable(u8),
    Delete,
    Enter,
    Interrupt,
}

const ETX: u8 = 3;
const BACKSPACE: u8 = 8;
const CARRIAGE_RETURN: u8 = b'\r';
const DEL: u8 = 127;

/// Bytes of multi-byte UTF-8 sequences come through as `Printable` one by one.
pub fn decode_key(byte: u8) -> KeyEvent {
    match byte {
        CARRIAGE_RETURN => KeyEvent::Enter,
        DEL | BACKSPACE => KeyEvent::Delete,
        ETX => KeyEvent::Interrupt,
        other => KeyEvent::Printable(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_bytes_map_to_actions() {
        assert_eq!(decode_key(b'\r'), KeyEvent::Enter);
        assert_eq!(decode_key(127), KeyEvent::Delete);
        assert_eq!(decode_key(8), KeyEvent::Delete);
        assert_eq!(decode_key(3), KeyEvent::Interrupt);
    }

    #[test]
    fn everything_else_is_input() {
        for byte in [b'a', b' ', b'~', b'\n', b'\t', 0xc3, 0xa9] {
            assert_eq!(decode_key(byte), KeyEvent::Printable(byte));
        }
    }
}
