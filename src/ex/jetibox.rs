//! # Jetibox Side Channel
//!
//! The two-line text display and the key codes coming back from the
//! receiver. Both share the EX wire.
//!
//! ## Text frame
//!
//! ```text
//! 0xFE [32 bytes: line 1 (16) + line 2 (16)] 0xFF
//! ```
//!
//! Start and end bytes go out with the ninth bit clear. Until a line is set
//! the payload is all zeros.
//!
//! ## Key codes
//!
//! One byte per key event. The upper nibble holds one active-low bit per key,
//! the lower nibble is always zero; `0xF0` means no key pressed.

use super::protocol::{Word, TEXT_FRAME_END, TEXT_FRAME_LEN, TEXT_FRAME_START, TEXT_LINE_LEN, TEXT_PAYLOAD_LEN};

/// Display line selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLine {
    Line1,
    Line2,
}

impl TextLine {
    const fn offset(self) -> usize {
        match self {
            Self::Line1 => 0,
            Self::Line2 => TEXT_LINE_LEN,
        }
    }
}

/// Jetibox display contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JetiboxText {
    buffer: Option<[u8; TEXT_PAYLOAD_LEN]>,
}

impl JetiboxText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one line; text beyond 16 bytes is cut, shorter text is blank padded
    ///
    /// A NUL byte ends the text early. The first call blanks the whole display.
    ///
    /// # Examples
    ///
    /// ```
    /// use jetiex_uplink::ex::jetibox::{JetiboxText, TextLine};
    ///
    /// let mut text = JetiboxText::new();
    /// text.set_line(TextLine::Line1, "Hello");
    /// assert_eq!(&text.payload()[..8], b"Hello   ");
    /// ```
    pub fn set_line(&mut self, line: TextLine, text: &str) {
        let buffer = self.buffer.get_or_insert([b' '; TEXT_PAYLOAD_LEN]);
        let dest = &mut buffer[line.offset()..line.offset() + TEXT_LINE_LEN];

        let mut src = text.bytes().take_while(|&b| b != 0);
        for slot in dest.iter_mut() {
            *slot = src.next().unwrap_or(b' ');
        }
    }

    /// Whether any line was ever set
    pub fn is_set(&self) -> bool {
        self.buffer.is_some()
    }

    /// The 32 payload bytes as sent
    pub fn payload(&self) -> [u8; TEXT_PAYLOAD_LEN] {
        self.buffer.unwrap_or([0; TEXT_PAYLOAD_LEN])
    }

    /// Complete text frame as wire words
    pub fn frame_words(&self) -> [Word; TEXT_FRAME_LEN] {
        let payload = self.payload();
        let mut words = [Word::new(0, true); TEXT_FRAME_LEN];

        words[0] = Word::new(TEXT_FRAME_START, false);
        for (word, &b) in words[1..=TEXT_PAYLOAD_LEN].iter_mut().zip(payload.iter()) {
            *word = Word::new(b, true);
        }
        words[TEXT_FRAME_LEN - 1] = Word::new(TEXT_FRAME_END, false);

        words
    }
}

/// Key code reported by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JetiboxKey(u8);

impl JetiboxKey {
    pub const LEFT: Self = Self(0x70);
    pub const DOWN: Self = Self(0xB0);
    pub const UP: Self = Self(0xD0);
    pub const RIGHT: Self = Self(0xE0);

    const NONE: u8 = 0xF0;

    /// Accept a received byte if it has the key code pattern
    pub const fn from_code(code: u8) -> Option<Self> {
        if is_key_code(code) {
            Some(Self(code))
        } else {
            None
        }
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    pub const fn left(self) -> bool {
        self.0 & 0x80 == 0
    }

    pub const fn down(self) -> bool {
        self.0 & 0x40 == 0
    }

    pub const fn up(self) -> bool {
        self.0 & 0x20 == 0
    }

    pub const fn right(self) -> bool {
        self.0 & 0x10 == 0
    }
}

impl std::fmt::Display for JetiboxKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (self.left(), "left"),
            (self.down(), "down"),
            (self.up(), "up"),
            (self.right(), "right"),
        ];
        let mut first = true;
        for (_, name) in names.iter().filter(|(pressed, _)| *pressed) {
            if !first {
                f.write_str("+")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

/// Received bytes other than key codes are line noise or echo
pub const fn is_key_code(code: u8) -> bool {
    code != JetiboxKey::NONE && code & 0x0F == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_text_is_zero() {
        let text = JetiboxText::new();
        assert!(!text.is_set());
        assert_eq!(text.payload(), [0u8; 32]);
    }

    #[test]
    fn test_set_line_pads_and_truncates() {
        let mut text = JetiboxText::new();
        text.set_line(TextLine::Line2, "0123456789ABCDEFGHIJ");

        let payload = text.payload();
        assert_eq!(&payload[..16], &[b' '; 16]);
        assert_eq!(&payload[16..], b"0123456789ABCDEF");

        text.set_line(TextLine::Line2, "ok");
        assert_eq!(&text.payload()[16..], b"ok              ");
    }

    #[test]
    fn test_set_line_stops_at_nul() {
        let mut text = JetiboxText::new();
        text.set_line(TextLine::Line1, "ab\0cd");
        assert_eq!(&text.payload()[..4], b"ab  ");
    }

    #[test]
    fn test_frame_words() {
        let mut text = JetiboxText::new();
        text.set_line(TextLine::Line1, "Hi");
        let words = text.frame_words();

        assert_eq!(words.len(), 34);
        assert_eq!(words[0], Word::new(0xFE, false));
        assert_eq!(words[1], Word::new(b'H', true));
        assert_eq!(words[3], Word::new(b' ', true));
        assert_eq!(words[33], Word::new(0xFF, false));
    }

    #[test]
    fn test_key_code_filter() {
        assert!(is_key_code(0x70));
        assert!(is_key_code(0x60));
        assert!(!is_key_code(0xF0));
        assert!(!is_key_code(0x71));
        assert!(!is_key_code(0x7E));
        assert_eq!(JetiboxKey::from_code(0xF0), None);
    }

    #[test]
    fn test_key_decoding() {
        let key = JetiboxKey::from_code(0x60).unwrap();
        assert!(key.left());
        assert!(key.right());
        assert!(!key.down());
        assert!(!key.up());
        assert_eq!(JetiboxKey::from_code(0x50).unwrap().to_string(), "left+up");
        assert_eq!(JetiboxKey::from_code(0x30).unwrap().to_string(), "left+down");
        assert_eq!(JetiboxKey::UP.to_string(), "up");
        assert!(JetiboxKey::RIGHT.right());
    }
}
