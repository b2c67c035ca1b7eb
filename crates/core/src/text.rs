// Text offsets
//
// Offsets exposed to front-ends are UTF-16 code units. Rust strings are indexed
// by bytes, so every boundary crossing goes through these helpers.

use serde::{Deserialize, Serialize};

/// A selection inside the composer text, in UTF-16 code units.
///
/// `start` may be greater than `end` (a selection made right to left). Use
/// [`Selection::min`] / [`Selection::max`] for range math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Collapsed selection (a caret).
    pub fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn min(&self) -> usize {
        self.start.min(self.end)
    }

    pub fn max(&self) -> usize {
        self.start.max(self.end)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Convert a UTF-16 offset into a byte offset, clamped to the string length.
/// Offsets falling inside a surrogate pair resolve to the start of that char.
pub fn utf16_to_byte(s: &str, utf16_idx: usize) -> usize {
    let mut units = 0;
    for (byte, ch) in s.char_indices() {
        if units >= utf16_idx {
            return byte;
        }
        units += ch.len_utf16();
        if units > utf16_idx {
            return byte;
        }
    }
    s.len()
}

/// Convert a byte offset into a UTF-16 offset.
pub fn byte_to_utf16(s: &str, byte_idx: usize) -> usize {
    let mut end = byte_idx.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    utf16_len(&s[..end])
}

/// Replace the UTF-16 range `[start, end)` of `s` with `replacement`.
pub fn splice_utf16(s: &str, start: usize, end: usize, replacement: &str) -> String {
    let from = utf16_to_byte(s, start.min(end));
    let to = utf16_to_byte(s, start.max(end));
    let mut out = String::with_capacity(s.len() + replacement.len());
    out.push_str(&s[..from]);
    out.push_str(replacement);
    out.push_str(&s[to..]);
    out
}
