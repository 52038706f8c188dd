//! Hooks for tokens that a regular DFA cannot recognise.
//!
//! Heredocs, indentation and nested comments need hand-written logic. A
//! grammar declares such tokens as externals and the caller supplies an
//! [`ExternalScanner`] that recognises them. Scanners hold no per-parse
//! state, so one scanner can serve any number of concurrent parses.

use smallvec::SmallVec;

/// Recognises external tokens.
///
/// `scan` is called at the start of a token whenever at least one external
/// token is acceptable to the parser. It returns the declaration index of
/// the recognised token; the token ends where [`ScanCursor::mark_end`] was
/// last called, or at the cursor position if it never was. A token of length
/// zero counts as no match.
pub trait ExternalScanner: Send + Sync {
    fn scan(&self, cursor: &mut ScanCursor<'_>, valid: &ValidExternals) -> Option<usize>;
}

impl<F> ExternalScanner for F
where
    F: Fn(&mut ScanCursor<'_>, &ValidExternals) -> Option<usize> + Send + Sync,
{
    fn scan(&self, cursor: &mut ScanCursor<'_>, valid: &ValidExternals) -> Option<usize> {
        self(cursor, valid)
    }
}

/// The external tokens the parser accepts at the current position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidExternals {
    valid: SmallVec<[bool; 8]>,
}

impl ValidExternals {
    pub(crate) fn from_flags(valid: impl IntoIterator<Item = bool>) -> Self {
        Self {
            valid: valid.into_iter().collect(),
        }
    }

    /// Whether the external token with declaration index `index` is acceptable
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.valid.get(index).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn any(&self) -> bool {
        self.valid.iter().any(|valid| *valid)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.valid
            .iter()
            .enumerate()
            .filter_map(|(index, valid)| valid.then_some(index))
    }
}

/// Read access to the input for an [`ExternalScanner`]
#[derive(Debug)]
pub struct ScanCursor<'a> {
    text: &'a [u8],
    start: usize,
    position: usize,
    end: Option<usize>,
    examined_end: usize,
    looked_behind: bool,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(text: &'a [u8], start: usize) -> Self {
        Self {
            text,
            start,
            position: start,
            end: None,
            examined_end: start,
            looked_behind: false,
        }
    }

    /// Next character without consuming it; `None` at the end of input.
    ///
    /// Bytes that are not valid UTF-8 read as `U+FFFD`.
    pub fn lookahead(&mut self) -> Option<char> {
        self.examine();
        let width = super::scalar_len(self.text, self.position)?;
        let bytes = &self.text[self.position..self.position + width];
        Some(
            std::str::from_utf8(bytes)
                .ok()
                .and_then(|text| text.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        )
    }

    /// Next byte without consuming it
    pub fn lookahead_byte(&mut self) -> Option<u8> {
        self.examine();
        self.text.get(self.position).copied()
    }

    /// Consumes one character; returns false at the end of input.
    pub fn advance(&mut self) -> bool {
        self.examine();
        match super::scalar_len(self.text, self.position) {
            Some(width) => {
                self.position += width;
                true
            }
            None => false,
        }
    }

    /// Ends the token at the current position.
    pub fn mark_end(&mut self) {
        self.end = Some(self.position);
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn token_start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.position >= self.text.len()
    }

    /// Whether the token starts at the beginning of a line.
    ///
    /// Reads the byte before the token, so a token recognised this way is
    /// re-lexed after any edit that ends where it starts.
    pub fn at_line_start(&mut self) -> bool {
        if self.start == 0 {
            return true;
        }
        self.looked_behind = true;
        self.text.get(self.start - 1) == Some(&b'\n')
    }

    fn examine(&mut self) {
        let seen = if self.position >= self.text.len() {
            self.text.len() + 1
        } else {
            self.position + 1
        };
        self.examined_end = self.examined_end.max(seen);
    }

    pub(crate) fn token_end(&self) -> usize {
        self.end.unwrap_or(self.position)
    }

    pub(crate) const fn examined_end(&self) -> usize {
        self.examined_end
    }

    pub(crate) const fn looked_behind(&self) -> bool {
        self.looked_behind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reads_characters() {
        let mut cursor = ScanCursor::new("aé!".as_bytes(), 0);
        assert_eq!(cursor.lookahead(), Some('a'));
        assert!(cursor.advance());
        assert_eq!(cursor.lookahead(), Some('é'));
        assert!(cursor.advance());
        assert_eq!(cursor.position(), 3);
        cursor.mark_end();
        assert!(cursor.advance());
        assert!(cursor.is_at_end());
        assert!(!cursor.advance());
        assert_eq!(cursor.token_end(), 3);
        assert_eq!(cursor.examined_end(), 5);
    }

    #[test]
    fn test_line_start_records_look_behind() {
        let mut cursor = ScanCursor::new(b"a\n%x", 2);
        assert!(!cursor.looked_behind());
        assert!(cursor.at_line_start());
        assert!(cursor.looked_behind());

        let mut cursor = ScanCursor::new(b"a %x", 2);
        assert!(!cursor.at_line_start());
        assert!(cursor.looked_behind());

        let mut cursor = ScanCursor::new(b"%x", 0);
        assert!(cursor.at_line_start());
        assert!(!cursor.looked_behind());
    }

    #[test]
    fn test_cursor_invalid_utf8() {
        let mut cursor = ScanCursor::new(&[0xFF, b'a'], 0);
        assert_eq!(cursor.lookahead(), Some(char::REPLACEMENT_CHARACTER));
        assert!(cursor.advance());
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_valid_externals() {
        let valid = ValidExternals::from_flags([false, true, true]);
        assert!(valid.any());
        assert!(!valid.contains(0));
        assert!(!valid.contains(7));
        assert_eq!(valid.iter().collect::<Vec<_>>(), [1, 2]);
        assert!(!ValidExternals::default().any());
    }

    #[test]
    fn test_closure_scanner() {
        let scanner = |cursor: &mut ScanCursor<'_>, valid: &ValidExternals| {
            (valid.contains(0) && cursor.lookahead() == Some('%')).then(|| {
                cursor.advance();
                0usize
            })
        };
        let mut cursor = ScanCursor::new(b"%x", 0);
        let valid = ValidExternals::from_flags([true]);
        assert_eq!(scanner.scan(&mut cursor, &valid), Some(0));
        assert_eq!(cursor.token_end(), 1);
    }
}
