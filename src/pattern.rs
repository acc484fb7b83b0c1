//! Device-name pattern matching
//!
//! Extracts numeric port identifiers from the raw device-name listing the
//! platform hands back: a flat byte blob of NUL-terminated entries, closed by
//! an empty entry. A pattern is a run of literal bytes followed by `?` digit
//! placeholders ("COM???" matches "COM4" and captures 4).
//!
//! The scan is a single left-to-right pass with a naive restart: any mismatch
//! resets the captured value and the pattern cursor, and matching resumes at
//! the next input byte. There is no backtracking, so an entry like "CCOM1"
//! produces no match. A match completes when an entry terminator arrives while
//! the cursor sits on a placeholder with at least one digit captured, or at
//! the end of the blob with every placeholder consumed. Running off the end of
//! the slice behaves as terminators, so the scan is total over any `&[u8]`.

/// A device-name pattern: literal bytes plus `?` decimal-digit placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    text: Vec<u8>,
}

/// Outcome of one scan step over the listing blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Found {
    /// A completed match: the captured port number and the cursor to resume
    /// scanning from.
    Match(u32, usize),
    /// The end of the blob, with no further match.
    End,
}

impl Pattern {
    /// Build a pattern from its textual form, e.g. `"COM???"`.
    pub fn new(text: &str) -> Self {
        Self {
            text: text.as_bytes().to_vec(),
        }
    }

    /// The textual form the pattern was built from.
    pub fn as_str(&self) -> &str {
        // Construction goes through &str, so the bytes stay valid UTF-8.
        std::str::from_utf8(&self.text).unwrap_or_default()
    }

    /// Scan `blob` from `start` for the next match.
    ///
    /// The returned cursor resumes scanning after the terminator that
    /// completed the match, so repeated calls walk every entry exactly once.
    pub fn find(&self, blob: &[u8], start: usize) -> Found {
        let pat = &self.text;
        let mut value: u32 = 0;
        let mut digits = 0usize;
        let mut sp = start;
        let mut pp = 0usize;
        loop {
            let c = byte_at(blob, sp);
            sp += 1;
            if c == 0 {
                // Entry terminator. A cursor parked on a placeholder means
                // every literal matched; with digits captured that is a match.
                if pat.get(pp) == Some(&b'?') {
                    if digits > 0 {
                        return Found::Match(value, sp);
                    }
                    value = 0;
                    digits = 0;
                    pp = 0;
                    continue;
                }
                if byte_at(blob, sp) == 0 {
                    // Two consecutive terminators close the blob. A fully
                    // consumed pattern still counts as a trailing match.
                    if pp == pat.len() && digits > 0 {
                        return Found::Match(value, sp);
                    }
                    return Found::End;
                }
                value = 0;
                digits = 0;
                pp = 0;
            } else if pat.get(pp) == Some(&b'?') {
                if c.is_ascii_digit() {
                    value = value * 10 + u32::from(c - b'0');
                    digits += 1;
                    pp += 1;
                } else {
                    value = 0;
                    digits = 0;
                    pp = 0;
                }
            } else if pat.get(pp) == Some(&c) {
                pp += 1;
            } else {
                value = 0;
                digits = 0;
                pp = 0;
            }
        }
    }

    /// Lazy iterator over every port number the blob contains, in order.
    pub fn matches<'p, 'b>(&'p self, blob: &'b [u8]) -> Matches<'p, 'b> {
        Matches {
            pattern: self,
            blob,
            cursor: 0,
            done: false,
        }
    }
}

/// Iterator returned by [`Pattern::matches`].
pub struct Matches<'p, 'b> {
    pattern: &'p Pattern,
    blob: &'b [u8],
    cursor: usize,
    done: bool,
}

impl Iterator for Matches<'_, '_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.done {
            return None;
        }
        match self.pattern.find(self.blob, self.cursor) {
            Found::Match(value, resume) => {
                self.cursor = resume;
                Some(value)
            }
            Found::End => {
                self.done = true;
                None
            }
        }
    }
}

fn byte_at(blob: &[u8], index: usize) -> u8 {
    blob.get(index).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn capture_all(pattern: &str, blob: &[u8]) -> Vec<u32> {
        Pattern::new(pattern).matches(blob).collect()
    }

    #[test]
    fn test_single_entry() {
        assert_eq!(capture_all("COM???", b"COM4\0\0"), vec![4]);
    }

    #[test]
    fn test_multi_digit_accumulation() {
        assert_eq!(capture_all("COM???", b"COM15\0\0"), vec![15]);
    }

    #[test]
    fn test_entries_in_order() {
        assert_eq!(
            capture_all("COM???", b"COM3\0COM1\0COM27\0\0"),
            vec![3, 1, 27]
        );
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        // Non-numeric tail restarts the scan without losing later entries.
        assert_eq!(capture_all("COM???", b"COM3\0COM???\0COM10\0\0"), vec![3, 10]);
        // Same result whether or not the blob carries its closing empty entry.
        assert_eq!(capture_all("COM???", b"COM3\0COM???\0COM10\0"), vec![3, 10]);
    }

    #[test]
    fn test_junk_entries_between_matches() {
        assert_eq!(
            capture_all("COM???", b"ttyS0\0COM5\0lp0\0COM6\0\0"),
            vec![5, 6]
        );
    }

    #[test]
    fn test_leading_junk_inside_entry() {
        assert_eq!(capture_all("COM???", b"XCOM4\0\0"), vec![4]);
    }

    #[test]
    fn test_naive_restart_loses_overlap() {
        // The restart consumes the mismatching byte, so the embedded
        // "COM1" is never reconsidered.
        assert_eq!(capture_all("COM???", b"CCOM1\0\0"), Vec::<u32>::new());
    }

    #[test]
    fn test_port_zero_is_a_match() {
        assert_eq!(capture_all("COM???", b"COM0\0\0"), vec![0]);
        assert_eq!(capture_all("tty???", b"tty0\0tty12\0\0"), vec![0, 12]);
    }

    #[test]
    fn test_bare_prefix_is_not_a_match() {
        assert_eq!(capture_all("COM???", b"COM\0COM2\0\0"), vec![2]);
    }

    #[test]
    fn test_placeholder_count_bounds_digits() {
        // All placeholders consumed at the end of the blob is a match...
        assert_eq!(capture_all("COM???", b"COM100\0\0"), vec![100]);
        // ...but mid-blob the cursor has left the placeholder run by the
        // time the terminator arrives, so the capture restarts and is lost.
        assert_eq!(capture_all("COM???", b"COM100\0COM2\0\0"), vec![2]);
        // A fourth digit is a mismatch against the exhausted pattern.
        assert_eq!(capture_all("COM???", b"COM1234\0\0"), Vec::<u32>::new());
        assert_eq!(capture_all("COM???", b"COM1234\0COM5\0\0"), vec![5]);
    }

    #[test]
    fn test_unterminated_blob() {
        assert_eq!(capture_all("COM???", b"COM9"), vec![9]);
        assert_eq!(capture_all("COM???", b"CO"), Vec::<u32>::new());
    }

    #[test]
    fn test_empty_blob() {
        assert_eq!(capture_all("COM???", b""), Vec::<u32>::new());
        assert_eq!(capture_all("COM???", b"\0\0"), Vec::<u32>::new());
    }

    #[test]
    fn test_find_reports_resume_cursor() {
        let pattern = Pattern::new("COM???");
        let blob = b"COM3\0COM10\0\0";
        let Found::Match(value, resume) = pattern.find(blob, 0) else {
            panic!("expected a match");
        };
        assert_eq!(value, 3);
        assert_eq!(resume, 5);
        let Found::Match(value, resume) = pattern.find(blob, resume) else {
            panic!("expected a match");
        };
        assert_eq!(value, 10);
        assert_eq!(pattern.find(blob, resume), Found::End);
    }

    proptest! {
        #[test]
        fn prop_every_entry_captured_in_order(
            entries in prop::collection::vec((1u32..100, "[a-z]{1,8}"), 0..32)
        ) {
            let mut blob = Vec::new();
            for (port, junk) in &entries {
                blob.extend_from_slice(junk.as_bytes());
                blob.push(0);
                blob.extend_from_slice(format!("COM{port}").as_bytes());
                blob.push(0);
            }
            blob.push(0);

            let expected: Vec<u32> = entries.iter().map(|(port, _)| *port).collect();
            let captured = capture_all("COM???", &blob);
            prop_assert_eq!(captured, expected);
        }

        #[test]
        fn prop_scan_is_total(blob in prop::collection::vec(any::<u8>(), 0..512)) {
            // Arbitrary bytes never hang or panic the scan.
            let pattern = Pattern::new("COM???");
            let _ = pattern.matches(&blob).take(64).count();
        }
    }
}
