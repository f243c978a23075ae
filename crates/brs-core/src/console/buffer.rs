//! Line reassembly for the debug console stream.
//!
//! # Why a carry is needed
//!
//! TCP delivers bytes, not lines.  One read may end in the middle of a line
//! (`"hello wor"`) and the next read completes it (`"ld\nfoo\n"`).  The
//! buffer keeps the unterminated tail of each chunk as a *partial-line carry*
//! and prepends it to the next chunk, so only complete lines ever reach the
//! history.
//!
//! # Bounded history
//!
//! The history keeps the most recent [`MAX_BUFFER_LINES`] lines.  Older lines
//! are dropped from the front after every append.
//!
//! # Reading command replies
//!
//! The console has no request/response framing.  A command reply is whatever
//! arrives after the command was written, so callers take a [`mark`] before
//! writing and read [`lines_since`] that mark afterwards.  The mark counts
//! every line ever appended, which keeps it valid after old lines have been
//! trimmed away.
//!
//! [`mark`]: LineBuffer::mark
//! [`lines_since`]: LineBuffer::lines_since

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::OnceLock;

use regex::Regex;

/// Maximum number of complete lines kept in a [`LineBuffer`].
pub const MAX_BUFFER_LINES: usize = 1000;

/// Removes ANSI CSI sequences (`ESC [ params letter`), e.g. colour codes.
///
/// ```rust
/// use brs_core::strip_ansi;
///
/// assert_eq!(strip_ansi("\x1b[31mERROR\x1b[0m"), "ERROR");
/// ```
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ANSI pattern is a valid regex"))
        .replace_all(text, "")
}

/// Ordered, capacity-bounded history of console lines plus the partial-line carry.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    partial: String,
    capacity: usize,
    /// Total number of lines ever appended.
    appended: u64,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineBuffer {
    /// Creates an empty buffer holding up to [`MAX_BUFFER_LINES`] lines.
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_LINES)
    }

    /// Creates an empty buffer holding up to `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(MAX_BUFFER_LINES)),
            partial: String::new(),
            capacity,
            appended: 0,
        }
    }

    /// Feeds one chunk of console text into the buffer.
    ///
    /// The chunk is joined to the carry, ANSI sequences are stripped, and the
    /// text is split on `\n`.  Every segment but the last is a complete line
    /// and is appended (a trailing `\r` from CRLF line endings is dropped).
    /// The last segment, possibly empty, becomes the new carry.
    ///
    /// Lines are therefore not stored byte-for-byte as split: the console
    /// ends lines with CRLF, and keeping the `\r` would leak it into every
    /// command reply.
    ///
    /// Returns the number of complete lines appended.
    pub fn ingest(&mut self, chunk: &str) -> usize {
        let mut joined = std::mem::take(&mut self.partial);
        joined.push_str(chunk);

        let text = strip_ansi(&joined);
        let mut segments: Vec<&str> = text.split('\n').collect();
        // `split` always yields at least one segment.
        self.partial = segments.pop().unwrap_or_default().to_string();

        let count = segments.len();
        for segment in segments {
            let line = segment.strip_suffix('\r').unwrap_or(segment);
            self.lines.push_back(line.to_string());
        }
        self.appended += count as u64;

        let excess = self.lines.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.lines.drain(..excess);
        }
        count
    }

    /// The last `n` lines, oldest first (fewer if the buffer is smaller).
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }

    /// A position marker for [`lines_since`](Self::lines_since).
    pub fn mark(&self) -> u64 {
        self.appended
    }

    /// Lines appended after `mark` was taken that are still retained.
    pub fn lines_since(&self, mark: u64) -> Vec<String> {
        let new = usize::try_from(self.appended.saturating_sub(mark)).unwrap_or(usize::MAX);
        self.recent(new)
    }

    /// The unterminated tail carried over to the next chunk.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops the history and the carry.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
