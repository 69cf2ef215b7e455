use std::fmt;
use std::str::FromStr;

/// Inclusive byte span of a file, stored as `(offset, len)`.
///
/// The serialized form is `"start-end"`. A zero-length value is the empty-file
/// sentinel and serializes as `"0-0"`, the same string a genuine one-byte
/// range at offset 0 produces; in memory the two stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    offset: u64,
    len: u64,
}

impl ByteRange {
    /// The single range of an empty file.
    pub const EMPTY: ByteRange = ByteRange { offset: 0, len: 0 };

    /// Range covering `start..=end`.
    ///
    /// Panics if `end < start`; use [`ByteRange::try_new`] for untrusted input.
    pub fn new(start: u64, end: u64) -> Self {
        Self::try_new(start, end).expect("range end before start")
    }

    pub fn try_new(start: u64, end: u64) -> Option<Self> {
        if end < start {
            return None;
        }
        Some(Self { offset: start, len: end - start + 1 })
    }

    pub fn start(&self) -> u64 {
        self.offset
    }

    /// Last byte covered. Reported as 0 for the empty sentinel.
    pub fn end(&self) -> u64 {
        if self.len == 0 {
            self.offset
        } else {
            self.offset + self.len - 1
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// File name of the segment holding this range's bytes.
    pub fn segment_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start(), self.end())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseRangeError {
    #[error("range {0:?} is not of the form start-end")]
    Format(String),

    #[error("range {0:?} has a non-numeric bound")]
    Bound(String),

    #[error("range {0:?} ends before it starts")]
    Reversed(String),
}

/// Splits `"start-end"` into its two bounds without interpreting them.
pub(crate) fn parse_bounds(s: &str) -> Result<(u64, u64), ParseRangeError> {
    let (a, b) = s
        .split_once('-')
        .ok_or_else(|| ParseRangeError::Format(s.to_string()))?;
    let bound = |v: &str| {
        if v.is_empty() || !v.bytes().all(|c| c.is_ascii_digit()) {
            return Err(ParseRangeError::Bound(s.to_string()));
        }
        v.parse::<u64>().map_err(|_| ParseRangeError::Bound(s.to_string()))
    };
    Ok((bound(a)?, bound(b)?))
}

impl FromStr for ByteRange {
    type Err = ParseRangeError;

    /// `"0-0"` parses to [`ByteRange::EMPTY`], matching the on-disk sentinel.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = parse_bounds(s)?;
        if start == 0 && end == 0 {
            return Ok(ByteRange::EMPTY);
        }
        ByteRange::try_new(start, end).ok_or_else(|| ParseRangeError::Reversed(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Merged,
    LeftPending,
}

/// Result of one merge pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: Vec<ByteRange>,
    /// Ranges still to be re-fetched, in the order they were given.
    pub pending: Vec<ByteRange>,
}

impl MergeOutcome {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn record(&mut self, range: ByteRange, state: SegmentState) {
        match state {
            SegmentState::Merged => self.merged.push(range),
            SegmentState::LeftPending => self.pending.push(range),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Delete a segment once its bytes are in the target.
    pub remove_merged: bool,
    /// Leave a segment pending when its length disagrees with its range.
    pub verify_sizes: bool,
    pub copy_buffer_bytes: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            remove_merged: true,
            verify_sizes: true,
            copy_buffer_bytes: 64 * 1024,
        }
    }
}
