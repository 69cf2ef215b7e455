use crate::core::model::{parse_bounds, ByteRange, ParseRangeError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("chunk size must be positive")]
    ZeroChunkSize,

    #[error("chunk size of {0} MiB overflows")]
    ChunkOverflow(u64),
}

/// Splits `total` bytes into contiguous inclusive ranges of at most `max_chunk`
/// bytes. The last range absorbs a remainder shorter than one chunk, so there
/// are never more than `max(total / span, 1)` ranges.
pub fn plan_ranges(total: u64, max_chunk: u64) -> Result<Vec<ByteRange>, PlanError> {
    if max_chunk == 0 {
        return Err(PlanError::ZeroChunkSize);
    }
    if total == 0 {
        return Ok(vec![ByteRange::EMPTY]);
    }

    let span = max_chunk.min(total);
    let parts = (total / span).max(1);
    let last = total - 1;

    let mut ranges = Vec::with_capacity(usize::try_from(parts).unwrap_or(usize::MAX).min(4096));
    let mut offset = 0u64;
    for _ in 0..parts {
        let mut end = offset + span - 1;
        if last - end < span {
            end = last;
        }
        ranges.push(ByteRange::new(offset, end));
        if end == last {
            break;
        }
        offset = end + 1;
    }
    Ok(ranges)
}

pub fn plan_ranges_mib(total: u64, chunk_mib: u64) -> Result<Vec<ByteRange>, PlanError> {
    let chunk = chunk_mib
        .checked_mul(1024 * 1024)
        .ok_or(PlanError::ChunkOverflow(chunk_mib))?;
    plan_ranges(total, chunk)
}

/// Byte length implied by a segment name such as `"200-1000"` (801).
///
/// A name ending at 0 is the empty-file sentinel and yields 0, so a genuine
/// one-byte file cannot be told apart by name alone; typed callers should use
/// [`ByteRange::len`].
pub fn range_length(range: &str) -> Result<u64, ParseRangeError> {
    let (start, end) = parse_bounds(range)?;
    if end == 0 {
        return Ok(0);
    }
    if end < start {
        return Err(ParseRangeError::Reversed(range.to_string()));
    }
    Ok(end - start + 1)
}
