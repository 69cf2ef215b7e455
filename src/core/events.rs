use crate::core::model::ByteRange;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum MergeEvent {
    PassStarted { target: PathBuf, pending: usize },
    SegmentMerged { range: ByteRange, bytes: u64 },
    SegmentLeftPending { range: ByteRange, reason: String },
    PassFinished { merged: usize, pending: usize },
}
