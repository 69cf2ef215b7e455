//! Byte-range planning and segment reassembly for multi-connection downloads.
//!
//! [`plan_ranges`] splits a file of known size into inclusive ranges, one per
//! download task. Each finished task leaves a segment named after its range
//! (`"start-end"`); [`Merger`] writes those segments into the target file at
//! their offsets and hands back the ranges that still need fetching.

pub mod core;

pub use crate::core::events::MergeEvent;
pub use crate::core::merger::{MergeError, Merger};
pub use crate::core::model::{ByteRange, MergeConfig, MergeOutcome, ParseRangeError};
pub use crate::core::planner::{plan_ranges, plan_ranges_mib, range_length, PlanError};
pub use crate::core::source::{DirSegmentSource, Segment, SegmentSource};
