use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

use crate::core::assembler::Assembler;
use crate::core::events::MergeEvent;
use crate::core::model::{ByteRange, MergeConfig, MergeOutcome, SegmentState};
use crate::core::source::{DirSegmentSource, SegmentSource};

#[derive(thiserror::Error, Debug)]
pub enum MergeError {
    #[error("cannot open target {path:?}")]
    TargetUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot remove segment directory {path:?}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stitches downloaded segments into a target file.
///
/// One merge pass owns the target for its duration; callers must not run two
/// passes against the same target at once.
#[derive(Clone)]
pub struct Merger {
    config: MergeConfig,
    event_tx: broadcast::Sender<MergeEvent>,
}

impl Merger {
    pub fn new(config: MergeConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { config, event_tx }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MergeEvent> {
        self.event_tx.subscribe()
    }

    pub async fn merge_dir(
        &self,
        pending: &[ByteRange],
        segment_dir: &Path,
        target: &Path,
    ) -> Result<MergeOutcome, MergeError> {
        self.merge(pending, &DirSegmentSource::new(segment_dir), target).await
    }

    /// Runs one pass over `pending` and returns what is still outstanding.
    ///
    /// Only a target that cannot be opened fails the pass. A segment that is
    /// missing, has the wrong size, or fails mid-copy stays pending and the
    /// remaining segments are still merged. Bytes written for a range that
    /// later fails are not rolled back; re-merging that range overwrites them.
    pub async fn merge(
        &self,
        pending: &[ByteRange],
        source: &dyn SegmentSource,
        target: &Path,
    ) -> Result<MergeOutcome, MergeError> {
        let mut asm = Assembler::open(target).await.map_err(|e| MergeError::TargetUnavailable {
            path: target.to_path_buf(),
            source: e,
        })?;

        tracing::info!(target_file = %target.display(), source = source.name(), pending = pending.len(), "merge pass started");
        let _ = self.event_tx.send(MergeEvent::PassStarted {
            target: target.to_path_buf(),
            pending: pending.len(),
        });

        let mut outcome = MergeOutcome::default();
        let mut seen = HashSet::with_capacity(pending.len());
        for &range in pending {
            // a repeated range is attempted once; its first result stands
            if !seen.insert(range) {
                tracing::debug!(%range, "duplicate range skipped");
                continue;
            }
            let state = match self.merge_one(&mut asm, source, range).await {
                Ok(bytes) => {
                    tracing::debug!(%range, bytes, "segment merged");
                    let _ = self.event_tx.send(MergeEvent::SegmentMerged { range, bytes });
                    if self.config.remove_merged {
                        if let Err(e) = source.discard(range).await {
                            tracing::warn!(%range, error = %e, "merged segment could not be removed");
                        }
                    }
                    SegmentState::Merged
                }
                Err(reason) => {
                    tracing::warn!(%range, %reason, "segment left pending");
                    let _ = self.event_tx.send(MergeEvent::SegmentLeftPending { range, reason });
                    SegmentState::LeftPending
                }
            };
            outcome.record(range, state);
        }

        if let Err(e) = asm.sync().await {
            tracing::warn!(target_file = %target.display(), error = %e, "sync after merge failed");
        }
        drop(asm);

        tracing::info!(merged = outcome.merged.len(), pending = outcome.pending.len(), "merge pass finished");
        let _ = self.event_tx.send(MergeEvent::PassFinished {
            merged: outcome.merged.len(),
            pending: outcome.pending.len(),
        });
        Ok(outcome)
    }

    async fn merge_one(
        &self,
        asm: &mut Assembler,
        source: &dyn SegmentSource,
        range: ByteRange,
    ) -> Result<u64, String> {
        let mut segment = source
            .open(range)
            .await
            .map_err(|e| format!("open segment: {e}"))?;

        if self.config.verify_sizes && !range.is_empty() {
            if let Some(len) = segment.len {
                if len != range.len() {
                    return Err(format!("size mismatch: segment has {len} bytes, range needs {}", range.len()));
                }
            }
        }

        let written = asm
            .write_stream_at(range.start(), &mut segment.reader, self.config.copy_buffer_bytes)
            .await
            .map_err(|e| format!("copy into target: {e}"))?;

        if self.config.verify_sizes && !range.is_empty() && written != range.len() {
            return Err(format!("short segment: copied {written} bytes, range needs {}", range.len()));
        }
        Ok(written)
    }

    /// Removes the segment working directory after a complete assembly.
    pub async fn cleanup_segment_dir(&self, dir: &Path) -> Result<(), MergeError> {
        tokio::fs::remove_dir_all(dir).await.map_err(|e| {
            tracing::warn!(dir = %dir.display(), error = %e, "segment directory cleanup failed");
            MergeError::Cleanup { path: dir.to_path_buf(), source: e }
        })?;
        tracing::debug!(dir = %dir.display(), "segment directory removed");
        Ok(())
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(MergeConfig::default())
    }
}
