use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;

use crate::core::model::ByteRange;

/// Readable bytes of one downloaded segment.
pub struct Segment {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Length when the source knows it up front.
    pub len: Option<u64>,
}

/// Where completed segments live. Each range maps to at most one segment.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn open(&self, range: ByteRange) -> io::Result<Segment>;

    /// Drops a segment after its bytes were merged.
    async fn discard(&self, range: ByteRange) -> io::Result<()>;

    /// Ranges currently available, sorted by start offset.
    async fn list(&self) -> io::Result<Vec<ByteRange>>;
}

/// Segments stored as `dir/<start-end>` files.
#[derive(Debug, Clone)]
pub struct DirSegmentSource {
    dir: PathBuf,
}

impl DirSegmentSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, range: ByteRange) -> PathBuf {
        self.dir.join(range.segment_name())
    }
}

#[async_trait]
impl SegmentSource for DirSegmentSource {
    fn name(&self) -> &'static str {
        "dir-segments"
    }

    async fn open(&self, range: ByteRange) -> io::Result<Segment> {
        let file = tokio::fs::File::open(self.path_for(range)).await?;
        let meta = file.metadata().await?;
        if !meta.is_file() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "segment is not a regular file"));
        }
        Ok(Segment { reader: Box::new(file), len: Some(meta.len()) })
    }

    async fn discard(&self, range: ByteRange) -> io::Result<()> {
        tokio::fs::remove_file(self.path_for(range)).await
    }

    async fn list(&self) -> io::Result<Vec<ByteRange>> {
        let mut rd = tokio::fs::read_dir(&self.dir).await?;
        let mut ranges = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            match name.parse::<ByteRange>() {
                Ok(r) => ranges.push(r),
                Err(e) => tracing::debug!(file = name, error = %e, "skipping non-segment file"),
            }
        }
        ranges.sort_by_key(|r| (r.start(), r.len()));
        Ok(ranges)
    }
}
