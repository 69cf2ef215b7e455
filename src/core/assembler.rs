use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Exclusive writer over the target file for the length of one merge pass.
///
/// The file is never truncated; writes land at absolute offsets and any gap
/// before them reads back as zeros.
pub struct Assembler {
    file: File,
}

impl Assembler {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .await?;

        Ok(Self { file })
    }

    /// Copies `reader` to the target starting at `offset`, returning the byte
    /// count. The data is flushed before returning.
    pub async fn write_stream_at<R>(&mut self, offset: u64, reader: &mut R, buf_size: usize) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = vec![0u8; buf_size.max(1)];
        let mut written = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.file.write_all(&buf[..n]).await?;
            written += n as u64;
        }
        self.file.flush().await?;
        Ok(written)
    }

    pub async fn sync(&mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        self.file.sync_data().await
    }
}
