//! Incremental file reader with a bounded two-chunk window.
//!
//! Peak memory stays at `2 * chunk_size` bytes regardless of file size. The
//! window slides forward one chunk at a time as the read cursor moves past the
//! first half.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::open_retrying;
use crate::input::FrameInput;

/// Read state of a [`ChunkedFileSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkState {
    /// More data may be read from the file.
    Ready,
    /// A short read happened or the declared size was reached; no further reads.
    Exhausted,
}

/// File-backed byte source holding at most two chunks in memory.
pub struct ChunkedFileSource {
    file: File,
    path: PathBuf,
    total_len: usize,
    bytes_read: usize,
    chunk_size: usize,
    chunks_read: usize,
    window: Vec<u8>,
    /// Read cursor inside `window`.
    start: usize,
    /// Bytes of `window` holding file data.
    valid: usize,
    state: ChunkState,
}

impl ChunkedFileSource {
    /// Open `path` and pre-fill the window with two chunks.
    ///
    /// Fails when the file cannot be opened or stat'ed, or is smaller than two chunks.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let path = path.as_ref();
        if chunk_size == 0 {
            bail!("chunk size must be non-zero");
        }
        let file = open_retrying(path).with_context(|| format!("open {:?}", path))?;
        let total_len = file
            .metadata()
            .with_context(|| format!("stat {:?}", path))?
            .len();
        let total_len = usize::try_from(total_len).context("file size exceeds address space")?;
        let window_len = chunk_size.saturating_mul(2);
        if total_len < window_len {
            bail!(
                "{:?} is {} bytes, smaller than the {}-byte read window",
                path,
                total_len,
                window_len
            );
        }

        let mut source = Self {
            file,
            path: path.to_path_buf(),
            total_len,
            bytes_read: 0,
            chunk_size,
            chunks_read: 0,
            window: vec![0; window_len],
            start: 0,
            valid: 0,
            state: ChunkState::Ready,
        };
        source.fill_window()?;

        tracing::info!(
            path = ?source.path,
            total_bytes = total_len,
            chunks = total_len / chunk_size,
            "chunked source opened"
        );
        Ok(source)
    }

    /// Read one chunk into `window[pos..]`.
    ///
    /// Returns the number of bytes read. Does nothing once the source is exhausted.
    /// A short read marks the source exhausted; it is not an error.
    pub fn read_chunk(&mut self, pos: usize) -> Result<usize> {
        if self.state == ChunkState::Exhausted || self.bytes_read >= self.total_len {
            self.state = ChunkState::Exhausted;
            return Ok(0);
        }
        if pos > self.chunk_size {
            bail!("chunk offset {pos} outside the read window");
        }

        let want = self.chunk_size.min(self.total_len - self.bytes_read);
        let got = read_full(&mut self.file, &mut self.window[pos..pos + want])
            .with_context(|| format!("read {:?}", self.path))?;
        self.bytes_read += got;

        if got < self.chunk_size {
            self.state = ChunkState::Exhausted;
            tracing::debug!(path = ?self.path, "reached EOF");
        } else {
            self.chunks_read += 1;
            if self.bytes_read >= self.total_len {
                self.state = ChunkState::Exhausted;
            }
        }

        tracing::trace!(
            chunk = self.chunks_read,
            read_bytes = self.bytes_read,
            total_bytes = self.total_len,
            remain_bytes = self.total_len - self.bytes_read,
            percent = self.bytes_read as f64 / self.total_len as f64 * 100.0,
            "chunk read"
        );
        Ok(got)
    }

    /// Move the read cursor forward by `n` bytes, refilling the window as needed.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        let visible = self.valid - self.start;
        if n <= visible {
            self.start += n;
            return self.slide();
        }

        // The target lies past the window: drop it and skip ahead in the file.
        let mut beyond = n - visible;
        if self.state == ChunkState::Exhausted {
            beyond = 0;
        }
        beyond = beyond.min(self.total_len - self.bytes_read);
        if beyond > 0 {
            self.file
                .seek(SeekFrom::Current(beyond as i64))
                .with_context(|| format!("seek {:?}", self.path))?;
            self.bytes_read += beyond;
        }
        self.start = 0;
        self.valid = 0;
        self.fill_window()
    }

    /// Release the window buffer and the file handle.
    pub fn close(self) {
        tracing::debug!(
            path = ?self.path,
            read_bytes = self.bytes_read,
            "chunked source closed"
        );
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Number of full chunks read so far.
    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Allocated window size in bytes.
    pub fn window_capacity(&self) -> usize {
        self.window.len()
    }

    /// Read up to two chunks into an empty window.
    fn fill_window(&mut self) -> Result<()> {
        for _ in 0..2 {
            let got = self.read_chunk(self.valid)?;
            self.valid += got;
            if got < self.chunk_size {
                break;
            }
        }
        Ok(())
    }

    /// Once the cursor passes the first chunk, shift the second chunk to the
    /// front and read the next chunk behind it.
    fn slide(&mut self) -> Result<()> {
        while self.start >= self.chunk_size {
            self.window.copy_within(self.chunk_size..self.valid, 0);
            self.valid -= self.chunk_size;
            self.start -= self.chunk_size;
            let got = self.read_chunk(self.valid)?;
            self.valid += got;
        }
        Ok(())
    }
}

impl FrameInput for ChunkedFileSource {
    fn window(&self) -> &[u8] {
        &self.window[self.start..self.valid]
    }

    fn total_len(&self) -> usize {
        self.total_len
    }

    fn position(&self) -> usize {
        self.bytes_read - (self.valid - self.start)
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        ChunkedFileSource::advance(self, n)
    }

    fn window_is_final(&self) -> bool {
        self.state == ChunkState::Exhausted
    }
}

/// Read until `buf` is full or the reader reports EOF.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
