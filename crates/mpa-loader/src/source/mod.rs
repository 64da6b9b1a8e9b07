//! Storage backends that supply compressed bytes to the loader and scanner.

pub mod chunked;

use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{Context, Result, bail};
use memmap2::{Mmap, MmapOptions};

pub use chunked::{ChunkState, ChunkedFileSource};

use crate::config::{LoaderConfig, MIN_CHUNK_SIZE, SourceBackend};
use crate::input::{FrameInput, SliceInput};

/// Compressed bytes owned by a loader call or a stream handle.
pub enum ByteSource {
    /// Whole stream in memory (caller buffer or a full file read).
    Memory(Vec<u8>),
    /// Read-only mapping of a file.
    Mapped(Mmap),
    /// Two-chunk window over a file.
    Chunked(ChunkedFileSource),
}

impl ByteSource {
    /// Open `path` with the backend selected in `config`.
    pub fn open(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<Self> {
        let path = path.as_ref();
        let source = match config.backend {
            SourceBackend::FullLoad => {
                let bytes = std::fs::read(path).with_context(|| format!("read {:?}", path))?;
                ByteSource::Memory(bytes)
            }
            SourceBackend::MemoryMapped => map_file(path)?,
            SourceBackend::ChunkedWindow => {
                if config.chunk_size < MIN_CHUNK_SIZE {
                    bail!(
                        "chunk size {} is below the {MIN_CHUNK_SIZE}-byte minimum",
                        config.chunk_size
                    );
                }
                ByteSource::Chunked(ChunkedFileSource::open(path, config.chunk_size)?)
            }
        };
        tracing::debug!(path = ?path, backend = ?config.backend, bytes = source.len(), "source opened");
        Ok(source)
    }

    /// Total stream length in bytes.
    pub fn len(&self) -> usize {
        match self {
            ByteSource::Memory(bytes) => bytes.len(),
            ByteSource::Mapped(map) => map.len(),
            ByteSource::Chunked(chunked) => chunked.total_len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole stream, when it is resident in memory.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            ByteSource::Memory(bytes) => Some(bytes.as_slice()),
            ByteSource::Mapped(map) => Some(&map[..]),
            ByteSource::Chunked(_) => None,
        }
    }

    /// Run `f` with a read cursor positioned at the source's current offset.
    ///
    /// In-memory sources always start from the beginning; a chunked source
    /// continues from wherever its window currently is.
    pub fn with_input<R>(&mut self, f: impl FnOnce(&mut dyn FrameInput) -> R) -> R {
        match self {
            ByteSource::Memory(bytes) => f(&mut SliceInput::new(bytes.as_slice())),
            ByteSource::Mapped(map) => f(&mut SliceInput::new(&map[..])),
            ByteSource::Chunked(chunked) => f(chunked),
        }
    }

    /// Release the underlying buffer, mapping or file.
    pub fn close(self) {
        match self {
            ByteSource::Chunked(chunked) => chunked.close(),
            ByteSource::Memory(_) | ByteSource::Mapped(_) => {}
        }
    }
}

fn map_file(path: &Path) -> Result<ByteSource> {
    let file = open_retrying(path).with_context(|| format!("open {:?}", path))?;
    let len = file
        .metadata()
        .with_context(|| format!("stat {:?}", path))?
        .len();
    if len == 0 {
        return Ok(ByteSource::Memory(Vec::new()));
    }
    let map = map_retrying(&file).with_context(|| format!("mmap {:?}", path))?;
    Ok(ByteSource::Mapped(map))
}

/// Map `file` with pages prefaulted, retrying transient failures like [`open_retrying`].
fn map_retrying(file: &File) -> io::Result<Mmap> {
    loop {
        // SAFETY: the mapping is read-only and private; this crate never writes to the file.
        match unsafe { MmapOptions::new().populate().map(file) } {
            Err(e) if is_transient(&e) => continue,
            other => return other,
        }
    }
}

/// Open `path` for reading, retrying transient `Interrupted` / `WouldBlock` failures.
pub(crate) fn open_retrying(path: &Path) -> io::Result<File> {
    loop {
        match File::open(path) {
            Err(e) if is_transient(&e) => continue,
            other => return other,
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock)
}
