//! Read cursor shared by the loader and the frame scanner.

use anyhow::Result;

/// A forward-only view over a compressed stream.
///
/// [`SliceInput`] exposes the whole remaining buffer at once; the chunked file
/// source exposes a bounded window and refills it as the cursor advances.
pub trait FrameInput {
    /// Bytes currently visible from the read position.
    fn window(&self) -> &[u8];

    /// Total stream length in bytes.
    fn total_len(&self) -> usize;

    /// Absolute offset of `window()[0]` from the start of the stream.
    fn position(&self) -> usize;

    /// Consume `n` bytes. Advancing past the end of the stream clamps to the end.
    fn advance(&mut self, n: usize) -> Result<()>;

    /// Bytes left between the read position and the end of the stream.
    fn remaining(&self) -> usize {
        self.total_len().saturating_sub(self.position())
    }

    /// Whether `window()` already reaches the end of the stream.
    fn window_is_final(&self) -> bool {
        self.position() + self.window().len() >= self.total_len()
    }
}

/// [`FrameInput`] over an in-memory buffer.
#[derive(Clone, Debug)]
pub struct SliceInput<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SliceInput<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl FrameInput for SliceInput<'_> {
    fn window(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn total_len(&self) -> usize {
        self.buf.len()
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn advance(&mut self, n: usize) -> Result<()> {
        self.pos = self.pos.saturating_add(n).min(self.buf.len());
        Ok(())
    }
}
