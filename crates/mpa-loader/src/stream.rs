//! Stream handle: a frame decoder bundled with an owned byte source.

use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{Result, anyhow};
use mpa_loader_types::{FrameInfo, SeekMethod};

use crate::config::LoaderConfig;
use crate::decoder::FrameDecoder;
use crate::iterate::iterate_input;
use crate::load::{DecodedAudio, ProgressFn, load_input};
use crate::source::ByteSource;

/// Returned by handle operations that have no defined behavior yet.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("{operation} is not supported (seek method {seek_method:?})")]
pub struct UnsupportedOperation {
    pub operation: &'static str,
    pub seek_method: SeekMethod,
}

/// Decoder plus the compressed stream it reads from.
///
/// A closed handle holds no source; closing twice is a no-op.
pub struct StreamHandle<D: FrameDecoder> {
    decoder: D,
    source: Option<ByteSource>,
    seek_method: SeekMethod,
    file_backed: bool,
}

impl<D: FrameDecoder> StreamHandle<D> {
    /// Take ownership of an in-memory stream.
    pub fn open_buf(mut decoder: D, buf: Vec<u8>, seek_method: SeekMethod) -> Self {
        decoder.reset();
        tracing::debug!(bytes = buf.len(), ?seek_method, "stream opened from buffer");
        Self {
            decoder,
            source: Some(ByteSource::Memory(buf)),
            seek_method,
            file_backed: false,
        }
    }

    /// Open `path` with the backend selected in `config`.
    pub fn open_file(
        mut decoder: D,
        path: impl AsRef<Path>,
        seek_method: SeekMethod,
        config: &LoaderConfig,
    ) -> Result<Self> {
        let source = ByteSource::open(path.as_ref(), config)?;
        decoder.reset();
        tracing::debug!(path = ?path.as_ref(), ?seek_method, "stream opened from file");
        Ok(Self {
            decoder,
            source: Some(source),
            seek_method,
            file_backed: true,
        })
    }

    /// Release the source and return the handle to its empty state.
    pub fn close(&mut self) {
        let Some(source) = self.source.take() else {
            return;
        };
        source.close();
        self.decoder.reset();
        self.file_backed = false;
        tracing::debug!("stream closed");
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_file_backed(&self) -> bool {
        self.file_backed
    }

    pub fn seek_method(&self) -> SeekMethod {
        self.seek_method
    }

    /// Compressed stream length, or `None` once closed.
    pub fn len(&self) -> Option<usize> {
        self.source.as_ref().map(ByteSource::len)
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Reposition the stream. Not supported for any seek method.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        tracing::debug!(position, seek_method = ?self.seek_method, "seek requested");
        Err(self.unsupported("seek"))
    }

    /// Decode the next samples into `pcm`. Not supported for any seek method.
    pub fn read(&mut self, pcm: &mut [i16]) -> Result<usize> {
        tracing::debug!(requested = pcm.len(), "read requested");
        Err(self.unsupported("read"))
    }

    /// Decode the whole stream with the handle's decoder.
    ///
    /// A chunked source is consumed as it is decoded; a second call on the same
    /// handle continues from where the first stopped.
    pub fn load(&mut self, config: &LoaderConfig, progress: Option<ProgressFn<'_>>) -> Result<DecodedAudio> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| anyhow!("stream handle is closed"))?;
        let decoder = &mut self.decoder;
        Ok(source.with_input(|input| load_input(decoder, input, config, progress)))
    }

    /// Scan the stream's frames without decoding. Returns the number of frames reported.
    pub fn iterate<F>(&mut self, callback: F) -> Result<usize>
    where
        F: FnMut(&[u8], usize, &FrameInfo) -> ControlFlow<()>,
    {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| anyhow!("stream handle is closed"))?;
        Ok(source.with_input(|input| iterate_input(input, callback)))
    }

    fn unsupported(&self, operation: &'static str) -> anyhow::Error {
        anyhow::Error::new(UnsupportedOperation {
            operation,
            seek_method: self.seek_method,
        })
    }
}

impl<D: FrameDecoder> Drop for StreamHandle<D> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelPolicy, MIN_CHUNK_SIZE, SourceBackend};
    use crate::sync::tests::frames;
    use crate::testing::{ScriptedDecoder, stereo_frames};
    use std::io::Write;

    fn strict() -> LoaderConfig {
        LoaderConfig {
            channel_policy: ChannelPolicy::Strict,
            ..LoaderConfig::default()
        }
    }

    #[test]
    fn open_buf_resets_decoder_and_loads() {
        let mut handle =
            StreamHandle::open_buf(ScriptedDecoder::default(), stereo_frames(3), SeekMethod::Byte);
        assert!(handle.is_open());
        assert!(!handle.is_file_backed());
        assert_eq!(handle.len(), Some(24));

        let audio = handle.load(&strict(), None).unwrap();
        assert_eq!(audio.frames, 3);
        // One reset on open, one at the start of the load.
        assert_eq!(handle.decoder().resets, 2);
    }

    #[test]
    fn close_is_idempotent() {
        let mut handle =
            StreamHandle::open_buf(ScriptedDecoder::default(), stereo_frames(1), SeekMethod::Sample);
        handle.close();
        assert!(!handle.is_open());
        assert_eq!(handle.len(), None);
        let resets = handle.decoder().resets;
        handle.close();
        assert_eq!(handle.decoder().resets, resets);
    }

    #[test]
    fn closed_handle_rejects_load_and_iterate() {
        let mut handle =
            StreamHandle::open_buf(ScriptedDecoder::default(), stereo_frames(1), SeekMethod::Byte);
        handle.close();
        assert!(handle.load(&strict(), None).is_err());
        assert!(handle.iterate(|_, _, _| ControlFlow::Continue(())).is_err());
    }

    #[test]
    fn seek_and_read_are_unsupported_for_every_method() {
        for method in [SeekMethod::Byte, SeekMethod::Sample, SeekMethod::SampleIndexed] {
            let mut handle =
                StreamHandle::open_buf(ScriptedDecoder::default(), stereo_frames(2), method);

            let err = handle.seek(0).unwrap_err();
            let unsupported = err.downcast_ref::<UnsupportedOperation>().unwrap();
            assert_eq!(unsupported.operation, "seek");
            assert_eq!(unsupported.seek_method, method);

            let mut pcm = [0i16; 16];
            let err = handle.read(&mut pcm).unwrap_err();
            assert_eq!(err.downcast_ref::<UnsupportedOperation>().unwrap().operation, "read");
            assert_eq!(
                err.to_string(),
                format!("read is not supported (seek method {method:?})")
            );
        }
    }

    #[test]
    fn iterate_counts_frames() {
        let mut handle = StreamHandle::open_buf(ScriptedDecoder::default(), frames(6), SeekMethod::Byte);
        let mut offsets = Vec::new();
        let visited = handle
            .iterate(|_, offset, _| {
                offsets.push(offset);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(visited, 6);
        assert_eq!(offsets[5], 5 * 417);
    }

    #[test]
    fn open_file_for_each_backend() {
        let data = stereo_frames(1100);
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&data).unwrap();
        f.flush().unwrap();

        for backend in [
            SourceBackend::FullLoad,
            SourceBackend::MemoryMapped,
            SourceBackend::ChunkedWindow,
        ] {
            let config = LoaderConfig {
                backend,
                chunk_size: MIN_CHUNK_SIZE,
                ..strict()
            };
            let mut handle =
                StreamHandle::open_file(ScriptedDecoder::default(), f.path(), SeekMethod::Byte, &config)
                    .unwrap();
            assert!(handle.is_file_backed());
            assert_eq!(handle.len(), Some(data.len()));
            let audio = handle.load(&config, None).unwrap();
            assert_eq!(audio.frames, 1100, "{backend:?}");
            handle.close();
            assert!(!handle.is_file_backed());
        }
    }

    #[test]
    fn open_file_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = StreamHandle::open_file(
            ScriptedDecoder::default(),
            dir.path().join("none.mp3"),
            SeekMethod::Byte,
            &LoaderConfig::default(),
        );
        assert!(result.is_err());
    }
}
