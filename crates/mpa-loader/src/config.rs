use serde::{Deserialize, Serialize};

/// Default chunk unit for the chunked window backend, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

/// Smallest chunk unit accepted by the chunked window backend.
///
/// After a slide the window holds more than one chunk, which must fit the
/// largest frame (2304 bytes for free format) plus the next frame's header.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// How the loader reacts when a frame's channel count differs from the stream.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPolicy {
    /// Stop at the first frame whose channel count differs.
    Strict,
    /// Keep decoding and report the layout as mixed.
    AllowTransition,
}

impl Default for ChannelPolicy {
    fn default() -> Self {
        if cfg!(feature = "mono-stereo-transition") {
            ChannelPolicy::AllowTransition
        } else {
            ChannelPolicy::Strict
        }
    }
}

/// Storage backend used by the file-backed entry points.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceBackend {
    /// Read the whole file into memory.
    #[default]
    FullLoad,
    /// Map the file read-only.
    MemoryMapped,
    /// Keep a two-chunk window and refill it as frames are consumed.
    ChunkedWindow,
}

/// Loader tuning shared by the decode, scan and stream-handle paths.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Reaction to channel-count changes mid-stream.
    pub channel_policy: ChannelPolicy,
    /// Backend for file-backed operations.
    pub backend: SourceBackend,
    /// Chunk unit in bytes for [`SourceBackend::ChunkedWindow`].
    ///
    /// Values below [`MIN_CHUNK_SIZE`] are rejected when the file is opened, as
    /// are files smaller than two chunks.
    pub chunk_size: usize,
    /// Upper bound on the output buffer, in interleaved samples. The loader reserves
    /// room for a full frame before each decode step; a stream that needs more
    /// is treated like an allocation failure. `None` means no limit.
    pub max_pcm_samples: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            channel_policy: ChannelPolicy::default(),
            backend: SourceBackend::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_pcm_samples: None,
        }
    }
}
