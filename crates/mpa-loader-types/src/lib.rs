use serde::{Deserialize, Serialize};

/// Largest interleaved sample payload a single MPEG audio frame can produce
/// (1152 samples per channel, two channels).
pub const MAX_SAMPLES_PER_FRAME: usize = 1152 * 2;

/// Channel arrangement of a decoded stream.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelLayout {
    /// Every accumulated frame carried this many channels.
    Fixed(u16),
    /// The stream switched between mono and stereo frames.
    Mixed,
}

impl ChannelLayout {
    /// Channel count when the layout is fixed.
    pub fn count(&self) -> Option<u16> {
        match self {
            ChannelLayout::Fixed(n) => Some(*n),
            ChannelLayout::Mixed => None,
        }
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        ChannelLayout::Fixed(0)
    }
}

/// Addressing mode requested when opening a stream handle.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeekMethod {
    /// Positions are byte offsets into the compressed stream.
    #[default]
    Byte,
    /// Positions are decoded sample offsets.
    Sample,
    /// Positions are decoded sample offsets resolved through a frame index.
    SampleIndexed,
}

/// Per-frame metadata reported by the frame decoder or the frame scanner.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameInfo {
    /// Bytes consumed for this frame, including any garbage skipped before it.
    pub frame_bytes: usize,
    /// Channel count (1 or 2).
    pub channels: u16,
    /// Sample rate (Hz).
    pub sample_rate: u32,
    /// MPEG audio layer (1..=3).
    pub layer: u8,
    /// Bitrate in kbps; 0 for free-format frames.
    pub bitrate_kbps: u32,
}

/// Aggregate statistics for a fully decoded stream.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamStats {
    /// Interleaved sample count (all channels).
    pub samples: usize,
    /// Channel layout across accumulated frames.
    pub channels: ChannelLayout,
    /// Sample rate (Hz).
    pub sample_rate: u32,
    /// MPEG audio layer.
    pub layer: u8,
    /// Mean of the per-frame bitrates in kbps.
    pub avg_bitrate_kbps: u32,
    /// Number of frames accumulated.
    pub frames: usize,
    /// Playback duration in milliseconds when the sample rate is known.
    pub duration_ms: Option<u64>,
}
