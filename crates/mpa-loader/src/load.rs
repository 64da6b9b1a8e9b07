//! Whole-stream decode into a single interleaved PCM buffer.
//!
//! Decoding is best-effort: malformed tags, streams with no decodable frame and
//! allocation failures all produce an empty [`DecodedAudio`] rather than an error.
//! A frame whose sample rate or layer differs from the first decoded frame ends
//! the stream; the differing frame is discarded.

use std::path::Path;

use anyhow::{Result, bail};
use mpa_loader_types::{ChannelLayout, FrameInfo, MAX_SAMPLES_PER_FRAME, StreamStats};

use crate::config::{ChannelPolicy, LoaderConfig};
use crate::decoder::FrameDecoder;
use crate::input::{FrameInput, SliceInput};
use crate::pcm::PcmBuffer;
use crate::source::ByteSource;
use crate::tag::id3v2_len;

/// Progress callback: `(total_len, bytes_consumed, frame)`.
///
/// Invoked once per decoded frame. It cannot stop the decode.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize, &FrameInfo);

/// Fully decoded stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedAudio {
    /// Interleaved samples.
    pub samples: Vec<i16>,
    /// Channel count shared by every frame, or `Mixed` after a mono/stereo switch.
    pub channels: ChannelLayout,
    /// Sample rate (Hz).
    pub sample_rate: u32,
    /// MPEG audio layer.
    pub layer: u8,
    /// Mean bitrate of the accumulated frames (kbps).
    pub avg_bitrate_kbps: u32,
    /// Frames accumulated.
    pub frames: usize,
    /// Samples per channel, summed over frames.
    pub samples_per_channel: usize,
}

impl DecodedAudio {
    /// Interleaved sample count (all channels).
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// `true` when no decodable audio was found.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration in milliseconds.
    pub fn duration_ms(&self) -> Option<u64> {
        if self.sample_rate == 0 {
            return None;
        }
        Some((self.samples_per_channel as u64).saturating_mul(1000) / u64::from(self.sample_rate))
    }

    /// Serializable summary for reporting.
    pub fn stats(&self) -> StreamStats {
        StreamStats {
            samples: self.sample_count(),
            channels: self.channels,
            sample_rate: self.sample_rate,
            layer: self.layer,
            avg_bitrate_kbps: self.avg_bitrate_kbps,
            frames: self.frames,
            duration_ms: self.duration_ms(),
        }
    }
}

/// Decode every frame of an in-memory stream.
pub fn load_buf<D: FrameDecoder + ?Sized>(
    decoder: &mut D,
    buf: &[u8],
    config: &LoaderConfig,
    progress: Option<ProgressFn<'_>>,
) -> DecodedAudio {
    load_input(decoder, &mut SliceInput::new(buf), config, progress)
}

/// Decode every frame of the file at `path` using the configured storage backend.
///
/// Fails when the file cannot be opened or when no samples were decoded.
pub fn load_file<D: FrameDecoder + ?Sized>(
    decoder: &mut D,
    path: impl AsRef<Path>,
    config: &LoaderConfig,
    progress: Option<ProgressFn<'_>>,
) -> Result<DecodedAudio> {
    let path = path.as_ref();
    let mut source = ByteSource::open(path, config)?;
    let audio = source.with_input(|input| load_input(decoder, input, config, progress));
    source.close();

    if audio.is_empty() {
        bail!("no decodable audio in {:?}", path);
    }
    tracing::info!(
        path = ?path,
        samples = audio.sample_count(),
        rate_hz = audio.sample_rate,
        frames = audio.frames,
        "file decoded"
    );
    Ok(audio)
}

/// Decode loop shared by the buffer, file and stream-handle entry points.
pub fn load_input<D: FrameDecoder + ?Sized, I: FrameInput + ?Sized>(
    decoder: &mut D,
    input: &mut I,
    config: &LoaderConfig,
    mut progress: Option<ProgressFn<'_>>,
) -> DecodedAudio {
    let total = input.total_len();

    let tag_len = id3v2_len(input.window());
    if tag_len > input.remaining() {
        tracing::warn!(tag_bytes = tag_len, total_bytes = total, "metadata tag exceeds input");
        return DecodedAudio::default();
    }
    if let Err(e) = input.advance(tag_len) {
        tracing::warn!("skipping metadata tag failed: {e:#}");
        return DecodedAudio::default();
    }

    decoder.reset();

    // The first decodable frame sizes the output buffer.
    let mut scratch = vec![0i16; MAX_SAMPLES_PER_FRAME];
    let first = loop {
        let step = decoder.decode_frame(input.window(), &mut scratch);
        if let Err(e) = input.advance(step.info.frame_bytes) {
            tracing::warn!("read failed before first frame: {e:#}");
            return DecodedAudio::default();
        }
        if step.samples > 0 {
            break step;
        }
        if step.info.frame_bytes == 0 || input.remaining() == 0 {
            tracing::debug!(total_bytes = total, "no decodable frame found");
            return DecodedAudio::default();
        }
    };

    let first_samples = first.samples * usize::from(first.info.channels);
    let limit = config.max_pcm_samples.unwrap_or(usize::MAX);
    let capacity = initial_capacity(input.remaining(), first.info.frame_bytes, first_samples)
        .min(limit)
        .max(first_samples);
    let mut pcm = match PcmBuffer::try_with_limit(capacity, limit) {
        Ok(pcm) => pcm,
        Err(e) => {
            tracing::warn!(capacity, "pcm allocation failed: {e}");
            return DecodedAudio::default();
        }
    };
    pcm.push_slice(&scratch[..first_samples]);
    drop(scratch);

    let mut audio = DecodedAudio {
        channels: ChannelLayout::Fixed(first.info.channels),
        sample_rate: first.info.sample_rate,
        layer: first.info.layer,
        ..DecodedAudio::default()
    };
    let mut bitrate_sum = u64::from(first.info.bitrate_kbps);
    let mut frames = 1usize;
    let mut per_channel = first.samples;
    if let Some(cb) = progress.as_deref_mut() {
        cb(total, input.position(), &first.info);
    }

    loop {
        if let Err(e) = pcm.ensure_headroom(MAX_SAMPLES_PER_FRAME) {
            tracing::warn!(capacity = pcm.capacity(), "pcm growth failed: {e}");
            return DecodedAudio::default();
        }

        let step = decoder.decode_frame(input.window(), pcm.tail_mut());
        let frame_bytes = step.info.frame_bytes;
        if let Err(e) = input.advance(frame_bytes) {
            tracing::warn!("read failed mid-stream, keeping decoded samples: {e:#}");
            break;
        }

        if step.samples > 0 {
            let info = &step.info;
            if info.sample_rate != audio.sample_rate || info.layer != audio.layer {
                tracing::debug!(
                    offset = input.position(),
                    rate_hz = info.sample_rate,
                    layer = info.layer,
                    "stream parameters changed, stopping"
                );
                break;
            }
            if let ChannelLayout::Fixed(channels) = audio.channels {
                if channels != info.channels {
                    match config.channel_policy {
                        ChannelPolicy::Strict => {
                            tracing::debug!(
                                offset = input.position(),
                                from = channels,
                                to = info.channels,
                                "channel count changed, stopping"
                            );
                            break;
                        }
                        ChannelPolicy::AllowTransition => audio.channels = ChannelLayout::Mixed,
                    }
                }
            }

            pcm.commit(step.samples * usize::from(info.channels));
            bitrate_sum += u64::from(info.bitrate_kbps);
            frames += 1;
            per_channel += step.samples;
            if let Some(cb) = progress.as_deref_mut() {
                cb(total, input.position(), info);
            }
        }

        if frame_bytes == 0 {
            if !input.window_is_final() {
                tracing::warn!(
                    offset = input.position(),
                    window_bytes = input.window().len(),
                    "frame does not fit the read window, decode stopped early"
                );
            }
            break;
        }
        if input.remaining() == 0 {
            break;
        }
    }

    tracing::debug!(
        samples = pcm.len(),
        capacity = pcm.capacity(),
        growths = pcm.growths(),
        frames,
        "decode loop finished"
    );
    audio.samples = pcm.into_vec();
    audio.frames = frames;
    audio.samples_per_channel = per_channel;
    audio.avg_bitrate_kbps = (bitrate_sum / frames as u64) as u32;
    audio
}

/// Project the first frame's sample count across the remaining input, plus one
/// frame of headroom.
pub(crate) fn initial_capacity(remaining: usize, frame_bytes: usize, frame_samples: usize) -> usize {
    (remaining / frame_bytes.max(1))
        .saturating_mul(frame_samples)
        .saturating_add(MAX_SAMPLES_PER_FRAME)
}
