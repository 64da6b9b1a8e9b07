//! Per-frame decode stage.
//!
//! [`FrameDecoder`] is the seam the loader drives. The shipped implementation,
//! [`SymphoniaFrameDecoder`], uses the crate's own frame-boundary search and
//! hands each located frame to Symphonia's MPEG audio codecs as one packet.

use anyhow::{Context, Result, anyhow, bail};
use mpa_loader_types::FrameInfo;
use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{
    CODEC_TYPE_MP1, CODEC_TYPE_MP2, CODEC_TYPE_MP3, CodecParameters, CodecType, Decoder,
    DecoderOptions,
};
use symphonia::core::formats::Packet;

use crate::header::FrameHeader;
use crate::sync::find_frame_after;

/// Outcome of one decode step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Samples per channel written to the output; 0 when nothing was decoded.
    pub samples: usize,
    /// Metadata for the step. `info.frame_bytes == 0` means the input is exhausted.
    pub info: FrameInfo,
}

/// Decodes one compressed frame at a time.
pub trait FrameDecoder {
    /// Decode the first frame found in `input` into `pcm` (interleaved).
    ///
    /// `info.frame_bytes` reports how many bytes of `input` to consume, including
    /// garbage skipped before the frame. A step may consume bytes without producing
    /// samples. `pcm` holds at least [`MAX_SAMPLES_PER_FRAME`] slots.
    ///
    /// [`MAX_SAMPLES_PER_FRAME`]: mpa_loader_types::MAX_SAMPLES_PER_FRAME
    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> DecodedFrame;

    /// Drop inter-frame state before decoding a new stream.
    fn reset(&mut self);
}

struct ActiveCodec {
    layer: u8,
    sample_rate: u32,
    channels: u16,
    decoder: Box<dyn Decoder>,
}

/// [`FrameDecoder`] backed by Symphonia's MP1/MP2/MP3 decoders.
pub struct SymphoniaFrameDecoder {
    active: Option<ActiveCodec>,
    /// Header of the last located frame; the next call starts where it ended.
    last: Option<FrameHeader>,
    options: DecoderOptions,
    ts: u64,
}

impl Default for SymphoniaFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SymphoniaFrameDecoder {
    pub fn new() -> Self {
        Self {
            active: None,
            last: None,
            options: DecoderOptions::default(),
            ts: 0,
        }
    }

    /// Return a codec matching `header`, creating one when the stream shape changed.
    fn codec_for(&mut self, header: &FrameHeader) -> Result<&mut Box<dyn Decoder>> {
        let stale = match &self.active {
            Some(a) => {
                a.layer != header.layer
                    || a.sample_rate != header.sample_rate
                    || a.channels != header.channels()
            }
            None => true,
        };

        if stale {
            let channels = if header.mono {
                Channels::FRONT_LEFT
            } else {
                Channels::FRONT_LEFT | Channels::FRONT_RIGHT
            };
            let mut params = CodecParameters::new();
            params
                .for_codec(codec_type_for_layer(header.layer))
                .with_sample_rate(header.sample_rate)
                .with_channels(channels);

            let decoder = symphonia::default::get_codecs()
                .make(&params, &self.options)
                .with_context(|| format!("create {} decoder", codec_name(header.layer)))?;
            tracing::debug!(
                codec = codec_name(header.layer),
                rate_hz = header.sample_rate,
                channels = header.channels(),
                "frame decoder created"
            );
            self.active = Some(ActiveCodec {
                layer: header.layer,
                sample_rate: header.sample_rate,
                channels: header.channels(),
                decoder,
            });
        }

        match &mut self.active {
            Some(a) => Ok(&mut a.decoder),
            None => Err(anyhow!("no active decoder")),
        }
    }

    /// Decode a single located frame; returns samples per channel.
    fn decode_packet(&mut self, header: &FrameHeader, frame: &[u8], pcm: &mut [i16]) -> Result<usize> {
        let ts = self.ts;
        let dur = header.samples_per_frame() as u64;
        self.ts += dur;

        let codec = self.codec_for(header)?;
        let packet = Packet::new_from_slice(0, ts, dur, frame);
        let decoded = codec.decode(&packet)?;

        let frames = decoded.frames();
        if frames == 0 {
            return Ok(0);
        }
        let spec = *decoded.spec();
        if spec.channels.count() != usize::from(header.channels()) {
            bail!(
                "decoder produced {} channels for a {}-channel frame",
                spec.channels.count(),
                header.channels()
            );
        }

        let mut sample_buf = SampleBuffer::<i16>::new(frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();
        if samples.len() > pcm.len() {
            bail!("frame of {} samples exceeds output slot", samples.len());
        }
        pcm[..samples.len()].copy_from_slice(samples);
        Ok(frames)
    }
}

impl FrameDecoder for SymphoniaFrameDecoder {
    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> DecodedFrame {
        let search = find_frame_after(input, self.last.as_ref());
        if !search.found() {
            self.last = None;
            return DecodedFrame {
                samples: 0,
                info: FrameInfo {
                    frame_bytes: search.skipped,
                    ..FrameInfo::default()
                },
            };
        }

        let start = search.skipped;
        let end = start + search.frame_len;
        let Some(header) = FrameHeader::parse(&input[start..]) else {
            return DecodedFrame::default();
        };
        let info = header.frame_info(end);
        self.last = Some(header);

        match self.decode_packet(&header, &input[start..end], pcm) {
            Ok(samples) => DecodedFrame { samples, info },
            Err(e) => {
                // Frames that fail to decode (e.g. bit reservoir not yet filled) are skipped.
                tracing::debug!(offset = start, "frame decode failed: {e:#}");
                DecodedFrame { samples: 0, info }
            }
        }
    }

    fn reset(&mut self) {
        self.ts = 0;
        self.last = None;
        if let Some(active) = &mut self.active {
            active.decoder.reset();
        }
    }
}

fn codec_type_for_layer(layer: u8) -> CodecType {
    match layer {
        1 => CODEC_TYPE_MP1,
        2 => CODEC_TYPE_MP2,
        _ => CODEC_TYPE_MP3,
    }
}

/// Codec label used in logs.
pub fn codec_name(layer: u8) -> &'static str {
    match layer {
        1 => "MP1",
        2 => "MP2",
        _ => "MP3",
    }
}
