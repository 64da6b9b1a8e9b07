//! Scripted frame decoder for loader and stream-handle tests.
//!
//! Frames are 8 bytes: `[0xA5, channels, rate index, layer, bitrate kbps,
//! samples-per-channel hi, lo, 0]`. A `0x5A` marker frame is consumed but
//! yields no samples.

use mpa_loader_types::FrameInfo;

use crate::decoder::{DecodedFrame, FrameDecoder};

pub(crate) const FRAME_LEN: usize = 8;
const RATES: [u32; 3] = [44_100, 48_000, 32_000];

#[derive(Default)]
pub(crate) struct ScriptedDecoder {
    pub calls: usize,
    pub resets: usize,
    decoded: i16,
}

pub(crate) fn frame(channels: u8, rate_index: u8, layer: u8, bitrate: u8, samples: u16) -> Vec<u8> {
    let [hi, lo] = samples.to_be_bytes();
    vec![0xa5, channels, rate_index, layer, bitrate, hi, lo, 0]
}

pub(crate) fn stereo_frames(n: usize) -> Vec<u8> {
    (0..n).flat_map(|_| frame(2, 0, 3, 128, 1152)).collect()
}

pub(crate) fn silent_frame() -> Vec<u8> {
    vec![0x5a, 0, 0, 0, 0, 0, 0, 0]
}

pub(crate) fn id3_tag(size: usize) -> Vec<u8> {
    let s = size as u32;
    let mut tag = b"ID3\x04\x00\x00".to_vec();
    tag.extend_from_slice(&[
        ((s >> 21) & 0x7f) as u8,
        ((s >> 14) & 0x7f) as u8,
        ((s >> 7) & 0x7f) as u8,
        (s & 0x7f) as u8,
    ]);
    tag.resize(10 + size, 0);
    tag
}

impl FrameDecoder for ScriptedDecoder {
    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> DecodedFrame {
        self.calls += 1;
        let Some(i) = input
            .windows(FRAME_LEN)
            .position(|w| w[0] == 0xa5 || w[0] == 0x5a)
        else {
            return DecodedFrame {
                samples: 0,
                info: FrameInfo {
                    frame_bytes: input.len(),
                    ..FrameInfo::default()
                },
            };
        };

        let f = &input[i..i + FRAME_LEN];
        if f[0] == 0x5a {
            return DecodedFrame {
                samples: 0,
                info: FrameInfo {
                    frame_bytes: i + FRAME_LEN,
                    ..FrameInfo::default()
                },
            };
        }

        let channels = u16::from(f[1]);
        let samples = usize::from(u16::from_be_bytes([f[5], f[6]]));
        self.decoded += 1;
        for s in pcm.iter_mut().take(samples * usize::from(channels)) {
            *s = self.decoded;
        }
        DecodedFrame {
            samples,
            info: FrameInfo {
                frame_bytes: i + FRAME_LEN,
                channels,
                sample_rate: RATES[usize::from(f[2])],
                layer: f[3],
                bitrate_kbps: u32::from(f[4]),
            },
        }
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.decoded = 0;
    }
}
