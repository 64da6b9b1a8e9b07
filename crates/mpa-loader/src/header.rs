//! MPEG-1/2/2.5 audio frame header parsing.

use mpa_loader_types::FrameInfo;

/// Header size in bytes.
pub const HEADER_LEN: usize = 4;

const BITRATE_KBPS: [[[u16; 15]; 3]; 2] = [
    // MPEG-2 / 2.5: layer I, II, III
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
    ],
    // MPEG-1: layer I, II, III
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
    ],
];

const SAMPLE_RATES_MPEG1: [u32; 3] = [44_100, 48_000, 32_000];

/// MPEG audio version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

/// Decoded view of a 4-byte frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    raw: [u8; 4],
    pub version: MpegVersion,
    /// 1..=3
    pub layer: u8,
    /// 0 for free-format frames.
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    pub mono: bool,
}

impl FrameHeader {
    /// Parse the header at the start of `bytes`, or `None` if it is not a valid header.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 4] = bytes.get(..HEADER_LEN)?.try_into().ok()?;
        if raw[0] != 0xff || raw[1] & 0xe0 != 0xe0 {
            return None;
        }
        let version = match (raw[1] >> 3) & 0x03 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return None,
        };
        let layer = match (raw[1] >> 1) & 0x03 {
            0 => return None,
            bits => 4 - bits,
        };
        let bitrate_index = (raw[2] >> 4) as usize;
        if bitrate_index == 15 {
            return None;
        }
        let rate_index = ((raw[2] >> 2) & 0x03) as usize;
        if rate_index == 3 {
            return None;
        }

        let table = usize::from(version == MpegVersion::Mpeg1);
        let bitrate_kbps = u32::from(BITRATE_KBPS[table][layer as usize - 1][bitrate_index]);
        let sample_rate = match version {
            MpegVersion::Mpeg1 => SAMPLE_RATES_MPEG1[rate_index],
            MpegVersion::Mpeg2 => SAMPLE_RATES_MPEG1[rate_index] / 2,
            MpegVersion::Mpeg25 => SAMPLE_RATES_MPEG1[rate_index] / 4,
        };

        Some(Self {
            raw,
            version,
            layer,
            bitrate_kbps,
            sample_rate,
            padding: raw[2] & 0x02 != 0,
            mono: raw[3] >> 6 == 3,
        })
    }

    pub fn channels(&self) -> u16 {
        if self.mono { 1 } else { 2 }
    }

    pub fn is_free_format(&self) -> bool {
        self.bitrate_kbps == 0
    }

    /// Samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> usize {
        match (self.layer, self.version) {
            (1, _) => 384,
            (3, MpegVersion::Mpeg2 | MpegVersion::Mpeg25) => 576,
            _ => 1152,
        }
    }

    /// Size of the padding slot in bytes.
    pub fn padding_len(&self) -> usize {
        match (self.padding, self.layer) {
            (false, _) => 0,
            (true, 1) => 4,
            (true, _) => 1,
        }
    }

    /// Frame length in bytes, or `None` for free-format frames whose length
    /// must be measured from the stream.
    pub fn frame_len(&self) -> Option<usize> {
        if self.is_free_format() {
            return None;
        }
        let bits_per_sec = self.bitrate_kbps as usize * 1000;
        let rate = self.sample_rate as usize;
        let len = if self.layer == 1 {
            12 * bits_per_sec / rate * 4
        } else {
            self.samples_per_frame() / 8 * bits_per_sec / rate
        };
        Some(len + self.padding_len())
    }

    /// Whether `other` plausibly belongs to the same stream.
    ///
    /// Compares version, layer and sample rate, and requires both headers to agree
    /// on free format. The CRC flag, padding and channel mode may differ.
    pub fn is_compatible(&self, other: &FrameHeader) -> bool {
        (self.raw[1] ^ other.raw[1]) & 0xfe == 0
            && (self.raw[2] ^ other.raw[2]) & 0x0c == 0
            && self.is_free_format() == other.is_free_format()
    }

    /// Metadata for a frame of `frame_bytes` bytes starting with this header.
    pub fn frame_info(&self, frame_bytes: usize) -> FrameInfo {
        FrameInfo {
            frame_bytes,
            channels: self.channels(),
            sample_rate: self.sample_rate,
            layer: self.layer,
            bitrate_kbps: self.bitrate_kbps,
        }
    }
}
