//! Frame-boundary search.
//!
//! A candidate header is only accepted when the frames that follow it carry
//! compatible headers (or the candidate ends exactly at the end of the buffer),
//! which keeps stray `0xFFE` bit patterns inside audio payloads from being taken
//! for frame starts.

use crate::header::{FrameHeader, HEADER_LEN};

/// Consecutive compatible headers checked after a candidate.
const MAX_SYNC_MATCHES: usize = 10;

/// Upper bound on a free-format frame length.
pub const MAX_FREE_FORMAT_FRAME_LEN: usize = 2304;

/// Result of a boundary search over a byte window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSearch {
    /// Bytes before the located frame (or bytes safe to discard when nothing was found).
    pub skipped: usize,
    /// Length of the located frame; 0 when no frame was found.
    pub frame_len: usize,
}

impl FrameSearch {
    pub fn found(&self) -> bool {
        self.frame_len > 0
    }
}

/// Locate the next frame in `buf`.
///
/// When nothing is found, `skipped` stops at the first header whose frame runs
/// past the end of `buf`, or otherwise leaves the last `HEADER_LEN - 1` bytes in
/// place, so a frame split across a window refill is not lost.
pub fn find_frame(buf: &[u8]) -> FrameSearch {
    if buf.len() < HEADER_LEN {
        return FrameSearch {
            skipped: 0,
            frame_len: 0,
        };
    }

    let mut truncated_at = None;
    for i in 0..=buf.len() - HEADER_LEN {
        let Some(header) = FrameHeader::parse(&buf[i..]) else {
            continue;
        };
        let free_len = if header.is_free_format() {
            match measure_free_format(&buf[i..], &header) {
                Some(len) => Some(len),
                None => continue,
            }
        } else {
            None
        };
        let Some(frame_len) = frame_len_of(&header, free_len) else {
            continue;
        };
        if i + frame_len > buf.len() {
            truncated_at.get_or_insert(i);
        } else if sync_matches(&buf[i..], &header, free_len) {
            return FrameSearch {
                skipped: i,
                frame_len,
            };
        }
    }

    FrameSearch {
        skipped: truncated_at.unwrap_or(buf.len() + 1 - HEADER_LEN),
        frame_len: 0,
    }
}

/// Locate the next frame in `buf`, given the header of the frame that ended
/// exactly at `buf[0]`.
///
/// A compatible header at `buf[0]` continues the stream and is accepted without
/// confirming its successor, so the last frame before a run of junk bytes is
/// not lost. Anything else falls back to [`find_frame`].
pub fn find_frame_after(buf: &[u8], prev: Option<&FrameHeader>) -> FrameSearch {
    if let Some(prev) = prev {
        if let Some(frame_len) = continuation_len(buf, prev) {
            return FrameSearch {
                skipped: 0,
                frame_len,
            };
        }
    }
    find_frame(buf)
}

fn continuation_len(buf: &[u8], prev: &FrameHeader) -> Option<usize> {
    let header = FrameHeader::parse(buf)?;
    if !prev.is_compatible(&header) {
        return None;
    }
    let free_len = if header.is_free_format() {
        Some(measure_free_format(buf, &header)?)
    } else {
        None
    };
    let frame_len = frame_len_of(&header, free_len)?;
    (frame_len <= buf.len()).then_some(frame_len)
}

/// Frame length for `header`, using the measured free-format payload when needed.
fn frame_len_of(header: &FrameHeader, free_len: Option<usize>) -> Option<usize> {
    match header.frame_len() {
        Some(len) => Some(len),
        None => free_len.map(|payload| payload + header.padding_len()),
    }
}

/// Measure a free-format frame by looking for the next compatible header.
///
/// Returns the frame length without padding.
fn measure_free_format(buf: &[u8], header: &FrameHeader) -> Option<usize> {
    let limit = buf.len().min(MAX_FREE_FORMAT_FRAME_LEN + HEADER_LEN + 1);
    let start = HEADER_LEN + header.padding_len();
    (start..limit.saturating_sub(HEADER_LEN - 1)).find_map(|k| {
        let next = FrameHeader::parse(&buf[k..])?;
        header
            .is_compatible(&next)
            .then(|| k - header.padding_len())
    })
}

/// Walk the chain of frames after the candidate at `buf[0]`.
fn sync_matches(buf: &[u8], first: &FrameHeader, free_len: Option<usize>) -> bool {
    let mut header = *first;
    let mut pos = 0usize;
    for matched in 0..MAX_SYNC_MATCHES {
        let Some(len) = frame_len_of(&header, free_len) else {
            return false;
        };
        pos += len;
        if pos + HEADER_LEN > buf.len() {
            return matched > 0 || pos == buf.len();
        }
        match FrameHeader::parse(&buf[pos..]) {
            Some(next) if first.is_compatible(&next) => header = next,
            // A confirmed successor is enough; junk further along ends the chain.
            _ => return matched > 0,
        }
    }
    true
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::header::tests::layer3_header;

    /// MPEG-1 layer III 128 kbps 44.1 kHz stereo frame (417 bytes), zero payload.
    pub(crate) fn frame_128k() -> Vec<u8> {
        let mut frame = layer3_header(false, 9, 0, false, false).to_vec();
        frame.resize(417, 0);
        frame
    }

    pub(crate) fn frames(n: usize) -> Vec<u8> {
        (0..n).flat_map(|_| frame_128k()).collect()
    }

    #[test]
    fn finds_frame_at_start() {
        let buf = frames(3);
        assert_eq!(
            find_frame(&buf),
            FrameSearch {
                skipped: 0,
                frame_len: 417
            }
        );
    }

    #[test]
    fn skips_leading_garbage() {
        let mut buf = vec![0x11; 25];
        buf.extend(frames(2));
        let found = find_frame(&buf);
        assert_eq!(found.skipped, 25);
        assert_eq!(found.frame_len, 417);
    }

    #[test]
    fn single_frame_accepted_only_when_it_fills_the_buffer() {
        let buf = frame_128k();
        assert!(find_frame(&buf).found());

        let mut trailing = frame_128k();
        trailing.extend_from_slice(&[0x00; 8]);
        assert!(!find_frame(&trailing).found());
    }

    #[test]
    fn rejects_header_without_matching_successor() {
        let mut buf = frame_128k();
        buf.extend_from_slice(&[0x00; 500]);
        let found = find_frame(&buf);
        assert!(!found.found());
        assert_eq!(found.skipped, buf.len() - 3);
    }

    #[test]
    fn junk_after_confirmed_successor_keeps_candidate() {
        let mut buf = frames(2);
        buf.extend_from_slice(&[0x11; 33]);
        assert_eq!(
            find_frame(&buf),
            FrameSearch {
                skipped: 0,
                frame_len: 417
            }
        );
        // The second frame has no successor, so a cold search rejects it.
        assert!(!find_frame(&buf[417..]).found());
    }

    #[test]
    fn continuation_accepts_frame_before_junk() {
        let mut buf = frames(2);
        buf.extend_from_slice(&[0x11; 33]);
        let prev = FrameHeader::parse(&buf).unwrap();
        assert_eq!(
            find_frame_after(&buf[417..], Some(&prev)),
            FrameSearch {
                skipped: 0,
                frame_len: 417
            }
        );
        // Junk where the next frame should start falls back to a full search.
        let found = find_frame_after(&buf[834..], Some(&prev));
        assert!(!found.found());
    }

    #[test]
    fn continuation_requires_compatible_header() {
        let prev = FrameHeader::parse(&layer3_header(false, 9, 1, false, false)).unwrap();
        let mut buf = frame_128k();
        buf.extend_from_slice(&[0x11; 33]);
        assert!(!find_frame_after(&buf, Some(&prev)).found());
    }

    #[test]
    fn truncated_frame_is_not_found() {
        let mut buf = frame_128k();
        buf.truncate(200);
        assert!(!find_frame(&buf).found());
    }

    #[test]
    fn search_stops_before_truncated_frame() {
        let mut buf = vec![0x11; 40];
        buf.extend(frame_128k());
        buf.truncate(300);
        let found = find_frame(&buf);
        assert!(!found.found());
        assert_eq!(found.skipped, 40);
    }

    #[test]
    fn short_buffer_consumes_nothing() {
        assert_eq!(
            find_frame(&[0xff, 0xfb]),
            FrameSearch {
                skipped: 0,
                frame_len: 0
            }
        );
    }

    #[test]
    fn free_format_length_measured_from_next_header() {
        let header = layer3_header(false, 0, 0, false, false);
        let mut buf = Vec::new();
        for _ in 0..3 {
            let start = buf.len();
            buf.extend_from_slice(&header);
            buf.resize(start + 600, 0);
        }
        let found = find_frame(&buf);
        assert_eq!(found.skipped, 0);
        assert_eq!(found.frame_len, 600);
    }
}
