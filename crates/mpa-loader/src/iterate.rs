//! Decode-free frame scan.
//!
//! Each located frame is reported with its raw bytes, its offset from the start of
//! the stream and the metadata read from its header. The callback can stop the
//! scan by returning [`ControlFlow::Break`]; this is checked once per frame.

use std::ops::ControlFlow;
use std::path::Path;

use anyhow::Result;
use mpa_loader_types::FrameInfo;

use crate::config::LoaderConfig;
use crate::header::FrameHeader;
use crate::input::{FrameInput, SliceInput};
use crate::source::ByteSource;
use crate::sync::find_frame_after;
use crate::tag::id3v2_len;

/// Scan every frame of an in-memory stream.
pub fn iterate_buf<F>(buf: &[u8], callback: F)
where
    F: FnMut(&[u8], usize, &FrameInfo) -> ControlFlow<()>,
{
    iterate_input(&mut SliceInput::new(buf), callback);
}

/// Scan every frame of the file at `path` using the configured storage backend.
///
/// Fails only when the file cannot be opened.
pub fn iterate_file<F>(path: impl AsRef<Path>, config: &LoaderConfig, callback: F) -> Result<()>
where
    F: FnMut(&[u8], usize, &FrameInfo) -> ControlFlow<()>,
{
    let mut source = ByteSource::open(path.as_ref(), config)?;
    source.with_input(|input| iterate_input(input, callback));
    source.close();
    Ok(())
}

/// Scan loop shared by the buffer, file and stream-handle entry points.
///
/// Returns the number of frames reported to `callback`.
pub fn iterate_input<I, F>(input: &mut I, mut callback: F) -> usize
where
    I: FrameInput + ?Sized,
    F: FnMut(&[u8], usize, &FrameInfo) -> ControlFlow<()>,
{
    let tag_len = id3v2_len(input.window());
    if tag_len > input.remaining() {
        tracing::warn!(
            tag_bytes = tag_len,
            total_bytes = input.total_len(),
            "metadata tag exceeds input"
        );
        return 0;
    }
    if let Err(e) = input.advance(tag_len) {
        tracing::warn!("skipping metadata tag failed: {e:#}");
        return 0;
    }

    let mut visited = 0usize;
    let mut prev: Option<FrameHeader> = None;
    loop {
        let search = find_frame_after(input.window(), prev.as_ref());
        if !search.found() {
            // Nothing more in a window that already reaches the end of the stream.
            if input.window_is_final() {
                break;
            }
            if search.skipped == 0 {
                tracing::warn!(
                    offset = input.position(),
                    window_bytes = input.window().len(),
                    "frame does not fit the read window, scan stopped early"
                );
                break;
            }
            prev = None;
            if let Err(e) = input.advance(search.skipped) {
                tracing::warn!("read failed during frame scan: {e:#}");
                break;
            }
            continue;
        }

        if let Err(e) = input.advance(search.skipped) {
            tracing::warn!("read failed during frame scan: {e:#}");
            break;
        }
        let offset = input.position();
        let Some(frame) = input.window().get(..search.frame_len) else {
            break;
        };
        let Some(header) = FrameHeader::parse(frame) else {
            break;
        };
        let info = header.frame_info(search.frame_len);
        prev = Some(header);

        visited += 1;
        if callback(frame, offset, &info).is_break() {
            tracing::debug!(offset, frames = visited, "frame scan cancelled");
            break;
        }
        if let Err(e) = input.advance(search.frame_len) {
            tracing::warn!("read failed during frame scan: {e:#}");
            break;
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MIN_CHUNK_SIZE, SourceBackend};
    use crate::header::tests::layer3_header;
    use crate::sync::tests::{frame_128k, frames};
    use crate::testing::id3_tag;
    use std::io::Write;

    fn collect(buf: &[u8]) -> Vec<(usize, FrameInfo)> {
        let mut seen = Vec::new();
        iterate_buf(buf, |_, offset, info| {
            seen.push((offset, *info));
            ControlFlow::Continue(())
        });
        seen
    }

    #[test]
    fn visits_every_frame() {
        let seen = collect(&frames(5));
        let offsets: Vec<usize> = seen.iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 417, 834, 1251, 1668]);
        let info = seen[0].1;
        assert_eq!(info.frame_bytes, 417);
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.layer, 3);
        assert_eq!(info.bitrate_kbps, 128);
    }

    #[test]
    fn stop_on_second_frame() {
        let buf = frames(4);
        let mut calls = 0;
        iterate_buf(&buf, |_, _, _| {
            calls += 1;
            if calls == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(calls, 2);
    }

    #[test]
    fn offsets_include_metadata_tag() {
        let mut buf = id3_tag(100);
        buf.extend(frames(2));
        let seen = collect(&buf);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 110);
        assert_eq!(seen[1].0, 110 + 417);
    }

    #[test]
    fn frame_bytes_passed_to_callback() {
        let buf = frames(2);
        let mut first = Vec::new();
        iterate_buf(&buf, |frame, _, _| {
            first = frame.to_vec();
            ControlFlow::Break(())
        });
        assert_eq!(first, frame_128k());
    }

    #[test]
    fn oversized_tag_reports_nothing() {
        let mut buf = id3_tag(5000);
        buf.truncate(64);
        buf.extend(frames(3));
        assert!(collect(&buf).is_empty());
    }

    #[test]
    fn garbage_between_frames_is_skipped() {
        let mut buf = frames(2);
        buf.extend_from_slice(&[0x11; 33]);
        buf.extend(frames(2));
        let offsets: Vec<usize> = collect(&buf).iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 417, 834 + 33, 834 + 33 + 417]);
    }

    #[test]
    fn mono_frames_report_one_channel() {
        let mut frame = layer3_header(false, 9, 0, false, true).to_vec();
        frame.resize(417, 0);
        let buf: Vec<u8> = (0..3).flat_map(|_| frame.clone()).collect();
        let seen = collect(&buf);
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(_, info)| info.channels == 1));
    }

    #[test]
    fn empty_and_garbage_inputs_report_nothing() {
        assert!(collect(&[]).is_empty());
        assert!(collect(&[0x11; 1000]).is_empty());
    }

    #[test]
    fn chunked_file_scan_matches_buffer_scan() {
        let mut data = id3_tag(100);
        data.extend(frames(40));
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&data).unwrap();
        f.flush().unwrap();

        let expected = collect(&data);
        for backend in [
            SourceBackend::FullLoad,
            SourceBackend::MemoryMapped,
            SourceBackend::ChunkedWindow,
        ] {
            let config = LoaderConfig {
                backend,
                chunk_size: MIN_CHUNK_SIZE,
                ..LoaderConfig::default()
            };
            let mut seen = Vec::new();
            iterate_file(f.path(), &config, |_, offset, info| {
                seen.push((offset, *info));
                ControlFlow::Continue(())
            })
            .unwrap();
            assert_eq!(seen, expected, "{backend:?}");
        }
    }

    #[test]
    fn iterate_file_rejects_small_chunks() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&frames(40)).unwrap();
        f.flush().unwrap();
        let config = LoaderConfig {
            backend: SourceBackend::ChunkedWindow,
            chunk_size: 256,
            ..LoaderConfig::default()
        };
        let mut calls = 0;
        let result = iterate_file(f.path(), &config, |_, _, _| {
            calls += 1;
            ControlFlow::Continue(())
        });
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }

    #[test]
    fn iterate_file_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = iterate_file(dir.path().join("none.mp3"), &LoaderConfig::default(), |_, _, _| {
            ControlFlow::Continue(())
        });
        assert!(result.is_err());
    }
}
