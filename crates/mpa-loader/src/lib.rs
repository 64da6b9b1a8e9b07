//! MPEG audio (layers I-III) whole-stream loader and frame scanner.

pub mod config;
pub mod decoder;
pub mod header;
pub mod input;
pub mod iterate;
pub mod load;
pub mod pcm;
pub mod source;
pub mod stream;
pub mod sync;
pub mod tag;

#[cfg(test)]
mod testing;

pub use config::{ChannelPolicy, LoaderConfig, SourceBackend};
pub use decoder::{DecodedFrame, FrameDecoder, SymphoniaFrameDecoder};
pub use iterate::{iterate_buf, iterate_file};
pub use load::{DecodedAudio, ProgressFn, load_buf, load_file};
pub use mpa_loader_types::{ChannelLayout, FrameInfo, SeekMethod, StreamStats};
pub use stream::{StreamHandle, UnsupportedOperation};
