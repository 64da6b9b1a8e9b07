//! Leading ID3v2 tag detection.
//!
//! Only the size is read; tag contents are never parsed.

/// Fixed ID3v2 header length: magic(3) + version/flags(3) + synchsafe size(4).
pub const ID3V2_HEADER_LEN: usize = 10;

/// Decode a big-endian synchsafe integer (7 significant bits per byte).
pub fn synchsafe_u32(bytes: [u8; 4]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, b| (acc << 7) | u32::from(b & 0x7f))
}

/// Number of leading bytes occupied by an ID3v2 tag, or 0 when absent.
///
/// The returned value can exceed `buf.len()` when the tag declares more data than
/// the buffer holds; callers must treat that as malformed input.
pub fn id3v2_len(buf: &[u8]) -> usize {
    if buf.len() > ID3V2_HEADER_LEN && buf.starts_with(b"ID3") {
        let size = synchsafe_u32([buf[6], buf[7], buf[8], buf[9]]);
        return size as usize + ID3V2_HEADER_LEN;
    }
    0
}
