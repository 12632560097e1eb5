use homesec_common::frame::{
    RawBitmap, RAW_FRAME_LEN, RAW_HEADER_LEN, RAW_HEIGHT, RAW_MAGIC, RAW_WIDTH,
};
use tracing::trace;

use super::find_subsequence;

/// Offset of the first raw bitmap header magic, if any.
pub fn find_header(data: &[u8]) -> Option<usize> {
    find_subsequence(data, &RAW_MAGIC)
}

/// Decode a raw bitmap that starts at offset 0 of `data`.
///
/// Returns `None` until the full header plus payload is available. The width and
/// height bytes in the header are not trusted; the frame is always 160x120.
pub fn decode(data: &[u8]) -> Option<RawBitmap> {
    if !data.starts_with(&RAW_MAGIC) || data.len() < RAW_FRAME_LEN {
        return None;
    }
    let (w, h) = (data[3] as usize, data[4] as usize);
    if w != RAW_WIDTH || h != RAW_HEIGHT {
        trace!(header_w = w, header_h = h, "raw bitmap header geometry ignored");
    }
    RawBitmap::from_luma(data[RAW_HEADER_LEN..RAW_FRAME_LEN].to_vec())
}
