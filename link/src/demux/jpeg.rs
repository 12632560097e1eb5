use homesec_common::frame::{JPEG_EOI, JPEG_SOI};

use super::find_subsequence;

/// Where a JPEG sits inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegSpan {
    /// `start..end` covers SOI through EOI inclusive.
    Complete { start: usize, end: usize },
    /// SOI found at `start`, no EOI after it yet.
    Partial { start: usize },
}

impl JpegSpan {
    pub fn start(&self) -> usize {
        match *self {
            JpegSpan::Complete { start, .. } | JpegSpan::Partial { start } => start,
        }
    }
}

/// Find the first SOI and the first EOI that follows it.
///
/// The EOI search starts two bytes after SOI so `FF D8 D9` is not read as an
/// empty image.
pub fn locate(data: &[u8]) -> Option<JpegSpan> {
    let start = find_subsequence(data, &JPEG_SOI)?;
    let body = start + JPEG_SOI.len();
    match find_subsequence(&data[body..], &JPEG_EOI) {
        Some(rel) => Some(JpegSpan::Complete {
            start,
            end: body + rel + JPEG_EOI.len(),
        }),
        None => Some(JpegSpan::Partial { start }),
    }
}
