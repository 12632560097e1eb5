//! Splits the delimiter-free peripheral stream into text lines, JPEG stills and
//! raw grayscale bitmaps.
//!
//! Probe order on every pass is raw bitmap header, then JPEG SOI, then text.
//! The raw magic `AA 04 21` is the rarest pattern, so it is trusted first; text
//! noise is far more likely to contain a stray `FF D8`.

pub mod bitmap;
pub mod jpeg;
pub mod text;

use homesec_common::frame::{RawFrame, RAW_FRAME_LEN};
use tracing::debug;

use crate::accumulator::{Append, ByteAccumulator};
use jpeg::JpegSpan;

enum Progress {
    Consumed,
    NeedMoreData,
}

pub struct StreamDemultiplexer {
    buffer: ByteAccumulator,
}

impl StreamDemultiplexer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: ByteAccumulator::new(max_bytes),
        }
    }

    /// Append a chunk and extract every frame that is now complete, in stream order.
    ///
    /// Partial frames stay buffered for the next call. If the chunk pushes the
    /// buffer over its cap, the buffer is cleared and nothing is returned.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        if let Append::Reset { dropped } = self.buffer.append(chunk) {
            debug!(dropped, "resynchronising after buffer overflow");
            return frames;
        }
        while let Progress::Consumed = self.extract_next(&mut frames) {}
        frames
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
    }

    fn extract_next(&mut self, frames: &mut Vec<RawFrame>) -> Progress {
        let data = self.buffer.as_slice();
        if data.is_empty() {
            return Progress::NeedMoreData;
        }

        if let Some(header_at) = bitmap::find_header(data) {
            if header_at > 0 {
                let prefix = self.buffer.drain_prefix(header_at);
                flush_before_bitmap(&prefix, frames);
                return Progress::Consumed;
            }
            return match bitmap::decode(data) {
                Some(bmp) => {
                    self.buffer.drain_prefix(RAW_FRAME_LEN);
                    debug!(buffered = self.buffer.len(), "raw bitmap frame extracted");
                    frames.push(RawFrame::RawBitmap(bmp));
                    Progress::Consumed
                }
                None => Progress::NeedMoreData,
            };
        }

        match jpeg::locate(data) {
            Some(span) if span.start() > 0 => {
                let prefix = self.buffer.drain_prefix(span.start());
                text::split_lines(&prefix, frames);
                Progress::Consumed
            }
            Some(JpegSpan::Complete { end, .. }) => {
                let image = self.buffer.drain_prefix(end);
                debug!(bytes = image.len(), "JPEG frame extracted");
                frames.push(RawFrame::JpegImage(image.to_vec()));
                Progress::Consumed
            }
            Some(JpegSpan::Partial { .. }) => Progress::NeedMoreData,
            None => match data.iter().rposition(|&b| b == b'\n') {
                Some(last_newline) => {
                    let span = self.buffer.drain_prefix(last_newline + 1);
                    text::split_lines(&span, frames);
                    Progress::Consumed
                }
                None => Progress::NeedMoreData,
            },
        }
    }
}

/// Bytes in front of a raw bitmap header are final: nothing after the header can
/// complete them. Complete JPEGs and terminated lines are kept in order; the rest
/// is dropped.
fn flush_before_bitmap(mut rest: &[u8], frames: &mut Vec<RawFrame>) {
    loop {
        match jpeg::locate(rest) {
            Some(JpegSpan::Complete { start, end }) => {
                text::split_lines(&rest[..start], frames);
                frames.push(RawFrame::JpegImage(rest[start..end].to_vec()));
                rest = &rest[end..];
            }
            Some(JpegSpan::Partial { start }) => {
                text::split_lines(&rest[..start], frames);
                debug!(
                    dropped = rest.len() - start,
                    "truncated JPEG superseded by raw bitmap header"
                );
                return;
            }
            None => {
                text::split_lines(rest, frames);
                return;
            }
        }
    }
}

/// Find the position of `needle` in `haystack`.
pub(crate) fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
