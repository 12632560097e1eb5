use bytes::{Bytes, BytesMut};
use tracing::warn;

/// Result of [`ByteAccumulator::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Stored,
    /// The cap was exceeded and everything buffered (including the new bytes) was dropped.
    Reset { dropped: usize },
}

/// Append-only byte buffer with a hard size cap.
///
/// Exceeding the cap drops the whole buffer so the stream can resynchronise on the
/// next marker; this is never an error.
pub struct ByteAccumulator {
    buf: BytesMut,
    max_bytes: usize,
}

impl ByteAccumulator {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(max_bytes.min(256 * 1024)),
            max_bytes,
        }
    }

    pub fn append(&mut self, bytes: &[u8]) -> Append {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.max_bytes {
            let dropped = self.buf.len();
            warn!(dropped, max_bytes = self.max_bytes, "stream buffer over cap, clearing");
            self.reset();
            return Append::Reset { dropped };
        }
        Append::Stored
    }

    /// Remove and return the first `n` bytes (clamped to the buffered length).
    pub fn drain_prefix(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
