//! Message framing over a streaming transport.
//!
//! Messages are delimited by a literal 4-byte `\r\n\r\n` terminator. The
//! split is on the byte sequence, never line by line, so message bodies may
//! contain bare newlines. A [`FrameCodec`] buffers whatever a socket read
//! delivers and hands back complete messages as they become available, which
//! makes the decoded message sequence independent of how the stream was
//! chunked in transit.
//!
//! No upper bound is placed on message size: a peer that never sends the
//! terminator grows the buffer without limit. A body that itself contains
//! the terminator splits early and is not detected.

use bytes::{Bytes, BytesMut};

/// Message terminator, always exactly these four bytes.
pub const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Incremental splitter for terminator-delimited messages.
#[derive(Debug, Default)]
pub struct FrameCodec {
    buf: BytesMut,
    /// Bytes before this offset are known to contain no terminator.
    scanned: usize,
}

impl FrameCodec {
    pub fn new() -> FrameCodec {
        FrameCodec {
            buf: BytesMut::new(),
            scanned: 0,
        }
    }

    /// Append raw bytes from the transport and iterate the complete messages
    /// now buffered. The terminator is stripped from each message.
    ///
    /// Dropping the iterator early leaves the remaining complete messages
    /// buffered; a later [`FrameCodec::messages`] call resumes them.
    pub fn append(&mut self, chunk: &[u8]) -> Messages<'_> {
        self.buf.extend_from_slice(chunk);
        Messages { codec: self }
    }

    /// Iterate complete messages without appending new bytes.
    pub fn messages(&mut self) -> Messages<'_> {
        Messages { codec: self }
    }

    /// Number of bytes buffered, including any complete but undrained
    /// messages.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Frame a payload for the wire: the payload followed by the terminator.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(payload.len() + TERMINATOR.len());
        framed.extend_from_slice(payload);
        framed.extend_from_slice(TERMINATOR);
        framed
    }

    fn next_message(&mut self) -> Option<Bytes> {
        match find_terminator(&self.buf, self.scanned) {
            Some(pos) => {
                let mut frame = self.buf.split_to(pos + TERMINATOR.len());
                frame.truncate(pos);
                self.scanned = 0;
                Some(frame.freeze())
            }
            None => {
                // A partial terminator may straddle the chunk boundary, so
                // the last three bytes must be rescanned next time.
                self.scanned = self.buf.len().saturating_sub(TERMINATOR.len() - 1);
                None
            }
        }
    }
}

/// Draining iterator over the complete messages held by a [`FrameCodec`].
pub struct Messages<'a> {
    codec: &'a mut FrameCodec,
}

impl Iterator for Messages<'_> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.codec.next_message()
    }
}

/// Find the start of the first terminator at or after `from`.
fn find_terminator(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(TERMINATOR.len())
        .position(|window| window == TERMINATOR)
        .map(|pos| from + pos)
}
