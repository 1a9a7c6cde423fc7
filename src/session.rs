//! Per-connection serve loop.
//!
//! Strictly blocking and half-duplex per request: every buffered complete
//! frame is dispatched and its reply fully written before the next read.
//! Requests on one connection are therefore handled in arrival order;
//! concurrency exists only across connections.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

use tracing::{debug, trace};

use crate::dispatch::Dispatcher;
use crate::framing::FrameCodec;
use crate::store::FileStore;

/// Upper bound on bytes pulled from the socket per read call.
pub const READ_CHUNK: usize = 1024 * 1024;

/// Service one connection to completion.
///
/// Returns `Ok(())` when the peer closes the connection. Any I/O or
/// serialization failure propagates and closes the session without a final
/// reply; the caller owns logging it.
pub fn serve_connection<S: FileStore>(
    stream: &mut TcpStream,
    peer: SocketAddr,
    dispatcher: &Dispatcher<S>,
) -> std::io::Result<()> {
    let mut codec = FrameCodec::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            debug!(peer = %peer, "peer closed the connection");
            return Ok(());
        }

        for frame in codec.append(&chunk[..n]) {
            trace!(peer = %peer, bytes = frame.len(), "request frame");
            let response = dispatcher.dispatch_frame(&frame);
            let body = response.encode()?;
            stream.write_all(&FrameCodec::encode(&body))?;
        }
    }
}
