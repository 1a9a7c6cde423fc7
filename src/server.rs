//! TCP listener and accept loop.

use std::io;
use std::net::{SocketAddr, TcpListener};

use tracing::{debug, error, info};

use crate::pool::WorkerPool;

/// Listen backlog. While every worker is busy, excess connections queue
/// here rather than in the server.
const LISTEN_BACKLOG: i32 = 100;

/// A bound listener ready to feed a worker pool.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
}

impl Server {
    /// Bind to `addr` (e.g. `0.0.0.0:7778`).
    pub fn bind(addr: &str) -> io::Result<Server> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("{addr}: {e}")))?;
        let listener = create_listener(addr)?;
        Ok(Server { listener })
    }

    /// The bound address, with the real port when bound to port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, handing each to the pool.
    ///
    /// Returns only on a pool failure; accept errors are logged and the
    /// loop continues.
    pub fn serve(&self, pool: &mut dyn WorkerPool) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "server listening");
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(connection) => connection,
                Err(e) => {
                    error!(error = %e, "accept failed");
                    continue;
                }
            };
            debug!(peer = %peer, "connection accepted");
            pool.dispatch(stream, peer)?;
        }
    }
}

/// Create a blocking TCP listener with SO_REUSEADDR and a fixed backlog.
fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}
