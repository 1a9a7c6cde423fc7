//! Bounded worker pools.
//!
//! One interface, two interchangeable strategies:
//! - [`ThreadPool`]: long-lived threads sharing one dispatcher in process
//!   memory.
//! - [`ProcessPool`]: forked workers with no shared memory, receiving
//!   accepted sockets by file-descriptor passing.
//!
//! Neither strategy queues connections internally. [`WorkerPool::dispatch`]
//! blocks until a worker takes ownership, so excess connections wait in the
//! OS listen backlog.

#[cfg(unix)]
mod process;
mod thread;

#[cfg(unix)]
pub use process::ProcessPool;
pub use thread::ThreadPool;

use std::io;
use std::net::{SocketAddr, TcpStream};

/// A bounded set of workers, each servicing one connection at a time.
pub trait WorkerPool: Send {
    /// Hand an accepted connection to a worker, blocking until one is free
    /// to take it. A worker failure is confined to its connection; an error
    /// here means the pool itself can no longer serve.
    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr) -> io::Result<()>;
}
