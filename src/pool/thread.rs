//! Shared-memory worker pool.

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use tracing::{debug, error, info};

use crate::dispatch::Dispatcher;
use crate::pool::WorkerPool;
use crate::session::serve_connection;
use crate::store::FileStore;

/// Worker pool backed by long-lived threads sharing one dispatcher.
pub struct ThreadPool {
    sender: Option<Sender<(TcpStream, SocketAddr)>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawn `workers` threads servicing connections against a shared
    /// dispatcher.
    pub fn spawn<S>(workers: usize, dispatcher: Arc<Dispatcher<S>>) -> io::Result<ThreadPool>
    where
        S: FileStore + 'static,
    {
        // Capacity 0 makes the handoff a rendezvous: a send completes only
        // when some worker is already blocked waiting for a connection.
        let (sender, receiver) = bounded::<(TcpStream, SocketAddr)>(0);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let receiver = receiver.clone();
            let dispatcher = Arc::clone(&dispatcher);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || {
                    while let Ok((mut stream, peer)) = receiver.recv() {
                        debug!(worker = id, peer = %peer, "connection assigned");
                        match serve_connection(&mut stream, peer, &dispatcher) {
                            Ok(()) => debug!(worker = id, peer = %peer, "connection closed"),
                            Err(e) => {
                                error!(worker = id, peer = %peer, error = %e, "connection failed")
                            }
                        }
                    }
                })?;
            handles.push(handle);
        }

        info!(workers, "thread pool ready");
        Ok(ThreadPool {
            sender: Some(sender),
            workers: handles,
        })
    }
}

impl WorkerPool for ThreadPool {
    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pool is shut down"))?;
        sender
            .send((stream, peer))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "all workers exited"))
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        // Disconnecting the channel stops idle workers; busy ones finish
        // their current connection first.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
