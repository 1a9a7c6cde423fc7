//! Isolated worker pool.
//!
//! Workers are forked child processes sharing nothing but one
//! `SOCK_SEQPACKET` control socket. A worker announces a free slot with a
//! one-byte ready token; the parent answers with a one-byte message whose
//! ancillary data carries the accepted socket (`SCM_RIGHTS`). Each worker
//! builds its own dispatcher after the fork, so no state crosses the
//! process boundary.

use std::io::{self, IoSlice, IoSliceMut};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::sys::socket::{
    recv, recvmsg, send, sendmsg, socketpair, AddressFamily, ControlMessage, ControlMessageOwned,
    MsgFlags, SockFlag, SockType, UnixAddr,
};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, ForkResult, Pid};
use tracing::{debug, error, info};

use crate::dispatch::Dispatcher;
use crate::pool::WorkerPool;
use crate::session::serve_connection;
use crate::store::FileStore;

/// Ready-token byte workers send to claim the next connection.
const READY: u8 = 1;

/// Worker pool backed by forked processes.
pub struct ProcessPool {
    control: Option<OwnedFd>,
    workers: Vec<Pid>,
}

impl ProcessPool {
    /// Fork `workers` child processes sharing one control socket.
    ///
    /// `init` runs once inside each child, after the fork, to build that
    /// worker's own dispatcher; the parent never constructs one. Must be
    /// called while the process is still single-threaded.
    pub fn spawn<S, F>(workers: usize, init: F) -> io::Result<ProcessPool>
    where
        S: FileStore,
        F: Fn(usize) -> io::Result<Dispatcher<S>>,
    {
        // One seqpacket pair serves every worker: message boundaries are
        // preserved, so each ready token and each passed socket reaches
        // exactly one peer.
        let (parent_end, worker_end) = socketpair(
            AddressFamily::Unix,
            SockType::SeqPacket,
            None,
            SockFlag::empty(),
        )
        .map_err(io::Error::from)?;

        let mut pids = Vec::with_capacity(workers);
        for id in 0..workers {
            match unsafe { fork() }.map_err(io::Error::from)? {
                ForkResult::Child => {
                    // The child inherits both ends; its copy of the parent
                    // end is closed so shutdown is visible as EOF.
                    let _ = nix::unistd::close(parent_end.as_raw_fd());
                    let code = match init(id) {
                        Ok(dispatcher) => worker_loop(id, worker_end.as_raw_fd(), &dispatcher),
                        Err(e) => {
                            error!(worker = id, error = %e, "worker init failed");
                            1
                        }
                    };
                    std::process::exit(code);
                }
                ForkResult::Parent { child } => {
                    debug!(worker = id, pid = child.as_raw(), "worker forked");
                    pids.push(child);
                }
            }
        }

        // The parent keeps only its own end; holding the worker end open
        // would mask worker exits.
        drop(worker_end);

        info!(workers, "process pool ready");
        Ok(ProcessPool {
            control: Some(parent_end),
            workers: pids,
        })
    }
}

impl WorkerPool for ProcessPool {
    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        let control = self
            .control
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "pool is shut down"))?;

        // Block until some worker announces a free slot.
        let mut token = [0u8; 1];
        let n = recv(control.as_raw_fd(), &mut token, MsgFlags::empty()).map_err(io::Error::from)?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "all workers exited",
            ));
        }

        // Pass the accepted socket. Once `stream` drops below, the worker
        // holds the only lasting reference.
        let fds = [stream.as_raw_fd()];
        let cmsg = [ControlMessage::ScmRights(&fds)];
        let body = [READY];
        let iov = [IoSlice::new(&body)];
        sendmsg::<UnixAddr>(control.as_raw_fd(), &iov, &cmsg, MsgFlags::empty(), None)
            .map_err(io::Error::from)?;

        debug!(peer = %peer, "connection passed to a worker");
        drop(stream);
        Ok(())
    }
}

impl Drop for ProcessPool {
    fn drop(&mut self) {
        // Closing the parent end is the shutdown signal: workers see EOF
        // once they finish their current connection.
        self.control.take();
        for pid in self.workers.drain(..) {
            match waitpid(pid, None) {
                Ok(status) => debug!(pid = pid.as_raw(), ?status, "worker reaped"),
                Err(e) => error!(pid = pid.as_raw(), error = %e, "reaping worker failed"),
            }
        }
    }
}

/// Accept passed sockets until the parent closes the control channel.
fn worker_loop<S: FileStore>(id: usize, control: RawFd, dispatcher: &Dispatcher<S>) -> i32 {
    info!(worker = id, "worker ready");
    loop {
        // Announce a free slot, then block for the next connection.
        if let Err(e) = send(control, &[READY], MsgFlags::empty()) {
            debug!(worker = id, error = %e, "control channel closed, exiting");
            return 0;
        }

        let mut stream = match recv_stream(control) {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                debug!(worker = id, "control channel closed, exiting");
                return 0;
            }
            Err(e) => {
                error!(worker = id, error = %e, "receiving a connection failed");
                return 1;
            }
        };

        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(e) => {
                debug!(worker = id, error = %e, "connection vanished before service");
                continue;
            }
        };

        debug!(worker = id, peer = %peer, "connection assigned");
        match serve_connection(&mut stream, peer, dispatcher) {
            Ok(()) => debug!(worker = id, peer = %peer, "connection closed"),
            Err(e) => error!(worker = id, peer = %peer, error = %e, "connection failed"),
        }
    }
}

/// Receive one passed socket; `None` means the parent closed the channel.
fn recv_stream(control: RawFd) -> io::Result<Option<TcpStream>> {
    let mut token = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut token)];
    let mut cmsg_buffer = nix::cmsg_space!([RawFd; 1]);

    let msg = recvmsg::<UnixAddr>(control, &mut iov, Some(&mut cmsg_buffer), MsgFlags::empty())
        .map_err(io::Error::from)?;

    if msg.bytes == 0 {
        return Ok(None);
    }

    for cmsg in msg.cmsgs() {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(&fd) = fds.first() {
                // Ownership of the descriptor transfers to the stream.
                return Ok(Some(unsafe { TcpStream::from_raw_fd(fd) }));
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "control message carried no descriptor",
    ))
}
