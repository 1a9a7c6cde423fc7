//! ferryd: the file transfer server.
//!
//! Binds one TCP listener and serves every connection from a bounded
//! worker pool. The pool strategy is picked at startup:
//! - `thread`: worker threads sharing one dispatcher
//! - `process`: forked workers receiving sockets over a Unix socket pair

use std::io;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use fileferry::config::{Config, PoolMode};
use fileferry::dispatch::Dispatcher;
use fileferry::pool::{ThreadPool, WorkerPool};
use fileferry::server::Server;
use fileferry::store::DiskStore;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        pool = %config.pool,
        workers = config.workers,
        root = %config.root.display(),
        "Starting ferryd"
    );

    // The pool comes up before the listener so forked workers never
    // inherit a copy of the accept socket.
    let mut pool = match config.pool {
        PoolMode::Thread => spawn_thread_pool(&config)?,
        PoolMode::Process => spawn_process_pool(&config)?,
    };

    let server = Server::bind(&config.listen)?;
    server.serve(pool.as_mut())?;
    Ok(())
}

fn spawn_thread_pool(config: &Config) -> io::Result<Box<dyn WorkerPool>> {
    let store = DiskStore::open(&config.root)?;
    let dispatcher = Arc::new(Dispatcher::new(store));
    let pool = ThreadPool::spawn(config.workers, dispatcher)?;
    Ok(Box::new(pool))
}

#[cfg(unix)]
fn spawn_process_pool(config: &Config) -> io::Result<Box<dyn WorkerPool>> {
    use fileferry::pool::ProcessPool;

    let root = config.root.clone();
    let pool = ProcessPool::spawn(config.workers, move |_worker| {
        Ok(Dispatcher::new(DiskStore::open(&root)?))
    })?;
    Ok(Box::new(pool))
}

#[cfg(not(unix))]
fn spawn_process_pool(_config: &Config) -> io::Result<Box<dyn WorkerPool>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "the process pool needs fork and Unix sockets",
    ))
}
