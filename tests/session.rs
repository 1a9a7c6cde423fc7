//! End-to-end tests over loopback: a real listener, the thread pool, and
//! the blocking client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use fileferry::client::{ClientError, FileClient};
use fileferry::dispatch::Dispatcher;
use fileferry::pool::ThreadPool;
use fileferry::server::Server;
use fileferry::store::DiskStore;

/// Server on an ephemeral port over a fresh storage directory. The accept
/// loop runs in a background thread for the rest of the test process.
fn start_server(workers: usize) -> (SocketAddr, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let store = DiskStore::open(root.path()).unwrap();
    let dispatcher = Arc::new(Dispatcher::new(store));
    let mut pool = ThreadPool::spawn(workers, dispatcher).unwrap();

    let server = Server::bind("127.0.0.1:0").unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || {
        let _ = server.serve(&mut pool);
    });
    (addr, root)
}

fn client_for(addr: SocketAddr) -> FileClient {
    FileClient::with_timeout(addr.to_string(), Duration::from_secs(30))
}

#[test]
fn test_upload_list_download_round_trip() {
    let (addr, root) = start_server(2);
    let client = client_for(addr);

    assert!(client.list().unwrap().is_empty());

    let payload: Vec<u8> = (0..=255u8).cycle().take(3 * 1024).collect();
    let scratch = tempfile::tempdir().unwrap();
    let local = scratch.path().join("blob.dat");
    std::fs::write(&local, &payload).unwrap();

    let sent = client.upload(&local).unwrap();
    assert_eq!(sent.bytes, payload.len() as u64);

    assert_eq!(client.list().unwrap(), vec!["blob.dat".to_string()]);
    assert_eq!(std::fs::read(root.path().join("blob.dat")).unwrap(), payload);

    let fetched = tempfile::tempdir().unwrap();
    let got = client.download("blob.dat", fetched.path()).unwrap();
    assert_eq!(got.bytes, payload.len() as u64);
    assert_eq!(
        std::fs::read(fetched.path().join("blob.dat")).unwrap(),
        payload
    );
}

#[test]
fn test_missing_file_rejected_without_breaking_the_server() {
    let (addr, _root) = start_server(1);
    let client = client_for(addr);

    let scratch = tempfile::tempdir().unwrap();
    match client.download("missing.dat", scratch.path()) {
        Err(ClientError::Rejected(_)) => {}
        other => panic!("Expected Rejected, got {:?}", other),
    }

    // The single worker is free again and keeps serving.
    assert!(client.list().unwrap().is_empty());
}

#[test]
fn test_get_names_keep_interior_spaces() {
    let (addr, root) = start_server(1);
    std::fs::write(root.path().join("two words.dat"), b"hi").unwrap();

    let client = client_for(addr);
    let scratch = tempfile::tempdir().unwrap();
    let got = client.download("two words.dat", scratch.path()).unwrap();
    assert_eq!(got.bytes, 2);
    assert_eq!(
        std::fs::read(scratch.path().join("two words.dat")).unwrap(),
        b"hi"
    );
}

#[test]
fn test_path_escape_rejected() {
    let (addr, _root) = start_server(1);
    let client = client_for(addr);

    let scratch = tempfile::tempdir().unwrap();
    match client.download("../etc/passwd", scratch.path()) {
        Err(ClientError::Rejected(_)) => {}
        other => panic!("Expected Rejected, got {:?}", other),
    }
}
