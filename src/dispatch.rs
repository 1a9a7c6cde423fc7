//! Total mapping from request frames to response envelopes.
//!
//! A [`Dispatcher`] owns one [`FileStore`] and turns every inbound frame
//! into exactly one [`Response`]. Malformed frames, unknown commands and
//! store failures all come back as `ERROR` envelopes; nothing at this
//! boundary panics or propagates.

use std::str;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use tracing::debug;

use crate::protocol::{Request, Response};
use crate::store::FileStore;

/// Command interpreter over one store.
///
/// One instance exists per serving process: worker threads share it behind
/// an `Arc`, a forked worker builds its own.
pub struct Dispatcher<S> {
    store: S,
}

impl<S: FileStore> Dispatcher<S> {
    pub fn new(store: S) -> Dispatcher<S> {
        Dispatcher { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute one parsed request.
    pub fn dispatch(&self, request: &Request) -> Response {
        debug!(verb = request.verb(), "handling request");
        match request {
            Request::List => match self.store.list() {
                Ok(names) => Response::listing(names),
                Err(e) => Response::error(format!("list failed: {}", e)),
            },
            Request::Get { name } => match self.store.read(name) {
                Ok(bytes) => Response::file(name.clone(), BASE64_STANDARD.encode(bytes)),
                Err(e) => Response::error(format!("get {} failed: {}", name, e)),
            },
            Request::Upload { name, content } => {
                let bytes = match BASE64_STANDARD.decode(content) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        return Response::error(format!(
                            "upload {} failed: invalid base64 content: {}",
                            name, e
                        ))
                    }
                };
                match self.store.write(name, &bytes) {
                    Ok(()) => Response::ok(format!("{} uploaded ({} bytes)", name, bytes.len())),
                    Err(e) => Response::error(format!("upload {} failed: {}", name, e)),
                }
            }
        }
    }

    /// Execute one raw frame, absorbing decode and parse failures.
    pub fn dispatch_frame(&self, frame: &[u8]) -> Response {
        let line = match str::from_utf8(frame) {
            Ok(line) => line,
            Err(_) => return Response::error("request is not valid utf-8"),
        };
        match Request::parse(line) {
            Ok(request) => self.dispatch(&request),
            Err(e) => Response::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Payload, Status};
    use crate::store::DiskStore;
    use std::io;

    fn temp_dispatcher() -> (tempfile::TempDir, Dispatcher<DiskStore>) {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::new(DiskStore::open(dir.path()).unwrap());
        (dir, dispatcher)
    }

    #[test]
    fn test_list_empty_store() {
        let (_dir, dispatcher) = temp_dispatcher();
        let response = dispatcher.dispatch(&Request::List);
        assert_eq!(response.status, Status::Ok);
        match response.data {
            Some(Payload::Names(names)) => assert!(names.is_empty()),
            other => panic!("Expected Names payload, got {:?}", other),
        }
    }

    #[test]
    fn test_get_missing_file_is_an_error_envelope() {
        let (_dir, dispatcher) = temp_dispatcher();
        let response = dispatcher.dispatch(&Request::Get {
            name: "missing.dat".to_string(),
        });
        assert_eq!(response.status, Status::Error);
    }

    #[test]
    fn test_upload_then_get_round_trips_content() {
        let (_dir, dispatcher) = temp_dispatcher();

        let upload = dispatcher.dispatch(&Request::Upload {
            name: "a.dat".to_string(),
            content: BASE64_STANDARD.encode(b"hi"),
        });
        assert_eq!(upload.status, Status::Ok);
        assert_eq!(dispatcher.store().read("a.dat").unwrap(), b"hi");

        let get = dispatcher.dispatch(&Request::Get {
            name: "a.dat".to_string(),
        });
        assert_eq!(get.status, Status::Ok);
        assert_eq!(get.file_name.as_deref(), Some("a.dat"));
        let content = get.file_content.unwrap();
        assert_eq!(BASE64_STANDARD.decode(content).unwrap(), b"hi");
    }

    #[test]
    fn test_upload_with_invalid_base64() {
        let (_dir, dispatcher) = temp_dispatcher();
        let response = dispatcher.dispatch(&Request::Upload {
            name: "a.dat".to_string(),
            content: "not base64!!!".to_string(),
        });
        assert_eq!(response.status, Status::Error);
        // Nothing was written.
        assert!(dispatcher.store().list().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_frame_parse_failure() {
        let (_dir, dispatcher) = temp_dispatcher();
        let response = dispatcher.dispatch_frame(b"FROB a.dat");
        assert_eq!(response.status, Status::Error);
    }

    #[test]
    fn test_dispatch_frame_rejects_non_utf8() {
        let (_dir, dispatcher) = temp_dispatcher();
        let response = dispatcher.dispatch_frame(&[0xff, 0xfe, 0x00]);
        assert_eq!(response.status, Status::Error);
    }

    /// Store that fails every operation; dispatch must stay total.
    struct BrokenStore;

    impl FileStore for BrokenStore {
        fn list(&self) -> io::Result<Vec<String>> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
        fn read(&self, _name: &str) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
        fn write(&self, _name: &str, _bytes: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn test_store_failures_become_error_envelopes() {
        let dispatcher = Dispatcher::new(BrokenStore);
        for frame in [
            &b"LIST"[..],
            &b"GET a.dat"[..],
            &b"UPLOAD a.dat aGk="[..],
        ] {
            let response = dispatcher.dispatch_frame(frame);
            assert_eq!(response.status, Status::Error, "frame {:?}", frame);
        }
    }
}
