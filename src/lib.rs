//! fileferry: a TCP file transfer server and client
//!
//! Clients send one-line text commands and receive JSON replies, both
//! framed by a blank-line terminator:
//! - `LIST` names the files the server holds
//! - `GET <name>` returns one file, base64-encoded inside the reply
//! - `UPLOAD <name> <base64>` stores one file
//!
//! The server answers from a bounded worker pool with two interchangeable
//! strategies:
//! - a shared-memory pool of threads
//! - a pool of forked processes fed accepted sockets over a Unix socket pair
//!
//! Features:
//! - Listing, download and upload against one storage directory
//! - Blocking client with a fixed round-trip deadline
//! - Configuration via CLI arguments or TOML file

pub mod client;
pub mod config;
pub mod dispatch;
pub mod framing;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod workload;
