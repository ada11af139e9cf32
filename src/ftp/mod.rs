//! # ftpc — Concurrent FTP Client
//!
//! Client side of the FTP protocol (RFC 959 subset): control-channel
//! command/response handling, PASV data-channel negotiation, and a batch
//! layer that moves several files in parallel over independent sessions.
//!
//! Architecture:
//! - `types` — data structures, enums, config
//! - `error` — FTP-specific error type
//! - `protocol` — low-level command/response codec
//! - `connection` — TCP transport and greeting
//! - `client` — single-use FTP session (login, PWD/CWD, QUIT)
//! - `transfer` — PASV negotiation and data-channel setup
//! - `directory` — listings, mkdir, rmdir
//! - `file_ops` — upload, download
//! - `batch` — concurrent per-file transfer coordinator

pub mod types;
pub mod error;
pub mod protocol;
pub mod connection;
pub mod client;
pub mod transfer;
pub mod directory;
pub mod file_ops;
pub mod batch;

pub use error::{FtpError, FtpResult};
pub use types::*;

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

lazy_static! {
    /// Global transfer progress map, keyed by transfer id.
    pub static ref TRANSFER_PROGRESS: StdMutex<HashMap<String, TransferProgress>> =
        StdMutex::new(HashMap::new());
}
