//! `ftpc` — a concurrent FTP client.
//!
//! The crate splits into two halves:
//! - [`ftp::client::FtpSession`] owns one control connection and speaks the
//!   RFC 959 command/response protocol over it (PASV-negotiated data
//!   channels for listings and transfers).
//! - [`ftp::batch::TransferBatch`] fans a set of file operations out across
//!   independent sessions, one per file, and aggregates the results.

pub mod ftp;

pub use ftp::batch::{BatchReport, TransferBatch, TransferOutcome};
pub use ftp::client::FtpSession;
pub use ftp::error::{FtpError, FtpErrorKind, FtpResult};
pub use ftp::types::*;
