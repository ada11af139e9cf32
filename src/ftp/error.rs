//! FTP-specific error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorised FTP error.
///
/// `message` carries the server's literal reply text whenever the error
/// was triggered by a reply — FTP reply text beyond the numeric code is
/// server-defined, so it is surfaced verbatim rather than decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpError {
    pub kind: FtpErrorKind,
    pub message: String,
    /// FTP reply code that triggered the error, if any.
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FtpErrorKind {
    /// TCP connect failure, bad greeting, or duplicate-connect misuse.
    ConnectFailed,
    /// USER/PASS rejected by the server.
    AuthFailed,
    /// A reply code did not match what the command requires.
    Protocol,
    /// Data moved but the completion reply was not the expected success code.
    Transfer,
    /// Operation invoked against a session in the wrong state.
    State,
    /// Underlying socket or filesystem I/O failure.
    Io,
    /// Operation timed out.
    Timeout,
    /// Batch task cancelled before completion.
    Cancelled,
}

pub type FtpResult<T> = Result<T, FtpError>;

// ── Construction helpers ─────────────────────────────────────────────

impl FtpError {
    pub fn new(kind: FtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    pub fn connect_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::ConnectFailed, msg)
    }

    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::AuthFailed, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Protocol, msg)
    }

    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Transfer, msg)
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::State, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Io, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Timeout, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(FtpErrorKind::Cancelled, msg)
    }

    /// Whether this error kept the server's reply text.
    pub fn is_reply_error(&self) -> bool {
        self.code.is_some()
    }
}

impl fmt::Display for FtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "[FTP {:?} {}] {}", self.kind, code, self.message)
        } else {
            write!(f, "[FTP {:?}] {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FtpError {}

impl From<std::io::Error> for FtpError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Self::timeout(format!("I/O timeout: {}", e))
        } else {
            Self::io(e.to_string())
        }
    }
}
