//! Single-use FTP session — owns the control connection and issues
//! commands over it.
//!
//! Lifecycle: `Unconnected → Connected` (successful `connect()`) `→ Closed`
//! (`disconnect()`, or any failure during the handshake). There is no way
//! back to `Connected`; later work needs a fresh session. Exactly one
//! command is ever outstanding on the control channel.
//!
//! Higher-level operations live in `directory.rs` and `file_ops.rs` as
//! further `impl FtpSession` blocks.

use crate::ftp::connection;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use crate::ftp::transfer;
use crate::ftp::types::{FtpConnectionConfig, SessionState};
use std::time::Duration;
use tokio::net::TcpStream;
use uuid::Uuid;

/// One authenticated FTP control connection.
pub struct FtpSession {
    pub id: String,
    config: FtpConnectionConfig,
    codec: Option<FtpCodec>,
    state: SessionState,
    current_directory: String,
    server_banner: Option<String>,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
}

impl FtpSession {
    /// Create an unconnected session for the given endpoint.
    pub fn new(config: FtpConnectionConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            config,
            codec: None,
            state: SessionState::Unconnected,
            current_directory: "/".into(),
            server_banner: None,
            bytes_uploaded: 0,
            bytes_downloaded: 0,
        }
    }

    /// Open the control connection and authenticate.
    ///
    /// The greeting must be `220`, `USER` must answer `331` and `PASS`
    /// must answer `230`; auth failures carry the server's literal reply
    /// text. Any failure closes the session for good.
    pub async fn connect(&mut self) -> FtpResult<()> {
        match self.state {
            SessionState::Unconnected => {}
            SessionState::Connected => {
                return Err(FtpError::connect_failed(
                    "Session already connected; disconnect first",
                ))
            }
            SessionState::Closed => {
                return Err(FtpError::connect_failed(
                    "Session is closed; sessions are single-use",
                ))
            }
        }

        match self.handshake().await {
            Ok(()) => {
                self.state = SessionState::Connected;
                log::info!(
                    "session {} connected to {}:{} as {}",
                    self.id,
                    self.config.host,
                    self.config.port,
                    self.config.username
                );
                Ok(())
            }
            Err(e) => {
                self.codec = None;
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> FtpResult<()> {
        let (mut codec, banner) = connection::connect(&self.config).await?;

        let user = codec
            .execute(&format!("USER {}", self.config.username))
            .await?;
        if user.code != 331 {
            return Err(FtpError::auth_failed(user.text()).with_code(user.code));
        }

        let pass = codec
            .execute(&format!("PASS {}", self.config.password))
            .await?;
        if pass.code != 230 {
            return Err(FtpError::auth_failed(pass.text()).with_code(pass.code));
        }

        self.server_banner = Some(banner.text());
        self.codec = Some(codec);
        Ok(())
    }

    /// Send `QUIT`, close the socket and transition to `Closed`.
    ///
    /// Safe to call after a failed command — the QUIT reply is read
    /// best-effort so a wedged server cannot leak the descriptor.
    pub async fn disconnect(&mut self) -> FtpResult<()> {
        if self.state != SessionState::Connected {
            return Err(FtpError::state("Client already disconnected"));
        }
        if let Some(codec) = self.codec.as_mut() {
            let _ = codec.execute("QUIT").await;
        }
        self.codec = None;
        self.state = SessionState::Closed;
        log::info!("session {} disconnected", self.id);
        Ok(())
    }

    // ─── PWD / CWD ───────────────────────────────────────────────

    /// Query the server's working directory (`PWD`); the path is quoted
    /// between the first and second double-quote of the reply.
    pub async fn pwd(&mut self) -> FtpResult<String> {
        let resp = self.codec_mut()?.execute("PWD").await?;
        parse_quoted(&resp.text()).ok_or_else(|| {
            FtpError::protocol(format!("Cannot parse PWD reply: {}", resp.text()))
                .with_code(resp.code)
        })
    }

    /// Change into `path` (`CWD`) and remember the new directory.
    ///
    /// Requires reply `250`; the directory name is the trailing token of
    /// the reply line (a trailing `.` is stripped).
    pub async fn cwd(&mut self, path: &str) -> FtpResult<String> {
        let resp = self
            .codec_mut()?
            .expect(&format!("CWD {}", path), 250)
            .await?;
        let dir = parse_cwd_reply(&resp.text()).ok_or_else(|| {
            FtpError::protocol(format!("Cannot parse CWD reply: {}", resp.text()))
                .with_code(resp.code)
        })?;
        self.current_directory = dir.clone();
        Ok(dir)
    }

    // ─── Accessors / plumbing ───────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Working directory as remembered from the last successful `cwd`.
    pub fn current_directory(&self) -> &str {
        &self.current_directory
    }

    pub fn server_banner(&self) -> Option<&str> {
        self.server_banner.as_deref()
    }

    pub(crate) fn codec_mut(&mut self) -> FtpResult<&mut FtpCodec> {
        if self.state != SessionState::Connected {
            return Err(FtpError::state("Client is not connected"));
        }
        self.codec
            .as_mut()
            .ok_or_else(|| FtpError::state("Client is not connected"))
    }

    /// Negotiate PASV and connect the ephemeral data socket.
    ///
    /// Must be called immediately before the command that uses the
    /// channel (STOR/RETR/LIST/NLST) — the server ties its passive
    /// listener to the next command.
    pub(crate) async fn open_data_channel(&mut self) -> FtpResult<TcpStream> {
        let dur = Duration::from_secs(self.config.data_timeout_sec);
        let codec = self.codec_mut()?;
        transfer::open_pasv(codec, dur).await
    }
}

// ─── Reply parsing helpers ───────────────────────────────────────────

/// Extract the text between the first and second `"` of a reply, as used
/// by PWD and MKD (`257 "/some/path" created`).
pub(crate) fn parse_quoted(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let end = text[start + 1..].find('"')?;
    Some(text[start + 1..start + 1 + end].to_string())
}

/// Extract the directory from a CWD reply's trailing token, stripping a
/// trailing period (`250 Directory changed to /test.` → `/test`).
fn parse_cwd_reply(text: &str) -> Option<String> {
    let token = text.split_whitespace().last()?;
    let dir = token.strip_suffix('.').unwrap_or(token);
    if dir.is_empty() {
        None
    } else {
        Some(dir.to_string())
    }
}
