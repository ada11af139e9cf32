//! Directory operations — listings, mkdir, rmdir.

use crate::ftp::client::{parse_quoted, FtpSession};
use crate::ftp::error::{FtpError, FtpResult};
use tokio::io::{AsyncBufReadExt, BufReader};

impl FtpSession {
    // ─── LIST / NLST ─────────────────────────────────────────────

    /// Retrieve a raw directory listing for `path`.
    ///
    /// Issues `NLST` (names only) or `LIST` (full lines) over a fresh
    /// PASV data channel and returns the newline-delimited entries in
    /// the order the server sent them. The final control reply is
    /// consumed to keep the channel consistent for the next command.
    pub async fn list_entries(&mut self, path: &str, names_only: bool) -> FtpResult<Vec<String>> {
        let data = self.open_data_channel().await?;

        let verb = if names_only { "NLST" } else { "LIST" };
        let cmd = if path.is_empty() {
            verb.to_string()
        } else {
            format!("{} {}", verb, path)
        };

        let resp = self.codec_mut()?.execute(&cmd).await?;
        if !resp.is_success() {
            return Err(FtpError::protocol(resp.text()).with_code(resp.code));
        }

        let mut lines = Vec::new();
        let mut reader = BufReader::new(data);
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break;
            }
            lines.push(line.trim_end_matches(|c| c == '\r' || c == '\n').to_string());
        }

        let done = self.codec_mut()?.read_response().await?;
        if !done.is_success() {
            log::warn!("{} finished with reply {}: {}", verb, done.code, done.text());
        }

        Ok(lines)
    }

    // ─── MKD ─────────────────────────────────────────────────────

    /// Create a directory; requires reply `257` and returns the created
    /// path from the quoted part of the reply (`257 "/new/dir" created`).
    pub async fn mkdir(&mut self, name: &str) -> FtpResult<String> {
        let resp = self
            .codec_mut()?
            .expect(&format!("MKD {}", name), 257)
            .await?;
        Ok(parse_quoted(&resp.text()).unwrap_or_else(|| name.to_string()))
    }

    // ─── RMD ─────────────────────────────────────────────────────

    /// Remove a directory; requires reply `250`.
    ///
    /// "Not empty" and "does not exist" come back as protocol errors
    /// carrying the server's literal 550 text — the text is the only
    /// structured detail FTP offers here.
    pub async fn rmdir(&mut self, name: &str) -> FtpResult<()> {
        self.codec_mut()?
            .expect(&format!("RMD {}", name), 250)
            .await?;
        Ok(())
    }
}
