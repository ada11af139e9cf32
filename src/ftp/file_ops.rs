//! File transfers — upload (STOR) and download (RETR).
//!
//! Transfers stream in fixed-size chunks over a PASV data channel and
//! publish snapshots to `TRANSFER_PROGRESS` when a transfer id is given.

use crate::ftp::client::FtpSession;
use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::{TransferDirection, TransferProgress, TransferState};
use crate::ftp::TRANSFER_PROGRESS;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Chunk size for streaming transfers (64 KiB).
const DEFAULT_CHUNK: usize = 65_536;

impl FtpSession {
    // ─── UPLOAD (STOR) ───────────────────────────────────────────

    /// Upload a local file under its own file name into the current
    /// remote working directory. Returns the number of bytes sent.
    pub async fn upload(
        &mut self,
        local_path: &Path,
        transfer_id: Option<&str>,
    ) -> FtpResult<u64> {
        let remote_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                FtpError::io(format!(
                    "Local path has no file name: {}",
                    local_path.display()
                ))
            })?
            .to_string();

        let mut file = fs::File::open(local_path).await?;

        let mut data = self.open_data_channel().await?;
        let resp = self
            .codec_mut()?
            .execute(&format!("STOR {}", remote_name))
            .await?;
        if resp.code != 150 {
            return Err(FtpError::protocol(resp.text()).with_code(resp.code));
        }

        let tid = transfer_id.unwrap_or("").to_string();
        let transferred = match self.send_chunks(&mut file, &mut data, &tid, &remote_name).await {
            Ok(n) => n,
            Err(e) => {
                self.fail_progress(&tid);
                return Err(e);
            }
        };
        drop(data);

        let done = match self.codec_mut() {
            Ok(codec) => codec.read_response().await,
            Err(e) => Err(e),
        };
        let done = match done {
            Ok(resp) => resp,
            Err(e) => {
                self.fail_progress(&tid);
                return Err(e);
            }
        };
        if done.code != 226 {
            self.fail_progress(&tid);
            return Err(FtpError::transfer(done.text()).with_code(done.code));
        }

        self.bytes_uploaded += transferred;
        self.complete_progress(&tid);
        Ok(transferred)
    }

    /// Stream the local file onto the data channel in fixed-size chunks.
    /// EOF on the data channel tells the server the file is complete.
    async fn send_chunks(
        &mut self,
        file: &mut fs::File,
        data: &mut TcpStream,
        tid: &str,
        remote_name: &str,
    ) -> FtpResult<u64> {
        let started = Instant::now();
        let mut transferred: u64 = 0;
        let mut buf = vec![0u8; DEFAULT_CHUNK];

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            data.write_all(&buf[..n]).await?;
            transferred += n as u64;
            self.update_progress(
                tid,
                remote_name,
                TransferDirection::Upload,
                transferred,
                &started,
            );
        }

        data.flush().await?;
        data.shutdown().await?;
        Ok(transferred)
    }

    // ─── DOWNLOAD (RETR) ─────────────────────────────────────────

    /// Download a remote file to `local_path`. Returns the number of
    /// bytes received.
    ///
    /// The final control reply is consumed but not validated — the data
    /// channel reaching EOF is the binding success signal; an unexpected
    /// completion code is only logged.
    pub async fn download(
        &mut self,
        remote_name: &str,
        local_path: &Path,
        transfer_id: Option<&str>,
    ) -> FtpResult<u64> {
        let mut data = self.open_data_channel().await?;
        let resp = self
            .codec_mut()?
            .execute(&format!("RETR {}", remote_name))
            .await?;
        if resp.code != 150 {
            return Err(FtpError::protocol(resp.text()).with_code(resp.code));
        }

        let mut file = fs::File::create(local_path).await?;

        let tid = transfer_id.unwrap_or("").to_string();
        let transferred = match self.recv_chunks(&mut file, &mut data, &tid, remote_name).await {
            Ok(n) => n,
            Err(e) => {
                self.fail_progress(&tid);
                return Err(e);
            }
        };
        drop(file);
        drop(data);

        let done = match self.codec_mut() {
            Ok(codec) => codec.read_response().await,
            Err(e) => Err(e),
        };
        let done = match done {
            Ok(resp) => resp,
            Err(e) => {
                self.fail_progress(&tid);
                return Err(e);
            }
        };
        if done.code != 226 {
            log::warn!(
                "RETR {} completed with reply {}: {}",
                remote_name,
                done.code,
                done.text()
            );
        }

        self.bytes_downloaded += transferred;
        self.complete_progress(&tid);
        Ok(transferred)
    }

    /// Drain the data channel into the local file in fixed-size chunks.
    async fn recv_chunks(
        &mut self,
        file: &mut fs::File,
        data: &mut TcpStream,
        tid: &str,
        remote_name: &str,
    ) -> FtpResult<u64> {
        let started = Instant::now();
        let mut transferred: u64 = 0;
        let mut buf = vec![0u8; DEFAULT_CHUNK];

        loop {
            let n = data.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
            transferred += n as u64;
            self.update_progress(
                tid,
                remote_name,
                TransferDirection::Download,
                transferred,
                &started,
            );
        }

        file.flush().await?;
        Ok(transferred)
    }

    // ─── Progress helpers ────────────────────────────────────────

    fn update_progress(
        &self,
        transfer_id: &str,
        file: &str,
        direction: TransferDirection,
        transferred: u64,
        started: &Instant,
    ) {
        if transfer_id.is_empty() {
            return;
        }
        let elapsed = started.elapsed().as_secs_f64().max(0.001);
        let progress = TransferProgress {
            transfer_id: transfer_id.to_string(),
            session_id: self.id.clone(),
            direction,
            file: file.to_string(),
            transferred_bytes: transferred,
            speed_bps: (transferred as f64 / elapsed) as u64,
            state: TransferState::InProgress,
        };
        if let Ok(mut map) = TRANSFER_PROGRESS.lock() {
            map.insert(transfer_id.to_string(), progress);
        }
    }

    fn complete_progress(&self, transfer_id: &str) {
        self.finish_progress(transfer_id, TransferState::Completed);
    }

    fn fail_progress(&self, transfer_id: &str) {
        self.finish_progress(transfer_id, TransferState::Failed);
    }

    fn finish_progress(&self, transfer_id: &str, state: TransferState) {
        if transfer_id.is_empty() {
            return;
        }
        if let Ok(mut map) = TRANSFER_PROGRESS.lock() {
            if let Some(p) = map.get_mut(transfer_id) {
                p.state = state;
            }
        }
    }
}
