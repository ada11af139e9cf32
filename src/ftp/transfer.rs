//! Passive-mode data-channel negotiation (RFC 959 PASV).
//!
//! The server opens a listening port and announces it in the 227 reply as
//! `(h1,h2,h3,h4,p1,p2)`; the client connects to `h1.h2.h3.h4` on port
//! `p1*256 + p2`. Each channel carries exactly one transfer and is never
//! reused across commands.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::protocol::FtpCodec;
use lazy_static::lazy_static;
use regex::Regex;
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

lazy_static! {
    static ref PASV_ADDR: Regex = Regex::new(r"\((\d+),(\d+),(\d+),(\d+),(\d+),(\d+)\)").unwrap();
}

/// Issue `PASV`, parse the 227 reply, connect to the returned address.
pub async fn open_pasv(codec: &mut FtpCodec, data_timeout: Duration) -> FtpResult<TcpStream> {
    let resp = codec.expect("PASV", 227).await?;
    let addr = parse_pasv_reply(&resp.text())?;
    let tcp = timeout(data_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| FtpError::timeout(format!("Data connect to {} timed out", addr)))?
        .map_err(|e| FtpError::io(format!("Data connect to {}: {}", addr, e)))?;
    Ok(tcp)
}

/// Parse `(h1,h2,h3,h4,p1,p2)` out of a 227 reply's text.
pub fn parse_pasv_reply(text: &str) -> FtpResult<SocketAddr> {
    let caps = PASV_ADDR
        .captures(text)
        .ok_or_else(|| FtpError::protocol(format!("Cannot parse PASV reply: {}", text)))?;

    let nums: Vec<u8> = (1..=6)
        .map(|i| {
            caps[i]
                .parse::<u8>()
                .map_err(|_| FtpError::protocol(format!("PASV field out of range: {}", text)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let ip = IpAddr::from([nums[0], nums[1], nums[2], nums[3]]);
    let port = (nums[4] as u16) * 256 + (nums[5] as u16);
    Ok(SocketAddr::new(ip, port))
}
