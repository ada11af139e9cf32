//! In-process scripted FTP server used by the integration tests.
//!
//! Speaks just enough of RFC 959 to exercise the client: login, PWD/CWD,
//! MKD/RMD, PASV with LIST/NLST/STOR/RETR, and QUIT, against an
//! in-memory filesystem shared across concurrent sessions.

// Each test binary compiles its own copy; not every binary uses every helper.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const USER: &str = "admin";
pub const PASSWORD: &str = "test";

const DATA_ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory remote filesystem: absolute paths only.
#[derive(Default)]
pub struct FakeFs {
    pub files: HashMap<String, Vec<u8>>,
    pub dirs: HashSet<String>,
    /// Paths whose STOR accepts the data but then reports failure.
    pub stor_failures: HashSet<String>,
}

impl FakeFs {
    pub fn new() -> Self {
        let mut fs = Self::default();
        fs.dirs.insert("/".to_string());
        fs
    }

    pub fn add_dir(&mut self, path: &str) -> &mut Self {
        self.dirs.insert(path.to_string());
        self
    }

    pub fn add_file(&mut self, path: &str, content: &[u8]) -> &mut Self {
        self.files.insert(path.to_string(), content.to_vec());
        self
    }

    pub fn fail_stor(&mut self, path: &str) -> &mut Self {
        self.stor_failures.insert(path.to_string());
        self
    }
}

pub struct FakeFtpServer {
    addr: SocketAddr,
    fs: Arc<Mutex<FakeFs>>,
    accept_task: JoinHandle<()>,
}

impl Drop for FakeFtpServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl FakeFtpServer {
    pub async fn start() -> Self {
        Self::start_with(FakeFs::new()).await
    }

    pub async fn start_with(fs: FakeFs) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let fs = Arc::new(Mutex::new(fs));
        let shared = fs.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                if let Ok((stream, _)) = listener.accept().await {
                    let fs = shared.clone();
                    tokio::spawn(async move {
                        let _ = handle_session(stream, fs).await;
                    });
                }
            }
        });
        Self {
            addr,
            fs,
            accept_task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.fs.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.fs.lock().unwrap().dirs.contains(path)
    }
}

// ─── Session handling ────────────────────────────────────────────────

async fn handle_session(stream: TcpStream, fs: Arc<Mutex<FakeFs>>) -> std::io::Result<()> {
    let (rd, mut wr) = stream.into_split();
    let mut reader = BufReader::new(rd);

    send(&mut wr, "220 FakeFTP server ready.").await?;

    let mut cwd = "/".to_string();
    let mut pending_user: Option<String> = None;
    let mut logged_in = false;
    let mut pasv: Option<TcpListener> = None;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(|c| c == '\r' || c == '\n');
        let (verb, arg) = match trimmed.split_once(' ') {
            Some((v, a)) => (v, a.trim()),
            None => (trimmed, ""),
        };

        match verb {
            "USER" => {
                if arg == USER {
                    pending_user = Some(arg.to_string());
                    send(&mut wr, "331 User name okay, need password.").await?;
                } else {
                    send(
                        &mut wr,
                        &format!("530 UserAccount missing or invalid for user [{}]", arg),
                    )
                    .await?;
                }
            }
            "PASS" => {
                if pending_user.is_some() && arg == PASSWORD {
                    logged_in = true;
                    send(&mut wr, "230 User logged in.").await?;
                } else {
                    send(&mut wr, "530 Not logged in.").await?;
                }
            }
            "QUIT" => {
                send(&mut wr, "221 Goodbye.").await?;
                break;
            }
            _ if !logged_in => {
                send(&mut wr, "530 Not logged in.").await?;
            }
            "PWD" => {
                send(&mut wr, &format!("257 \"{}\" is current directory.", cwd)).await?;
            }
            "CWD" => {
                let target = resolve(&cwd, arg);
                let exists = fs.lock().unwrap().dirs.contains(&target);
                if exists {
                    cwd = target;
                    send(&mut wr, &format!("250 Directory changed to {}.", cwd)).await?;
                } else {
                    send(&mut wr, &format!("550 [{}] does not exist.", target)).await?;
                }
            }
            "MKD" => {
                let target = resolve(&cwd, arg);
                let reply = {
                    let mut locked = fs.lock().unwrap();
                    if locked.dirs.contains(&target) || locked.files.contains_key(&target) {
                        format!("550 The path [{}] already exists.", target)
                    } else {
                        locked.dirs.insert(target.clone());
                        format!("257 \"{}\" created.", target)
                    }
                };
                send(&mut wr, &reply).await?;
            }
            "RMD" => {
                let target = resolve(&cwd, arg);
                let reply = {
                    let mut locked = fs.lock().unwrap();
                    if !locked.dirs.contains(&target) {
                        format!("550 [{}] does not exist.", target)
                    } else if dir_has_children(&locked, &target) {
                        format!("550 The [{}] directory is not empty.", target)
                    } else {
                        locked.dirs.remove(&target);
                        format!("250 \"{}\" removed.", target)
                    }
                };
                send(&mut wr, &reply).await?;
            }
            "PASV" => {
                let listener = TcpListener::bind("127.0.0.1:0").await?;
                let port = listener.local_addr()?.port();
                pasv = Some(listener);
                send(
                    &mut wr,
                    &format!(
                        "227 Entering Passive Mode (127,0,0,1,{},{}).",
                        port / 256,
                        port % 256
                    ),
                )
                .await?;
            }
            "LIST" | "NLST" => {
                let listener = match pasv.take() {
                    Some(l) => l,
                    None => {
                        send(&mut wr, "425 Use PASV first.").await?;
                        continue;
                    }
                };
                let target = resolve(&cwd, arg);
                let body = {
                    let locked = fs.lock().unwrap();
                    listing(&locked, &target, verb == "NLST")
                };
                send(&mut wr, "150 Opening data connection.").await?;
                let (mut data, _) = timeout(DATA_ACCEPT_TIMEOUT, listener.accept()).await??;
                data.write_all(body.as_bytes()).await?;
                data.shutdown().await?;
                drop(data);
                send(&mut wr, "226 Transfer complete.").await?;
            }
            "STOR" => {
                let listener = match pasv.take() {
                    Some(l) => l,
                    None => {
                        send(&mut wr, "425 Use PASV first.").await?;
                        continue;
                    }
                };
                let target = resolve(&cwd, arg);
                send(&mut wr, "150 Opening data connection.").await?;
                let (mut data, _) = timeout(DATA_ACCEPT_TIMEOUT, listener.accept()).await??;
                let mut content = Vec::new();
                data.read_to_end(&mut content).await?;
                drop(data);
                let rejected = fs.lock().unwrap().stor_failures.contains(&target);
                if rejected {
                    send(
                        &mut wr,
                        &format!("552 [{}] exceeded storage allocation.", target),
                    )
                    .await?;
                } else {
                    fs.lock().unwrap().files.insert(target, content);
                    send(&mut wr, "226 Transfer complete.").await?;
                }
            }
            "RETR" => {
                let listener = pasv.take();
                let target = resolve(&cwd, arg);
                let content = fs.lock().unwrap().files.get(&target).cloned();
                match (content, listener) {
                    (Some(bytes), Some(l)) => {
                        send(&mut wr, "150 Opening data connection.").await?;
                        let (mut data, _) = timeout(DATA_ACCEPT_TIMEOUT, l.accept()).await??;
                        data.write_all(&bytes).await?;
                        data.shutdown().await?;
                        drop(data);
                        send(&mut wr, "226 Transfer complete.").await?;
                    }
                    (None, _) => {
                        send(&mut wr, &format!("550 [{}] does not exist.", target)).await?;
                    }
                    (_, None) => {
                        send(&mut wr, "425 Use PASV first.").await?;
                    }
                }
            }
            _ => {
                send(&mut wr, "502 Command not implemented.").await?;
            }
        }
    }
    Ok(())
}

async fn send(wr: &mut OwnedWriteHalf, reply: &str) -> std::io::Result<()> {
    wr.write_all(format!("{}\r\n", reply).as_bytes()).await
}

// ─── Path helpers ────────────────────────────────────────────────────

/// Resolve `arg` against `cwd` and normalize `.` / `..` segments.
fn resolve(cwd: &str, arg: &str) -> String {
    if arg.is_empty() {
        return cwd.to_string();
    }
    let joined = if arg.starts_with('/') {
        arg.to_string()
    } else if cwd.ends_with('/') {
        format!("{}{}", cwd, arg)
    } else {
        format!("{}/{}", cwd, arg)
    };

    let mut parts: Vec<&str> = Vec::new();
    for seg in joined.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

fn child_name<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    let prefix = if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    };
    let rest = path.strip_prefix(&prefix)?;
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}

fn dir_has_children(fs: &FakeFs, dir: &str) -> bool {
    fs.files.keys().any(|p| child_name(dir, p).is_some())
        || fs.dirs.iter().any(|p| child_name(dir, p).is_some())
}

fn listing(fs: &FakeFs, dir: &str, names_only: bool) -> String {
    let mut lines = Vec::new();
    for d in &fs.dirs {
        if let Some(name) = child_name(dir, d) {
            if names_only {
                lines.push(name.to_string());
            } else {
                lines.push(format!(
                    "drwxr-xr-x   2 owner group         0 Jan 01 00:00 {}",
                    name
                ));
            }
        }
    }
    for (p, content) in &fs.files {
        if let Some(name) = child_name(dir, p) {
            if names_only {
                lines.push(name.to_string());
            } else {
                lines.push(format!(
                    "-rw-r--r--   1 owner group  {:8} Jan 01 00:00 {}",
                    content.len(),
                    name
                ));
            }
        }
    }
    lines.sort();
    let mut body = lines.join("\r\n");
    if !body.is_empty() {
        body.push_str("\r\n");
    }
    body
}
