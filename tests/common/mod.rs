#![allow(dead_code)]

use lantern::config::Config;
use lantern::server::Server;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static NEXT_DIR: AtomicU64 = AtomicU64::new(0);

/// A scratch directory under the OS temp dir, removed on drop.
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new(label: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "lantern-{}-{}-{}",
            label,
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, content: &[u8]) {
        std::fs::write(self.path.join(name), content).unwrap();
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// A server running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub log_path: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    /// Serves `root/www`, logging to `root/access.log`.
    pub async fn start(root: &TestDir, tweak: impl FnOnce(&mut Config)) -> Self {
        let www = root.path().join("www");
        std::fs::create_dir_all(&www).unwrap();

        let mut cfg = Config::default();
        cfg.server.listen_addr = "127.0.0.1:0".to_string();
        cfg.server.drain_timeout_secs = 2;
        cfg.static_files.root = www;
        cfg.log.path = root.path().join("access.log");
        tweak(&mut cfg);

        let server = Server::bind(&cfg).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            log_path: cfg.log.path,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Triggers shutdown and waits for the server to finish.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap(),
            None => Ok(()),
        }
    }

    pub fn log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log_path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

/// Sends `request` and reads until the server closes the connection.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    response
}

pub async fn get(addr: SocketAddr, path: &str) -> Vec<u8> {
    exchange(addr, format!("GET /{path} HTTP/1.1\r\n\r\n").as_bytes()).await
}

/// Splits a raw response into head (terminator excluded) and body.
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let pos = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    (
        String::from_utf8(raw[..pos].to_vec()).unwrap(),
        raw[pos + 4..].to_vec(),
    )
}

pub fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.split("\r\n").skip(1).find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

/// Checks one access log line: path, size, and two 4-decimal floats.
pub fn assert_log_line(line: &str) {
    let fields: Vec<&str> = line.split('\t').collect();
    assert_eq!(fields.len(), 4, "bad line: {line:?}");
    assert!(!fields[0].is_empty());
    fields[1].parse::<u64>().unwrap();
    for float in &fields[2..] {
        let (int, frac) = float.split_once('.').expect("missing decimal point");
        int.parse::<u64>().unwrap();
        assert_eq!(frac.len(), 4, "bad precision: {line:?}");
        assert!(frac.bytes().all(|b| b.is_ascii_digit()));
    }
}
