//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use circuit_balancer::config::{BalancerConfig, UpstreamList};
use circuit_balancer::{HttpServer, Shutdown};

/// Raw response written by a mock upstream. `head` holds extra header lines.
pub struct Reply {
    pub status: u16,
    pub head: String,
    pub body: String,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            head: String::new(),
            body: body.into(),
        }
    }

    fn render(&self) -> String {
        let reason = match self.status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            _ => "Unknown",
        };
        if self.head.to_ascii_lowercase().contains("transfer-encoding: chunked") {
            format!(
                "HTTP/1.1 {} {}\r\n{}Connection: close\r\n\r\n{:x}\r\n{}\r\n0\r\n\r\n",
                self.status,
                reason,
                self.head,
                self.body.len(),
                self.body
            )
        } else {
            format!(
                "HTTP/1.1 {} {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                self.status,
                reason,
                self.head,
                self.body.len(),
                self.body
            )
        }
    }
}

/// Start a mock upstream. `f` receives the raw request head (request line + headers).
pub async fn start_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let head = read_head(&mut socket).await;
                let reply = f(head).await;
                let _ = socket.write_all(reply.render().as_bytes()).await;
                let _ = socket.shutdown().await;
                tokio::time::sleep(Duration::from_millis(10)).await;
            });
        }
    });

    addr
}

/// Start a mock upstream with a fixed reply on every path.
pub async fn start_fixed_backend(status: u16, body: &'static str) -> SocketAddr {
    start_backend(move |_| async move { Reply::new(status, body) }).await
}

/// Start a mock upstream that sends its head at once, then the body one byte per `gap`.
pub async fn start_trickling_backend(body: &'static [u8], gap: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                if socket.write_all(head.as_bytes()).await.is_err() {
                    return;
                }
                for byte in body {
                    tokio::time::sleep(gap).await;
                    if socket.write_all(&[*byte]).await.is_err() {
                        return;
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn read_head(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    let text = String::from_utf8_lossy(&buf);
    text.split("\r\n\r\n").next().unwrap_or_default().to_string()
}

/// Test config: given upstreams, prober off, generous timeouts for loopback.
pub fn config_for(upstreams: &[SocketAddr]) -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.upstreams = UpstreamList(upstreams.iter().map(|a| format!("http://{}", a)).collect());
    config.health_check.enabled = false;
    config.timeouts.connect_ms = 500;
    config.timeouts.read_ms = 1_000;
    config
}

/// Start the balancer on an ephemeral port.
pub async fn start_proxy(config: BalancerConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
