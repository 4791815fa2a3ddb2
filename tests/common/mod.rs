//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use image_proxy::config::ProxyConfig;
use image_proxy::http::HttpServer;
use image_proxy::lifecycle::Shutdown;

/// Recognizable fake image payload; the proxy never decodes bodies.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-payload-for-tests";

/// A canned origin response.
pub struct OriginResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    /// Override for the Content-Length header; defaults to the body size.
    pub declared_length: Option<u64>,
    /// Send the body chunked with no Content-Length header.
    pub chunked: bool,
}

impl Default for OriginResponse {
    fn default() -> Self {
        Self {
            status: 200,
            content_type: "image/png".to_string(),
            body: PNG_BYTES.to_vec(),
            declared_length: None,
            chunked: false,
        }
    }
}

/// Start a programmable mock origin server on a raw TCP socket.
pub async fn start_origin<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OriginResponse> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head before answering
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let response = f().await;
                        let status_text = match response.status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        if response.chunked {
                            let head = format!(
                                "HTTP/1.1 {}\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                                status_text, response.content_type
                            );
                            let _ = socket.write_all(head.as_bytes()).await;
                            for chunk in response.body.chunks(1024) {
                                let _ = socket
                                    .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                                    .await;
                                let _ = socket.write_all(chunk).await;
                                let _ = socket.write_all(b"\r\n").await;
                            }
                            let _ = socket.write_all(b"0\r\n\r\n").await;
                        } else {
                            let declared = response
                                .declared_length
                                .unwrap_or(response.body.len() as u64);
                            let head = format!(
                                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                                status_text, response.content_type, declared
                            );
                            let _ = socket.write_all(head.as_bytes()).await;
                            let _ = socket.write_all(&response.body).await;
                        }
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

/// Spawn the proxy on `addr` and hand back the shutdown coordinator.
pub async fn start_proxy(mut config: ProxyConfig, addr: SocketAddr) -> Shutdown {
    config.listener.bind_address = addr.to_string();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    // Give the server a moment to start accepting
    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown
}

/// A reqwest client that ignores environment proxies and connection reuse.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
