//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use resilient_client::config::ClientConfig;
use resilient_client::{HttpServer, Shutdown};

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Start a raw-TCP upstream whose every answer comes from `f`.
///
/// Returns the bound address and a counter of requests served.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let n = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;

                let (status, body) = f(n).await;
                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

/// Upstream answering with the given statuses in order, then 200 forever.
pub async fn start_sequence_backend(statuses: Vec<u16>) -> (SocketAddr, Arc<AtomicUsize>) {
    let statuses = Arc::new(statuses);
    start_programmable_backend(move |n| {
        let statuses = statuses.clone();
        async move {
            match statuses.get(n) {
                Some(&status) if status != 200 => (status, "upstream failure".to_string()),
                _ => (200, r#"{"city": "Moscow", "value": 22}"#.to_string()),
            }
        }
    })
    .await
}

/// A config pointed at `upstream` with test-friendly backoff.
pub fn config_for(upstream: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstream.url = format!("http://{}/weather", upstream);
    config.retries.base_delay_ms = 10;
    config.timeouts.upstream_secs = 2;
    config.observability.metrics_enabled = false;
    config
}

/// Start the wrapping server; returns its address and the shutdown handle.
pub async fn start_client(config: ClientConfig) -> (SocketAddr, Shutdown) {
    let listener = tokio::net::TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    (addr, shutdown)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
