//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use dice_pipeline::config::{EngineConfig, GatewayConfig};
use dice_pipeline::dice::DieSpecification;
use dice_pipeline::http::{spec_api, HttpServer};
use dice_pipeline::lifecycle::startup::{engine_app, gateway_app};
use dice_pipeline::lifecycle::Shutdown;
use dice_pipeline::specs::SpecificationStore;

/// A raw-TCP upstream that answers with whatever the handler returns.
pub struct MockUpstream {
    pub addr: SocketAddr,
    heads: Arc<Mutex<Vec<String>>>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request heads received so far (request line plus headers, lowercased).
    pub fn requests(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }
}

/// Start a programmable mock upstream. The handler sees the request head.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockUpstream
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let heads = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let recorded = heads.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]).to_lowercase();
                        recorded.lock().unwrap().push(head.clone());

                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            504 => "504 Gateway Timeout",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, heads }
}

/// An address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Serve `routes` on an ephemeral port until `shutdown` fires.
pub async fn spawn_server(name: &'static str, routes: Router, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(name, routes, Duration::from_secs(30));
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });
    addr
}

pub fn test_dice() -> Vec<DieSpecification> {
    vec![
        DieSpecification::new("fair", vec![1, 2, 3, 4, 5, 6], 0.0).unwrap(),
        DieSpecification::new("risky", vec![2, 3, 4, 5, 6, 7], 0.1).unwrap(),
        DieSpecification::new("cursed", vec![1, 2, 3], 1.0).unwrap(),
    ]
}

pub async fn spawn_store(specs: Vec<DieSpecification>, shutdown: &Shutdown) -> SocketAddr {
    let store = Arc::new(SpecificationStore::new(specs));
    spawn_server("spec-store", spec_api::routes(store), shutdown).await
}

pub async fn spawn_engine(config: EngineConfig, shutdown: &Shutdown) -> SocketAddr {
    spawn_server("engine", engine_app(&config).unwrap(), shutdown).await
}

pub async fn spawn_gateway(config: GatewayConfig, shutdown: &Shutdown) -> SocketAddr {
    spawn_server("gateway", gateway_app(&config).unwrap(), shutdown).await
}

/// Store, engine and gateway wired together on ephemeral ports.
pub struct Pipeline {
    pub store: SocketAddr,
    pub engine: SocketAddr,
    pub gateway: SocketAddr,
    pub shutdown: Shutdown,
}

impl Pipeline {
    pub async fn start(max_trial_delay_ms: u64) -> Self {
        let shutdown = Shutdown::new();
        let store = spawn_store(test_dice(), &shutdown).await;
        let engine = spawn_engine(
            EngineConfig {
                spec_store_url: format!("http://{}", store),
                max_trial_delay_ms,
                ..EngineConfig::default()
            },
            &shutdown,
        )
        .await;
        let gateway = spawn_gateway(
            GatewayConfig {
                engine_url: format!("http://{}", engine),
                catalog_url: format!("http://{}", store),
                ..GatewayConfig::default()
            },
            &shutdown,
        )
        .await;

        Self {
            store,
            engine,
            gateway,
            shutdown,
        }
    }

    pub fn gateway_url(&self, path_and_query: &str) -> String {
        format!("http://{}{}", self.gateway, path_and_query)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
