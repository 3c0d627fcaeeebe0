//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use bypass::assets::StaticFiles;
use bypass::config::ProxyConfig;
use bypass::{HttpServer, Shutdown};

/// Start a mock upstream that answers every request with a fixed response.
/// Returns the address it listens on.
#[allow(dead_code)]
pub async fn start_mock_upstream(
    status_line: &'static str,
    headers: &'static [(&'static str, &'static str)],
    body: &'static [u8],
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        // Drain the request head before responding.
                        let mut buf = vec![0u8; 4096];
                        let mut seen = Vec::new();
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => break,
                                Ok(n) => {
                                    seen.extend_from_slice(&buf[..n]);
                                    if seen.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }

                        let mut response = format!("HTTP/1.1 {}\r\n", status_line);
                        for (name, value) in headers {
                            response.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        response.push_str(&format!(
                            "Content-Length: {}\r\nConnection: close\r\n\r\n",
                            body.len()
                        ));
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.write_all(body).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start the proxy on an ephemeral port with a config derived from defaults.
/// The external URL is pointed at the bound address so rewritten references
/// are checkable.
pub async fn spawn_proxy(mutate: impl FnOnce(&mut ProxyConfig)) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ProxyConfig::default();
    config.rewrite.external_url = format!("http://{}", addr);
    mutate(&mut config);

    let assets = Arc::new(
        StaticFiles::new(&config.static_files.public_dir, config.static_files.cache_static).await,
    );
    let server = HttpServer::new(Arc::new(config), assets).unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    // Keep the sender alive for the lifetime of the test process.
    std::mem::forget(shutdown);

    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    addr
}

/// Build a proxy request URL for `target`, encoding it the way the proxy's
/// own rewriter does.
#[allow(dead_code)]
pub fn proxy_url(proxy: SocketAddr, target: &str) -> String {
    let mut url = Url::parse(&format!("http://{}/p/", proxy)).unwrap();
    url.query_pairs_mut()
        .append_pair("u", &BASE64.encode(target));
    url.into()
}

/// Extract the original target URL from a rewritten reference.
#[allow(dead_code)]
pub fn decoded_target(routed: &str) -> String {
    let routed = Url::parse(routed).unwrap();
    let token = routed
        .query_pairs()
        .find(|(k, _)| k == "u")
        .expect("rewritten reference carries a u parameter")
        .1
        .into_owned();
    String::from_utf8(BASE64.decode(token.as_bytes()).unwrap()).unwrap()
}
