//! Shared helpers for integration tests: a canned HTTP responder bound to a
//! loopback port, and sample payloads.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const STATION: &str = "031520061";

pub const WFS_BODY: &str = r#"{"type":"FeatureCollection","totalFeatures":1,"features":[
  {"type":"Feature","properties":{"kenn":"031520061","name":"Musterstadt",
   "start_measure":"2024-01-01T11:00:00Z","end_measure":"2024-01-01T12:00:00Z",
   "value":0.082,"unit":"µSv/h"}}]}"#;

pub const WFS_EMPTY: &str = r#"{"type":"FeatureCollection","totalFeatures":0,"features":[]}"#;

/// Latest-value layer the station page fills its value element from.
pub const PAGE_DATA_BODY: &str = r#"{"type":"FeatureCollection","totalFeatures":1,"features":[
  {"type":"Feature","properties":{"kenn":"031520061","name":"Musterstadt",
   "end_measure":"2024-01-01T12:00:00Z","value":0.091,"unit":"µSv/h"}}]}"#;

pub fn page_body(value: &str) -> String {
    format!(
        "<html><body><h1>Musterstadt</h1>\
         <p class=\"aktmw\">Aktueller Messwert: <strong class=\"js-decimal\">{}</strong> µSv/h</p>\
         </body></html>",
        value
    )
}

/// Loopback HTTP server answering each connection with the next canned
/// response. The last response repeats once the list is exhausted.
pub struct Responder {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl Responder {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub async fn serve(responses: Vec<(u16, String)>) -> Responder {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let (status, body) = responses
                .get(n)
                .or_else(|| responses.last())
                .cloned()
                .unwrap_or((500, String::new()));

            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: text/plain; charset=utf-8\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Responder {
        base_url: format!("http://{}/ows", addr),
        hits,
    }
}

/// Loopback server that accepts connections and never answers.
pub async fn serve_silent() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{}/ows", addr)
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}
