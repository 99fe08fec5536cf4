//! In-process HTTP stub for exercising the gateway end to end.
//!
//! Speaks just enough HTTP/1.1 for reqwest: one request per connection,
//! `Content-Length` bodies, `Connection: close` replies.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sansi_core::{Role, UserProfile};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl StubResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn raw(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body should be JSON")
    }
}

type Routes = HashMap<(String, String), StubResponse>;

pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Answer every request with the same response.
    pub async fn respond_with(response: StubResponse) -> Self {
        Self::start(Routes::new(), Some(response)).await
    }

    /// Answer `(method, path)` pairs; anything else gets a 404.
    pub async fn routes(routes: Vec<(&str, &str, StubResponse)>) -> Self {
        let routes = routes
            .into_iter()
            .map(|(method, path, response)| ((method.to_string(), path.to_string()), response))
            .collect();
        Self::start(routes, None).await
    }

    async fn start(routes: Routes, fallback: Option<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let routes = Arc::new(routes);
        let fallback = Arc::new(fallback);
        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = routes.clone();
                let fallback = fallback.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    handle_connection(stream, &routes, (*fallback).as_ref(), &recorded).await;
                });
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    /// Root URL to hand to `ApiClient::new`.
    pub fn root(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    routes: &Routes,
    fallback: Option<&StubResponse>,
    recorded: &Mutex<Vec<RecordedRequest>>,
) {
    let request = match read_request(&mut stream).await {
        Some(request) => request,
        None => return,
    };

    let key = (request.method.clone(), request.path.clone());
    let response = routes
        .get(&key)
        .or(fallback)
        .cloned()
        .unwrap_or_else(|| StubResponse::json(404, serde_json::json!({ "message": "no route" })));
    recorded.lock().unwrap().push(request);

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let reply = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ===== Fixtures =====

pub fn profile() -> UserProfile {
    UserProfile {
        id: 41,
        email: "evaluador@ohsansi.bo".to_string(),
        full_name: "Carla Mendez".to_string(),
        role: Role::Evaluator,
    }
}

/// A compact token whose payload carries `exp`.
pub fn token_expiring_at(exp: i64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"41","exp":{}}}"#, exp));
    format!("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{}.c2lnbmF0dXJl", payload)
}

/// A root URL nothing is listening on.
pub async fn unreachable_root() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
