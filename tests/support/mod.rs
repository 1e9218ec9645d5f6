//! Scripted stand-in for the identity and upload services, shared by the unit
//! tests (as `crate::test_support`) and the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::Endpoints;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

#[derive(Default)]
struct Route {
    responses: VecDeque<(u16, String)>,
    delay: Duration,
}

#[derive(Clone, Default)]
struct Shared {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct FakeServer {
    pub base_url: String,
    shared: Shared,
}

impl FakeServer {
    /// Serve canned responses per path. Repeated hits on a path walk its
    /// response list and then keep answering with the last entry.
    pub async fn start(routes: Vec<(&str, Vec<(u16, &str)>)>) -> Self {
        let shared = Shared::default();
        {
            let mut table = shared.routes.lock().unwrap();
            for (path, responses) in routes {
                table.insert(
                    path.to_string(),
                    Route {
                        responses: responses
                            .into_iter()
                            .map(|(status, body)| (status, body.to_string()))
                            .collect(),
                        delay: Duration::ZERO,
                    },
                );
            }
        }

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let app = Router::new().fallback(respond).with_state(shared.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url, shared }
    }

    /// Hold every response on `path` back for `delay`.
    pub fn delay(&self, path: &str, delay: Duration) {
        let mut table = self.shared.routes.lock().unwrap();
        table.entry(path.to_string()).or_default().delay = delay;
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Endpoints pointing every service at this server.
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            auth_url: self.url("/signin"),
            refresh_url: self.url("/token"),
            upload_url: self.url("/upload"),
            api_key: "test-key".to_string(),
            request_timeout_secs: 10,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path() == path).count()
    }
}

/// An http URL on a local port nothing listens on.
pub fn unreachable_url(path: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, path)
}

async fn respond(
    State(shared): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    shared.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        target,
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    });

    let (delay, status, body) = {
        let mut table = shared.routes.lock().unwrap();
        match table.get_mut(uri.path()) {
            Some(route) => {
                let (status, body) = if route.responses.len() > 1 {
                    route.responses.pop_front()
                } else {
                    route.responses.front().cloned()
                }
                .unwrap_or((404, r#"{"message":"not found"}"#.to_string()));
                (route.delay, status, body)
            }
            None => (Duration::ZERO, 404, r#"{"message":"not found"}"#.to_string()),
        }
    };

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
}
