//! Scripted HTTP transport.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::request::{ApiRequest, HttpMethod};
use crate::transport::{ApiResponse, HttpTransport};
use crate::{KioskPayError, Result};

/// One scripted reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    outcome: std::result::Result<ApiResponse, KioskPayError>,
    delay: Option<Duration>,
}

impl MockReply {
    /// Reply with `status` and a JSON (or any text) body.
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self::bytes(status, body.into().into_bytes())
    }

    /// Reply with raw bytes.
    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            outcome: Ok(ApiResponse::new(status, body)),
            delay: None,
        }
    }

    /// Fail in transit with `err`.
    pub fn fail(err: KioskPayError) -> Self {
        Self {
            outcome: Err(err),
            delay: None,
        }
    }

    /// Hold the reply back for `delay` (tokio time, so pausable).
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct Route {
    method: HttpMethod,
    path: String,
    replies: VecDeque<MockReply>,
}

/// [`HttpTransport`] answering from scripted routes.
///
/// A route matches on method plus either the full path (query included) or
/// the path without its query. Routes with several replies hand them out in
/// order and keep repeating the last one. Unmatched requests get a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `method path` with `reply`.
    pub fn on(&self, method: HttpMethod, path: &str, reply: MockReply) {
        self.on_sequence(method, path, vec![reply]);
    }

    /// Answer `method path` with `replies` in order; the last one repeats.
    pub fn on_sequence(&self, method: HttpMethod, path: &str, replies: Vec<MockReply>) {
        let mut routes = self.routes.lock().unwrap();
        routes.retain(|r| !(r.method == method && r.path == path));
        routes.push(Route {
            method,
            path: path.to_string(),
            replies: replies.into(),
        });
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests received for `method path` (query ignored).
    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && strip_query(&r.path) == path)
            .count()
    }

    /// Most recent request, if any.
    pub fn last_request(&self) -> Option<ApiRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn next_reply(&self, request: &ApiRequest) -> MockReply {
        let mut routes = self.routes.lock().unwrap();
        let index = routes
            .iter()
            .position(|r| r.method == request.method && r.path == request.path)
            .or_else(|| {
                routes.iter().position(|r| {
                    r.method == request.method && r.path == strip_query(&request.path)
                })
            });

        let Some(index) = index else {
            return MockReply::json(
                404,
                format!(
                    r#"{{"message":"no mock for {} {}"}}"#,
                    request.method.as_str(),
                    request.path
                ),
            );
        };
        let route = &mut routes[index];
        if route.replies.len() > 1 {
            route.replies.pop_front().unwrap()
        } else {
            route
                .replies
                .front()
                .cloned()
                .unwrap_or_else(|| MockReply::json(404, "{}"))
        }
    }
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.next_reply(&request);
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.outcome
    }
}
