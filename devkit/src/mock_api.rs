/*!
Mock pools API served over loopback HTTP

Serves a scripted list of pages on an ephemeral port and records every
request it sees, so the real reqwest client can be tested end to end.
Page `N` of a request maps to the `N`th scripted entry; anything past the
script gets a 404.
*/

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

/// One scripted response
#[derive(Debug, Clone)]
pub struct MockPage {
    pub status: u16,
    pub body: String,
    pub delay: Option<Duration>,
}

impl MockPage {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    /// Hold the response back before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// What the client sent
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub account_id: String,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct MockState {
    pages: Mutex<Vec<MockPage>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    per_page: Option<u32>,
}

pub struct MockPoolsApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockPoolsApi {
    /// Bind on 127.0.0.1 and start serving the given pages
    pub async fn start(pages: Vec<MockPage>) -> Result<Self> {
        let state = Arc::new(MockState {
            pages: Mutex::new(pages),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/accounts/{account_id}/load_balancers/pools", get(list_pools))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                debug!("mock API stopped: {}", e);
            }
        });

        debug!("mock API listening on {}", addr);
        Ok(Self { addr, state, server })
    }

    /// Base URL to put in `ApiConfig::base_url`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Replace the script for subsequent requests
    pub fn set_pages(&self, pages: Vec<MockPage>) {
        *self.state.pages.lock() = pages;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().len()
    }
}

impl Drop for MockPoolsApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn list_pools(
    State(state): State<Arc<MockState>>,
    Path(account_id): Path<String>,
    Query(query): Query<PageQuery>,
    headers: HeaderMap,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.requests.lock().push(RecordedRequest {
        account_id,
        page: query.page,
        per_page: query.per_page,
        authorization,
    });

    let index = query.page.unwrap_or(1).saturating_sub(1) as usize;
    let scripted = state.pages.lock().get(index).cloned();

    let Some(page) = scripted else {
        return (StatusCode::NOT_FOUND, "no such page").into_response();
    };

    if let Some(delay) = page.delay {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], page.body).into_response()
}
