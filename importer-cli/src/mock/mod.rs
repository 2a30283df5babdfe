//! In-memory stand-in for the customer/account API
//!
//! Implements the same wire contract as the real service: bearer-authenticated
//! `POST /customers`, `POST /accounts` and `POST /customer-accounts`, plus a
//! `GET /stats` endpoint for inspection. Customers and accounts are upserted on
//! their natural key and links are deduplicated, so repeated imports behave
//! like they would against the database backend.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::models::{AccountRequest, CustomerAccountLinkRequest, CustomerRequest, IdResponse};

#[derive(Debug)]
struct MockState {
    customers: HashMap<String, i64>,
    accounts: HashMap<String, i64>,
    links: HashSet<CustomerAccountLinkRequest>,
    next_id: i64,
    /// Natural keys (or `customer_id-account_id` for links) in arrival order
    received: Vec<String>,
    /// Keys answered with a 500
    fail_on: HashSet<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            customers: HashMap::new(),
            accounts: HashMap::new(),
            links: HashSet::new(),
            next_id: 1,
            received: Vec::new(),
            fail_on: HashSet::new(),
        }
    }
}

impl MockState {
    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Record counts reported by `GET /stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockStats {
    pub customers: usize,
    pub accounts: usize,
    pub links: usize,
}

/// Shared handle to the mock server state
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for these keys with HTTP 500
    pub fn fail_on<I, S>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().fail_on.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/customers", post(create_customer))
            .route("/accounts", post(create_account))
            .route("/customer-accounts", post(create_link))
            .route("/stats", get(stats))
            .with_state(self.clone())
    }

    pub fn stats(&self) -> MockStats {
        let state = self.lock();
        MockStats {
            customers: state.customers.len(),
            accounts: state.accounts.len(),
            links: state.links.len(),
        }
    }

    /// Keys of every create request seen so far, in order
    pub fn received(&self) -> Vec<String> {
        self.lock().received.clone()
    }

    /// Serve on an ephemeral localhost port in the background
    pub async fn spawn(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind mock API listener")?;
        let addr = listener.local_addr()?;
        let app = self.router();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("Mock API server stopped: {}", e);
            }
        });

        Ok(addr)
    }

    /// Serve on `addr` until the process is stopped
    pub async fn serve(&self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Starting mock API server on {}", addr);
        axum::serve(listener, self.router())
            .await
            .context("Mock API server failed")
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| !token.trim().is_empty())
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "missing bearer token").into_response()
}

fn simulated_failure(key: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("simulated failure for {}", key),
    )
        .into_response()
}

async fn create_customer(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Json(req): Json<CustomerRequest>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if req.customer_number.is_empty() || req.customer_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "customer_number and customer_name are required")
            .into_response();
    }

    let mut state = api.lock();
    state.received.push(req.customer_number.clone());
    if state.fail_on.contains(&req.customer_number) {
        return simulated_failure(&req.customer_number);
    }

    let id = match state.customers.get(&req.customer_number) {
        Some(&id) => id,
        None => {
            let id = state.allocate();
            state.customers.insert(req.customer_number.clone(), id);
            id
        }
    };

    info!("Created customer {} with ID {}", req.customer_number, id);
    (StatusCode::CREATED, Json(IdResponse { id })).into_response()
}

async fn create_account(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Json(req): Json<AccountRequest>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if req.account_number.is_empty() || req.account_name.is_empty() {
        return (StatusCode::BAD_REQUEST, "account_number and account_name are required")
            .into_response();
    }

    let mut state = api.lock();
    state.received.push(req.account_number.clone());
    if state.fail_on.contains(&req.account_number) {
        return simulated_failure(&req.account_number);
    }

    let id = match state.accounts.get(&req.account_number) {
        Some(&id) => id,
        None => {
            let id = state.allocate();
            state.accounts.insert(req.account_number.clone(), id);
            id
        }
    };

    info!("Created account {} with ID {}", req.account_number, id);
    (StatusCode::CREATED, Json(IdResponse { id })).into_response()
}

async fn create_link(
    State(api): State<MockApi>,
    headers: HeaderMap,
    Json(req): Json<CustomerAccountLinkRequest>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let key = format!("{}-{}", req.customer_id, req.account_id);
    let mut state = api.lock();
    state.received.push(key.clone());
    if state.fail_on.contains(&key) {
        return simulated_failure(&key);
    }

    state.links.insert(req);

    info!(
        "Created link between customer {} and account {}",
        req.customer_id, req.account_id
    );
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "status": "success" })),
    )
        .into_response()
}

async fn stats(State(api): State<MockApi>) -> Json<MockStats> {
    Json(api.stats())
}
