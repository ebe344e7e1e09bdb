pub mod admin;
pub mod browser;
pub mod browser_cloud;
pub mod credentials;
pub mod llm;
pub mod middleware;
pub(crate) mod response;
mod routes;
mod sse;
pub mod system;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use chrono::{DateTime, Utc};

use crate::browser_cloud::client::TaskClient;
use crate::config::Config;
use crate::convex::DocumentStore;
use crate::credentials::CredentialStore;
use crate::health::HealthChecker;
use crate::llm::flows::FlowGenerator;
use crate::sessions::SessionManager;

/// Everything a handler can reach. Providers whose key is missing are `None`
/// and their endpoints answer 503.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub task_client: Option<Arc<dyn TaskClient>>,
    pub flow_generator: Option<Arc<FlowGenerator>>,
    pub document_store: Option<Arc<dyn DocumentStore>>,
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<SessionManager>,
    pub health: Arc<HealthChecker>,
    pub active_streams: Arc<AtomicUsize>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn open_streams(&self) -> usize {
        self.active_streams.load(Ordering::Relaxed)
    }

    pub(crate) fn track_stream(&self) -> StreamGuard {
        self.active_streams.fetch_add(1, Ordering::Relaxed);
        StreamGuard(self.active_streams.clone())
    }
}

/// Counts one open SSE response; decrements when the stream is dropped.
pub(crate) struct StreamGuard(Arc<AtomicUsize>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub fn create_app(state: AppState) -> Router {
    routes::build_router(state)
}
