mod api;
mod browser_cloud;
mod config;
mod convex;
mod credentials;
mod health;
mod llm;
mod sessions;
mod streaming;

use std::fs::OpenOptions;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::Request;
use clap::Parser;
use dotenvy::dotenv;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::browser_cloud::client::{HttpTaskClient, TaskClient};
use crate::convex::{ConvexClient, DocumentStore};
use crate::credentials::CredentialStore;
use crate::health::HealthChecker;
use crate::llm::TextGenerator;
use crate::llm::flows::FlowGenerator;
use crate::llm::gemini::GeminiClient;
use crate::sessions::agent::CloudBrowserAgent;
use crate::sessions::{BrowserAgent, SessionManager};

#[derive(Parser)]
#[command(name = "testpilot", about = "Backend for the AI browser-testing agent")]
enum Cli {
    /// Start the HTTP server (default when no subcommand is given)
    #[command(alias = "run")]
    Serve {
        /// Listen on this port instead of PORT
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let cli = if args.len() <= 1 {
        Cli::Serve { port: None }
    } else {
        Cli::parse()
    };

    match cli {
        Cli::Serve { port } => run_server(port).await,
    }
}

fn env_filter(config: &config::Config) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.as_deref().unwrap_or("info");
        EnvFilter::new(format!("testpilot={level},tower_http=warn,hyper=warn"))
    })
}

async fn run_server(port_override: Option<u16>) -> Result<()> {
    let mut config = config::Config::from_env();
    if let Some(port) = port_override {
        config.port = port;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file))?;

    tracing_subscriber::registry()
        .with(env_filter(&config))
        .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true).with_bracketed_fields(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .with(sentry::integrations::tracing::layer().event_filter(
            |metadata| match *metadata.level() {
                tracing::Level::ERROR => sentry::integrations::tracing::EventFilter::Event,
                tracing::Level::WARN | tracing::Level::INFO => {
                    sentry::integrations::tracing::EventFilter::Breadcrumb
                }
                _ => sentry::integrations::tracing::EventFilter::Ignore,
            },
        ))
        .init();

    let _guard = sentry::init((
        config.sentry_dsn.clone().unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            traces_sample_rate: 0.2,
            enable_logs: true,
            ..Default::default()
        },
    ));

    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let task_client: Option<Arc<dyn TaskClient>> = match &config.browser_use.api_key {
        Some(key) => Some(Arc::new(HttpTaskClient::new(
            http_client.clone(),
            config.browser_use.base_url.clone(),
            key.clone(),
        ))),
        None => {
            tracing::warn!("BROWSER_USE_API_KEY not set; browser endpoints will answer 503");
            None
        }
    };

    let llm: Option<Arc<dyn TextGenerator>> = match &config.gemini.api_key {
        Some(key) => Some(Arc::new(GeminiClient::new(
            http_client.clone(),
            config.gemini.base_url.clone(),
            config.gemini.model.clone(),
            key.clone(),
        ))),
        None => {
            tracing::warn!("GEMINI_API_KEY not set; flow generation will answer 503");
            None
        }
    };

    let document_store: Option<Arc<dyn DocumentStore>> = match &config.convex_url {
        Some(url) => Some(Arc::new(ConvexClient::new(http_client.clone(), url.clone()))),
        None => {
            tracing::warn!("CONVEX_URL not set; admin endpoints will answer 503");
            None
        }
    };

    let credentials = Arc::new(CredentialStore::new());
    let flow_generator = llm
        .clone()
        .map(|llm| Arc::new(FlowGenerator::new(llm, credentials.clone())));
    let agent = task_client
        .clone()
        .map(|client| Arc::new(CloudBrowserAgent::new(client)) as Arc<dyn BrowserAgent>);
    let health = HealthChecker::new(
        llm,
        task_client.clone(),
        document_store.clone(),
        config.health_check_timeout,
    );

    tracing::info!(
        environment = %config.environment,
        gemini = config.is_gemini_enabled(),
        browser_use = config.is_browser_use_enabled(),
        convex = document_store.is_some(),
        "providers configured"
    );

    let addr = config.bind_addr();
    let app_state = api::AppState {
        config: Arc::new(config),
        task_client,
        flow_generator,
        document_store,
        credentials,
        sessions: Arc::new(SessionManager::new(agent)),
        health: Arc::new(health),
        active_streams: Arc::new(AtomicUsize::new(0)),
        started_at: chrono::Utc::now(),
    };

    let app = api::create_app(app_state)
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(NewSentryLayer::<Request<Body>>::new_from_top());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
