//! Dependency health probes for `/api/health/services`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::browser_cloud::client::TaskClient;
use crate::convex::DocumentStore;
use crate::llm::{LlmError, TextGenerator};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub response_time_ms: Option<u64>,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    fn new(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            response_time_ms: None,
            last_checked: Utc::now(),
            details: None,
            error: None,
        }
    }

    fn not_configured(name: &str, what: &str) -> Self {
        let mut health = Self::new(name, HealthStatus::Unhealthy, format!("{what} not configured"));
        health.error = Some("missing configuration".to_string());
        health
    }

    fn timed(mut self, started: Instant) -> Self {
        self.response_time_ms = Some(started.elapsed().as_millis() as u64);
        self
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub check_duration_ms: u64,
    pub services: BTreeMap<String, ServiceHealth>,
    pub summary: HealthSummary,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HealthSummary {
    pub total_services: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub unknown: usize,
}

pub fn overall_status(services: &[ServiceHealth]) -> HealthStatus {
    if !services.is_empty() && services.iter().all(|s| s.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else if services.iter().any(|s| s.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if services.iter().any(|s| s.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unknown
    }
}

pub fn summarize(services: &[ServiceHealth]) -> HealthSummary {
    let mut summary = HealthSummary {
        total_services: services.len(),
        ..Default::default()
    };
    for service in services {
        match service.status {
            HealthStatus::Healthy => summary.healthy += 1,
            HealthStatus::Degraded => summary.degraded += 1,
            HealthStatus::Unhealthy => summary.unhealthy += 1,
            HealthStatus::Unknown => summary.unknown += 1,
        }
    }
    summary
}

pub struct HealthChecker {
    llm: Option<Arc<dyn TextGenerator>>,
    tasks: Option<Arc<dyn TaskClient>>,
    store: Option<Arc<dyn DocumentStore>>,
    timeout: Duration,
    started_at: Instant,
}

impl HealthChecker {
    pub fn new(
        llm: Option<Arc<dyn TextGenerator>>,
        tasks: Option<Arc<dyn TaskClient>>,
        store: Option<Arc<dyn DocumentStore>>,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            tasks,
            store,
            timeout,
            started_at: Instant::now(),
        }
    }

    /// Run every probe concurrently and aggregate the results.
    pub async fn check_all(&self) -> HealthReport {
        let started = Instant::now();
        let (server, gemini, browser_use, convex) = tokio::join!(
            self.check_server(),
            self.check_gemini(),
            self.check_browser_use(),
            self.check_convex(),
        );

        let services = vec![server, gemini, browser_use, convex];
        let overall = overall_status(&services);
        let summary = summarize(&services);
        tracing::info!(
            overall = ?overall,
            healthy = summary.healthy,
            degraded = summary.degraded,
            unhealthy = summary.unhealthy,
            "service health check complete"
        );

        HealthReport {
            overall_status: overall,
            timestamp: Utc::now(),
            check_duration_ms: started.elapsed().as_millis() as u64,
            services: services.into_iter().map(|s| (s.name.clone(), s)).collect(),
            summary,
        }
    }

    async fn bounded<T, F>(&self, probe: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.timeout, probe).await.ok()
    }

    async fn check_server(&self) -> ServiceHealth {
        ServiceHealth::new("server", HealthStatus::Healthy, "Server is running")
            .with_details(json!({
                "version": env!("CARGO_PKG_VERSION"),
                "uptime_secs": self.started_at.elapsed().as_secs(),
            }))
    }

    async fn check_gemini(&self) -> ServiceHealth {
        const NAME: &str = "gemini";
        let Some(llm) = &self.llm else {
            return ServiceHealth::not_configured(NAME, "Gemini API key");
        };

        let started = Instant::now();
        let health = match self.bounded(llm.probe()).await {
            Some(Ok(())) => ServiceHealth::new(NAME, HealthStatus::Healthy, "Gemini API is accessible")
                .with_details(json!({ "model": llm.model() })),
            Some(Err(LlmError::Upstream { status, body })) => {
                ServiceHealth::new(NAME, HealthStatus::Degraded, format!("Gemini API returned {status}"))
                    .with_error(body)
            }
            Some(Err(e)) => ServiceHealth::new(NAME, HealthStatus::Unhealthy, "Gemini API connection failed")
                .with_error(e.to_string()),
            None => self.timed_out(NAME, "Gemini API"),
        };
        health.timed(started)
    }

    async fn check_browser_use(&self) -> ServiceHealth {
        const NAME: &str = "browser_use_cloud";
        let Some(tasks) = &self.tasks else {
            return ServiceHealth::not_configured(NAME, "Browser Use Cloud API key");
        };

        let started = Instant::now();
        let health = match self.bounded(tasks.ping()).await {
            Some(Ok(status)) if status.is_success() => {
                ServiceHealth::new(NAME, HealthStatus::Healthy, "Browser Use Cloud API is accessible")
            }
            Some(Ok(status)) => ServiceHealth::new(
                NAME,
                HealthStatus::Degraded,
                format!("Browser Use Cloud API returned {}", status.as_u16()),
            ),
            Some(Err(e)) => {
                ServiceHealth::new(NAME, HealthStatus::Unhealthy, "Browser Use Cloud API connection failed")
                    .with_error(e.to_string())
            }
            None => self.timed_out(NAME, "Browser Use Cloud API"),
        };
        health.timed(started)
    }

    async fn check_convex(&self) -> ServiceHealth {
        const NAME: &str = "convex";
        let Some(store) = &self.store else {
            return ServiceHealth::not_configured(NAME, "Convex URL");
        };

        let started = Instant::now();
        let health = match self.bounded(store.probe()).await {
            Some(Ok(status)) if status.is_success() => {
                ServiceHealth::new(NAME, HealthStatus::Healthy, "Convex database is accessible")
                    .with_details(json!({ "deployment_url": store.deployment_url() }))
            }
            Some(Ok(status)) => ServiceHealth::new(
                NAME,
                HealthStatus::Degraded,
                format!("Convex returned {}", status.as_u16()),
            ),
            Some(Err(e)) => ServiceHealth::new(NAME, HealthStatus::Unhealthy, "Convex connection failed")
                .with_error(e.to_string()),
            None => self.timed_out(NAME, "Convex"),
        };
        health.timed(started)
    }

    fn timed_out(&self, name: &str, what: &str) -> ServiceHealth {
        tracing::warn!(service = name, timeout_secs = self.timeout.as_secs(), "health probe timed out");
        ServiceHealth::new(name, HealthStatus::Unhealthy, format!("{what} timeout"))
            .with_error(format!("no response within {}s", self.timeout.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser_cloud::{CloudError, RemoteTask};
    use crate::convex::ConvexError;
    use async_trait::async_trait;
    use reqwest::StatusCode;

    struct FakeLlm {
        upstream_status: Option<u16>,
    }

    #[async_trait]
    impl TextGenerator for FakeLlm {
        fn model(&self) -> &str {
            "fake-model"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(String::new())
        }

        async fn probe(&self) -> Result<(), LlmError> {
            match self.upstream_status {
                None => Ok(()),
                Some(status) => Err(LlmError::Upstream {
                    status,
                    body: "quota exceeded".into(),
                }),
            }
        }
    }

    struct FakeTasks {
        status: StatusCode,
        delay: Duration,
    }

    #[async_trait]
    impl TaskClient for FakeTasks {
        async fn create_task(&self, _instruction: &str) -> Result<RemoteTask, CloudError> {
            Ok(RemoteTask::started("t"))
        }

        async fn get_task(&self, task_id: &str) -> Result<RemoteTask, CloudError> {
            Ok(RemoteTask::started(task_id))
        }

        async fn ping(&self) -> Result<StatusCode, CloudError> {
            tokio::time::sleep(self.delay).await;
            Ok(self.status)
        }
    }

    struct FakeStore;

    #[async_trait]
    impl DocumentStore for FakeStore {
        async fn call(&self, _function: &str, _args: Value) -> Result<Value, ConvexError> {
            Ok(Value::Null)
        }

        async fn probe(&self) -> Result<StatusCode, ConvexError> {
            Ok(StatusCode::OK)
        }

        fn deployment_url(&self) -> &str {
            "https://fake.convex.cloud"
        }
    }

    fn health(status: HealthStatus) -> ServiceHealth {
        ServiceHealth::new("x", status, "")
    }

    #[test]
    fn overall_status_rules() {
        use HealthStatus::*;
        assert_eq!(overall_status(&[health(Healthy), health(Healthy)]), Healthy);
        assert_eq!(overall_status(&[health(Healthy), health(Degraded)]), Degraded);
        assert_eq!(
            overall_status(&[health(Degraded), health(Unhealthy), health(Healthy)]),
            Unhealthy
        );
        assert_eq!(overall_status(&[health(Healthy), health(Unknown)]), Unknown);
        assert_eq!(overall_status(&[]), Unknown);
    }

    #[test]
    fn summary_counts_each_status() {
        use HealthStatus::*;
        let summary = summarize(&[health(Healthy), health(Healthy), health(Unhealthy), health(Unknown)]);
        assert_eq!(
            summary,
            HealthSummary {
                total_services: 4,
                healthy: 2,
                degraded: 0,
                unhealthy: 1,
                unknown: 1,
            }
        );
    }

    #[tokio::test]
    async fn unconfigured_providers_are_unhealthy() {
        let checker = HealthChecker::new(None, None, None, Duration::from_secs(1));
        let report = checker.check_all().await;
        assert_eq!(report.overall_status, HealthStatus::Unhealthy);
        assert_eq!(report.services["server"].status, HealthStatus::Healthy);
        assert_eq!(report.services["gemini"].message, "Gemini API key not configured");
        assert_eq!(report.summary.unhealthy, 3);
        assert_eq!(report.summary.total_services, 4);
    }

    #[tokio::test]
    async fn all_reachable_is_healthy() {
        let checker = HealthChecker::new(
            Some(Arc::new(FakeLlm { upstream_status: None })),
            Some(Arc::new(FakeTasks {
                status: StatusCode::OK,
                delay: Duration::ZERO,
            })),
            Some(Arc::new(FakeStore)),
            Duration::from_secs(1),
        );
        let report = checker.check_all().await;
        assert_eq!(report.overall_status, HealthStatus::Healthy);
        assert_eq!(report.summary.healthy, 4);
        assert_eq!(report.services["gemini"].details.as_ref().unwrap()["model"], "fake-model");
    }

    #[tokio::test]
    async fn non_success_status_is_degraded() {
        let checker = HealthChecker::new(
            Some(Arc::new(FakeLlm {
                upstream_status: Some(429),
            })),
            Some(Arc::new(FakeTasks {
                status: StatusCode::SERVICE_UNAVAILABLE,
                delay: Duration::ZERO,
            })),
            Some(Arc::new(FakeStore)),
            Duration::from_secs(1),
        );
        let report = checker.check_all().await;
        assert_eq!(report.overall_status, HealthStatus::Degraded);
        assert_eq!(report.services["gemini"].status, HealthStatus::Degraded);
        assert_eq!(report.services["gemini"].error.as_deref(), Some("quota exceeded"));
        assert_eq!(
            report.services["browser_use_cloud"].message,
            "Browser Use Cloud API returned 503"
        );
    }

    #[tokio::test]
    async fn slow_probe_times_out_as_unhealthy() {
        let checker = HealthChecker::new(
            None,
            Some(Arc::new(FakeTasks {
                status: StatusCode::OK,
                delay: Duration::from_secs(5),
            })),
            None,
            Duration::from_millis(20),
        );
        let report = checker.check_all().await;
        let probe = &report.services["browser_use_cloud"];
        assert_eq!(probe.status, HealthStatus::Unhealthy);
        assert_eq!(probe.message, "Browser Use Cloud API timeout");
    }
}
