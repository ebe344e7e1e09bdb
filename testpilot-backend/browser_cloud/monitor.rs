//! Turns the one-shot `get_task` snapshot call into a live event feed.
//!
//! Each tick polls the task, emits one `step` event per step that appeared
//! since the previous tick (by position only, in provider order), then one
//! `status` event. A terminal status adds a `completion` event and ends the
//! feed; any poll failure emits a single `error` event and ends it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::RemoteTask;
use super::client::TaskClient;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    Step {
        task_id: String,
        step: Value,
        timestamp: DateTime<Utc>,
    },
    Status {
        task_id: String,
        status: String,
        live_url: Option<String>,
        steps_count: usize,
        timestamp: DateTime<Utc>,
    },
    Completion {
        task_id: String,
        status: String,
        output: Option<Value>,
        timestamp: DateTime<Utc>,
    },
    Error {
        task_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskEvent::Step { .. } => "step",
            TaskEvent::Status { .. } => "status",
            TaskEvent::Completion { .. } => "completion",
            TaskEvent::Error { .. } => "error",
        }
    }
}

/// Remembers how many steps have already been forwarded for one task.
#[derive(Debug)]
pub struct StepTracker {
    task_id: String,
    seen: usize,
}

impl StepTracker {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            seen: 0,
        }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Events for one snapshot: new steps, then status, then completion if terminal.
    pub fn observe(&mut self, task: &RemoteTask) -> Vec<TaskEvent> {
        let now = Utc::now();
        let mut events = Vec::new();

        if task.steps.len() > self.seen {
            for step in &task.steps[self.seen..] {
                events.push(TaskEvent::Step {
                    task_id: self.task_id.clone(),
                    step: step.clone(),
                    timestamp: now,
                });
            }
            self.seen = task.steps.len();
        }

        events.push(TaskEvent::Status {
            task_id: self.task_id.clone(),
            status: task.status.clone(),
            live_url: task.live_url.clone(),
            steps_count: task.steps.len(),
            timestamp: now,
        });

        if task.is_terminal() {
            events.push(TaskEvent::Completion {
                task_id: self.task_id.clone(),
                status: task.status.clone(),
                output: task.output.clone(),
                timestamp: now,
            });
        }

        events
    }
}

pub struct TaskMonitor {
    client: Arc<dyn TaskClient>,
    interval: Duration,
}

impl TaskMonitor {
    pub fn new(client: Arc<dyn TaskClient>) -> Self {
        Self {
            client,
            interval: POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_interval(client: Arc<dyn TaskClient>, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// Poll `task_id` until it reaches a terminal status, a poll fails, or
    /// `cancel` fires. Dropping the stream also stops polling.
    pub fn watch(
        self,
        task_id: String,
        cancel: CancellationToken,
    ) -> impl Stream<Item = TaskEvent> + Send + 'static {
        let TaskMonitor { client, interval } = self;

        async_stream::stream! {
            let mut tracker = StepTracker::new(task_id.clone());

            loop {
                let polled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(task_id = %task_id, "task monitor cancelled");
                        break;
                    }
                    result = client.get_task(&task_id) => result,
                };

                let task = match polled {
                    Ok(task) => task,
                    Err(e) => {
                        tracing::warn!(task_id = %task_id, error = %e, "task poll failed, ending stream");
                        yield TaskEvent::Error {
                            task_id: task_id.clone(),
                            error: e.to_string(),
                            timestamp: Utc::now(),
                        };
                        break;
                    }
                };

                let done = task.is_terminal();
                for event in tracker.observe(&task) {
                    tracing::trace!(task_id = %task_id, kind = event.kind(), "task event");
                    yield event;
                }
                if done {
                    tracing::info!(
                        task_id = %task_id,
                        status = %task.status,
                        steps = tracker.seen(),
                        "task reached terminal status"
                    );
                    break;
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(task_id = %task_id, "task monitor cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser_cloud::CloudError;
    use async_trait::async_trait;
    use futures::StreamExt;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replays a fixed list of snapshots, one per `get_task` call.
    struct ScriptedClient {
        script: Mutex<Vec<Result<RemoteTask, CloudError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedClient {
        fn new(mut script: Vec<Result<RemoteTask, CloudError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TaskClient for ScriptedClient {
        async fn create_task(&self, _instruction: &str) -> Result<RemoteTask, CloudError> {
            Err(CloudError::Invalid("not scripted".into()))
        }

        async fn get_task(&self, _task_id: &str) -> Result<RemoteTask, CloudError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(snapshot("running", vec![], None)))
        }

        async fn ping(&self) -> Result<StatusCode, CloudError> {
            Ok(StatusCode::OK)
        }
    }

    fn snapshot(status: &str, steps: Vec<Value>, output: Option<Value>) -> RemoteTask {
        let mut task = RemoteTask::started("t1");
        task.status = status.to_string();
        task.steps = steps;
        task.output = output;
        task
    }

    /// Compact form of an event for order assertions.
    fn describe(event: &TaskEvent) -> String {
        match event {
            TaskEvent::Step { step, .. } => format!("step({})", step["id"].as_str().unwrap_or("?")),
            TaskEvent::Status {
                status, steps_count, ..
            } => format!("status({status},{steps_count})"),
            TaskEvent::Completion { output, .. } => format!(
                "completion({})",
                output.as_ref().and_then(|o| o.as_str()).unwrap_or("none")
            ),
            TaskEvent::Error { error, .. } => format!("error({error})"),
        }
    }

    async fn collect(client: Arc<ScriptedClient>) -> Vec<String> {
        let monitor = TaskMonitor::with_interval(client, Duration::from_millis(1));
        monitor
            .watch("t1".to_string(), CancellationToken::new())
            .map(|e| describe(&e))
            .collect()
            .await
    }

    #[tokio::test]
    async fn emits_steps_before_status_until_finished() {
        let s1 = json!({"id": "s1"});
        let s2 = json!({"id": "s2"});
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(snapshot("running", vec![], None)),
            Ok(snapshot("running", vec![s1.clone()], None)),
            Ok(snapshot("finished", vec![s1, s2], Some(json!("done")))),
        ]));

        let events = collect(client.clone()).await;
        assert_eq!(
            events,
            vec![
                "status(running,0)",
                "step(s1)",
                "status(running,1)",
                "step(s2)",
                "status(finished,2)",
                "completion(done)",
            ]
        );
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn several_new_steps_in_one_tick_keep_provider_order() {
        let steps: Vec<Value> = ["a", "b", "c"].iter().map(|id| json!({"id": id})).collect();
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(snapshot("running", vec![steps[0].clone()], None)),
            Ok(snapshot("stopped", steps.clone(), None)),
        ]));

        let events = collect(client).await;
        assert_eq!(
            events,
            vec![
                "step(a)",
                "status(running,1)",
                "step(b)",
                "step(c)",
                "status(stopped,3)",
                "completion(none)",
            ]
        );
    }

    #[tokio::test]
    async fn terminal_first_poll_still_emits_existing_steps() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(snapshot(
            "failed",
            vec![json!({"id": "x"}), json!({"id": "y"})],
            None,
        ))]));

        let events = collect(client.clone()).await;
        assert_eq!(
            events,
            vec!["step(x)", "step(y)", "status(failed,2)", "completion(none)"]
        );
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn poll_error_emits_single_error_and_stops() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(snapshot("running", vec![json!({"id": "s1"})], None)),
            Err(CloudError::NotFound("t1".into())),
            Ok(snapshot("finished", vec![], None)),
        ]));

        let events = collect(client.clone()).await;
        assert_eq!(
            events,
            vec!["step(s1)", "status(running,1)", "error(task not found: t1)"]
        );
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn cancelled_monitor_emits_nothing() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let monitor = TaskMonitor::with_interval(client.clone(), Duration::from_millis(1));
        let events: Vec<TaskEvent> = monitor.watch("t1".into(), cancel).collect().await;
        assert!(events.is_empty());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn cancel_during_sleep_stops_polling() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let cancel = CancellationToken::new();
        let monitor = TaskMonitor::with_interval(client.clone(), Duration::from_secs(60));
        let mut stream = Box::pin(monitor.watch("t1".into(), cancel.clone()));

        let first = stream.next().await.unwrap();
        assert_eq!(first.kind(), "status");
        cancel.cancel();
        assert!(stream.next().await.is_none());
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn tracker_counts_only_growth() {
        let mut tracker = StepTracker::new("t1");
        let two = snapshot("running", vec![json!(1), json!(2)], None);
        assert_eq!(tracker.observe(&two).len(), 3);
        // Same count again: status only.
        let events = tracker.observe(&two);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), "status");
        assert_eq!(tracker.seen(), 2);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = TaskEvent::Status {
            task_id: "t1".into(),
            status: "running".into(),
            live_url: None,
            steps_count: 0,
            timestamp: Utc::now(),
        };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["type"], "status");
        assert_eq!(v["task_id"], "t1");
        assert_eq!(v["steps_count"], 0);
        assert!(v["timestamp"].is_string());
    }
}
