use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::{Value, json};

pub const SIMPLE_STREAM_MESSAGES: usize = 10;
pub const SIMPLE_STREAM_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DemoEvent {
    ConnectionEstablished {
        message: String,
        stream_id: String,
        features: Vec<&'static str>,
        timestamp: DateTime<Utc>,
    },
    PeriodicUpdate {
        message: String,
        counter: u64,
        uptime_seconds: u64,
        timestamp: DateTime<Utc>,
    },
    StatusUpdate {
        message: String,
        status: String,
        metrics: Value,
        timestamp: DateTime<Utc>,
    },
    DataUpdate {
        message: String,
        counter: u64,
        data: Value,
        timestamp: DateTime<Utc>,
    },
    SimpleMessage {
        message: String,
        index: usize,
        timestamp: DateTime<Utc>,
    },
    StreamComplete {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_messages: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_seconds: Option<u64>,
        timestamp: DateTime<Utc>,
    },
}

impl DemoEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DemoEvent::ConnectionEstablished { .. } => "connection_established",
            DemoEvent::PeriodicUpdate { .. } => "periodic_update",
            DemoEvent::StatusUpdate { .. } => "status_update",
            DemoEvent::DataUpdate { .. } => "data_update",
            DemoEvent::SimpleMessage { .. } => "simple_message",
            DemoEvent::StreamComplete { .. } => "stream_complete",
        }
    }
}

/// The event emitted for the `counter`-th tick (1-based).
pub fn tick_event(counter: u64, uptime_seconds: u64) -> DemoEvent {
    let timestamp = Utc::now();
    if counter % 3 == 0 {
        DemoEvent::PeriodicUpdate {
            message: format!("Periodic streaming message #{counter}"),
            counter,
            uptime_seconds,
            timestamp,
        }
    } else if counter % 5 == 0 {
        DemoEvent::StatusUpdate {
            message: "System status check".to_string(),
            status: "operational".to_string(),
            metrics: json!({ "messages_sent": counter, "uptime": uptime_seconds }),
            timestamp,
        }
    } else {
        let value = counter as f64 * 2.5;
        DemoEvent::DataUpdate {
            message: format!("Streaming data point #{counter}"),
            counter,
            data: json!({
                "value": value,
                "category": "test_data",
                "processed": true,
            }),
            timestamp,
        }
    }
}

/// Greeting, then one tick event per `interval` up to `max_messages`, then
/// `stream_complete`.
pub fn demo_stream(interval: Duration, max_messages: u64) -> impl Stream<Item = DemoEvent> + Send + 'static {
    async_stream::stream! {
        let started = Instant::now();
        let now = Utc::now();
        yield DemoEvent::ConnectionEstablished {
            message: "Streaming endpoint connected successfully!".to_string(),
            stream_id: format!("stream_{}", now.timestamp()),
            features: vec![
                "Real-time unidirectional streaming",
                "JSON data format",
                "Automatic reconnection support",
                "Server-Sent Events (SSE)",
            ],
            timestamp: now,
        };

        for counter in 1..=max_messages {
            tokio::time::sleep(interval).await;
            let event = tick_event(counter, started.elapsed().as_secs());
            tracing::trace!(counter, kind = event.kind(), "demo tick");
            yield event;
        }

        tracing::debug!(total = max_messages, "demo stream complete");
        yield DemoEvent::StreamComplete {
            message: "Streaming demo completed".to_string(),
            total_messages: Some(max_messages),
            duration_seconds: Some(started.elapsed().as_secs()),
            timestamp: Utc::now(),
        };
    }
}

pub fn simple_stream(interval: Duration) -> impl Stream<Item = DemoEvent> + Send + 'static {
    async_stream::stream! {
        for index in 1..=SIMPLE_STREAM_MESSAGES {
            yield DemoEvent::SimpleMessage {
                message: format!("Simple stream message {index}"),
                index,
                timestamp: Utc::now(),
            };
            tokio::time::sleep(interval).await;
        }
        yield DemoEvent::StreamComplete {
            message: "Simple stream completed".to_string(),
            total_messages: None,
            duration_seconds: None,
            timestamp: Utc::now(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn tick_types_follow_counter() {
        let kinds: Vec<_> = (1..=6).map(|c| tick_event(c, 0).kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "data_update",
                "data_update",
                "periodic_update",
                "data_update",
                "status_update",
                "periodic_update",
            ]
        );
        // Divisible by both: periodic wins.
        assert_eq!(tick_event(15, 0).kind(), "periodic_update");
    }

    #[test]
    fn data_update_value_scales_counter() {
        let DemoEvent::DataUpdate { data, .. } = tick_event(4, 0) else {
            panic!("expected data_update");
        };
        assert_eq!(data["value"], 10.0);
    }

    #[tokio::test]
    async fn demo_stream_is_bounded() {
        let events: Vec<_> = demo_stream(Duration::from_millis(1), 5).collect().await;
        assert_eq!(events.len(), 7);
        assert_eq!(events[0].kind(), "connection_established");
        assert_eq!(events[6].kind(), "stream_complete");
        let json = serde_json::to_value(&events[6]).unwrap();
        assert_eq!(json["type"], "stream_complete");
        assert_eq!(json["total_messages"], 5);
    }

    #[tokio::test]
    async fn simple_stream_sends_ten_then_completes() {
        let events: Vec<_> = simple_stream(Duration::from_millis(1)).collect().await;
        assert_eq!(events.len(), SIMPLE_STREAM_MESSAGES + 1);
        assert!(events[..10].iter().all(|e| e.kind() == "simple_message"));
        let last = serde_json::to_value(events.last().unwrap()).unwrap();
        assert_eq!(last["type"], "stream_complete");
        assert!(last.get("total_messages").is_none());
    }
}
