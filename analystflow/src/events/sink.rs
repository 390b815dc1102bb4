//! Event sink trait and implementations.

use super::PipelineEvent;
use async_trait::async_trait;
use tracing::{debug, info, warn, Level};

/// Trait for event sinks that can receive events.
///
/// Event sinks are used for observability, logging, and tests.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event: &PipelineEvent) {
        self.try_emit(event);
    }

    /// Emits an event without blocking.
    ///
    /// This method must never panic or fail the caller.
    fn try_emit(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    /// The log level to use.
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event: &PipelineEvent) {
        let event_type = event.event_type();
        let stage = event.stage().unwrap_or("-");
        let run_id = event.run_id();

        // Failures are always surfaced, whatever the configured level.
        if let PipelineEvent::StageFailed { kind, error, .. } = event {
            warn!(%run_id, stage, %kind, error = %error, "Event: {}", event_type);
            return;
        }

        if self.level == Level::DEBUG {
            debug!(%run_id, stage, event = ?event, "Event: {}", event_type);
        } else {
            info!(%run_id, stage, "Event: {}", event_type);
        }
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        self.log_event(event);
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }

    /// Returns the event types recorded for one stage, in order.
    #[must_use]
    pub fn stage_timeline(&self, stage: &str) -> Vec<&'static str> {
        self.events
            .read()
            .iter()
            .filter(|e| e.stage() == Some(stage))
            .map(PipelineEvent::event_type)
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn started(stage: &str) -> PipelineEvent {
        PipelineEvent::StageStarted {
            run_id: Uuid::new_v4(),
            stage: stage.to_string(),
        }
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpEventSink;
        sink.emit(&started("ur_agent")).await;
        sink.try_emit(&started("ur_agent"));
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingEventSink::default();
        sink.emit(&started("ur_agent")).await;
        LoggingEventSink::debug().try_emit(&started("ac_agent"));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&started("ur_agent")).await;
        sink.try_emit(&PipelineEvent::StageCompleted {
            run_id: Uuid::new_v4(),
            stage: "ur_agent".to_string(),
            records: 3,
            duration_ms: 4.0,
        });

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.stage_timeline("ur_agent"), ["stage.started", "stage.completed"]);
    }

    #[tokio::test]
    async fn test_collecting_sink_filter_and_clear() {
        let sink = CollectingEventSink::new();
        sink.try_emit(&started("a"));
        sink.try_emit(&PipelineEvent::RunCompleted {
            run_id: Uuid::new_v4(),
            complete: true,
            duration_ms: 1.0,
        });

        assert_eq!(sink.events_of_type("stage.").len(), 1);
        assert_eq!(sink.events_of_type("run.").len(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }
}
