use super::incident::{IncidentLog, Severity};
use super::NotificationSink;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Incident sink that fans entries out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<IncidentLog>,
}

impl BroadcastNotificationSink {
    /// Create a new sink with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to incidents logged from now on
    pub fn subscribe(&self) -> broadcast::Receiver<IncidentLog> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotificationSink {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl NotificationSink for BroadcastNotificationSink {
    fn log(&self, entry: IncidentLog) {
        // No subscribers is fine; incidents are fire-and-forget
        let _ = self.sender.send(entry);
    }
}

/// Incident sink that writes every entry to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn log(&self, entry: IncidentLog) {
        let code = entry.code().unwrap_or("Unclassified");
        match entry.severity() {
            Severity::Critical | Severity::Major => error!(
                code = %code,
                severity = %entry.severity(),
                affected_item = %entry.affected_item,
                affected_service = %entry.affected_service,
                source = %entry.error_code.source,
                notes = %entry.notes,
                "🚨 Incident logged"
            ),
            Severity::Warning | Severity::Minor => warn!(
                code = %code,
                severity = %entry.severity(),
                affected_item = %entry.affected_item,
                affected_service = %entry.affected_service,
                source = %entry.error_code.source,
                notes = %entry.notes,
                "⚠️ Incident logged"
            ),
            Severity::Information => info!(
                code = %code,
                affected_item = %entry.affected_item,
                affected_service = %entry.affected_service,
                notes = %entry.notes,
                "📝 Incident logged"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ErrorCode;

    fn incident(code: &str) -> IncidentLog {
        IncidentLog::new(
            "TAG Element 1",
            "Morning",
            ErrorCode::automation("PA_TAG_Monitor Scanner Progress Script", Severity::Warning, "retry")
                .with_code(code),
            "timed out",
        )
    }

    #[tokio::test]
    async fn test_subscribers_receive_incidents() {
        let sink = BroadcastNotificationSink::new(8);
        let mut receiver = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        sink.log(incident("RetryTimeout"));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.code(), Some("RetryTimeout"));
    }

    #[test]
    fn test_logging_without_subscribers_is_silent() {
        let sink = BroadcastNotificationSink::default();
        sink.log(incident("RetryTimeout"));
        TracingNotificationSink.log(incident("RetryTimeout"));
    }
}
