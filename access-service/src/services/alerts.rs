use crate::models::Alert;
use crate::services::store::{AlertPage, AlertQuery, AlertStore};
use access_core::error::AppError;
use std::sync::Arc;
use tokio::sync::broadcast;

const EVENT_FEED_CAPACITY: usize = 256;

/// Append-only alert log plus a live feed for event-triggered routines.
/// Alerts are immutable once recorded; retention is an external policy.
pub struct AlertAggregator {
    store: Arc<dyn AlertStore>,
    events: broadcast::Sender<Alert>,
}

impl AlertAggregator {
    pub fn new(store: Arc<dyn AlertStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_FEED_CAPACITY);
        Self { store, events }
    }

    /// Live feed of recorded alerts; the scheduler subscribes to drive
    /// event-triggered routines.
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.events.subscribe()
    }

    pub async fn record(&self, alert: Alert) -> Result<String, AppError> {
        let id = self.append(&alert).await?;
        // No live subscribers is fine.
        let _ = self.events.send(alert);
        Ok(id)
    }

    /// Records the alert without publishing it on the live feed. Used for
    /// alerts caused by routine-issued device commands, which must stay out
    /// of event-trigger dispatch so one firing cannot start another.
    pub async fn record_undispatched(&self, alert: Alert) -> Result<String, AppError> {
        self.append(&alert).await
    }

    async fn append(&self, alert: &Alert) -> Result<String, AppError> {
        self.store.append_alert(alert).await?;

        metrics::counter!("alerts_recorded_total", "severity" => alert.severity.as_str())
            .increment(1);
        tracing::info!(
            alert_id = %alert.id,
            severity = alert.severity.as_str(),
            message = %alert.message,
            "Alert recorded"
        );

        Ok(alert.id.clone())
    }

    pub async fn query(&self, query: &AlertQuery) -> Result<AlertPage, AppError> {
        self.store.query_alerts(query).await
    }
}
