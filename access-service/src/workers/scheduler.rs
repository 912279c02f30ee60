use crate::models::Alert;
use crate::services::alerts::AlertAggregator;
use crate::services::routines::RoutineEngine;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Background trigger-evaluation task, independent of request handling.
/// Polls at a fixed tick (at most one minute, the finest schedule
/// granularity) and drains the live alert feed for event triggers.
pub struct RoutineScheduler {
    engine: Arc<RoutineEngine>,
    events: broadcast::Receiver<Alert>,
    tick: Duration,
    shutdown: CancellationToken,
}

impl RoutineScheduler {
    /// Subscribes to the alert feed here, not in `run`, so alerts recorded
    /// between construction and the spawned task's first poll are buffered
    /// rather than lost.
    pub fn new(
        engine: Arc<RoutineEngine>,
        alerts: &AlertAggregator,
        tick: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            events: alerts.subscribe(),
            tick,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut window_start = Utc::now();

        tracing::info!(tick_secs = self.tick.as_secs(), "Routine scheduler started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Routine scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let now = Utc::now();
                    let fired = self.engine.evaluate_window(window_start, now).await;
                    if fired > 0 {
                        tracing::info!(fired, "Tick evaluated");
                    }
                    metrics::counter!("scheduler_ticks_total").increment(1);
                    window_start = now;
                }
                event = self.events.recv() => match event {
                    Ok(alert) => self.engine.handle_event(&alert).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Alert feed lagged; some event triggers may have been missed");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Alert feed closed, scheduler exiting");
                        break;
                    }
                }
            }
        }
    }
}
