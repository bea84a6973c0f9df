//! Observer task consuming a simulator's event stream.

use msystem_core::{Notification, RunOutcome, SimEvent};
use msystem_io::RunLogger;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// What the observer saw by the time the stream closed.
#[derive(Debug, Clone, Default)]
pub struct ObserverReport {
    pub snapshots: u64,
    pub notifications: u64,
    pub last_notification: Option<Notification>,
    pub outcomes: Vec<RunOutcome>,
    pub failures: Vec<String>,
}

pub struct RunObserver {
    logger: Arc<RunLogger>,
    trial: usize,
    echo: bool,
}

impl RunObserver {
    #[must_use]
    pub fn new(logger: Arc<RunLogger>, trial: usize) -> Self {
        Self {
            logger,
            trial,
            echo: false,
        }
    }

    /// Also print every notification to stdout.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Drains `events` until every sender is gone.
    pub async fn observe(self, mut events: UnboundedReceiver<SimEvent>) -> ObserverReport {
        let mut report = ObserverReport::default();
        while let Some(event) = events.recv().await {
            match event {
                SimEvent::Snapshot(snapshot) => {
                    report.snapshots += 1;
                    if let Err(e) = self.logger.log_snapshot(self.trial, &snapshot) {
                        tracing::warn!(error = %e, step = snapshot.step, "Failed to log snapshot");
                    }
                }
                SimEvent::Notification(notification) => {
                    report.notifications += 1;
                    if self.echo {
                        println!("{notification}");
                    }
                    if let Err(e) = self.logger.log_notification(self.trial, &notification) {
                        tracing::warn!(error = %e, step = notification.step, "Failed to log notification");
                    }
                    report.last_notification = Some(notification);
                }
                SimEvent::Finished(outcome) => {
                    tracing::info!(
                        steps = outcome.steps,
                        termination = %outcome.termination,
                        "Run ended"
                    );
                    report.outcomes.push(outcome);
                }
                SimEvent::Failed(message) => {
                    tracing::error!(%message, "Run failed");
                    report.failures.push(message);
                }
            }
        }
        report
    }
}
