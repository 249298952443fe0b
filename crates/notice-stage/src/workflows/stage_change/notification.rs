use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::batch::ItemOutcome;
use super::repository::{FailureNotification, NotificationError, NotificationSender};

pub const DEFAULT_SUBJECT_PREFIX: &str = "Change Processing Stage";

/// Hand-off point between the batch orchestrator and the delivery worker.
#[derive(Clone)]
pub struct NotificationQueue {
    sender: mpsc::UnboundedSender<FailureNotification>,
}

/// Consumes queued notifications and forwards them to a sender.
pub struct NotificationWorker {
    receiver: mpsc::UnboundedReceiver<FailureNotification>,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationQueue {
    pub fn channel(sender: Arc<dyn NotificationSender>) -> (Self, NotificationWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { sender: tx },
            NotificationWorker {
                receiver: rx,
                sender,
            },
        )
    }

    /// Enqueue without waiting; a stopped worker only costs a log line.
    pub fn enqueue(&self, notification: FailureNotification) {
        if let Err(rejected) = self.sender.send(notification) {
            warn!(
                failed = rejected.0.failed_count,
                "notification worker stopped, dropping failure notification"
            );
        }
    }
}

impl NotificationWorker {
    /// Deliver notifications until every queue handle is dropped.
    pub async fn run(mut self) {
        while let Some(notification) = self.receiver.recv().await {
            self.deliver(&notification);
        }
        info!("notification worker stopped");
    }

    /// Deliver whatever is queued right now; returns how many were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(notification) = self.receiver.try_recv() {
            self.deliver(&notification);
            handled += 1;
        }
        handled
    }

    fn deliver(&self, notification: &FailureNotification) {
        match self.sender.notify_failures(notification) {
            Ok(true) => info!(
                failed = notification.failed_count,
                requested_by = %notification.requested_by,
                "failure notification sent"
            ),
            Ok(false) => warn!(
                failed = notification.failed_count,
                "failure notification not delivered"
            ),
            Err(err) => error!(error = %err, "failure notification errored"),
        }
    }
}

/// Renders notifications and writes them to the log instead of a mail relay.
#[derive(Debug, Clone)]
pub struct LogNotificationSender {
    recipients: Vec<String>,
    subject_prefix: String,
}

impl LogNotificationSender {
    pub fn new(recipients: Vec<String>, subject_prefix: impl Into<String>) -> Self {
        Self {
            recipients,
            subject_prefix: subject_prefix.into(),
        }
    }

    pub fn subject(&self, notification: &FailureNotification) -> String {
        format!(
            "{} - {} Failed Notices on {}",
            self.subject_prefix,
            notification.failed_count,
            notification.batch_date.format("%Y-%m-%d")
        )
    }

    pub fn body(&self, notification: &FailureNotification) -> String {
        let mut lines = vec![
            format!("Requested by: {}", notification.requested_by),
            format!(
                "Failed: {} of {}",
                notification.failed_count, notification.total_requested
            ),
        ];
        lines.extend(
            notification
                .results
                .iter()
                .filter(|result| result.outcome != ItemOutcome::Updated)
                .map(|result| {
                    format!(
                        "{} [{}] {}",
                        result.notice_no,
                        result.code.map(|code| code.as_str()).unwrap_or("-"),
                        result.message.as_deref().unwrap_or_default()
                    )
                }),
        );
        lines.join("\n")
    }
}

impl Default for LogNotificationSender {
    fn default() -> Self {
        Self::new(Vec::new(), DEFAULT_SUBJECT_PREFIX)
    }
}

impl NotificationSender for LogNotificationSender {
    fn notify_failures(
        &self,
        notification: &FailureNotification,
    ) -> Result<bool, NotificationError> {
        if self.recipients.is_empty() {
            warn!("no notification recipients configured");
            return Ok(false);
        }
        info!(
            recipients = %self.recipients.join(","),
            subject = %self.subject(notification),
            body = %self.body(notification),
            "failure notification"
        );
        Ok(true)
    }
}
