//! Moderator notification about pending submissions.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::repos::{RepoError, SubmissionsRepo};

const SOURCE: &str = "application::notifications";

pub const NOTIFICATION_SUBJECT: &str = "GopherPods";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub sender: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn pending_submissions(sender: &str, count: u64) -> Self {
        Self {
            sender: sender.to_owned(),
            subject: NOTIFICATION_SUBJECT.to_owned(),
            body: format!("There are {count} submissions"),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Idle,
    Notified { pending: u64 },
}

pub struct NotificationService {
    submissions: Arc<dyn SubmissionsRepo>,
    notifier: Arc<dyn Notifier>,
    sender: String,
}

impl NotificationService {
    pub fn new(
        submissions: Arc<dyn SubmissionsRepo>,
        notifier: Arc<dyn Notifier>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            submissions,
            notifier,
            sender: sender.into(),
        }
    }

    pub async fn pending_count(&self) -> Result<u64, NotifyError> {
        Ok(self.submissions.count_pending().await?)
    }

    /// Notify moderators when the queue is non-empty.
    pub async fn sweep(&self) -> Result<SweepOutcome, NotifyError> {
        let pending = self.pending_count().await?;
        if pending == 0 {
            debug!(target = SOURCE, "no pending submissions");
            return Ok(SweepOutcome::Idle);
        }

        self.notifier
            .notify(&Notification::pending_submissions(&self.sender, pending))
            .await?;
        info!(target = SOURCE, pending, "moderators notified");
        Ok(SweepOutcome::Notified { pending })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use time::OffsetDateTime;

    use super::*;
    use crate::application::repos::CreateSubmissionParams;
    use crate::infra::memory::InMemorySubmissions;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn submission(url: &str) -> CreateSubmissionParams {
        CreateSubmissionParams {
            submission_url: url.into(),
            show: None,
            title: None,
            description: None,
            episode_date: None,
            submitted_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn empty_queue_sends_nothing() {
        let notifier = Arc::new(RecordingNotifier::default());
        let service = NotificationService::new(
            Arc::new(InMemorySubmissions::default()),
            notifier.clone(),
            "noreply@example.com",
        );

        assert_eq!(service.sweep().await.expect("sweep"), SweepOutcome::Idle);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pending_queue_sends_count() {
        let submissions = Arc::new(InMemorySubmissions::default());
        for url in ["https://example.com/1", "https://example.com/2"] {
            submissions
                .create_submission(submission(url))
                .await
                .expect("create");
        }
        let notifier = Arc::new(RecordingNotifier::default());
        let service =
            NotificationService::new(submissions, notifier.clone(), "noreply@example.com");

        assert_eq!(
            service.sweep().await.expect("sweep"),
            SweepOutcome::Notified { pending: 2 }
        );
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "GopherPods");
        assert_eq!(sent[0].body, "There are 2 submissions");
        assert_eq!(sent[0].sender, "noreply@example.com");
    }
}
