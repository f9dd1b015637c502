use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::FlowError;

const DEFAULT_CONCURRENCY: usize = 8;

/// One logical notification addressed to one recipient. Immutable once
/// dispatched; fans out to exactly two delivery attempts (in-app record,
/// external push).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationPayload {
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// The in-app record written to the document store.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationRecord {
    pub id: String,
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    pub fn from_payload(payload: &NotificationPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_id: payload.recipient_id.clone(),
            title: payload.title.clone(),
            body: payload.body.clone(),
            link: payload.link.clone(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// In-app channel: upserts one notification record per recipient into the
/// document store.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, record: NotificationRecord) -> Result<(), FlowError>;
}

/// External channel: one push/email send per recipient per notification.
/// May fail independently of the in-app write.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<(), FlowError>;
}

/// Aggregate outcome of one dispatch call.
/// `sent_count + failed_count` always equals the recipient list size, and
/// `success` is true iff nothing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BatchResult {
    pub success: bool,
    pub message: String,
    pub sent_count: usize,
    pub failed_count: usize,
}

/// Accumulator folded over per-recipient outcomes.
#[derive(Debug, Default)]
struct BatchTally {
    sent: usize,
    failed: usize,
}

impl BatchTally {
    fn absorb(mut self, recipient_id: &str, outcome: Result<(), FlowError>) -> Self {
        match outcome {
            Ok(()) => self.sent += 1,
            Err(e) => {
                self.failed += 1;
                error!(recipient = %recipient_id, error = %e, "notification delivery failed");
            }
        }
        self
    }

    fn into_result(self) -> BatchResult {
        BatchResult {
            success: self.failed == 0,
            message: format!("Sent: {}, Failed: {}", self.sent, self.failed),
            sent_count: self.sent,
            failed_count: self.failed,
        }
    }
}

/// Fans one logical notification out to many recipients across the in-app
/// and external channels, isolating failures per recipient.
pub struct BulkDispatcher {
    store: Arc<dyn NotificationStore>,
    push: Arc<dyn PushChannel>,
    concurrency: usize,
}

impl BulkDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, push: Arc<dyn PushChannel>) -> Self {
        Self {
            store,
            push,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Bound the number of recipients in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Deliver `title`/`body` to every recipient. One recipient's failure
    /// never aborts the batch or skews another recipient's outcome.
    #[tracing::instrument(name = "dispatch_all", skip(self, recipient_ids, title, body, link), fields(recipients = recipient_ids.len()))]
    pub async fn dispatch_all(
        &self,
        recipient_ids: &[String],
        title: &str,
        body: &str,
        link: Option<&str>,
    ) -> BatchResult {
        let tally = stream::iter(recipient_ids)
            .map(|recipient_id| async move {
                let outcome = self.deliver_one(recipient_id, title, body, link).await;
                (recipient_id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .fold(BatchTally::default(), |tally, (recipient_id, outcome)| async move {
                tally.absorb(recipient_id, outcome)
            })
            .await;

        let result = tally.into_result();
        info!(
            sent = result.sent_count,
            failed = result.failed_count,
            "bulk dispatch finished"
        );
        result
    }

    /// Both channel writes for one recipient. The in-app record is written
    /// first and is intentionally not rolled back if the push fails:
    /// at-least-once on the in-app channel beats compensating transactions.
    async fn deliver_one(
        &self,
        recipient_id: &str,
        title: &str,
        body: &str,
        link: Option<&str>,
    ) -> Result<(), FlowError> {
        let payload = NotificationPayload {
            recipient_id: recipient_id.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            link: link.map(str::to_string),
        };
        self.store
            .create(NotificationRecord::from_payload(&payload))
            .await
            .map_err(|e| FlowError::Delivery(format!("in-app write: {e}")))?;
        self.push
            .send(&payload)
            .await
            .map_err(|e| FlowError::Delivery(format!("external send: {e}")))?;
        Ok(())
    }
}
