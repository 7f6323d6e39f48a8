//! Client-side message feed.
//!
//! Chat delivery is pull-based: a viewer of a ticket fetches the full message
//! list on subscribe and then again every poll interval until the
//! subscription is torn down. Each poll replaces the local list wholesale
//! (never appends), so duplicates cannot accumulate; sending appends the
//! created message locally right away and the next poll reconciles with
//! server truth. Within one interval every subscriber observes every
//! persisted message in creation order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// One chat entry as the listing endpoint returns it. Unknown fields (the
/// embedded sender, for one) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {status}")]
    Api { status: u16 },
}

/// Where the feed gets its messages. The HTTP implementation below talks to
/// the ticket API; tests substitute an in-memory source.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch(&self, ticket_id: Uuid) -> Result<Vec<FeedMessage>, FeedError>;
    async fn send(&self, ticket_id: Uuid, body: &str) -> Result<FeedMessage, FeedError>;
}

/// `MessageSource` over the REST API with bearer authentication.
pub struct HttpMessageSource {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpMessageSource {
    /// `base_url` is the API root, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            token: token.into(),
        }
    }

    fn messages_url(&self, ticket_id: Uuid) -> String {
        format!("{}/tickets/{}/messages", self.base_url, ticket_id)
    }
}

#[async_trait]
impl MessageSource for HttpMessageSource {
    async fn fetch(&self, ticket_id: Uuid) -> Result<Vec<FeedMessage>, FeedError> {
        let resp = self
            .client
            .get(self.messages_url(ticket_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FeedError::Api {
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json().await?)
    }

    async fn send(&self, ticket_id: Uuid, body: &str) -> Result<FeedMessage, FeedError> {
        let resp = self
            .client
            .post(self.messages_url(ticket_id))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "message": body }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(FeedError::Api {
                status: resp.status().as_u16(),
            });
        }
        Ok(resp.json().await?)
    }
}

/// Factory for per-ticket subscriptions sharing one source.
pub struct MessageFeed {
    source: Arc<dyn MessageSource>,
    poll_interval: Duration,
}

impl MessageFeed {
    pub fn new(source: Arc<dyn MessageSource>) -> Self {
        Self {
            source,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start polling one ticket. The first fetch fires immediately, then one
    /// per interval until the returned handle is stopped or dropped.
    pub fn subscribe(&self, ticket_id: Uuid) -> FeedSubscription {
        let (tx, rx) = watch::channel(Vec::new());
        let tx = Arc::new(tx);
        let cancel = CancellationToken::new();

        tokio::spawn(poll_loop(
            Arc::clone(&self.source),
            ticket_id,
            self.poll_interval,
            Arc::clone(&tx),
            cancel.clone(),
        ));

        FeedSubscription {
            ticket_id,
            source: Arc::clone(&self.source),
            tx,
            rx,
            cancel,
        }
    }
}

async fn poll_loop(
    source: Arc<dyn MessageSource>,
    ticket_id: Uuid,
    poll_interval: Duration,
    tx: Arc<watch::Sender<Vec<FeedMessage>>>,
    cancel: CancellationToken,
) {
    let mut tick = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tick.tick() => match source.fetch(ticket_id).await {
                // Full replacement: server truth wins over anything local.
                Ok(messages) => {
                    tx.send_replace(messages);
                }
                Err(err) => {
                    log::warn!("Message poll for ticket {} failed: {}", ticket_id, err);
                }
            },
        }
    }
}

/// Live view of one ticket's chat. Dropping the handle stops the poller.
pub struct FeedSubscription {
    ticket_id: Uuid,
    source: Arc<dyn MessageSource>,
    tx: Arc<watch::Sender<Vec<FeedMessage>>>,
    rx: watch::Receiver<Vec<FeedMessage>>,
    cancel: CancellationToken,
}

impl FeedSubscription {
    pub fn ticket_id(&self) -> Uuid {
        self.ticket_id
    }

    /// Current snapshot, oldest first.
    pub fn messages(&self) -> Vec<FeedMessage> {
        self.rx.borrow().clone()
    }

    /// Wait for the snapshot to change (a poll landed or a send appended).
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.rx.changed().await
    }

    /// Send a message and append it locally without waiting for the next
    /// poll tick.
    pub async fn send(&self, body: &str) -> Result<FeedMessage, FeedError> {
        let message = self.source.send(self.ticket_id, body).await?;
        self.tx.send_modify(|messages| messages.push(message.clone()));
        Ok(message)
    }

    /// Stop polling. Idempotent; also invoked on drop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
