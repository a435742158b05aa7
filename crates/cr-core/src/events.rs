//! Transition events and the notifier seam.
//!
//! After a transition commits, the service builds a [`ReviewEvent`] with its
//! recipient list and hands it to a [`Notifier`]. Delivery (mail, chat,
//! nothing) is the notifier's business.

use std::sync::Mutex;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::User;
use crate::enums::{ReviewEventKind, Session};

/// Someone who should hear about an event.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
}

impl From<&User> for Recipient {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.display_name(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ReviewEvent {
    pub kind: ReviewEventKind,
    pub review_id: String,
    pub schoology_id: String,
    /// The student's session, used as the subject prefix.
    pub session: Session,
    pub student: String,
    pub reviewer: Option<String>,
    pub recipients: Vec<Recipient>,
}

impl ReviewEvent {
    /// Subject line, e.g. `"AM | Review accepted by Jane Doe"`.
    #[must_use]
    pub fn subject(&self) -> String {
        let reviewer = self.reviewer.as_deref().unwrap_or("nobody");
        let body = match self.kind {
            ReviewEventKind::Created => format!("Review created by {}", self.student),
            ReviewEventKind::Claimed => format!("Review accepted by {reviewer}"),
            ReviewEventKind::Completed => format!("Review completed by {reviewer}"),
        };
        format!("{} | {body}", self.session)
    }

    /// The message a mail notifier would send from `from`. Recipients
    /// without an address are left out.
    #[must_use]
    pub fn message(&self, from: &str) -> OutgoingMessage {
        OutgoingMessage {
            from: from.to_string(),
            to: self
                .recipients
                .iter()
                .filter(|r| !r.email.is_empty())
                .map(|r| r.email.clone())
                .collect(),
            subject: self.subject(),
        }
    }
}

/// Envelope of one notification: sender, addresses and subject line.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
}

/// Pick the users that receive an event, dropping anyone who opted out.
#[must_use]
pub fn recipients_for<'a>(candidates: impl IntoIterator<Item = &'a User>) -> Vec<Recipient> {
    candidates
        .into_iter()
        .filter(|user| user.receive_notifications)
        .map(Recipient::from)
        .collect()
}

/// Receives events after the transition that produced them has committed.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &ReviewEvent);
}

/// Logs the message each event would produce through `tracing`. Used when
/// no delivery is configured.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier {
    sender: String,
}

impl TracingNotifier {
    #[must_use]
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, event: &ReviewEvent) {
        let message = event.message(&self.sender);
        if message.to.is_empty() {
            tracing::debug!(kind = %event.kind, review = %event.review_id, "no addressable recipients");
            return;
        }
        tracing::info!(
            kind = %event.kind,
            review = %event.review_id,
            from = %message.from,
            to = ?message.to,
            subject = %message.subject,
            "review notification"
        );
    }
}

/// Keeps every event in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ReviewEvent>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<ReviewEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &ReviewEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
