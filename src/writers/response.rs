//! Client responses.

use serde::Serialize;
use uuid::Uuid;

use crate::protocol::{Command, Intent, Key, RecordValue, RejectionType};

/// The outcome of a command as reported to the client that sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientResponse {
    Accepted {
        request_id: Uuid,
        key: Key,
        intent: Intent,
        value: RecordValue,
    },
    Rejected {
        request_id: Uuid,
        rejection_type: RejectionType,
        reason: String,
    },
}

impl ClientResponse {
    pub fn request_id(&self) -> Uuid {
        match self {
            ClientResponse::Accepted { request_id, .. }
            | ClientResponse::Rejected { request_id, .. } => *request_id,
        }
    }

    pub fn key(&self) -> Option<Key> {
        match self {
            ClientResponse::Accepted { key, .. } => Some(*key),
            ClientResponse::Rejected { .. } => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ClientResponse::Rejected { .. })
    }
}

/// Holds the response of the command currently being processed.
///
/// A later write replaces an earlier one; only the final outcome is sent.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    pending: Option<ClientResponse>,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_event_on_command<V>(
        &mut self,
        key: Key,
        intent: Intent,
        value: impl Into<RecordValue>,
        command: &Command<V>,
    ) {
        self.pending = Some(ClientResponse::Accepted {
            request_id: command.request_id,
            key,
            intent,
            value: value.into(),
        });
    }

    pub fn write_rejection_on_command<V>(
        &mut self,
        command: &Command<V>,
        rejection_type: RejectionType,
        reason: &str,
    ) {
        self.pending = Some(ClientResponse::Rejected {
            request_id: command.request_id,
            rejection_type,
            reason: reason.to_string(),
        });
    }

    pub fn take(&mut self) -> Option<ClientResponse> {
        self.pending.take()
    }
}
