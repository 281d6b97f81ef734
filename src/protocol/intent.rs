//! Record classification: record type, value type, intent, rejection type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a record is a request, a fact, or a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    Command,
    Event,
    CommandRejection,
}

/// The kind of value a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Deployment,
    Process,
    Timer,
    MessageStartEventSubscription,
}

/// Intent of a record, scoped by value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "valueType", content = "intent", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Deployment(DeploymentIntent),
    Process(ProcessIntent),
    Timer(TimerIntent),
    MessageStartEventSubscription(MessageStartEventSubscriptionIntent),
}

impl Intent {
    pub fn value_type(self) -> ValueType {
        match self {
            Intent::Deployment(_) => ValueType::Deployment,
            Intent::Process(_) => ValueType::Process,
            Intent::Timer(_) => ValueType::Timer,
            Intent::MessageStartEventSubscription(_) => ValueType::MessageStartEventSubscription,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentIntent {
    Create,
    Created,
    Distributed,
    FullyDistributed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessIntent {
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerIntent {
    Created,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStartEventSubscriptionIntent {
    Opened,
    Closed,
}

/// Reason class attached to a command rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionType {
    InvalidArgument,
    ProcessingError,
    AlreadyExists,
    NotFound,
    InvalidState,
}

impl fmt::Display for RejectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectionType::InvalidArgument => "INVALID_ARGUMENT",
            RejectionType::ProcessingError => "PROCESSING_ERROR",
            RejectionType::AlreadyExists => "ALREADY_EXISTS",
            RejectionType::NotFound => "NOT_FOUND",
            RejectionType::InvalidState => "INVALID_STATE",
        };
        f.write_str(name)
    }
}
