//! Record values written to the log.

use serde::{Deserialize, Serialize};

use super::key::Key;
use crate::state::timer_state::ElementInstance;

/// A deployment command or event payload.
///
/// Built from the raw command (resources only). The validator fills in
/// `processes_metadata` before the deployment is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub resources: Vec<DeploymentResource>,
    #[serde(default)]
    pub processes_metadata: Vec<ProcessMetadata>,
}

impl DeploymentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to the deployment.
    pub fn with_resource(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.resources.push(DeploymentResource {
            resource_name: name.into(),
            resource: content.into(),
        });
        self
    }
}

/// A raw resource as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResource {
    pub resource_name: String,
    pub resource: String,
}

/// One process definition version contained in a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetadata {
    pub bpmn_process_id: String,
    pub version: u32,
    pub process_definition_key: Key,
    pub resource_name: String,
    pub checksum: String,
    /// Same content as the latest deployed version; key and version are reused.
    pub duplicate: bool,
}

/// Payload of a `Process Created` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub bpmn_process_id: String,
    pub version: u32,
    pub process_definition_key: Key,
    pub resource_name: String,
    pub checksum: String,
}

/// Payload of timer events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub element_instance: ElementInstance,
    pub process_definition_key: Key,
    pub target_element_id: String,
    /// Epoch milliseconds.
    pub due_date: i64,
    /// `None` means the timer repeats forever.
    pub repetitions: Option<u32>,
}

/// Payload of message start event subscription events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStartEventSubscriptionRecord {
    pub bpmn_process_id: String,
    pub process_definition_key: Key,
    pub start_event_id: String,
    pub message_name: String,
}

/// Any value that can appear on the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Deployment(DeploymentRecord),
    Process(ProcessRecord),
    Timer(TimerRecord),
    MessageStartEventSubscription(MessageStartEventSubscriptionRecord),
}

impl From<DeploymentRecord> for RecordValue {
    fn from(value: DeploymentRecord) -> Self {
        RecordValue::Deployment(value)
    }
}

impl From<ProcessRecord> for RecordValue {
    fn from(value: ProcessRecord) -> Self {
        RecordValue::Process(value)
    }
}

impl From<TimerRecord> for RecordValue {
    fn from(value: TimerRecord) -> Self {
        RecordValue::Timer(value)
    }
}

impl From<MessageStartEventSubscriptionRecord> for RecordValue {
    fn from(value: MessageStartEventSubscriptionRecord) -> Self {
        RecordValue::MessageStartEventSubscription(value)
    }
}
