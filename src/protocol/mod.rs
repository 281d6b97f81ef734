//! Log protocol: keys, record classification and record values.

pub mod intent;
pub mod key;
pub mod value;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use intent::{
    DeploymentIntent, Intent, MessageStartEventSubscriptionIntent, ProcessIntent, RecordType,
    RejectionType, TimerIntent, ValueType,
};
pub use key::{Key, PartitionId, DEPLOYMENT_PARTITION, KEY_BITS, MAX_PARTITIONS};
pub use value::{
    DeploymentRecord, DeploymentResource, MessageStartEventSubscriptionRecord, ProcessMetadata,
    ProcessRecord, RecordValue, TimerRecord,
};

/// Log position of a record within its partition.
pub type Position = u64;

/// A command read from the log, as handed to a processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<V> {
    pub position: Position,
    /// Correlates the client response with the request.
    pub request_id: Uuid,
    pub value: V,
}

/// A record as it appears on the partition log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub position: Position,
    /// Position of the command this record was produced for.
    pub source_position: Option<Position>,
    /// `None` for rejections and commands that were never assigned a key.
    pub key: Option<Key>,
    pub record_type: RecordType,
    #[serde(flatten)]
    pub intent: Intent,
    pub rejection_type: Option<RejectionType>,
    pub rejection_reason: Option<String>,
    pub value: RecordValue,
}

impl Record {
    pub fn value_type(&self) -> ValueType {
        self.intent.value_type()
    }

    pub fn is_rejection(&self) -> bool {
        self.record_type == RecordType::CommandRejection
    }
}
