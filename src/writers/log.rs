//! Append-only partition log.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::protocol::{
    Command, Intent, Key, PartitionId, Position, Record, RecordType, RecordValue, RejectionType,
};

/// The ordered record log of one partition.
///
/// Cloning yields another handle onto the same log. Positions are assigned
/// at append time and strictly increase.
#[derive(Debug, Clone)]
pub struct LogStream {
    partition_id: PartitionId,
    records: Arc<Mutex<Vec<Record>>>,
}

/// A record before it has been assigned a position.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub source_position: Option<Position>,
    pub key: Option<Key>,
    pub record_type: RecordType,
    pub intent: Intent,
    pub rejection_type: Option<RejectionType>,
    pub rejection_reason: Option<String>,
    pub value: RecordValue,
}

impl LogStream {
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn partition_id(&self) -> PartitionId {
        self.partition_id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record and return its position (1-based).
    pub fn append(&self, draft: RecordDraft) -> Position {
        let mut records = self.lock();
        let position = records.len() as Position + 1;
        records.push(Record {
            position,
            source_position: draft.source_position,
            key: draft.key,
            record_type: draft.record_type,
            intent: draft.intent,
            rejection_type: draft.rejection_type,
            rejection_reason: draft.rejection_reason,
            value: draft.value,
        });
        position
    }

    /// Append a command as received from a client.
    pub fn append_command(&self, intent: Intent, value: impl Into<RecordValue>) -> Position {
        self.append(RecordDraft {
            source_position: None,
            key: None,
            record_type: RecordType::Command,
            intent,
            rejection_type: None,
            rejection_reason: None,
            value: value.into(),
        })
    }

    /// Snapshot of all records written so far.
    pub fn records(&self) -> Vec<Record> {
        self.lock().clone()
    }

    /// Records written after `position`.
    pub fn records_after(&self, position: Position) -> Vec<Record> {
        self.lock()
            .iter()
            .filter(|r| r.position > position)
            .cloned()
            .collect()
    }

    pub fn last_position(&self) -> Position {
        self.lock().len() as Position
    }
}

/// Writes the follow-up records of the command currently being processed.
#[derive(Debug)]
pub struct LogWriter {
    log: LogStream,
    source_position: Option<Position>,
}

impl LogWriter {
    pub fn new(log: LogStream) -> Self {
        Self {
            log,
            source_position: None,
        }
    }

    /// Point follow-up records at the command being processed.
    pub fn set_source_position(&mut self, position: Position) {
        self.source_position = Some(position);
    }

    pub fn append_follow_up_event(
        &mut self,
        key: Key,
        intent: Intent,
        value: impl Into<RecordValue>,
    ) -> Position {
        self.log.append(RecordDraft {
            source_position: self.source_position,
            key: Some(key),
            record_type: RecordType::Event,
            intent,
            rejection_type: None,
            rejection_reason: None,
            value: value.into(),
        })
    }

    /// Reject a command. The rejection carries the command's original payload.
    pub fn append_rejection<V>(
        &mut self,
        command: &Command<V>,
        intent: Intent,
        rejection_type: RejectionType,
        reason: &str,
    ) -> Position
    where
        V: Clone + Into<RecordValue>,
    {
        self.log.append(RecordDraft {
            source_position: Some(command.position),
            key: None,
            record_type: RecordType::CommandRejection,
            intent,
            rejection_type: Some(rejection_type),
            rejection_reason: Some(reason.to_string()),
            value: command.value.clone().into(),
        })
    }

    pub fn log(&self) -> &LogStream {
        &self.log
    }
}
