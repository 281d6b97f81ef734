//! Open message start event subscriptions.

use std::collections::BTreeMap;

use crate::protocol::{Key, MessageStartEventSubscriptionRecord};

/// An open subscription of a message start event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageStartSubscription {
    pub bpmn_process_id: String,
    pub process_definition_key: Key,
    pub start_event_id: String,
    pub message_name: String,
}

impl MessageStartSubscription {
    pub fn to_record(&self) -> MessageStartEventSubscriptionRecord {
        MessageStartEventSubscriptionRecord {
            bpmn_process_id: self.bpmn_process_id.clone(),
            process_definition_key: self.process_definition_key,
            start_event_id: self.start_event_id.clone(),
            message_name: self.message_name.clone(),
        }
    }
}

/// Subscriptions keyed by (process definition key, start event id).
#[derive(Debug, Default)]
pub struct MessageStartState {
    subscriptions: BTreeMap<(Key, String), MessageStartSubscription>,
}

impl MessageStartState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, process_definition_key: Key, start_event_id: &str) -> bool {
        self.subscriptions
            .contains_key(&(process_definition_key, start_event_id.to_string()))
    }

    pub fn put(&mut self, subscription: MessageStartSubscription) {
        self.subscriptions.insert(
            (
                subscription.process_definition_key,
                subscription.start_event_id.clone(),
            ),
            subscription,
        );
    }

    /// Remove and return every subscription of `bpmn_process_id` not owned by `keep`.
    pub fn remove_stale(
        &mut self,
        bpmn_process_id: &str,
        keep: Key,
    ) -> Vec<MessageStartSubscription> {
        let stale: Vec<(Key, String)> = self
            .subscriptions
            .iter()
            .filter(|(_, s)| {
                s.bpmn_process_id == bpmn_process_id && s.process_definition_key != keep
            })
            .map(|(k, _)| k.clone())
            .collect();
        stale
            .into_iter()
            .filter_map(|k| self.subscriptions.remove(&k))
            .collect()
    }

    /// Subscriptions waiting for `message_name`.
    pub fn subscriptions_for_message(&self, message_name: &str) -> Vec<&MessageStartSubscription> {
        self.subscriptions
            .values()
            .filter(|s| s.message_name == message_name)
            .collect()
    }

    pub fn subscriptions_for_process(
        &self,
        bpmn_process_id: &str,
    ) -> Vec<&MessageStartSubscription> {
        self.subscriptions
            .values()
            .filter(|s| s.bpmn_process_id == bpmn_process_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
