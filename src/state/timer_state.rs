//! Persisted timer subscriptions.
//!
//! Start-event timers have no element instance yet; they are stored under
//! [`ElementInstance::NotInstantiated`] and additionally indexed by the
//! process definition that owns them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::protocol::{Key, TimerRecord};

/// The element instance a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "state", content = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementInstance {
    Instantiated(Key),
    /// Timer of a start event; no process instance exists yet.
    NotInstantiated,
}

/// A persisted timer subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerInstance {
    pub key: Key,
    pub element_instance: ElementInstance,
    pub process_instance: ElementInstance,
    pub process_definition_key: Key,
    pub target_element_id: String,
    /// Epoch milliseconds.
    pub due_date: i64,
    pub repetitions: Option<u32>,
}

impl TimerInstance {
    pub fn is_start_event_timer(&self) -> bool {
        self.element_instance == ElementInstance::NotInstantiated
    }

    pub fn to_record(&self) -> TimerRecord {
        TimerRecord {
            element_instance: self.element_instance,
            process_definition_key: self.process_definition_key,
            target_element_id: self.target_element_id.clone(),
            due_date: self.due_date,
            repetitions: self.repetitions,
        }
    }
}

/// Storage of timer subscriptions for one partition.
///
/// Only the processing path of the owning partition mutates it.
pub trait TimerSubscriptionStore {
    fn put(&mut self, timer: TimerInstance);

    fn remove(&mut self, timer: &TimerInstance);

    fn get(&self, key: Key) -> Option<&TimerInstance>;

    /// Visit every start-event timer on the partition, in key order.
    fn for_each_start_event_timer(&self, visitor: &mut dyn FnMut(&TimerInstance));

    /// Start-event timers owned by one process definition, in key order.
    fn start_event_timers_of(&self, process_definition_key: Key) -> Vec<TimerInstance>;

    /// Visit timers due at or before `until`, earliest first. Stop when the visitor returns false.
    fn for_each_due_timer(&self, until: i64, visitor: &mut dyn FnMut(&TimerInstance) -> bool);
}

#[derive(Debug, Default)]
pub struct InMemoryTimerState {
    timers: HashMap<Key, TimerInstance>,
    by_element_instance: BTreeMap<ElementInstance, BTreeSet<Key>>,
    start_events_by_definition: HashMap<Key, BTreeSet<Key>>,
    due_dates: BTreeSet<(i64, Key)>,
}

impl InMemoryTimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Timers of one element instance, in key order.
    pub fn timers_for_element_instance(
        &self,
        element_instance: ElementInstance,
    ) -> Vec<&TimerInstance> {
        self.by_element_instance
            .get(&element_instance)
            .into_iter()
            .flatten()
            .filter_map(|key| self.timers.get(key))
            .collect()
    }
}

impl TimerSubscriptionStore for InMemoryTimerState {
    fn put(&mut self, timer: TimerInstance) {
        if let Some(previous) = self.timers.get(&timer.key).cloned() {
            self.remove(&previous);
        }
        self.by_element_instance
            .entry(timer.element_instance)
            .or_default()
            .insert(timer.key);
        if timer.is_start_event_timer() {
            self.start_events_by_definition
                .entry(timer.process_definition_key)
                .or_default()
                .insert(timer.key);
        }
        self.due_dates.insert((timer.due_date, timer.key));
        self.timers.insert(timer.key, timer);
    }

    fn remove(&mut self, timer: &TimerInstance) {
        let Some(stored) = self.timers.remove(&timer.key) else {
            return;
        };
        if let Some(keys) = self.by_element_instance.get_mut(&stored.element_instance) {
            keys.remove(&stored.key);
            if keys.is_empty() {
                self.by_element_instance.remove(&stored.element_instance);
            }
        }
        if let Some(keys) = self
            .start_events_by_definition
            .get_mut(&stored.process_definition_key)
        {
            keys.remove(&stored.key);
            if keys.is_empty() {
                self.start_events_by_definition
                    .remove(&stored.process_definition_key);
            }
        }
        self.due_dates.remove(&(stored.due_date, stored.key));
    }

    fn get(&self, key: Key) -> Option<&TimerInstance> {
        self.timers.get(&key)
    }

    fn for_each_start_event_timer(&self, visitor: &mut dyn FnMut(&TimerInstance)) {
        for timer in self.timers_for_element_instance(ElementInstance::NotInstantiated) {
            visitor(timer);
        }
    }

    fn start_event_timers_of(&self, process_definition_key: Key) -> Vec<TimerInstance> {
        self.start_events_by_definition
            .get(&process_definition_key)
            .into_iter()
            .flatten()
            .filter_map(|key| self.timers.get(key).cloned())
            .collect()
    }

    fn for_each_due_timer(&self, until: i64, visitor: &mut dyn FnMut(&TimerInstance) -> bool) {
        for (due_date, key) in &self.due_dates {
            if *due_date > until {
                break;
            }
            if let Some(timer) = self.timers.get(key) {
                if !visitor(timer) {
                    break;
                }
            }
        }
    }
}
