//! Catch-event subscription service for timers.
//!
//! Every store mutation goes through here so it is mirrored by a timer
//! event on the log.

use tracing::debug;

use crate::clock::Clock;
use crate::model::Timer;
use crate::protocol::{Intent, Key, TimerIntent};
use crate::state::{ElementInstance, KeyGenerator, TimerInstance, TimerSubscriptionStore};
use crate::writers::LogWriter;

/// Timer subscription operations used by deployment reconciliation.
pub trait CatchEventSubscriptions {
    /// Visit every start-event timer on the partition.
    fn for_each_start_event_timer(&self, visitor: &mut dyn FnMut(&TimerInstance));

    /// Start-event timers owned by one process definition.
    fn start_event_timers_of(&self, process_definition_key: Key) -> Vec<TimerInstance>;

    fn subscribe_to_timer_event(
        &mut self,
        element_instance: ElementInstance,
        process_instance: ElementInstance,
        process_definition_key: Key,
        target_element_id: &str,
        timer: &Timer,
    ) -> Key;

    fn unsubscribe_from_timer_event(&mut self, timer: &TimerInstance);
}

/// Store-backed implementation, borrowed for the duration of one command.
pub struct CatchEventBehavior<'a> {
    timers: &'a mut dyn TimerSubscriptionStore,
    keys: &'a mut dyn KeyGenerator,
    clock: &'a dyn Clock,
    log: &'a mut LogWriter,
}

impl<'a> CatchEventBehavior<'a> {
    pub fn new(
        timers: &'a mut dyn TimerSubscriptionStore,
        keys: &'a mut dyn KeyGenerator,
        clock: &'a dyn Clock,
        log: &'a mut LogWriter,
    ) -> Self {
        Self {
            timers,
            keys,
            clock,
            log,
        }
    }
}

impl CatchEventSubscriptions for CatchEventBehavior<'_> {
    fn for_each_start_event_timer(&self, visitor: &mut dyn FnMut(&TimerInstance)) {
        self.timers.for_each_start_event_timer(visitor);
    }

    fn start_event_timers_of(&self, process_definition_key: Key) -> Vec<TimerInstance> {
        self.timers.start_event_timers_of(process_definition_key)
    }

    fn subscribe_to_timer_event(
        &mut self,
        element_instance: ElementInstance,
        process_instance: ElementInstance,
        process_definition_key: Key,
        target_element_id: &str,
        timer: &Timer,
    ) -> Key {
        let key = self.keys.next_key();
        let instance = TimerInstance {
            key,
            element_instance,
            process_instance,
            process_definition_key,
            target_element_id: target_element_id.to_string(),
            due_date: timer.due_date(self.clock.now()),
            repetitions: timer.repetitions(),
        };
        debug!(
            timer_key = %key,
            process_definition_key = %process_definition_key,
            target_element_id,
            due_date = instance.due_date,
            "subscribing to timer"
        );
        self.log
            .append_follow_up_event(key, Intent::Timer(TimerIntent::Created), instance.to_record());
        self.timers.put(instance);
        key
    }

    fn unsubscribe_from_timer_event(&mut self, timer: &TimerInstance) {
        debug!(
            timer_key = %timer.key,
            process_definition_key = %timer.process_definition_key,
            target_element_id = %timer.target_element_id,
            "unsubscribing from timer"
        );
        self.log.append_follow_up_event(
            timer.key,
            Intent::Timer(TimerIntent::Canceled),
            timer.to_record(),
        );
        self.timers.remove(timer);
    }
}
