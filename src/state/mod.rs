//! Partition-local state.
//!
//! Each partition exclusively owns one [`PartitionState`]; only its
//! processing loop mutates it, so no locking is involved.

pub mod key_generator;
pub mod message_start_state;
pub mod process_state;
pub mod timer_state;
pub mod variable_state;

pub use key_generator::{KeyGenerator, PartitionKeyGenerator};
pub use message_start_state::{MessageStartState, MessageStartSubscription};
pub use process_state::{
    DefinitionDirectory, DeployedProcess, InMemoryProcessState, MutableProcessState,
};
pub use timer_state::{ElementInstance, InMemoryTimerState, TimerInstance, TimerSubscriptionStore};
pub use variable_state::{VariableSource, VariableState};

use crate::protocol::PartitionId;

/// All state owned by one partition's processing loop.
#[derive(Debug)]
pub struct PartitionState {
    pub partition_id: PartitionId,
    pub keys: PartitionKeyGenerator,
    pub processes: InMemoryProcessState,
    pub timers: InMemoryTimerState,
}

impl PartitionState {
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            keys: PartitionKeyGenerator::new(partition_id),
            processes: InMemoryProcessState::new(),
            timers: InMemoryTimerState::new(),
        }
    }
}
