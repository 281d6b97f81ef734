//! Partition-local key generation.

use crate::protocol::{Key, PartitionId};

/// Issues cluster-unique, strictly increasing keys. Keys are never reused.
pub trait KeyGenerator {
    fn next_key(&mut self) -> Key;
}

/// Counter-based generator that encodes its partition id into every key.
#[derive(Debug, Clone)]
pub struct PartitionKeyGenerator {
    partition_id: PartitionId,
    next_counter: i64,
}

impl PartitionKeyGenerator {
    /// First issued key has counter 1.
    pub fn new(partition_id: PartitionId) -> Self {
        Self {
            partition_id,
            next_counter: 1,
        }
    }

    /// The key the next call to [`KeyGenerator::next_key`] will return.
    pub fn peek(&self) -> Key {
        Key::encode(self.partition_id, self.next_counter)
    }
}

impl KeyGenerator for PartitionKeyGenerator {
    fn next_key(&mut self) -> Key {
        let key = Key::encode(self.partition_id, self.next_counter);
        self.next_counter += 1;
        key
    }
}
