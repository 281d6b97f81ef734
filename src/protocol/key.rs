//! Cluster-unique record keys.
//!
//! A key carries the id of the partition that generated it in its upper bits,
//! so keys issued by different partitions never collide.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of low bits available for the per-partition counter.
pub const KEY_BITS: u32 = 51;

/// Highest partition id whose keys stay positive.
pub const MAX_PARTITIONS: PartitionId = (1 << (63 - KEY_BITS)) - 1;

/// Partition that owns deployment processing.
pub const DEPLOYMENT_PARTITION: PartitionId = 1;

/// Partition identifier (1-based).
pub type PartitionId = u16;

/// A cluster-unique, monotonically increasing record key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(i64);

impl Key {
    /// Encode a partition id and a partition-local counter into a key.
    pub fn encode(partition_id: PartitionId, counter: i64) -> Self {
        Self(((partition_id as i64) << KEY_BITS) + counter)
    }

    /// Wrap a raw key value.
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    /// Partition that generated this key.
    pub fn partition_id(self) -> PartitionId {
        (self.0 >> KEY_BITS) as PartitionId
    }

    /// Partition-local part of the key.
    pub fn counter(self) -> i64 {
        self.0 & ((1_i64 << KEY_BITS) - 1)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
