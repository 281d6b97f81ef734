//! procdeploy - deployment processing for a partitioned workflow engine
//!
//! Processes `Deployment Create` commands on a single-writer partition loop:
//! validates and versions process definitions, reconciles timer start event
//! subscriptions, writes the acceptance or rejection to the partition log and
//! answers the client, then distributes the deployment to the other
//! partitions and reactivates message start events.

pub mod behavior;
pub mod clock;
pub mod config;
pub mod deployment;
pub mod expression;
pub mod model;
pub mod partition;
pub mod protocol;
pub mod state;
pub mod utils;
pub mod writers;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
