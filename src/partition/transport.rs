//! In-process partition transport over the partitions' inboxes.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{DistributedDeployment, PartitionMessage};
use crate::deployment::distribution::{PartitionTransport, Result, TransportError};
use crate::protocol::{DeploymentRecord, Key, PartitionId};

/// Delivers deployments straight into the target partition's inbox.
pub struct InboxTransport {
    inboxes: HashMap<PartitionId, mpsc::Sender<PartitionMessage>>,
    ack_timeout: Duration,
}

impl InboxTransport {
    pub fn new(
        inboxes: HashMap<PartitionId, mpsc::Sender<PartitionMessage>>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            inboxes,
            ack_timeout,
        }
    }
}

#[async_trait]
impl PartitionTransport for InboxTransport {
    async fn send_deployment(
        &self,
        partition: PartitionId,
        deployment_key: Key,
        deployment: &DeploymentRecord,
    ) -> Result<()> {
        let inbox = self
            .inboxes
            .get(&partition)
            .ok_or(TransportError::Unreachable(partition))?;

        let (ack, acked) = oneshot::channel();
        inbox
            .send(PartitionMessage::Distribute(DistributedDeployment {
                deployment_key,
                deployment: deployment.clone(),
                ack,
            }))
            .await
            .map_err(|_| TransportError::Unreachable(partition))?;

        match tokio::time::timeout(self.ack_timeout, acked).await {
            Err(_) => Err(TransportError::Timeout {
                partition,
                timeout: self.ack_timeout,
            }),
            Ok(Err(_)) => Err(TransportError::Unreachable(partition)),
            Ok(Ok(Err(e))) => Err(TransportError::Failed {
                partition,
                reason: e.to_string(),
            }),
            Ok(Ok(Ok(()))) => Ok(()),
        }
    }
}
