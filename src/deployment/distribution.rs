//! Fan-out of accepted deployments to the other partitions.
//!
//! The processor only enqueues. A [`DistributionWorker`] task pushes each
//! deployment to every other partition through a [`PartitionTransport`],
//! retrying with exponential backoff, and writes `Deployment FullyDistributed`
//! once all partitions have acknowledged.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{DeploymentIntent, DeploymentRecord, Intent, Key, PartitionId, RecordType};
use crate::writers::{LogStream, RecordDraft};

/// Hands accepted deployments to the distribution machinery.
///
/// Called from the processing loop; must not block.
pub trait DeploymentDistributor: Send + Sync {
    fn distribute(&self, deployment_key: Key, deployment: &DeploymentRecord);
}

/// Distributor for a cluster with a single partition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDistributor;

impl DeploymentDistributor for NoopDistributor {
    fn distribute(&self, deployment_key: Key, _deployment: &DeploymentRecord) {
        debug!(deployment_key = %deployment_key, "single partition, distribution skipped");
    }
}

/// A deployment queued for distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRequest {
    pub deployment_key: Key,
    pub deployment: DeploymentRecord,
}

/// Distributor backed by an unbounded channel drained by a [`DistributionWorker`].
#[derive(Debug, Clone)]
pub struct ChannelDeploymentDistributor {
    sender: mpsc::UnboundedSender<DistributionRequest>,
}

impl ChannelDeploymentDistributor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DistributionRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl DeploymentDistributor for ChannelDeploymentDistributor {
    fn distribute(&self, deployment_key: Key, deployment: &DeploymentRecord) {
        let request = DistributionRequest {
            deployment_key,
            deployment: deployment.clone(),
        };
        if self.sender.send(request).is_err() {
            warn!(
                deployment_key = %deployment_key,
                "distribution worker stopped, deployment not distributed"
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("partition {0} is not reachable")]
    Unreachable(PartitionId),

    #[error("partition {partition} did not acknowledge within {timeout:?}")]
    Timeout {
        partition: PartitionId,
        timeout: Duration,
    },

    #[error("partition {partition} failed to apply deployment: {reason}")]
    Failed {
        partition: PartitionId,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Delivers a deployment to another partition and waits for its acknowledgement.
#[async_trait]
pub trait PartitionTransport: Send + Sync {
    async fn send_deployment(
        &self,
        partition: PartitionId,
        deployment_key: Key,
        deployment: &DeploymentRecord,
    ) -> Result<()>;
}

/// Drains distribution requests and pushes them to the other partitions.
pub struct DistributionWorker {
    targets: Vec<PartitionId>,
    transport: Arc<dyn PartitionTransport>,
    log: LogStream,
    backoff: ExponentialBuilder,
}

impl DistributionWorker {
    /// `log` is the deployment partition's log; `targets` every other partition.
    pub fn new(
        targets: Vec<PartitionId>,
        transport: Arc<dyn PartitionTransport>,
        log: LogStream,
        backoff: ExponentialBuilder,
    ) -> Self {
        Self {
            targets,
            transport,
            log,
            backoff,
        }
    }

    pub fn spawn(self, receiver: mpsc::UnboundedReceiver<DistributionRequest>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<DistributionRequest>) {
        while let Some(request) = receiver.recv().await {
            self.distribute(request).await;
        }
        debug!("distribution channel closed, worker exiting");
    }

    /// Returns whether every partition acknowledged.
    #[tracing::instrument(
        name = "deployment.distribute",
        skip_all,
        fields(deployment_key = %request.deployment_key, partitions = self.targets.len())
    )]
    pub async fn distribute(&self, request: DistributionRequest) -> bool {
        let sends = self
            .targets
            .iter()
            .map(|&partition| self.send_with_retry(partition, &request));
        let results = futures::future::join_all(sends).await;

        let mut complete = true;
        for (partition, result) in self.targets.iter().zip(results) {
            match result {
                Ok(()) => debug!(partition, "deployment acknowledged"),
                Err(e) => {
                    error!(partition, error = %e, "deployment distribution failed after retries");
                    complete = false;
                }
            }
        }
        if !complete {
            return false;
        }

        self.log.append(RecordDraft {
            source_position: None,
            key: Some(request.deployment_key),
            record_type: RecordType::Event,
            intent: Intent::Deployment(DeploymentIntent::FullyDistributed),
            rejection_type: None,
            rejection_reason: None,
            value: request.deployment.into(),
        });
        info!("deployment fully distributed");
        true
    }

    async fn send_with_retry(
        &self,
        partition: PartitionId,
        request: &DistributionRequest,
    ) -> Result<()> {
        (|| async {
            self.transport
                .send_deployment(partition, request.deployment_key, &request.deployment)
                .await
        })
        .retry(self.backoff)
        .notify(|err: &TransportError, dur: Duration| {
            warn!(partition, error = %err, delay = ?dur, "distribution failed, retrying");
        })
        .await
    }
}
