//! Wiring of partitions, transport and background workers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::AbortHandle;
use tracing::info;

use super::{InboxTransport, Partition, PartitionHandle, PartitionMessage};
use crate::clock::Clock;
use crate::config::Config;
use crate::deployment::{
    ChannelDeploymentDistributor, ChannelMessageStartReactivator, DeploymentCreateProcessor,
    DeploymentDistributor, DeploymentReconciler, DeploymentTransformer, DistributionWorker,
    MessageStartSubscriptionManager, NoopDistributor,
};
use crate::expression::TimerExpressionEvaluator;
use crate::protocol::PartitionId;
use crate::state::MessageStartState;
use crate::utils::retry::distribution_backoff;
use crate::writers::LogStream;

/// A set of running partitions sharing one process.
pub struct Cluster {
    deployment_partition: PartitionId,
    partitions: BTreeMap<PartitionId, PartitionHandle>,
    message_subscriptions: Arc<RwLock<MessageStartState>>,
    tasks: Vec<AbortHandle>,
}

impl Cluster {
    /// Start every partition of `config`. Must be called within a tokio runtime.
    pub fn start(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let count = config.partition.partitions_count.max(1);
        let deployment_partition = config.partition.partition_id.clamp(1, count);
        let capacity = config.engine.command_queue_capacity.max(1);

        let mut inboxes = HashMap::new();
        let mut receivers = BTreeMap::new();
        let mut logs = BTreeMap::new();
        for id in 1..=count {
            let (sender, receiver) = mpsc::channel::<PartitionMessage>(capacity);
            inboxes.insert(id, sender);
            receivers.insert(id, receiver);
            logs.insert(id, LogStream::new(id));
        }
        let deployment_log = logs
            .get(&deployment_partition)
            .cloned()
            .unwrap_or_else(|| LogStream::new(deployment_partition));

        let mut tasks = Vec::new();

        let distributor: Arc<dyn DeploymentDistributor> =
            if count > 1 && config.distribution.enabled {
                let transport = InboxTransport::new(
                    inboxes.clone(),
                    Duration::from_millis(config.distribution.ack_timeout_ms),
                );
                let targets = (1..=count).filter(|id| *id != deployment_partition).collect();
                let (distributor, requests) = ChannelDeploymentDistributor::new();
                let worker = DistributionWorker::new(
                    targets,
                    Arc::new(transport),
                    deployment_log.clone(),
                    distribution_backoff(&config.distribution),
                );
                tasks.push(worker.spawn(requests).abort_handle());
                Arc::new(distributor)
            } else {
                Arc::new(NoopDistributor)
            };

        let message_subscriptions = Arc::new(RwLock::new(MessageStartState::new()));
        let (reactivator, reactivations) = ChannelMessageStartReactivator::new();
        let manager =
            MessageStartSubscriptionManager::new(message_subscriptions.clone(), deployment_log);
        tasks.push(manager.spawn(reactivations).abort_handle());

        let mut processor = Some(DeploymentCreateProcessor::new(
            Arc::new(DeploymentTransformer::new()),
            DeploymentReconciler::new(config.engine.retire_strategy),
            Arc::new(TimerExpressionEvaluator::without_variables()),
            clock,
            distributor,
            Arc::new(reactivator),
        ));

        let mut partitions = BTreeMap::new();
        for (id, receiver) in receivers {
            let log = logs.remove(&id).unwrap_or_else(|| LogStream::new(id));
            let create = if id == deployment_partition {
                processor.take()
            } else {
                None
            };
            let task = Partition::new(id, log.clone(), create).spawn(receiver);
            tasks.push(task.abort_handle());
            if let Some(inbox) = inboxes.get(&id) {
                partitions.insert(id, PartitionHandle::new(id, inbox.clone(), log));
            }
        }

        info!(
            partitions = count,
            deployment_partition,
            distribution = count > 1 && config.distribution.enabled,
            "cluster started"
        );
        Self {
            deployment_partition,
            partitions,
            message_subscriptions,
            tasks,
        }
    }

    /// Handle of the partition that processes deployment commands.
    pub fn deployment_partition(&self) -> &PartitionHandle {
        &self.partitions[&self.deployment_partition]
    }

    pub fn partition(&self, id: PartitionId) -> Option<&PartitionHandle> {
        self.partitions.get(&id)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &PartitionHandle> {
        self.partitions.values()
    }

    /// Open message start event subscriptions.
    pub fn message_subscriptions(&self) -> Arc<RwLock<MessageStartState>> {
        self.message_subscriptions.clone()
    }

    /// Stop every partition and worker.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("cluster stopped");
    }
}
