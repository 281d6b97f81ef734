//! Message start event reactivation after a deployment.
//!
//! When a deployment makes a new version the latest one, subscriptions of
//! older versions of the same process id are closed and the new version's
//! message start events are opened. The processor only resolves what to do
//! and enqueues it; [`MessageStartSubscriptionManager`] applies it.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::{
    DeploymentRecord, Intent, Key, MessageStartEventSubscriptionIntent, RecordType,
};
use crate::state::{DefinitionDirectory, MessageStartState, MessageStartSubscription};
use crate::writers::{LogStream, RecordDraft};

/// Triggers message start event reactivation for an accepted deployment.
///
/// Called from the processing loop; must not block.
pub trait MessageStartReactivator: Send + Sync {
    fn reactivate(
        &self,
        deployment_key: Key,
        deployment: &DeploymentRecord,
        directory: &dyn DefinitionDirectory,
    );
}

/// Message start events of one process version that is now the latest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestVersion {
    pub bpmn_process_id: String,
    pub process_definition_key: Key,
    /// `(start event id, message name)`, in document order.
    pub message_start_events: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactivationRequest {
    pub deployment_key: Key,
    pub processes: Vec<LatestVersion>,
}

/// Resolve the processes of `deployment` that are the latest version of their id.
pub fn latest_versions(
    deployment: &DeploymentRecord,
    directory: &dyn DefinitionDirectory,
) -> Vec<LatestVersion> {
    deployment
        .processes_metadata
        .iter()
        .filter_map(|metadata| {
            let latest = directory.latest_by_id(&metadata.bpmn_process_id)?;
            if latest.key != metadata.process_definition_key {
                return None;
            }
            Some(LatestVersion {
                bpmn_process_id: latest.bpmn_process_id.clone(),
                process_definition_key: latest.key,
                message_start_events: latest
                    .process
                    .message_start_events()
                    .filter_map(|event| {
                        event
                            .message_name()
                            .map(|name| (event.id.clone(), name.to_string()))
                    })
                    .collect(),
            })
        })
        .collect()
}

/// Reactivator backed by an unbounded channel drained by a
/// [`MessageStartSubscriptionManager`].
#[derive(Debug, Clone)]
pub struct ChannelMessageStartReactivator {
    sender: mpsc::UnboundedSender<ReactivationRequest>,
}

impl ChannelMessageStartReactivator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReactivationRequest>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl MessageStartReactivator for ChannelMessageStartReactivator {
    fn reactivate(
        &self,
        deployment_key: Key,
        deployment: &DeploymentRecord,
        directory: &dyn DefinitionDirectory,
    ) {
        let processes = latest_versions(deployment, directory);
        if processes.is_empty() {
            return;
        }
        let request = ReactivationRequest {
            deployment_key,
            processes,
        };
        if self.sender.send(request).is_err() {
            warn!(deployment_key = %deployment_key, "message subscription manager stopped");
        }
    }
}

/// Owns the open message start event subscriptions of a partition.
pub struct MessageStartSubscriptionManager {
    state: Arc<RwLock<MessageStartState>>,
    log: LogStream,
}

impl MessageStartSubscriptionManager {
    pub fn new(state: Arc<RwLock<MessageStartState>>, log: LogStream) -> Self {
        Self { state, log }
    }

    pub fn spawn(self, receiver: mpsc::UnboundedReceiver<ReactivationRequest>) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    pub async fn run(self, mut receiver: mpsc::UnboundedReceiver<ReactivationRequest>) {
        while let Some(request) = receiver.recv().await {
            self.apply(request).await;
        }
        debug!("reactivation channel closed, manager exiting");
    }

    /// Close stale subscriptions and open missing ones. Returns `(closed, opened)`.
    pub async fn apply(&self, request: ReactivationRequest) -> (usize, usize) {
        let mut state = self.state.write().await;
        let (mut closed, mut opened) = (0, 0);

        for process in request.processes {
            let stale_subscriptions =
                state.remove_stale(&process.bpmn_process_id, process.process_definition_key);
            for stale in stale_subscriptions {
                self.write(&stale, MessageStartEventSubscriptionIntent::Closed);
                closed += 1;
            }

            for (start_event_id, message_name) in process.message_start_events {
                if state.exists(process.process_definition_key, &start_event_id) {
                    continue;
                }
                let subscription = MessageStartSubscription {
                    bpmn_process_id: process.bpmn_process_id.clone(),
                    process_definition_key: process.process_definition_key,
                    start_event_id,
                    message_name,
                };
                self.write(&subscription, MessageStartEventSubscriptionIntent::Opened);
                state.put(subscription);
                opened += 1;
            }
        }

        if closed + opened > 0 {
            info!(
                deployment_key = %request.deployment_key,
                closed,
                opened,
                "message start event subscriptions updated"
            );
        }
        (closed, opened)
    }

    fn write(
        &self,
        subscription: &MessageStartSubscription,
        intent: MessageStartEventSubscriptionIntent,
    ) {
        self.log.append(RecordDraft {
            source_position: None,
            key: Some(subscription.process_definition_key),
            record_type: RecordType::Event,
            intent: Intent::MessageStartEventSubscription(intent),
            rejection_type: None,
            rejection_reason: None,
            value: subscription.to_record().into(),
        });
    }
}
