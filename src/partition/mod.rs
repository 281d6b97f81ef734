//! Partition runtime.
//!
//! Each partition runs a single-writer loop on its own tokio task. Commands
//! and distributed deployments arrive on a bounded channel and are processed
//! strictly one at a time, so processors never observe concurrent mutation
//! of partition state.

pub mod cluster;
pub mod transport;

pub use cluster::Cluster;
pub use transport::InboxTransport;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::deployment::{
    DeploymentCreateProcessor, DeploymentDistributeProcessor, DistributeError, ProcessingError,
};
use crate::protocol::{
    Command, DeploymentIntent, DeploymentRecord, Intent, Key, PartitionId, Position,
};
use crate::state::PartitionState;
use crate::writers::{ClientResponse, LogStream, LogWriter, Writers};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("partition {0} does not process deployment commands")]
    NotDeploymentPartition(PartitionId),

    #[error("partition {0} is not running")]
    Stopped(PartitionId),

    #[error("no response written for command at position {0}")]
    NoResponse(Position),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

pub type Result<T> = std::result::Result<T, PartitionError>;

/// A deployment command submitted by a client.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub request_id: Uuid,
    pub deployment: DeploymentRecord,
    pub reply: oneshot::Sender<Result<ClientResponse>>,
}

/// A deployment pushed from the deployment partition.
#[derive(Debug)]
pub struct DistributedDeployment {
    pub deployment_key: Key,
    pub deployment: DeploymentRecord,
    pub ack: oneshot::Sender<std::result::Result<(), DistributeError>>,
}

#[derive(Debug)]
pub enum PartitionMessage {
    Deploy(CommandEnvelope),
    Distribute(DistributedDeployment),
}

/// State, log and processors of one partition.
pub struct Partition {
    id: PartitionId,
    state: PartitionState,
    log: LogStream,
    writers: Writers,
    create: Option<DeploymentCreateProcessor>,
    receive: DeploymentDistributeProcessor,
}

impl Partition {
    /// `create` is only set on the partition that processes deployment commands.
    pub fn new(id: PartitionId, log: LogStream, create: Option<DeploymentCreateProcessor>) -> Self {
        Self {
            id,
            state: PartitionState::new(id),
            writers: Writers::new(log.clone()),
            log,
            create,
            receive: DeploymentDistributeProcessor::new(),
        }
    }

    pub fn spawn(self, inbox: mpsc::Receiver<PartitionMessage>) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run(inbox))
    }

    /// Process messages until the inbox closes or state becomes inconsistent.
    #[tracing::instrument(name = "partition.run", skip_all, fields(partition = self.id))]
    pub async fn run(mut self, mut inbox: mpsc::Receiver<PartitionMessage>) -> Result<()> {
        while let Some(message) = inbox.recv().await {
            match message {
                PartitionMessage::Deploy(envelope) => {
                    let result = self.deploy(envelope.request_id, envelope.deployment);
                    if let Err(PartitionError::Processing(e)) = &result {
                        error!(error = %e, "partition state inconsistent, stopping");
                        let response = self
                            .writers
                            .response
                            .take()
                            .ok_or_else(|| PartitionError::Processing(e.clone()));
                        let _ = envelope.reply.send(response);
                        return Err(PartitionError::Processing(e.clone()));
                    }
                    let _ = envelope.reply.send(result);
                }
                PartitionMessage::Distribute(distributed) => {
                    let mut log = LogWriter::new(self.log.clone());
                    let result = self.receive.process(
                        distributed.deployment_key,
                        &distributed.deployment,
                        &mut self.state.processes,
                        &mut log,
                    );
                    if let Err(e) = &result {
                        error!(error = %e, "failed to apply distributed deployment");
                    }
                    let _ = distributed.ack.send(result);
                }
            }
        }
        debug!("inbox closed, partition stopping");
        Ok(())
    }

    fn deploy(&mut self, request_id: Uuid, deployment: DeploymentRecord) -> Result<ClientResponse> {
        let processor = self
            .create
            .as_ref()
            .ok_or(PartitionError::NotDeploymentPartition(self.id))?;
        let position = self
            .log
            .append_command(Intent::Deployment(DeploymentIntent::Create), deployment.clone());
        let command = Command {
            position,
            request_id,
            value: deployment,
        };
        processor.process(&command, &mut self.state, &mut self.writers)?;
        self.writers
            .response
            .take()
            .ok_or(PartitionError::NoResponse(position))
    }
}

/// Client-side handle onto a running partition.
#[derive(Debug, Clone)]
pub struct PartitionHandle {
    id: PartitionId,
    inbox: mpsc::Sender<PartitionMessage>,
    log: LogStream,
}

impl PartitionHandle {
    pub fn new(id: PartitionId, inbox: mpsc::Sender<PartitionMessage>, log: LogStream) -> Self {
        Self { id, inbox, log }
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    /// The partition's log, readable while the partition runs.
    pub fn log(&self) -> &LogStream {
        &self.log
    }

    /// Submit a deployment command and wait for the client response.
    pub async fn deploy(&self, deployment: DeploymentRecord) -> Result<ClientResponse> {
        let (reply, response) = oneshot::channel();
        let envelope = CommandEnvelope {
            request_id: Uuid::new_v4(),
            deployment,
            reply,
        };
        self.inbox
            .send(PartitionMessage::Deploy(envelope))
            .await
            .map_err(|_| PartitionError::Stopped(self.id))?;
        response.await.map_err(|_| PartitionError::Stopped(self.id))?
    }
}
