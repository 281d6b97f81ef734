//! Applies a deployment distributed from the deployment partition.
//!
//! The receiving partition registers the same definitions under the keys and
//! versions assigned by the source. No keys are generated and no timers are
//! installed here.

use std::sync::Arc;

use tracing::{debug, info};

use crate::model::{parse_process, ModelError};
use crate::protocol::{DeploymentIntent, DeploymentRecord, Intent, Key};
use crate::state::{DeployedProcess, MutableProcessState};
use crate::writers::LogWriter;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributeError {
    #[error("deployment {deployment_key} has no resource named '{resource_name}'")]
    MissingResource {
        deployment_key: Key,
        resource_name: String,
    },

    #[error("resource '{resource_name}' could not be read: {source}")]
    Model {
        resource_name: String,
        #[source]
        source: ModelError,
    },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DeploymentDistributeProcessor;

impl DeploymentDistributeProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Register every definition of `deployment` not yet known and write
    /// `Deployment Distributed`. Applying the same deployment twice is harmless.
    #[tracing::instrument(
        name = "deployment.receive",
        skip_all,
        fields(deployment_key = %deployment_key, partition = log.log().partition_id())
    )]
    pub fn process(
        &self,
        deployment_key: Key,
        deployment: &DeploymentRecord,
        processes: &mut dyn MutableProcessState,
        log: &mut LogWriter,
    ) -> Result<(), DistributeError> {
        let mut registered = Vec::new();
        for metadata in &deployment.processes_metadata {
            if processes.get_by_key(metadata.process_definition_key).is_some() {
                debug!(
                    process_definition_key = %metadata.process_definition_key,
                    "definition already known"
                );
                continue;
            }

            let resource = deployment
                .resources
                .iter()
                .find(|r| r.resource_name == metadata.resource_name)
                .ok_or_else(|| DistributeError::MissingResource {
                    deployment_key,
                    resource_name: metadata.resource_name.clone(),
                })?;
            let process = parse_process(&resource.resource_name, &resource.resource).map_err(
                |source| DistributeError::Model {
                    resource_name: resource.resource_name.clone(),
                    source,
                },
            )?;

            registered.push(DeployedProcess {
                key: metadata.process_definition_key,
                bpmn_process_id: metadata.bpmn_process_id.clone(),
                version: metadata.version,
                resource_name: metadata.resource_name.clone(),
                checksum: metadata.checksum.clone(),
                process: Arc::new(process),
            });
        }

        let count = registered.len();
        for process in registered {
            processes.put_process(process);
        }
        log.append_follow_up_event(
            deployment_key,
            Intent::Deployment(DeploymentIntent::Distributed),
            deployment.clone(),
        );
        info!(registered = count, "distributed deployment applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProcessMetadata;
    use crate::state::{DefinitionDirectory, InMemoryProcessState};
    use crate::writers::LogStream;

    fn distributed() -> DeploymentRecord {
        let mut deployment = DeploymentRecord::new().with_resource("p.yaml", "id: p\n");
        deployment.processes_metadata.push(ProcessMetadata {
            bpmn_process_id: "p".to_string(),
            version: 3,
            process_definition_key: Key::encode(1, 42),
            resource_name: "p.yaml".to_string(),
            checksum: "abc".to_string(),
            duplicate: false,
        });
        deployment
    }

    #[test]
    fn test_registers_under_source_key_and_version() {
        let mut processes = InMemoryProcessState::new();
        let log = LogStream::new(2);
        let mut writer = LogWriter::new(log.clone());

        DeploymentDistributeProcessor::new()
            .process(Key::encode(1, 43), &distributed(), &mut processes, &mut writer)
            .unwrap();

        let deployed = processes.latest_by_id("p").unwrap();
        assert_eq!(deployed.key, Key::encode(1, 42));
        assert_eq!(deployed.version, 3);
        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].intent, Intent::Deployment(DeploymentIntent::Distributed));
        assert_eq!(records[0].key, Some(Key::encode(1, 43)));
    }

    #[test]
    fn test_applying_twice_registers_once() {
        let mut processes = InMemoryProcessState::new();
        let mut writer = LogWriter::new(LogStream::new(2));
        let processor = DeploymentDistributeProcessor::new();

        processor
            .process(Key::encode(1, 43), &distributed(), &mut processes, &mut writer)
            .unwrap();
        processor
            .process(Key::encode(1, 43), &distributed(), &mut processes, &mut writer)
            .unwrap();

        assert_eq!(processes.len(), 1);
    }

    #[test]
    fn test_missing_resource_is_an_error() {
        let mut processes = InMemoryProcessState::new();
        let mut writer = LogWriter::new(LogStream::new(2));
        let mut deployment = distributed();
        deployment.resources.clear();

        let err = DeploymentDistributeProcessor::new()
            .process(Key::encode(1, 43), &deployment, &mut processes, &mut writer)
            .unwrap_err();

        assert!(matches!(err, DistributeError::MissingResource { .. }));
        assert!(processes.is_empty());
    }
}
