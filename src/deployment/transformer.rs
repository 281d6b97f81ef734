//! Deployment validation and registration.
//!
//! Parses every resource, assigns definition keys and versions, writes
//! `Process Created` events and populates the definition directory. On
//! rejection nothing is written and the directory is untouched.

use std::collections::HashSet;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::model::{parse_process, ExecutableProcess};
use crate::protocol::{DeploymentRecord, Intent, ProcessIntent, ProcessMetadata, RejectionType};
use crate::state::{DeployedProcess, KeyGenerator, MutableProcessState};
use crate::writers::LogWriter;

const NO_RESOURCES_MESSAGE: &str = "Expected to deploy at least one resource, but none given";
const INVALID_RESOURCES_MESSAGE: &str =
    "Expected to deploy new resources, but encountered the following errors:";

/// Outcome reported by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    Accepted,
    Rejected {
        rejection_type: RejectionType,
        reason: String,
    },
}

impl TransformOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TransformOutcome::Accepted)
    }
}

/// State the validator may read and write.
pub struct TransformContext<'a> {
    pub processes: &'a mut dyn MutableProcessState,
    pub keys: &'a mut dyn KeyGenerator,
    pub log: &'a mut LogWriter,
}

/// Validates a deployment and registers its definitions.
///
/// On [`TransformOutcome::Accepted`], `deployment.processes_metadata` lists
/// every contained definition and each key resolves in the directory.
pub trait DeploymentValidator: Send + Sync {
    fn transform(
        &self,
        deployment: &mut DeploymentRecord,
        ctx: &mut TransformContext<'_>,
    ) -> TransformOutcome;
}

/// Validator for YAML/JSON process resources.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeploymentTransformer;

struct ParsedResource {
    resource_name: String,
    checksum: String,
    process: ExecutableProcess,
}

impl DeploymentTransformer {
    pub fn new() -> Self {
        Self
    }

    fn parse_all(deployment: &DeploymentRecord) -> Result<Vec<ParsedResource>, String> {
        let mut errors = Vec::new();
        let mut parsed = Vec::with_capacity(deployment.resources.len());
        let mut process_ids = HashSet::new();

        for resource in &deployment.resources {
            match parse_process(&resource.resource_name, &resource.resource) {
                Ok(process) => {
                    if !process_ids.insert(process.bpmn_process_id.clone()) {
                        errors.push((
                            resource.resource_name.clone(),
                            format!(
                                "duplicate process id '{}' in deployment",
                                process.bpmn_process_id
                            ),
                        ));
                        continue;
                    }
                    parsed.push(ParsedResource {
                        resource_name: resource.resource_name.clone(),
                        checksum: checksum(&resource.resource),
                        process,
                    });
                }
                Err(e) => errors.push((resource.resource_name.clone(), e.to_string())),
            }
        }

        if errors.is_empty() {
            Ok(parsed)
        } else {
            let mut reason = INVALID_RESOURCES_MESSAGE.to_string();
            for (name, error) in errors {
                reason.push_str(&format!("\n'{name}': {error}"));
            }
            Err(reason)
        }
    }
}

impl DeploymentValidator for DeploymentTransformer {
    #[tracing::instrument(
        name = "deployment.transform",
        skip_all,
        fields(resources = deployment.resources.len())
    )]
    fn transform(
        &self,
        deployment: &mut DeploymentRecord,
        ctx: &mut TransformContext<'_>,
    ) -> TransformOutcome {
        if deployment.resources.is_empty() {
            return TransformOutcome::Rejected {
                rejection_type: RejectionType::InvalidArgument,
                reason: NO_RESOURCES_MESSAGE.to_string(),
            };
        }

        let parsed = match Self::parse_all(deployment) {
            Ok(parsed) => parsed,
            Err(reason) => {
                return TransformOutcome::Rejected {
                    rejection_type: RejectionType::InvalidArgument,
                    reason,
                }
            }
        };

        deployment.processes_metadata.clear();
        for resource in parsed {
            let latest = ctx
                .processes
                .latest_by_id(&resource.process.bpmn_process_id)
                .map(|p| (p.key, p.version, p.checksum.clone()));

            let next_version = latest.as_ref().map(|(_, v, _)| v + 1).unwrap_or(1);

            let metadata = match &latest {
                Some((key, version, latest_checksum)) if *latest_checksum == resource.checksum => {
                    let (key, version) = (*key, *version);
                    debug!(
                        bpmn_process_id = %resource.process.bpmn_process_id,
                        version,
                        "resource unchanged, reusing latest version"
                    );
                    ProcessMetadata {
                        bpmn_process_id: resource.process.bpmn_process_id.clone(),
                        version,
                        process_definition_key: key,
                        resource_name: resource.resource_name,
                        checksum: resource.checksum,
                        duplicate: true,
                    }
                }
                _ => {
                    let key = ctx.keys.next_key();
                    let version = next_version;
                    let deployed = DeployedProcess {
                        key,
                        bpmn_process_id: resource.process.bpmn_process_id.clone(),
                        version,
                        resource_name: resource.resource_name.clone(),
                        checksum: resource.checksum.clone(),
                        process: Arc::new(resource.process),
                    };
                    ctx.log.append_follow_up_event(
                        key,
                        Intent::Process(ProcessIntent::Created),
                        deployed.to_record(),
                    );
                    let metadata = ProcessMetadata {
                        bpmn_process_id: deployed.bpmn_process_id.clone(),
                        version,
                        process_definition_key: key,
                        resource_name: resource.resource_name,
                        checksum: resource.checksum,
                        duplicate: false,
                    };
                    ctx.processes.put_process(deployed);
                    metadata
                }
            };
            deployment.processes_metadata.push(metadata);
        }

        TransformOutcome::Accepted
    }
}

/// Hex-encoded SHA-256 of a resource.
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RecordType;
    use crate::state::{DefinitionDirectory, InMemoryProcessState, PartitionKeyGenerator};
    use crate::writers::LogStream;

    const TIMER_PROCESS: &str = "id: p\nstartEvents:\n  - id: start\n    timer:\n      cycle: R/PT5M\n";

    struct Fixture {
        processes: InMemoryProcessState,
        keys: PartitionKeyGenerator,
        log: LogStream,
        writer: LogWriter,
    }

    impl Fixture {
        fn new() -> Self {
            let log = LogStream::new(1);
            Self {
                processes: InMemoryProcessState::new(),
                keys: PartitionKeyGenerator::new(1),
                writer: LogWriter::new(log.clone()),
                log,
            }
        }

        fn transform(&mut self, deployment: &mut DeploymentRecord) -> TransformOutcome {
            let mut ctx = TransformContext {
                processes: &mut self.processes,
                keys: &mut self.keys,
                log: &mut self.writer,
            };
            DeploymentTransformer::new().transform(deployment, &mut ctx)
        }
    }

    #[test]
    fn test_rejects_empty_deployment() {
        let mut fixture = Fixture::new();
        let outcome = fixture.transform(&mut DeploymentRecord::new());

        assert_eq!(
            outcome,
            TransformOutcome::Rejected {
                rejection_type: RejectionType::InvalidArgument,
                reason: NO_RESOURCES_MESSAGE.to_string(),
            }
        );
        assert!(fixture.log.records().is_empty());
    }

    #[test]
    fn test_first_deployment_is_version_one() {
        let mut fixture = Fixture::new();
        let mut deployment = DeploymentRecord::new().with_resource("p.yaml", TIMER_PROCESS);

        assert!(fixture.transform(&mut deployment).is_accepted());

        let metadata = &deployment.processes_metadata[0];
        assert_eq!(metadata.version, 1);
        assert!(!metadata.duplicate);
        assert!(fixture
            .processes
            .get_by_key(metadata.process_definition_key)
            .is_some());
        let records = fixture.log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].intent, Intent::Process(ProcessIntent::Created));
        assert_eq!(records[0].record_type, RecordType::Event);
    }

    #[test]
    fn test_changed_resource_gets_next_version() {
        let mut fixture = Fixture::new();
        let mut first = DeploymentRecord::new().with_resource("p.yaml", TIMER_PROCESS);
        fixture.transform(&mut first);
        let changed = TIMER_PROCESS.replace("PT5M", "PT10M");
        let mut second = DeploymentRecord::new().with_resource("p.yaml", changed);

        assert!(fixture.transform(&mut second).is_accepted());

        let v1 = &first.processes_metadata[0];
        let v2 = &second.processes_metadata[0];
        assert_eq!(v2.version, 2);
        assert!(v2.process_definition_key > v1.process_definition_key);
        assert_eq!(
            fixture.processes.latest_by_id("p").map(|p| p.key),
            Some(v2.process_definition_key)
        );
    }

    #[test]
    fn test_identical_resource_is_duplicate() {
        let mut fixture = Fixture::new();
        let mut first = DeploymentRecord::new().with_resource("p.yaml", TIMER_PROCESS);
        fixture.transform(&mut first);
        let mut again = DeploymentRecord::new().with_resource("p.yaml", TIMER_PROCESS);

        assert!(fixture.transform(&mut again).is_accepted());

        let metadata = &again.processes_metadata[0];
        assert!(metadata.duplicate);
        assert_eq!(metadata.version, 1);
        assert_eq!(
            metadata.process_definition_key,
            first.processes_metadata[0].process_definition_key
        );
        assert_eq!(fixture.log.records().len(), 1);
    }

    #[test]
    fn test_aggregates_errors_and_leaves_state_untouched() {
        let mut fixture = Fixture::new();
        let mut deployment = DeploymentRecord::new()
            .with_resource("good.yaml", TIMER_PROCESS)
            .with_resource("bad.yaml", "id: ''\n")
            .with_resource("worse.bpmn", "<xml/>");

        let outcome = fixture.transform(&mut deployment);

        let TransformOutcome::Rejected {
            rejection_type,
            reason,
        } = outcome
        else {
            panic!("expected rejection");
        };
        assert_eq!(rejection_type, RejectionType::InvalidArgument);
        assert!(reason.starts_with(INVALID_RESOURCES_MESSAGE));
        assert!(reason.contains("'bad.yaml': process must have a non-empty id"));
        assert!(reason.contains("'worse.bpmn': unsupported resource type"));
        assert!(fixture.processes.is_empty());
        assert!(fixture.log.records().is_empty());
        assert!(deployment.processes_metadata.is_empty());
    }

    #[test]
    fn test_rejects_same_process_twice_in_one_deployment() {
        let mut fixture = Fixture::new();
        let mut deployment = DeploymentRecord::new()
            .with_resource("a.yaml", TIMER_PROCESS)
            .with_resource("b.yaml", TIMER_PROCESS);

        let outcome = fixture.transform(&mut deployment);

        assert!(!outcome.is_accepted());
    }
}
