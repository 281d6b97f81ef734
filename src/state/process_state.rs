//! Deployed process definitions, by key and by business process id.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::model::ExecutableProcess;
use crate::protocol::{Key, ProcessRecord};

/// One deployed version of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedProcess {
    pub key: Key,
    pub bpmn_process_id: String,
    pub version: u32,
    pub resource_name: String,
    pub checksum: String,
    pub process: Arc<ExecutableProcess>,
}

impl DeployedProcess {
    pub fn to_record(&self) -> ProcessRecord {
        ProcessRecord {
            bpmn_process_id: self.bpmn_process_id.clone(),
            version: self.version,
            process_definition_key: self.key,
            resource_name: self.resource_name.clone(),
            checksum: self.checksum.clone(),
        }
    }
}

/// Read access to deployed definitions.
pub trait DefinitionDirectory {
    fn get_by_key(&self, key: Key) -> Option<&DeployedProcess>;

    /// Highest deployed version of a business process id.
    fn latest_by_id(&self, bpmn_process_id: &str) -> Option<&DeployedProcess>;

    /// Keys of every deployed version of a business process id, oldest first.
    fn definition_keys_for(&self, bpmn_process_id: &str) -> Vec<Key>;
}

/// Write access, used by the deployment validator and the distribution receiver.
pub trait MutableProcessState: DefinitionDirectory {
    fn put_process(&mut self, process: DeployedProcess);
}

/// In-memory process state of one partition.
#[derive(Debug, Default)]
pub struct InMemoryProcessState {
    by_key: HashMap<Key, DeployedProcess>,
    /// bpmn process id -> version -> key
    versions: HashMap<String, BTreeMap<u32, Key>>,
}

impl InMemoryProcessState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl DefinitionDirectory for InMemoryProcessState {
    fn get_by_key(&self, key: Key) -> Option<&DeployedProcess> {
        self.by_key.get(&key)
    }

    fn latest_by_id(&self, bpmn_process_id: &str) -> Option<&DeployedProcess> {
        self.versions
            .get(bpmn_process_id)
            .and_then(|versions| versions.values().next_back())
            .and_then(|key| self.by_key.get(key))
    }

    fn definition_keys_for(&self, bpmn_process_id: &str) -> Vec<Key> {
        self.versions
            .get(bpmn_process_id)
            .map(|versions| versions.values().copied().collect())
            .unwrap_or_default()
    }
}

impl MutableProcessState for InMemoryProcessState {
    fn put_process(&mut self, process: DeployedProcess) {
        self.versions
            .entry(process.bpmn_process_id.clone())
            .or_default()
            .insert(process.version, process.key);
        self.by_key.insert(process.key, process);
    }
}
