//! Test utilities: process fixtures, recording collaborators and a
//! single-partition processing harness.
//!
//! Compiled for unit tests and with the `test-utils` feature for the
//! integration and acceptance tests.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::clock::ControlledClock;
use crate::deployment::message_start::{latest_versions, LatestVersion};
use crate::deployment::{
    DeploymentCreateProcessor, DeploymentDistributor, DeploymentReconciler, DeploymentTransformer,
    MessageStartReactivator, ProcessingError, RetireStrategy,
};
use crate::expression::TimerExpressionEvaluator;
use crate::protocol::{
    Command, DeploymentIntent, DeploymentRecord, Intent, Key, PartitionId, Record, RecordType,
    TimerIntent,
};
use crate::state::{DefinitionDirectory, PartitionState, TimerInstance, TimerSubscriptionStore};
use crate::writers::{ClientResponse, LogStream, Writers};

// ============================================================================
// Process fixtures
// ============================================================================

/// Process with one timer start event `start` on the given cycle.
pub fn timer_process(id: &str, cycle: &str) -> String {
    format!("id: {id}\nstartEvents:\n  - id: start\n    timer:\n      cycle: {cycle}\n")
}

/// Process with one timer start event `start` after the given duration.
pub fn duration_process(id: &str, duration: &str) -> String {
    format!("id: {id}\nstartEvents:\n  - id: start\n    timer:\n      duration: {duration}\n")
}

/// Process with two timer start events, `first` and `second`.
pub fn two_timer_process(id: &str, first: &str, second: &str) -> String {
    format!(
        "id: {id}\nstartEvents:\n  - id: first\n    timer:\n      cycle: {first}\n  - id: second\n    timer:\n      cycle: {second}\n"
    )
}

/// Process whose timer start event reads its cycle from a variable.
pub fn variable_timer_process(id: &str, variable: &str) -> String {
    format!("id: {id}\nstartEvents:\n  - id: start\n    timer:\n      cycle: \"= {variable}\"\n")
}

/// Process with one message start event `start`.
pub fn message_process(id: &str, message: &str) -> String {
    format!("id: {id}\nstartEvents:\n  - id: start\n    message: {message}\n")
}

/// Process with a single plain start event.
pub fn plain_process(id: &str) -> String {
    format!("id: {id}\nstartEvents:\n  - id: start\n")
}

/// Resource name used for a process id in fixtures.
pub fn resource_name(id: &str) -> String {
    format!("{id}.yaml")
}

/// Fixed instant the test clock starts at.
pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn test_clock() -> Arc<ControlledClock> {
    Arc::new(ControlledClock::new(test_start()))
}

// ============================================================================
// Recording collaborators
// ============================================================================

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Distributor that records what it was asked to distribute.
#[derive(Debug, Default)]
pub struct RecordingDistributor {
    requests: Mutex<Vec<(Key, DeploymentRecord)>>,
}

impl RecordingDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<(Key, DeploymentRecord)> {
        lock(&self.requests).clone()
    }
}

impl DeploymentDistributor for RecordingDistributor {
    fn distribute(&self, deployment_key: Key, deployment: &DeploymentRecord) {
        lock(&self.requests).push((deployment_key, deployment.clone()));
    }
}

/// Reactivator that records the resolved latest versions.
#[derive(Debug, Default)]
pub struct RecordingReactivator {
    calls: Mutex<Vec<(Key, Vec<LatestVersion>)>>,
}

impl RecordingReactivator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(Key, Vec<LatestVersion>)> {
        lock(&self.calls).clone()
    }
}

impl MessageStartReactivator for RecordingReactivator {
    fn reactivate(
        &self,
        deployment_key: Key,
        deployment: &DeploymentRecord,
        directory: &dyn DefinitionDirectory,
    ) {
        lock(&self.calls).push((deployment_key, latest_versions(deployment, directory)));
    }
}

// ============================================================================
// Processing harness
// ============================================================================

/// One partition's state, log and deployment processor, driven synchronously.
pub struct ProcessorHarness {
    pub state: PartitionState,
    pub log: LogStream,
    pub clock: Arc<ControlledClock>,
    pub distributor: Arc<RecordingDistributor>,
    pub reactivator: Arc<RecordingReactivator>,
    processor: DeploymentCreateProcessor,
    writers: Writers,
}

impl ProcessorHarness {
    pub fn new() -> Self {
        Self::with_strategy(RetireStrategy::Indexed)
    }

    pub fn with_strategy(strategy: RetireStrategy) -> Self {
        Self::build(1, strategy)
    }

    pub fn build(partition_id: PartitionId, strategy: RetireStrategy) -> Self {
        let log = LogStream::new(partition_id);
        let clock = test_clock();
        let distributor = Arc::new(RecordingDistributor::new());
        let reactivator = Arc::new(RecordingReactivator::new());
        let processor = DeploymentCreateProcessor::new(
            Arc::new(DeploymentTransformer::new()),
            DeploymentReconciler::new(strategy),
            Arc::new(TimerExpressionEvaluator::without_variables()),
            clock.clone(),
            distributor.clone(),
            reactivator.clone(),
        );
        Self {
            state: PartitionState::new(partition_id),
            writers: Writers::new(log.clone()),
            log,
            clock,
            distributor,
            reactivator,
            processor,
        }
    }

    /// Append a deployment command for `resources` and process it.
    pub fn deploy(&mut self, resources: &[(&str, &str)]) -> ClientResponse {
        let deployment = resources
            .iter()
            .fold(DeploymentRecord::new(), |d, (name, content)| {
                d.with_resource(*name, *content)
            });
        self.try_deploy(deployment)
            .unwrap_or_else(|e| panic!("processing failed: {e}"))
    }

    pub fn try_deploy(
        &mut self,
        deployment: DeploymentRecord,
    ) -> Result<ClientResponse, ProcessingError> {
        let position = self
            .log
            .append_command(Intent::Deployment(DeploymentIntent::Create), deployment.clone());
        let command = Command {
            position,
            request_id: Uuid::new_v4(),
            value: deployment,
        };
        self.processor
            .process(&command, &mut self.state, &mut self.writers)?;
        Ok(self
            .writers
            .response
            .take()
            .unwrap_or_else(|| panic!("no response written for command at {position}")))
    }

    pub fn records(&self) -> Vec<Record> {
        self.log.records()
    }

    /// Records written after the most recent command.
    pub fn last_command_records(&self) -> Vec<Record> {
        let records = self.log.records();
        let start = records
            .iter()
            .rposition(|r| r.record_type == RecordType::Command)
            .map(|i| i + 1)
            .unwrap_or(0);
        records[start..].to_vec()
    }

    /// Start-event timers currently installed, in key order.
    pub fn start_event_timers(&self) -> Vec<TimerInstance> {
        let mut timers = Vec::new();
        self.state
            .timers
            .for_each_start_event_timer(&mut |t| timers.push(t.clone()));
        timers
    }

    pub fn definition_key(&self, bpmn_process_id: &str) -> Option<Key> {
        self.state
            .processes
            .latest_by_id(bpmn_process_id)
            .map(|p| p.key)
    }
}

impl Default for ProcessorHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Intents of `records`, for compact ordering assertions.
pub fn intents(records: &[Record]) -> Vec<Intent> {
    records.iter().map(|r| r.intent).collect()
}

pub const TIMER_CREATED: Intent = Intent::Timer(TimerIntent::Created);
pub const TIMER_CANCELED: Intent = Intent::Timer(TimerIntent::Canceled);
pub const DEPLOYMENT_CREATED: Intent = Intent::Deployment(DeploymentIntent::Created);
pub const DEPLOYMENT_CREATE: Intent = Intent::Deployment(DeploymentIntent::Create);
