//! Timer start event reconciliation for accepted deployments.
//!
//! For every definition in a deployment, in order:
//! 1. retire every start-event timer owned by any version of the same
//!    business process id,
//! 2. evaluate and subscribe the timer start events of the new version.
//!
//! Retirement for a process id is complete before its first new timer is
//! installed. A failed evaluation stops reconciliation immediately; changes
//! already applied for earlier definitions stay in place.

use serde::Deserialize;
use tracing::{debug, info};

use crate::behavior::CatchEventSubscriptions;
use crate::expression::{EvaluationFailure, EvaluationScope, ExpressionEvaluator};
use crate::protocol::{DeploymentRecord, Key};
use crate::state::{DefinitionDirectory, DeployedProcess, ElementInstance, TimerInstance};

/// How stale start-event timers are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireStrategy {
    /// Look up timers per definition key of the business process id.
    #[default]
    Indexed,
    /// Visit every start-event timer on the partition and resolve its owner.
    FullScan,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("{failure}")]
    Evaluation {
        bpmn_process_id: String,
        start_event_id: String,
        #[source]
        failure: EvaluationFailure,
    },

    #[error("Expected to find process definition with key '{key}', but none found")]
    UnknownDefinition { key: Key },
}

/// Counts of timer changes applied by a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub retired: usize,
    pub installed: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentReconciler {
    strategy: RetireStrategy,
}

impl DeploymentReconciler {
    pub fn new(strategy: RetireStrategy) -> Self {
        Self { strategy }
    }

    #[tracing::instrument(
        name = "deployment.reconcile",
        skip_all,
        fields(processes = deployment.processes_metadata.len())
    )]
    pub fn reconcile(
        &self,
        deployment: &DeploymentRecord,
        directory: &dyn DefinitionDirectory,
        evaluator: &dyn ExpressionEvaluator,
        subscriptions: &mut dyn CatchEventSubscriptions,
    ) -> Result<ReconcileSummary, ReconcileError> {
        let mut summary = ReconcileSummary::default();

        for metadata in &deployment.processes_metadata {
            let deployed = directory
                .get_by_key(metadata.process_definition_key)
                .ok_or(ReconcileError::UnknownDefinition {
                    key: metadata.process_definition_key,
                })?;

            let stale = self.stale_timers(&deployed.bpmn_process_id, directory, subscriptions)?;
            for timer in &stale {
                subscriptions.unsubscribe_from_timer_event(timer);
            }
            summary.retired += stale.len();

            summary.installed += install(deployed, evaluator, subscriptions)?;
        }

        info!(
            retired = summary.retired,
            installed = summary.installed,
            "timer start events reconciled"
        );
        Ok(summary)
    }

    fn stale_timers(
        &self,
        bpmn_process_id: &str,
        directory: &dyn DefinitionDirectory,
        subscriptions: &dyn CatchEventSubscriptions,
    ) -> Result<Vec<TimerInstance>, ReconcileError> {
        match self.strategy {
            RetireStrategy::Indexed => Ok(directory
                .definition_keys_for(bpmn_process_id)
                .into_iter()
                .flat_map(|key| subscriptions.start_event_timers_of(key))
                .collect()),
            RetireStrategy::FullScan => {
                let mut all = Vec::new();
                subscriptions.for_each_start_event_timer(&mut |timer| all.push(timer.clone()));

                let mut stale = Vec::new();
                for timer in all {
                    let owner = directory.get_by_key(timer.process_definition_key).ok_or(
                        ReconcileError::UnknownDefinition {
                            key: timer.process_definition_key,
                        },
                    )?;
                    if owner.bpmn_process_id == bpmn_process_id {
                        stale.push(timer);
                    }
                }
                Ok(stale)
            }
        }
    }
}

fn install(
    deployed: &DeployedProcess,
    evaluator: &dyn ExpressionEvaluator,
    subscriptions: &mut dyn CatchEventSubscriptions,
) -> Result<usize, ReconcileError> {
    let mut installed = 0;
    for start_event in &deployed.process.start_events {
        let Some(definition) = start_event.timer() else {
            continue;
        };

        let timer = evaluator
            .evaluate_timer(definition, EvaluationScope::NoProcessInstance)
            .map_err(|failure| ReconcileError::Evaluation {
                bpmn_process_id: deployed.bpmn_process_id.clone(),
                start_event_id: start_event.id.clone(),
                failure,
            })?;

        let timer_key = subscriptions.subscribe_to_timer_event(
            ElementInstance::NotInstantiated,
            ElementInstance::NotInstantiated,
            deployed.key,
            &start_event.id,
            &timer,
        );
        debug!(
            bpmn_process_id = %deployed.bpmn_process_id,
            start_event_id = %start_event.id,
            timer_key = %timer_key,
            "timer start event installed"
        );
        installed += 1;
    }
    Ok(installed)
}

#[cfg(test)]
mod tests;
