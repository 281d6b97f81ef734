//! Processor for `Deployment Create` commands.
//!
//! Flow: validate → assign key → reconcile timer start events →
//! write `Created` event and response → trigger distribution and message
//! start event reactivation.
//!
//! Every command yields exactly one outcome: a rejection (no deployment key
//! emitted) or an acceptance under a freshly assigned key.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::distribution::DeploymentDistributor;
use super::message_start::MessageStartReactivator;
use super::reconciler::{DeploymentReconciler, ReconcileError};
use super::transformer::{DeploymentValidator, TransformContext, TransformOutcome};
use crate::behavior::CatchEventBehavior;
use crate::clock::Clock;
use crate::expression::ExpressionEvaluator;
use crate::protocol::{Command, DeploymentIntent, DeploymentRecord, Intent, RejectionType};
use crate::state::{KeyGenerator, PartitionState};
use crate::writers::Writers;

/// Prefix of the rejection reason when a timer start event cannot be created.
pub const COULD_NOT_CREATE_TIMER_MESSAGE: &str =
    "Expected to create timer for start event, but encountered the following error: ";

/// Failures that cannot be turned into an ordinary rejection.
///
/// Retrying the command will not help; the partition's state is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    #[error("Inconsistent partition state: {0}")]
    Inconsistent(String),
}

pub struct DeploymentCreateProcessor {
    validator: Arc<dyn DeploymentValidator>,
    reconciler: DeploymentReconciler,
    evaluator: Arc<dyn ExpressionEvaluator>,
    clock: Arc<dyn Clock>,
    distributor: Arc<dyn DeploymentDistributor>,
    reactivator: Arc<dyn MessageStartReactivator>,
}

impl DeploymentCreateProcessor {
    pub fn new(
        validator: Arc<dyn DeploymentValidator>,
        reconciler: DeploymentReconciler,
        evaluator: Arc<dyn ExpressionEvaluator>,
        clock: Arc<dyn Clock>,
        distributor: Arc<dyn DeploymentDistributor>,
        reactivator: Arc<dyn MessageStartReactivator>,
    ) -> Self {
        Self {
            validator,
            reconciler,
            evaluator,
            clock,
            distributor,
            reactivator,
        }
    }

    /// Process one deployment command.
    ///
    /// Rejections are written to `writers` and return `Ok`. Only an
    /// inconsistency of the partition's own state returns `Err`, after the
    /// command has been rejected.
    #[tracing::instrument(
        name = "deployment.create",
        skip_all,
        fields(position = command.position, request_id = %command.request_id)
    )]
    pub fn process(
        &self,
        command: &Command<DeploymentRecord>,
        state: &mut PartitionState,
        writers: &mut Writers,
    ) -> Result<(), ProcessingError> {
        writers.log.set_source_position(command.position);
        let mut deployment = command.value.clone();

        let outcome = {
            let mut ctx = TransformContext {
                processes: &mut state.processes,
                keys: &mut state.keys,
                log: &mut writers.log,
            };
            self.validator.transform(&mut deployment, &mut ctx)
        };
        if let TransformOutcome::Rejected {
            rejection_type,
            reason,
        } = outcome
        {
            reject(command, rejection_type, &reason, writers);
            return Ok(());
        }

        let key = state.keys.next_key();

        let reconciled = {
            let mut subscriptions = CatchEventBehavior::new(
                &mut state.timers,
                &mut state.keys,
                self.clock.as_ref(),
                &mut writers.log,
            );
            self.reconciler.reconcile(
                &deployment,
                &state.processes,
                self.evaluator.as_ref(),
                &mut subscriptions,
            )
        };
        match reconciled {
            Ok(_) => {}
            Err(e @ ReconcileError::Evaluation { .. }) => {
                let reason = format!("{COULD_NOT_CREATE_TIMER_MESSAGE}{e}");
                reject(command, RejectionType::ProcessingError, &reason, writers);
                return Ok(());
            }
            Err(e @ ReconcileError::UnknownDefinition { .. }) => {
                error!(error = %e, "deployment refers to an unknown process definition");
                reject(command, RejectionType::ProcessingError, &e.to_string(), writers);
                return Err(ProcessingError::Inconsistent(e.to_string()));
            }
        }

        let intent = Intent::Deployment(DeploymentIntent::Created);
        writers
            .response
            .write_event_on_command(key, intent, deployment.clone(), command);
        writers
            .log
            .append_follow_up_event(key, intent, deployment.clone());
        info!(
            deployment_key = %key,
            processes = deployment.processes_metadata.len(),
            "deployment created"
        );

        self.distributor.distribute(key, &deployment);
        self.reactivator.reactivate(key, &deployment, &state.processes);
        Ok(())
    }
}

fn reject(
    command: &Command<DeploymentRecord>,
    rejection_type: RejectionType,
    reason: &str,
    writers: &mut Writers,
) {
    warn!(%rejection_type, reason, "deployment rejected");
    writers
        .response
        .write_rejection_on_command(command, rejection_type, reason);
    writers.log.append_rejection(
        command,
        Intent::Deployment(DeploymentIntent::Create),
        rejection_type,
        reason,
    );
}
