//! Deployment step definitions.

use std::fmt;

use chrono::Duration;
use cucumber::{given, then, when, World};
use procdeploy::protocol::{DeploymentRecord, Key};
use procdeploy::test_utils::{
    intents, message_process, test_start, timer_process, variable_timer_process, ProcessorHarness,
    DEPLOYMENT_CREATED, TIMER_CANCELED,
};
use procdeploy::writers::ClientResponse;

/// Test context for deployment scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct DeploymentWorld {
    harness: ProcessorHarness,
    last_response: Option<ClientResponse>,
    previous_key: Option<Key>,
}

impl fmt::Debug for DeploymentWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentWorld")
            .field("last_response", &self.last_response)
            .field("previous_key", &self.previous_key)
            .finish_non_exhaustive()
    }
}

impl DeploymentWorld {
    fn new() -> Self {
        Self {
            harness: ProcessorHarness::new(),
            last_response: None,
            previous_key: None,
        }
    }

    fn deploy(&mut self, resources: &[(String, String)]) {
        if let Some(key) = self.last_response.as_ref().and_then(ClientResponse::key) {
            self.previous_key = Some(key);
        }
        let deployment = resources
            .iter()
            .fold(DeploymentRecord::new(), |d, (name, content)| {
                d.with_resource(name.as_str(), content.as_str())
            });
        let response = self
            .harness
            .try_deploy(deployment)
            .expect("deployment processing failed");
        self.last_response = Some(response);
    }

    fn response(&self) -> &ClientResponse {
        self.last_response.as_ref().expect("no deployment submitted")
    }

    fn timers_of(&self, process: &str) -> usize {
        let key = self.harness.definition_key(process);
        self.harness
            .start_event_timers()
            .iter()
            .filter(|t| Some(t.process_definition_key) == key)
            .count()
    }
}

fn resource(process: &str) -> String {
    format!("{process}.yaml")
}

// ==========================================================================
// Background
// ==========================================================================

#[given("a deployment partition")]
async fn given_partition(world: &mut DeploymentWorld) {
    world.harness = ProcessorHarness::new();
}

#[given(expr = "process {string} was deployed with timer cycle {string}")]
async fn given_deployed(world: &mut DeploymentWorld, process: String, cycle: String) {
    world.deploy(&[(resource(&process), timer_process(&process, &cycle))]);
    assert!(!world.response().is_rejected(), "setup deployment rejected");
}

// ==========================================================================
// Deploying
// ==========================================================================

#[when(expr = "I deploy process {string} with timer cycle {string}")]
async fn when_deploy_timer(world: &mut DeploymentWorld, process: String, cycle: String) {
    world.deploy(&[(resource(&process), timer_process(&process, &cycle))]);
}

#[when(
    expr = "I deploy process {string} with timer cycle {string} and process {string} with timer variable {string}"
)]
async fn when_deploy_batch(
    world: &mut DeploymentWorld,
    first: String,
    cycle: String,
    second: String,
    variable: String,
) {
    world.deploy(&[
        (resource(&first), timer_process(&first, &cycle)),
        (resource(&second), variable_timer_process(&second, &variable)),
    ]);
}

#[when(expr = "I deploy process {string} started by message {string}")]
async fn when_deploy_message(world: &mut DeploymentWorld, process: String, message: String) {
    world.deploy(&[(resource(&process), message_process(&process, &message))]);
}

#[when("I deploy nothing")]
async fn when_deploy_nothing(world: &mut DeploymentWorld) {
    world.deploy(&[]);
}

// ==========================================================================
// Outcome
// ==========================================================================

#[then("the deployment is accepted")]
async fn then_accepted(world: &mut DeploymentWorld) {
    if let ClientResponse::Rejected { reason, .. } = world.response() {
        panic!("deployment rejected: {reason}");
    }
}

#[then(expr = "the deployment is rejected as {string}")]
async fn then_rejected_as(world: &mut DeploymentWorld, expected: String) {
    match world.response() {
        ClientResponse::Rejected { rejection_type, .. } => {
            assert_eq!(rejection_type.to_string(), expected)
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[then(expr = "the rejection reason contains {string}")]
async fn then_reason_contains(world: &mut DeploymentWorld, fragment: String) {
    match world.response() {
        ClientResponse::Rejected { reason, .. } => assert!(
            reason.contains(&fragment),
            "reason '{reason}' does not contain '{fragment}'"
        ),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[then("no deployment was created")]
async fn then_no_deployment(world: &mut DeploymentWorld) {
    assert!(!intents(&world.harness.records()).contains(&DEPLOYMENT_CREATED));
}

#[then("the deployment key is greater than the previous one")]
async fn then_key_increases(world: &mut DeploymentWorld) {
    let previous = world.previous_key.expect("no previous deployment");
    let current = world.response().key().expect("deployment rejected");
    assert!(current > previous);
}

// ==========================================================================
// Timers
// ==========================================================================

#[then(expr = "process {string} has {int} start event timer(s)")]
async fn then_timer_count(world: &mut DeploymentWorld, process: String, count: usize) {
    assert_eq!(world.timers_of(&process), count);
}

#[then("no start event timers exist")]
async fn then_no_timers(world: &mut DeploymentWorld) {
    assert!(world.harness.start_event_timers().is_empty());
}

#[then(expr = "the timer of process {string} is due in {int} minutes")]
async fn then_due_in(world: &mut DeploymentWorld, process: String, minutes: i64) {
    let key = world.harness.definition_key(&process);
    let timer = world
        .harness
        .start_event_timers()
        .into_iter()
        .find(|t| Some(t.process_definition_key) == key)
        .expect("no timer for process");
    let expected = (test_start() + Duration::minutes(minutes)).timestamp_millis();
    assert_eq!(timer.due_date, expected);
}

#[then("the timer of the previous version was canceled")]
async fn then_previous_canceled(world: &mut DeploymentWorld) {
    let records = world.harness.last_command_records();
    assert!(intents(&records).contains(&TIMER_CANCELED));
}

// ==========================================================================
// Message start events
// ==========================================================================

#[then(expr = "message start events were reactivated for process {string}")]
async fn then_reactivated(world: &mut DeploymentWorld, process: String) {
    let calls = world.harness.reactivator.calls();
    let (_, versions) = calls.last().expect("reactivator never invoked");
    assert!(versions.iter().any(|v| v.bpmn_process_id == process));
}
