use std::sync::Arc;

use super::*;
use crate::expression::TimerExpressionEvaluator;
use crate::model::{
    ExecutableProcess, Expression, StartEvent, StartEventKind, Timer, TimerDefinition, TimerKind,
};
use crate::protocol::ProcessMetadata;
use crate::state::{
    InMemoryProcessState, InMemoryTimerState, KeyGenerator, MutableProcessState,
    PartitionKeyGenerator, TimerSubscriptionStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Subscribe { definition: Key, element: String },
    Unsubscribe { timer: Key },
}

/// Timer store that records every mutation in order.
struct RecordingSubscriptions {
    timers: InMemoryTimerState,
    keys: PartitionKeyGenerator,
    ops: Vec<Op>,
}

impl RecordingSubscriptions {
    fn new() -> Self {
        Self {
            timers: InMemoryTimerState::new(),
            keys: PartitionKeyGenerator::new(1),
            ops: Vec::new(),
        }
    }

    /// Install a start-event timer without recording it.
    fn preload(&mut self, definition: Key, element: &str) -> Key {
        let key = self.keys.next_key();
        self.timers.put(TimerInstance {
            key,
            element_instance: ElementInstance::NotInstantiated,
            process_instance: ElementInstance::NotInstantiated,
            process_definition_key: definition,
            target_element_id: element.to_string(),
            due_date: 1_000,
            repetitions: None,
        });
        key
    }

    fn timer_definitions(&self) -> Vec<Key> {
        let mut definitions = Vec::new();
        self.timers
            .for_each_start_event_timer(&mut |t| definitions.push(t.process_definition_key));
        definitions
    }
}

impl CatchEventSubscriptions for RecordingSubscriptions {
    fn for_each_start_event_timer(&self, visitor: &mut dyn FnMut(&TimerInstance)) {
        self.timers.for_each_start_event_timer(visitor);
    }

    fn start_event_timers_of(&self, process_definition_key: Key) -> Vec<TimerInstance> {
        self.timers.start_event_timers_of(process_definition_key)
    }

    fn subscribe_to_timer_event(
        &mut self,
        element_instance: ElementInstance,
        process_instance: ElementInstance,
        process_definition_key: Key,
        target_element_id: &str,
        timer: &Timer,
    ) -> Key {
        let key = self.keys.next_key();
        self.timers.put(TimerInstance {
            key,
            element_instance,
            process_instance,
            process_definition_key,
            target_element_id: target_element_id.to_string(),
            due_date: 1_000,
            repetitions: timer.repetitions(),
        });
        self.ops.push(Op::Subscribe {
            definition: process_definition_key,
            element: target_element_id.to_string(),
        });
        key
    }

    fn unsubscribe_from_timer_event(&mut self, timer: &TimerInstance) {
        self.timers.remove(timer);
        self.ops.push(Op::Unsubscribe { timer: timer.key });
    }
}

fn timer_event(id: &str, text: &str) -> StartEvent {
    StartEvent {
        id: id.to_string(),
        kind: StartEventKind::Timer(TimerDefinition {
            kind: TimerKind::Cycle,
            expression: Expression::parse(text).unwrap(),
        }),
    }
}

fn message_event(id: &str, message: &str) -> StartEvent {
    StartEvent {
        id: id.to_string(),
        kind: StartEventKind::Message {
            message_name: message.to_string(),
        },
    }
}

fn plain_event(id: &str) -> StartEvent {
    StartEvent {
        id: id.to_string(),
        kind: StartEventKind::None,
    }
}

fn definition_key(counter: i64) -> Key {
    Key::encode(1, 1_000 + counter)
}

/// Register a definition and return its deployment metadata.
fn deploy(
    processes: &mut InMemoryProcessState,
    id: &str,
    version: u32,
    key: Key,
    start_events: Vec<StartEvent>,
) -> ProcessMetadata {
    processes.put_process(DeployedProcess {
        key,
        bpmn_process_id: id.to_string(),
        version,
        resource_name: format!("{id}.yaml"),
        checksum: format!("{id}-{version}"),
        process: Arc::new(ExecutableProcess {
            bpmn_process_id: id.to_string(),
            name: None,
            start_events,
        }),
    });
    ProcessMetadata {
        bpmn_process_id: id.to_string(),
        version,
        process_definition_key: key,
        resource_name: format!("{id}.yaml"),
        checksum: format!("{id}-{version}"),
        duplicate: false,
    }
}

fn deployment(metadata: Vec<ProcessMetadata>) -> DeploymentRecord {
    DeploymentRecord {
        resources: Vec::new(),
        processes_metadata: metadata,
    }
}

fn evaluator() -> TimerExpressionEvaluator {
    TimerExpressionEvaluator::without_variables()
}

#[test]
fn test_first_version_installs_each_timer_start_event() {
    let mut processes = InMemoryProcessState::new();
    let mut subscriptions = RecordingSubscriptions::new();
    let v1 = definition_key(1);
    let metadata = deploy(
        &mut processes,
        "P",
        1,
        v1,
        vec![timer_event("hourly", "R/PT1H"), timer_event("daily", "R3/P1D")],
    );

    let summary = DeploymentReconciler::default()
        .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
        .unwrap();

    assert_eq!(summary, ReconcileSummary { retired: 0, installed: 2 });
    assert_eq!(
        subscriptions.ops,
        vec![
            Op::Subscribe { definition: v1, element: "hourly".to_string() },
            Op::Subscribe { definition: v1, element: "daily".to_string() },
        ]
    );
}

#[test]
fn test_retires_previous_versions_before_installing() {
    for strategy in [RetireStrategy::Indexed, RetireStrategy::FullScan] {
        let mut processes = InMemoryProcessState::new();
        let mut subscriptions = RecordingSubscriptions::new();
        let v1 = definition_key(1);
        let v2 = definition_key(2);
        deploy(&mut processes, "P", 1, v1, vec![timer_event("start", "R/PT5M")]);
        let old_timer = subscriptions.preload(v1, "start");
        let metadata = deploy(&mut processes, "P", 2, v2, vec![timer_event("start", "R/PT10M")]);

        let summary = DeploymentReconciler::new(strategy)
            .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
            .unwrap();

        assert_eq!(summary, ReconcileSummary { retired: 1, installed: 1 });
        assert_eq!(
            subscriptions.ops,
            vec![
                Op::Unsubscribe { timer: old_timer },
                Op::Subscribe { definition: v2, element: "start".to_string() },
            ],
            "strategy {strategy:?}"
        );
        assert_eq!(subscriptions.timer_definitions(), vec![v2]);
    }
}

#[test]
fn test_timers_of_other_processes_are_untouched() {
    for strategy in [RetireStrategy::Indexed, RetireStrategy::FullScan] {
        let mut processes = InMemoryProcessState::new();
        let mut subscriptions = RecordingSubscriptions::new();
        let other = definition_key(1);
        deploy(&mut processes, "other", 1, other, vec![timer_event("start", "R/PT5M")]);
        subscriptions.preload(other, "start");
        let metadata = deploy(
            &mut processes,
            "P",
            1,
            definition_key(2),
            vec![plain_event("start")],
        );

        let summary = DeploymentReconciler::new(strategy)
            .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
            .unwrap();

        assert_eq!(summary, ReconcileSummary::default());
        assert!(subscriptions.ops.is_empty());
        assert_eq!(subscriptions.timer_definitions(), vec![other]);
    }
}

#[test]
fn test_switching_to_message_start_removes_timers_only() {
    let mut processes = InMemoryProcessState::new();
    let mut subscriptions = RecordingSubscriptions::new();
    let v1 = definition_key(1);
    deploy(&mut processes, "P", 1, v1, vec![timer_event("start", "R/PT5M")]);
    let old_timer = subscriptions.preload(v1, "start");
    let metadata = deploy(
        &mut processes,
        "P",
        2,
        definition_key(2),
        vec![message_event("start", "order-placed")],
    );

    let summary = DeploymentReconciler::default()
        .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
        .unwrap();

    assert_eq!(summary, ReconcileSummary { retired: 1, installed: 0 });
    assert_eq!(subscriptions.ops, vec![Op::Unsubscribe { timer: old_timer }]);
}

#[test]
fn test_failure_keeps_changes_of_earlier_definitions() {
    let mut processes = InMemoryProcessState::new();
    let mut subscriptions = RecordingSubscriptions::new();
    let p = deploy(
        &mut processes,
        "P",
        1,
        definition_key(1),
        vec![timer_event("start", "R/PT5M")],
    );
    let q = deploy(
        &mut processes,
        "Q",
        1,
        definition_key(2),
        vec![timer_event("start", "= cycle_spec")],
    );
    let r = deploy(
        &mut processes,
        "R",
        1,
        definition_key(3),
        vec![timer_event("start", "R/PT1M")],
    );

    let err = DeploymentReconciler::default()
        .reconcile(&deployment(vec![p, q, r]), &processes, &evaluator(), &mut subscriptions)
        .unwrap_err();

    match err {
        ReconcileError::Evaluation {
            bpmn_process_id,
            start_event_id,
            failure,
        } => {
            assert_eq!(bpmn_process_id, "Q");
            assert_eq!(start_event_id, "start");
            assert_eq!(
                failure.message(),
                "failed to evaluate expression 'cycle_spec': no variable found for name 'cycle_spec'"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        subscriptions.ops,
        vec![Op::Subscribe {
            definition: definition_key(1),
            element: "start".to_string()
        }]
    );
}

#[test]
fn test_failure_on_second_timer_keeps_first_of_same_definition() {
    let mut processes = InMemoryProcessState::new();
    let mut subscriptions = RecordingSubscriptions::new();
    let key = definition_key(1);
    let metadata = deploy(
        &mut processes,
        "P",
        1,
        key,
        vec![timer_event("good", "R/PT5M"), timer_event("bad", "R/not-a-duration")],
    );

    let err = DeploymentReconciler::default()
        .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Evaluation { ref start_event_id, .. } if start_event_id == "bad"
    ));
    assert!(err.to_string().starts_with("Invalid timer cycle expression 'R/not-a-duration'"));
    assert_eq!(subscriptions.timer_definitions(), vec![key]);
}

#[test]
fn test_failure_on_first_timer_skips_later_timers_of_same_definition() {
    let mut processes = InMemoryProcessState::new();
    let mut subscriptions = RecordingSubscriptions::new();
    let metadata = deploy(
        &mut processes,
        "P",
        1,
        definition_key(1),
        vec![timer_event("bad", "R/not-a-duration"), timer_event("good", "R/PT5M")],
    );

    let err = DeploymentReconciler::default()
        .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
        .unwrap_err();

    match err {
        ReconcileError::Evaluation {
            bpmn_process_id,
            start_event_id,
            ..
        } => {
            assert_eq!(bpmn_process_id, "P");
            assert_eq!(start_event_id, "bad");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(subscriptions.ops.is_empty());
    assert!(subscriptions.timer_definitions().is_empty());
}

#[test]
fn test_unknown_definition_key_is_reported() {
    let processes = InMemoryProcessState::new();
    let mut subscriptions = RecordingSubscriptions::new();
    let missing = definition_key(7);
    let metadata = ProcessMetadata {
        bpmn_process_id: "P".to_string(),
        version: 1,
        process_definition_key: missing,
        resource_name: "P.yaml".to_string(),
        checksum: String::new(),
        duplicate: false,
    };

    let err = DeploymentReconciler::default()
        .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
        .unwrap_err();

    assert_eq!(err, ReconcileError::UnknownDefinition { key: missing });
    assert!(subscriptions.ops.is_empty());
}

#[test]
fn test_duplicate_redeployment_reinstalls_timers() {
    let mut processes = InMemoryProcessState::new();
    let mut subscriptions = RecordingSubscriptions::new();
    let v1 = definition_key(1);
    let mut metadata = deploy(&mut processes, "P", 1, v1, vec![timer_event("start", "R/PT5M")]);
    let old_timer = subscriptions.preload(v1, "start");
    metadata.duplicate = true;

    DeploymentReconciler::default()
        .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
        .unwrap();

    assert_eq!(
        subscriptions.ops,
        vec![
            Op::Unsubscribe { timer: old_timer },
            Op::Subscribe { definition: v1, element: "start".to_string() },
        ]
    );
}

#[test]
fn test_strategies_agree_across_many_versions() {
    let run = |strategy: RetireStrategy| {
        let mut processes = InMemoryProcessState::new();
        let mut subscriptions = RecordingSubscriptions::new();
        for version in 1..=3 {
            let key = definition_key(version);
            deploy(&mut processes, "P", version as u32, key, vec![timer_event("start", "R/PT5M")]);
            subscriptions.preload(key, "start");
        }
        let unrelated = definition_key(10);
        deploy(&mut processes, "Q", 1, unrelated, vec![timer_event("start", "R/PT5M")]);
        subscriptions.preload(unrelated, "start");
        let metadata = deploy(
            &mut processes,
            "P",
            4,
            definition_key(4),
            vec![timer_event("start", "R/PT5M")],
        );

        DeploymentReconciler::new(strategy)
            .reconcile(&deployment(vec![metadata]), &processes, &evaluator(), &mut subscriptions)
            .unwrap();
        let timer_definitions = subscriptions.timer_definitions();
        (subscriptions.ops, timer_definitions)
    };

    let indexed = run(RetireStrategy::Indexed);
    let full_scan = run(RetireStrategy::FullScan);

    assert_eq!(indexed, full_scan);
    assert_eq!(indexed.1, vec![definition_key(10), definition_key(4)]);
}
