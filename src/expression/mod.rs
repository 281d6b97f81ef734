//! Timer expression evaluation.
//!
//! A timer definition's expression is evaluated to text, then interpreted
//! according to its [`TimerKind`]. Start-event timers are evaluated in
//! [`EvaluationScope::NoProcessInstance`], which has no variables.

use std::sync::Arc;

use serde_json::Value;

use crate::model::{
    Expression, Interval, RepeatingInterval, TimeDate, Timer, TimerDefinition, TimerKind,
};
use crate::protocol::Key;
use crate::state::VariableSource;

/// Where variables for an evaluation are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationScope {
    /// No process instance exists yet (start-event timers).
    NoProcessInstance,
    ElementInstance(Key),
}

/// An expression could not be turned into a timer.
///
/// The message is user-facing and is embedded verbatim in rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EvaluationFailure {
    message: String,
}

impl EvaluationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Evaluates timer specifications.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate_timer(
        &self,
        definition: &TimerDefinition,
        scope: EvaluationScope,
    ) -> Result<Timer, EvaluationFailure>;
}

/// Default evaluator: literals, or a single variable reference.
pub struct TimerExpressionEvaluator {
    variables: Arc<dyn VariableSource>,
}

impl TimerExpressionEvaluator {
    pub fn new(variables: Arc<dyn VariableSource>) -> Self {
        Self { variables }
    }

    /// Evaluator without any variables.
    pub fn without_variables() -> Self {
        Self::new(Arc::new(crate::state::VariableState::new()))
    }

    fn evaluate_text(
        &self,
        expression: &Expression,
        scope: EvaluationScope,
    ) -> Result<String, EvaluationFailure> {
        match expression {
            Expression::Static(text) => Ok(text.clone()),
            Expression::Variable(name) => match self.variables.variable(scope, name) {
                None => Err(EvaluationFailure::new(format!(
                    "failed to evaluate expression '{name}': no variable found for name '{name}'"
                ))),
                Some(Value::String(text)) => Ok(text),
                Some(other) => Err(EvaluationFailure::new(format!(
                    "Expected result of the expression '{name}' to be 'STRING', but was '{}'.",
                    json_type_name(&other)
                ))),
            },
        }
    }
}

impl ExpressionEvaluator for TimerExpressionEvaluator {
    fn evaluate_timer(
        &self,
        definition: &TimerDefinition,
        scope: EvaluationScope,
    ) -> Result<Timer, EvaluationFailure> {
        let text = self.evaluate_text(&definition.expression, scope)?;
        let parsed = match definition.kind {
            TimerKind::Duration => Interval::parse(&text).map(Timer::Interval),
            TimerKind::Cycle => RepeatingInterval::parse(&text).map(Timer::Cycle),
            TimerKind::Date => TimeDate::parse(&text).map(Timer::Date),
        };
        parsed.map_err(|e| {
            EvaluationFailure::new(format!(
                "Invalid timer {} expression '{}': {}",
                definition.kind.name(),
                text,
                e
            ))
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Bool(_) => "BOOLEAN",
        Value::Number(_) => "NUMBER",
        Value::String(_) => "STRING",
        Value::Array(_) => "ARRAY",
        Value::Object(_) => "OBJECT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::VariableState;
    use serde_json::json;

    fn definition(kind: TimerKind, text: &str) -> TimerDefinition {
        TimerDefinition {
            kind,
            expression: Expression::parse(text).unwrap(),
        }
    }

    #[test]
    fn test_static_cycle() {
        let evaluator = TimerExpressionEvaluator::without_variables();
        let timer = evaluator
            .evaluate_timer(
                &definition(TimerKind::Cycle, "R2/PT1M"),
                EvaluationScope::NoProcessInstance,
            )
            .unwrap();

        assert_eq!(timer.repetitions(), Some(2));
    }

    #[test]
    fn test_variable_missing_without_process_instance() {
        let mut variables = VariableState::new();
        variables.set_variable(Key::from_raw(1), "wait", json!("PT5M"));
        let evaluator = TimerExpressionEvaluator::new(Arc::new(variables));

        let failure = evaluator
            .evaluate_timer(
                &definition(TimerKind::Duration, "= wait"),
                EvaluationScope::NoProcessInstance,
            )
            .unwrap_err();

        assert_eq!(
            failure.message(),
            "failed to evaluate expression 'wait': no variable found for name 'wait'"
        );
    }

    #[test]
    fn test_variable_resolved_in_element_instance_scope() {
        let mut variables = VariableState::new();
        variables.set_variable(Key::from_raw(1), "wait", json!("PT5M"));
        let evaluator = TimerExpressionEvaluator::new(Arc::new(variables));

        let timer = evaluator.evaluate_timer(
            &definition(TimerKind::Duration, "= wait"),
            EvaluationScope::ElementInstance(Key::from_raw(1)),
        );

        assert!(matches!(timer, Ok(Timer::Interval(_))));
    }

    #[test]
    fn test_variable_of_wrong_type() {
        let mut variables = VariableState::new();
        variables.set_variable(Key::from_raw(1), "wait", json!(5));
        let evaluator = TimerExpressionEvaluator::new(Arc::new(variables));

        let failure = evaluator
            .evaluate_timer(
                &definition(TimerKind::Duration, "= wait"),
                EvaluationScope::ElementInstance(Key::from_raw(1)),
            )
            .unwrap_err();

        assert_eq!(
            failure.message(),
            "Expected result of the expression 'wait' to be 'STRING', but was 'NUMBER'."
        );
    }

    #[test]
    fn test_malformed_cycle_text() {
        let evaluator = TimerExpressionEvaluator::without_variables();
        let failure = evaluator
            .evaluate_timer(
                &definition(TimerKind::Cycle, "R/foo"),
                EvaluationScope::NoProcessInstance,
            )
            .unwrap_err();

        assert!(failure
            .message()
            .starts_with("Invalid timer cycle expression 'R/foo': "));
    }
}
