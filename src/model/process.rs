//! Executable process definitions, as seen by deployment processing.

use crate::model::ModelError;

/// A timer expression: a literal, or a reference to a variable in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Static(String),
    Variable(String),
}

impl Expression {
    /// Parse `= name` as a variable reference, anything else as a literal.
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let trimmed = text.trim();
        match trimmed.strip_prefix('=') {
            Some(reference) => {
                let name = reference.trim();
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !name.starts_with(|c: char| c.is_ascii_digit());
                if valid {
                    Ok(Expression::Variable(name.to_string()))
                } else {
                    Err(ModelError::InvalidExpression(text.to_string()))
                }
            }
            None if trimmed.is_empty() => Err(ModelError::InvalidExpression(text.to_string())),
            None => Ok(Expression::Static(trimmed.to_string())),
        }
    }

    /// Source text as a user would write it.
    pub fn text(&self) -> &str {
        match self {
            Expression::Static(text) | Expression::Variable(text) => text,
        }
    }
}

/// How the text produced by a timer expression is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Duration,
    Cycle,
    Date,
}

impl TimerKind {
    pub fn name(self) -> &'static str {
        match self {
            TimerKind::Duration => "duration",
            TimerKind::Cycle => "cycle",
            TimerKind::Date => "date",
        }
    }
}

/// The timer specification of a timer start event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerDefinition {
    pub kind: TimerKind,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartEventKind {
    Timer(TimerDefinition),
    Message { message_name: String },
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartEvent {
    pub id: String,
    pub kind: StartEventKind,
}

impl StartEvent {
    pub fn timer(&self) -> Option<&TimerDefinition> {
        match &self.kind {
            StartEventKind::Timer(definition) => Some(definition),
            _ => None,
        }
    }

    pub fn message_name(&self) -> Option<&str> {
        match &self.kind {
            StartEventKind::Message { message_name } => Some(message_name),
            _ => None,
        }
    }
}

/// A parsed process, independent of the version it is deployed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableProcess {
    pub bpmn_process_id: String,
    pub name: Option<String>,
    /// In document order.
    pub start_events: Vec<StartEvent>,
}

impl ExecutableProcess {
    pub fn timer_start_events(&self) -> impl Iterator<Item = &StartEvent> {
        self.start_events.iter().filter(|e| e.timer().is_some())
    }

    pub fn message_start_events(&self) -> impl Iterator<Item = &StartEvent> {
        self.start_events
            .iter()
            .filter(|e| e.message_name().is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_static() {
        assert_eq!(
            Expression::parse(" PT5M ").unwrap(),
            Expression::Static("PT5M".to_string())
        );
    }

    #[test]
    fn test_expression_variable() {
        assert_eq!(
            Expression::parse("= cycle_spec").unwrap(),
            Expression::Variable("cycle_spec".to_string())
        );
    }

    #[test]
    fn test_expression_rejects_empty_and_malformed() {
        assert!(Expression::parse("").is_err());
        assert!(Expression::parse("=").is_err());
        assert!(Expression::parse("= a b").is_err());
        assert!(Expression::parse("= 1abc").is_err());
    }
}
