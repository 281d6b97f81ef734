//! Process definition model: parsed start events and their timers.

pub mod parse;
pub mod process;
pub mod timer;

pub use parse::{parse_process, ResourceFormat};
pub use process::{
    ExecutableProcess, Expression, StartEvent, StartEventKind, TimerDefinition, TimerKind,
};
pub use timer::{Interval, RepeatingInterval, TimeDate, Timer, TimerParseError};

/// Errors found while reading a process resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("unsupported resource type, expected a '.yaml', '.yml' or '.json' resource: {0}")]
    UnknownResourceType(String),

    #[error("failed to parse resource: {0}")]
    Malformed(String),

    #[error("process must have a non-empty id")]
    MissingProcessId,

    #[error("start event must have a non-empty id")]
    MissingElementId,

    #[error("duplicate element id '{0}'")]
    DuplicateElementId(String),

    #[error("start event '{0}' must not be both a timer and a message start event")]
    AmbiguousStartEvent(String),

    #[error("message start event '{0}' must have a message name")]
    MissingMessageName(String),

    #[error("timer of start event '{0}' must define exactly one of duration, cycle or date")]
    InvalidTimer(String),

    #[error("invalid expression '{0}'")]
    InvalidExpression(String),
}
