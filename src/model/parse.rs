//! Resource parsing: YAML or JSON process models into [`ExecutableProcess`].
//!
//! ```yaml
//! id: order-process
//! name: Order process
//! startEvents:
//!   - id: every-five-minutes
//!     timer:
//!       cycle: R/PT5M
//!   - id: order-placed
//!     message: order-placed
//!   - id: manual
//! ```

use std::collections::HashSet;

use serde::Deserialize;

use super::process::{
    ExecutableProcess, Expression, StartEvent, StartEventKind, TimerDefinition, TimerKind,
};
use super::ModelError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ProcessModel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    start_events: Vec<StartEventModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StartEventModel {
    id: String,
    #[serde(default)]
    timer: Option<TimerModel>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimerModel {
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    cycle: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

/// Supported resource encodings, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFormat {
    Yaml,
    Json,
}

impl ResourceFormat {
    pub fn from_resource_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Some(ResourceFormat::Yaml)
        } else if lower.ends_with(".json") {
            Some(ResourceFormat::Json)
        } else {
            None
        }
    }
}

/// Parse and validate one deployment resource.
pub fn parse_process(resource_name: &str, content: &str) -> Result<ExecutableProcess, ModelError> {
    let format = ResourceFormat::from_resource_name(resource_name)
        .ok_or_else(|| ModelError::UnknownResourceType(resource_name.to_string()))?;

    let model: ProcessModel = match format {
        ResourceFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| ModelError::Malformed(e.to_string()))?
        }
        ResourceFormat::Json => {
            serde_json::from_str(content).map_err(|e| ModelError::Malformed(e.to_string()))?
        }
    };

    transform(model)
}

fn transform(model: ProcessModel) -> Result<ExecutableProcess, ModelError> {
    let bpmn_process_id = model.id.trim().to_string();
    if bpmn_process_id.is_empty() {
        return Err(ModelError::MissingProcessId);
    }

    let mut seen = HashSet::new();
    let mut start_events = Vec::with_capacity(model.start_events.len());
    for event in model.start_events {
        if event.id.trim().is_empty() {
            return Err(ModelError::MissingElementId);
        }
        if !seen.insert(event.id.clone()) {
            return Err(ModelError::DuplicateElementId(event.id));
        }
        let kind = match (event.timer, event.message) {
            (Some(_), Some(_)) => return Err(ModelError::AmbiguousStartEvent(event.id)),
            (Some(timer), None) => StartEventKind::Timer(timer_definition(&event.id, timer)?),
            (None, Some(message_name)) if message_name.trim().is_empty() => {
                return Err(ModelError::MissingMessageName(event.id))
            }
            (None, Some(message_name)) => StartEventKind::Message { message_name },
            (None, None) => StartEventKind::None,
        };
        start_events.push(StartEvent { id: event.id, kind });
    }

    Ok(ExecutableProcess {
        bpmn_process_id,
        name: model.name,
        start_events,
    })
}

fn timer_definition(event_id: &str, timer: TimerModel) -> Result<TimerDefinition, ModelError> {
    let (kind, text) = match (timer.duration, timer.cycle, timer.date) {
        (Some(text), None, None) => (TimerKind::Duration, text),
        (None, Some(text), None) => (TimerKind::Cycle, text),
        (None, None, Some(text)) => (TimerKind::Date, text),
        _ => return Err(ModelError::InvalidTimer(event_id.to_string())),
    };
    Ok(TimerDefinition {
        kind,
        expression: Expression::parse(&text)?,
    })
}
