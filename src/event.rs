//! Run event model and canonical JSON encoding

use chrono::{SecondsFormat, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Facets attached to a run, job or dataset
pub type Facets = BTreeMap<String, Value>;

/// Lifecycle state carried by a run event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    Start,
    Running,
    Complete,
    Abort,
    Fail,
    Other,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Start => "START",
            RunState::Running => "RUNNING",
            RunState::Complete => "COMPLETE",
            RunState::Abort => "ABORT",
            RunState::Fail => "FAIL",
            RunState::Other => "OTHER",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
    #[serde(default)]
    pub facets: Facets,
}

impl Run {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            facets: Facets::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Job {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub facets: Facets,
}

impl Job {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            facets: Facets::new(),
        }
    }
}

/// An input or output dataset of a run
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dataset {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub facets: Facets,
}

impl Dataset {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            facets: Facets::new(),
        }
    }
}

/// One lineage fact: a job run changed state at a point in time
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    pub event_type: RunState,
    pub event_time: String,
    pub run: Run,
    pub job: Job,
    pub producer: String,
    #[serde(default)]
    pub inputs: Vec<Dataset>,
    #[serde(default)]
    pub outputs: Vec<Dataset>,
    #[serde(rename = "schemaURL", default, skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
}

impl RunEvent {
    /// ```
    /// use lineage_client::{Job, Run, RunEvent, RunState};
    ///
    /// let event = RunEvent::new(
    ///     RunState::Complete,
    ///     "2021-11-03T10:53:52.427343",
    ///     Run::new("69f4acab-b87d-4fc0-b27b-8ea950370ff3"),
    ///     Job::new("openlineage", "daily_load"),
    ///     "my-scheduler",
    /// );
    /// assert_eq!(event.job.name, "daily_load");
    /// assert!(event.inputs.is_empty());
    /// ```
    pub fn new(event_type: RunState, event_time: impl Into<String>, run: Run, job: Job, producer: impl Into<String>) -> Self {
        Self {
            event_type,
            event_time: event_time.into(),
            run,
            job,
            producer: producer.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            schema_url: None,
        }
    }

    /// Create an event stamped with the current UTC time
    pub fn now(event_type: RunState, run: Run, job: Job, producer: impl Into<String>) -> Self {
        let event_time = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        Self::new(event_type, event_time, run, job, producer)
    }

    pub fn with_inputs(mut self, inputs: Vec<Dataset>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Dataset>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Interpret an arbitrary JSON value as a run event.
    ///
    /// Anything that does not have the shape of a run event is a usage error.
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::Usage(format!("expected a JSON object, got {}", json_kind(value))));
        }
        Self::deserialize(value).map_err(|e| Error::Usage(e.to_string()))
    }

    /// Parse a JSON document into a run event
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::Usage(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Canonical JSON encoding of this event
    pub fn to_canonical_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    /// Format for terminal display
    pub fn format_display(&self) -> String {
        let state = self.event_type.to_string();
        let state_colored = match self.event_type {
            RunState::Start => state.green(),
            RunState::Complete => state.blue(),
            RunState::Fail | RunState::Abort => state.red(),
            RunState::Running => state.cyan(),
            RunState::Other => state.normal(),
        };

        let short_id: String = self.run.run_id.chars().take(8).collect();
        let mut parts = vec![
            self.event_time.dimmed().to_string(),
            state_colored.to_string(),
            format!("{}/{}", self.job.namespace, self.job.name).bold().to_string(),
            format!("[{}]", short_id).dimmed().to_string(),
        ];

        if !self.inputs.is_empty() || !self.outputs.is_empty() {
            parts.push(format!("{} in, {} out", self.inputs.len(), self.outputs.len()));
        }

        parts.join(" ")
    }
}

/// Serialize a value to its canonical JSON form.
///
/// Object keys are sorted at every depth and null-valued object entries are
/// dropped. Empty arrays and objects are kept.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&canonicalize(value))?)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().filter(|(_, v)| !v.is_null()).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, v) in entries {
                sorted.insert(key, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
