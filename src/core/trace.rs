use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use super::types::Unit;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceNode {
    pub key: String,
    pub title: String,
    pub formula: String,
    pub inputs: BTreeMap<String, f64>,
    pub value: f64,
    pub unit: Unit,
    pub notes: String,
}

impl TraceNode {
    pub fn to_flat_map(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("key", json!(self.key)),
            ("title", json!(self.title)),
            ("formula", json!(self.formula)),
            ("inputs", json!(self.inputs)),
            ("value", json!(self.value)),
            ("unit", json!(self.unit.label())),
            ("notes", json!(self.notes)),
        ])
    }
}

// Pending trace node: everything but the value.
#[derive(Debug, Clone)]
pub struct Step {
    key: &'static str,
    title: &'static str,
    formula: String,
    inputs: BTreeMap<String, f64>,
    unit: Unit,
    notes: String,
}

impl Step {
    pub fn new(
        key: &'static str,
        title: &'static str,
        formula: impl Into<String>,
        unit: Unit,
    ) -> Self {
        Self {
            key,
            title,
            formula: formula.into(),
            inputs: BTreeMap::new(),
            unit,
            notes: String::new(),
        }
    }

    pub fn input(mut self, name: impl Into<String>, value: f64) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Append-only log of the steps of one computation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    nodes: Vec<TraceNode>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step, value: f64) -> &TraceNode {
        tracing::debug!(key = step.key, value, "trace step");
        self.nodes.push(TraceNode {
            key: step.key.to_string(),
            title: step.title.to_string(),
            formula: step.formula,
            inputs: step.inputs,
            value,
            unit: step.unit,
            notes: step.notes,
        });
        &self.nodes[self.nodes.len() - 1]
    }

    pub fn as_sequence(&self) -> &[TraceNode] {
        &self.nodes
    }

    pub fn find(&self, key: &str) -> Option<&TraceNode> {
        self.nodes.iter().find(|node| node.key == key)
    }
}
