//! Configuration externalization
//!
//! Moves environment-specific values out of the generated code and into
//! `config.yaml`, so a pipeline can be pointed at new files or retuned
//! without editing source.
//!
//! - Source and sink nodes get stable keys `input_N` / `output_N`, numbered
//!   per section in graph order from 1.
//! - Numeric literals compared against in row filters become parameters
//!   named `threshold_<literal>`.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use flowport_core::Operation;

use crate::dag::{Dag, NodeId};
use crate::error::Result;
use crate::expr;

/// Externalized configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sources by key
    pub inputs: BTreeMap<String, InputConfig>,
    /// Tunable parameters by name
    pub parameters: BTreeMap<String, serde_yaml::Value>,
    /// Sinks by key
    pub outputs: BTreeMap<String, OutputConfig>,
}

impl PipelineConfig {
    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// A source table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// File path; `None` when the workflow did not configure one
    pub path: Option<String>,
    /// Sheet or table inside the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

/// A sink table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// File path; `None` when the workflow did not configure one
    pub path: Option<String>,
}

/// A translated filter predicate with its literals replaced by parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// Predicate as written in the workflow
    pub original: String,
    /// Translated predicate referencing parameter names
    pub code: String,
    /// Parameters referenced, in order of first use
    pub parameters: Vec<String>,
}

/// Result of externalizing a graph
#[derive(Debug, Clone, Default)]
pub struct Externalized {
    /// The configuration document
    pub config: PipelineConfig,
    io_keys: HashMap<NodeId, String>,
    predicates: HashMap<NodeId, Predicate>,
}

impl Externalized {
    /// `input_N` / `output_N` key assigned to a source or sink node
    pub fn io_key(&self, node: NodeId) -> Option<&str> {
        self.io_keys.get(&node).map(String::as_str)
    }

    /// Parameterized predicate of a filter node
    pub fn predicate(&self, node: NodeId) -> Option<&Predicate> {
        self.predicates.get(&node)
    }
}

/// Extract configuration from every source, sink and filter node
pub fn externalize(dag: &Dag) -> Externalized {
    let mut out = Externalized::default();

    for node in &dag.nodes {
        match node.operation {
            Some(Operation::ReadInput) => {
                let key = format!("input_{}", out.config.inputs.len() + 1);
                if node.config.path.is_none() {
                    tracing::warn!(tool_id = node.tool_id, "Input has no path; '{}' left empty", key);
                }
                out.config.inputs.insert(
                    key.clone(),
                    InputConfig {
                        path: node.config.path.clone(),
                        sheet: node.config.sheet.clone(),
                    },
                );
                out.io_keys.insert(node.id, key);
            }
            Some(Operation::WriteOutput) => {
                let key = format!("output_{}", out.config.outputs.len() + 1);
                if node.config.path.is_none() {
                    tracing::warn!(tool_id = node.tool_id, "Output has no path; '{}' left empty", key);
                }
                out.config.outputs.insert(
                    key.clone(),
                    OutputConfig {
                        path: node.config.path.clone(),
                    },
                );
                out.io_keys.insert(node.id, key);
            }
            Some(Operation::RowFilter) => {
                let Some(original) = node.config.predicate.as_deref() else {
                    continue;
                };
                let translated = expr::translate(original);
                let (code, parameters) = parameterize(&translated);
                for (name, value) in &parameters {
                    out.config.parameters.insert(name.clone(), value.clone());
                }
                out.predicates.insert(
                    node.id,
                    Predicate {
                        original: original.to_string(),
                        code,
                        parameters: parameters.into_iter().map(|(name, _)| name).collect(),
                    },
                );
            }
            _ => {}
        }
    }

    tracing::debug!(
        inputs = out.config.inputs.len(),
        outputs = out.config.outputs.len(),
        parameters = out.config.parameters.len(),
        "Externalized configuration"
    );
    out
}

static NUMERIC_COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(==|!=|<=|>=|<|>)(\s*)(-?\d+(?:\.\d+)?)\b")
        .expect("numeric comparison pattern must compile")
});

/// Parameter name for a numeric literal
///
/// `100000` → `threshold_100000`, `2.5` → `threshold_2_5`, `-3` → `threshold_neg3`.
pub fn parameter_name(literal: &str) -> String {
    let body = match literal.strip_prefix('-') {
        Some(rest) => format!("neg{}", rest),
        None => literal.to_string(),
    };
    format!("threshold_{}", body.replace('.', "_"))
}

fn parameter_value(literal: &str) -> serde_yaml::Value {
    let number = if literal.contains('.') {
        literal.parse::<f64>().ok().map(serde_yaml::Number::from)
    } else {
        literal
            .parse::<i64>()
            .ok()
            .map(serde_yaml::Number::from)
            .or_else(|| literal.parse::<f64>().ok().map(serde_yaml::Number::from))
    };
    number.map_or_else(
        || serde_yaml::Value::String(literal.to_string()),
        serde_yaml::Value::Number,
    )
}

/// Replace numeric literals compared against with parameter names
///
/// Quoted strings are left alone. Each distinct literal yields one parameter.
pub fn parameterize(translated: &str) -> (String, Vec<(String, serde_yaml::Value)>) {
    let mut parameters: Vec<(String, serde_yaml::Value)> = Vec::new();
    let mut code = String::with_capacity(translated.len());

    for (quoted, segment) in expr::split_quoted(translated) {
        if quoted {
            code.push_str(segment);
            continue;
        }
        let replaced = NUMERIC_COMPARISON.replace_all(segment, |c: &Captures<'_>| {
            let literal = &c[3];
            let name = parameter_name(literal);
            if !parameters.iter().any(|(n, _)| *n == name) {
                parameters.push((name.clone(), parameter_value(literal)));
            }
            format!("{}{}{}", &c[1], &c[2], name)
        });
        code.push_str(&replaced);
    }

    (code, parameters)
}
