//! Pipeline source generation
//!
//! Renders the ordered graph into a standalone Python module. Each node
//! becomes one step inside `run(config)`, bound to the variable `df_<node>`;
//! the surrounding module (imports, table I/O and expression helpers) comes
//! from the `pipeline.py` template.

use minijinja::{Environment, context};

use flowport_core::{Operation, Workflow, WorkflowReport};

use crate::dag::{Dag, DagNode, NodeId, NodeInput};
use crate::error::{Error, Result};
use crate::expr::RESERVED_IDENTIFIERS;
use crate::externalize::{self, Externalized, PipelineConfig};
use crate::transforms::*;

const PIPELINE_TEMPLATE: &str = include_str!("../templates/pipeline.py.j2");

/// Output port of a filter that carries the rejected rows
const FALSE_PORT: &str = "False";

/// Generated pipeline source and its configuration document
#[derive(Debug, Clone)]
pub struct GeneratedPipeline {
    /// Python module text
    pub source: String,
    /// Externalized configuration
    pub config: PipelineConfig,
}

/// Python pipeline generator
#[derive(Debug, Clone)]
pub struct Generator {
    include_annotations: bool,
    pipeline_file: String,
    config_file: String,
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator {
    /// Create a new generator
    pub fn new() -> Self {
        Self {
            include_annotations: true,
            pipeline_file: "pipeline.py".to_string(),
            config_file: "config.yaml".to_string(),
        }
    }

    /// Leave tool annotations out of the generated comments
    pub fn without_annotations(mut self) -> Self {
        self.include_annotations = false;
        self
    }

    /// File names the generated module refers to in its usage line
    pub fn with_file_names(mut self, pipeline: impl Into<String>, config: impl Into<String>) -> Self {
        self.pipeline_file = pipeline.into();
        self.config_file = config.into();
        self
    }

    /// Generate the pipeline for an ordered graph
    ///
    /// Refuses a blocked workflow.
    pub fn generate(&self, workflow: &Workflow, report: &WorkflowReport, dag: &Dag) -> Result<GeneratedPipeline> {
        if report.is_blocked() {
            return Err(Error::Blocked {
                workflow: workflow.name.clone(),
                tools: report.blocking.iter().map(|t| t.id).collect(),
            });
        }

        let externalized = externalize::externalize(dag);

        let steps: Vec<String> = dag
            .nodes
            .iter()
            .map(|node| self.generate_step(dag, node, &externalized))
            .collect();

        let manual_fixes: Vec<String> = report
            .unsupported
            .iter()
            .map(|t| format!("{} ({})", t.id, t.tool_type))
            .collect();
        let anomalies: Vec<String> = dag.anomalies.iter().map(ToString::to_string).collect();

        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.add_template("pipeline.py", PIPELINE_TEMPLATE)?;

        let source = env.get_template("pipeline.py")?.render(context! {
            name => &workflow.name,
            source => &workflow.source,
            status => report.status.to_string(),
            risk_level => report.risk_level.to_string(),
            topological => dag.order_is_topological,
            manual_fixes => manual_fixes,
            anomalies => anomalies,
            reserved => RESERVED_IDENTIFIERS,
            steps => steps,
            pipeline_file => &self.pipeline_file,
            config_file => &self.config_file,
        })?;

        tracing::info!(
            steps = dag.len(),
            bytes = source.len(),
            "Generated pipeline for '{}'",
            workflow.name
        );

        Ok(GeneratedPipeline {
            source,
            config: externalized.config,
        })
    }

    fn generate_step(&self, dag: &Dag, node: &DagNode, ext: &Externalized) -> String {
        let var = node_var(node.id);
        let inputs: Vec<String> = node.inputs.iter().map(|i| input_var(dag, i)).collect();
        let first = inputs.first().map(String::as_str);

        let mut code = format!(
            "{INDENT}# --- step {}: {} (tool {}) -> {}\n",
            node.id,
            node.tool_type,
            node.tool_id,
            node.operation.map_or("UNSUPPORTED", Operation::name)
        );
        if self.include_annotations {
            if let Some(annotation) = &node.annotation {
                code.push_str(&py_comment(annotation));
            }
        }

        let Some(operation) = node.operation else {
            tracing::debug!(node = node.id, "Step for {} is a placeholder", node.tool_type);
            code.push_str(&passthrough(
                &var,
                first,
                &format!("UNSUPPORTED: {} needs a manual translation", node.tool_type),
            ));
            return trim_step(code);
        };

        let body = match (operation, first) {
            (Operation::ReadInput, _) => match ext.io_key(node.id) {
                Some(key) => IoCodegen::read(&var, key),
                None => passthrough(&var, None, "input has no configuration key"),
            },
            (Operation::WriteOutput, _) => match ext.io_key(node.id) {
                Some(key) => IoCodegen::write(&var, first, key),
                None => passthrough(&var, first, "output has no configuration key"),
            },
            (Operation::Union, _) => UnionCodegen::generate(&var, &inputs),
            (Operation::EquiJoin, _) => {
                let second = inputs.get(1).map(String::as_str);
                let spec = node.config.join.as_ref();
                let mut body = JoinCodegen::generate(&var, first, second, spec);
                for side in JoinSide::ALL {
                    if node.consumed_ports.iter().any(|p| JoinSide::from_port(p) == Some(side)) {
                        body.push_str(&JoinCodegen::unjoined(&var, side, first, second, spec));
                    }
                }
                body
            }
            (_, None) => passthrough(&var, None, &format!("{} has no input", operation)),
            (Operation::RowFilter, Some(input)) => FilterCodegen::generate(
                &var,
                input,
                ext.predicate(node.id),
                node.consumed_ports
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(FALSE_PORT)),
            ),
            (Operation::ColumnFormula, Some(input)) => {
                FormulaCodegen::generate(&var, input, &node.config.formulas)
            }
            (Operation::GroupAggregate, Some(input)) => SummarizeCodegen::generate(
                &var,
                input,
                &node.config.group_by,
                &node.config.aggregations,
            ),
            (Operation::ColumnSubset, Some(input)) => {
                SelectCodegen::generate(&var, input, node.config.selected_fields.as_deref())
            }
            (Operation::RowSort, Some(input)) => {
                SortCodegen::generate(&var, input, node.config.sort.as_deref())
            }
        };
        code.push_str(&body);

        tracing::debug!(node = node.id, "Generated {} step", operation);
        trim_step(code)
    }
}

/// Variable holding a node's result
pub fn node_var(node: NodeId) -> String {
    format!("df_{}", node)
}

/// Variable an input reads from
///
/// A filter's `False` port reads the rejected rows and a join's `Left` and
/// `Right` ports read the unjoined rows of that side.
fn input_var(dag: &Dag, input: &NodeInput) -> String {
    let var = node_var(input.node);
    match dag.node(input.node).and_then(|n| n.operation) {
        Some(Operation::RowFilter) if input.source_port.eq_ignore_ascii_case(FALSE_PORT) => {
            format!("{var}_false")
        }
        Some(Operation::EquiJoin) => match JoinSide::from_port(&input.source_port) {
            Some(side) => side.var(&var),
            None => var,
        },
        _ => var,
    }
}

fn trim_step(mut code: String) -> String {
    while code.ends_with('\n') {
        code.pop();
    }
    code
}
