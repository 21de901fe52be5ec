//! Workflow model
//!
//! A workflow is an ordered list of tools and the directed connections between
//! them. The parser produces it; everything downstream only reads it.

use crate::parser::xml::Element;

/// Numeric tool identifier, unique within a workflow
pub type ToolId = u32;

/// Port name used when a connection does not name its source port
pub const DEFAULT_SOURCE_PORT: &str = "Output";

/// Port name used when a connection does not name its target port
pub const DEFAULT_TARGET_PORT: &str = "Input";

/// A parsed workflow document
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Tools in document order
    pub tools: Vec<Tool>,

    /// Connections in document order
    pub connections: Vec<Connection>,

    /// Where the document came from (file path or `<memory>`)
    pub source: String,
}

/// One unit of configured work
#[derive(Debug, Clone)]
pub struct Tool {
    /// Tool id
    pub id: ToolId,

    /// Normalized type tag (e.g. `Filter`, `DbFileInput`)
    pub tool_type: String,

    /// Full plugin identifier as written in the document
    pub plugin: Option<String>,

    /// Configuration relevant to code generation
    pub config: ToolConfig,

    /// Free-text annotation
    pub annotation: Option<String>,

    /// The tool's element, kept for diagnostics only
    pub raw: Element,
}

/// A directed, named-port link between two tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Upstream tool
    pub source: ToolId,

    /// Downstream tool
    pub target: ToolId,

    /// Output port on the upstream tool
    pub source_port: String,

    /// Input port on the downstream tool
    pub target_port: String,
}

impl Connection {
    /// Connection between default ports
    pub fn new(source: ToolId, target: ToolId) -> Self {
        Self {
            source,
            target,
            source_port: DEFAULT_SOURCE_PORT.to_string(),
            target_port: DEFAULT_TARGET_PORT.to_string(),
        }
    }

    /// Override the port names
    pub fn with_ports(mut self, source_port: impl Into<String>, target_port: impl Into<String>) -> Self {
        self.source_port = source_port.into();
        self.target_port = target_port.into();
        self
    }
}

/// Tool configuration extracted by the parser
///
/// Every field is optional. A tool only carries the sections its document
/// element actually contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolConfig {
    /// Source or sink path
    pub path: Option<String>,

    /// Sheet or table name inside `path`
    pub sheet: Option<String>,

    /// Row filter predicate, verbatim
    pub predicate: Option<String>,

    /// Formula assignments in declaration order
    pub formulas: Vec<FormulaAssignment>,

    /// Join keys and join type
    pub join: Option<JoinSpec>,

    /// Group-by fields
    pub group_by: Vec<String>,

    /// Aggregations in declaration order
    pub aggregations: Vec<Aggregation>,

    /// Kept fields; `None` when no field list could be extracted
    pub selected_fields: Option<Vec<SelectedField>>,

    /// Sort keys in priority order; `None` when no sort spec could be extracted
    pub sort: Option<Vec<SortKey>>,
}

/// `field = expression`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaAssignment {
    /// Output field
    pub field: String,
    /// Expression, verbatim
    pub expression: String,
}

/// Join configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSpec {
    /// Join type tag as written (`inner`, `left`, ...)
    pub join_type: Option<String>,
    /// Key fields on the left input
    pub left_keys: Vec<String>,
    /// Key fields on the right input
    pub right_keys: Vec<String>,
    /// Join by record position instead of keys
    pub by_position: bool,
}

/// One aggregation of a group-aggregate tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Source field
    pub field: String,
    /// Aggregation function as written (`Sum`, `Avg`, ...)
    pub function: String,
    /// Declared output name
    pub output: Option<String>,
}

impl Aggregation {
    /// Declared output name, or the source field name
    pub fn output_name(&self) -> &str {
        self.output.as_deref().unwrap_or(&self.field)
    }
}

/// A kept field of a column-subset tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedField {
    /// Field name
    pub field: String,
    /// New name, if renamed
    pub rename: Option<String>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// One `(field, direction)` pair of a sort specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field name
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

/// Kind of text a risk pattern is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// A filter predicate or formula expression
    Expression,
    /// A source or sink path
    Path,
}

impl ToolConfig {
    /// All free text that may hide non-deterministic constructs
    pub fn scannable_text(&self) -> Vec<(TextKind, &str)> {
        let mut texts = Vec::new();
        if let Some(predicate) = &self.predicate {
            texts.push((TextKind::Expression, predicate.as_str()));
        }
        for formula in &self.formulas {
            texts.push((TextKind::Expression, formula.expression.as_str()));
        }
        if let Some(path) = &self.path {
            texts.push((TextKind::Path, path.as_str()));
        }
        texts
    }
}

impl Workflow {
    /// Create an empty workflow
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tools: Vec::new(),
            connections: Vec::new(),
            source: "<memory>".to_string(),
        }
    }

    /// Look up a tool by id
    pub fn tool(&self, id: ToolId) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    /// Whether a tool with this id exists
    pub fn contains(&self, id: ToolId) -> bool {
        self.tool(id).is_some()
    }
}

impl Tool {
    /// Tool with an empty configuration
    pub fn new(id: ToolId, tool_type: impl Into<String>) -> Self {
        let tool_type = tool_type.into();
        Self {
            id,
            raw: Element::new("Node"),
            tool_type,
            plugin: None,
            config: ToolConfig::default(),
            annotation: None,
        }
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: ToolConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_default_ports() {
        let conn = Connection::new(1, 2);
        assert_eq!(conn.source_port, "Output");
        assert_eq!(conn.target_port, "Input");
    }

    #[test]
    fn test_connection_with_ports() {
        let conn = Connection::new(1, 3).with_ports("True", "Left");
        assert_eq!(conn.source_port, "True");
        assert_eq!(conn.target_port, "Left");
    }

    #[test]
    fn test_aggregation_output_name_falls_back_to_field() {
        let agg = Aggregation {
            field: "Sales".to_string(),
            function: "Sum".to_string(),
            output: None,
        };
        assert_eq!(agg.output_name(), "Sales");
    }

    #[test]
    fn test_scannable_text_collects_all_expressions() {
        let config = ToolConfig {
            predicate: Some("[A] > 1".to_string()),
            formulas: vec![FormulaAssignment {
                field: "B".to_string(),
                expression: "[A] * 2".to_string(),
            }],
            path: Some("C:\\data\\in.csv".to_string()),
            ..Default::default()
        };
        let texts = config.scannable_text();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[2].0, TextKind::Path);
    }

    #[test]
    fn test_workflow_lookup() {
        let mut wf = Workflow::new("wf");
        wf.tools.push(Tool::new(7, "Filter"));
        assert!(wf.contains(7));
        assert!(!wf.contains(8));
        assert_eq!(wf.tool(7).map(|t| t.tool_type.as_str()), Some("Filter"));
    }
}
