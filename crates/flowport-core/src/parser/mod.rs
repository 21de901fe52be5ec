//! Workflow document parser
//!
//! Turns an XML workflow document into a [`Workflow`]. The parser is
//! type-agnostic: it looks for every configuration section on every tool and
//! records what it finds, leaving the meaning of a tool type to the
//! [`Registry`](crate::registry::Registry).
//!
//! Expressions are copied verbatim. Field references keep their bracket
//! syntax until code generation rewrites them.

pub mod fields;
pub mod xml;

use std::collections::HashSet;
use std::path::Path;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::workflow::*;

use self::xml::Element;

/// Plugin short name of the grouping container tool
const CONTAINER_TYPE: &str = "ToolContainer";

/// Type tag given to macro instances
const MACRO_TYPE: &str = "Macro";

/// Type tag given to nodes that name no plugin at all
const UNKNOWN_TYPE: &str = "Unknown";

/// Parser for workflow documents
#[derive(Debug, Default)]
pub struct Parser;

impl Parser {
    /// Create a new parser
    pub fn new() -> Self {
        Self
    }

    /// Parse a workflow file
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Workflow> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        self.parse_source(&content, path)
    }

    /// Parse a document already read from `path`
    ///
    /// `path` names the source and supplies the fallback workflow name.
    pub fn parse_source(&self, xml: &str, path: &Path) -> Result<Workflow> {
        let mut workflow = self.parse_str(xml)?;

        workflow.source = path.display().to_string();
        if workflow.name.is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                workflow.name = stem.to_string();
            }
        }
        if workflow.name.is_empty() {
            workflow.name = "workflow".to_string();
        }

        Ok(workflow)
    }

    /// Parse a workflow document held in memory
    ///
    /// The name is left empty when the document does not carry one;
    /// [`Parser::parse_file`] fills it from the file name.
    pub fn parse_str(&self, xml: &str) -> Result<Workflow> {
        let root = xml::parse_document(xml)?;

        let nodes = root.child("Nodes").ok_or_else(|| Error::MissingElement {
            element: "Nodes".to_string(),
        })?;

        let mut workflow = Workflow::new(
            root.find(&["Properties", "MetaInfo", "Name"])
                .and_then(Element::text)
                .unwrap_or_default(),
        );

        let mut seen = HashSet::new();
        collect_tools(nodes, &mut workflow.tools, &mut seen)?;

        if let Some(connections) = root.child("Connections") {
            for element in connections.children_named("Connection") {
                workflow.connections.push(convert_connection(element)?);
            }
        }

        tracing::debug!(
            tools = workflow.tools.len(),
            connections = workflow.connections.len(),
            "Parsed workflow '{}'",
            workflow.name
        );

        Ok(workflow)
    }
}

fn collect_tools(nodes: &Element, tools: &mut Vec<Tool>, seen: &mut HashSet<ToolId>) -> Result<()> {
    for node in nodes.children_named("Node") {
        let plugin = node
            .child("GuiSettings")
            .and_then(|g| g.attr("Plugin"))
            .map(str::to_string);

        let tool_type = match &plugin {
            Some(plugin) => Registry::normalize_type(plugin).to_string(),
            None if node.find(&["EngineSettings"]).and_then(|e| e.attr("Macro")).is_some() => {
                MACRO_TYPE.to_string()
            }
            None => UNKNOWN_TYPE.to_string(),
        };

        if tool_type == CONTAINER_TYPE {
            if let Some(children) = node.child("ChildNodes") {
                collect_tools(children, tools, seen)?;
            }
            continue;
        }

        let id = parse_tool_id(node, "Node")?;
        if !seen.insert(id) {
            return Err(Error::DuplicateToolId { id });
        }

        let configuration = node.find(&["Properties", "Configuration"]);
        let config = configuration.map(convert_config).unwrap_or_default();

        tools.push(Tool {
            id,
            tool_type,
            plugin,
            config,
            annotation: convert_annotation(node),
            raw: node.clone(),
        });
    }
    Ok(())
}

fn parse_tool_id(element: &Element, element_name: &str) -> Result<ToolId> {
    let raw = element
        .attr("ToolID")
        .ok_or_else(|| Error::MissingAttribute {
            element: element_name.to_string(),
            attribute: "ToolID".to_string(),
        })?;
    raw.trim().parse().map_err(|_| Error::InvalidToolId {
        value: raw.to_string(),
    })
}

fn convert_connection(element: &Element) -> Result<Connection> {
    let origin = element.child("Origin").ok_or_else(|| Error::MissingElement {
        element: "Origin".to_string(),
    })?;
    let destination = element.child("Destination").ok_or_else(|| Error::MissingElement {
        element: "Destination".to_string(),
    })?;

    let mut connection = Connection::new(
        parse_tool_id(origin, "Origin")?,
        parse_tool_id(destination, "Destination")?,
    );
    if let Some(port) = origin.attr("Connection").filter(|p| !p.trim().is_empty()) {
        connection.source_port = port.trim().to_string();
    }
    if let Some(port) = destination.attr("Connection").filter(|p| !p.trim().is_empty()) {
        connection.target_port = port.trim().to_string();
    }
    Ok(connection)
}

fn convert_annotation(node: &Element) -> Option<String> {
    let annotation = node.find(&["Properties", "Annotation"])?;
    annotation
        .child("AnnotationText")
        .and_then(Element::text)
        .or_else(|| annotation.child("DefaultAnnotationText").and_then(Element::text))
        .map(str::to_string)
}

fn convert_config(config: &Element) -> ToolConfig {
    let (path, sheet) = convert_file(config);
    let (group_by, aggregations) = convert_summarize(config);

    ToolConfig {
        path,
        sheet,
        predicate: convert_predicate(config),
        formulas: convert_formulas(config),
        join: convert_join(config),
        group_by,
        aggregations,
        selected_fields: fields::extract_selected_fields(config).map(|(_, f)| f),
        sort: fields::extract_sort_keys(config).map(|(_, k)| k),
    }
}

/// `C:\in.xlsx|||`Sheet1$`` or `<File>` plus `<Sheet>`/`<Table>`
fn convert_file(config: &Element) -> (Option<String>, Option<String>) {
    let Some(file) = config.child("File").and_then(Element::text) else {
        return (None, None);
    };

    let (path, embedded_sheet) = match file.split_once("|||") {
        Some((path, sheet)) => (path.trim(), clean_sheet_name(sheet)),
        None => (file, None),
    };

    let sheet = embedded_sheet.or_else(|| {
        config
            .child("Sheet")
            .or_else(|| config.child("Table"))
            .and_then(Element::text_or_value)
            .and_then(clean_sheet_name)
    });

    (Some(path.to_string()), sheet)
}

fn clean_sheet_name(raw: &str) -> Option<String> {
    let name = raw.trim().trim_matches('`');
    let name = name.strip_suffix('$').unwrap_or(name).trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn convert_predicate(config: &Element) -> Option<String> {
    if let Some(expression) = config.child("Expression").and_then(Element::text) {
        return Some(expression.to_string());
    }

    let is_simple = config
        .child("Mode")
        .and_then(Element::text)
        .is_some_and(|m| m.eq_ignore_ascii_case("simple"));
    if !is_simple {
        return None;
    }

    let simple = config.child("Simple")?;
    let field = simple.child("Field").and_then(Element::text)?;
    let operator = simple.child("Operator").and_then(Element::text)?;
    let operand = simple
        .find(&["Operands", "Operand"])
        .and_then(Element::text)
        .unwrap_or_default();

    let operator = match operator {
        "=" | "==" => "=",
        "!=" | "<>" => "!=",
        ">" | ">=" | "<" | "<=" => operator,
        other => {
            tracing::warn!("Unsupported simple filter operator '{}'", other);
            return None;
        }
    };

    let operand = if is_numeric_literal(operand) {
        operand.to_string()
    } else {
        format!("\"{}\"", operand.replace('"', "\\\""))
    };

    Some(format!("[{}] {} {}", field, operator, operand))
}

/// `-12`, `3.5`, `.5`; not `NaN`, `inf` or exponents
fn is_numeric_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|c| c.is_ascii_digit())
        && fraction.chars().all(|c| c.is_ascii_digit())
}

fn convert_formulas(config: &Element) -> Vec<FormulaAssignment> {
    let Some(section) = config.child("FormulaFields") else {
        return Vec::new();
    };
    section
        .children_named("FormulaField")
        .filter_map(|f| {
            Some(FormulaAssignment {
                field: f.attr("field")?.trim().to_string(),
                expression: f.attr("expression")?.to_string(),
            })
        })
        .collect()
}

fn convert_join(config: &Element) -> Option<JoinSpec> {
    let mut spec = JoinSpec::default();
    let mut found = false;

    for info in config.children_named("JoinInfo") {
        found = true;
        let keys: Vec<String> = info
            .children_named("Field")
            .filter_map(|f| f.attr("field"))
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        match info.attr("connection").map(str::trim) {
            Some(side) if side.eq_ignore_ascii_case("right") => spec.right_keys.extend(keys),
            _ => spec.left_keys.extend(keys),
        }
    }

    if let Some(by_position) = config.child("JoinByRecordPos") {
        found = true;
        spec.by_position = by_position
            .text_or_value()
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    }

    if let Some(join_type) = config.child("JoinType").and_then(Element::text_or_value) {
        found = true;
        spec.join_type = Some(join_type.to_string());
    }

    found.then_some(spec)
}

fn convert_summarize(config: &Element) -> (Vec<String>, Vec<Aggregation>) {
    let mut group_by = Vec::new();
    let mut aggregations = Vec::new();

    let Some(section) = config.child("SummarizeFields") else {
        return (group_by, aggregations);
    };

    for entry in section.children_named("SummarizeField") {
        let (Some(field), Some(action)) = (entry.attr("field"), entry.attr("action")) else {
            continue;
        };
        let field = field.trim().to_string();
        let action = action.trim();

        if action.eq_ignore_ascii_case("groupby") {
            group_by.push(field);
        } else {
            aggregations.push(Aggregation {
                field,
                function: action.to_string(),
                output: entry
                    .attr("rename")
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
            });
        }
    }

    (group_by, aggregations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(nodes: &str, connections: &str) -> String {
        format!(
            r#"<AlteryxDocument yxmdVer="2020.1">
  <Nodes>{nodes}</Nodes>
  <Connections>{connections}</Connections>
  <Properties><MetaInfo><Name>test_wf</Name></MetaInfo></Properties>
</AlteryxDocument>"#
        )
    }

    fn node(id: u32, plugin: &str, configuration: &str) -> String {
        format!(
            r#"<Node ToolID="{id}">
  <GuiSettings Plugin="{plugin}"/>
  <Properties><Configuration>{configuration}</Configuration></Properties>
</Node>"#
        )
    }

    #[test]
    fn test_parse_minimal_workflow() {
        let xml = wrap(
            &node(1, "AlteryxBasePluginsGui.DbFileInput.DbFileInput", "<File>in.csv</File>"),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.name, "test_wf");
        assert_eq!(wf.tools.len(), 1);
        assert_eq!(wf.tools[0].tool_type, "DbFileInput");
        assert_eq!(wf.tools[0].config.path.as_deref(), Some("in.csv"));
        assert!(wf.connections.is_empty());
    }

    #[test]
    fn test_missing_nodes_is_parse_error() {
        let err = Parser::new()
            .parse_str("<AlteryxDocument><Connections/></AlteryxDocument>")
            .unwrap_err();
        assert!(matches!(err, Error::MissingElement { ref element } if element == "Nodes"));
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_malformed_markup_is_parse_error() {
        let err = Parser::new().parse_str("<AlteryxDocument><Nodes>").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_duplicate_tool_id_rejected() {
        let xml = wrap(&format!("{}{}", node(1, "Filter", ""), node(1, "Sort", "")), "");
        let err = Parser::new().parse_str(&xml).unwrap_err();
        assert!(matches!(err, Error::DuplicateToolId { id: 1 }));
    }

    #[test]
    fn test_non_numeric_tool_id_rejected() {
        let xml = wrap(r#"<Node ToolID="abc"><GuiSettings Plugin="Filter"/></Node>"#, "");
        let err = Parser::new().parse_str(&xml).unwrap_err();
        assert!(matches!(err, Error::InvalidToolId { .. }));
    }

    #[test]
    fn test_file_with_embedded_sheet() {
        let xml = wrap(
            &node(1, "DbFileInput", r"<File>C:\data\orders.xlsx|||`Sheet1$`</File>"),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        let config = &wf.tools[0].config;
        assert_eq!(config.path.as_deref(), Some(r"C:\data\orders.xlsx"));
        assert_eq!(config.sheet.as_deref(), Some("Sheet1"));
    }

    #[test]
    fn test_file_with_separate_sheet_element() {
        let xml = wrap(
            &node(1, "DbFileInput", "<File>book.xlsx</File><Sheet>Q3</Sheet>"),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.tools[0].config.sheet.as_deref(), Some("Q3"));
    }

    #[test]
    fn test_filter_expression_kept_verbatim() {
        let xml = wrap(
            &node(2, "Filter", "<Expression>[Volume] &gt; 100000</Expression><Mode>Custom</Mode>"),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.tools[0].config.predicate.as_deref(), Some("[Volume] > 100000"));
    }

    #[test]
    fn test_simple_mode_filter_builds_predicate() {
        let xml = wrap(
            &node(
                2,
                "Filter",
                r#"<Mode>Simple</Mode><Simple><Operator>=</Operator><Field>Region</Field>
                   <Operands><Operand>East</Operand></Operands></Simple>"#,
            ),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.tools[0].config.predicate.as_deref(), Some(r#"[Region] = "East""#));
    }

    #[rstest::rstest]
    #[case("100000", "[Volume] > 100000")]
    #[case("-2.5", "[Volume] > -2.5")]
    #[case("NaN", r#"[Volume] > "NaN""#)]
    #[case("inf", r#"[Volume] > "inf""#)]
    #[case("1e5", r#"[Volume] > "1e5""#)]
    fn test_simple_mode_operand_quoting(#[case] operand: &str, #[case] expected: &str) {
        let xml = wrap(
            &node(
                2,
                "Filter",
                &format!(
                    "<Mode>Simple</Mode><Simple><Operator>&gt;</Operator><Field>Volume</Field>\
                     <Operands><Operand>{operand}</Operand></Operands></Simple>"
                ),
            ),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.tools[0].config.predicate.as_deref(), Some(expected));
    }

    #[test]
    fn test_formulas_in_declaration_order() {
        let xml = wrap(
            &node(
                3,
                "Formula",
                r#"<FormulaFields>
                     <FormulaField field="Total" expression="[Price] * [Qty]"/>
                     <FormulaField field="Big" expression="IIF([Total] &gt; 10, 1, 0)"/>
                   </FormulaFields>"#,
            ),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        let formulas = &wf.tools[0].config.formulas;
        assert_eq!(formulas.len(), 2);
        assert_eq!(formulas[0].field, "Total");
        assert_eq!(formulas[1].expression, "IIF([Total] > 10, 1, 0)");
    }

    #[test]
    fn test_join_keys_and_type() {
        let xml = wrap(
            &node(
                4,
                "Join",
                r#"<JoinInfo connection="Left"><Field field="id"/></JoinInfo>
                   <JoinInfo connection="Right"><Field field="cust_id"/></JoinInfo>
                   <JoinType value="left"/>"#,
            ),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        let join = wf.tools[0].config.join.as_ref().unwrap();
        assert_eq!(join.left_keys, vec!["id"]);
        assert_eq!(join.right_keys, vec!["cust_id"]);
        assert_eq!(join.join_type.as_deref(), Some("left"));
        assert!(!join.by_position);
    }

    #[test]
    fn test_summarize_fields() {
        let xml = wrap(
            &node(
                5,
                "Summarize",
                r#"<SummarizeFields>
                     <SummarizeField field="Region" action="GroupBy" rename="Region"/>
                     <SummarizeField field="Sales" action="Sum" rename="Sum_Sales"/>
                     <SummarizeField field="Sales" action="Avg"/>
                   </SummarizeFields>"#,
            ),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        let config = &wf.tools[0].config;
        assert_eq!(config.group_by, vec!["Region"]);
        assert_eq!(config.aggregations.len(), 2);
        assert_eq!(config.aggregations[0].output_name(), "Sum_Sales");
        assert_eq!(config.aggregations[1].output_name(), "Sales");
    }

    #[test]
    fn test_absent_sections_are_empty() {
        let xml = wrap(&node(6, "Sort", ""), "");
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.tools[0].config, ToolConfig::default());
    }

    #[test]
    fn test_connections_with_ports() {
        let xml = wrap(
            &format!("{}{}", node(1, "Filter", ""), node(2, "Join", "")),
            r#"<Connection>
                 <Origin ToolID="1" Connection="False"/>
                 <Destination ToolID="2" Connection="Right"/>
               </Connection>
               <Connection>
                 <Origin ToolID="1"/>
                 <Destination ToolID="2"/>
               </Connection>"#,
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.connections.len(), 2);
        assert_eq!(wf.connections[0].source_port, "False");
        assert_eq!(wf.connections[0].target_port, "Right");
        assert_eq!(wf.connections[1], Connection::new(1, 2));
    }

    #[test]
    fn test_annotation_prefers_custom_text() {
        let xml = wrap(
            r#"<Node ToolID="1"><GuiSettings Plugin="Filter"/>
                 <Properties><Configuration/>
                   <Annotation><Name/><DefaultAnnotationText>[A] > 1</DefaultAnnotationText>
                     <AnnotationText>Big rows only</AnnotationText></Annotation>
                 </Properties></Node>"#,
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.tools[0].annotation.as_deref(), Some("Big rows only"));
    }

    #[test]
    fn test_container_children_are_flattened() {
        let xml = wrap(
            &format!(
                r#"<Node ToolID="10"><GuiSettings Plugin="AlteryxGuiToolkit.ToolContainer.ToolContainer"/>
                     <ChildNodes>{}{}</ChildNodes></Node>"#,
                node(11, "Filter", ""),
                node(12, "Sort", "")
            ),
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        let ids: Vec<ToolId> = wf.tools.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn test_macro_node_gets_macro_type() {
        let xml = wrap(
            r#"<Node ToolID="3"><GuiSettings/><EngineSettings Macro="cleanup.yxmc"/></Node>"#,
            "",
        );
        let wf = Parser::new().parse_str(&xml).unwrap();
        assert_eq!(wf.tools[0].tool_type, "Macro");
    }

    #[test]
    fn test_parse_file_uses_stem_when_unnamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders_daily.yxmd");
        std::fs::write(&path, "<AlteryxDocument><Nodes/></AlteryxDocument>").unwrap();

        let wf = Parser::new().parse_file(&path).unwrap();
        assert_eq!(wf.name, "orders_daily");
        assert!(wf.source.ends_with("orders_daily.yxmd"));
    }

    #[test]
    fn test_parse_source_names_from_path() {
        let parser = Parser::new();
        let path = Path::new("flows/q3_rollup.yxmd");

        let wf = parser
            .parse_source("<AlteryxDocument><Nodes/></AlteryxDocument>", path)
            .unwrap();
        assert_eq!(wf.name, "q3_rollup");
        assert_eq!(wf.source, path.display().to_string());

        let wf = parser.parse_source(&wrap("", ""), path).unwrap();
        assert_eq!(wf.name, "test_wf");
    }
}
