//! Dependency graph construction
//!
//! Orders the tools of a workflow so every tool comes after the tools that
//! feed it, assigns each one a synthetic node id, and resolves its inputs.
//!
//! Ordering is a FIFO zero-in-degree topological sort seeded in workflow tool
//! order, so independent branches keep their document order. When the graph
//! has a cycle the sort cannot finish; depending on the [`CyclePolicy`] the
//! builder either fails or falls back to ascending tool id order and marks
//! the result as not topological.
//!
//! Structural problems that do not stop translation are collected as
//! [`Anomaly`] values on the [`Dag`].

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::Serialize;

use flowport_core::workflow::{Connection, ToolConfig};
use flowport_core::{Operation, Registry, ToolId, Workflow, WorkflowReport};

pub use flowport_core::CyclePolicy;

use crate::error::{Error, Result};

/// Synthetic node id, 1-based position in the final order
pub type NodeId = usize;

/// Input port that receives the right-hand side of a join
const RIGHT_PORT: &str = "Right";

/// One resolved input of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInput {
    /// Upstream node
    pub node: NodeId,
    /// Upstream tool
    pub tool_id: ToolId,
    /// Output port on the upstream node
    pub source_port: String,
    /// Input port on this node
    pub target_port: String,
}

/// A tool placed in the execution order
#[derive(Debug, Clone)]
pub struct DagNode {
    /// Synthetic node id
    pub id: NodeId,
    /// Originating tool
    pub tool_id: ToolId,
    /// Normalized tool type
    pub tool_type: String,
    /// Resolved operation; `None` for unsupported, denied and unknown tools
    /// and for every tool of a blocked workflow
    pub operation: Option<Operation>,
    /// Inputs in connection encounter order
    pub inputs: Vec<NodeInput>,
    /// Output ports read by at least one downstream node
    pub consumed_ports: BTreeSet<String>,
    /// Tool configuration
    pub config: ToolConfig,
    /// Tool annotation
    pub annotation: Option<String>,
}

impl DagNode {
    /// Whether a downstream node reads the given output port
    pub fn is_port_consumed(&self, port: &str) -> bool {
        self.consumed_ports.contains(port)
    }
}

/// A structural problem found while building the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// The graph has a cycle; these tools could not be ordered
    Cycle {
        /// Tools left over by the topological sort, ascending
        tools: Vec<ToolId>,
    },
    /// A connection references a tool that does not exist
    DanglingConnection {
        /// Upstream tool id as written
        source: ToolId,
        /// Downstream tool id as written
        target: ToolId,
    },
    /// A processing node has no inputs
    MissingInput {
        /// Tool id
        tool_id: ToolId,
        /// Operation that needs input
        operation: Operation,
    },
    /// A join's first input arrives on its right-hand port
    JoinInputsReversed {
        /// Tool id
        tool_id: ToolId,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { tools } => write!(
                f,
                "cycle detected among tools {:?}; falling back to ascending tool id order",
                tools
            ),
            Self::DanglingConnection { source, target } => {
                write!(f, "connection {} -> {} references a missing tool", source, target)
            }
            Self::MissingInput { tool_id, operation } => {
                write!(f, "tool {} ({}) has no input", tool_id, operation)
            }
            Self::JoinInputsReversed { tool_id } => write!(
                f,
                "join tool {} receives its first input on the {} port",
                tool_id, RIGHT_PORT
            ),
        }
    }
}

/// Ordered dependency graph
#[derive(Debug, Clone)]
pub struct Dag {
    /// Nodes in execution order; `nodes[i].id == i + 1`
    pub nodes: Vec<DagNode>,
    /// False when the order is the cycle fallback
    pub order_is_topological: bool,
    /// Structural anomalies in discovery order
    pub anomalies: Vec<Anomaly>,
}

impl Dag {
    /// Node by synthetic id
    pub fn node(&self, id: NodeId) -> Option<&DagNode> {
        id.checked_sub(1).and_then(|i| self.nodes.get(i))
    }

    /// Node built from the given tool
    pub fn node_for_tool(&self, tool_id: ToolId) -> Option<&DagNode> {
        self.nodes.iter().find(|n| n.tool_id == tool_id)
    }

    /// Tool ids in execution order
    pub fn tool_order(&self) -> Vec<ToolId> {
        self.nodes.iter().map(|n| n.tool_id).collect()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builds a [`Dag`] from a validated workflow
#[derive(Debug, Clone, Copy)]
pub struct DagBuilder<'a> {
    registry: &'a Registry,
    cycle_policy: CyclePolicy,
}

impl Default for DagBuilder<'static> {
    fn default() -> Self {
        Self::new(Registry::global())
    }
}

impl<'a> DagBuilder<'a> {
    /// Builder over the given registry with the default cycle policy
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            cycle_policy: CyclePolicy::default(),
        }
    }

    /// Set the cycle policy
    pub fn with_cycle_policy(mut self, cycle_policy: CyclePolicy) -> Self {
        self.cycle_policy = cycle_policy;
        self
    }

    /// Build the ordered graph
    ///
    /// Operations are only resolved when the report is not blocked; the
    /// structure is computed either way.
    pub fn build(&self, workflow: &Workflow, report: &WorkflowReport) -> Result<Dag> {
        let mut anomalies = Vec::new();
        let known: HashSet<ToolId> = workflow.tools.iter().map(|t| t.id).collect();

        let mut edges: Vec<&Connection> = Vec::with_capacity(workflow.connections.len());
        for conn in &workflow.connections {
            if known.contains(&conn.source) && known.contains(&conn.target) {
                edges.push(conn);
            } else {
                let anomaly = Anomaly::DanglingConnection {
                    source: conn.source,
                    target: conn.target,
                };
                tracing::warn!("{}", anomaly);
                anomalies.push(anomaly);
            }
        }

        let (order, order_is_topological) = match topological_order(workflow, &edges) {
            Ok(order) => (order, true),
            Err(leftover) => {
                if self.cycle_policy == CyclePolicy::Fail {
                    return Err(Error::CycleDetected {
                        workflow: workflow.name.clone(),
                        tools: leftover,
                    });
                }
                let anomaly = Anomaly::Cycle { tools: leftover };
                tracing::warn!("{}", anomaly);
                anomalies.push(anomaly);

                let mut fallback: Vec<ToolId> = workflow.tools.iter().map(|t| t.id).collect();
                fallback.sort_unstable();
                (fallback, false)
            }
        };

        let node_of: HashMap<ToolId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(i, &tool_id)| (tool_id, i + 1))
            .collect();

        let mut nodes = Vec::with_capacity(order.len());
        for (position, &tool_id) in order.iter().enumerate() {
            let Some(tool) = workflow.tool(tool_id) else {
                continue;
            };

            let operation = if report.is_blocked() {
                None
            } else {
                self.registry.operation_for(&tool.tool_type)
            };

            let inputs: Vec<NodeInput> = edges
                .iter()
                .filter(|c| c.target == tool_id)
                .filter_map(|c| {
                    Some(NodeInput {
                        node: *node_of.get(&c.source)?,
                        tool_id: c.source,
                        source_port: c.source_port.clone(),
                        target_port: c.target_port.clone(),
                    })
                })
                .collect();

            let consumed_ports = edges
                .iter()
                .filter(|c| c.source == tool_id)
                .map(|c| c.source_port.clone())
                .collect();

            if let Some(op) = operation {
                if op.requires_input() && inputs.is_empty() {
                    let anomaly = Anomaly::MissingInput {
                        tool_id,
                        operation: op,
                    };
                    tracing::warn!("{}", anomaly);
                    anomalies.push(anomaly);
                }
                if op == Operation::EquiJoin
                    && inputs
                        .first()
                        .is_some_and(|i| i.target_port.eq_ignore_ascii_case(RIGHT_PORT))
                {
                    let anomaly = Anomaly::JoinInputsReversed { tool_id };
                    tracing::warn!("{}", anomaly);
                    anomalies.push(anomaly);
                }
            }

            tracing::debug!(
                node = position + 1,
                tool_id,
                inputs = inputs.len(),
                "Placed {} ({})",
                tool.tool_type,
                operation.map_or("unsupported", Operation::name)
            );

            nodes.push(DagNode {
                id: position + 1,
                tool_id,
                tool_type: tool.tool_type.clone(),
                operation,
                inputs,
                consumed_ports,
                config: tool.config.clone(),
                annotation: tool.annotation.clone(),
            });
        }

        tracing::info!(
            nodes = nodes.len(),
            topological = order_is_topological,
            anomalies = anomalies.len(),
            "Built graph for '{}'",
            workflow.name
        );

        Ok(Dag {
            nodes,
            order_is_topological,
            anomalies,
        })
    }
}

/// Kahn's algorithm seeded in tool order; on a cycle returns the unordered tools
fn topological_order(
    workflow: &Workflow,
    edges: &[&Connection],
) -> std::result::Result<Vec<ToolId>, Vec<ToolId>> {
    let mut in_degree: HashMap<ToolId, usize> =
        workflow.tools.iter().map(|t| (t.id, 0)).collect();
    let mut successors: HashMap<ToolId, Vec<ToolId>> = HashMap::new();

    for conn in edges {
        *in_degree.entry(conn.target).or_insert(0) += 1;
        successors.entry(conn.source).or_default().push(conn.target);
    }

    let mut queue: VecDeque<ToolId> = workflow
        .tools
        .iter()
        .map(|t| t.id)
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut order = Vec::with_capacity(workflow.tools.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for next in successors.get(&id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*next);
                }
            }
        }
    }

    if order.len() == workflow.tools.len() {
        Ok(order)
    } else {
        let placed: HashSet<ToolId> = order.iter().copied().collect();
        let mut leftover: Vec<ToolId> = workflow
            .tools
            .iter()
            .map(|t| t.id)
            .filter(|id| !placed.contains(id))
            .collect();
        leftover.sort_unstable();
        Err(leftover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowport_core::{Tool, validate};

    fn workflow(tools: &[(ToolId, &str)], connections: Vec<Connection>) -> Workflow {
        let mut wf = Workflow::new("test");
        for (id, t) in tools {
            wf.tools.push(Tool::new(*id, *t));
        }
        wf.connections = connections;
        wf
    }

    fn build(wf: &Workflow) -> Dag {
        let report = validate(wf, Registry::global());
        DagBuilder::default().build(wf, &report).unwrap()
    }

    #[test]
    fn test_linear_chain() {
        let wf = workflow(
            &[(3, "DbFileOutput"), (1, "DbFileInput"), (2, "Filter")],
            vec![Connection::new(1, 2), Connection::new(2, 3)],
        );
        let dag = build(&wf);

        assert!(dag.order_is_topological);
        assert_eq!(dag.tool_order(), vec![1, 2, 3]);
        assert!(dag.anomalies.is_empty());

        let filter = dag.node_for_tool(2).unwrap();
        assert_eq!(filter.id, 2);
        assert_eq!(filter.operation, Some(Operation::RowFilter));
        assert_eq!(filter.inputs.len(), 1);
        assert_eq!(filter.inputs[0].node, 1);
    }

    #[test]
    fn test_independent_branches_keep_tool_order() {
        let wf = workflow(
            &[(10, "DbFileInput"), (20, "DbFileInput"), (30, "Union")],
            vec![Connection::new(20, 30), Connection::new(10, 30)],
        );
        let dag = build(&wf);
        assert_eq!(dag.tool_order(), vec![10, 20, 30]);
    }

    #[test]
    fn test_predecessors_precede_in_acyclic_graph() {
        let wf = workflow(
            &[
                (5, "Join"),
                (4, "Sort"),
                (1, "DbFileInput"),
                (2, "DbFileInput"),
                (3, "Filter"),
                (6, "DbFileOutput"),
            ],
            vec![
                Connection::new(1, 3),
                Connection::new(3, 5).with_ports("True", "Left"),
                Connection::new(2, 4),
                Connection::new(4, 5).with_ports("Output", "Right"),
                Connection::new(5, 6).with_ports("Join", "Input"),
            ],
        );
        let dag = build(&wf);

        assert_eq!(dag.len(), wf.tools.len());
        for node in &dag.nodes {
            for input in &node.inputs {
                assert!(input.node < node.id, "{} must precede {}", input.node, node.id);
            }
        }
    }

    #[test]
    fn test_cycle_falls_back_to_ascending_ids() {
        let wf = workflow(
            &[(2, "Filter"), (1, "Sort")],
            vec![Connection::new(1, 2), Connection::new(2, 1)],
        );
        let dag = build(&wf);

        assert!(!dag.order_is_topological);
        assert_eq!(dag.tool_order(), vec![1, 2]);
        assert_eq!(dag.anomalies[0], Anomaly::Cycle { tools: vec![1, 2] });
    }

    #[test]
    fn test_cycle_fails_under_fail_policy() {
        let wf = workflow(
            &[(1, "Filter"), (2, "Sort")],
            vec![Connection::new(1, 2), Connection::new(2, 1)],
        );
        let report = validate(&wf, Registry::global());
        let err = DagBuilder::default()
            .with_cycle_policy(CyclePolicy::Fail)
            .build(&wf, &report)
            .unwrap_err();
        match err {
            Error::CycleDetected { tools, .. } => assert_eq!(tools, vec![1, 2]),
            other => panic!("Expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_connection_recorded_and_skipped() {
        let wf = workflow(
            &[(1, "DbFileInput"), (2, "DbFileOutput")],
            vec![Connection::new(1, 2), Connection::new(1, 99)],
        );
        let dag = build(&wf);

        assert!(dag.order_is_topological);
        assert!(dag.anomalies.contains(&Anomaly::DanglingConnection {
            source: 1,
            target: 99
        }));
        assert_eq!(dag.node_for_tool(2).unwrap().inputs.len(), 1);
    }

    #[test]
    fn test_missing_input_recorded() {
        let wf = workflow(&[(1, "Filter"), (2, "Union"), (3, "DbFileInput")], vec![]);
        let dag = build(&wf);
        assert_eq!(
            dag.anomalies,
            vec![Anomaly::MissingInput {
                tool_id: 1,
                operation: Operation::RowFilter
            }]
        );
    }

    #[test]
    fn test_unsupported_node_not_checked_for_input() {
        let wf = workflow(&[(1, "BrowseV2")], vec![]);
        let dag = build(&wf);
        assert!(dag.anomalies.is_empty());
        assert_eq!(dag.nodes[0].operation, None);
    }

    #[test]
    fn test_union_inputs_keep_encounter_order() {
        let wf = workflow(
            &[(1, "DbFileInput"), (2, "DbFileInput"), (3, "DbFileInput"), (4, "Union")],
            vec![
                Connection::new(2, 4),
                Connection::new(3, 4),
                Connection::new(1, 4),
            ],
        );
        let dag = build(&wf);
        let union = dag.node_for_tool(4).unwrap();
        let sources: Vec<ToolId> = union.inputs.iter().map(|i| i.tool_id).collect();
        assert_eq!(sources, vec![2, 3, 1]);
    }

    #[test]
    fn test_join_right_first_recorded() {
        let wf = workflow(
            &[(1, "DbFileInput"), (2, "DbFileInput"), (3, "Join")],
            vec![
                Connection::new(2, 3).with_ports("Output", "Right"),
                Connection::new(1, 3).with_ports("Output", "Left"),
            ],
        );
        let dag = build(&wf);
        assert!(dag
            .anomalies
            .contains(&Anomaly::JoinInputsReversed { tool_id: 3 }));
        assert_eq!(dag.node_for_tool(3).unwrap().inputs[0].tool_id, 2);
    }

    #[test]
    fn test_blocked_workflow_resolves_nothing() {
        let wf = workflow(
            &[(1, "DbFileInput"), (2, "RunCommand"), (3, "DbFileOutput")],
            vec![Connection::new(1, 2), Connection::new(2, 3)],
        );
        let dag = build(&wf);
        assert_eq!(dag.len(), 3);
        assert!(dag.nodes.iter().all(|n| n.operation.is_none()));
        assert_eq!(dag.node_for_tool(3).unwrap().inputs[0].node, 2);
        assert!(dag.anomalies.is_empty());
    }

    #[test]
    fn test_consumed_ports() {
        let wf = workflow(
            &[(1, "Filter"), (2, "DbFileOutput"), (3, "DbFileOutput")],
            vec![
                Connection::new(1, 2).with_ports("True", "Input"),
                Connection::new(1, 3).with_ports("False", "Input"),
            ],
        );
        let dag = build(&wf);
        let filter = dag.node_for_tool(1).unwrap();
        assert!(filter.is_port_consumed("True"));
        assert!(filter.is_port_consumed("False"));
        assert!(!filter.is_port_consumed("Output"));
    }

    #[test]
    fn test_node_lookup_by_id() {
        let wf = workflow(&[(7, "DbFileInput")], vec![]);
        let dag = build(&wf);
        assert_eq!(dag.node(1).map(|n| n.tool_id), Some(7));
        assert!(dag.node(0).is_none());
        assert!(dag.node(2).is_none());
    }
}
