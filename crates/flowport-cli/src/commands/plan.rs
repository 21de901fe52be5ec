//! Show the step order a conversion would use

use anyhow::{Context, Result};

use flowport_codegen::DagBuilder;
use flowport_core::{Parser, Registry, validate};

use super::{cycle_policy, load_config};

/// Run the plan command
pub fn run(config_path: &str, path: &str, fail_on_cycle: bool) -> Result<()> {
    let config = load_config(config_path)?;

    let workflow = Parser::new()
        .parse_file(path)
        .with_context(|| format!("Failed to parse {}", path))?;
    let registry = Registry::global();
    let report = validate(&workflow, registry);

    let dag = DagBuilder::new(registry)
        .with_cycle_policy(cycle_policy(&config, fail_on_cycle))
        .build(&workflow, &report)
        .context("Failed to order workflow")?;

    println!("{}: {} ({} steps)", workflow.name, report.status, dag.len());
    for node in &dag.nodes {
        let operation = node.operation.map_or("unsupported", |op| op.name());
        let inputs: Vec<String> = node.inputs.iter().map(|i| i.node.to_string()).collect();
        println!(
            "  {:>3}. tool {} {} -> {} [inputs: {}]",
            node.id,
            node.tool_id,
            node.tool_type,
            operation,
            inputs.join(", ")
        );
    }
    if !dag.order_is_topological {
        println!("  warning: order is not topological");
    }
    for anomaly in &dag.anomalies {
        println!("  warning: {}", anomaly);
    }

    Ok(())
}
