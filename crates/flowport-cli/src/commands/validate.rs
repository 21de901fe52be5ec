//! Classify a workflow without generating code

use anyhow::{Context, Result};

use flowport_core::{Parser, Registry, validate};

/// Run the validate command
///
/// Fails when the workflow is BLOCKED.
pub fn run(path: &str, json: bool) -> Result<()> {
    tracing::info!("Validating workflow: {}", path);

    let workflow = Parser::new()
        .parse_file(path)
        .with_context(|| format!("Failed to parse {}", path))?;
    let report = validate(&workflow, Registry::global());

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{}: {} (risk {}), {} tools",
            workflow.name,
            report.status,
            report.risk_level,
            workflow.tools.len()
        );
        for tool in &report.blocking {
            println!("  blocking: tool {} ({})", tool.id, tool.tool_type);
        }
        for tool in &report.unsupported {
            println!("  unsupported: tool {} ({})", tool.id, tool.tool_type);
        }
        for tool in &report.risky {
            println!(
                "  risky: tool {} ({}) [{}]",
                tool.id,
                tool.tool_type,
                tool.risk_tags.join(", ")
            );
        }
    }

    if report.is_blocked() {
        anyhow::bail!("Workflow '{}' is BLOCKED", workflow.name);
    }
    Ok(())
}
