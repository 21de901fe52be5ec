//! Convert workflows to pandas pipelines

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use flowport_codegen::{Conversion, ConvertOptions, Converter};

use super::{cycle_policy, load_config};

/// Run the convert command
pub fn run(
    config_path: &str,
    path: &str,
    output: Option<&str>,
    fail_on_cycle: bool,
    no_annotations: bool,
) -> Result<()> {
    let config = load_config(config_path)?;

    let mut options = ConvertOptions::from_config(&config);
    if let Some(output) = output {
        options.output_dir = PathBuf::from(output);
    }
    options.cycle_policy = cycle_policy(&config, fail_on_cycle);
    options.strip_annotations = no_annotations;

    let converter = Converter::new(options);
    let source = Path::new(path);

    let results = if source.is_dir() {
        tracing::info!("Converting all workflows in {}", source.display());
        converter
            .convert_all(source)
            .context("Failed to convert workflows")?
    } else {
        let conversion = converter
            .convert_file(source)
            .with_context(|| format!("Failed to convert {}", source.display()))?;
        let target = converter.options().output_dir.join(conversion.dir_name());
        conversion
            .write_artifacts(&target, &converter.options().artifacts)
            .with_context(|| format!("Failed to write artifacts to {}", target.display()))?;
        vec![(conversion, target)]
    };

    if results.is_empty() {
        tracing::warn!("No workflow files found in {}", source.display());
        return Ok(());
    }

    for (conversion, target) in &results {
        print_summary(conversion, target);
    }

    let blocked: Vec<&str> = results
        .iter()
        .filter(|(c, _)| c.is_blocked())
        .map(|(c, _)| c.name.as_str())
        .collect();
    if !blocked.is_empty() {
        anyhow::bail!(
            "{} workflow(s) BLOCKED, no pipeline generated: {}",
            blocked.len(),
            blocked.join(", ")
        );
    }

    tracing::info!("Conversion complete");
    Ok(())
}

fn print_summary(conversion: &Conversion, target: &Path) {
    let report = &conversion.report;
    println!(
        "{}: {} (risk {}) -> {}",
        conversion.name,
        report.status,
        report.risk_level,
        target.display()
    );
    for tool in &report.unsupported {
        println!("  manual fix: tool {} ({})", tool.id, tool.tool_type);
    }
    for tool in &report.blocking {
        println!("  blocking: tool {} ({})", tool.id, tool.tool_type);
    }
    for anomaly in &report.anomalies {
        println!("  warning: {}", anomaly);
    }
}
