//! Workflow converter
//!
//! Runs the whole translation for one document (parse, validate, order,
//! generate) and writes the resulting artifacts.

use std::path::{Path, PathBuf};

use flowport_core::config::ArtifactNames;
use flowport_core::{Config, CyclePolicy, Parser, Registry, Status, Workflow, validate};

use crate::dag::DagBuilder;
use crate::error::Result;
use crate::externalize::PipelineConfig;
use crate::generator::Generator;
use crate::report::ConversionReport;

/// Workflow document extensions picked up by [`Converter::convert_all`]
pub const WORKFLOW_EXTENSIONS: &[&str] = &["yxmd", "xml"];

/// Options for the converter
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory converted workflows are written to
    pub output_dir: PathBuf,

    /// What to do when the workflow graph has a cycle
    pub cycle_policy: CyclePolicy,

    /// Artifact file names
    pub artifacts: ArtifactNames,

    /// Leave tool annotations out of the generated code
    pub strip_annotations: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("converted"),
            cycle_policy: CyclePolicy::default(),
            artifacts: ArtifactNames::default(),
            strip_annotations: false,
        }
    }
}

impl ConvertOptions {
    /// Options taken from a project configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir(),
            cycle_policy: config.project.cycle_policy,
            artifacts: config.project.artifacts.clone(),
            strip_annotations: false,
        }
    }
}

/// Workflow to pipeline converter
pub struct Converter {
    options: ConvertOptions,
    parser: Parser,
    generator: Generator,
}

impl Converter {
    /// Create a new converter with the given options
    pub fn new(options: ConvertOptions) -> Self {
        let generator = Generator::new()
            .with_file_names(&options.artifacts.pipeline, &options.artifacts.config);
        Self {
            parser: Parser::new(),
            generator: if options.strip_annotations {
                generator.without_annotations()
            } else {
                generator
            },
            options,
        }
    }

    /// Converter options
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert a workflow file
    pub fn convert_file(&self, path: impl AsRef<Path>) -> Result<Conversion> {
        let path = path.as_ref();
        tracing::info!("Converting workflow: {}", path.display());

        let document = std::fs::read_to_string(path)?;
        let workflow = self.parser.parse_source(&document, path)?;
        self.convert_workflow(workflow, document.as_bytes())
    }

    /// Convert a workflow document held in memory
    pub fn convert_str(&self, xml: &str) -> Result<Conversion> {
        let workflow = self.parser.parse_str(xml)?;
        self.convert_workflow(workflow, xml.as_bytes())
    }

    /// Convert a parsed workflow
    ///
    /// `document` is only fingerprinted for the report.
    pub fn convert_workflow(&self, workflow: Workflow, document: &[u8]) -> Result<Conversion> {
        let registry = Registry::global();
        let report = validate(&workflow, registry);

        // Ordered even when blocked so the report carries anomalies and order
        let dag = DagBuilder::new(registry)
            .with_cycle_policy(self.options.cycle_policy)
            .build(&workflow, &report)?;

        if report.is_blocked() {
            tracing::warn!(
                "Workflow '{}' is BLOCKED; only the report will be written",
                workflow.name
            );
            let report =
                ConversionReport::new(&workflow, &report, Some(&dag)).with_source_digest(document);
            return Ok(Conversion {
                name: workflow.name,
                report,
                pipeline: None,
                config: None,
            });
        }

        let generated = self.generator.generate(&workflow, &report, &dag)?;

        let conversion_report =
            ConversionReport::new(&workflow, &report, Some(&dag)).with_source_digest(document);

        tracing::info!(
            status = %report.status,
            risk = %report.risk_level,
            "Converted '{}' ({} steps)",
            workflow.name,
            dag.len()
        );

        Ok(Conversion {
            name: workflow.name,
            report: conversion_report,
            pipeline: Some(generated.source),
            config: Some(generated.config),
        })
    }

    /// Convert every workflow under a directory
    ///
    /// Files are visited in sorted path order. Each conversion is written to
    /// its own subdirectory of the output directory.
    pub fn convert_all(&self, dir: impl AsRef<Path>) -> Result<Vec<(Conversion, PathBuf)>> {
        let dir = dir.as_ref();
        let mut results = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_workflow_file(e.path()))
        {
            let conversion = self.convert_file(entry.path())?;
            let target = self.options.output_dir.join(conversion.dir_name());
            conversion.write_artifacts(&target, &self.options.artifacts)?;
            results.push((conversion, target));
        }

        tracing::info!("Converted {} workflows from {}", results.len(), dir.display());
        Ok(results)
    }
}

/// Whether a path looks like a workflow document
pub fn is_workflow_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WORKFLOW_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// The outcome of converting one workflow
#[derive(Debug)]
pub struct Conversion {
    /// Workflow name
    pub name: String,

    /// Conversion report
    pub report: ConversionReport,

    /// Generated pipeline source; `None` when blocked
    pub pipeline: Option<String>,

    /// Externalized configuration; `None` when blocked
    pub config: Option<PipelineConfig>,
}

impl Conversion {
    /// Translation status
    pub fn status(&self) -> Status {
        self.report.status
    }

    /// Whether no pipeline was produced
    pub fn is_blocked(&self) -> bool {
        self.report.status == Status::Blocked
    }

    /// Directory name for this conversion under a batch output directory
    pub fn dir_name(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        if name.is_empty() { "workflow".to_string() } else { name }
    }

    /// Write the artifacts into `dir`, creating it if needed
    ///
    /// A blocked conversion writes the report only. Returns the written paths.
    pub fn write_artifacts(&self, dir: impl AsRef<Path>, names: &ArtifactNames) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        if let Some(pipeline) = &self.pipeline {
            let path = dir.join(&names.pipeline);
            std::fs::write(&path, pipeline)?;
            written.push(path);
        }
        if let Some(config) = &self.config {
            let path = dir.join(&names.config);
            std::fs::write(&path, config.to_yaml()?)?;
            written.push(path);
        }

        let path = dir.join(&names.report);
        std::fs::write(&path, self.report.to_json()?)?;
        written.push(path);

        for path in &written {
            tracing::debug!("Wrote {}", path.display());
        }
        Ok(written)
    }
}
