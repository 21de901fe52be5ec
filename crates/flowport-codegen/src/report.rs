//! Conversion report
//!
//! The machine-readable summary written next to every conversion as
//! `report.json`, blocked or not.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use flowport_core::validator::ToolSummary;
use flowport_core::{RiskLevel, Status, Workflow, WorkflowReport};

use crate::dag::{Anomaly, Dag};
use crate::error::Result;

/// Tool counts by category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToolCounts {
    /// All tools in the workflow
    pub total: usize,
    /// Tools that block translation
    pub blocking: usize,
    /// Known tools left as manual-fix points
    pub unsupported: usize,
    /// Tools matching a risk pattern
    pub risky: usize,
    /// Directed connections
    pub connections: usize,
}

/// Report for one converted workflow
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    /// Workflow name
    pub workflow: String,
    /// Where the workflow was read from
    pub source: String,
    /// Translation status
    pub status: Status,
    /// Risk level
    pub risk_level: RiskLevel,
    /// Counts
    pub counts: ToolCounts,
    /// Blocking tools
    pub blocking: Vec<ToolSummary>,
    /// Unsupported tools
    pub unsupported: Vec<ToolSummary>,
    /// Risky tools
    pub risky: Vec<ToolSummary>,
    /// Structural anomalies found while ordering
    pub anomalies: Vec<Anomaly>,
    /// Whether the emitted step order is a topological order
    pub order_is_topological: bool,
    /// Tool ids in emitted step order
    pub execution_order: Vec<flowport_core::ToolId>,
    /// SHA-256 of the source document, hex encoded
    pub source_sha256: Option<String>,
    /// RFC 3339 generation timestamp
    pub generated_at: String,
}

impl ConversionReport {
    /// Assemble a report from the stage outputs
    ///
    /// `dag` is `None` when ordering never ran.
    pub fn new(workflow: &Workflow, report: &WorkflowReport, dag: Option<&Dag>) -> Self {
        Self {
            workflow: workflow.name.clone(),
            source: workflow.source.clone(),
            status: report.status,
            risk_level: report.risk_level,
            counts: ToolCounts {
                total: workflow.tools.len(),
                blocking: report.blocking.len(),
                unsupported: report.unsupported.len(),
                risky: report.risky.len(),
                connections: workflow.connections.len(),
            },
            blocking: report.blocking.clone(),
            unsupported: report.unsupported.clone(),
            risky: report.risky.clone(),
            anomalies: dag.map(|d| d.anomalies.clone()).unwrap_or_default(),
            order_is_topological: dag.is_none_or(|d| d.order_is_topological),
            execution_order: dag.map(Dag::tool_order).unwrap_or_default(),
            source_sha256: None,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Record the fingerprint of the source document
    pub fn with_source_digest(mut self, document: &[u8]) -> Self {
        self.source_sha256 = Some(sha256_hex(document));
        self
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Hex-encoded SHA-256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
