//! Workflow validation
//!
//! Classifies every tool against the [`Registry`] and folds the per-tool
//! verdicts into one [`WorkflowReport`]. The report is the only gate code
//! generation honors.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::registry::Registry;
use crate::workflow::{ToolId, Workflow};

/// Classification of a single tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolVerdict {
    /// Tool id
    pub tool_id: ToolId,

    /// Normalized tool type
    pub tool_type: String,

    /// Translates automatically
    pub supported: bool,

    /// Prevents translation of the whole workflow
    pub blocking: bool,

    /// Risk pattern tags found in the tool's text
    pub risk_tags: BTreeSet<String>,
}

impl ToolVerdict {
    /// Known to the registry but without a generation rule
    pub fn is_unsupported(&self) -> bool {
        !self.supported && !self.blocking
    }

    /// Carries at least one risk tag
    pub fn is_risky(&self) -> bool {
        !self.risk_tags.is_empty()
    }

    fn summary(&self) -> ToolSummary {
        ToolSummary {
            id: self.tool_id,
            tool_type: self.tool_type.clone(),
            risk_tags: self.risk_tags.iter().cloned().collect(),
        }
    }
}

/// Workflow-level translation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Every tool translates
    Auto,
    /// Some tools are left as manual-fix placeholders
    PartialAuto,
    /// At least one tool forbids translation
    Blocked,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "AUTO",
            Self::PartialAuto => "PARTIAL_AUTO",
            Self::Blocked => "BLOCKED",
        })
    }
}

/// Overall risk of running the translated pipeline unreviewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Nothing to review
    Low,
    /// Manual-fix points or risky expressions
    Medium,
    /// Blocked
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        })
    }
}

/// Compact tool listing used in reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    /// Tool id
    pub id: ToolId,

    /// Normalized tool type
    #[serde(rename = "type")]
    pub tool_type: String,

    /// Risk tags, sorted
    pub risk_tags: Vec<String>,
}

/// Aggregated validation result for a workflow
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    /// Translation status
    pub status: Status,

    /// Risk level
    pub risk_level: RiskLevel,

    /// Tools that block translation
    pub blocking: Vec<ToolSummary>,

    /// Known tools without a generation rule
    pub unsupported: Vec<ToolSummary>,

    /// Tools whose text matched a risk pattern
    pub risky: Vec<ToolSummary>,

    /// Per-tool verdicts in workflow order
    #[serde(skip)]
    pub verdicts: Vec<ToolVerdict>,
}

impl WorkflowReport {
    /// Whether code generation is forbidden
    pub fn is_blocked(&self) -> bool {
        self.status == Status::Blocked
    }

    /// Verdict for one tool
    pub fn verdict(&self, id: ToolId) -> Option<&ToolVerdict> {
        self.verdicts.iter().find(|v| v.tool_id == id)
    }

    /// Fold per-tool verdicts into a report
    pub fn from_verdicts(verdicts: Vec<ToolVerdict>) -> Self {
        let blocking: Vec<ToolSummary> = verdicts
            .iter()
            .filter(|v| v.blocking)
            .map(ToolVerdict::summary)
            .collect();
        let unsupported: Vec<ToolSummary> = verdicts
            .iter()
            .filter(|v| v.is_unsupported())
            .map(ToolVerdict::summary)
            .collect();
        let risky: Vec<ToolSummary> = verdicts
            .iter()
            .filter(|v| v.is_risky())
            .map(ToolVerdict::summary)
            .collect();

        let status = if !blocking.is_empty() {
            Status::Blocked
        } else if !unsupported.is_empty() {
            Status::PartialAuto
        } else {
            Status::Auto
        };

        let risk_level = match status {
            Status::Blocked => RiskLevel::High,
            Status::PartialAuto => RiskLevel::Medium,
            Status::Auto if !risky.is_empty() => RiskLevel::Medium,
            Status::Auto => RiskLevel::Low,
        };

        Self {
            status,
            risk_level,
            blocking,
            unsupported,
            risky,
            verdicts,
        }
    }
}

/// Classify a single tool
pub fn classify(registry: &Registry, tool: &crate::workflow::Tool) -> ToolVerdict {
    let risk_tags = tool
        .config
        .scannable_text()
        .into_iter()
        .flat_map(|(kind, text)| registry.risk_tags(kind, text))
        .collect();

    ToolVerdict {
        tool_id: tool.id,
        tool_type: tool.tool_type.clone(),
        supported: registry.is_supported(&tool.tool_type),
        blocking: registry.is_blocking(&tool.tool_type),
        risk_tags,
    }
}

/// Validate a workflow against the registry
pub fn validate(workflow: &Workflow, registry: &Registry) -> WorkflowReport {
    let verdicts: Vec<ToolVerdict> = workflow
        .tools
        .iter()
        .map(|tool| classify(registry, tool))
        .collect();

    for verdict in &verdicts {
        if verdict.blocking {
            tracing::warn!(
                tool_id = verdict.tool_id,
                "Tool type '{}' blocks automatic translation",
                verdict.tool_type
            );
        } else if verdict.is_unsupported() {
            tracing::warn!(
                tool_id = verdict.tool_id,
                "Tool type '{}' has no generation rule; left for manual fix",
                verdict.tool_type
            );
        }
        if verdict.is_risky() {
            tracing::warn!(tool_id = verdict.tool_id, tags = ?verdict.risk_tags, "Risky construct");
        }
    }

    let report = WorkflowReport::from_verdicts(verdicts);
    tracing::info!(
        status = %report.status,
        risk = %report.risk_level,
        "Validated workflow '{}'",
        workflow.name
    );
    report
}
