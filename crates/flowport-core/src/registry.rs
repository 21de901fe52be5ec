//! Tool capability registry
//!
//! The one place that knows what each tool type means. Parsing, validation,
//! ordering and code generation all ask this table instead of matching on
//! type strings themselves, so adding a tool type is a one-line change here
//! plus, for a new [`Operation`], a generation rule the compiler will demand.
//!
//! # Capability classes
//!
//! | Class | Effect on a workflow |
//! |---|---|
//! | `Supported(op)` | translated automatically |
//! | `Unsupported` | passthrough placeholder, workflow becomes `PARTIAL_AUTO` |
//! | `Denied` (or absent) | workflow becomes `BLOCKED` |

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;
use serde::Serialize;

use crate::workflow::TextKind;

/// A translatable tabular operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Load a table from a file
    ReadInput,
    /// Persist a table to a file
    WriteOutput,
    /// Keep rows matching a predicate
    RowFilter,
    /// Derive or overwrite columns from expressions
    ColumnFormula,
    /// Key-based join of two tables
    EquiJoin,
    /// Group by fields and aggregate
    GroupAggregate,
    /// Row-wise concatenation
    Union,
    /// Keep a subset of columns
    ColumnSubset,
    /// Order rows
    RowSort,
}

impl Operation {
    /// Stable operation name used in reports and generated comments
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadInput => "read-input",
            Self::WriteOutput => "write-output",
            Self::RowFilter => "row-filter",
            Self::ColumnFormula => "column-formula",
            Self::EquiJoin => "equi-join",
            Self::GroupAggregate => "group-aggregate",
            Self::Union => "union",
            Self::ColumnSubset => "column-subset",
            Self::RowSort => "row-sort",
        }
    }

    /// Whether a node with this operation and no inputs is a structural anomaly
    pub fn requires_input(self) -> bool {
        match self {
            Self::ReadInput | Self::Union => false,
            Self::WriteOutput
            | Self::RowFilter
            | Self::ColumnFormula
            | Self::EquiJoin
            | Self::GroupAggregate
            | Self::ColumnSubset
            | Self::RowSort => true,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the registry knows about a tool type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Translates to this operation
    Supported(Operation),
    /// Known tool with no generation rule; left as a manual-fix point
    Unsupported,
    /// Never translated automatically
    Denied,
}

static CAPABILITIES: phf::Map<&'static str, Capability> = phf_map! {
    // Sources and sinks
    "DbFileInput" => Capability::Supported(Operation::ReadInput),
    "DbFileOutput" => Capability::Supported(Operation::WriteOutput),

    // Row and column operations
    "Filter" => Capability::Supported(Operation::RowFilter),
    "Formula" => Capability::Supported(Operation::ColumnFormula),
    "MultiFieldFormula" => Capability::Unsupported,
    "AlteryxSelect" => Capability::Supported(Operation::ColumnSubset),
    "Sort" => Capability::Supported(Operation::RowSort),

    // Multi-input operations
    "Join" => Capability::Supported(Operation::EquiJoin),
    "Union" => Capability::Supported(Operation::Union),
    "AppendFields" => Capability::Unsupported,
    "JoinMultiple" => Capability::Unsupported,

    // Aggregation
    "Summarize" => Capability::Supported(Operation::GroupAggregate),
    "CrossTab" => Capability::Unsupported,
    "Transpose" => Capability::Unsupported,

    // Known tools without a generation rule
    "BrowseV2" => Capability::Unsupported,
    "TextInput" => Capability::Unsupported,
    "Sample" => Capability::Unsupported,
    "Unique" => Capability::Unsupported,
    "RecordID" => Capability::Unsupported,
    "DateTime" => Capability::Unsupported,
    "TextToColumns" => Capability::Unsupported,
    "FindReplace" => Capability::Unsupported,
    "DataCleansing" => Capability::Unsupported,

    // Deny-list: arbitrary code, dynamic I/O, side effects
    "RunCommand" => Capability::Denied,
    "JupyterCode" => Capability::Denied,
    "PythonTool" => Capability::Denied,
    "RTool" => Capability::Denied,
    "DynamicInput" => Capability::Denied,
    "DynamicRename" => Capability::Denied,
    "Download" => Capability::Denied,
    "Email" => Capability::Denied,
    "Macro" => Capability::Denied,
};

/// A regular expression flagging a non-deterministic or environment-dependent construct
#[derive(Debug)]
pub struct RiskPattern {
    /// Label recorded on the tool verdict
    pub tag: &'static str,
    /// Restrict matching to one kind of text; `None` matches everything
    pub applies_to: Option<TextKind>,
    /// The pattern
    pub regex: Regex,
}

impl RiskPattern {
    fn new(tag: &'static str, applies_to: Option<TextKind>, pattern: &str) -> Self {
        Self {
            tag,
            applies_to,
            regex: Regex::new(pattern).expect("built-in risk pattern must compile"),
        }
    }

    /// Whether this pattern fires on `text` of the given kind
    pub fn matches(&self, kind: TextKind, text: &str) -> bool {
        self.applies_to.is_none_or(|k| k == kind) && self.regex.is_match(text)
    }
}

/// Tag for field references that build a path at runtime
pub const TAG_DYNAMIC_PATH: &str = "dynamic_path";
/// Tag for functions that touch the filesystem
pub const TAG_FILESYSTEM: &str = "filesystem_function";
/// Tag for functions that read the clock
pub const TAG_WALL_CLOCK: &str = "wall_clock";
/// Tag for functions that produce random values
pub const TAG_RANDOMNESS: &str = "randomness";

static RISK_PATTERNS: Lazy<Vec<RiskPattern>> = Lazy::new(|| {
    vec![
        RiskPattern::new(TAG_DYNAMIC_PATH, Some(TextKind::Path), r"\[[^\]\r\n]+\]"),
        RiskPattern::new(
            TAG_DYNAMIC_PATH,
            Some(TextKind::Expression),
            r#"\[[^\]]+\]\s*\+\s*["'][^"']*[\\/]|["'][^"']*[\\/]["']\s*\+\s*\[[^\]]+\]"#,
        ),
        RiskPattern::new(
            TAG_FILESYSTEM,
            None,
            r"(?i)\b(?:FileExists|FileGetDir|FileGetExt|FileGetFileName|FileAddDir|FileGetSize|GetEnvironmentVariable)\s*\(",
        ),
        RiskPattern::new(
            TAG_WALL_CLOCK,
            None,
            r"(?i)\b(?:DateTimeNow|DateTimeToday|DateTimeStart|Now|Today)\s*\(",
        ),
        RiskPattern::new(
            TAG_RANDOMNESS,
            None,
            r"(?i)\b(?:Rand|RandInt|Random|UuidCreate|NewGuid)\s*\(",
        ),
    ]
});

/// Read-only view over the capability table and risk patterns
#[derive(Debug, Clone, Copy, Default)]
pub struct Registry;

static GLOBAL: Registry = Registry;

impl Registry {
    /// The process-wide registry
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Reduce a plugin identifier to its registry key
    ///
    /// `AlteryxBasePluginsGui.Filter.Filter` becomes `Filter`.
    pub fn normalize_type(plugin: &str) -> &str {
        plugin.rsplit('.').next().unwrap_or(plugin).trim()
    }

    /// Capability for a tool type, `None` when the type is unknown
    pub fn capability(&self, tool_type: &str) -> Option<Capability> {
        CAPABILITIES.get(Self::normalize_type(tool_type)).copied()
    }

    /// Whether the type translates automatically
    pub fn is_supported(&self, tool_type: &str) -> bool {
        self.operation_for(tool_type).is_some()
    }

    /// The operation a tool type translates to
    pub fn operation_for(&self, tool_type: &str) -> Option<Operation> {
        match self.capability(tool_type) {
            Some(Capability::Supported(op)) => Some(op),
            Some(Capability::Unsupported | Capability::Denied) | None => None,
        }
    }

    /// Whether the type blocks translation of the whole workflow
    ///
    /// True for deny-listed types and for types the table does not know at all.
    pub fn is_blocking(&self, tool_type: &str) -> bool {
        matches!(self.capability(tool_type), Some(Capability::Denied) | None)
    }

    /// Whether the type is explicitly deny-listed
    pub fn is_denied(&self, tool_type: &str) -> bool {
        matches!(self.capability(tool_type), Some(Capability::Denied))
    }

    /// All risk patterns
    pub fn risk_patterns(&self) -> &'static [RiskPattern] {
        RISK_PATTERNS.as_slice()
    }

    /// Risk tags raised by a piece of text
    pub fn risk_tags(&self, kind: TextKind, text: &str) -> BTreeSet<String> {
        self.risk_patterns()
            .iter()
            .filter(|p| p.matches(kind, text))
            .map(|p| p.tag.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("DbFileInput", Some(Operation::ReadInput))]
    #[case("AlteryxBasePluginsGui.Filter.Filter", Some(Operation::RowFilter))]
    #[case("AlteryxSpatialPluginsGui.Summarize.Summarize", Some(Operation::GroupAggregate))]
    #[case("AlteryxSelect", Some(Operation::ColumnSubset))]
    #[case("BrowseV2", None)]
    #[case("RunCommand", None)]
    #[case("NoSuchTool", None)]
    fn test_operation_for(#[case] tool_type: &str, #[case] expected: Option<Operation>) {
        assert_eq!(Registry::global().operation_for(tool_type), expected);
    }

    #[rstest]
    #[case("RunCommand", true)]
    #[case("Macro", true)]
    #[case("NoSuchTool", true)]
    #[case("BrowseV2", false)]
    #[case("Join", false)]
    fn test_is_blocking(#[case] tool_type: &str, #[case] expected: bool) {
        assert_eq!(Registry::global().is_blocking(tool_type), expected);
    }

    #[test]
    fn test_unknown_type_is_blocking_but_not_denied() {
        let registry = Registry::global();
        assert!(registry.is_blocking("Mystery"));
        assert!(!registry.is_denied("Mystery"));
        assert!(!registry.is_supported("Mystery"));
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(
            Registry::normalize_type("AlteryxBasePluginsGui.DbFileInput.DbFileInput"),
            "DbFileInput"
        );
        assert_eq!(Registry::normalize_type("Union"), "Union");
    }

    #[test]
    fn test_requires_input() {
        assert!(!Operation::ReadInput.requires_input());
        assert!(!Operation::Union.requires_input());
        assert!(Operation::RowFilter.requires_input());
        assert!(Operation::WriteOutput.requires_input());
    }

    #[rstest]
    #[case(TextKind::Expression, "DateTimeNow()", TAG_WALL_CLOCK)]
    #[case(TextKind::Expression, "RandInt(10) > 5", TAG_RANDOMNESS)]
    #[case(TextKind::Expression, "FileGetFileName([Path])", TAG_FILESYSTEM)]
    #[case(TextKind::Expression, r#""C:\out\" + [Region]"#, TAG_DYNAMIC_PATH)]
    #[case(TextKind::Path, r"C:\data\[Region].csv", TAG_DYNAMIC_PATH)]
    fn test_risk_tags_detected(#[case] kind: TextKind, #[case] text: &str, #[case] tag: &str) {
        let tags = Registry::global().risk_tags(kind, text);
        assert!(tags.contains(tag), "expected {tag} in {tags:?} for {text}");
    }

    #[test]
    fn test_plain_expression_has_no_risk() {
        let tags = Registry::global().risk_tags(TextKind::Expression, "[Volume] > 100000");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_bracket_field_in_expression_is_not_a_path_risk() {
        let tags = Registry::global().risk_tags(TextKind::Expression, "[Region] = \"East\"");
        assert!(!tags.contains(TAG_DYNAMIC_PATH));
    }

    #[test]
    fn test_operation_names_are_distinct() {
        let names: BTreeSet<&str> = [
            Operation::ReadInput,
            Operation::WriteOutput,
            Operation::RowFilter,
            Operation::ColumnFormula,
            Operation::EquiJoin,
            Operation::GroupAggregate,
            Operation::Union,
            Operation::ColumnSubset,
            Operation::RowSort,
        ]
        .iter()
        .map(|op| op.name())
        .collect();
        assert_eq!(names.len(), 9);
    }
}
