//! Equi-join codegen

use flowport_core::workflow::JoinSpec;

use super::{INDENT, passthrough, py_list, py_str};

/// Join types pandas `merge` accepts
const JOIN_TYPES: &[&str] = &["inner", "left", "right", "outer"];

/// Side of a join whose unmatched rows leave on their own output port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    /// First input
    Left,
    /// Second input
    Right,
}

impl JoinSide {
    /// Both sides, left first
    pub const ALL: [JoinSide; 2] = [JoinSide::Left, JoinSide::Right];

    /// Output port carrying this side's unjoined rows
    pub fn port(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }

    /// Side read from an output port name, if it is one of the unjoined ports
    pub fn from_port(port: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|side| port.eq_ignore_ascii_case(side.port()))
    }

    /// Variable holding this side's unjoined rows for the join bound to `var`
    pub fn var(self, var: &str) -> String {
        match self {
            Self::Left => format!("{var}_left"),
            Self::Right => format!("{var}_right"),
        }
    }
}

/// Helper for generating join code
pub struct JoinCodegen;

impl JoinCodegen {
    /// Join `left` with `right`
    ///
    /// Keys come from the join spec; with no keys the join is natural (on
    /// common columns), and with `by_position` rows are paired by position.
    pub fn generate(var: &str, left: Option<&str>, right: Option<&str>, spec: Option<&JoinSpec>) -> String {
        let (Some(left), Some(right)) = (left, right) else {
            tracing::warn!("Join {} needs two inputs; passing the first through", var);
            return passthrough(var, left, "join needs two inputs");
        };

        let default_spec = JoinSpec::default();
        let spec = spec.unwrap_or(&default_spec);

        if spec.by_position {
            return format!(
                "{INDENT}{var} = pd.concat([{left}.reset_index(drop=True), {right}.reset_index(drop=True)], axis=1)\n"
            );
        }

        let keys = match (spec.left_keys.as_slice(), spec.right_keys.as_slice()) {
            ([], []) => String::new(),
            (keys, []) | ([], keys) => format!(", on={}", py_list(keys)),
            (l, r) if l == r => format!(", on={}", py_list(l)),
            (l, r) => format!(", left_on={}, right_on={}", py_list(l), py_list(r)),
        };

        format!(
            "{INDENT}{var} = {left}.merge({right}, how={how}{keys})\n",
            how = py_str(Self::join_type(spec.join_type.as_deref()))
        )
    }

    /// Rows of one side that found no partner on the other
    ///
    /// Matching uses the same keys as [`JoinCodegen::generate`]; the join
    /// type plays no part. Positional joins leave the tail of the longer side.
    pub fn unjoined(
        var: &str,
        side: JoinSide,
        left: Option<&str>,
        right: Option<&str>,
        spec: Option<&JoinSpec>,
    ) -> String {
        let target = side.var(var);
        let (own, other) = match side {
            JoinSide::Left => (left, right),
            JoinSide::Right => (right, left),
        };
        let Some(own) = own else {
            return passthrough(&target, None, "join has no input on this side");
        };
        let Some(other) = other else {
            return passthrough(&target, Some(own), "join has one input; no row is matched");
        };

        let default_spec = JoinSpec::default();
        let spec = spec.unwrap_or(&default_spec);

        if spec.by_position {
            return format!("{INDENT}{target} = {own}.iloc[len({other}):]\n");
        }

        let (left_keys, right_keys) = (spec.left_keys.as_slice(), spec.right_keys.as_slice());
        let keys = match (left_keys, right_keys) {
            ([], []) => String::new(),
            (keys, []) | ([], keys) => format!(", {}", py_list(keys)),
            (l, r) if l == r => format!(", {}", py_list(l)),
            (l, r) => match side {
                JoinSide::Left => format!(", {}, {}", py_list(l), py_list(r)),
                JoinSide::Right => format!(", {}, {}", py_list(r), py_list(l)),
            },
        };

        format!("{INDENT}{target} = unjoined({own}, {other}{keys})\n")
    }

    /// Normalize a join type tag; unknown tags fall back to `inner`
    pub fn join_type(tag: Option<&str>) -> &'static str {
        let Some(tag) = tag.map(|t| t.trim().to_ascii_lowercase()) else {
            return "inner";
        };
        let tag = match tag.as_str() {
            "full" | "full outer" => "outer",
            other => other,
        };
        match JOIN_TYPES.iter().find(|t| **t == tag) {
            Some(t) => *t,
            None => {
                tracing::warn!("Unknown join type '{}'; using inner", tag);
                "inner"
            }
        }
    }
}
