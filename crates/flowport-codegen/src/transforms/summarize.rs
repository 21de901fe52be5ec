//! Group-aggregate codegen

use flowport_core::workflow::Aggregation;

use super::{INDENT, py_list, py_str};

/// Dummy key used to aggregate a whole table as one group
const ALL_ROWS_KEY: &str = "_all";

/// Helper for generating group-by/aggregate code
pub struct SummarizeCodegen;

impl SummarizeCodegen {
    /// Group `input` by `group_by` and compute each aggregation
    ///
    /// Output columns are named after the declared output name, falling back
    /// to the source field. An empty `group_by` aggregates the whole table.
    pub fn generate(var: &str, input: &str, group_by: &[String], aggregations: &[Aggregation]) -> String {
        if aggregations.is_empty() {
            if group_by.is_empty() {
                return format!("{INDENT}{var} = {input}.copy()  # nothing to aggregate\n");
            }
            return format!(
                "{INDENT}{var} = {input}[{keys}].drop_duplicates().reset_index(drop=True)\n",
                keys = py_list(group_by)
            );
        }

        let mut named = String::new();
        for agg in aggregations {
            named.push_str(&format!(
                "{INDENT}{INDENT}{output}: ({field}, {function}),\n",
                output = py_str(agg.output_name()),
                field = py_str(&agg.field),
                function = py_str(&Self::function(&agg.function)),
            ));
        }

        if group_by.is_empty() {
            let key = py_str(ALL_ROWS_KEY);
            format!(
                "{INDENT}{var} = {input}.assign(**{{{key}: 0}}).groupby({key}, as_index=False, sort=False).agg(**{{\n{named}{INDENT}}}).drop(columns={key})\n"
            )
        } else {
            format!(
                "{INDENT}{var} = {input}.groupby({keys}, as_index=False, sort=False).agg(**{{\n{named}{INDENT}}})\n",
                keys = py_list(group_by)
            )
        }
    }

    /// Map an aggregation name to its pandas equivalent
    ///
    /// Unknown names are passed through as written.
    pub fn function(name: &str) -> String {
        match name.trim().to_ascii_lowercase().as_str() {
            "sum" => "sum".to_string(),
            "avg" | "average" | "mean" => "mean".to_string(),
            "count" => "size".to_string(),
            "countnonnull" => "count".to_string(),
            "countdistinct" => "nunique".to_string(),
            "min" => "min".to_string(),
            "max" => "max".to_string(),
            "first" => "first".to_string(),
            "last" => "last".to_string(),
            _ => {
                tracing::warn!("Unknown aggregation '{}' passed through", name);
                name.to_string()
            }
        }
    }
}
