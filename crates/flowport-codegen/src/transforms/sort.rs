//! Row sort codegen

use flowport_core::workflow::{SortDirection, SortKey};

use super::{INDENT, passthrough, py_list};

/// Helper for generating stable sort code
pub struct SortCodegen;

impl SortCodegen {
    /// Sort `input` by the keys in priority order
    ///
    /// `None` means no sort specification could be extracted; the input is
    /// passed through unchanged.
    pub fn generate(var: &str, input: &str, keys: Option<&[SortKey]>) -> String {
        let Some(keys) = keys else {
            tracing::warn!("No sort specification for {}; passing input through", var);
            return passthrough(var, Some(input), "WARNING: no sort specification found; order unchanged");
        };
        if keys.is_empty() {
            return passthrough(var, Some(input), "no sort keys");
        }

        let fields: Vec<&str> = keys.iter().map(|k| k.field.as_str()).collect();
        let ascending: Vec<&str> = keys
            .iter()
            .map(|k| match k.direction {
                SortDirection::Ascending => "True",
                SortDirection::Descending => "False",
            })
            .collect();

        format!(
            "{INDENT}{var} = {input}.sort_values(by={by}, ascending=[{ascending}], kind=\"mergesort\")\n",
            by = py_list(&fields),
            ascending = ascending.join(", ")
        )
    }
}
