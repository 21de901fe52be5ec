//! Row filter codegen

use super::{INDENT, py_str};
use crate::externalize::Predicate;

/// Helper for generating row filter code
pub struct FilterCodegen;

impl FilterCodegen {
    /// Keep the rows of `input` where the predicate holds
    ///
    /// With `emit_false` the complement is bound to `<var>_false` for
    /// consumers of the filter's `False` port. Without a predicate every row
    /// is kept.
    pub fn generate(var: &str, input: &str, predicate: Option<&Predicate>, emit_false: bool) -> String {
        let mut code = String::new();

        match predicate {
            Some(predicate) => {
                code.push_str(&format!("{INDENT}# predicate: {}\n", one_line(&predicate.original)));
                code.push_str(&format!(
                    "{INDENT}mask_{var} = evaluate({input}, {expr}, params)\n",
                    expr = py_str(&predicate.code)
                ));
                code.push_str(&format!("{INDENT}{var} = {input}[mask_{var}]\n"));
                if emit_false {
                    code.push_str(&format!("{INDENT}{var}_false = {input}[~mask_{var}]\n"));
                }
            }
            None => {
                code.push_str(&format!("{INDENT}{var} = {input}.copy()  # no predicate; all rows kept\n"));
                if emit_false {
                    code.push_str(&format!("{INDENT}{var}_false = {input}.iloc[0:0]\n"));
                }
            }
        }

        code
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
