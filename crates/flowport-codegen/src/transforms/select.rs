//! Column subset codegen

use flowport_core::workflow::SelectedField;

use super::{INDENT, passthrough, py_list, py_str};

/// Helper for generating column projection code
pub struct SelectCodegen;

impl SelectCodegen {
    /// Project `input` onto the kept fields in declared order, then rename
    ///
    /// `None` means no field list could be extracted; the input is passed
    /// through unchanged.
    pub fn generate(var: &str, input: &str, fields: Option<&[SelectedField]>) -> String {
        let Some(fields) = fields else {
            tracing::warn!("No field list for {}; passing input through", var);
            return passthrough(var, Some(input), "WARNING: no field list found; columns unchanged");
        };

        let names: Vec<&str> = fields.iter().map(|f| f.field.as_str()).collect();
        let mut code = format!("{INDENT}{var} = {input}[{}]", py_list(&names));

        let renames: Vec<String> = fields
            .iter()
            .filter_map(|f| {
                f.rename
                    .as_deref()
                    .map(|to| format!("{}: {}", py_str(&f.field), py_str(to)))
            })
            .collect();
        if renames.is_empty() {
            code.push_str(".copy()");
        } else {
            code.push_str(&format!(".rename(columns={{{}}})", renames.join(", ")));
        }

        code.push('\n');
        code
    }
}
