//! Source and sink codegen

use super::{INDENT, py_str};

/// Helper for generating table read/write code
pub struct IoCodegen;

impl IoCodegen {
    /// Load the table configured under `inputs.<key>`
    pub fn read(var: &str, key: &str) -> String {
        format!(
            "{INDENT}{var} = read_table(config[\"inputs\"][{key}])\n",
            key = py_str(key)
        )
    }

    /// Persist `input` to the sink configured under `outputs.<key>`
    ///
    /// The written frame stays available as `var`.
    pub fn write(var: &str, input: Option<&str>, key: &str) -> String {
        match input {
            Some(input) => format!(
                "{INDENT}write_table({input}, config[\"outputs\"][{key}])\n{INDENT}{var} = {input}\n",
                key = py_str(key)
            ),
            None => format!(
                "{INDENT}{var} = pd.DataFrame()  # no input connected; nothing written to {key}\n"
            ),
        }
    }
}
