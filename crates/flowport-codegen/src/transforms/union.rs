//! Union codegen

use super::INDENT;

/// Helper for generating row-wise concatenation code
pub struct UnionCodegen;

impl UnionCodegen {
    /// Concatenate `inputs` in the given order, taking the union of columns
    pub fn generate(var: &str, inputs: &[String]) -> String {
        if inputs.is_empty() {
            return format!("{INDENT}{var} = pd.DataFrame()  # union has no inputs\n");
        }
        format!(
            "{INDENT}{var} = pd.concat([{}], ignore_index=True, sort=False)\n",
            inputs.join(", ")
        )
    }
}
