//! Column formula codegen

use flowport_core::workflow::FormulaAssignment;

use super::{INDENT, py_str};
use crate::expr;

/// Helper for generating column formula code
pub struct FormulaCodegen;

impl FormulaCodegen {
    /// Apply each assignment in order on a copy of `input`
    ///
    /// Assignments are evaluated against the frame being built, so later
    /// formulas see the columns produced by earlier ones.
    pub fn generate(var: &str, input: &str, formulas: &[FormulaAssignment]) -> String {
        let mut code = format!("{INDENT}{var} = {input}.copy()\n");

        for formula in formulas {
            code.push_str(&Self::generate_single(var, formula));
        }

        code
    }

    /// Generate code for a single assignment
    pub fn generate_single(var: &str, formula: &FormulaAssignment) -> String {
        let translated = expr::translate(&formula.expression);
        if translated.is_empty() {
            return format!(
                "{INDENT}{var}[{field}] = np.nan  # empty expression\n",
                field = py_str(&formula.field)
            );
        }
        format!(
            "{INDENT}{var}[{field}] = evaluate({var}, {expr}, params)\n",
            field = py_str(&formula.field),
            expr = py_str(&translated)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(field: &str, expression: &str) -> FormulaAssignment {
        FormulaAssignment {
            field: field.to_string(),
            expression: expression.to_string(),
        }
    }

    #[test]
    fn test_simple_formula() {
        let code = FormulaCodegen::generate_single("df_3", &assignment("Total", "[Price] * [Qty]"));
        assert_eq!(code, "    df_3[\"Total\"] = evaluate(df_3, \"Price * Qty\", params)\n");
    }

    #[test]
    fn test_formulas_layer_in_order() {
        let code = FormulaCodegen::generate(
            "df_3",
            "df_2",
            &[
                assignment("Total", "[Price] * [Qty]"),
                assignment("Band", "IIF([Total] > 100, \"high\", \"low\")"),
            ],
        );
        let lines: Vec<&str> = code.lines().collect();
        assert_eq!(lines[0], "    df_3 = df_2.copy()");
        assert!(lines[1].contains("[\"Total\"]"));
        assert!(lines[2].contains("np.where(Total > 100, \\\"high\\\", \\\"low\\\")"));
    }

    #[test]
    fn test_output_field_keeps_original_name() {
        let code = FormulaCodegen::generate_single("df_3", &assignment("Unit Cost", "[Cost] / [Qty]"));
        assert!(code.starts_with("    df_3[\"Unit Cost\"]"));
    }

    #[test]
    fn test_empty_expression() {
        let code = FormulaCodegen::generate_single("df_3", &assignment("X", "  "));
        assert!(code.contains("np.nan"));
    }
}
