//! Operation-specific code generation helpers
//!
//! Each helper turns one resolved operation into Python statements for the
//! body of the generated `run(config)` function. Helpers take variable names
//! already resolved by the generator and return code indented one level.

pub mod filter;
pub mod formula;
pub mod io;
pub mod join;
pub mod select;
pub mod sort;
pub mod summarize;
pub mod union;

pub use filter::FilterCodegen;
pub use formula::FormulaCodegen;
pub use io::IoCodegen;
pub use join::{JoinCodegen, JoinSide};
pub use select::SelectCodegen;
pub use sort::SortCodegen;
pub use summarize::SummarizeCodegen;
pub use union::UnionCodegen;

/// Indentation of statements inside `run(config)`
pub const INDENT: &str = "    ";

/// Python string literal
pub fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Python list of string literals
pub fn py_list<S: AsRef<str>>(items: &[S]) -> String {
    let items: Vec<String> = items.iter().map(|s| py_str(s.as_ref())).collect();
    format!("[{}]", items.join(", "))
}

/// Python comment lines, one per line of `text`
///
/// A bare `\r` ends a line for Python too, so it splits like `\n`.
pub fn py_comment(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(|line| format!("{INDENT}# {}\n", line.trim_end()))
        .collect()
}

/// Copy of the first input, or an empty frame when there is none
pub fn passthrough(var: &str, input: Option<&str>, reason: &str) -> String {
    match input {
        Some(input) => format!("{INDENT}{var} = {input}.copy()  # {reason}\n"),
        None => format!("{INDENT}{var} = pd.DataFrame()  # {reason}\n"),
    }
}
