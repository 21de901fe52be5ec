//! Versioned field-list extraction
//!
//! Column-subset and row-sort tools have been serialized in more than one
//! shape over the life of the document format. Each shape is a separate,
//! separately tested reader; [`extract_selected_fields`] and
//! [`extract_sort_keys`] try them newest-last in a fixed order and report
//! which one matched.
//!
//! Nothing here knows about the DAG or code generation.

use crate::parser::xml::Element;
use crate::workflow::{SelectedField, SortDirection, SortKey};

/// Which serialized shape a field list was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldListFormat {
    /// `SelectFields/SelectField@field` and `SortInfo/Field@field`
    V1,
    /// `Fields/Field@name` and `SortFields/SortField@name`
    V2,
}

/// Wildcard entry standing for "fields not known at design time"
const UNKNOWN_FIELDS: &str = "*Unknown";

/// Read the kept-field list from a tool configuration
pub fn extract_selected_fields(config: &Element) -> Option<(FieldListFormat, Vec<SelectedField>)> {
    select_v1(config)
        .map(|f| (FieldListFormat::V1, f))
        .or_else(|| select_v2(config).map(|f| (FieldListFormat::V2, f)))
}

/// Read the sort specification from a tool configuration
pub fn extract_sort_keys(config: &Element) -> Option<(FieldListFormat, Vec<SortKey>)> {
    sort_v1(config)
        .map(|k| (FieldListFormat::V1, k))
        .or_else(|| sort_v2(config).map(|k| (FieldListFormat::V2, k)))
}

/// `<SelectFields><SelectField field="A" selected="True" rename="B"/></SelectFields>`
pub fn select_v1(config: &Element) -> Option<Vec<SelectedField>> {
    let section = config.child("SelectFields")?;
    let fields = section
        .children_named("SelectField")
        .filter(|f| is_selected(f.attr("selected")))
        .filter_map(|f| {
            let field = f.attr("field")?.trim();
            if field.is_empty() || field == UNKNOWN_FIELDS {
                return None;
            }
            Some(SelectedField {
                field: field.to_string(),
                rename: non_empty(f.attr("rename")).filter(|r| *r != field).map(str::to_string),
            })
        })
        .collect();
    Some(fields)
}

/// `<Fields><Field name="A" selected="true"/></Fields>`
pub fn select_v2(config: &Element) -> Option<Vec<SelectedField>> {
    let section = config.child("Fields")?;
    let fields = section
        .children_named("Field")
        .filter(|f| is_selected(f.attr("selected")))
        .filter_map(|f| {
            let field = non_empty(f.attr("name"))?;
            Some(SelectedField {
                field: field.to_string(),
                rename: non_empty(f.attr("rename")).filter(|r| *r != field).map(str::to_string),
            })
        })
        .collect();
    Some(fields)
}

/// `<SortInfo><Field field="A" order="Descending"/></SortInfo>`
pub fn sort_v1(config: &Element) -> Option<Vec<SortKey>> {
    let section = config.child("SortInfo")?;
    let keys = section
        .children_named("Field")
        .filter_map(|f| {
            Some(SortKey {
                field: non_empty(f.attr("field"))?.to_string(),
                direction: parse_direction(f.attr("order")),
            })
        })
        .collect();
    Some(keys)
}

/// `<SortFields><SortField name="A" direction="desc"/></SortFields>`
pub fn sort_v2(config: &Element) -> Option<Vec<SortKey>> {
    let section = config.child("SortFields")?;
    let keys = section
        .children_named("SortField")
        .filter_map(|f| {
            Some(SortKey {
                field: non_empty(f.attr("name"))?.to_string(),
                direction: parse_direction(f.attr("direction")),
            })
        })
        .collect();
    Some(keys)
}

fn is_selected(value: Option<&str>) -> bool {
    // A field without the flag is kept
    value.is_none_or(|v| !v.trim().eq_ignore_ascii_case("false"))
}

fn parse_direction(value: Option<&str>) -> SortDirection {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "descending" || v == "desc" => SortDirection::Descending,
        _ => SortDirection::Ascending,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
