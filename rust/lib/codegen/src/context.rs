//! Request-scoped render contexts.
//!
//! Built fresh for every generation request from the stored metadata and
//! never persisted.

use serde::Serialize;
use tracing::warn;

use crate::metadata::{Field, Model, Project};
use crate::naming::{self, Dialect};
use crate::types::{self, HostType};

/// One field as seen by a template of a given target stack.
#[derive(Debug, Clone, Serialize)]
pub struct FieldContext {
    /// Field name in the target dialect.
    pub name: String,
    pub name_lower: String,
    /// Snake-case Rust identifier, keyword-escaped.
    pub ident: String,
    pub json_tag: String,
    /// Field type in the target dialect.
    pub ty: String,
    /// Rust type for backend struct fields.
    pub rust_type: String,
    pub is_time: bool,
    pub validation_rules: String,
    /// `#[validate(...)]` arguments derived from `validation_rules`.
    pub validate: Vec<String>,
    pub required: bool,
    pub query_criteria: String,
    pub description: String,
}

impl FieldContext {
    pub fn build(field: &Field, dialect: &dyn Dialect) -> Self {
        Self {
            name: dialect.field_name(&field.name),
            name_lower: naming::to_lower_first(&field.name),
            ident: naming::rust_ident(&field.name),
            json_tag: dialect.json_tag(&field.json_tag, &field.name),
            ty: dialect.field_type(&field.ty),
            rust_type: types::rust_type(&field.ty),
            is_time: HostType::parse(&field.ty).is_some_and(|t| t.is_time()),
            validation_rules: field.validation_rules.clone(),
            validate: validate_attrs(&field.validation_rules, HostType::parse(&field.ty)),
            required: field.required,
            query_criteria: field.query_criteria.clone(),
            description: field.description.clone(),
        }
    }
}

/// Translate comma-separated rules (`min=1,max=64,email`) into arguments
/// for `#[validate(...)]`.
///
/// `min`/`max` bound the value of numeric fields and the length of
/// everything else. A rule already written as `name(...)` passes through.
/// `required` is carried by the field's own flag and dropped here.
pub fn validate_attrs(rules: &str, ty: Option<HostType>) -> Vec<String> {
    let numeric = ty.is_some_and(|t| t.is_numeric());
    let mut attrs = Vec::new();
    for rule in split_rules(rules) {
        let (key, value) = match rule.split_once('=') {
            Some((k, v)) if !rule.contains('(') => (k.trim(), Some(v.trim())),
            _ => (rule, None),
        };
        let attr = match (key, value) {
            (_, None) if key.contains('(') => key.to_string(),
            ("required", None) => continue,
            ("email" | "url", None) => key.to_string(),
            ("min" | "max", Some(v)) if numeric => format!("range({} = {})", key, v),
            ("min" | "max", Some(v)) => format!("length({} = {})", key, v),
            ("len", Some(v)) => format!("length(equal = {})", v),
            _ => {
                warn!(rule = %rule, "unrecognized validation rule, skipped");
                continue;
            }
        };
        attrs.push(attr);
    }
    attrs
}

/// Split on commas outside parentheses.
fn split_rules(rules: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in rules.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(rules[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(rules[start..].trim());
    out.retain(|r| !r.is_empty());
    out
}

/// The model-level variables every template sees.
#[derive(Debug, Clone, Serialize)]
pub struct ModelContext {
    /// Lower-first model name; the `{m}` in path formulas.
    pub name: String,
    /// Title-cased struct name.
    pub struct_name: String,
    pub first_letter: String,
    pub description: String,
    pub project_name: String,
    /// Resolved backend root.
    pub project_path: String,
    /// Resolved web root.
    pub web_project_path: String,
    pub query_time: bool,
    /// The list endpoint takes filter parameters.
    pub has_query_criteria: bool,
    pub fields: Vec<FieldContext>,
}

impl ModelContext {
    pub fn build(
        project: &Project,
        model: &Model,
        fields: &[Field],
        dialect: &dyn Dialect,
        project_path: &str,
        web_project_path: &str,
    ) -> Self {
        let name = naming::to_lower_first(model.struct_name.trim());
        let fields: Vec<FieldContext> = fields
            .iter()
            .map(|f| FieldContext::build(f, dialect))
            .collect();
        let has_query_criteria =
            model.query_time || fields.iter().any(|f| !f.query_criteria.trim().is_empty());

        Self {
            struct_name: naming::to_title(&name),
            first_letter: name.chars().next().map(String::from).unwrap_or_default(),
            name,
            description: model.description.clone(),
            project_name: project.name.clone(),
            project_path: project_path.to_string(),
            web_project_path: web_project_path.to_string(),
            query_time: model.query_time,
            has_query_criteria,
            fields,
        }
    }
}
