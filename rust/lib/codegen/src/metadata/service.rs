use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use stencil_core::{merge_patch, new_id, now_rfc3339, ServiceError};
use tracing::{info, warn};

use super::model::{
    CreateField, CreateModel, CreateProject, Field, Model, ModelTree, Project, ProjectTree,
};
use super::store::MetadataStore;
use crate::naming;

/// CRUD over the metadata tree with validation and timestamps.
///
/// Deleting a project or model does not cascade; orphaned children stay
/// in the store and are skipped by read paths.
pub struct MetadataService {
    store: Arc<dyn MetadataStore>,
}

impl MetadataService {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    // ── Projects ────────────────────────────────────────────────────

    pub fn create_project(&self, input: CreateProject) -> Result<Project, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::Validation("project name cannot be empty".into()));
        }
        let now = now_rfc3339();
        let project = Project {
            id: new_id(),
            name: input.name,
            description: input.description,
            path: input.path,
            web_path: input.web_path,
            initialized: false,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.put_project(&project)?;
        info!(id = %project.id, name = %project.name, "created project");
        Ok(project)
    }

    pub fn update_project(
        &self,
        id: &str,
        patch: serde_json::Value,
    ) -> Result<Project, ServiceError> {
        let current = self.store.get_project(id)?;
        let updated: Project = apply_patch(&current, &patch, &current.id, &current.created_at)?;
        if updated.name.trim().is_empty() {
            return Err(ServiceError::Validation("project name cannot be empty".into()));
        }
        self.store.put_project(&updated)?;
        info!(id = %id, "updated project");
        Ok(updated)
    }

    pub fn delete_project(&self, id: &str) -> Result<(), ServiceError> {
        self.store.get_project(id)?;
        self.store.delete_project(id)?;
        info!(id = %id, "deleted project");
        Ok(())
    }

    pub fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        self.store.list_projects()
    }

    /// Every project with its models and their fields.
    pub fn project_tree(&self) -> Result<Vec<ProjectTree>, ServiceError> {
        let projects = self.store.list_projects()?;

        let known: HashSet<&str> = projects.iter().map(|p| p.id.as_str()).collect();
        let orphans = self
            .store
            .list_all_models()?
            .iter()
            .filter(|m| !known.contains(m.project_id.as_str()))
            .count();
        if orphans > 0 {
            warn!(orphans, "models reference missing projects; skipped");
        }

        let mut tree = Vec::with_capacity(projects.len());
        for project in projects {
            let mut models = Vec::new();
            for model in self.store.list_models(&project.id)? {
                let fields = self.store.list_fields(&model.id)?;
                models.push(ModelTree { model, fields });
            }
            tree.push(ProjectTree { project, models });
        }
        Ok(tree)
    }

    // ── Models ──────────────────────────────────────────────────────

    pub fn create_model(&self, input: CreateModel) -> Result<Model, ServiceError> {
        validate_struct_name(&input.struct_name)?;
        self.ensure_parent(
            || self.store.get_project(&input.project_id),
            "project",
            &input.project_id,
        )?;

        let now = now_rfc3339();
        let model = Model {
            id: new_id(),
            project_id: input.project_id,
            struct_name: input.struct_name,
            description: input.description,
            storage: input.storage,
            query_time: input.query_time,
            initialized: false,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.put_model(&model)?;
        info!(id = %model.id, struct_name = %model.struct_name, "created model");
        Ok(model)
    }

    pub fn update_model(&self, id: &str, patch: serde_json::Value) -> Result<Model, ServiceError> {
        let current = self.store.get_model(id)?;
        let mut updated: Model = apply_patch(&current, &patch, &current.id, &current.created_at)?;
        validate_struct_name(&updated.struct_name)?;
        // Re-parenting is not supported through a patch.
        updated.project_id = current.project_id;
        self.store.put_model(&updated)?;
        info!(id = %id, "updated model");
        Ok(updated)
    }

    pub fn delete_model(&self, id: &str) -> Result<(), ServiceError> {
        self.store.get_model(id)?;
        self.store.delete_model(id)?;
        info!(id = %id, "deleted model");
        Ok(())
    }

    pub fn list_models(&self, project_id: &str) -> Result<Vec<Model>, ServiceError> {
        self.store.list_models(project_id)
    }

    // ── Fields ──────────────────────────────────────────────────────

    pub fn create_field(&self, input: CreateField) -> Result<Field, ServiceError> {
        validate_field_name(&input.name)?;
        self.ensure_parent(|| self.store.get_model(&input.model_id), "model", &input.model_id)?;

        let now = now_rfc3339();
        let field = Field {
            id: new_id(),
            model_id: input.model_id,
            name: input.name,
            ty: input.ty,
            json_tag: input.json_tag,
            description: input.description,
            validation_rules: input.validation_rules,
            required: input.required,
            query_criteria: input.query_criteria,
            created_at: now.clone(),
            updated_at: now,
        };
        self.store.put_field(&field)?;
        info!(id = %field.id, name = %field.name, "created field");
        Ok(field)
    }

    pub fn update_field(&self, id: &str, patch: serde_json::Value) -> Result<Field, ServiceError> {
        let current = self.store.get_field(id)?;
        let mut updated: Field = apply_patch(&current, &patch, &current.id, &current.created_at)?;
        validate_field_name(&updated.name)?;
        updated.model_id = current.model_id;
        self.store.put_field(&updated)?;
        info!(id = %id, "updated field");
        Ok(updated)
    }

    pub fn delete_field(&self, id: &str) -> Result<(), ServiceError> {
        self.store.get_field(id)?;
        self.store.delete_field(id)?;
        info!(id = %id, "deleted field");
        Ok(())
    }

    pub fn list_fields(&self, model_id: &str) -> Result<Vec<Field>, ServiceError> {
        self.store.list_fields(model_id)
    }

    /// Turn a missing parent into a validation error: the caller sent a
    /// dangling id, the store itself is fine.
    fn ensure_parent<T>(
        &self,
        lookup: impl FnOnce() -> Result<T, ServiceError>,
        what: &str,
        id: &str,
    ) -> Result<(), ServiceError> {
        match lookup() {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Err(ServiceError::Validation(format!(
                "{} '{}' does not exist",
                what, id
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Merge-patch a record, keeping its identity and creation time and
/// bumping `updated_at`.
fn apply_patch<T: Serialize + DeserializeOwned>(
    current: &T,
    patch: &serde_json::Value,
    id: &str,
    created_at: &str,
) -> Result<T, ServiceError> {
    let mut base =
        serde_json::to_value(current).map_err(|e| ServiceError::Internal(e.to_string()))?;
    merge_patch(&mut base, patch);
    base["id"] = serde_json::json!(id);
    base["created_at"] = serde_json::json!(created_at);
    base["updated_at"] = serde_json::json!(now_rfc3339());
    serde_json::from_value(base)
        .map_err(|e| ServiceError::Validation(format!("invalid patch: {}", e)))
}

/// Names must start with a letter or `_` and contain only ASCII
/// alphanumerics and `_`, so every target language accepts them.
fn validate_identifier(what: &str, name: &str) -> Result<(), ServiceError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "{} '{}' is not a valid identifier",
            what, name
        )))
    }
}

/// The lower-first struct name becomes a module and directory name in
/// every generated tree, so it must not be a keyword.
fn validate_struct_name(name: &str) -> Result<(), ServiceError> {
    validate_identifier("struct name", name)?;
    let module = naming::to_lower_first(name);
    if !naming::is_module_name(&module) {
        return Err(ServiceError::Validation(format!(
            "struct name '{}' is a reserved word as module '{}'",
            name, module
        )));
    }
    Ok(())
}

fn validate_field_name(name: &str) -> Result<(), ServiceError> {
    validate_identifier("field name", name)?;
    if naming::is_unescapable(&naming::to_snake_case(name)) {
        return Err(ServiceError::Validation(format!(
            "field name '{}' is a reserved word",
            name
        )));
    }
    Ok(())
}
