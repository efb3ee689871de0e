//! MetadataStore trait + KV-backed implementation.
//!
//! Records are JSON values under `codegen/{projects,models,fields}/{id}`.
//! Child lookups scan the whole prefix and filter by parent id; metadata
//! trees are small enough that the full scan is not a concern.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use stencil_core::ServiceError;
use stencil_kv::{KVError, KVStore};

use super::model::{Field, Model, Project};

const PROJECT_PREFIX: &str = "codegen/projects/";
const MODEL_PREFIX: &str = "codegen/models/";
const FIELD_PREFIX: &str = "codegen/fields/";

/// Read/write accessors over the Project → Model → Field tree.
///
/// `get_*` return `ServiceError::NotFound` for absent rows. `list_*` return
/// children in creation order.
pub trait MetadataStore: Send + Sync {
    fn get_project(&self, id: &str) -> Result<Project, ServiceError>;
    fn get_model(&self, id: &str) -> Result<Model, ServiceError>;
    fn get_field(&self, id: &str) -> Result<Field, ServiceError>;

    fn list_projects(&self) -> Result<Vec<Project>, ServiceError>;
    fn list_models(&self, project_id: &str) -> Result<Vec<Model>, ServiceError>;
    fn list_fields(&self, model_id: &str) -> Result<Vec<Field>, ServiceError>;

    /// All models regardless of owner, used to detect orphans.
    fn list_all_models(&self) -> Result<Vec<Model>, ServiceError>;

    fn put_project(&self, project: &Project) -> Result<(), ServiceError>;
    fn put_model(&self, model: &Model) -> Result<(), ServiceError>;
    fn put_field(&self, field: &Field) -> Result<(), ServiceError>;

    fn delete_project(&self, id: &str) -> Result<(), ServiceError>;
    fn delete_model(&self, id: &str) -> Result<(), ServiceError>;
    fn delete_field(&self, id: &str) -> Result<(), ServiceError>;
}

/// MetadataStore persisting records in any [`KVStore`].
pub struct KvMetadataStore {
    kv: Arc<dyn KVStore>,
}

impl KvMetadataStore {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    fn kv_err(e: KVError) -> ServiceError {
        ServiceError::Storage(e.to_string())
    }

    fn get_record<T: DeserializeOwned>(
        &self,
        prefix: &str,
        what: &str,
        id: &str,
    ) -> Result<T, ServiceError> {
        if id.is_empty() {
            return Err(ServiceError::NotFound(format!("{} id is empty", what)));
        }
        let key = format!("{}{}", prefix, id);
        match self.kv.get(&key).map_err(Self::kv_err)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", key, e))),
            None => Err(ServiceError::NotFound(format!("{} '{}' not found", what, id))),
        }
    }

    fn scan_records<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, ServiceError> {
        let entries = self.kv.scan(prefix).map_err(Self::kv_err)?;
        let mut records = Vec::with_capacity(entries.len());
        for (key, bytes) in entries {
            let record: T = serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::Internal(format!("deserialize {}: {}", key, e)))?;
            records.push(record);
        }
        Ok(records)
    }

    fn put_record<T: Serialize>(
        &self,
        prefix: &str,
        id: &str,
        record: &T,
    ) -> Result<(), ServiceError> {
        let bytes = serde_json::to_vec(record)
            .map_err(|e| ServiceError::Internal(format!("serialize: {}", e)))?;
        self.kv
            .set(&format!("{}{}", prefix, id), &bytes)
            .map_err(Self::kv_err)
    }

    fn delete_record(&self, prefix: &str, id: &str) -> Result<(), ServiceError> {
        self.kv
            .delete(&format!("{}{}", prefix, id))
            .map_err(Self::kv_err)
    }
}

impl MetadataStore for KvMetadataStore {
    fn get_project(&self, id: &str) -> Result<Project, ServiceError> {
        self.get_record(PROJECT_PREFIX, "project", id)
    }

    fn get_model(&self, id: &str) -> Result<Model, ServiceError> {
        self.get_record(MODEL_PREFIX, "model", id)
    }

    fn get_field(&self, id: &str) -> Result<Field, ServiceError> {
        self.get_record(FIELD_PREFIX, "field", id)
    }

    fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        let mut projects: Vec<Project> = self.scan_records(PROJECT_PREFIX)?;
        projects.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        Ok(projects)
    }

    fn list_models(&self, project_id: &str) -> Result<Vec<Model>, ServiceError> {
        let mut models: Vec<Model> = self
            .list_all_models()?
            .into_iter()
            .filter(|m| m.project_id == project_id)
            .collect();
        models.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        Ok(models)
    }

    fn list_fields(&self, model_id: &str) -> Result<Vec<Field>, ServiceError> {
        let mut fields: Vec<Field> = self
            .scan_records::<Field>(FIELD_PREFIX)?
            .into_iter()
            .filter(|f| f.model_id == model_id)
            .collect();
        fields.sort_by(|a, b| (&a.created_at, &a.id).cmp(&(&b.created_at, &b.id)));
        Ok(fields)
    }

    fn list_all_models(&self) -> Result<Vec<Model>, ServiceError> {
        self.scan_records(MODEL_PREFIX)
    }

    fn put_project(&self, project: &Project) -> Result<(), ServiceError> {
        self.put_record(PROJECT_PREFIX, &project.id, project)
    }

    fn put_model(&self, model: &Model) -> Result<(), ServiceError> {
        self.put_record(MODEL_PREFIX, &model.id, model)
    }

    fn put_field(&self, field: &Field) -> Result<(), ServiceError> {
        self.put_record(FIELD_PREFIX, &field.id, field)
    }

    fn delete_project(&self, id: &str) -> Result<(), ServiceError> {
        self.delete_record(PROJECT_PREFIX, id)
    }

    fn delete_model(&self, id: &str) -> Result<(), ServiceError> {
        self.delete_record(MODEL_PREFIX, id)
    }

    fn delete_field(&self, id: &str) -> Result<(), ServiceError> {
        self.delete_record(FIELD_PREFIX, id)
    }
}
