use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persistence technology a model targets.
///
/// Closed set. Only `Relational` has registered templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Relational,
    Document,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Relational => "relational",
            StorageBackend::Document => "document",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    /// Accepts the backend kind or a common database name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relational" | "mysql" | "sql" | "postgres" | "sqlite" => {
                Ok(StorageBackend::Relational)
            }
            "document" | "mongo" | "mongodb" => Ok(StorageBackend::Document),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// A generation target: owns models and the output roots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Backend source root. Empty means "generate into the scratch dir".
    #[serde(default)]
    pub path: String,
    /// Web source root. Empty means "generate into the scratch dir".
    #[serde(default)]
    pub web_path: String,
    #[serde(default)]
    pub initialized: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One generated entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub project_id: String,
    /// Struct name as typed by the user; normalized at generation time.
    pub struct_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub storage: Option<StorageBackend>,
    /// Generated list endpoints accept a created-at time range.
    #[serde(default)]
    pub query_time: bool,
    #[serde(default)]
    pub initialized: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One attribute of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub model_id: String,
    pub name: String,
    /// Host storage-layer type token (`int64`, `string`, `time.Time`, ...).
    #[serde(default)]
    pub ty: String,
    #[serde(default)]
    pub json_tag: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub validation_rules: String,
    #[serde(default)]
    pub required: bool,
    /// Non-empty marks the field filterable in list endpoints (`=`, `like`, ...).
    #[serde(default)]
    pub query_criteria: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub web_path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateModel {
    pub project_id: String,
    pub struct_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub storage: Option<StorageBackend>,
    #[serde(default)]
    pub query_time: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateField {
    pub model_id: String,
    pub name: String,
    #[serde(default)]
    pub ty: String,
    #[serde(default)]
    pub json_tag: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub validation_rules: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub query_criteria: String,
}

/// A project with its models and their fields, as shown in the admin tree.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectTree {
    #[serde(flatten)]
    pub project: Project,
    pub models: Vec<ModelTree>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelTree {
    #[serde(flatten)]
    pub model: Model,
    pub fields: Vec<Field>,
}
