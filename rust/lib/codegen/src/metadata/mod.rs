//! Project → Model → Field metadata: records, storage, and the CRUD service.

pub mod model;
pub mod service;
pub mod store;

pub use model::{
    CreateField, CreateModel, CreateProject, Field, Model, ModelTree, Project, ProjectTree,
    StorageBackend,
};
pub use service::MetadataService;
pub use store::{KvMetadataStore, MetadataStore};
