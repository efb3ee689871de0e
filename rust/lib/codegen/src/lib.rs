//! Stencil code generation engine.
//!
//! Turns a Project → Model → Field metadata tree into backend, web and
//! mobile sources, then registers each model's query-builder bootstrap in
//! the project's `cmd/gen/build.rs`.

pub mod context;
pub mod emit;
pub mod error;
pub mod format;
pub mod generator;
pub mod inject;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod registry;
pub mod types;

pub use emit::{Emitted, OverwritePolicy};
pub use error::GenError;
pub use format::{NoFormat, Rustfmt, SourceFormatter};
pub use generator::{GeneratedArtifact, GeneratedFile, GenerationReport, Generator, ViewCode};
pub use inject::{BuildCall, EntryLocks};
pub use metadata::{
    CreateField, CreateModel, CreateProject, Field, KvMetadataStore, MetadataService, MetadataStore,
    Model, Project, StorageBackend,
};
pub use registry::{ArtifactKind, TemplateRegistry};
