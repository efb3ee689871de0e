//! Generation orchestrator.
//!
//! `generate_code` writes every artifact of a model into the project's
//! roots; `preview_code` does the same into the scratch directory and
//! returns what it wrote.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use stencil_core::GeneratorConfig;
use tracing::{info, warn};

use crate::context::ModelContext;
use crate::emit::{EmitRequest, Emitted, Emitter, OverwritePolicy};
use crate::error::GenError;
use crate::format::{NoFormat, Rustfmt, SourceFormatter};
use crate::inject::{BuildCall, EntryLocks, Injector};
use crate::manifest::HashManifest;
use crate::metadata::{Field, MetadataStore, Model, Project, StorageBackend};
use crate::naming::{self, BackendDialect, MobileDialect, WebDialect};
use crate::registry::{ArtifactKind, TargetStack, TemplateEntry, TemplateRegistry};

/// Accumulator file, relative to the backend root.
pub const ENTRY_FILE: &str = "cmd/gen/build.rs";

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedArtifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub model: String,
    pub policy: String,
    pub files: Vec<GeneratedArtifact>,
    /// Rewritten entry file; `None` when the backend has no bootstrap step.
    pub entry_file: Option<PathBuf>,
    /// The bootstrap call for this model was already in the entry file.
    pub duplicate_bootstrap: bool,
}

/// One previewed file.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedFile {
    /// Artifact kind, or `build_entry` for the accumulator file.
    pub kind: String,
    pub path: PathBuf,
    pub content: String,
}

/// Everything a preview wrote, in generation order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewCode {
    pub model: String,
    pub files: Vec<GeneratedFile>,
}

impl ViewCode {
    pub fn get(&self, kind: &str) -> Option<&GeneratedFile> {
        self.files.iter().find(|f| f.kind == kind)
    }
}

struct Loaded {
    project: Project,
    model: Model,
    fields: Vec<Field>,
}

struct Roots {
    backend: PathBuf,
    web: PathBuf,
}

impl Roots {
    fn for_stack(&self, stack: TargetStack) -> &Path {
        if stack.uses_web_root() {
            &self.web
        } else {
            &self.backend
        }
    }
}

/// Empty means the scratch directory; a trailing `/` is ignored.
pub fn resolve_root(path: &str, scratch: &Path) -> PathBuf {
    let path = path.trim();
    if path.is_empty() {
        return scratch.to_path_buf();
    }
    match path.trim_end_matches('/') {
        "" => PathBuf::from("/"),
        trimmed => PathBuf::from(trimmed),
    }
}

pub struct Generator {
    store: Arc<dyn MetadataStore>,
    registry: TemplateRegistry,
    formatter: Box<dyn SourceFormatter>,
    locks: Arc<EntryLocks>,
    manifest: Option<HashManifest>,
    config: GeneratorConfig,
}

impl Generator {
    /// Built-in templates, `rustfmt` unless disabled, and the hash manifest
    /// when tracked regeneration is on.
    pub fn new(store: Arc<dyn MetadataStore>, config: GeneratorConfig) -> Result<Self, GenError> {
        let formatter: Box<dyn SourceFormatter> = if config.format {
            Box::new(Rustfmt)
        } else {
            Box::new(NoFormat)
        };
        let manifest = if config.tracked_regeneration {
            Some(HashManifest::load(config.resolve_manifest_path())?)
        } else {
            None
        };
        Ok(Self {
            store,
            registry: TemplateRegistry::builtin(),
            formatter,
            locks: Arc::new(EntryLocks::new()),
            manifest,
            config,
        })
    }

    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_formatter(mut self, formatter: Box<dyn SourceFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Share entry-file locks with other generators writing the same trees.
    pub fn with_entry_locks(mut self, locks: Arc<EntryLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate every artifact of `model_id` into the project's roots.
    ///
    /// Stops at the first failure; files written before it stay on disk.
    pub fn generate_code(&self, model_id: &str, force: bool) -> Result<GenerationReport, GenError> {
        let loaded = self.load(model_id)?;
        let scratch = &self.config.scratch_dir;
        let roots = Roots {
            backend: resolve_root(&loaded.project.path, scratch),
            web: resolve_root(&loaded.project.web_path, scratch),
        };

        let policy = if force || self.config.is_debug() {
            OverwritePolicy::Force
        } else if self.config.tracked_regeneration {
            OverwritePolicy::Tracked
        } else {
            OverwritePolicy::Protect
        };

        let report = self.run(&loaded, &roots, policy, self.manifest.as_ref())?;
        info!(
            model = %report.model,
            files = report.files.len(),
            policy = %report.policy,
            "generated code"
        );
        Ok(report)
    }

    /// Render every artifact of `model_id` into the scratch directory and
    /// read the results back.
    pub fn preview_code(&self, model_id: &str) -> Result<ViewCode, GenError> {
        let loaded = self.load(model_id)?;
        let scratch = self.config.scratch_dir.clone();
        let roots = Roots {
            backend: scratch.clone(),
            web: scratch,
        };

        let report = self.run(&loaded, &roots, OverwritePolicy::Force, None)?;

        let mut files = Vec::with_capacity(report.files.len() + 1);
        for artifact in &report.files {
            files.push(GeneratedFile {
                kind: artifact.kind.to_string(),
                content: read(&artifact.path)?,
                path: artifact.path.clone(),
            });
        }
        if let Some(entry) = &report.entry_file {
            files.push(GeneratedFile {
                kind: "build_entry".to_string(),
                content: read(entry)?,
                path: entry.clone(),
            });
        }
        Ok(ViewCode {
            model: report.model,
            files,
        })
    }

    fn load(&self, model_id: &str) -> Result<Loaded, GenError> {
        if model_id.trim().is_empty() {
            return Err(GenError::NotFound("model id is empty".into()));
        }
        let model = self.store.get_model(model_id)?;
        let project = self.store.get_project(&model.project_id).map_err(|e| {
            if e.is_not_found() {
                GenError::NotFound(format!(
                    "project '{}' of model '{}' not found",
                    model.project_id, model.id
                ))
            } else {
                e.into()
            }
        })?;
        let fields = self.store.list_fields(&model.id)?;
        Ok(Loaded {
            project,
            model,
            fields,
        })
    }

    fn run(
        &self,
        loaded: &Loaded,
        roots: &Roots,
        policy: OverwritePolicy,
        manifest: Option<&HashManifest>,
    ) -> Result<GenerationReport, GenError> {
        let storage = self.registry.check_backend(loaded.model.storage)?;
        let model_name = naming::to_lower_first(loaded.model.struct_name.trim());
        if !naming::is_module_name(&model_name) {
            return Err(GenError::InvalidModelName(model_name));
        }

        // Resolve every template before the first write.
        let artifacts = ArtifactKind::BACKEND
            .iter()
            .chain(ArtifactKind::WEB.iter())
            .chain(ArtifactKind::MOBILE.iter())
            .map(|kind| self.registry.resolve(storage, *kind))
            .collect::<Result<Vec<&TemplateEntry>, GenError>>()?;
        let scaffold = if storage == StorageBackend::Relational {
            Some(self.registry.resolve(storage, ArtifactKind::QueryBuild)?)
        } else {
            None
        };

        let backend_root = roots.backend.to_string_lossy();
        let web_root = roots.web.to_string_lossy();
        let build = |dialect: &dyn naming::Dialect| {
            ModelContext::build(
                &loaded.project,
                &loaded.model,
                &loaded.fields,
                dialect,
                &backend_root,
                &web_root,
            )
        };
        let backend_ctx = build(&BackendDialect);
        let web_ctx = build(&WebDialect);
        let mobile_ctx = build(&MobileDialect);

        let mut emitter = Emitter::new(self.formatter.as_ref());
        if let Some(m) = manifest {
            emitter = emitter.with_manifest(m);
        }

        let mut files = Vec::with_capacity(artifacts.len() + 1);
        for entry in artifacts {
            let stack = entry.kind.stack();
            let ctx = match stack {
                TargetStack::Web => &web_ctx,
                TargetStack::Mobile => &mobile_ctx,
                TargetStack::Backend | TargetStack::Scaffold => &backend_ctx,
            };
            let req = EmitRequest {
                entry,
                path: entry.path.resolve(roots.for_stack(stack), &model_name),
            };
            match emitter.emit(&req, ctx, policy)? {
                Emitted::Written(path) => files.push(GeneratedArtifact {
                    kind: entry.kind,
                    path,
                }),
                Emitted::AlreadyExists(path) => {
                    return Err(GenError::ArtifactExists {
                        kind: entry.kind,
                        model: model_name,
                        path,
                    });
                }
            }
        }

        let mut entry_file = None;
        let mut duplicate_bootstrap = false;
        if let Some(entry) = scaffold {
            // The companion is fully generated and always replaced.
            let req = EmitRequest {
                entry,
                path: entry.path.resolve(&roots.backend, &model_name),
            };
            let path = emitter
                .emit(&req, &backend_ctx, OverwritePolicy::Force)?
                .path()
                .to_path_buf();
            files.push(GeneratedArtifact {
                kind: entry.kind,
                path,
            });

            let injector = Injector::new(
                &self.locks,
                self.formatter.as_ref(),
                &self.config.entry_procedure,
            );
            let outcome = injector.inject(
                &roots.backend.join(ENTRY_FILE),
                BuildCall::bootstrap(&model_name),
            )?;
            if outcome.duplicate {
                warn!(model = %model_name, "bootstrap call was already registered");
            }
            duplicate_bootstrap = outcome.duplicate;
            entry_file = Some(outcome.path);
        }

        Ok(GenerationReport {
            model: model_name,
            policy: format!("{:?}", policy).to_lowercase(),
            files,
            entry_file,
            duplicate_bootstrap,
        })
    }
}

fn read(path: &Path) -> Result<String, GenError> {
    std::fs::read_to_string(path).map_err(|e| GenError::io(path, e))
}
