//! Emission pipeline: render one template and write it under an overwrite
//! policy.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use tracing::{debug, warn};

use crate::context::ModelContext;
use crate::error::GenError;
use crate::format::SourceFormatter;
use crate::manifest::HashManifest;
use crate::registry::TemplateEntry;

/// What to do when the destination file already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Leave it alone and report [`Emitted::AlreadyExists`].
    #[default]
    Protect,
    /// Delete it and write the new render.
    Force,
    /// Overwrite only if its content is still what the engine last wrote.
    Tracked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emitted {
    Written(PathBuf),
    AlreadyExists(PathBuf),
}

impl Emitted {
    pub fn path(&self) -> &Path {
        match self {
            Emitted::Written(p) | Emitted::AlreadyExists(p) => p,
        }
    }
}

pub struct EmitRequest<'a> {
    pub entry: &'a TemplateEntry,
    pub path: PathBuf,
}

/// Textual placeholders, applied before the template engine runs.
fn substitute(body: &str, ctx: &ModelContext) -> String {
    body.replace("__model__", &ctx.name)
        .replace("__Model__", &ctx.struct_name)
        .replace("__first__", &ctx.first_letter)
        .replace("__project__", &ctx.project_name)
}

/// Render `entry` against `ctx` in strict mode without HTML escaping.
pub fn render(entry: &TemplateEntry, ctx: &ModelContext) -> Result<String, GenError> {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(true);
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_template_string(&entry.name, substitute(&entry.body, ctx))
        .map_err(|e| GenError::template(&entry.name, e))?;
    hb.render(&entry.name, ctx)
        .map_err(|e| GenError::template(&entry.name, e))
}

pub struct Emitter<'a> {
    formatter: &'a dyn SourceFormatter,
    manifest: Option<&'a HashManifest>,
}

impl<'a> Emitter<'a> {
    pub fn new(formatter: &'a dyn SourceFormatter) -> Self {
        Self {
            formatter,
            manifest: None,
        }
    }

    /// Record content hashes of every written file.
    pub fn with_manifest(mut self, manifest: &'a HashManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn emit(
        &self,
        req: &EmitRequest<'_>,
        ctx: &ModelContext,
        policy: OverwritePolicy,
    ) -> Result<Emitted, GenError> {
        let content = render(req.entry, ctx)?;
        let path = &req.path;

        if path.exists() {
            match policy {
                OverwritePolicy::Protect => return Ok(Emitted::AlreadyExists(path.clone())),
                OverwritePolicy::Tracked => {
                    let pristine = match self.manifest {
                        Some(m) => m.is_pristine(path)?,
                        None => false,
                    };
                    if !pristine {
                        return Ok(Emitted::AlreadyExists(path.clone()));
                    }
                    debug!(path = %path.display(), "unmodified since last generation");
                }
                OverwritePolicy::Force => {}
            }
            std::fs::remove_file(path).map_err(|e| GenError::io(path, e))?;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GenError::io(parent, e))?;
        }
        std::fs::write(path, &content).map_err(|e| GenError::io(path, e))?;

        if req.entry.kind.stack().is_rust() {
            if let Err(e) = self.formatter.format_file(path) {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "format failed, keeping unformatted output"
                );
            }
        }

        if let Some(manifest) = self.manifest {
            let written = std::fs::read(path).map_err(|e| GenError::io(path, e))?;
            manifest.record(path, &written)?;
        }

        debug!(kind = %req.entry.kind, path = %path.display(), "emitted");
        Ok(Emitted::Written(path.clone()))
    }
}
