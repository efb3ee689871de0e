//! Template registry: (storage backend, artifact kind) → template + path formula.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::GenError;
use crate::metadata::StorageBackend;

/// Which output tree an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStack {
    Backend,
    Scaffold,
    Web,
    Mobile,
}

impl TargetStack {
    /// Rooted at the project's web path instead of its backend path.
    pub fn uses_web_root(&self) -> bool {
        matches!(self, TargetStack::Web)
    }

    /// Output is Rust source and goes through the formatter.
    pub fn is_rust(&self) -> bool {
        matches!(self, TargetStack::Backend | TargetStack::Scaffold)
    }
}

/// One generated file per model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Entity,
    Router,
    Handler,
    Service,
    Repo,
    AdminHandler,
    AdminService,
    AdminRepo,
    WebView,
    WebApi,
    WebLocale,
    WebMenu,
    MobileEntity,
    MobileApi,
    QueryBuild,
}

impl ArtifactKind {
    pub const BACKEND: [ArtifactKind; 8] = [
        ArtifactKind::Entity,
        ArtifactKind::Router,
        ArtifactKind::Handler,
        ArtifactKind::Service,
        ArtifactKind::Repo,
        ArtifactKind::AdminHandler,
        ArtifactKind::AdminService,
        ArtifactKind::AdminRepo,
    ];

    pub const WEB: [ArtifactKind; 4] = [
        ArtifactKind::WebView,
        ArtifactKind::WebApi,
        ArtifactKind::WebLocale,
        ArtifactKind::WebMenu,
    ];

    pub const MOBILE: [ArtifactKind; 2] = [ArtifactKind::MobileEntity, ArtifactKind::MobileApi];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Entity => "entity",
            ArtifactKind::Router => "router",
            ArtifactKind::Handler => "handler",
            ArtifactKind::Service => "service",
            ArtifactKind::Repo => "repo",
            ArtifactKind::AdminHandler => "admin_handler",
            ArtifactKind::AdminService => "admin_service",
            ArtifactKind::AdminRepo => "admin_repo",
            ArtifactKind::WebView => "web_view",
            ArtifactKind::WebApi => "web_api",
            ArtifactKind::WebLocale => "web_locale",
            ArtifactKind::WebMenu => "web_menu",
            ArtifactKind::MobileEntity => "mobile_entity",
            ArtifactKind::MobileApi => "mobile_api",
            ArtifactKind::QueryBuild => "query_build",
        }
    }

    pub fn stack(&self) -> TargetStack {
        match self {
            ArtifactKind::WebView
            | ArtifactKind::WebApi
            | ArtifactKind::WebLocale
            | ArtifactKind::WebMenu => TargetStack::Web,
            ArtifactKind::MobileEntity | ArtifactKind::MobileApi => TargetStack::Mobile,
            ArtifactKind::QueryBuild => TargetStack::Scaffold,
            _ => TargetStack::Backend,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of an artifact relative to its root.
///
/// `{m}` in either part is replaced by the lower-first model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFormula {
    pub dir: String,
    pub file: String,
}

impl PathFormula {
    pub fn new(dir: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file: file.into(),
        }
    }

    pub fn resolve(&self, root: &Path, model: &str) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.dir.replace("{m}", model).split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.push(self.file.replace("{m}", model));
        path
    }
}

#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub kind: ArtifactKind,
    /// Registered name, used in error messages.
    pub name: String,
    pub body: String,
    pub path: PathFormula,
}

/// Lookup table for templates, keyed by storage backend and artifact kind.
///
/// Built once and handed to the generator; tests build their own with
/// [`TemplateRegistry::empty`] and [`TemplateRegistry::register`].
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    entries: HashMap<(StorageBackend, ArtifactKind), TemplateEntry>,
}

macro_rules! builtin {
    ($kind:ident, $file:literal, $dir:literal, $name:literal) => {
        (
            ArtifactKind::$kind,
            $file,
            $dir,
            $name,
            include_str!(concat!("../templates/", $file, ".hbs")),
        )
    };
}

/// (kind, template file, destination dir, destination file name, body)
const RELATIONAL: &[(ArtifactKind, &str, &str, &str, &str)] = &[
    builtin!(Entity, "relational/entity.rs", "internal/model/{m}", "{m}.rs"),
    builtin!(Router, "relational/router.rs", "internal/router/{m}", "{m}.rs"),
    builtin!(Handler, "relational/handler.rs", "internal/handler/{m}", "{m}.rs"),
    builtin!(Service, "relational/service.rs", "internal/service/{m}", "{m}.rs"),
    builtin!(Repo, "relational/repo.rs", "internal/repo/{m}", "{m}.rs"),
    builtin!(AdminHandler, "relational/admin/handler.rs", "internal/admin/handler/{m}", "{m}.rs"),
    builtin!(AdminService, "relational/admin/service.rs", "internal/admin/service/{m}", "{m}.rs"),
    builtin!(AdminRepo, "relational/admin/repo.rs", "internal/admin/repo/{m}", "{m}.rs"),
    builtin!(WebView, "web/index.vue", "src/views/business/{m}", "index.vue"),
    builtin!(WebApi, "web/api.ts", "src/api/business", "{m}.ts"),
    builtin!(WebLocale, "web/locale.ts", "src/views/business/{m}/locale", "zh-CN.ts"),
    builtin!(WebMenu, "web/menu.ts", "src/router/routes/modules/business", "{m}.ts"),
    builtin!(MobileEntity, "mobile/model.dart", "flutter/models/{m}", "{m}.dart"),
    builtin!(MobileApi, "mobile/api.dart", "flutter/api/{m}", "{m}.dart"),
    builtin!(QueryBuild, "scaffold/query_build.rs", "cmd/gen/{m}", "{m}.rs"),
];

impl TemplateRegistry {
    /// No templates at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The templates shipped with the crate. Only the relational backend
    /// is wired.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (kind, file, dir, name, body) in RELATIONAL {
            registry.register(
                StorageBackend::Relational,
                TemplateEntry {
                    kind: *kind,
                    name: file.to_string(),
                    body: body.to_string(),
                    path: PathFormula::new(*dir, *name),
                },
            );
        }
        registry
    }

    /// Add or replace the template for `(storage, entry.kind)`.
    pub fn register(&mut self, storage: StorageBackend, entry: TemplateEntry) {
        self.entries.insert((storage, entry.kind), entry);
    }

    /// Whether any template is registered for `storage`.
    pub fn supports(&self, storage: StorageBackend) -> bool {
        self.entries.keys().any(|(s, _)| *s == storage)
    }

    /// Validate a model's storage backend before anything is written.
    pub fn check_backend(
        &self,
        storage: Option<StorageBackend>,
    ) -> Result<StorageBackend, GenError> {
        match storage {
            None => Err(GenError::UnsupportedBackend("unspecified".into())),
            Some(s) if self.supports(s) => Ok(s),
            Some(s) => Err(GenError::UnsupportedBackend(s.to_string())),
        }
    }

    pub fn resolve(
        &self,
        storage: StorageBackend,
        kind: ArtifactKind,
    ) -> Result<&TemplateEntry, GenError> {
        self.entries.get(&(storage, kind)).ok_or_else(|| {
            GenError::UnsupportedBackend(format!("{} has no {} template", storage, kind))
        })
    }

    /// Registered kinds for `storage`, in declaration order of [`ArtifactKind`].
    pub fn kinds_for(&self, storage: StorageBackend) -> Vec<ArtifactKind> {
        let mut kinds: Vec<ArtifactKind> = self
            .entries
            .keys()
            .filter(|(s, _)| *s == storage)
            .map(|(_, k)| *k)
            .collect();
        kinds.sort();
        kinds
    }
}
