//! End-to-end generation against a redb-backed metadata store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stencil_codegen::inject::parse_entry_calls;
use stencil_codegen::*;
use stencil_core::{GeneratorConfig, RunMode};
use stencil_kv::RedbStore;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    service: MetadataService,
    store: Arc<dyn MetadataStore>,
    config: GeneratorConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let kv = Arc::new(RedbStore::open(&root.join("stencil.redb")).unwrap());
        let store: Arc<dyn MetadataStore> = Arc::new(KvMetadataStore::new(kv));
        let config = GeneratorConfig {
            scratch_dir: root.join("scratch"),
            data_dir: Some(root.join("data")),
            format: false,
            ..Default::default()
        };
        Self {
            _dir: dir,
            root,
            service: MetadataService::new(store.clone()),
            store,
            config,
        }
    }

    fn backend(&self) -> PathBuf {
        self.root.join("shop")
    }

    fn web(&self) -> PathBuf {
        self.root.join("shop-web")
    }

    fn generator(&self) -> Generator {
        Generator::new(self.store.clone(), self.config.clone()).unwrap()
    }

    fn project(&self) -> Project {
        self.service
            .create_project(CreateProject {
                name: "shop".into(),
                // Trailing slash is ignored.
                path: format!("{}/", self.backend().display()),
                web_path: self.web().display().to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    fn model(&self, project: &Project, name: &str, storage: Option<StorageBackend>) -> Model {
        let model = self
            .service
            .create_model(CreateModel {
                project_id: project.id.clone(),
                struct_name: name.into(),
                storage,
                ..Default::default()
            })
            .unwrap();
        for (field, ty) in [("id", "int"), ("total", "float64"), ("createdAt", "time.Time")] {
            self.service
                .create_field(CreateField {
                    model_id: model.id.clone(),
                    name: field.into(),
                    ty: ty.into(),
                    ..Default::default()
                })
                .unwrap();
        }
        model
    }
}

const BACKEND_FILES: [&str; 8] = [
    "internal/model/order/order.rs",
    "internal/router/order/order.rs",
    "internal/handler/order/order.rs",
    "internal/service/order/order.rs",
    "internal/repo/order/order.rs",
    "internal/admin/handler/order/order.rs",
    "internal/admin/service/order/order.rs",
    "internal/admin/repo/order/order.rs",
];

fn entry_calls(backend: &Path) -> Vec<String> {
    let path = backend.join("cmd/gen/build.rs");
    let text = std::fs::read_to_string(&path).unwrap();
    parse_entry_calls(&text, "main", &path)
        .unwrap()
        .iter()
        .map(|c| c.to_string())
        .collect()
}

#[test]
fn test_generate_then_protect() {
    let fx = Fixture::new();
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    let generator = fx.generator();

    let report = generator.generate_code(&model.id, false).unwrap();
    assert_eq!(report.model, "order");
    assert_eq!(report.files.len(), 15);
    assert!(!report.duplicate_bootstrap);
    for rel in BACKEND_FILES {
        assert!(fx.backend().join(rel).is_file(), "missing {}", rel);
    }
    assert!(fx.web().join("src/views/business/order/index.vue").is_file());
    assert!(fx.web().join("src/views/business/order/locale/zh-CN.ts").is_file());
    assert!(fx.web().join("src/router/routes/modules/business/order.ts").is_file());
    assert!(fx.backend().join("flutter/api/order/order.dart").is_file());
    assert!(fx.backend().join("cmd/gen/order/order.rs").is_file());

    let entity_path = fx.backend().join(BACKEND_FILES[0]);
    let entity = std::fs::read_to_string(&entity_path).unwrap();
    assert!(entity.contains("pub struct Order {"));
    assert!(entity.contains("pub created_at: Option<chrono::DateTime<chrono::Utc>>,"));
    assert!(entity.contains("#[serde(rename = \"createdAt\")]"));
    assert!(entity.contains("OrderColumn::CreatedAt => \"createdAt\""));

    let api = std::fs::read_to_string(fx.web().join("src/api/business/order.ts")).unwrap();
    assert!(api.contains("total?: number;"));
    assert!(api.contains("createdAt?: string;"));

    let dart =
        std::fs::read_to_string(fx.backend().join("flutter/models/order/order.dart")).unwrap();
    assert!(dart.contains("final num? total;"));
    assert!(dart.contains("final DateTime? createdAt;"));

    assert_eq!(entry_calls(&fx.backend()), vec!["order::gen_build_query()"]);

    // Second run without force refuses and leaves the file alone.
    let err = generator.generate_code(&model.id, false).unwrap_err();
    assert_eq!(err.error_code(), "ARTIFACT_EXISTS");
    assert!(err.to_string().contains("'order'"));
    assert_eq!(std::fs::read_to_string(&entity_path).unwrap(), entity);
}

#[test]
fn test_force_regenerates_and_accumulates() {
    let fx = Fixture::new();
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    let generator = fx.generator();

    generator.generate_code(&model.id, false).unwrap();
    let handler = fx.backend().join("internal/handler/order/order.rs");
    std::fs::write(&handler, "// hand edited").unwrap();

    let report = generator.generate_code(&model.id, true).unwrap();
    assert_eq!(report.policy, "force");
    assert!(report.duplicate_bootstrap);
    assert!(std::fs::read_to_string(&handler).unwrap().contains("pub async fn list("));

    let calls = entry_calls(&fx.backend());
    assert!(calls.iter().filter(|c| *c == "order::gen_build_query()").count() >= 1);
}

#[test]
fn test_debug_mode_forces() {
    let mut fx = Fixture::new();
    fx.config.mode = RunMode::Debug;
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    let generator = fx.generator();

    generator.generate_code(&model.id, false).unwrap();
    let report = generator.generate_code(&model.id, false).unwrap();
    assert_eq!(report.policy, "force");
}

#[test]
fn test_unsupported_backend_writes_nothing() {
    let fx = Fixture::new();
    let project = fx.project();
    let generator = fx.generator();

    for storage in [Some(StorageBackend::Document), None] {
        let model = fx.model(&project, "order", storage);
        let err = generator.generate_code(&model.id, true).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_BACKEND");
        assert!(!fx.backend().exists());
        assert!(!fx.web().exists());
    }
}

#[test]
fn test_missing_rows_are_not_found() {
    let fx = Fixture::new();
    let generator = fx.generator();

    assert!(matches!(generator.generate_code("", false), Err(GenError::NotFound(_))));
    assert!(matches!(generator.generate_code("ghost", false), Err(GenError::NotFound(_))));
    assert!(matches!(generator.preview_code(""), Err(GenError::NotFound(_))));

    // Model whose project was deleted.
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    fx.service.delete_project(&project.id).unwrap();
    let err = generator.generate_code(&model.id, false).unwrap_err();
    assert!(matches!(err, GenError::NotFound(_)));
    assert!(!fx.backend().exists());
}

#[test]
fn test_preview_goes_to_scratch() {
    let fx = Fixture::new();
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    let generator = fx.generator();

    // Twice: preview always overwrites.
    generator.preview_code(&model.id).unwrap();
    let view = generator.preview_code(&model.id).unwrap();

    assert_eq!(view.model, "order");
    assert_eq!(view.files.len(), 16);
    assert!(!fx.backend().exists());
    assert!(!fx.web().exists());

    let scratch = fx.root.join("scratch");
    for file in &view.files {
        assert!(file.path.starts_with(&scratch), "{}", file.path.display());
        assert!(!file.content.is_empty());
    }
    let entity = view.get("entity").unwrap();
    assert!(entity.content.contains("pub total: Option<f64>,"));
    let entry = view.get("build_entry").unwrap();
    assert!(entry.content.contains("gen_build_query"));

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["files"][0]["kind"], "entity");
}

#[test]
fn test_tracked_regeneration() {
    let mut fx = Fixture::new();
    fx.config.tracked_regeneration = true;
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    let generator = fx.generator();

    generator.generate_code(&model.id, false).unwrap();
    assert!(fx.root.join("data/manifest.json").is_file());

    // Nothing was edited: regeneration goes through.
    let report = generator.generate_code(&model.id, false).unwrap();
    assert_eq!(report.policy, "tracked");

    let handler = fx.backend().join("internal/handler/order/order.rs");
    std::fs::write(&handler, "// mine").unwrap();
    match generator.generate_code(&model.id, false) {
        Err(GenError::ArtifactExists { kind, path, .. }) => {
            assert_eq!(kind, ArtifactKind::Handler);
            assert_eq!(path, handler);
        }
        other => panic!("expected ArtifactExists, got {:?}", other.map(|r| r.files.len())),
    }
    assert_eq!(std::fs::read_to_string(&handler).unwrap(), "// mine");
}

#[test]
fn test_concurrent_models_share_entry_file() {
    let fx = Fixture::new();
    let project = fx.project();
    let order = fx.model(&project, "order", Some(StorageBackend::Relational));
    let invoice = fx.model(&project, "invoice", Some(StorageBackend::Relational));
    // Separate generators over the same tree serialize through shared locks.
    let locks = Arc::new(EntryLocks::new());
    let generators: Vec<Generator> = (0..2)
        .map(|_| fx.generator().with_entry_locks(locks.clone()))
        .collect();

    std::thread::scope(|s| {
        for (generator, id) in generators.iter().zip([&order.id, &invoice.id]) {
            s.spawn(move || generator.generate_code(id, false).unwrap());
        }
    });

    let mut calls = entry_calls(&fx.backend());
    calls.sort();
    assert_eq!(calls, vec!["invoice::gen_build_query()", "order::gen_build_query()"]);
}

#[test]
fn test_custom_registry() {
    let fx = Fixture::new();
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Document));

    let mut templates = TemplateRegistry::builtin();
    for kind in ArtifactKind::BACKEND
        .iter()
        .chain(ArtifactKind::WEB.iter())
        .chain(ArtifactKind::MOBILE.iter())
    {
        templates.register(
            StorageBackend::Document,
            registry::TemplateEntry {
                kind: *kind,
                name: format!("fake/{}", kind),
                body: format!(
                    "{} for __Model__ ({{{{#each fields}}}}{{{{name}}}} {{{{/each}}}})",
                    kind
                ),
                path: registry::PathFormula::new(format!("fake/{}", kind), "{m}.txt"),
            },
        );
    }
    let generator = fx.generator().with_registry(templates);

    let report = generator.generate_code(&model.id, false).unwrap();
    assert_eq!(report.files.len(), 14);
    assert!(report.entry_file.is_none());
    let web = std::fs::read_to_string(fx.web().join("fake/web_api/order.txt")).unwrap();
    assert_eq!(web, "web_api for Order (id total createdAt )");
    let entity = std::fs::read_to_string(fx.backend().join("fake/entity/order.txt")).unwrap();
    assert_eq!(entity, "entity for Order (Id Total CreatedAt )");
}

#[test]
fn test_reserved_model_name_writes_nothing() {
    let fx = Fixture::new();
    let project = fx.project();
    let mut model = fx.model(&project, "order", Some(StorageBackend::Relational));

    // Stored before names were checked; the generator still refuses it.
    model.struct_name = "Type".into();
    fx.store.put_model(&model).unwrap();

    let err = fx.generator().generate_code(&model.id, true).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_MODEL_NAME");
    assert!(err.to_string().contains("'type'"));
    assert!(!fx.backend().exists());
    assert!(!fx.web().exists());
}

struct BrokenFormatter;

impl SourceFormatter for BrokenFormatter {
    fn format_file(&self, _path: &Path) -> anyhow::Result<()> {
        anyhow::bail!("rustfmt: command not found")
    }
}

#[test]
fn test_format_failure_is_not_fatal() {
    let fx = Fixture::new();
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    let generator = fx.generator().with_formatter(Box::new(BrokenFormatter));

    let report = generator.generate_code(&model.id, false).unwrap();
    assert_eq!(report.files.len(), 15);
    for artifact in &report.files {
        assert!(artifact.path.is_file(), "{}", artifact.path.display());
    }
    assert_eq!(entry_calls(&fx.backend()), vec!["order::gen_build_query()"]);
}

#[test]
fn test_validation_rules_reach_generated_code() {
    let fx = Fixture::new();
    let project = fx.project();
    let model = fx.model(&project, "order", Some(StorageBackend::Relational));
    fx.service
        .create_field(CreateField {
            model_id: model.id.clone(),
            name: "email".into(),
            ty: "string".into(),
            validation_rules: "required,email,max=128".into(),
            required: true,
            ..Default::default()
        })
        .unwrap();
    let generator = fx.generator();
    assert!(!generator.config().is_debug());

    let view = generator.preview_code(&model.id).unwrap();
    let entity = &view.get("entity").unwrap().content;
    assert!(entity.contains("#[validate(email)]"));
    assert!(entity.contains("#[validate(length(max = 128))]"));
    assert!(entity.contains("pub email: String,"));
    assert!(!entity.contains("#[validate(required)]"));
    let handler = &view.get("handler").unwrap().content;
    assert!(handler.contains("o.validate().map_err(ApiError::from_validation)?;"));
    assert!(handler.contains("if o.email == Default::default()"));
}
