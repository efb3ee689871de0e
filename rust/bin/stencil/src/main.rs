//! `stencil`: edit generator metadata and emit code from it.
//!
//! Metadata lives in a local redb database; generated files go to each
//! project's backend and web roots.

mod commands;
mod config;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use stencil_codegen::{
    CreateField, CreateModel, CreateProject, Generator, KvMetadataStore, MetadataService,
    MetadataStore,
};
use stencil_kv::RedbStore;
use tracing::debug;

/// Stencil code generator.
#[derive(Parser, Debug)]
#[command(name = "stencil", about = "Template-driven code generator")]
struct Cli {
    /// Path to config file (default: ~/.stencil/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Output format: table or json.
    #[arg(long = "output", short = 'o', global = true, default_value = "table")]
    output: String,

    /// Run mode override: debug or release.
    #[arg(long, global = true, value_parser = ["debug", "release"])]
    mode: Option<String>,

    /// Data directory override (metadata database, hash manifest).
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<String>,

    /// Skip rustfmt on generated files.
    #[arg(long = "no-format", global = true)]
    no_format: bool,

    /// Refuse to overwrite files edited since they were generated.
    #[arg(long, global = true)]
    tracked: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Global flags in the `--flag=value` form the config understands.
    fn overrides(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(mode) = &self.mode {
            args.push(format!("--mode={}", mode));
        }
        if let Some(dir) = &self.data_dir {
            args.push(format!("--data-dir={}", dir));
        }
        if self.no_format {
            args.push("--no-format".to_string());
        }
        if self.tracked {
            args.push("--tracked".to_string());
        }
        args
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage models.
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Manage fields.
    Field {
        #[command(subcommand)]
        action: FieldAction,
    },

    /// Show every project with its models and fields.
    Tree,

    /// Render a model into the scratch directory and print the files.
    Preview {
        /// Model ID.
        model: String,
    },

    /// Generate a model's files into its project.
    Generate {
        /// Model ID.
        model: String,
        /// Overwrite existing files.
        #[arg(long)]
        force: bool,
    },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    Create {
        name: String,
        /// Backend source root (empty: scratch directory).
        #[arg(long, default_value = "")]
        path: String,
        /// Web source root (empty: scratch directory).
        #[arg(long = "web-path", default_value = "")]
        web_path: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List,
    /// Update a project with a JSON merge patch.
    Update {
        id: String,
        #[arg(long = "json")]
        json_body: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ModelAction {
    Create {
        /// Owning project ID.
        project: String,
        /// Struct name.
        name: String,
        /// Storage backend: relational (mysql, postgres, sqlite) or document (mongodb).
        #[arg(long)]
        storage: Option<String>,
        /// Generated list endpoints accept a created-at time range.
        #[arg(long = "query-time")]
        query_time: bool,
        #[arg(long, default_value = "")]
        description: String,
    },
    List {
        /// Owning project ID.
        project: String,
    },
    /// Update a model with a JSON merge patch.
    Update {
        id: String,
        #[arg(long = "json")]
        json_body: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum FieldAction {
    Create {
        /// Owning model ID.
        model: String,
        name: String,
        /// Storage type token (int64, string, time.Time, ...).
        #[arg(long = "type", default_value = "string")]
        ty: String,
        #[arg(long = "json-tag", default_value = "")]
        json_tag: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        validation: String,
        #[arg(long)]
        required: bool,
        /// Filter operator for list endpoints (=, like, >, ...).
        #[arg(long, default_value = "")]
        query: String,
    },
    List {
        /// Owning model ID.
        model: String,
    },
    /// Update a field with a JSON merge patch.
    Update {
        id: String,
        #[arg(long = "json")]
        json_body: String,
    },
    Delete {
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("stencil v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = cli
        .config
        .as_deref()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_path);
    let config = config::load(&config_path, &cli.overrides())?;
    debug!(?config, "loaded config");

    let db_path = config.resolve_db_path();
    let kv = Arc::new(
        RedbStore::open(&db_path)
            .map_err(|e| anyhow::anyhow!("open {}: {}", db_path.display(), e))?,
    );
    let store: Arc<dyn MetadataStore> = Arc::new(KvMetadataStore::new(kv));
    let svc = MetadataService::new(store.clone());
    let json = cli.output == "json";

    match cli.command {
        Commands::Project { action } => match action {
            ProjectAction::Create {
                name,
                path,
                web_path,
                description,
            } => commands::metadata::create_project(
                &svc,
                CreateProject {
                    name,
                    description,
                    path,
                    web_path,
                },
                json,
            )?,
            ProjectAction::List => commands::metadata::list_projects(&svc, json)?,
            ProjectAction::Update { id, json_body } => {
                commands::metadata::update_project(&svc, &id, &json_body, json)?
            }
            ProjectAction::Delete { id } => commands::metadata::delete_project(&svc, &id)?,
        },

        Commands::Model { action } => match action {
            ModelAction::Create {
                project,
                name,
                storage,
                query_time,
                description,
            } => {
                let storage = storage
                    .as_deref()
                    .map(commands::metadata::parse_storage)
                    .transpose()?;
                commands::metadata::create_model(
                    &svc,
                    CreateModel {
                        project_id: project,
                        struct_name: name,
                        description,
                        storage,
                        query_time,
                    },
                    json,
                )?
            }
            ModelAction::List { project } => commands::metadata::list_models(&svc, &project, json)?,
            ModelAction::Update { id, json_body } => {
                commands::metadata::update_model(&svc, &id, &json_body, json)?
            }
            ModelAction::Delete { id } => commands::metadata::delete_model(&svc, &id)?,
        },

        Commands::Field { action } => match action {
            FieldAction::Create {
                model,
                name,
                ty,
                json_tag,
                description,
                validation,
                required,
                query,
            } => commands::metadata::create_field(
                &svc,
                CreateField {
                    model_id: model,
                    name,
                    ty,
                    json_tag,
                    description,
                    validation_rules: validation,
                    required,
                    query_criteria: query,
                },
                json,
            )?,
            FieldAction::List { model } => commands::metadata::list_fields(&svc, &model, json)?,
            FieldAction::Update { id, json_body } => {
                commands::metadata::update_field(&svc, &id, &json_body, json)?
            }
            FieldAction::Delete { id } => commands::metadata::delete_field(&svc, &id)?,
        },

        Commands::Tree => commands::metadata::tree(&svc, json)?,

        Commands::Preview { model } => {
            let generator = Generator::new(store, config)?;
            commands::generate::preview(&generator, &model, json)?;
        }

        Commands::Generate { model, force } => {
            let generator = Generator::new(store, config)?;
            commands::generate::generate(&generator, &model, force, json)?;
        }

        // Printed before the store is opened.
        Commands::Version => {}
    }

    Ok(())
}
