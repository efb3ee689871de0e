use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Generation run mode.
///
/// `Debug` makes every generation request behave as if `force` had been
/// passed: existing artifacts are deleted and rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Debug,
    #[default]
    Release,
}

impl RunMode {
    pub fn parse(s: &str) -> Option<RunMode> {
        match s {
            "debug" => Some(RunMode::Debug),
            "release" => Some(RunMode::Release),
            _ => None,
        }
    }
}

/// Configuration for the generator and its metadata store.
///
/// Loaded from a TOML file, then overridden by `--flag=value` arguments.
/// Every field has a default so an empty file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Run mode. `debug` forces overwrite on every generation.
    pub mode: RunMode,

    /// Output root used when a project has no backend or web path,
    /// and for every preview.
    pub scratch_dir: PathBuf,

    /// Directory holding the metadata database and the hash manifest.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb metadata database.
    /// Defaults to `{data_dir}/stencil.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Name of the procedure in `cmd/gen/build.rs` that accumulates
    /// bootstrap calls.
    pub entry_procedure: String,

    /// Run `rustfmt` over generated backend files.
    pub format: bool,

    /// Refuse overwrite only when a generated file was edited by hand
    /// (content hash differs from the last generated hash).
    pub tracked_regeneration: bool,

    /// Hash manifest used by tracked regeneration.
    /// Defaults to `{data_dir}/manifest.json` if not specified.
    pub manifest_path: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Release,
            scratch_dir: PathBuf::from(".tmp"),
            data_dir: None,
            db_path: None,
            entry_procedure: "main".to_string(),
            format: true,
            tracked_regeneration: false,
            manifest_path: None,
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from a TOML file, or return defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Internal(format!("read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ServiceError> {
        toml::from_str(content)
            .map_err(|e| ServiceError::Validation(format!("invalid config: {}", e)))
    }

    /// Apply command-line overrides.
    ///
    /// Supported flags:
    /// - `--mode=debug|release` (any other value leaves the mode as is)
    /// - `--scratch-dir=PATH`
    /// - `--data-dir=PATH`
    /// - `--db=PATH`
    /// - `--entry=NAME`
    /// - `--no-format`
    /// - `--tracked`
    pub fn apply_args(mut self, args: &[String]) -> Self {
        for arg in args {
            if let Some(val) = arg.strip_prefix("--mode=") {
                if let Some(mode) = RunMode::parse(val) {
                    self.mode = mode;
                }
            } else if let Some(val) = arg.strip_prefix("--scratch-dir=") {
                self.scratch_dir = PathBuf::from(val);
            } else if let Some(val) = arg.strip_prefix("--data-dir=") {
                self.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--db=") {
                self.db_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--entry=") {
                self.entry_procedure = val.to_string();
            } else if arg == "--no-format" {
                self.format = false;
            } else if arg == "--tracked" {
                self.tracked_regeneration = true;
            }
        }
        self
    }

    pub fn from_args(args: &[String]) -> Self {
        Self::default().apply_args(args)
    }

    pub fn is_debug(&self) -> bool {
        self.mode == RunMode::Debug
    }

    /// Resolve the redb database path, falling back to `{data_dir}/stencil.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("stencil.redb"))
    }

    /// Resolve the hash manifest path, falling back to `{data_dir}/manifest.json`.
    pub fn resolve_manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("manifest.json"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
