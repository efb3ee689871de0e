//! Build-graph injector.
//!
//! `cmd/gen/build.rs` accumulates one bootstrap call per generated model.
//! Injection parses the file, collects the call statements of the entry
//! procedure, and writes a new file with the new call first and every
//! earlier call after it, in source order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use quote::{quote, ToTokens};
use serde::Serialize;
use syn::{Expr, Item, Stmt};
use tracing::{info, warn};

use crate::error::GenError;
use crate::format::SourceFormatter;

const HEADER: &str = "// Code generated by stencil. \
                      New bootstrap calls are prepended on every generation.\n\n";

/// Name of the bootstrap function every query-builder companion defines.
pub const BOOTSTRAP_FN: &str = "gen_build_query";

/// One call statement in the entry procedure, e.g. `order::gen_build_query()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildCall {
    /// Callee path segments.
    pub path: Vec<String>,
    /// Argument expressions as source text.
    pub args: Vec<String>,
}

impl BuildCall {
    /// `<model>::gen_build_query()`.
    pub fn bootstrap(model: &str) -> Self {
        Self {
            path: vec![model.to_string(), BOOTSTRAP_FN.to_string()],
            args: Vec::new(),
        }
    }

    /// The companion module of a bootstrap call: `order` for
    /// `order::gen_build_query()`. Any other call (`std::...`, a crate
    /// function, a relative path) has none and gets no `mod` line.
    pub fn qualifier(&self) -> Option<&str> {
        match self.path.as_slice() {
            [module, func]
                if func == BOOTSTRAP_FN
                    && !matches!(module.as_str(), "crate" | "self" | "super" | "Self") =>
            {
                Some(module.as_str())
            }
            _ => None,
        }
    }

    fn to_expr(&self) -> syn::Result<Expr> {
        syn::parse_str(&self.to_string())
    }
}

impl fmt::Display for BuildCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.path.join("::"), self.args.join(", "))
    }
}

/// Collect the call statements of `entry` in `source`.
///
/// Only statements whose callee is a plain path count; anything else in the
/// body is not carried over.
pub fn parse_entry_calls(
    source: &str,
    entry: &str,
    path: &Path,
) -> Result<Vec<BuildCall>, GenError> {
    let file = syn::parse_file(source).map_err(|e| GenError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let func = file
        .items
        .iter()
        .find_map(|item| match item {
            Item::Fn(f) if f.sig.ident == entry => Some(f),
            _ => None,
        })
        .ok_or_else(|| GenError::EntryProcedureNotFound {
            name: entry.to_string(),
            path: path.to_path_buf(),
        })?;

    let mut calls = Vec::new();
    for stmt in &func.block.stmts {
        let Stmt::Expr(Expr::Call(call), _) = stmt else {
            continue;
        };
        let Expr::Path(callee) = call.func.as_ref() else {
            continue;
        };
        calls.push(BuildCall {
            path: callee
                .path
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect(),
            args: call
                .args
                .iter()
                .map(|a| a.to_token_stream().to_string())
                .collect(),
        });
    }
    Ok(calls)
}

/// Render the accumulator file: one `#[path]` module per distinct
/// companion, then the entry procedure calling everything in order.
pub fn render_entry(entry: &str, calls: &[BuildCall]) -> syn::Result<String> {
    let entry_ident: syn::Ident = syn::parse_str(entry)?;

    let mut seen = HashSet::new();
    let mut mods = Vec::new();
    for q in calls.iter().filter_map(BuildCall::qualifier) {
        if !seen.insert(q) {
            continue;
        }
        let ident: syn::Ident = syn::parse_str(q)?;
        let file = format!("{}/{}.rs", q, q);
        mods.push(quote! {
            #[path = #file]
            mod #ident;
        });
    }

    let stmts = calls
        .iter()
        .map(BuildCall::to_expr)
        .collect::<syn::Result<Vec<_>>>()?;

    let body = quote! {
        #(#mods)*

        fn #entry_ident() {
            #(#stmts;)*
        }
    };
    Ok(format!("{}{}\n", HEADER, body))
}

/// Per-entry-file mutexes.
///
/// Every read-modify-write of an entry file happens under the lock for
/// its path, so concurrent generations never lose each other's calls.
#[derive(Default)]
pub struct EntryLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl EntryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key).or_default().clone()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InjectOutcome {
    pub path: PathBuf,
    /// Calls in the rewritten entry procedure, new call first.
    pub calls: Vec<BuildCall>,
    /// The new call was already present before this injection.
    pub duplicate: bool,
}

pub struct Injector<'a> {
    locks: &'a EntryLocks,
    formatter: &'a dyn SourceFormatter,
    entry_procedure: &'a str,
}

impl<'a> Injector<'a> {
    pub fn new(
        locks: &'a EntryLocks,
        formatter: &'a dyn SourceFormatter,
        entry_procedure: &'a str,
    ) -> Self {
        Self {
            locks,
            formatter,
            entry_procedure,
        }
    }

    /// Prepend `call` to the entry procedure of `entry_file`.
    ///
    /// A missing file is seeded with an empty entry procedure. On any
    /// error the existing file is left as it was.
    pub fn inject(&self, entry_file: &Path, call: BuildCall) -> Result<InjectOutcome, GenError> {
        let lock = self.locks.lock_for(entry_file);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let source = match std::fs::read_to_string(entry_file) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %entry_file.display(), "seeding entry file");
                format!("fn {}() {{}}\n", self.entry_procedure)
            }
            Err(e) => return Err(GenError::io(entry_file, e)),
        };

        let existing = parse_entry_calls(&source, self.entry_procedure, entry_file)?;
        let duplicate = existing.contains(&call);
        if duplicate {
            warn!(
                call = %call,
                path = %entry_file.display(),
                "bootstrap call already present, adding it again"
            );
        }

        let mut calls = Vec::with_capacity(existing.len() + 1);
        calls.push(call);
        calls.extend(existing);

        let parse_err = |e: syn::Error| GenError::Parse {
            path: entry_file.to_path_buf(),
            message: e.to_string(),
        };
        let text = render_entry(self.entry_procedure, &calls).map_err(parse_err)?;
        syn::parse_file(&text).map_err(parse_err)?;

        write_atomic(entry_file, &text)?;
        if let Err(e) = self.formatter.format_file(entry_file) {
            warn!(
                path = %entry_file.display(),
                error = %e,
                "format failed, keeping unformatted entry file"
            );
        }

        info!(path = %entry_file.display(), calls = calls.len(), "injected bootstrap call");
        Ok(InjectOutcome {
            path: entry_file.to_path_buf(),
            calls,
            duplicate,
        })
    }
}

fn write_atomic(path: &Path, text: &str) -> Result<(), GenError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| GenError::io(parent, e))?;
    }
    let tmp = path.with_extension("rs.tmp");
    std::fs::write(&tmp, text).map_err(|e| GenError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| GenError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::NoFormat;

    struct BrokenFormatter;

    impl SourceFormatter for BrokenFormatter {
        fn format_file(&self, _path: &Path) -> anyhow::Result<()> {
            anyhow::bail!("rustfmt not installed")
        }
    }

    fn mod_names(text: &str) -> Vec<String> {
        syn::parse_file(text)
            .unwrap()
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Mod(m) => Some(m.ident.to_string()),
                _ => None,
            })
            .collect()
    }

    fn names(calls: &[BuildCall]) -> Vec<String> {
        calls.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn prepends_new_call() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("build.rs");
        std::fs::write(
            &entry,
            r#"#[path = "a/a.rs"] mod a;
#[path = "b/b.rs"] mod b;
fn main() {
    a::gen_build_query();
    b::gen_build_query();
}
"#,
        )
        .unwrap();

        let locks = EntryLocks::new();
        let injector = Injector::new(&locks, &NoFormat, "main");
        let outcome = injector.inject(&entry, BuildCall::bootstrap("c")).unwrap();
        assert!(!outcome.duplicate);

        let text = std::fs::read_to_string(&entry).unwrap();
        let calls = parse_entry_calls(&text, "main", &entry).unwrap();
        assert_eq!(
            names(&calls),
            vec!["c::gen_build_query()", "a::gen_build_query()", "b::gen_build_query()"]
        );
        assert!(text.starts_with("// Code generated by stencil."));
        assert_eq!(mod_names(&text), vec!["c", "a", "b"]);
    }

    #[test]
    fn foreign_calls_are_kept_without_modules() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("build.rs");
        std::fs::write(
            &entry,
            r#"fn main() {
    tracing_subscriber::fmt::init();
    std::env::set_var("X", "1");
    self::local::gen_build_query();
}
"#,
        )
        .unwrap();

        let locks = EntryLocks::new();
        Injector::new(&locks, &NoFormat, "main")
            .inject(&entry, BuildCall::bootstrap("order"))
            .unwrap();

        let text = std::fs::read_to_string(&entry).unwrap();
        assert_eq!(mod_names(&text), vec!["order"]);
        let calls = parse_entry_calls(&text, "main", &entry).unwrap();
        assert_eq!(
            names(&calls),
            vec![
                "order::gen_build_query()",
                "tracing_subscriber::fmt::init()",
                "std::env::set_var(\"X\", \"1\")",
                "self::local::gen_build_query()",
            ]
        );
    }

    #[test]
    fn format_failure_keeps_rewritten_file() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("build.rs");

        let locks = EntryLocks::new();
        let outcome = Injector::new(&locks, &BrokenFormatter, "main")
            .inject(&entry, BuildCall::bootstrap("order"))
            .unwrap();
        assert_eq!(outcome.path, entry);

        let text = std::fs::read_to_string(&entry).unwrap();
        let calls = parse_entry_calls(&text, "main", &entry).unwrap();
        assert_eq!(names(&calls), vec!["order::gen_build_query()"]);
    }

    #[test]
    fn keeps_unqualified_calls_and_arguments() {
        let source = r#"fn main() {
            let x = 1;
            setup(x, "db");
            order::gen_build_query();
            println!("done");
        }"#;
        let calls = parse_entry_calls(source, "main", Path::new("build.rs")).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].qualifier(), None);
        assert_eq!(calls[0].path, vec!["setup"]);
        assert_eq!(calls[0].args, vec!["x", "\"db\""]);
        assert_eq!(calls[1].qualifier(), Some("order"));

        let text = render_entry("main", &calls).unwrap();
        let again = parse_entry_calls(&text, "main", Path::new("build.rs")).unwrap();
        assert_eq!(again, calls);
    }

    #[test]
    fn parse_failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("build.rs");
        let garbage = "fn main( {{ not rust";
        std::fs::write(&entry, garbage).unwrap();

        let locks = EntryLocks::new();
        let err = Injector::new(&locks, &NoFormat, "main")
            .inject(&entry, BuildCall::bootstrap("order"))
            .unwrap_err();
        assert_eq!(err.error_code(), "PARSE_ERROR");
        assert_eq!(std::fs::read_to_string(&entry).unwrap(), garbage);
    }

    #[test]
    fn missing_entry_procedure() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("build.rs");
        std::fs::write(&entry, "fn other() {}\n").unwrap();

        let locks = EntryLocks::new();
        let err = Injector::new(&locks, &NoFormat, "main")
            .inject(&entry, BuildCall::bootstrap("order"))
            .unwrap_err();
        assert!(matches!(err, GenError::EntryProcedureNotFound { ref name, .. } if name == "main"));
        assert_eq!(std::fs::read_to_string(&entry).unwrap(), "fn other() {}\n");
    }

    #[test]
    fn seeds_missing_file_with_custom_entry() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("cmd/gen/build.rs");

        let locks = EntryLocks::new();
        Injector::new(&locks, &NoFormat, "run")
            .inject(&entry, BuildCall::bootstrap("order"))
            .unwrap();

        let text = std::fs::read_to_string(&entry).unwrap();
        let calls = parse_entry_calls(&text, "run", &entry).unwrap();
        assert_eq!(names(&calls), vec!["order::gen_build_query()"]);
        assert!(!dir.path().join("cmd/gen/build.rs.tmp").exists());
    }

    #[test]
    fn duplicates_are_kept_and_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("build.rs");
        let locks = EntryLocks::new();
        let injector = Injector::new(&locks, &NoFormat, "main");

        injector.inject(&entry, BuildCall::bootstrap("order")).unwrap();
        let outcome = injector.inject(&entry, BuildCall::bootstrap("order")).unwrap();
        assert!(outcome.duplicate);
        assert_eq!(outcome.calls.len(), 2);

        let text = std::fs::read_to_string(&entry).unwrap();
        assert_eq!(mod_names(&text), vec!["order"]);
    }

    #[test]
    fn concurrent_injections_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("build.rs");
        let locks = EntryLocks::new();

        std::thread::scope(|s| {
            for model in ["order", "invoice", "customer", "refund"] {
                let locks = &locks;
                let entry = &entry;
                s.spawn(move || {
                    Injector::new(locks, &NoFormat, "main")
                        .inject(entry, BuildCall::bootstrap(model))
                        .unwrap();
                });
            }
        });

        let text = std::fs::read_to_string(&entry).unwrap();
        let calls = parse_entry_calls(&text, "main", &entry).unwrap();
        let mut got: Vec<&str> = calls.iter().filter_map(|c| c.qualifier()).collect();
        got.sort();
        assert_eq!(got, vec!["customer", "invoice", "order", "refund"]);
    }
}
