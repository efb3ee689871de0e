use std::path::Path;

/// Formatting pass applied to generated Rust files in place.
///
/// Failures are reported to the caller, which logs them; a formatting
/// failure never removes a generated file.
pub trait SourceFormatter: Send + Sync {
    fn format_file(&self, path: &Path) -> anyhow::Result<()>;
}

/// Runs `rustfmt` on the file.
pub struct Rustfmt;

impl SourceFormatter for Rustfmt {
    fn format_file(&self, path: &Path) -> anyhow::Result<()> {
        let sh = xshell::Shell::new()?;
        xshell::cmd!(sh, "rustfmt --edition 2021 {path}")
            .quiet()
            .ignore_stdout()
            .run()
            .inspect_err(|_| {
                tracing::debug!(path = %path.display(), "rustfmt rejected file");
            })?;
        Ok(())
    }
}

/// Leaves files untouched.
pub struct NoFormat;

impl SourceFormatter for NoFormat {
    fn format_file(&self, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }
}
