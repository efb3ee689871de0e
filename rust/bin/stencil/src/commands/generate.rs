//! `stencil preview` and `stencil generate`.

use anyhow::Result;
use stencil_codegen::{GenError, Generator};

use super::print_json;

pub fn preview(generator: &Generator, model_id: &str, json: bool) -> Result<()> {
    let view = generator.preview_code(model_id)?;
    if json {
        return print_json(&view);
    }
    for file in &view.files {
        println!("==> {} ({})", file.path.display(), file.kind);
        println!("{}", file.content);
    }
    Ok(())
}

pub fn generate(generator: &Generator, model_id: &str, force: bool, json: bool) -> Result<()> {
    let report = match generator.generate_code(model_id, force) {
        Ok(report) => report,
        Err(e @ GenError::ArtifactExists { .. }) if generator.config().tracked_regeneration => {
            anyhow::bail!(
                "{}\nIt was edited after generation. Re-run with --force to overwrite.",
                e
            )
        }
        Err(e @ GenError::ArtifactExists { .. }) => {
            anyhow::bail!("{}\nRe-run with --force to overwrite.", e)
        }
        Err(e) => return Err(e.into()),
    };
    if json {
        return print_json(&report);
    }
    println!("{:16} {}", "KIND", "PATH");
    for f in &report.files {
        println!("{:16} {}", f.kind.as_str(), f.path.display());
    }
    if let Some(entry) = &report.entry_file {
        println!("{:16} {}", "build_entry", entry.display());
    }
    if report.duplicate_bootstrap {
        println!("note: {} was already registered in the build entry.", report.model);
    }
    println!(
        "{} files generated for {} ({}).",
        report.files.len(),
        report.model,
        report.policy
    );
    Ok(())
}
