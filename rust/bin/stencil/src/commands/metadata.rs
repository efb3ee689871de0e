//! Project / model / field CRUD commands.

use anyhow::Result;
use stencil_codegen::{
    CreateField, CreateModel, CreateProject, MetadataService, StorageBackend,
};

use super::{or_dash, parse_patch, print_json};

// ── Projects ────────────────────────────────────────────────────────

pub fn create_project(svc: &MetadataService, input: CreateProject, json: bool) -> Result<()> {
    let project = svc.create_project(input)?;
    if json {
        return print_json(&project);
    }
    println!("project {} created.", project.id);
    Ok(())
}

pub fn list_projects(svc: &MetadataService, json: bool) -> Result<()> {
    let projects = svc.list_projects()?;
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects.");
        println!("Run: stencil project create <name> --path <dir>");
        return Ok(());
    }
    println!("{:32} {:16} {:30} {:30}", "ID", "NAME", "PATH", "WEB PATH");
    for p in &projects {
        println!("{:32} {:16} {:30} {:30}", p.id, p.name, or_dash(&p.path), or_dash(&p.web_path));
    }
    Ok(())
}

/// Projects with their models and fields, indented.
pub fn tree(svc: &MetadataService, json: bool) -> Result<()> {
    let tree = svc.project_tree()?;
    if json {
        return print_json(&tree);
    }
    for p in &tree {
        println!("{} ({})", p.project.name, p.project.id);
        for m in &p.models {
            let storage = m.model.storage.map(|s| s.as_str()).unwrap_or("-");
            println!("  {} [{}] ({})", m.model.struct_name, storage, m.model.id);
            for f in &m.fields {
                println!("    {:20} {:12} {}", f.name, or_dash(&f.ty), or_dash(&f.query_criteria));
            }
        }
    }
    Ok(())
}

pub fn update_project(svc: &MetadataService, id: &str, body: &str, json: bool) -> Result<()> {
    let project = svc.update_project(id, parse_patch(body)?)?;
    if json {
        return print_json(&project);
    }
    println!("project {} updated.", project.id);
    Ok(())
}

pub fn delete_project(svc: &MetadataService, id: &str) -> Result<()> {
    svc.delete_project(id)?;
    println!("project {} deleted.", id);
    Ok(())
}

// ── Models ──────────────────────────────────────────────────────────

pub fn create_model(svc: &MetadataService, input: CreateModel, json: bool) -> Result<()> {
    let model = svc.create_model(input)?;
    if json {
        return print_json(&model);
    }
    println!("model {} created.", model.id);
    Ok(())
}

pub fn list_models(svc: &MetadataService, project_id: &str, json: bool) -> Result<()> {
    let models = svc.list_models(project_id)?;
    if json {
        return print_json(&models);
    }
    println!("{:32} {:20} {:12} {:10}", "ID", "STRUCT", "STORAGE", "TIME QUERY");
    for m in &models {
        let storage = m.storage.map(|s| s.as_str()).unwrap_or("-");
        println!("{:32} {:20} {:12} {:10}", m.id, m.struct_name, storage, m.query_time);
    }
    Ok(())
}

pub fn update_model(svc: &MetadataService, id: &str, body: &str, json: bool) -> Result<()> {
    let model = svc.update_model(id, parse_patch(body)?)?;
    if json {
        return print_json(&model);
    }
    println!("model {} updated.", model.id);
    Ok(())
}

pub fn delete_model(svc: &MetadataService, id: &str) -> Result<()> {
    svc.delete_model(id)?;
    println!("model {} deleted.", id);
    Ok(())
}

/// Parse a `--storage` argument.
pub fn parse_storage(s: &str) -> Result<StorageBackend> {
    s.parse::<StorageBackend>().map_err(|e| anyhow::anyhow!(e))
}

// ── Fields ──────────────────────────────────────────────────────────

pub fn create_field(svc: &MetadataService, input: CreateField, json: bool) -> Result<()> {
    let field = svc.create_field(input)?;
    if json {
        return print_json(&field);
    }
    println!("field {} created.", field.id);
    Ok(())
}

pub fn list_fields(svc: &MetadataService, model_id: &str, json: bool) -> Result<()> {
    let fields = svc.list_fields(model_id)?;
    if json {
        return print_json(&fields);
    }
    println!(
        "{:32} {:20} {:12} {:16} {:8} {:6}",
        "ID", "NAME", "TYPE", "JSON", "REQUIRED", "QUERY"
    );
    for f in &fields {
        println!(
            "{:32} {:20} {:12} {:16} {:8} {:6}",
            f.id,
            f.name,
            or_dash(&f.ty),
            or_dash(&f.json_tag),
            f.required,
            or_dash(&f.query_criteria)
        );
    }
    Ok(())
}

pub fn update_field(svc: &MetadataService, id: &str, body: &str, json: bool) -> Result<()> {
    let field = svc.update_field(id, parse_patch(body)?)?;
    if json {
        return print_json(&field);
    }
    println!("field {} updated.", field.id);
    Ok(())
}

pub fn delete_field(svc: &MetadataService, id: &str) -> Result<()> {
    svc.delete_field(id)?;
    println!("field {} deleted.", id);
    Ok(())
}
