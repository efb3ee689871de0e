pub mod generate;
pub mod metadata;

/// Pretty-print any serializable value as JSON.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a `--json` patch body.
pub(crate) fn parse_patch(body: &str) -> anyhow::Result<serde_json::Value> {
    let patch: serde_json::Value =
        serde_json::from_str(body).map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))?;
    if !patch.is_object() {
        anyhow::bail!("Patch must be a JSON object.");
    }
    Ok(patch)
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}
