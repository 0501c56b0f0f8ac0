//! JSON Schema checks for agent output.

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde_json::Value;

/// Validate a JSON instance against a JSON Schema (Draft 2020-12).
pub fn validate_schema(instance: &Value, schema: &Value) -> Result<()> {
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
