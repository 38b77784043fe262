//! Preset file loader for the heatmap CLI.
//!
//! Loads layer preset files (YAML, or JSON by `.json` extension) on top of the
//! built-in presets.
//!
//! Placeholders of the form `${NAME}` or `${NAME:-fallback}` are filled from
//! the environment before parsing.

use anyhow::{Context, Result};
use colormap::PresetConfig;
use std::fs;
use std::path::Path;

/// Read a preset file, fill its placeholders and parse it.
pub fn load_presets<P: AsRef<Path>>(path: P) -> Result<PresetConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read preset file from {:?}", path))?;

    let expanded = substitute_env(&content)
        .with_context(|| format!("Failed to fill placeholders in {:?}", path))?;

    let presets = if path.extension().and_then(|s| s.to_str()) == Some("json") {
        PresetConfig::from_json(&expanded)
    } else {
        PresetConfig::from_yaml(&expanded)
    }
    .with_context(|| format!("Failed to parse preset file {:?}", path))?;

    Ok(presets)
}

/// Built-in presets with the file at `path`, if any, layered on top
pub fn load_presets_over_builtin(path: Option<&Path>) -> Result<PresetConfig> {
    let mut presets = PresetConfig::builtin();
    if let Some(path) = path {
        presets.merge(load_presets(path)?);
    }
    Ok(presets)
}

// ============================================================================
// ${VAR} substitution
// ============================================================================

/// Replace each `${NAME}` or `${NAME:-fallback}` placeholder in a preset file.
///
/// A set, non-empty variable wins over the fallback. A bare `${NAME}` whose
/// variable is unset fails the load, as does an unterminated placeholder.
fn substitute_env(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let close = after.find('}').with_context(|| {
            format!("Unterminated placeholder starting at '${{{}'", after.lines().next().unwrap_or(""))
        })?;
        out.push_str(&placeholder_value(&after[..close])?);
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Value for the text between `${` and `}`.
fn placeholder_value(placeholder: &str) -> Result<String> {
    let (name, fallback) = match placeholder.split_once(":-") {
        Some((name, fallback)) => (name.trim(), Some(fallback)),
        None => (placeholder.trim(), None),
    };

    match (std::env::var(name), fallback) {
        (Ok(value), Some(_)) if !value.is_empty() => Ok(value),
        (_, Some(fallback)) => Ok(fallback.to_string()),
        (Ok(value), None) => Ok(value),
        (Err(_), None) => anyhow::bail!("Preset file references unset variable {}", name),
    }
}

// ============================================================================
// Tests
// ============================================================================
