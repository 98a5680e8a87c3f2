//! Turns provider output into something the engine can run.
//!
//! A provider may answer with a finished world, a spec document, or a line
//! pointing at a file it wrote. Documents may be wrapped in surrounding text
//! (code fences, chatter); the outermost `{...}` span is tried when the whole
//! text is not JSON.

use std::path::{Path, PathBuf};

use serde_json::Value;

use tilecraft_gen::{WorldOutput, WorldSpec};

use crate::error::{Error, Result};

const FILE_MARKER: &str = "Wrote terrain JSON to ";

const FALLBACK_SPEC: &str = include_str!("../assets/fallback_spec.json");

#[derive(Debug, Clone)]
pub enum Acquired {
    /// Already generated; passed through untouched.
    Ready(WorldOutput),
    /// Needs a generation run.
    Spec(WorldSpec),
}

pub fn acquire(text: &str) -> Result<Acquired> {
    if let Some(acquired) = classify(text)? {
        return Ok(acquired);
    }
    if let Some(path) = file_reference(text) {
        tracing::debug!(path = %path.display(), "following file reference");
        let contents = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        // One level only: a file that points at another file is rejected.
        if let Some(acquired) = classify(&contents)? {
            return Ok(acquired);
        }
    }
    Err(Error::UnrecognizedSource(preview(text)))
}

pub fn acquire_path(path: &Path) -> Result<Acquired> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    acquire(&text)
}

/// Built-in spec used when no input is supplied.
pub fn fallback_spec() -> Result<WorldSpec> {
    Ok(serde_json::from_str(FALLBACK_SPEC)?)
}

fn classify(text: &str) -> Result<Option<Acquired>> {
    let Some(value) = parse_document(text) else {
        return Ok(None);
    };
    let Value::Object(map) = &value else {
        return Ok(None);
    };
    let has_cells = map.get("area").and_then(|a| a.get("cells")).is_some();
    if has_cells {
        return Ok(Some(Acquired::Ready(serde_json::from_value(value)?)));
    }
    if map.contains_key("tiles") {
        return Ok(Some(Acquired::Spec(serde_json::from_value(value)?)));
    }
    Ok(None)
}

fn parse_document(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn file_reference(text: &str) -> Option<PathBuf> {
    let (_, rest) = text.split_once(FILE_MARKER)?;
    let line = rest.lines().next()?.trim();
    let path = line
        .trim_end_matches('.')
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`');
    (!path.is_empty()).then(|| PathBuf::from(path))
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(80) {
        Some((i, _)) => format!("{}...", &trimmed[..i]),
        None => trimmed.to_string(),
    }
}
