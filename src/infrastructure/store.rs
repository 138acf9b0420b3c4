//! Artifact file IO.
//!
//! All three pipeline artifacts (chapter tree, skeleton, text map) are
//! pretty-printed JSON with a trailing newline, so reruns produce
//! byte-identical files and diffs stay readable.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Chapter, GeneratedTextMap, Skeleton};

fn io_error(path: &Path, source: std::io::Error) -> DomainError {
    DomainError::Io { path: path.display().to_string(), source }
}

/// Read a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> DomainResult<T> {
    let data = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let value = serde_json::from_str(&data)?;
    debug!(path = %path.display(), "artifact read");
    Ok(value)
}

/// Write a JSON artifact: pretty-printed, trailing newline, parent
/// directories created as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> DomainResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
    }
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    fs::write(path, data).map_err(|e| io_error(path, e))?;
    debug!(path = %path.display(), "artifact written");
    Ok(())
}

pub fn read_chapter(path: &Path) -> DomainResult<Chapter> {
    read_json(path)
}

pub fn read_skeleton(path: &Path) -> DomainResult<Skeleton> {
    read_json(path)
}

pub fn read_text_map(path: &Path) -> DomainResult<GeneratedTextMap> {
    read_json(path)
}

pub fn write_chapter(path: &Path, chapter: &Chapter) -> DomainResult<()> {
    write_json(path, chapter)
}

pub fn write_skeleton(path: &Path, skeleton: &Skeleton) -> DomainResult<()> {
    write_json(path, skeleton)
}

pub fn write_text_map(path: &Path, map: &GeneratedTextMap) -> DomainResult<()> {
    write_json(path, map)
}
