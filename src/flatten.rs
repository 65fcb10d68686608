//! Flattening of nested JSON documents into dotted key paths
//!
//! `{"b": {"c": true}, "g": ["red"]}` becomes `{"b.c": true, "g.0": "red"}`.
//! Objects and arrays are both descended, with array indices used as path
//! segments. Scalars and `null` are leaves. Empty containers contribute no
//! keys, and a scalar at the root yields an empty map.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Flatten `source` into a single-level object
pub fn flatten(source: &Value) -> Map<String, Value> {
    let mut flat = Map::new();
    walk(source, None, &mut flat);
    flat
}

/// Parse a JSON document from `reader`
pub async fn read_document<R>(mut reader: R) -> Result<Value>
where
    R: AsyncRead + Unpin,
{
    let mut content = String::new();
    reader
        .read_to_string(&mut content)
        .await
        .context("Failed to read document")?;

    serde_json::from_str(&content).context("Input is not valid JSON")
}

/// Parse the JSON document at `path`, or from stdin when no path is given
pub async fn load_document(path: Option<&Path>) -> Result<Value> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_document(file)
                .await
                .with_context(|| format!("Failed to load {}", path.display()))
        }
        None => read_document(tokio::io::stdin()).await,
    }
}

fn walk(value: &Value, path: Option<&str>, flat: &mut Map<String, Value>) {
    let child_path = |segment: &str| match path {
        Some(parent) => format!("{parent}.{segment}"),
        None => segment.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, Some(&child_path(key)), flat);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                walk(child, Some(&child_path(&idx.to_string())), flat);
            }
        }
        leaf => {
            if let Some(path) = path {
                flat.insert(path.to_string(), leaf.clone());
            }
        }
    }
}
