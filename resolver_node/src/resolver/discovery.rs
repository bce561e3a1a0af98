//! Interface discovery stage: find the single declared service

use crate::api::errors::{ResolverError, Result};
use anyhow::Context;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Scan every file under `tree` for service declarations and return the one
/// declared name.
///
/// A declaration is any line whose first whitespace-delimited token is
/// `service`; the name is the second token and must be a bare identifier.
/// Exactly one declaration must exist across the whole tree, in whichever
/// file it appears.
pub fn discover_service_name(tree: &Path) -> Result<String> {
    let mut names = Vec::new();
    for entry in WalkDir::new(tree) {
        let entry = entry.context("walking model tree")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let bytes = fs::read(entry.path())
            .with_context(|| format!("reading {}", entry.path().display()))?;
        names.extend(declared_services(&String::from_utf8_lossy(&bytes))?);
    }

    match names.as_slice() {
        [name] => Ok(name.clone()),
        [] => Err(ResolverError::bad_request("no service in definition set")),
        _ => Err(ResolverError::bad_request("more than one service")),
    }
}

fn declared_services(text: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("service") {
            continue;
        }
        match tokens.next() {
            Some(name) if is_identifier(name) => names.push(name.to_string()),
            Some(name) => {
                return Err(ResolverError::bad_request(format!(
                    "service name {name:?} is not a valid identifier"
                )))
            }
            None => {
                return Err(ResolverError::bad_request(
                    "service declaration is missing a name",
                ))
            }
        }
    }
    Ok(names)
}

/// Discovered names become `<name>.proto` entry paths for the compiler, so
/// only protobuf identifier characters pass.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
