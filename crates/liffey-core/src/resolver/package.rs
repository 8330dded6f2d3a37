//! Package descriptor loading for directory resolution.

use std::io;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::ResolveError;

/// Outcome of looking up one main field in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MainField {
    /// Field holds a string target, resolved relative to the package root.
    Target(String),
    /// Field holds a structured value the resolver cannot pick a file from.
    Structured,
}

/// Parsed `package.json` of one directory.
#[derive(Debug, Clone)]
pub(crate) struct PackageDescriptor {
    fields: Map<String, Value>,
}

impl PackageDescriptor {
    /// Load the descriptor of `dir`, if any.
    ///
    /// A missing file and an unparseable one both count as no descriptor;
    /// malformed descriptors are logged and skipped rather than failing the
    /// resolution. Read errors other than not-found are real failures.
    pub(crate) fn load(dir: &Path) -> Result<Option<Self>, ResolveError> {
        let path = dir.join("package.json");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ResolveError::Io(err)),
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(fields)) => Ok(Some(Self { fields })),
            Ok(_) => {
                tracing::debug!(
                    path = %path.display(),
                    "package descriptor is not an object, skipping"
                );
                Ok(None)
            }
            Err(err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %err,
                    "unparseable package descriptor, skipping"
                );
                Ok(None)
            }
        }
    }

    /// Look up a main field. Absent and null fields both return `None`.
    pub(crate) fn main_field(&self, name: &str) -> Option<MainField> {
        match self.fields.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(target)) => Some(MainField::Target(target.clone())),
            Some(_) => Some(MainField::Structured),
        }
    }
}
