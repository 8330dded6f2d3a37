//! Transform pipeline.
//!
//! Transforms are external collaborators registered by name; rule chains
//! reference those names. The pipeline runs a module's chain in order, applies
//! compile-time constant substitution, then scans the final body for
//! dependency specifiers (unless the module is a `no_parse` leaf).

mod define;
mod scan;

pub use define::SubstitutionTable;
pub use scan::scan_dependencies;

pub(crate) use define::contains_token;

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::TransformError;

/// Output of one transform stage.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    /// Rewritten module body, consumed by the next stage.
    pub body: String,
    /// Dependency specifiers this stage discovered, in discovery order.
    pub dependencies: Vec<String>,
}

impl TransformOutput {
    /// Create an output with a body and no declared dependencies.
    #[must_use]
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            dependencies: Vec::new(),
        }
    }

    /// Declare a dependency specifier discovered by this stage.
    #[must_use]
    pub fn with_dependency(mut self, specifier: impl Into<String>) -> Self {
        self.dependencies.push(specifier.into());
        self
    }
}

/// A content transformer. Implementations must be cheap to call from any
/// worker thread.
pub trait Transform: Send + Sync {
    /// Stable name referenced by rule chains and error reports.
    fn name(&self) -> &str;

    /// Rewrite `input`, optionally declaring dependency specifiers.
    ///
    /// # Errors
    /// A failing stage aborts the module, not the build.
    fn apply(&self, path: &Path, input: &str) -> Result<TransformOutput, TransformError>;
}

/// Name → transform table populated by the host before the build.
#[derive(Default)]
pub struct TransformRegistry {
    transforms: FxHashMap<String, Box<dyn Transform>>,
}

impl TransformRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform under its own name. A later registration with
    /// the same name replaces the earlier one.
    pub fn register(&mut self, transform: Box<dyn Transform>) {
        self.transforms
            .insert(transform.name().to_string(), transform);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Transform> {
        self.transforms.get(name).map(Box::as_ref)
    }

    #[cfg(test)]
    pub(crate) fn with_passthrough(names: &[&str]) -> Self {
        struct Passthrough(String);
        impl Transform for Passthrough {
            fn name(&self) -> &str {
                &self.0
            }
            fn apply(&self, _path: &Path, input: &str) -> Result<TransformOutput, TransformError> {
                Ok(TransformOutput::body(input))
            }
        }
        let mut registry = Self::default();
        for name in names {
            registry.register(Box::new(Passthrough((*name).to_string())));
        }
        registry
    }
}

/// Result of running a module's whole chain.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub body: String,
    /// Stage-declared specifiers first, then scanned ones; first-appearance
    /// order, deduplicated.
    pub dependencies: Vec<String>,
}

/// Runs transform chains over module sources.
pub struct Pipeline<'a> {
    registry: &'a TransformRegistry,
    substitutions: SubstitutionTable,
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(registry: &'a TransformRegistry, substitutions: SubstitutionTable) -> Self {
        Self {
            registry,
            substitutions,
        }
    }

    /// Run `chain` over `source`. A `no_parse` module keeps its transformed
    /// body but declares no dependencies at all, even if stages declared
    /// some or the body contains import-like text.
    ///
    /// # Errors
    /// Returns the failing stage's `TransformError`; the caller records it
    /// and continues with other modules.
    pub fn run(
        &self,
        path: &Path,
        source: &str,
        chain: &[&str],
        no_parse: bool,
    ) -> Result<PipelineOutput, TransformError> {
        let mut body = source.to_string();
        let mut dependencies = Vec::new();

        for name in chain {
            let transform = self.registry.get(name).ok_or_else(|| {
                TransformError::new(*name, path, "transform not registered")
            })?;
            let output = transform.apply(path, &body)?;
            body = output.body;
            dependencies.extend(output.dependencies);
        }

        if !self.substitutions.is_empty() {
            body = self.substitutions.apply(&body);
        }

        if no_parse {
            return Ok(PipelineOutput {
                body,
                dependencies: Vec::new(),
            });
        }

        dependencies.extend(scan_dependencies(&body));
        let mut seen = FxHashSet::default();
        dependencies.retain(|dep| seen.insert(dep.clone()));

        Ok(PipelineOutput { body, dependencies })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Appender {
        name: String,
        suffix: String,
    }

    impl Transform for Appender {
        fn name(&self) -> &str {
            &self.name
        }
        fn apply(&self, _path: &Path, input: &str) -> Result<TransformOutput, TransformError> {
            Ok(TransformOutput::body(format!("{input}{}", self.suffix)))
        }
    }

    struct Declarer;

    impl Transform for Declarer {
        fn name(&self) -> &str {
            "declarer"
        }
        fn apply(&self, _path: &Path, input: &str) -> Result<TransformOutput, TransformError> {
            Ok(TransformOutput::body(input).with_dependency("./declared"))
        }
    }

    struct Failing;

    impl Transform for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn apply(&self, path: &Path, _input: &str) -> Result<TransformOutput, TransformError> {
            Err(TransformError::new("failing", path, "boom"))
        }
    }

    fn registry() -> TransformRegistry {
        let mut registry = TransformRegistry::new();
        registry.register(Box::new(Appender {
            name: "a".to_string(),
            suffix: "+a".to_string(),
        }));
        registry.register(Box::new(Appender {
            name: "b".to_string(),
            suffix: "+b".to_string(),
        }));
        registry.register(Box::new(Declarer));
        registry.register(Box::new(Failing));
        registry
    }

    #[test]
    fn test_chain_runs_in_order() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, SubstitutionTable::default());
        let out = pipeline
            .run(Path::new("/m.js"), "base", &["a", "b"], false)
            .unwrap();
        assert_eq!(out.body, "base+a+b");
    }

    #[test]
    fn test_stage_dependencies_come_before_scanned_ones() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, SubstitutionTable::default());
        let out = pipeline
            .run(
                Path::new("/m.js"),
                "import './scanned';",
                &["declarer"],
                false,
            )
            .unwrap();
        assert_eq!(out.dependencies, vec!["./declared", "./scanned"]);
    }

    #[test]
    fn test_dependencies_are_deduplicated() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, SubstitutionTable::default());
        let out = pipeline
            .run(
                Path::new("/m.js"),
                "import './declared';\nimport './declared';",
                &["declarer"],
                false,
            )
            .unwrap();
        assert_eq!(out.dependencies, vec!["./declared"]);
    }

    #[test]
    fn test_no_parse_drops_all_dependencies() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, SubstitutionTable::default());
        let out = pipeline
            .run(
                Path::new("/vendor.js"),
                "import './x'; require('./y');",
                &["declarer"],
                true,
            )
            .unwrap();
        assert!(out.dependencies.is_empty());
    }

    #[test]
    fn test_failing_stage_reports_identity() {
        let registry = registry();
        let pipeline = Pipeline::new(&registry, SubstitutionTable::default());
        let err = pipeline
            .run(Path::new("/m.js"), "x", &["a", "failing"], false)
            .unwrap_err();
        assert_eq!(err.stage, "failing");
        assert_eq!(err.path, PathBuf::from("/m.js"));
    }

    #[test]
    fn test_substitution_applies_after_chain() {
        let registry = registry();
        let mut table = SubstitutionTable::default();
        table.insert("VERSION", "\"1.0\"");
        let pipeline = Pipeline::new(&registry, table);
        let out = pipeline
            .run(Path::new("/m.js"), "log(VERSION)", &["a"], false)
            .unwrap();
        // The appender ran first, then the table rewrote the identifier.
        assert_eq!(out.body, "log(\"1.0\")+a");
    }

    #[test]
    fn test_unregistered_transform_in_chain_errors() {
        let registry = TransformRegistry::new();
        let pipeline = Pipeline::new(&registry, SubstitutionTable::default());
        let err = pipeline
            .run(Path::new("/m.js"), "x", &["ghost"], false)
            .unwrap_err();
        assert_eq!(err.stage, "ghost");
    }
}
