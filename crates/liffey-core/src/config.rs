use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RuleConfigError;

/// Top-level build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Directory that entry specifiers, relative search roots, and rule
    /// include/exclude paths resolve against.
    pub context: PathBuf,

    /// Named entry points. Each becomes one output chunk.
    pub entries: Vec<Entry>,

    #[serde(default)]
    pub resolve: ResolveOptions,

    /// Ordered transform rules. Every matching rule contributes its chain.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,

    /// Modules matching any of these conditions skip dependency discovery
    /// and become graph leaves.
    #[serde(default)]
    pub no_parse: Vec<ConditionSpec>,

    #[serde(default)]
    pub output: OutputOptions,

    /// Stop scheduling new traversal waves at the first failure instead of
    /// collecting every diagnostic.
    #[serde(default)]
    pub bail: bool,

    /// Build deadline in milliseconds. `None` disables the timeout.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl BuildConfig {
    /// Create a config with the given context directory and no entries.
    #[must_use]
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            entries: Vec::new(),
            resolve: ResolveOptions::default(),
            rules: Vec::new(),
            no_parse: Vec::new(),
            output: OutputOptions::default(),
            bail: false,
            timeout_ms: None,
        }
    }

    /// Add a named entry point.
    #[must_use]
    pub fn entry(mut self, name: impl Into<String>, specifier: impl Into<String>) -> Self {
        self.entries.push(Entry {
            name: name.into(),
            specifier: specifier.into(),
        });
        self
    }

    /// Add an alias. A `find` ending in `$` is an exact-match entry for the
    /// key without it.
    #[must_use]
    pub fn alias(mut self, find: impl Into<String>, target: impl Into<String>) -> Self {
        self.resolve.alias.push(Alias {
            find: find.into(),
            target: target.into(),
        });
        self
    }

    /// Add a transform rule.
    #[must_use]
    pub fn rule(mut self, condition: ConditionSpec, transforms: &[&str]) -> Self {
        self.rules.push(RuleSpec {
            condition,
            transforms: transforms.iter().map(|t| (*t).to_string()).collect(),
        });
        self
    }

    /// Add a dependency-discovery bypass condition.
    #[must_use]
    pub fn no_parse(mut self, condition: ConditionSpec) -> Self {
        self.no_parse.push(condition);
        self
    }

    /// Fail fast on the first diagnostic.
    #[must_use]
    pub fn with_bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    /// Set the build deadline.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Shape checks that do not need the transform registry: entries present
    /// and uniquely named, chunk filenames unambiguous for multi-chunk builds.
    ///
    /// # Errors
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), RuleConfigError> {
        if self.entries.is_empty() {
            return Err(RuleConfigError::NoEntries);
        }
        let mut seen = rustc_hash::FxHashSet::default();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(RuleConfigError::DuplicateEntry(entry.name.clone()));
            }
        }
        // A shared chunk can only materialize alongside two or more entries,
        // so entry count alone decides whether the filename must vary.
        if self.entries.len() > 1
            && !self.output.filename.contains("[name]")
            && !self.output.filename.contains("[contenthash]")
        {
            return Err(RuleConfigError::AmbiguousTemplate {
                template: self.output.filename.clone(),
            });
        }
        Ok(())
    }
}

/// A named entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub specifier: String,
}

/// Resolution options, compiled into a `ResolveConfig` before the build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveOptions {
    #[serde(default)]
    pub alias: Vec<Alias>,

    /// Search roots for bare specifiers, tried in order. Relative roots are
    /// joined to the context directory.
    #[serde(default = "default_modules")]
    pub modules: Vec<PathBuf>,

    /// Extensions appended during the file probe, tried in order.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Basenames tried when a specifier resolves to a directory.
    #[serde(default = "default_main_files")]
    pub main_files: Vec<String>,

    /// Package descriptor fields consulted for a directory's entry file,
    /// in preference order.
    #[serde(default = "default_main_fields")]
    pub main_fields: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            alias: Vec::new(),
            modules: default_modules(),
            extensions: default_extensions(),
            main_files: default_main_files(),
            main_fields: default_main_fields(),
        }
    }
}

fn default_modules() -> Vec<PathBuf> {
    vec![PathBuf::from("node_modules")]
}

fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".json".to_string(), ".wasm".to_string()]
}

fn default_main_files() -> Vec<String> {
    vec!["index".to_string()]
}

fn default_main_fields() -> Vec<String> {
    vec!["module".to_string(), "main".to_string()]
}

/// One alias table entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    /// Specifier or specifier prefix to rewrite. A trailing `$` marks an
    /// exact-match entry for the key without it.
    pub find: String,
    pub target: String,
}

/// One transform rule: a condition selecting files plus the registry names
/// of the transforms to run on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub condition: ConditionSpec,
    pub transforms: Vec<String>,
}

/// Declarative file condition. Compiled by the rule matcher; patterns are
/// validated eagerly at configuration load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSpec {
    /// Regex over the path's final component.
    Test(String),
    /// True when the path sits under any listed directory.
    Include(Vec<PathBuf>),
    /// True when the path sits under none of the listed directories.
    Exclude(Vec<PathBuf>),
    And(Vec<ConditionSpec>),
    Or(Vec<ConditionSpec>),
    Not(Box<ConditionSpec>),
}

/// Output artifact options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Output root template, joined to the context when relative.
    /// Accepts `[hash]`.
    #[serde(default = "default_output_path")]
    pub path: String,

    /// Chunk filename template. Accepts `[name]`, `[contenthash]`, `[hash]`.
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Name of the chunk that collects modules reachable from two or more
    /// entries. `None` duplicates shared modules into every chunk instead.
    #[serde(default = "default_shared_chunk")]
    pub shared_chunk: Option<String>,

    /// Side outputs fed by matching module bodies instead of the chunk file.
    #[serde(default)]
    pub extract: Vec<ExtractRule>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            filename: default_filename(),
            shared_chunk: default_shared_chunk(),
            extract: Vec::new(),
        }
    }
}

fn default_output_path() -> String {
    "dist".to_string()
}

fn default_filename() -> String {
    "[name].js".to_string()
}

fn default_shared_chunk() -> Option<String> {
    Some("shared".to_string())
}

/// Routes matching module bodies into a per-chunk sibling artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRule {
    pub condition: ConditionSpec,
    /// Sibling filename template. Accepts `[name]`, `[contenthash]`, `[hash]`.
    pub filename: String,
}
