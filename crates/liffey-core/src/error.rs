use std::path::PathBuf;
use thiserror::Error;

/// Failure to resolve one specifier to a file.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("cannot resolve '{specifier}' from '{}'", .from_dir.display())]
    NotFound {
        specifier: String,
        from_dir: PathBuf,
        /// Candidate paths probed, in trial order.
        tried: Vec<PathBuf>,
    },

    #[error("alias cycle: {}", .chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    #[error("package descriptor in '{}' has a structured '{field}' value", .dir.display())]
    AmbiguousMain { dir: PathBuf, field: String },

    #[error("io error during resolution: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of one stage in a module's transform chain.
#[derive(Error, Debug)]
#[error("transform '{stage}' failed for '{}': {cause}", .path.display())]
pub struct TransformError {
    pub stage: String,
    pub path: PathBuf,
    pub cause: String,
}

impl TransformError {
    #[must_use]
    pub fn new(
        stage: impl Into<String>,
        path: impl Into<PathBuf>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            path: path.into(),
            cause: cause.into(),
        }
    }
}

/// Malformed configuration, detected before any resolution starts.
#[derive(Error, Debug)]
pub enum RuleConfigError {
    #[error("invalid pattern '{pattern}': {message}")]
    BadPattern { pattern: String, message: String },

    #[error("empty '{kind}' combinator")]
    EmptyCombinator { kind: &'static str },

    #[error("rule references unknown transform '{0}'")]
    UnknownTransform(String),

    #[error("no entries configured")]
    NoEntries,

    #[error("duplicate entry name '{0}'")]
    DuplicateEntry(String),

    #[error("invalid template '{template}': unknown placeholder '[{placeholder}]'")]
    BadTemplate {
        template: String,
        placeholder: String,
    },

    #[error("template '{template}' needs [name] or [contenthash] with more than one chunk")]
    AmbiguousTemplate { template: String },

    #[error("invalid copy pattern '{pattern}': {message}")]
    BadCopyPattern { pattern: String, message: String },
}

/// One collected per-module failure. The build keeps traversing unrelated
/// subgraphs and reports every diagnostic at the end.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: &'static str,
    /// Path or specifier the failure is attached to.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(code: &'static str, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.code, self.message, self.subject)
    }
}

/// Diagnostic codes, one per failure tier.
pub mod codes {
    pub const RESOLVE_ERROR: &str = "RESOLVE_ERROR";
    pub const READ_ERROR: &str = "READ_ERROR";
    pub const TRANSFORM_ERROR: &str = "TRANSFORM_ERROR";
    pub const HOOK_ERROR: &str = "HOOK_ERROR";
}

/// Whole-build failure.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] RuleConfigError),

    #[error("build aborted with {} error(s)", .diagnostics.len())]
    Aborted { diagnostics: Vec<Diagnostic> },

    #[error("build timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Wrap a single diagnostic as an aborted build.
    #[must_use]
    pub fn aborted(diagnostic: Diagnostic) -> Self {
        Self::Aborted {
            diagnostics: vec![diagnostic],
        }
    }

    /// The collected diagnostics, if this is an aborted build.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Aborted { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}
