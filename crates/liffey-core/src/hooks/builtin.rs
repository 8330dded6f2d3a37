//! Built-in plugins.

use std::path::{Path, PathBuf};

use regex_lite::Regex;
use serde_json::Value;

use crate::emit::{AssetSink, EmitManifest};
use crate::error::RuleConfigError;
use crate::transform::contains_token;

use super::{HookError, Plugin, PreResolve};

/// Substitutes configured tokens with constant code fragments in every
/// module body.
#[derive(Debug, Default)]
pub struct DefinePlugin {
    definitions: Vec<(String, Value)>,
}

impl DefinePlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one definition. String values are inserted verbatim as code,
    /// objects expand to one token per nested key, and anything else is
    /// inserted as its JSON text.
    #[must_use]
    pub fn define(mut self, token: impl Into<String>, value: impl Into<Value>) -> Self {
        self.definitions.push((token.into(), value.into()));
        self
    }
}

impl Plugin for DefinePlugin {
    fn name(&self) -> &str {
        "define"
    }

    fn constants(&self) -> Vec<(String, Value)> {
        self.definitions.clone()
    }
}

/// Injects a dependency on a source module into every module that references
/// the configured token as a free identifier.
#[derive(Debug, Default)]
pub struct ProvidePlugin {
    provided: Vec<(String, String)>,
}

impl ProvidePlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn provide(mut self, token: impl Into<String>, source: impl Into<String>) -> Self {
        self.provided.push((token.into(), source.into()));
        self
    }
}

impl Plugin for ProvidePlugin {
    fn name(&self) -> &str {
        "provide"
    }

    fn module_parsed(&self, _id: &Path, body: &str) -> Result<Vec<String>, HookError> {
        Ok(self
            .provided
            .iter()
            .filter(|(token, _)| contains_token(body, token))
            .map(|(_, source)| source.clone())
            .collect())
    }
}

/// Turns matching requests into empty placeholder modules.
#[derive(Debug)]
pub struct IgnorePlugin {
    resource: Regex,
    context: Option<Regex>,
}

impl IgnorePlugin {
    /// Ignore every request whose specifier matches `resource`.
    pub fn new(resource: &str) -> Result<Self, RuleConfigError> {
        Ok(Self {
            resource: compile_pattern(resource)?,
            context: None,
        })
    }

    /// Additionally require the request's origin directory to match
    /// `context`.
    pub fn with_context(resource: &str, context: &str) -> Result<Self, RuleConfigError> {
        Ok(Self {
            resource: compile_pattern(resource)?,
            context: Some(compile_pattern(context)?),
        })
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, RuleConfigError> {
    Regex::new(pattern).map_err(|err| RuleConfigError::BadPattern {
        pattern: pattern.to_owned(),
        message: err.to_string(),
    })
}

impl Plugin for IgnorePlugin {
    fn name(&self) -> &str {
        "ignore"
    }

    fn pre_resolve(&self, specifier: &str, from_dir: &Path) -> Result<PreResolve, HookError> {
        let context_ok = self
            .context
            .as_ref()
            .map_or(true, |context| context.is_match(&from_dir.to_string_lossy()));
        if context_ok && self.resource.is_match(specifier) {
            Ok(PreResolve::Ignore)
        } else {
            Ok(PreResolve::Continue)
        }
    }
}

/// One copy instruction: a file, a directory, or a glob under the context,
/// staged under the output root.
#[derive(Debug, Clone)]
pub struct CopyPattern {
    pub from: String,
    /// Destination directory under the output root. Files keep their own
    /// names either way; directory copies keep their relative structure.
    pub to: Option<String>,
}

/// Stages verbatim copies of context files into the output.
#[derive(Debug)]
pub struct CopyPlugin {
    patterns: Vec<CopyPattern>,
}

impl CopyPlugin {
    /// Glob patterns are validated eagerly.
    pub fn new(patterns: Vec<CopyPattern>) -> Result<Self, RuleConfigError> {
        for pattern in &patterns {
            if is_glob(&pattern.from) {
                glob::Pattern::new(&pattern.from).map_err(|err| {
                    RuleConfigError::BadCopyPattern {
                        pattern: pattern.from.clone(),
                        message: err.to_string(),
                    }
                })?;
            }
        }
        Ok(Self { patterns })
    }
}

/// Expand one pattern into `(source path, output-relative name)` pairs.
fn expand(context: &Path, pattern: &CopyPattern) -> Result<Vec<(PathBuf, String)>, HookError> {
    let absolute = context.join(&pattern.from);
    if is_glob(&pattern.from) {
        let matches = glob::glob(&absolute.to_string_lossy())
            .map_err(|err| copy_error(err.to_string()))?;
        let mut sources = Vec::new();
        for entry in matches {
            let path = entry.map_err(|err| copy_error(err.to_string()))?;
            if path.is_file() {
                let name = file_name_of(&path, &pattern.from);
                sources.push((path, name));
            }
        }
        return Ok(sources);
    }
    if absolute.is_dir() {
        let mut sources = Vec::new();
        for entry in walkdir::WalkDir::new(&absolute).sort_by_file_name() {
            let entry = entry.map_err(|err| copy_error(err.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&absolute).unwrap_or(entry.path());
            sources.push((entry.path().to_owned(), relative_name(rel)));
        }
        return Ok(sources);
    }
    let name = file_name_of(&absolute, &pattern.from);
    Ok(vec![(absolute, name)])
}

fn is_glob(from: &str) -> bool {
    from.contains(['*', '?', '['])
}

fn copy_error(message: impl Into<String>) -> HookError {
    HookError::new("copy", "asset_emit", message)
}

fn relative_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn file_name_of(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map_or_else(|| fallback.to_owned(), |n| n.to_string_lossy().into_owned())
}

impl Plugin for CopyPlugin {
    fn name(&self) -> &str {
        "copy"
    }

    fn asset_emit(&self, manifest: &EmitManifest, sink: &mut AssetSink) -> Result<(), HookError> {
        for pattern in &self.patterns {
            let sources = expand(manifest.context(), pattern)?;
            if sources.is_empty() {
                tracing::warn!(from = %pattern.from, "copy pattern matched nothing");
            }
            for (source, name) in sources {
                let bytes = std::fs::read(&source).map_err(|err| {
                    copy_error(format!("cannot read '{}': {err}", source.display()))
                })?;
                let dest = match &pattern.to {
                    Some(dir) => format!("{}/{name}", dir.trim_end_matches('/')),
                    None => name,
                };
                sink.stage(&dest, bytes).map_err(|err| copy_error(err.to_string()))?;
            }
        }
        Ok(())
    }
}

const DEFAULT_PAGE: &str =
    "<!doctype html>\n<html>\n<head>\n</head>\n<body>\n</body>\n</html>\n";

/// Emits an HTML page that loads every script and stylesheet the build
/// produced.
#[derive(Debug)]
pub struct HtmlPlugin {
    filename: String,
    template: Option<String>,
}

impl HtmlPlugin {
    #[must_use]
    pub fn new() -> Self {
        Self {
            filename: "index.html".to_owned(),
            template: None,
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Render into a template file from the context instead of the built-in
    /// page.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

impl Default for HtmlPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for HtmlPlugin {
    fn name(&self) -> &str {
        "html"
    }

    fn asset_emit(&self, manifest: &EmitManifest, sink: &mut AssetSink) -> Result<(), HookError> {
        let page = match &self.template {
            Some(rel) => {
                let path = manifest.context().join(rel);
                liffey_util::fs::read_to_string_lossy(&path).map_err(|err| {
                    HookError::new(
                        "html",
                        "asset_emit",
                        format!("cannot read template '{}': {err}", path.display()),
                    )
                })?
            }
            None => DEFAULT_PAGE.to_owned(),
        };

        let links: String = manifest
            .styles()
            .iter()
            .map(|href| format!("<link rel=\"stylesheet\" href=\"{href}\">\n"))
            .collect();
        let scripts: String = manifest
            .scripts()
            .iter()
            .map(|src| format!("<script src=\"{src}\"></script>\n"))
            .collect();

        let page = inject_before(&page, "</head>", &links);
        let page = inject_before(&page, "</body>", &scripts);
        sink.stage(&self.filename, page.into_bytes())
            .map_err(|err| HookError::new("html", "asset_emit", err.to_string()))
    }
}

/// Insert `content` just before the first occurrence of `marker`, appending
/// when the marker is missing.
fn inject_before(page: &str, marker: &str, content: &str) -> String {
    if content.is_empty() {
        return page.to_owned();
    }
    match page.find(marker) {
        Some(pos) => format!("{}{}{}", &page[..pos], content, &page[pos..]),
        None => format!("{page}{content}"),
    }
}
