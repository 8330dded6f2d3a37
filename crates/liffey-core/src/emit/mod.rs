//! Output emission.
//!
//! Chunk bodies, extraction files, and hook-contributed assets are all staged
//! in memory first; nothing touches the output directory until the whole
//! build has succeeded and [`BuildOutput::write`] runs.

use std::io;
use std::path::{Component, Path, PathBuf};

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::config::{ExtractRule, OutputOptions};
use crate::error::RuleConfigError;
use crate::graph::ModuleGraph;
use crate::rules::Condition;

pub use self::chunks::{partition, Chunk, ChunkKind};

mod chunks;

/// Validate a chunk or extraction filename template. `[name]`,
/// `[contenthash]`, and `[hash]` are the recognized placeholders.
pub(crate) fn validate_template(template: &str) -> Result<(), RuleConfigError> {
    check_placeholders(template, &["name", "contenthash", "hash"])
}

/// Validate the output root template. Only `[hash]` makes sense before any
/// chunk exists.
pub(crate) fn validate_root_template(template: &str) -> Result<(), RuleConfigError> {
    check_placeholders(template, &["hash"])
}

fn check_placeholders(template: &str, allowed: &[&str]) -> Result<(), RuleConfigError> {
    let mut rest = template;
    while let Some(open) = rest.find('[') {
        let tail = &rest[open + 1..];
        let Some(close) = tail.find(']') else {
            return Err(RuleConfigError::BadTemplate {
                template: template.to_owned(),
                placeholder: tail.to_owned(),
            });
        };
        let placeholder = &tail[..close];
        if !allowed.contains(&placeholder) {
            return Err(RuleConfigError::BadTemplate {
                template: template.to_owned(),
                placeholder: placeholder.to_owned(),
            });
        }
        rest = &tail[close + 1..];
    }
    Ok(())
}

pub(crate) fn render_template(
    template: &str,
    name: &str,
    content_hash: &str,
    build_hash: &str,
) -> String {
    template
        .replace("[name]", name)
        .replace("[contenthash]", content_hash)
        .replace("[hash]", build_hash)
}

/// Extraction rules compiled against the build context. A module whose
/// identity matches a rule has its body routed into that rule's file instead
/// of the chunk's script file.
pub(crate) struct ExtractSet {
    rules: Vec<(Condition, String)>,
}

impl ExtractSet {
    pub(crate) fn compile(rules: &[ExtractRule], context: &Path) -> Result<Self, RuleConfigError> {
        let mut compiled = Vec::new();
        for rule in rules {
            validate_template(&rule.filename)?;
            compiled.push((
                Condition::compile(&rule.condition, context)?,
                rule.filename.clone(),
            ));
        }
        Ok(Self { rules: compiled })
    }

    fn len(&self) -> usize {
        self.rules.len()
    }

    fn template(&self, idx: usize) -> &str {
        &self.rules[idx].1
    }

    /// First matching rule wins.
    fn matching_rule(&self, path: &Path) -> Option<usize> {
        self.rules
            .iter()
            .position(|(condition, _)| condition.matches(path))
    }
}

/// Inventory of the chunk files one build emitted, in load order. Asset
/// hooks read this to reference the output by name.
#[derive(Debug, Clone)]
pub struct EmitManifest {
    context: PathBuf,
    scripts: Vec<String>,
    styles: Vec<String>,
    extras: Vec<String>,
}

impl EmitManifest {
    pub(crate) fn new(context: PathBuf) -> Self {
        Self {
            context,
            scripts: Vec::new(),
            styles: Vec::new(),
            extras: Vec::new(),
        }
    }

    pub(crate) fn push_script(&mut self, name: String) {
        self.scripts.push(name);
    }

    pub(crate) fn push_style(&mut self, name: String) {
        self.styles.push(name);
    }

    pub(crate) fn push_extra(&mut self, name: String) {
        self.extras.push(name);
    }

    /// Directory the build's relative input paths resolve against.
    #[must_use]
    pub fn context(&self) -> &Path {
        &self.context
    }

    /// Script chunk files, shared chunk first.
    #[must_use]
    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Extracted stylesheet files.
    #[must_use]
    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    /// Extracted files that are neither scripts nor stylesheets.
    #[must_use]
    pub fn extras(&self) -> &[String] {
        &self.extras
    }
}

pub(crate) struct Assembly {
    pub staged: Vec<(String, Vec<u8>)>,
    pub manifest: EmitManifest,
    pub build_hash: String,
}

/// Assemble every chunk and extraction file into staged bytes plus the
/// manifest describing them. Bodies within a file are joined with single
/// newlines in dependencies-first order.
pub(crate) fn assemble(
    graph: &ModuleGraph,
    context: &Path,
    output: &OutputOptions,
    extract: &ExtractSet,
) -> Assembly {
    let build_hash = {
        let mut all = Vec::new();
        for module in graph.modules() {
            all.extend_from_slice(module.id().to_string_lossy().as_bytes());
            all.push(0);
            all.extend_from_slice(module.body().as_bytes());
            all.push(0);
        }
        liffey_util::hash::short_hash(&all)
    };

    let mut staged: Vec<(String, Vec<u8>)> = Vec::new();
    let mut manifest = EmitManifest::new(context.to_owned());

    for chunk in chunks::partition(graph, output.shared_chunk.as_deref()) {
        let mut script_parts: Vec<&str> = Vec::new();
        let mut extracted: Vec<Vec<&str>> = vec![Vec::new(); extract.len()];
        for module in &chunk.modules {
            match extract.matching_rule(module.id()) {
                Some(idx) => extracted[idx].push(module.body()),
                None => script_parts.push(module.body()),
            }
        }

        let body = script_parts.join("\n");
        let content_hash = liffey_util::hash::short_hash(body.as_bytes());
        let filename = render_template(&output.filename, &chunk.name, &content_hash, &build_hash);
        manifest.push_script(filename.clone());
        staged.push((filename, body.into_bytes()));

        for (idx, parts) in extracted.iter().enumerate() {
            if parts.is_empty() {
                continue;
            }
            let body = parts.join("\n");
            let content_hash = liffey_util::hash::short_hash(body.as_bytes());
            let filename =
                render_template(extract.template(idx), &chunk.name, &content_hash, &build_hash);
            if filename.ends_with(".css") {
                manifest.push_style(filename.clone());
            } else {
                manifest.push_extra(filename.clone());
            }
            staged.push((filename, body.into_bytes()));
        }
    }

    Assembly {
        staged,
        manifest,
        build_hash,
    }
}

/// Why an asset could not be staged.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("asset '{0}' is already staged")]
    Duplicate(String),

    #[error("asset path '{0}' escapes the output directory")]
    Escapes(String),
}

/// Staging area asset hooks write extra files into. Names are relative to
/// the output root and must not collide with chunk files or one another.
pub struct AssetSink {
    reserved: FxHashSet<String>,
    files: Vec<(String, Vec<u8>)>,
}

impl AssetSink {
    pub(crate) fn new(reserved: FxHashSet<String>) -> Self {
        Self {
            reserved,
            files: Vec::new(),
        }
    }

    /// Stage one file at `name` under the output root.
    pub fn stage(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), AssetError> {
        let clean = name.trim_start_matches('/');
        let escapes = clean.is_empty()
            || Path::new(clean)
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            return Err(AssetError::Escapes(name.to_owned()));
        }
        if !self.reserved.insert(clean.to_owned()) {
            return Err(AssetError::Duplicate(clean.to_owned()));
        }
        self.files.push((clean.to_owned(), bytes));
        Ok(())
    }

    pub(crate) fn into_files(self) -> Vec<(String, Vec<u8>)> {
        self.files
    }
}

/// Everything a successful build produced, staged in memory.
#[derive(Debug)]
pub struct BuildOutput {
    root: PathBuf,
    files: Vec<(String, Vec<u8>)>,
    build_hash: String,
}

impl BuildOutput {
    pub(crate) fn new(root: PathBuf, files: Vec<(String, Vec<u8>)>, build_hash: String) -> Self {
        Self {
            root,
            files,
            build_hash,
        }
    }

    /// Absolute output directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build-wide hash rendered into `[hash]` placeholders.
    #[must_use]
    pub fn build_hash(&self) -> &str {
        &self.build_hash
    }

    /// Staged files as `(relative path, bytes)` pairs in emission order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    /// Bytes of one staged file.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(staged, _)| staged == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Write every staged file under the output root.
    pub fn write(&self) -> io::Result<()> {
        for (name, bytes) in &self.files {
            let dest = self.root.join(name);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            liffey_util::fs::atomic_write(&dest, bytes)?;
        }
        Ok(())
    }
}
