//! Build orchestration.
//!
//! A [`Compiler`] owns one immutable configuration plus the host-registered
//! transforms and plugins, and drives a build from validation through graph
//! construction to the staged output. Configuration problems surface before
//! any file is read; per-module failures are collected as diagnostics and
//! only abort the build once traversal has finished.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::build::GraphBuilder;
use crate::config::BuildConfig;
use crate::emit::{self, AssetSink, BuildOutput, ExtractSet};
use crate::error::{codes, BuildError, Diagnostic};
use crate::hooks::{HookBus, HookError, Plugin};
use crate::resolver::Resolver;
use crate::rules::RuleSet;
use crate::transform::{Pipeline, SubstitutionTable, Transform, TransformRegistry};

pub struct Compiler {
    config: BuildConfig,
    registry: TransformRegistry,
    hooks: HookBus,
}

impl Compiler {
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            registry: TransformRegistry::new(),
            hooks: HookBus::new(),
        }
    }

    /// Register a content transform under the name rule chains reference.
    pub fn add_transform(&mut self, transform: Box<dyn Transform>) -> &mut Self {
        self.registry.register(transform);
        self
    }

    /// Register a plugin. Hooks fire in registration order.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) -> &mut Self {
        self.hooks.register(plugin);
        self
    }

    /// Run the whole build. Output files are staged in memory and written
    /// together at the end, so a failing build leaves the output directory
    /// untouched.
    ///
    /// # Errors
    /// `Config` for a malformed configuration, `Aborted` carrying every
    /// collected diagnostic, `Timeout` past the configured deadline, and
    /// `Io` if writing the staged files fails.
    pub fn run(&self) -> Result<BuildOutput, BuildError> {
        let started = Instant::now();

        self.config.validate()?;
        let rules = RuleSet::compile(
            &self.config.rules,
            &self.config.no_parse,
            &self.config.context,
            &self.registry,
        )?;
        let extract = ExtractSet::compile(&self.config.output.extract, &self.config.context)?;
        emit::validate_template(&self.config.output.filename)?;
        emit::validate_root_template(&self.config.output.path)?;

        let context = crate::paths::canonical(&self.config.context);

        let mut substitutions = SubstitutionTable::new();
        for (token, value) in self.hooks.constants() {
            substitutions.insert_value(&token, &value);
        }
        let pipeline = Pipeline::new(&self.registry, substitutions);
        let resolver = Resolver::new(self.config.resolve.clone());

        let builder = GraphBuilder {
            resolver: &resolver,
            rules: &rules,
            pipeline: &pipeline,
            hooks: &self.hooks,
            context: &context,
            bail: self.config.bail,
            started,
            deadline: self
                .config
                .timeout_ms
                .map(|ms| started + Duration::from_millis(ms)),
        };
        let outcome = builder.run(&self.config.entries)?;
        if !outcome.diagnostics.is_empty() {
            return Err(BuildError::Aborted {
                diagnostics: outcome.diagnostics,
            });
        }
        tracing::debug!(modules = outcome.graph.len(), "module graph sealed");
        self.hooks
            .graph_sealed(&outcome.graph)
            .map_err(hook_abort)?;

        let assembly = emit::assemble(&outcome.graph, &context, &self.config.output, &extract);

        let reserved = assembly
            .staged
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        let mut sink = AssetSink::new(reserved);
        self.hooks
            .asset_emit(&assembly.manifest, &mut sink)
            .map_err(hook_abort)?;

        let root_spec = self.config.output.path.replace("[hash]", &assembly.build_hash);
        let root = context.join(Path::new(&root_spec));

        let mut files = assembly.staged;
        files.extend(sink.into_files());
        let output = BuildOutput::new(root, files, assembly.build_hash);
        output.write()?;
        tracing::debug!(
            files = output.files().count(),
            elapsed = ?started.elapsed(),
            "build written"
        );
        Ok(output)
    }
}

fn hook_abort(err: HookError) -> BuildError {
    let message = err.to_string();
    BuildError::aborted(Diagnostic::new(codes::HOOK_ERROR, err.plugin, message))
}
