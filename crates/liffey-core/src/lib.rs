#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]

pub mod compiler;
pub mod config;
pub mod emit;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod resolver;
pub mod rules;
pub mod transform;

mod build;
mod paths;

pub use compiler::Compiler;
pub use config::{
    Alias, BuildConfig, ConditionSpec, Entry, ExtractRule, OutputOptions, ResolveOptions, RuleSpec,
};
pub use emit::{AssetError, AssetSink, BuildOutput, EmitManifest};
pub use error::{
    codes, BuildError, Diagnostic, ResolveError, RuleConfigError, TransformError,
};
pub use graph::{Dependency, Module, ModuleGraph};
pub use hooks::{
    CopyPattern, CopyPlugin, DefinePlugin, HookBus, HookError, HtmlPlugin, IgnorePlugin, Plugin,
    PreResolve, ProvidePlugin,
};
pub use resolver::Resolver;
pub use transform::{
    scan_dependencies, Pipeline, PipelineOutput, SubstitutionTable, Transform, TransformOutput,
    TransformRegistry,
};
