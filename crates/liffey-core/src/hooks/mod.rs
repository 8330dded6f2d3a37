//! Build hooks.
//!
//! Plugins observe and steer a build at fixed points: before and after each
//! resolution, after each module is parsed, once the graph is sealed, and
//! during asset emission. Every hook has a no-op default, so implementations
//! override only what they need. The bus dispatches in registration order.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::emit::{AssetSink, EmitManifest};
use crate::graph::ModuleGraph;

pub use self::builtin::{
    CopyPattern, CopyPlugin, DefinePlugin, HtmlPlugin, IgnorePlugin, ProvidePlugin,
};

mod builtin;

/// Failure raised by a plugin hook.
#[derive(Error, Debug)]
#[error("plugin '{plugin}' failed in {hook}: {message}")]
pub struct HookError {
    pub plugin: String,
    pub hook: &'static str,
    pub message: String,
}

impl HookError {
    #[must_use]
    pub fn new(plugin: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

/// Outcome of a pre-resolution hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreResolve {
    /// Keep the request as it is.
    Continue,
    /// Replace the specifier and keep resolving.
    Rewrite(String),
    /// Drop the request; it resolves to an empty placeholder module.
    Ignore,
}

/// A build plugin. Hooks run on the build's worker threads.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Compile-time constants substituted into every module body.
    fn constants(&self) -> Vec<(String, Value)> {
        Vec::new()
    }

    /// Runs before a request reaches the resolver.
    fn pre_resolve(&self, _specifier: &str, _from_dir: &Path) -> Result<PreResolve, HookError> {
        Ok(PreResolve::Continue)
    }

    /// Runs after a request resolved. Returning a path redirects the
    /// resolution; the replacement must be loadable as a module file.
    fn post_resolve(
        &self,
        _specifier: &str,
        _resolved: &Path,
    ) -> Result<Option<PathBuf>, HookError> {
        Ok(None)
    }

    /// Runs after a module's transform chain and dependency scan. Returned
    /// specifiers become additional requests of that module.
    fn module_parsed(&self, _id: &Path, _body: &str) -> Result<Vec<String>, HookError> {
        Ok(Vec::new())
    }

    /// Runs once the graph is complete and sealed.
    fn graph_sealed(&self, _graph: &ModuleGraph) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs during emission, after chunk files are staged. Extra files go
    /// through the sink.
    fn asset_emit(&self, _manifest: &EmitManifest, _sink: &mut AssetSink) -> Result<(), HookError> {
        Ok(())
    }
}

/// Ordered plugin collection.
#[derive(Default)]
pub struct HookBus {
    plugins: Vec<Box<dyn Plugin>>,
}

impl HookBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        tracing::debug!(plugin = plugin.name(), "plugin registered");
        self.plugins.push(plugin);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Constants from every plugin; later registrations override earlier
    /// ones when tokens collide.
    pub(crate) fn constants(&self) -> Vec<(String, Value)> {
        self.plugins
            .iter()
            .flat_map(|plugin| plugin.constants())
            .collect()
    }

    /// Chain the pre-resolution hooks. A rewrite feeds the rewritten
    /// specifier to later plugins; the first ignore wins outright.
    pub(crate) fn pre_resolve(
        &self,
        specifier: &str,
        from_dir: &Path,
    ) -> Result<PreResolve, HookError> {
        let mut current = specifier.to_owned();
        let mut rewritten = false;
        for plugin in &self.plugins {
            match plugin.pre_resolve(&current, from_dir)? {
                PreResolve::Continue => {}
                PreResolve::Rewrite(next) => {
                    current = next;
                    rewritten = true;
                }
                PreResolve::Ignore => return Ok(PreResolve::Ignore),
            }
        }
        Ok(if rewritten {
            PreResolve::Rewrite(current)
        } else {
            PreResolve::Continue
        })
    }

    /// Chain the post-resolution hooks; each redirect feeds the next plugin.
    pub(crate) fn post_resolve(
        &self,
        specifier: &str,
        resolved: &Path,
    ) -> Result<PathBuf, HookError> {
        let mut current = resolved.to_owned();
        for plugin in &self.plugins {
            if let Some(next) = plugin.post_resolve(specifier, &current)? {
                tracing::debug!(
                    plugin = plugin.name(),
                    from = %current.display(),
                    to = %next.display(),
                    "resolution redirected"
                );
                current = next;
            }
        }
        Ok(current)
    }

    pub(crate) fn module_parsed(&self, id: &Path, body: &str) -> Result<Vec<String>, HookError> {
        let mut extra = Vec::new();
        for plugin in &self.plugins {
            extra.extend(plugin.module_parsed(id, body)?);
        }
        Ok(extra)
    }

    pub(crate) fn graph_sealed(&self, graph: &ModuleGraph) -> Result<(), HookError> {
        for plugin in &self.plugins {
            plugin.graph_sealed(graph)?;
        }
        Ok(())
    }

    pub(crate) fn asset_emit(
        &self,
        manifest: &EmitManifest,
        sink: &mut AssetSink,
    ) -> Result<(), HookError> {
        for plugin in &self.plugins {
            plugin.asset_emit(manifest, sink)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Rewriter {
        from: &'static str,
        to: &'static str,
    }

    impl Plugin for Rewriter {
        fn name(&self) -> &str {
            "rewriter"
        }

        fn pre_resolve(&self, specifier: &str, _from_dir: &Path) -> Result<PreResolve, HookError> {
            if specifier == self.from {
                Ok(PreResolve::Rewrite(self.to.to_owned()))
            } else {
                Ok(PreResolve::Continue)
            }
        }
    }

    struct Dropper;

    impl Plugin for Dropper {
        fn name(&self) -> &str {
            "dropper"
        }

        fn pre_resolve(&self, _specifier: &str, _from_dir: &Path) -> Result<PreResolve, HookError> {
            Ok(PreResolve::Ignore)
        }
    }

    struct Injector(&'static str);

    impl Plugin for Injector {
        fn name(&self) -> &str {
            "injector"
        }

        fn module_parsed(&self, _id: &Path, _body: &str) -> Result<Vec<String>, HookError> {
            Ok(vec![self.0.to_owned()])
        }
    }

    struct Redirector {
        from: &'static str,
        to: &'static str,
    }

    impl Plugin for Redirector {
        fn name(&self) -> &str {
            "redirector"
        }

        fn post_resolve(
            &self,
            _specifier: &str,
            resolved: &Path,
        ) -> Result<Option<PathBuf>, HookError> {
            if resolved == Path::new(self.from) {
                Ok(Some(PathBuf::from(self.to)))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn test_rewrites_chain_through_later_plugins() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Rewriter { from: "a", to: "b" }));
        bus.register(Box::new(Rewriter { from: "b", to: "c" }));
        let outcome = bus.pre_resolve("a", Path::new("/")).unwrap();
        assert_eq!(outcome, PreResolve::Rewrite("c".to_owned()));
    }

    #[test]
    fn test_untouched_request_stays_continue() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Rewriter { from: "a", to: "b" }));
        let outcome = bus.pre_resolve("x", Path::new("/")).unwrap();
        assert_eq!(outcome, PreResolve::Continue);
    }

    #[test]
    fn test_ignore_short_circuits() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Dropper));
        bus.register(Box::new(Rewriter { from: "a", to: "b" }));
        let outcome = bus.pre_resolve("a", Path::new("/")).unwrap();
        assert_eq!(outcome, PreResolve::Ignore);
    }

    #[test]
    fn test_module_parsed_concatenates_in_registration_order() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Injector("./first")));
        bus.register(Box::new(Injector("./second")));
        let extra = bus.module_parsed(Path::new("/m.js"), "body").unwrap();
        assert_eq!(extra, vec!["./first", "./second"]);
    }

    #[test]
    fn test_redirects_chain_through_later_plugins() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Redirector {
            from: "/real/a.js",
            to: "/real/b.js",
        }));
        bus.register(Box::new(Redirector {
            from: "/real/b.js",
            to: "/real/c.js",
        }));
        let resolved = bus.post_resolve("./a", Path::new("/real/a.js")).unwrap();
        assert_eq!(resolved, PathBuf::from("/real/c.js"));
    }

    #[test]
    fn test_unredirected_path_passes_through() {
        let mut bus = HookBus::new();
        bus.register(Box::new(Redirector {
            from: "/real/a.js",
            to: "/real/b.js",
        }));
        let resolved = bus.post_resolve("./x", Path::new("/real/x.js")).unwrap();
        assert_eq!(resolved, PathBuf::from("/real/x.js"));
    }
}
