//! Wave-parallel graph construction.
//!
//! The builder keeps a worklist of resolution requests. Each wave resolves
//! and transforms its requests in parallel, then merges the results
//! sequentially in request order, so discovery order never depends on thread
//! scheduling. A module is claimed by the first worker that reaches it;
//! later requests for the same module only add edges.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::Entry;
use crate::error::{codes, BuildError, Diagnostic};
use crate::graph::{Dependency, Module, ModuleGraph};
use crate::hooks::{HookBus, PreResolve};
use crate::resolver::Resolver;
use crate::rules::RuleSet;
use crate::transform::Pipeline;

pub(crate) struct GraphBuilder<'a> {
    pub resolver: &'a Resolver,
    pub rules: &'a RuleSet,
    pub pipeline: &'a Pipeline<'a>,
    pub hooks: &'a HookBus,
    pub context: &'a Path,
    pub bail: bool,
    pub started: Instant,
    pub deadline: Option<Instant>,
}

#[derive(Debug)]
pub(crate) struct BuildOutcome {
    pub graph: ModuleGraph,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
struct PendingRequest {
    specifier: String,
    from_dir: PathBuf,
    /// Module waiting on this request; entry roots have none.
    origin: Option<PathBuf>,
    /// Entry name, for the roots of the build.
    entry: Option<String>,
    /// Injected by a hook rather than scanned from a body.
    synthetic: bool,
}

struct ChildRequest {
    specifier: String,
    synthetic: bool,
}

struct Payload {
    body: String,
    no_parse: bool,
    children: Vec<ChildRequest>,
}

enum Outcome {
    Resolved {
        request: PendingRequest,
        id: PathBuf,
        /// Present when this request claimed the module and transformed it.
        payload: Option<Payload>,
    },
    Failed {
        request: PendingRequest,
        diagnostic: Diagnostic,
    },
    Deadline,
}

impl GraphBuilder<'_> {
    pub(crate) fn run(&self, entries: &[Entry]) -> Result<BuildOutcome, BuildError> {
        let mut graph = ModuleGraph::new();
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let claims: Mutex<FxHashSet<PathBuf>> = Mutex::new(FxHashSet::default());

        let mut wave: Vec<PendingRequest> = entries
            .iter()
            .map(|entry| PendingRequest {
                specifier: entry.specifier.clone(),
                from_dir: self.context.to_owned(),
                origin: None,
                entry: Some(entry.name.clone()),
                synthetic: false,
            })
            .collect();

        let mut wave_index = 0usize;
        while !wave.is_empty() {
            if self.past_deadline() {
                return Err(self.timeout());
            }
            tracing::debug!(wave = wave_index, requests = wave.len(), "resolving wave");

            let items: Vec<Outcome> = wave
                .into_par_iter()
                .map(|request| self.process(request, &claims))
                .collect();

            let mut payloads: FxHashMap<PathBuf, Payload> = FxHashMap::default();
            let mut refs: Vec<(PendingRequest, PathBuf)> = Vec::new();
            let mut timed_out = false;
            for item in items {
                match item {
                    Outcome::Resolved {
                        request,
                        id,
                        payload,
                    } => {
                        if let Some(payload) = payload {
                            payloads.insert(id.clone(), payload);
                        }
                        refs.push((request, id));
                    }
                    Outcome::Failed {
                        request,
                        diagnostic,
                    } => {
                        tracing::warn!(
                            specifier = %request.specifier,
                            %diagnostic,
                            "request failed"
                        );
                        diagnostics.push(diagnostic);
                    }
                    Outcome::Deadline => timed_out = true,
                }
            }
            if timed_out {
                return Err(self.timeout());
            }

            let mut next: Vec<PendingRequest> = Vec::new();
            for (request, id) in refs {
                if !graph.contains(&id) {
                    if let Some(payload) = payloads.remove(&id) {
                        let from_dir = id
                            .parent()
                            .map_or_else(|| self.context.to_owned(), Path::to_path_buf);
                        graph.insert(Module::new(id.clone(), payload.body, payload.no_parse));
                        for child in payload.children {
                            next.push(PendingRequest {
                                specifier: child.specifier,
                                from_dir: from_dir.clone(),
                                origin: Some(id.clone()),
                                entry: None,
                                synthetic: child.synthetic,
                            });
                        }
                    }
                }
                match (request.origin, request.entry) {
                    (Some(origin), _) => {
                        // A hook-injected request landing back on its own
                        // module would only add a degenerate self edge.
                        if !(request.synthetic && origin == id) {
                            graph.attach_dependency(
                                &origin,
                                Dependency {
                                    specifier: request.specifier,
                                    target: id,
                                },
                            );
                        }
                    }
                    (None, Some(name)) => graph.add_entry(name, id),
                    (None, None) => {}
                }
            }

            if self.bail && !diagnostics.is_empty() {
                tracing::debug!("stopping traversal after first failing wave");
                break;
            }
            wave = next;
            wave_index += 1;
        }

        Ok(BuildOutcome { graph, diagnostics })
    }

    fn process(&self, request: PendingRequest, claims: &Mutex<FxHashSet<PathBuf>>) -> Outcome {
        if self.past_deadline() {
            return Outcome::Deadline;
        }

        let mut specifier = request.specifier.clone();
        match self.hooks.pre_resolve(&specifier, &request.from_dir) {
            Ok(PreResolve::Continue) => {}
            Ok(PreResolve::Rewrite(next)) => {
                tracing::debug!(from = %specifier, to = %next, "request rewritten");
                specifier = next;
            }
            Ok(PreResolve::Ignore) => {
                let id = PathBuf::from(format!("\u{0}ignored:{}", request.specifier));
                let payload = self.claim(claims, &id).then(|| Payload {
                    body: String::new(),
                    no_parse: true,
                    children: Vec::new(),
                });
                return Outcome::Resolved {
                    request,
                    id,
                    payload,
                };
            }
            Err(err) => {
                return Outcome::Failed {
                    diagnostic: Diagnostic::new(
                        codes::HOOK_ERROR,
                        request.specifier.clone(),
                        err.to_string(),
                    ),
                    request,
                }
            }
        }

        let id = match self.resolver.resolve(&specifier, &request.from_dir) {
            Ok(path) => path,
            Err(err) => {
                return Outcome::Failed {
                    diagnostic: Diagnostic::new(codes::RESOLVE_ERROR, specifier, err.to_string()),
                    request,
                }
            }
        };

        let id = match self.hooks.post_resolve(&specifier, &id) {
            Ok(path) => path,
            Err(err) => {
                return Outcome::Failed {
                    diagnostic: Diagnostic::new(codes::HOOK_ERROR, specifier, err.to_string()),
                    request,
                }
            }
        };

        if !self.claim(claims, &id) {
            return Outcome::Resolved {
                request,
                id,
                payload: None,
            };
        }

        match self.load_and_transform(&id) {
            Ok(payload) => Outcome::Resolved {
                request,
                id,
                payload: Some(payload),
            },
            Err(diagnostic) => Outcome::Failed {
                request,
                diagnostic,
            },
        }
    }

    fn load_and_transform(&self, id: &Path) -> Result<Payload, Diagnostic> {
        let source = liffey_util::fs::read_to_string_lossy(id).map_err(|err| {
            Diagnostic::new(codes::READ_ERROR, id.to_string_lossy(), err.to_string())
        })?;

        let chain = self.rules.chain_for(id);
        let no_parse = self.rules.is_no_parse(id);
        let output = self.pipeline.run(id, &source, &chain, no_parse).map_err(|err| {
            Diagnostic::new(codes::TRANSFORM_ERROR, id.to_string_lossy(), err.to_string())
        })?;

        let mut children: Vec<ChildRequest> = output
            .dependencies
            .into_iter()
            .map(|specifier| ChildRequest {
                specifier,
                synthetic: false,
            })
            .collect();
        if !no_parse {
            let injected = self.hooks.module_parsed(id, &output.body).map_err(|err| {
                Diagnostic::new(codes::HOOK_ERROR, id.to_string_lossy(), err.to_string())
            })?;
            let mut seen: FxHashSet<String> = children
                .iter()
                .map(|child| child.specifier.clone())
                .collect();
            for specifier in injected {
                if seen.insert(specifier.clone()) {
                    children.push(ChildRequest {
                        specifier,
                        synthetic: true,
                    });
                }
            }
        }

        Ok(Payload {
            body: output.body,
            no_parse,
            children,
        })
    }

    fn claim(&self, claims: &Mutex<FxHashSet<PathBuf>>, id: &Path) -> bool {
        match claims.lock() {
            Ok(mut set) => set.insert(id.to_owned()),
            Err(_) => false,
        }
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    fn timeout(&self) -> BuildError {
        BuildError::Timeout {
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}
