//! Sealed module graph produced by a build.
//!
//! Modules are stored in discovery order. Mutation is crate-internal and
//! happens only while the builder runs; once the graph is handed out it is
//! only ever read.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

/// A resolved edge out of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The request as written in the module body or injected by a hook.
    pub specifier: String,
    /// Identity of the module the request resolved to.
    pub target: PathBuf,
}

/// A fully transformed module.
#[derive(Debug)]
pub struct Module {
    id: PathBuf,
    body: String,
    no_parse: bool,
    dependencies: Vec<Dependency>,
}

impl Module {
    pub(crate) fn new(id: PathBuf, body: String, no_parse: bool) -> Self {
        Self {
            id,
            body,
            no_parse,
            dependencies: Vec::new(),
        }
    }

    /// Canonical identity of this module.
    #[must_use]
    pub fn id(&self) -> &Path {
        &self.id
    }

    /// Final body after the transform chain and substitutions.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Outgoing edges in scan order.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// True when the body was admitted verbatim, with no transform chain and
    /// no dependency scan.
    #[must_use]
    pub fn no_parse(&self) -> bool {
        self.no_parse
    }

    /// True for placeholder modules that do not exist on disk, such as the
    /// empty module an ignored request resolves to.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.id.to_string_lossy().starts_with('\0')
    }
}

/// The complete dependency graph of one build.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    by_id: FxHashMap<PathBuf, usize>,
    entries: Vec<(String, PathBuf)>,
}

impl ModuleGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, module: Module) {
        debug_assert!(
            !self.by_id.contains_key(&module.id),
            "module inserted twice: {}",
            module.id.display()
        );
        self.by_id.insert(module.id.clone(), self.modules.len());
        self.modules.push(module);
    }

    pub(crate) fn add_entry(&mut self, name: String, id: PathBuf) {
        self.entries.push((name, id));
    }

    pub(crate) fn attach_dependency(&mut self, from: &Path, dep: Dependency) {
        if let Some(&idx) = self.by_id.get(from) {
            self.modules[idx].dependencies.push(dep);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &Path) -> bool {
        self.by_id.contains_key(id)
    }

    #[must_use]
    pub fn module(&self, id: &Path) -> Option<&Module> {
        self.by_id.get(id).map(|&idx| &self.modules[idx])
    }

    /// Entry names and their root module identities, in configuration order.
    #[must_use]
    pub fn entries(&self) -> &[(String, PathBuf)] {
        &self.entries
    }

    /// All modules in discovery order.
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter()
    }

    /// Position of a module in discovery order.
    #[must_use]
    pub fn discovery_index(&self, id: &Path) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// All module identities reachable from `root`, including `root` itself.
    #[must_use]
    pub fn reachable<'a>(&'a self, root: &Path) -> FxHashSet<&'a Path> {
        let mut seen: FxHashSet<&Path> = FxHashSet::default();
        let mut stack = Vec::new();
        if let Some(&idx) = self.by_id.get(root) {
            stack.push(idx);
        }
        while let Some(idx) = stack.pop() {
            let module = &self.modules[idx];
            if !seen.insert(module.id.as_path()) {
                continue;
            }
            for dep in &module.dependencies {
                if let Some(&next) = self.by_id.get(&dep.target) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// Order the given members dependencies-first, breaking ties by discovery
    /// index. Edges leaving the member set are ignored. Cycles are broken by
    /// forcing the earliest-discovered unordered member and resuming.
    #[must_use]
    pub fn sort_subgraph<'a>(&'a self, members: &FxHashSet<&Path>) -> Vec<&'a Module> {
        let member_indices: Vec<usize> = self
            .modules
            .iter()
            .enumerate()
            .filter(|(_, m)| members.contains(m.id.as_path()))
            .map(|(idx, _)| idx)
            .collect();
        let in_set: FxHashSet<usize> = member_indices.iter().copied().collect();

        let mut pending: FxHashMap<usize, usize> = FxHashMap::default();
        let mut parents: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for &idx in &member_indices {
            let mut dep_indices: FxHashSet<usize> = FxHashSet::default();
            for dep in &self.modules[idx].dependencies {
                if let Some(&target) = self.by_id.get(&dep.target) {
                    if target != idx && in_set.contains(&target) {
                        dep_indices.insert(target);
                    }
                }
            }
            pending.insert(idx, dep_indices.len());
            for target in dep_indices {
                parents.entry(target).or_default().push(idx);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = member_indices
            .iter()
            .filter(|idx| pending[idx] == 0)
            .map(|&idx| Reverse(idx))
            .collect();
        let mut done: FxHashSet<usize> = FxHashSet::default();
        let mut out: Vec<&Module> = Vec::with_capacity(member_indices.len());

        loop {
            while let Some(Reverse(idx)) = ready.pop() {
                if !done.insert(idx) {
                    continue;
                }
                out.push(&self.modules[idx]);
                if let Some(dependents) = parents.get(&idx) {
                    for &parent in dependents {
                        if done.contains(&parent) {
                            continue;
                        }
                        if let Some(count) = pending.get_mut(&parent) {
                            *count -= 1;
                            if *count == 0 {
                                ready.push(Reverse(parent));
                            }
                        }
                    }
                }
            }
            if out.len() == member_indices.len() {
                break;
            }
            match member_indices.iter().copied().find(|idx| !done.contains(idx)) {
                Some(idx) => ready.push(Reverse(idx)),
                None => break,
            }
        }

        out
    }
}
