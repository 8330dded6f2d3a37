//! Chunk partitioning.

use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::graph::{Module, ModuleGraph};

/// One output chunk: an ordered slice of the graph under a name.
pub struct Chunk<'a> {
    pub name: String,
    pub kind: ChunkKind,
    /// Members ordered dependencies-first.
    pub modules: Vec<&'a Module>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Entry,
    Shared,
}

/// Partition the graph into one chunk per entry plus, when `shared_name` is
/// configured and some module is reachable from more than one entry, a shared
/// chunk holding every such module. The shared chunk comes first so its
/// output file loads before any entry file.
pub fn partition<'a>(graph: &'a ModuleGraph, shared_name: Option<&str>) -> Vec<Chunk<'a>> {
    let reachable_sets: Vec<(String, FxHashSet<&Path>)> = graph
        .entries()
        .iter()
        .map(|(name, root)| (name.clone(), graph.reachable(root)))
        .collect();

    let mut counts: FxHashMap<&Path, usize> = FxHashMap::default();
    for (_, set) in &reachable_sets {
        for id in set {
            *counts.entry(id).or_insert(0) += 1;
        }
    }

    let shared: FxHashSet<&Path> = if shared_name.is_some() {
        counts
            .iter()
            .filter(|(_, count)| **count >= 2)
            .map(|(id, _)| *id)
            .collect()
    } else {
        FxHashSet::default()
    };

    let mut chunks = Vec::new();
    if let Some(name) = shared_name {
        if !shared.is_empty() {
            chunks.push(Chunk {
                name: name.to_owned(),
                kind: ChunkKind::Shared,
                modules: graph.sort_subgraph(&shared),
            });
        }
    }
    for (name, set) in &reachable_sets {
        let own: FxHashSet<&Path> = set.difference(&shared).copied().collect();
        chunks.push(Chunk {
            name: name.clone(),
            kind: ChunkKind::Entry,
            modules: graph.sort_subgraph(&own),
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Dependency;
    use std::path::PathBuf;

    fn graph_with_entries(
        specs: &[(&str, &[&str])],
        entries: &[(&str, &str)],
    ) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        for (id, _) in specs {
            graph.insert(crate::graph::Module::new(
                PathBuf::from(id),
                format!("// {id}"),
                false,
            ));
        }
        for (id, deps) in specs {
            for dep in *deps {
                graph.attach_dependency(
                    Path::new(id),
                    Dependency {
                        specifier: (*dep).to_owned(),
                        target: PathBuf::from(dep),
                    },
                );
            }
        }
        for (name, root) in entries {
            graph.add_entry((*name).to_owned(), PathBuf::from(root));
        }
        graph
    }

    fn names(chunk: &Chunk<'_>) -> Vec<String> {
        chunk
            .modules
            .iter()
            .map(|m| m.id().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_single_entry_has_no_shared_chunk() {
        let graph = graph_with_entries(
            &[("/a", &["/b"]), ("/b", &[])],
            &[("main", "/a")],
        );
        let chunks = partition(&graph, Some("shared"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "main");
        assert_eq!(chunks[0].kind, ChunkKind::Entry);
        assert_eq!(names(&chunks[0]), vec!["/b", "/a"]);
    }

    #[test]
    fn test_module_in_two_entries_moves_to_shared() {
        let graph = graph_with_entries(
            &[
                ("/one", &["/common"]),
                ("/two", &["/common"]),
                ("/common", &[]),
            ],
            &[("one", "/one"), ("two", "/two")],
        );
        let chunks = partition(&graph, Some("shared"));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].name, "shared");
        assert_eq!(chunks[0].kind, ChunkKind::Shared);
        assert_eq!(names(&chunks[0]), vec!["/common"]);
        assert_eq!(names(&chunks[1]), vec!["/one"]);
        assert_eq!(names(&chunks[2]), vec!["/two"]);
    }

    #[test]
    fn test_no_shared_name_keeps_duplicates_in_each_entry() {
        let graph = graph_with_entries(
            &[
                ("/one", &["/common"]),
                ("/two", &["/common"]),
                ("/common", &[]),
            ],
            &[("one", "/one"), ("two", "/two")],
        );
        let chunks = partition(&graph, None);
        assert_eq!(chunks.len(), 2);
        assert_eq!(names(&chunks[0]), vec!["/common", "/one"]);
        assert_eq!(names(&chunks[1]), vec!["/common", "/two"]);
    }
}
