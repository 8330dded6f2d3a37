//! Specifier resolution.
//!
//! A specifier goes through the alias table first, is then classified as
//! relative, absolute, or bare, and finally probed against the filesystem:
//! exact file, configured extensions in order, then directory resolution via
//! the package descriptor's main fields and the configured main files. Bare
//! specifiers try every search root, walking relative roots up from the
//! origin directory. Successful resolutions are memoized per
//! `(specifier, origin directory)` pair.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::ResolveOptions;
use crate::error::ResolveError;
use crate::paths::{append_extension, canonical, normalize};

use self::package::{MainField, PackageDescriptor};

mod package;

/// Shared, cache-backed resolver for one build.
#[derive(Debug)]
pub struct Resolver {
    options: ResolveOptions,
    cache: RwLock<FxHashMap<(String, PathBuf), PathBuf>>,
    descriptors: RwLock<FxHashMap<PathBuf, Option<PackageDescriptor>>>,
}

impl Resolver {
    #[must_use]
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            cache: RwLock::new(FxHashMap::default()),
            descriptors: RwLock::new(FxHashMap::default()),
        }
    }

    /// Resolve `specifier` as requested from `from_dir` to a canonical file
    /// path.
    pub fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, ResolveError> {
        let key = (specifier.to_owned(), from_dir.to_owned());
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }
        let resolved = self.resolve_uncached(specifier, from_dir)?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, resolved.clone());
        }
        Ok(resolved)
    }

    fn resolve_uncached(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, ResolveError> {
        let expanded = self.apply_aliases(specifier)?;
        let mut tried = Vec::new();
        let mut seen_dirs = FxHashSet::default();

        let outcome = if is_relative(&expanded) {
            self.probe_candidate(&normalize(&from_dir.join(&expanded)), &mut tried, &mut seen_dirs)?
        } else if Path::new(&expanded).is_absolute() {
            self.probe_candidate(&normalize(Path::new(&expanded)), &mut tried, &mut seen_dirs)?
        } else {
            self.resolve_bare(&expanded, from_dir, &mut tried, &mut seen_dirs)?
        };

        outcome.ok_or_else(|| ResolveError::NotFound {
            specifier: specifier.to_owned(),
            from_dir: from_dir.to_owned(),
            tried,
        })
    }

    /// Expand aliases until none applies. Revisiting an alias key means the
    /// table loops.
    fn apply_aliases(&self, specifier: &str) -> Result<String, ResolveError> {
        let mut current = specifier.to_owned();
        let mut chain: Vec<String> = Vec::new();
        loop {
            let Some((key, rewritten)) = self.alias_step(&current) else {
                return Ok(current);
            };
            if chain.iter().any(|applied| applied == &key) {
                chain.push(key);
                return Err(ResolveError::AliasCycle { chain });
            }
            chain.push(key);
            current = rewritten;
        }
    }

    /// One alias rewrite: an exact (`$`-suffixed) match wins over prefix
    /// matches, and the longest prefix wins among those.
    fn alias_step(&self, specifier: &str) -> Option<(String, String)> {
        for alias in &self.options.alias {
            if let Some(exact) = alias.find.strip_suffix('$') {
                if specifier == exact {
                    return Some((alias.find.clone(), alias.target.clone()));
                }
            }
        }
        let mut best: Option<(&str, &str)> = None;
        for alias in &self.options.alias {
            if alias.find.ends_with('$') {
                continue;
            }
            let matches = specifier == alias.find
                || (specifier.len() > alias.find.len()
                    && specifier.starts_with(&alias.find)
                    && specifier.as_bytes()[alias.find.len()] == b'/');
            if matches && best.map_or(true, |(found, _)| alias.find.len() > found.len()) {
                best = Some((&alias.find, &alias.target));
            }
        }
        best.map(|(find, target)| {
            let rest = &specifier[find.len()..];
            (find.to_owned(), format!("{target}{rest}"))
        })
    }

    fn resolve_bare(
        &self,
        specifier: &str,
        from_dir: &Path,
        tried: &mut Vec<PathBuf>,
        seen_dirs: &mut FxHashSet<PathBuf>,
    ) -> Result<Option<PathBuf>, ResolveError> {
        for root in &self.options.modules {
            if root.is_absolute() {
                if let Some(found) =
                    self.probe_candidate(&root.join(specifier), tried, seen_dirs)?
                {
                    return Ok(Some(found));
                }
                continue;
            }
            let mut dir = Some(from_dir);
            while let Some(current) = dir {
                let search = current.join(root);
                if search.is_dir() {
                    if let Some(found) =
                        self.probe_candidate(&search.join(specifier), tried, seen_dirs)?
                    {
                        return Ok(Some(found));
                    }
                }
                dir = current.parent();
            }
        }
        Ok(None)
    }

    /// Probe one candidate path: exact file, then each extension appended in
    /// order, then directory resolution.
    fn probe_candidate(
        &self,
        candidate: &Path,
        tried: &mut Vec<PathBuf>,
        seen_dirs: &mut FxHashSet<PathBuf>,
    ) -> Result<Option<PathBuf>, ResolveError> {
        if candidate.is_file() {
            return Ok(Some(canonical(candidate)));
        }
        tried.push(candidate.to_owned());
        for ext in &self.options.extensions {
            let with_ext = append_extension(candidate, ext);
            if with_ext.is_file() {
                return Ok(Some(canonical(&with_ext)));
            }
            tried.push(with_ext);
        }
        if candidate.is_dir() {
            return self.resolve_directory(candidate, tried, seen_dirs);
        }
        Ok(None)
    }

    /// Resolve a directory via its descriptor's main fields, falling back to
    /// the configured main files.
    fn resolve_directory(
        &self,
        dir: &Path,
        tried: &mut Vec<PathBuf>,
        seen_dirs: &mut FxHashSet<PathBuf>,
    ) -> Result<Option<PathBuf>, ResolveError> {
        if !seen_dirs.insert(dir.to_owned()) {
            // Descriptor target led back here; let the caller fall back.
            return Ok(None);
        }
        if let Some(descriptor) = self.descriptor_for(dir)? {
            for field in &self.options.main_fields {
                match descriptor.main_field(field) {
                    Some(MainField::Target(target)) => {
                        let candidate = normalize(&dir.join(&target));
                        if let Some(found) =
                            self.probe_candidate(&candidate, tried, seen_dirs)?
                        {
                            return Ok(Some(found));
                        }
                        // First populated field decides; a dangling target
                        // falls through to the main files, not later fields.
                        break;
                    }
                    Some(MainField::Structured) => {
                        return Err(ResolveError::AmbiguousMain {
                            dir: dir.to_owned(),
                            field: field.clone(),
                        });
                    }
                    None => {}
                }
            }
        }
        for name in &self.options.main_files {
            let base = dir.join(name);
            if base.is_file() {
                return Ok(Some(canonical(&base)));
            }
            tried.push(base.clone());
            for ext in &self.options.extensions {
                let with_ext = append_extension(&base, ext);
                if with_ext.is_file() {
                    return Ok(Some(canonical(&with_ext)));
                }
                tried.push(with_ext);
            }
        }
        Ok(None)
    }

    fn descriptor_for(&self, dir: &Path) -> Result<Option<PackageDescriptor>, ResolveError> {
        if let Ok(cache) = self.descriptors.read() {
            if let Some(hit) = cache.get(dir) {
                return Ok(hit.clone());
            }
        }
        let loaded = PackageDescriptor::load(dir)?;
        if let Ok(mut cache) = self.descriptors.write() {
            cache.insert(dir.to_owned(), loaded.clone());
        }
        Ok(loaded)
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}
