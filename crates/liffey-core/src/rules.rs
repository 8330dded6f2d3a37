//! Declarative file conditions and transform rules.
//!
//! Conditions arrive as serde-level [`ConditionSpec`] trees and are compiled
//! once, eagerly, into [`Condition`] values with validated patterns and
//! context-absolute directory roots. Matching is pure.

use std::path::{Path, PathBuf};

use regex_lite::Regex;

use crate::config::{ConditionSpec, RuleSpec};
use crate::error::RuleConfigError;
use crate::paths::normalize;
use crate::transform::TransformRegistry;

/// Compiled file condition.
#[derive(Debug)]
pub enum Condition {
    /// Regex over the path's final component.
    Test(Regex),
    /// Path sits under any listed directory.
    Include(Vec<PathBuf>),
    /// Path sits under none of the listed directories.
    Exclude(Vec<PathBuf>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Compile a declarative condition. Include/exclude roots are joined to
    /// `context` when relative.
    ///
    /// # Errors
    /// Returns `RuleConfigError` for an invalid regex or an empty combinator.
    pub fn compile(spec: &ConditionSpec, context: &Path) -> Result<Self, RuleConfigError> {
        match spec {
            ConditionSpec::Test(pattern) => {
                let regex = Regex::new(pattern).map_err(|e| RuleConfigError::BadPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Ok(Self::Test(regex))
            }
            ConditionSpec::Include(roots) => {
                Ok(Self::Include(absolutize_roots(roots, context)))
            }
            ConditionSpec::Exclude(roots) => {
                Ok(Self::Exclude(absolutize_roots(roots, context)))
            }
            ConditionSpec::And(parts) => {
                if parts.is_empty() {
                    return Err(RuleConfigError::EmptyCombinator { kind: "and" });
                }
                Ok(Self::And(compile_all(parts, context)?))
            }
            ConditionSpec::Or(parts) => {
                if parts.is_empty() {
                    return Err(RuleConfigError::EmptyCombinator { kind: "or" });
                }
                Ok(Self::Or(compile_all(parts, context)?))
            }
            ConditionSpec::Not(inner) => {
                Ok(Self::Not(Box::new(Self::compile(inner, context)?)))
            }
        }
    }

    /// Pure match against an absolute module path.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Test(regex) => path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| regex.is_match(name)),
            Self::Include(roots) => roots.iter().any(|root| path.starts_with(root)),
            Self::Exclude(roots) => !roots.iter().any(|root| path.starts_with(root)),
            Self::And(parts) => parts.iter().all(|part| part.matches(path)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(path)),
            Self::Not(inner) => !inner.matches(path),
        }
    }
}

fn compile_all(specs: &[ConditionSpec], context: &Path) -> Result<Vec<Condition>, RuleConfigError> {
    specs.iter().map(|s| Condition::compile(s, context)).collect()
}

fn absolutize_roots(roots: &[PathBuf], context: &Path) -> Vec<PathBuf> {
    roots
        .iter()
        .map(|root| {
            if root.is_absolute() {
                normalize(root)
            } else {
                normalize(&context.join(root))
            }
        })
        .collect()
}

/// One compiled rule.
#[derive(Debug)]
pub struct Rule {
    pub condition: Condition,
    /// Transform registry names, applied in order.
    pub transforms: Vec<String>,
}

/// All compiled rules plus the dependency-discovery bypass conditions.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    no_parse: Vec<Condition>,
}

impl RuleSet {
    /// Compile rule specs, validating patterns, combinators, and transform
    /// references against the registry.
    ///
    /// # Errors
    /// Returns the first configuration violation found.
    pub fn compile(
        rules: &[RuleSpec],
        no_parse: &[ConditionSpec],
        context: &Path,
        registry: &TransformRegistry,
    ) -> Result<Self, RuleConfigError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for spec in rules {
            for name in &spec.transforms {
                if !registry.contains(name) {
                    return Err(RuleConfigError::UnknownTransform(name.clone()));
                }
            }
            compiled.push(Rule {
                condition: Condition::compile(&spec.condition, context)?,
                transforms: spec.transforms.clone(),
            });
        }
        let no_parse = no_parse
            .iter()
            .map(|spec| Condition::compile(spec, context))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rules: compiled,
            no_parse,
        })
    }

    /// Concatenated transform chains of every rule matching `path`, in
    /// declared rule order.
    #[must_use]
    pub fn chain_for(&self, path: &Path) -> Vec<&str> {
        let mut chain = Vec::new();
        for rule in &self.rules {
            if rule.condition.matches(path) {
                chain.extend(rule.transforms.iter().map(String::as_str));
            }
        }
        chain
    }

    /// Whether `path` matches any dependency-discovery bypass condition.
    #[must_use]
    pub fn is_no_parse(&self, path: &Path) -> bool {
        self.no_parse.iter().any(|cond| cond.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(spec: &ConditionSpec) -> Condition {
        Condition::compile(spec, Path::new("/proj")).unwrap()
    }

    #[test]
    fn test_test_matches_final_component() {
        let cond = compile(&ConditionSpec::Test(r"\.css$".to_string()));
        assert!(cond.matches(Path::new("/proj/src/style.css")));
        assert!(!cond.matches(Path::new("/proj/src/app.js")));
        // Only the final component is consulted
        assert!(!cond.matches(Path::new("/proj/style.css.d/app.js")));
    }

    #[test]
    fn test_include_joins_relative_roots_to_context() {
        let cond = compile(&ConditionSpec::Include(vec![PathBuf::from("src")]));
        assert!(cond.matches(Path::new("/proj/src/app.js")));
        assert!(!cond.matches(Path::new("/proj/lib/app.js")));
    }

    #[test]
    fn test_exclude_is_true_outside_all_roots() {
        let cond = compile(&ConditionSpec::Exclude(vec![PathBuf::from(
            "node_modules",
        )]));
        assert!(cond.matches(Path::new("/proj/src/app.js")));
        assert!(!cond.matches(Path::new("/proj/node_modules/dep/index.js")));
    }

    #[test]
    fn test_combinators() {
        let cond = compile(&ConditionSpec::And(vec![
            ConditionSpec::Test(r"\.js$".to_string()),
            ConditionSpec::Not(Box::new(ConditionSpec::Include(vec![PathBuf::from(
                "node_modules",
            )]))),
        ]));
        assert!(cond.matches(Path::new("/proj/src/app.js")));
        assert!(!cond.matches(Path::new("/proj/node_modules/dep/index.js")));
        assert!(!cond.matches(Path::new("/proj/src/style.css")));
    }

    #[test]
    fn test_empty_combinator_is_rejected() {
        let err = Condition::compile(&ConditionSpec::Or(vec![]), Path::new("/proj"));
        assert!(matches!(
            err,
            Err(RuleConfigError::EmptyCombinator { kind: "or" })
        ));
    }

    #[test]
    fn test_bad_pattern_is_rejected() {
        let err = Condition::compile(
            &ConditionSpec::Test("[unclosed".to_string()),
            Path::new("/proj"),
        );
        assert!(matches!(err, Err(RuleConfigError::BadPattern { .. })));
    }

    #[test]
    fn test_normalize_folds_dots() {
        assert_eq!(
            normalize(Path::new("/proj/src/../lib/./x")),
            PathBuf::from("/proj/lib/x")
        );
    }

    #[test]
    fn test_chain_for_concatenates_matching_rules_in_order() {
        let registry = crate::transform::TransformRegistry::with_passthrough(&[
            "script", "narrow", "styles",
        ]);
        let rules = vec![
            RuleSpec {
                condition: ConditionSpec::Test(r"\.js$".to_string()),
                transforms: vec!["script".to_string()],
            },
            RuleSpec {
                condition: ConditionSpec::Include(vec![PathBuf::from("src")]),
                transforms: vec!["narrow".to_string()],
            },
            RuleSpec {
                condition: ConditionSpec::Test(r"\.css$".to_string()),
                transforms: vec!["styles".to_string()],
            },
        ];
        let set = RuleSet::compile(&rules, &[], Path::new("/proj"), &registry).unwrap();

        assert_eq!(
            set.chain_for(Path::new("/proj/src/app.js")),
            vec!["script", "narrow"]
        );
        assert_eq!(set.chain_for(Path::new("/proj/lib/app.js")), vec!["script"]);
        assert_eq!(
            set.chain_for(Path::new("/proj/src/style.css")),
            vec!["narrow", "styles"]
        );
    }

    #[test]
    fn test_unknown_transform_is_rejected() {
        let registry = crate::transform::TransformRegistry::default();
        let rules = vec![RuleSpec {
            condition: ConditionSpec::Test(r"\.js$".to_string()),
            transforms: vec!["missing".to_string()],
        }];
        let err = RuleSet::compile(&rules, &[], Path::new("/proj"), &registry);
        assert!(matches!(
            err,
            Err(RuleConfigError::UnknownTransform(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_no_parse() {
        let registry = crate::transform::TransformRegistry::default();
        let set = RuleSet::compile(
            &[],
            &[ConditionSpec::Test("jquery|lodash".to_string())],
            Path::new("/proj"),
            &registry,
        )
        .unwrap();
        assert!(set.is_no_parse(Path::new("/proj/lib/jquery.js")));
        assert!(!set.is_no_parse(Path::new("/proj/src/app.js")));
    }
}
