//! Integration tests for chunk partitioning, templates, and output staging.

use std::fs;
use std::path::Path;

use liffey_core::{BuildConfig, Compiler, ConditionSpec, ExtractRule};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn chunk_text(output: &liffey_core::BuildOutput, name: &str) -> String {
    String::from_utf8(output.file(name).expect("chunk should be staged").to_vec()).unwrap()
}

fn two_entry_fixture(root: &Path) {
    write(root, "one.js", "import './common';\none();\n");
    write(root, "two.js", "import './common';\ntwo();\n");
    write(root, "common.js", "common_body();\n");
}

#[test]
fn test_shared_chunk_collects_cross_entry_modules() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    two_entry_fixture(root);

    let config = BuildConfig::new(root)
        .entry("one", "./one")
        .entry("two", "./two");
    let output = Compiler::new(config).run().unwrap();

    let names: Vec<&str> = output.files().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["shared.js", "one.js", "two.js"]);
    assert!(chunk_text(&output, "shared.js").contains("common_body();"));
    assert!(!chunk_text(&output, "one.js").contains("common_body();"));
    assert!(!chunk_text(&output, "two.js").contains("common_body();"));
}

#[test]
fn test_disabled_shared_chunk_duplicates_common_modules() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    two_entry_fixture(root);

    let mut config = BuildConfig::new(root)
        .entry("one", "./one")
        .entry("two", "./two");
    config.output.shared_chunk = None;
    let output = Compiler::new(config).run().unwrap();

    let names: Vec<&str> = output.files().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["one.js", "two.js"]);
    assert!(chunk_text(&output, "one.js").contains("common_body();"));
    assert!(chunk_text(&output, "two.js").contains("common_body();"));
}

#[test]
fn test_extraction_routes_stylesheet_bodies() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "import './theme.css';\napp();\n");
    write(root, "theme.css", ".nav { color: red }\n");

    let mut config = BuildConfig::new(root).entry("main", "./app");
    config.output.extract = vec![ExtractRule {
        condition: ConditionSpec::Test(r"\.css$".to_owned()),
        filename: "[name].css".to_owned(),
    }];
    let output = Compiler::new(config).run().unwrap();

    let main = chunk_text(&output, "main.js");
    assert!(main.contains("app();"));
    assert!(!main.contains(".nav"));
    assert!(chunk_text(&output, "main.css").contains(".nav { color: red }"));
    assert_eq!(
        fs::read_to_string(output.root().join("main.css")).unwrap(),
        chunk_text(&output, "main.css")
    );
}

#[test]
fn test_failed_build_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "import './ok';\nimport './broken';\n");
    write(root, "ok.js", "ok();\n");
    write(root, "broken.js", "import './gone';\n");

    let config = BuildConfig::new(root).entry("main", "./app");
    let err = Compiler::new(config).run().unwrap_err();

    assert_eq!(err.diagnostics().len(), 1);
    assert!(
        !root.join("dist").exists(),
        "aborted build must not create the output directory"
    );
}

#[test]
fn test_content_hash_changes_with_module_content() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "before();\n");

    let mut config = BuildConfig::new(root).entry("main", "./app");
    config.output.filename = "[name].[contenthash].js".to_owned();

    let first = Compiler::new(config.clone()).run().unwrap();
    let first_name = first.files().map(|(name, _)| name.to_owned()).next().unwrap();

    write(root, "app.js", "after();\n");
    let second = Compiler::new(config).run().unwrap();
    let second_name = second.files().map(|(name, _)| name.to_owned()).next().unwrap();

    assert!(first_name.starts_with("main."));
    assert!(first_name.ends_with(".js"));
    assert_ne!(first_name, second_name);
}

#[test]
fn test_unchanged_content_keeps_hashed_names_stable() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "stable();\n");

    let mut config = BuildConfig::new(root).entry("main", "./app");
    config.output.filename = "[name].[contenthash].js".to_owned();

    let first = Compiler::new(config.clone()).run().unwrap();
    let second = Compiler::new(config).run().unwrap();
    let first_names: Vec<String> = first.files().map(|(name, _)| name.to_owned()).collect();
    let second_names: Vec<String> = second.files().map(|(name, _)| name.to_owned()).collect();
    assert_eq!(first_names, second_names);
}
