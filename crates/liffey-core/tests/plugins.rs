//! Integration tests for the built-in plugins over whole builds.

use std::fs;
use std::path::Path;

use serde_json::json;

use liffey_core::{
    codes, BuildConfig, Compiler, CopyPattern, CopyPlugin, DefinePlugin, HtmlPlugin, IgnorePlugin,
    ProvidePlugin,
};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn chunk_text(output: &liffey_core::BuildOutput, name: &str) -> String {
    String::from_utf8(output.file(name).expect("chunk should be staged").to_vec()).unwrap()
}

#[test]
fn test_define_rewrites_tokens_in_every_module() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "import './lib';\nlog(__VERSION__);\n");
    write(root, "lib.js", "if (FLAGS.DEBUG) { trace(); }\n");

    let config = BuildConfig::new(root).entry("main", "./app");
    let mut compiler = Compiler::new(config);
    compiler.add_plugin(Box::new(
        DefinePlugin::new()
            .define("__VERSION__", json!("\"2.4.1\""))
            .define("FLAGS", json!({ "DEBUG": false })),
    ));
    let output = compiler.run().unwrap();

    let main = chunk_text(&output, "main.js");
    assert!(main.contains("log(\"2.4.1\");"));
    assert!(main.contains("if (false) { trace(); }"));
}

#[test]
fn test_provide_links_free_identifier_to_its_source() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "$('.nav').hide();\n");
    write(root, "node_modules/jq/index.js", "var $ = {};\n");

    let config = BuildConfig::new(root).entry("main", "./app");
    let mut compiler = Compiler::new(config);
    compiler.add_plugin(Box::new(ProvidePlugin::new().provide("$", "jq")));
    let output = compiler.run().unwrap();

    let main = chunk_text(&output, "main.js");
    let shim = main.find("var $ = {};").expect("shim body should be bundled");
    let user = main.find("$('.nav')").expect("app body should be bundled");
    assert!(shim < user, "provided module must precede its consumer");
}

#[test]
fn test_ignore_turns_matches_into_empty_leaves() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "import 'electron';\napp_runs();\n");

    let config = BuildConfig::new(root).entry("main", "./app");
    let mut compiler = Compiler::new(config);
    compiler.add_plugin(Box::new(IgnorePlugin::new("^electron$").unwrap()));
    let output = compiler.run().unwrap();

    assert!(chunk_text(&output, "main.js").contains("app_runs();"));
}

#[test]
fn test_copy_and_html_stage_assets_next_to_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "app();\n");
    write(root, "favicon.ico", "icon-bytes");

    let config = BuildConfig::new(root).entry("main", "./app");
    let mut compiler = Compiler::new(config);
    compiler.add_plugin(Box::new(
        CopyPlugin::new(vec![CopyPattern {
            from: "favicon.ico".to_owned(),
            to: None,
        }])
        .unwrap(),
    ));
    compiler.add_plugin(Box::new(HtmlPlugin::new()));
    let output = compiler.run().unwrap();

    assert_eq!(output.file("favicon.ico"), Some(b"icon-bytes".as_slice()));
    let page = String::from_utf8(output.file("index.html").unwrap().to_vec()).unwrap();
    assert!(page.contains("<script src=\"main.js\"></script>"));
    assert_eq!(
        fs::read_to_string(output.root().join("index.html")).unwrap(),
        page
    );
    assert_eq!(
        fs::read(output.root().join("favicon.ico")).unwrap(),
        b"icon-bytes"
    );
}

#[test]
fn test_html_references_hashed_chunk_names() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "app();\n");

    let mut config = BuildConfig::new(root).entry("main", "./app");
    config.output.filename = "[name].[contenthash].js".to_owned();
    let mut compiler = Compiler::new(config);
    compiler.add_plugin(Box::new(HtmlPlugin::new()));
    let output = compiler.run().unwrap();

    let chunk_name = output
        .files()
        .map(|(name, _)| name.to_owned())
        .find(|name| name.ends_with(".js"))
        .unwrap();
    let page = String::from_utf8(output.file("index.html").unwrap().to_vec()).unwrap();
    assert!(page.contains(&format!("<script src=\"{chunk_name}\"></script>")));
}

#[test]
fn test_failing_asset_hook_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "app.js", "app();\n");

    let config = BuildConfig::new(root).entry("main", "./app");
    let mut compiler = Compiler::new(config);
    compiler.add_plugin(Box::new(
        CopyPlugin::new(vec![CopyPattern {
            from: "does-not-exist.txt".to_owned(),
            to: None,
        }])
        .unwrap(),
    ));
    let err = compiler.run().unwrap_err();

    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].code, codes::HOOK_ERROR);
    assert!(
        !root.join("dist").exists(),
        "failed asset emission must leave the output directory untouched"
    );
}
