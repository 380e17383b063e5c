//! End-to-end tests for the CLI commands against files on disk.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use yamlscope::commands::{schema, validate};
use yamlscope::commands::validate::{FileReport, ValidateArgs};
use yamlscope::fetcher::file_uri;
use yamlscope_service::DiagnosticSeverity;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

fn args(schema: Option<&Path>, files: Vec<PathBuf>) -> ValidateArgs {
    ValidateArgs {
        schema: schema.map(|p| p.display().to_string()),
        files,
        ..ValidateArgs::default()
    }
}

fn messages(report: &FileReport) -> Vec<&str> {
    report.diagnostics.iter().map(|d| d.message.as_str()).collect()
}

#[tokio::test]
async fn test_validate_against_schema_file() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let schema = write(
        temp.path(),
        "schema.json",
        &json!({"type": "object", "properties": {"p": {"type": "number"}}}).to_string(),
    );
    let good = write(temp.path(), "good.yaml", "p: 1\n");
    let bad = write(temp.path(), "bad.yaml", "p: hello\n");

    let reports = validate::run(&args(Some(&schema), vec![good, bad.clone()]))
        .await
        .unwrap();

    assert!(reports[0].diagnostics.is_empty());
    assert!(!reports[0].has_errors());
    assert!(reports[1].has_errors());
    let line = validate::render_diagnostic(&bad, &reports[1].diagnostics[0]);
    assert_eq!(
        line,
        format!("{}:1:4: error: Incorrect type. Expected \"number\".", bad.display())
    );
}

#[tokio::test]
async fn test_relative_references_between_files() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let schema = write(
        temp.path(),
        "schema.json",
        &json!({"properties": {"size": {"$ref": "defs.json#/definitions/size"}}}).to_string(),
    );
    write(
        temp.path(),
        "defs.json",
        &json!({"definitions": {"size": {"enum": ["small", "large"]}}}).to_string(),
    );
    let data = write(temp.path(), "a.yaml", "size: medium\n");

    let reports = validate::run(&args(Some(&schema), vec![data])).await.unwrap();
    assert_eq!(
        messages(&reports[0]),
        vec!["Value is not accepted. Valid values: \"small\", \"large\"."]
    );
}

#[tokio::test]
async fn test_missing_schema_is_reported_once() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let missing = temp.path().join("missing.json");
    let data = write(temp.path(), "a.yaml", "a: 1\n");

    let reports = validate::run(&args(Some(&missing), vec![data])).await.unwrap();
    let diagnostics = &reports[0].diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Error);
    assert_eq!(
        diagnostics[0].message,
        format!("Schema not found: {}", file_uri(&missing).unwrap())
    );
}

#[tokio::test]
async fn test_settings_file_associations() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let settings = write(
        temp.path(),
        "settings.json",
        &json!({
            "schemas": [{
                "uri": "inline://people",
                "fileMatch": ["*.people.yaml"],
                "schema": {"items": {"required": ["name"]}}
            }]
        })
        .to_string(),
    );
    let people = write(temp.path(), "team.people.yaml", "- name: a\n- age: 3\n");
    let other = write(temp.path(), "other.yaml", "- age: 3\n");

    let reports = validate::run(&ValidateArgs {
        settings: Some(settings),
        files: vec![people, other],
        ..ValidateArgs::default()
    })
    .await
    .unwrap();

    assert_eq!(messages(&reports[0]), vec!["Missing property \"name\"."]);
    assert_eq!(reports[0].diagnostics[0].range.start.line, 1);
    assert!(reports[1].diagnostics.is_empty());
}

#[tokio::test]
async fn test_syntax_errors_are_reported() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let data = write(temp.path(), "broken.yaml", "a: [1, 2\n");

    let reports = validate::run(&args(None, vec![data])).await.unwrap();
    assert_eq!(reports[0].diagnostics.len(), 1);
    assert_eq!(reports[0].diagnostics[0].severity, DiagnosticSeverity::Error);
}

#[tokio::test]
async fn test_schema_command_resolves_references() {
    let temp = TempDir::new().expect("Failed to create temp directory");
    let schema = write(
        temp.path(),
        "schema.json",
        &json!({
            "definitions": {"name": {"type": "string"}},
            "properties": {"name": {"$ref": "#/definitions/name"}, "other": {"$ref": "gone.json"}}
        })
        .to_string(),
    );

    let (resolved, errors) = schema::resolve(&schema.display().to_string()).await.unwrap();
    assert_eq!(resolved["properties"]["name"], json!({"type": "string"}));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Problems loading reference"));
}
