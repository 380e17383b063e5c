use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yamlscope_schema::{
    FetchError, SchemaFetcher, SchemaId, SchemaRegistry, SchemaStore, ValidationOptions,
    ValidationProblem, validate_stream,
};
use yamlscope_yaml::{ParseOptions, ProblemSeverity, parse_stream};

/// In-memory fetcher that counts requests per URI.
#[derive(Default)]
struct MemoryFetcher {
    files: HashMap<String, String>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    fn with(files: &[(&str, Value)]) -> Arc<Self> {
        Arc::new(Self {
            files: files
                .iter()
                .map(|(uri, content)| (uri.to_string(), content.to_string()))
                .collect(),
            calls: Mutex::default(),
        })
    }

    fn calls(&self, uri: &str) -> usize {
        self.calls.lock().unwrap().get(uri).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SchemaFetcher for MemoryFetcher {
    async fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        *self.calls.lock().unwrap().entry(uri.to_string()).or_default() += 1;
        tokio::task::yield_now().await;
        self.files
            .get(uri)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}

fn registry_with(fetcher: Option<Arc<MemoryFetcher>>) -> SchemaRegistry {
    let fetcher = fetcher.map(|f| f as Arc<dyn SchemaFetcher>);
    SchemaRegistry::new(Arc::new(SchemaStore::new(fetcher)))
}

async fn validate_resource(registry: &SchemaRegistry, resource: &str, text: &str) -> Vec<ValidationProblem> {
    let stream = parse_stream(text, &ParseOptions::default());
    let schema = registry
        .get_schema_for_resource(resource, stream.documents().first())
        .await
        .expect("a schema applies");
    validate_stream(&stream, &schema, ValidationOptions::default())
        .into_iter()
        .flatten()
        .collect()
}

#[tokio::test]
async fn test_resolution_is_idempotent_and_fetches_once() {
    let fetcher = MemoryFetcher::with(&[
        (
            "https://x.org/root.json",
            json!({"properties": {"item": {"$ref": "item.json"}}}),
        ),
        ("https://x.org/item.json", json!({"type": "string"})),
    ]);
    let store = SchemaStore::new(Some(fetcher.clone()));
    let id = SchemaId::new("https://x.org/root.json#");

    let first = store.get_resolved(&id).await;
    let second = store.get_resolved(&id).await;

    assert_eq!(first.to_value(), second.to_value());
    assert_eq!(first.to_value(), json!({"properties": {"item": {"type": "string"}}}));
    assert_eq!(fetcher.calls("https://x.org/root.json"), 1);
    assert_eq!(fetcher.calls("https://x.org/item.json"), 1);
}

#[tokio::test]
async fn test_self_referencing_definition_terminates() {
    let store = SchemaStore::new(None);
    let id = SchemaId::new("inmemory://cycle.json");
    store.register_schema(
        id.clone(),
        Some(json!({"definitions": {"A": {"$ref": "#/definitions/A"}}, "$ref": "#/definitions/A"})),
    );

    let resolved = tokio::time::timeout(Duration::from_secs(5), store.get_resolved(&id))
        .await
        .expect("resolution finishes");

    assert!(resolved.errors().is_empty());
    assert_eq!(resolved.to_value(), json!({"definitions": {"A": {}}}));
}

#[tokio::test]
async fn test_cross_document_cycle_terminates() {
    let fetcher = MemoryFetcher::with(&[
        ("https://x.org/a.json", json!({"$ref": "b.json", "title": "A"})),
        ("https://x.org/b.json", json!({"$ref": "c.json", "description": "B"})),
        ("https://x.org/c.json", json!({"$ref": "b.json", "type": "object"})),
    ]);
    let store = SchemaStore::new(Some(fetcher.clone()));

    let resolved = tokio::time::timeout(
        Duration::from_secs(5),
        store.get_resolved(&SchemaId::new("https://x.org/a.json")),
    )
    .await
    .expect("resolution finishes");

    assert_eq!(
        resolved.to_value(),
        json!({"title": "A", "description": "B", "type": "object"})
    );
    assert_eq!(fetcher.calls("https://x.org/b.json"), 1);
    assert_eq!(fetcher.calls("https://x.org/c.json"), 1);
}

#[tokio::test]
async fn test_relative_references_resolve_against_their_document() {
    let fetcher = MemoryFetcher::with(&[
        (
            "https://x.org/root.json",
            json!({"properties": {
                "a": {"$ref": "defs/a.json"},
                "b": {"$ref": "defs/a.json#/definitions/inner"}
            }}),
        ),
        (
            "https://x.org/defs/a.json",
            json!({
                "type": "object",
                "definitions": {"inner": {"$ref": "b.json"}},
                "properties": {"x": {"$ref": "#/definitions/inner"}}
            }),
        ),
        ("https://x.org/defs/b.json", json!({"type": "string"})),
    ]);
    let store = SchemaStore::new(Some(fetcher.clone()));
    let resolved = store.get_resolved(&SchemaId::new("https://x.org/root.json")).await;

    assert!(resolved.errors().is_empty(), "{:?}", resolved.errors());
    let tree = resolved.tree();
    let b = resolved.section(&["b"]).unwrap();
    let x = resolved.section(&["a", "x"]).unwrap();
    assert_eq!(tree.str_value(b, "type"), Some("string"));
    assert_eq!(tree.str_value(x, "type"), Some("string"));
    assert_eq!(fetcher.calls("https://x.org/defs/a.json"), 1);
    assert_eq!(fetcher.calls("https://x.org/defs/b.json"), 1);
    assert_eq!(
        resolved.dependencies(),
        [SchemaId::new("https://x.org/defs/a.json"), SchemaId::new("https://x.org/defs/b.json")]
    );
}

#[tokio::test]
async fn test_broken_reference_keeps_siblings() {
    let fetcher = MemoryFetcher::with(&[(
        "https://x.org/root.json",
        json!({"properties": {
            "gone": {"$ref": "missing.json"},
            "kept": {"type": "number"}
        }}),
    )]);
    let registry = registry_with(Some(fetcher));
    registry.register_external_schema("https://x.org/root.json", &["*.yaml".to_string()], None);

    let schema = registry.get_schema_for_resource("a.yaml", None).await.unwrap();
    assert_eq!(
        schema.errors(),
        ["Problems loading reference 'https://x.org/missing.json': Schema not found: https://x.org/missing.json"]
    );

    let found = validate_resource(&registry, "a.yaml", "gone: 1\nkept: no\n").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].message, "Incorrect type. Expected \"number\".");
}

#[tokio::test]
async fn test_matching_schemas_are_unioned_not_overridden() {
    let registry = registry_with(None);
    registry.register_external_schema(
        "P",
        &["*.yaml".to_string()],
        Some(json!({"properties": {"p1": {"enum": ["v1", "v2"]}}})),
    );
    registry.register_external_schema(
        "Q",
        &["x.yaml".to_string()],
        Some(json!({"properties": {"q1": {"enum": ["x1", "x2"]}}})),
    );

    assert!(validate_resource(&registry, "x.yaml", "p1: v1\nq1: x1\n").await.is_empty());

    let found = validate_resource(&registry, "x.yaml", "p1: v3\n").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].message, "Value is not accepted. Valid values: \"v1\", \"v2\".");
    assert_eq!((found[0].offset, found[0].length), (4, 2));
}

#[tokio::test]
async fn test_schema_sequence_aligns_documents() {
    let registry = registry_with(None);
    registry.register_external_schema(
        "seq",
        &["*.yaml".to_string()],
        Some(json!({"schemaSequence": [{"required": ["name"]}, {"required": ["age"]}]})),
    );

    assert!(
        validate_resource(&registry, "s.yaml", "---\nname: a\n---\nage: 1")
            .await
            .is_empty()
    );

    let found = validate_resource(&registry, "s.yaml", "---\nage: 1\n---\nname: a").await;
    let messages: Vec<&str> = found.iter().map(|p| p.message.as_str()).collect();
    assert_eq!(messages, vec!["Missing property \"name\".", "Missing property \"age\"."]);
}

#[tokio::test]
async fn test_incorrect_type_scenario() {
    let registry = registry_with(None);
    registry.register_external_schema(
        "S1",
        &["*.yaml".to_string()],
        Some(json!({"type": "object", "properties": {"p": {"type": "number"}}})),
    );

    let found = validate_resource(&registry, "a.yaml", "p: hello").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, ProblemSeverity::Error);
    assert_eq!(found[0].message, "Incorrect type. Expected \"number\".");
    assert_eq!(found[0].offset, 3);
}

#[tokio::test]
async fn test_resource_change_refetches() {
    let fetcher = MemoryFetcher::with(&[("https://x.org/s.json", json!({"type": "object"}))]);
    let registry = registry_with(Some(fetcher.clone()));
    registry.register_external_schema("https://x.org/s.json", &["*.yaml".to_string()], None);

    registry.get_schema_for_resource("a.yaml", None).await.unwrap();
    registry.get_schema_for_resource("b.yaml", None).await.unwrap();
    assert_eq!(fetcher.calls("https://x.org/s.json"), 1);

    assert!(registry.on_resource_changed("https://x.org/s.json#"));
    registry.get_schema_for_resource("a.yaml", None).await.unwrap();
    assert_eq!(fetcher.calls("https://x.org/s.json"), 2);
}
