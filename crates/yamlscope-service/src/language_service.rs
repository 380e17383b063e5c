//! The YAML language service: validation, hover, completion and the
//! document outline for one configured schema registry.

use crate::document::Document;
use crate::error::{Result, ServiceError};
use crate::settings::LanguageSettings;
use crate::types::{
    CompletionItem, CompletionItemKind, Diagnostic, DiagnosticSeverity, DocumentSymbol, Hover,
    Position, Range, SymbolKind,
};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use yamlscope_schema::{
    NodeId, SchemaFetcher, SchemaRegistry, SchemaStore, SchemaTree,
    ValidationProblem, matching_schemas, validate_stream,
};
use yamlscope_yaml::{
    DocumentStream, NodeKind, ParsedDocument, Problem, YamlNode, parse_stream,
};

/// Validation, hover and completion over a [`SchemaRegistry`].
///
/// Every entry point other than [`LanguageService::configure`] fails with
/// [`ServiceError::NotConfigured`] until settings have been supplied.
#[derive(Debug)]
pub struct LanguageService {
    registry: SchemaRegistry,
    settings: RwLock<Option<Arc<LanguageSettings>>>,
}

impl LanguageService {
    /// Create a service fetching external schemas through `fetcher`.
    /// Without a fetcher every external schema fails to load.
    pub fn new(fetcher: Option<Arc<dyn SchemaFetcher>>) -> Self {
        Self::with_store(Arc::new(SchemaStore::new(fetcher)))
    }

    pub fn with_store(store: Arc<SchemaStore>) -> Self {
        Self {
            registry: SchemaRegistry::new(store),
            settings: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Apply new settings: forget every registered schema, then register
    /// the `schemas` entries.
    pub fn configure(&self, settings: LanguageSettings) {
        self.registry.clear_all();
        for entry in &settings.schemas {
            self.registry
                .register_external_schema(&entry.uri, &entry.file_match, entry.schema.clone());
        }
        info!(
            schemas = settings.schemas.len(),
            kubernetes = settings.is_kubernetes,
            "language service configured"
        );
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(settings));
    }

    pub fn settings(&self) -> Result<Arc<LanguageSettings>> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ServiceError::NotConfigured)
    }

    /// Drop cached schemas derived from `uri`. Returns whether it was known.
    pub fn reset_schema(&self, uri: &str) -> bool {
        self.registry.on_resource_changed(uri)
    }

    /// Diagnostics for every document of the buffer.
    ///
    /// Per document, parse errors and every schema violation form the first
    /// pass and are reported as errors; parser warnings such as unresolved
    /// tags follow as warnings. Schema loading problems come first as
    /// zero-width errors at the start of the buffer. Entries with the same
    /// range and message are reported once.
    pub async fn do_validation(&self, document: &Document) -> Result<Vec<Diagnostic>> {
        let settings = self.settings()?;
        if !settings.validate {
            return Ok(Vec::new());
        }

        let stream = parse_stream(document.content(), &settings.parse_options());
        let schema = self
            .registry
            .get_schema_for_resource(document.uri(), stream.documents().first())
            .await;

        let mut diagnostics = Vec::new();
        let mut seen: HashSet<(usize, usize, String)> = HashSet::new();

        let mut problems = Vec::new();
        if let Some(schema) = &schema {
            for error in schema.errors() {
                if seen.insert((0, 0, error.clone())) {
                    diagnostics.push(
                        Diagnostic::new(Range::point(Position::default()), DiagnosticSeverity::Error, error)
                            .with_code("schema"),
                    );
                }
            }
            problems = validate_stream(&stream, schema, settings.validation_options());
        }

        for (index, parsed) in stream.iter().enumerate() {
            let (first, second) = split_passes(parsed, problems.get(index).map(Vec::as_slice));
            let boundary = first.len();
            for (position, finding) in first.into_iter().chain(second).enumerate() {
                if !seen.insert((finding.offset, finding.length, finding.message.clone())) {
                    continue;
                }
                let severity = if position >= boundary {
                    DiagnosticSeverity::Warning
                } else {
                    DiagnosticSeverity::Error
                };
                let mut diagnostic = Diagnostic::new(
                    document.range(finding.offset, finding.length),
                    severity,
                    finding.message,
                );
                if let Some(code) = finding.code {
                    diagnostic = diagnostic.with_code(code);
                }
                diagnostics.push(diagnostic);
            }
        }

        debug!(
            uri = document.uri(),
            version = document.version(),
            count = diagnostics.len(),
            "validated document"
        );
        Ok(diagnostics)
    }

    /// Markdown description of the node at `position`.
    pub async fn do_hover(&self, document: &Document, position: Position) -> Result<Option<Hover>> {
        let settings = self.settings()?;
        if !settings.hover {
            return Ok(None);
        }

        let offset = document.offset_at(position);
        let stream = parse_stream(document.content(), &settings.parse_options());
        let Some((index, parsed)) = stream.document_at_offset(offset) else {
            return Ok(None);
        };
        let Some(root) = parsed.root() else {
            return Ok(None);
        };
        let Some(hovered) = parsed.node_at_offset(offset) else {
            return Ok(None);
        };
        let info = hovered.source_info;
        if matches!(hovered.kind(), NodeKind::Object | NodeKind::Array)
            && offset > info.offset + 1
            && offset + 1 < info.end_offset()
        {
            return Ok(None);
        }
        // Hovering a key describes its value
        let node = match root.entry_for_key(hovered) {
            Some(entry) => &entry.value,
            None => hovered,
        };

        let Some(schema) = self
            .registry
            .get_schema_for_resource(document.uri(), Some(parsed))
            .await
        else {
            return Ok(None);
        };
        let tree = schema.tree();
        let matches = matching_schemas(
            parsed,
            &schema,
            schema.schema_for_document(index),
            Some(node.source_info.offset),
            settings.validation_options(),
        );

        let mut title: Option<String> = None;
        let mut description: Option<String> = None;
        let mut enum_description: Option<(String, String)> = None;
        for matched in matches
            .iter()
            .filter(|m| std::ptr::eq(m.node, node) && !m.inverted)
        {
            let schema_node = matched.schema;
            if title.is_none() {
                title = tree.str_value(schema_node, "title").map(str::to_string);
            }
            if description.is_none() {
                description = tree
                    .str_value(schema_node, "markdownDescription")
                    .map(str::to_string)
                    .or_else(|| tree.str_value(schema_node, "description").map(to_markdown));
            }
            if enum_description.is_none() {
                enum_description = describe_enum_value(tree, schema_node, node);
            }
        }

        let mut sections = Vec::new();
        if let Some(title) = title {
            sections.push(to_markdown(&title));
        }
        sections.extend(description);
        if let Some((value, text)) = enum_description {
            sections.push(format!("`{}`: {text}", to_markdown(&value)));
        }
        if sections.is_empty() {
            return Ok(None);
        }

        Ok(Some(Hover {
            contents: sections.join("\n\n"),
            range: document.range(hovered.source_info.offset, hovered.source_info.len),
        }))
    }

    /// Property names and values the schema proposes at `position`.
    pub async fn do_complete(
        &self,
        document: &Document,
        position: Position,
    ) -> Result<Vec<CompletionItem>> {
        let settings = self.settings()?;
        if !settings.completion {
            return Ok(Vec::new());
        }

        let offset = document.offset_at(position);
        let stream = parse_stream(document.content(), &settings.parse_options());
        let Some((index, parsed)) = document_for_completion(&stream, offset) else {
            return Ok(Vec::new());
        };
        let Some(root) = parsed.root() else {
            return Ok(Vec::new());
        };
        let Some(target) = completion_target(root, offset) else {
            return Ok(Vec::new());
        };
        let Some(schema) = self
            .registry
            .get_schema_for_resource(document.uri(), Some(parsed))
            .await
        else {
            return Ok(Vec::new());
        };

        let node = match target {
            CompletionTarget::Property { object, .. } => object,
            CompletionTarget::Value(value) => value,
        };
        let matches = matching_schemas(
            parsed,
            &schema,
            schema.schema_for_document(index),
            Some(node.source_info.offset),
            settings.validation_options(),
        );
        let schemas = matches
            .iter()
            .filter(|m| std::ptr::eq(m.node, node) && !m.inverted)
            .map(|m| m.schema);

        let items = match target {
            CompletionTarget::Property { object, current } => {
                property_proposals(schema.tree(), schemas, object, current)
            }
            CompletionTarget::Value(_) => value_proposals(schema.tree(), schemas),
        };
        debug!(uri = document.uri(), count = items.len(), "completion proposals");
        Ok(items)
    }

    /// Outline of every document in the buffer: mapping keys and sequence
    /// indices, nested as in the document.
    pub fn do_document_symbols(&self, document: &Document) -> Result<Vec<DocumentSymbol>> {
        let settings = self.settings()?;
        let stream = parse_stream(document.content(), &settings.parse_options());
        Ok(stream
            .iter()
            .filter_map(ParsedDocument::root)
            .flat_map(|root| outline(document, root))
            .collect())
    }
}

fn outline(document: &Document, node: &YamlNode) -> Vec<DocumentSymbol> {
    if let Some(items) = node.as_array() {
        return items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let range = document.range(item.source_info.offset, item.source_info.len);
                DocumentSymbol::new(index.to_string(), symbol_kind(item), range, range)
                    .with_children(outline(document, item))
            })
            .collect();
    }
    node.as_hash()
        .unwrap_or_default()
        .iter()
        .map(|entry| {
            let key = entry.key.source_info;
            let span = key.to(&entry.value.source_info);
            DocumentSymbol::new(
                entry.key.key_text().map_or_else(String::new, Cow::into_owned),
                symbol_kind(&entry.value),
                document.range(span.offset, span.len),
                document.range(key.offset, key.len),
            )
            .with_children(outline(document, &entry.value))
        })
        .collect()
}

fn symbol_kind(node: &YamlNode) -> SymbolKind {
    match node.kind() {
        NodeKind::Object => SymbolKind::Module,
        NodeKind::Array => SymbolKind::Array,
        NodeKind::String => SymbolKind::String,
        NodeKind::Integer | NodeKind::Number => SymbolKind::Number,
        NodeKind::Boolean => SymbolKind::Boolean,
        NodeKind::Null => SymbolKind::Variable,
    }
}

/// A diagnostic before conversion to line/column form.
struct Finding {
    offset: usize,
    length: usize,
    message: String,
    code: Option<&'static str>,
}

impl Finding {
    fn from_problem(problem: &Problem) -> Self {
        Self {
            offset: problem.offset,
            length: problem.length,
            message: problem.message.clone(),
            code: None,
        }
    }

    fn from_validation(problem: &ValidationProblem) -> Self {
        Self {
            offset: problem.offset,
            length: problem.length,
            message: problem.message.clone(),
            code: Some(problem.kind.code()),
        }
    }
}

/// First pass: syntax errors and every schema violation, deprecations
/// included. Second pass: parser warnings.
fn split_passes(
    parsed: &ParsedDocument,
    problems: Option<&[ValidationProblem]>,
) -> (Vec<Finding>, Vec<Finding>) {
    let first = parsed
        .errors()
        .iter()
        .map(Finding::from_problem)
        .chain(problems.unwrap_or_default().iter().map(Finding::from_validation))
        .collect();
    let second = parsed.warnings().iter().map(Finding::from_problem).collect();
    (first, second)
}

/// Paragraph breaks for single newlines, backslash escapes for Markdown
/// syntax characters.
fn to_markdown(plain: &str) -> String {
    let mut paragraphs = String::with_capacity(plain.len());
    let chars: Vec<char> = plain.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let newline_len = match (c, chars.get(i + 1)) {
            ('\r', Some('\n')) => 2,
            ('\n', _) => 1,
            _ => 0,
        };
        let between_text = newline_len > 0
            && i > 0
            && !matches!(chars[i - 1], '\n' | '\r')
            && chars
                .get(i + newline_len)
                .is_some_and(|next| !matches!(next, '\n' | '\r'));
        if between_text {
            paragraphs.push_str("\n\n");
            i += newline_len;
            continue;
        }
        paragraphs.push(c);
        i += 1;
    }
    escape_markdown(&paragraphs)
}

const MARKDOWN_SYNTAX: &[char] = &[
    '\\', '`', '*', '_', '{', '}', '[', ']', '(', ')', '#', '+', '-', '.', '!',
];

fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if MARKDOWN_SYNTAX.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `(value text, description)` when `node`'s value is one of the schema's
/// `enum` entries and that entry is described.
fn describe_enum_value(tree: &SchemaTree, schema: NodeId, node: &YamlNode) -> Option<(String, String)> {
    let values = tree.value(schema, "enum")?.as_array()?;
    let index = values.iter().position(|v| *v == node.to_json())?;
    let description = match tree.value(schema, "markdownEnumDescriptions") {
        Some(Value::Array(list)) => list.get(index)?.as_str()?.to_string(),
        _ => {
            let Some(Value::Array(list)) = tree.value(schema, "enumDescriptions") else {
                return None;
            };
            to_markdown(list.get(index)?.as_str()?)
        }
    };
    let value = match &values[index] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some((value, description))
}

#[derive(Clone, Copy)]
enum CompletionTarget<'d> {
    /// Propose keys of `object`; `current` is the key being edited.
    Property {
        object: &'d YamlNode,
        current: Option<&'d YamlNode>,
    },
    /// Propose values for a mapping value or sequence item.
    Value(&'d YamlNode),
}

/// The document containing `offset`, else the last document starting
/// before it.
fn document_for_completion(stream: &DocumentStream, offset: usize) -> Option<(usize, &ParsedDocument)> {
    stream.document_at_offset(offset).or_else(|| {
        stream
            .iter()
            .enumerate()
            .filter(|(_, doc)| doc.root().is_some_and(|root| root.source_info.offset <= offset))
            .last()
    })
}

fn completion_target(root: &YamlNode, offset: usize) -> Option<CompletionTarget<'_>> {
    let path = root.path_to_offset(offset);
    let Some(&innermost) = path.last() else {
        return root.is_hash().then_some(CompletionTarget::Property {
            object: root,
            current: None,
        });
    };
    if innermost.is_hash() {
        return Some(CompletionTarget::Property {
            object: innermost,
            current: None,
        });
    }
    let parent = path.len().checked_sub(2).map(|i| path[i]);
    match parent {
        Some(parent) if parent.is_hash() && root.entry_for_key(innermost).is_some() => {
            Some(CompletionTarget::Property {
                object: parent,
                current: Some(innermost),
            })
        }
        _ if innermost.is_array() => None,
        _ => Some(CompletionTarget::Value(innermost)),
    }
}

fn property_proposals(
    tree: &SchemaTree,
    schemas: impl Iterator<Item = NodeId>,
    object: &YamlNode,
    current: Option<&YamlNode>,
) -> Vec<CompletionItem> {
    let present: HashSet<String> = object
        .as_hash()
        .unwrap_or_default()
        .iter()
        .filter(|entry| !current.is_some_and(|key| std::ptr::eq(&entry.key, key)))
        .filter_map(|entry| entry.key.key_text().map(|k| k.into_owned()))
        .collect();

    let mut proposed = HashSet::new();
    let mut items = Vec::new();
    for schema in schemas {
        let Some(properties) = tree.keyword(schema, "properties").and_then(|k| k.as_map()) else {
            continue;
        };
        for (name, &property) in properties {
            if present.contains(name) || !proposed.insert(name.clone()) {
                continue;
            }
            items.push(CompletionItem {
                label: name.clone(),
                kind: CompletionItemKind::Property,
                insert_text: format!("{name}: "),
                documentation: tree.str_value(property, "description").map(str::to_string),
            });
        }
    }
    items
}

fn value_proposals(tree: &SchemaTree, schemas: impl Iterator<Item = NodeId>) -> Vec<CompletionItem> {
    let mut proposed = HashSet::new();
    let mut items = Vec::new();
    for schema in schemas {
        let enum_values = tree
            .value(schema, "enum")
            .and_then(Value::as_array)
            .map(|values| values.iter().collect::<Vec<_>>())
            .unwrap_or_default();
        let values = enum_values.into_iter().chain(tree.value(schema, "const"));
        for value in values {
            let label = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !proposed.insert(label.clone()) {
                continue;
            }
            items.push(CompletionItem {
                insert_text: label.clone(),
                label,
                kind: CompletionItemKind::Value,
                documentation: None,
            });
        }
    }
    items
}
