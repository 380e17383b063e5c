//! `$ref` resolution over the schema arena.
//!
//! Resolution walks the tree with a worklist keyed by `(node, document)`.
//! A `$ref` is removed from its node and the referenced section's keywords
//! are copied into it wherever the node has no keyword of that name yet.
//! Copies share child [`NodeId`]s, so recursive schemas become cyclic
//! graphs; the `seen` set keeps the walk finite.
//!
//! External documents are fetched in rounds: every link discovered while
//! draining the worklist is loaded with one `join_all`, merged, and the
//! merged nodes are walked again in the context of the target document.

use crate::identifier::{SchemaId, is_absolute_uri};
use crate::store::{SchemaDocument, SchemaStore};
use crate::tree::{Keyword, NodeId, SchemaNode, SchemaTree};
use futures::future::join_all;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A schema after `$ref` merging.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    id: SchemaId,
    tree: SchemaTree,
    root: NodeId,
    errors: Vec<String>,
    dependencies: Vec<SchemaId>,
}

impl ResolvedSchema {
    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Load and reference problems, in the order they were met.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Other schema documents merged into this one.
    pub fn dependencies(&self) -> &[SchemaId] {
        &self.dependencies
    }

    pub fn to_value(&self) -> Value {
        self.tree.to_value(self.root)
    }

    /// Schema for document `index` of a stream: `schemaSequence[index]` when
    /// the root declares one that long, the root otherwise.
    pub fn schema_for_document(&self, index: usize) -> NodeId {
        self.tree
            .keyword(self.root, "schemaSequence")
            .and_then(Keyword::as_list)
            .and_then(|sequence| sequence.get(index).copied())
            .unwrap_or(self.root)
    }

    /// Subschema reached by following property names and array indices.
    pub fn section(&self, path: &[&str]) -> Option<NodeId> {
        let mut current = self.root;
        for segment in path {
            current = self.step(current, segment)?;
        }
        Some(current)
    }

    fn step(&self, node: NodeId, segment: &str) -> Option<NodeId> {
        if let Some(properties) = self.tree.keyword(node, "properties").and_then(Keyword::as_map)
            && let Some(child) = properties.get(segment)
        {
            return Some(*child);
        }
        if let Some(patterns) = self
            .tree
            .keyword(node, "patternProperties")
            .and_then(Keyword::as_map)
        {
            for (pattern, child) in patterns {
                if Regex::new(pattern).is_ok_and(|re| re.is_match(segment)) {
                    return Some(*child);
                }
            }
        }
        if let Some(additional) = self.tree.schema(node, "additionalProperties")
            && matches!(self.tree.node(additional), SchemaNode::Object(_))
        {
            return Some(additional);
        }
        if segment.bytes().all(|b| b.is_ascii_digit())
            && let Ok(index) = segment.parse::<usize>()
        {
            return match self.tree.keyword(node, "items")? {
                Keyword::Schema(items) => Some(*items),
                Keyword::SchemaList(items) => items.get(index).copied(),
                _ => None,
            };
        }
        None
    }
}

/// Resolve every `$ref` reachable from `document`'s root.
pub async fn resolve(store: &SchemaStore, document: &SchemaDocument) -> ResolvedSchema {
    let mut resolver = Resolver::new(store, document);
    resolver.run().await;
    resolver.finish()
}

struct LoadedDocument {
    id: SchemaId,
    root: NodeId,
    first_error: Option<String>,
}

struct ExternalLink {
    node: NodeId,
    target: SchemaId,
    path: String,
}

struct Resolver<'s> {
    store: &'s SchemaStore,
    tree: SchemaTree,
    documents: Vec<LoadedDocument>,
    errors: Vec<String>,
    work: Vec<(NodeId, usize)>,
    seen: HashSet<(NodeId, usize)>,
    /// References already merged into a node, keyed by `(node, "id#path")`.
    /// A reference that comes back through a merge is a cycle and stops.
    followed: HashSet<(NodeId, String)>,
    pending: Vec<ExternalLink>,
    sections: HashMap<(usize, String), Option<NodeId>>,
    dependencies: Vec<SchemaId>,
}

enum Located {
    Node(NodeId),
    Map(IndexMap<String, NodeId>),
    List(Vec<NodeId>),
    Value(Value),
}

impl<'s> Resolver<'s> {
    fn new(store: &'s SchemaStore, document: &SchemaDocument) -> Self {
        let mut tree = SchemaTree::new();
        let root = tree.import(&document.content);
        Self {
            store,
            tree,
            documents: vec![LoadedDocument {
                id: document.id.clone(),
                root,
                first_error: None,
            }],
            errors: document.errors.clone(),
            work: vec![(root, 0)],
            seen: HashSet::new(),
            followed: HashSet::new(),
            pending: Vec::new(),
            sections: HashMap::new(),
            dependencies: Vec::new(),
        }
    }

    async fn run(&mut self) {
        loop {
            while let Some((node, doc)) = self.work.pop() {
                if self.seen.insert((node, doc)) {
                    self.visit(node, doc);
                }
            }
            if self.pending.is_empty() {
                break;
            }
            self.load_external().await;
        }
    }

    fn finish(self) -> ResolvedSchema {
        ResolvedSchema {
            id: self.documents[0].id.clone(),
            root: self.documents[0].root,
            tree: self.tree,
            errors: self.errors,
            dependencies: self.dependencies,
        }
    }

    fn visit(&mut self, node: NodeId, doc: usize) {
        while let Some(reference) = self.take_ref(node) {
            let (target, path) = reference.split_once('#').unwrap_or((reference.as_str(), ""));
            if !target.is_empty() {
                let target = self.external_id(target, doc);
                self.pending.push(ExternalLink {
                    node,
                    target,
                    path: path.to_string(),
                });
                return;
            }
            let key = format!("{}#{}", self.documents[doc].id, path);
            if !self.followed.insert((node, key)) {
                break;
            }
            self.merge_section(node, doc, path);
        }
        self.queue_children(node, doc);
    }

    /// Remove `$ref` from `node`, returning it when it is a string.
    fn take_ref(&mut self, node: NodeId) -> Option<String> {
        let SchemaNode::Object(keywords) = self.tree.node_mut(node) else {
            return None;
        };
        match keywords.shift_remove("$ref")? {
            Keyword::Value(Value::String(reference)) => Some(reference),
            _ => None,
        }
    }

    fn external_id(&self, target: &str, doc: usize) -> SchemaId {
        let candidate = SchemaId::new(target);
        if is_absolute_uri(target) || self.store.contains(&candidate) {
            return candidate;
        }
        let base = self.documents[doc].id.as_str();
        SchemaId::new(&self.store.path_resolver().resolve(target, base))
    }

    fn queue_children(&mut self, node: NodeId, doc: usize) {
        let Some(keywords) = self.tree.object(node) else {
            return;
        };
        let children: Vec<NodeId> = keywords.values().flat_map(Keyword::children).collect();
        for child in children {
            if matches!(self.tree.node(child), SchemaNode::Object(_)) {
                self.work.push((child, doc));
            }
        }
    }

    fn merge_section(&mut self, node: NodeId, doc: usize, path: &str) {
        match self.section(doc, path) {
            Some(section) => self.copy_missing(node, section),
            None => {
                let message = format!(
                    "$ref '{}' in '{}' can not be resolved.",
                    path, self.documents[doc].id
                );
                debug!(error = %message, "unresolved schema reference");
                self.errors.push(message);
            }
        }
    }

    fn copy_missing(&mut self, node: NodeId, section: NodeId) {
        let entries: Vec<(String, Keyword)> = match self.tree.node(section) {
            SchemaNode::Object(keywords) => keywords
                .iter()
                .map(|(name, keyword)| (name.clone(), keyword.clone()))
                .collect(),
            _ => return,
        };
        if let SchemaNode::Object(keywords) = self.tree.node_mut(node) {
            for (name, keyword) in entries {
                keywords.entry(name).or_insert(keyword);
            }
        }
    }

    /// Node for the JSON pointer `path` inside document `doc`.
    fn section(&mut self, doc: usize, path: &str) -> Option<NodeId> {
        let root = self.documents[doc].root;
        if path.is_empty() {
            return Some(root);
        }
        let key = (doc, path.to_string());
        if let Some(cached) = self.sections.get(&key) {
            return *cached;
        }
        let located = self.locate(root, path);
        let section = located.map(|located| self.materialize(located));
        self.sections.insert(key, section);
        section
    }

    fn locate(&self, root: NodeId, path: &str) -> Option<Located> {
        let pointer = path.strip_prefix('/').unwrap_or(path);
        let mut current = Located::Node(root);
        for raw in pointer.split('/') {
            let segment = raw.replace("~1", "/").replace("~0", "~");
            current = match current {
                Located::Node(id) => match self.tree.node(id) {
                    SchemaNode::Object(keywords) => match keywords.get(&segment)? {
                        Keyword::Value(v) => Located::Value(v.clone()),
                        Keyword::Schema(child) => Located::Node(*child),
                        Keyword::SchemaMap(map) => Located::Map(map.clone()),
                        Keyword::SchemaList(list) => Located::List(list.clone()),
                    },
                    SchemaNode::Literal(v) => Located::Value(value_child(v, &segment)?.clone()),
                    SchemaNode::Bool(_) => return None,
                },
                Located::Map(map) => Located::Node(*map.get(&segment)?),
                Located::List(list) => Located::Node(*list.get(segment.parse::<usize>().ok()?)?),
                Located::Value(v) => Located::Value(value_child(&v, &segment)?.clone()),
            };
        }
        Some(current)
    }

    fn materialize(&mut self, located: Located) -> NodeId {
        match located {
            Located::Node(id) => id,
            Located::Map(map) => self.tree.push(SchemaNode::Object(
                map.into_iter()
                    .map(|(name, id)| (name, Keyword::Schema(id)))
                    .collect(),
            )),
            Located::List(list) => self.tree.push(SchemaNode::Object(
                list.into_iter()
                    .enumerate()
                    .map(|(i, id)| (i.to_string(), Keyword::Schema(id)))
                    .collect(),
            )),
            Located::Value(value) => self.tree.import(&value),
        }
    }

    async fn load_external(&mut self) {
        let pending = std::mem::take(&mut self.pending);

        let mut to_fetch: Vec<SchemaId> = Vec::new();
        for link in &pending {
            if self.document_index(&link.target).is_none() && !to_fetch.contains(&link.target) {
                to_fetch.push(link.target.clone());
            }
        }
        if !to_fetch.is_empty() {
            debug!(count = to_fetch.len(), "loading referenced schemas");
        }
        let store = self.store;
        let loaded = join_all(to_fetch.iter().map(|id| store.get_unresolved(id))).await;
        for document in loaded {
            let root = self.tree.import(&document.content);
            self.documents.push(LoadedDocument {
                id: document.id.clone(),
                root,
                first_error: document.errors.first().cloned(),
            });
        }

        for link in pending {
            let Some(doc) = self.document_index(&link.target) else {
                continue;
            };
            if doc != 0 && !self.dependencies.contains(&link.target) {
                self.dependencies.push(link.target.clone());
            }
            let key = format!("{}#{}", link.target, link.path);
            if !self.followed.insert((link.node, key)) {
                self.queue_children(link.node, doc);
                continue;
            }
            if let Some(first) = &self.documents[doc].first_error {
                let location = if link.path.is_empty() {
                    link.target.to_string()
                } else {
                    format!("{}#{}", link.target, link.path)
                };
                self.errors
                    .push(format!("Problems loading reference '{location}': {first}"));
            }
            self.merge_section(link.node, doc, &link.path);
            self.seen.insert((link.node, doc));
            self.visit(link.node, doc);
        }
    }

    fn document_index(&self, id: &SchemaId) -> Option<usize> {
        self.documents.iter().position(|d| &d.id == id)
    }
}

fn value_child<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}
