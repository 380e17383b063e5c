//! Arena representation of schema documents.
//!
//! Schema trees may become cyclic once `$ref`s are merged, so nodes live in
//! a flat arena and refer to each other by [`NodeId`]. Merging a section into
//! a node copies keyword entries, which shares child ids between nodes.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Index of a node in a [`SchemaTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Keywords whose value is a single subschema.
const SINGLE_SCHEMA_KEYWORDS: &[&str] = &[
    "items",
    "additionalItems",
    "additionalProperties",
    "not",
    "contains",
    "propertyNames",
    "if",
    "then",
    "else",
];

/// Keywords whose value maps names to subschemas.
const SCHEMA_MAP_KEYWORDS: &[&str] = &[
    "definitions",
    "$defs",
    "properties",
    "patternProperties",
    "dependencies",
];

/// Keywords whose value is an ordered list of subschemas.
const SCHEMA_LIST_KEYWORDS: &[&str] = &["anyOf", "allOf", "oneOf", "items", "schemaSequence"];

/// One schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// `true` accepts everything, `false` nothing.
    Bool(bool),
    Object(IndexMap<String, Keyword>),
    /// A non-schema value in a schema position, e.g. the string list of a
    /// property dependency.
    Literal(Value),
}

/// Value of one keyword of an object schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    Value(Value),
    Schema(NodeId),
    SchemaMap(IndexMap<String, NodeId>),
    SchemaList(Vec<NodeId>),
}

impl Keyword {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Keyword::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<NodeId> {
        match self {
            Keyword::Schema(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, NodeId>> {
        match self {
            Keyword::SchemaMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[NodeId]> {
        match self {
            Keyword::SchemaList(list) => Some(list),
            _ => None,
        }
    }

    /// Every subschema this keyword holds.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Keyword::Value(_) => Vec::new(),
            Keyword::Schema(id) => vec![*id],
            Keyword::SchemaMap(map) => map.values().copied().collect(),
            Keyword::SchemaList(list) => list.clone(),
        }
    }
}

/// Flat storage for schema nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
}

impl SchemaTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn push(&mut self, node: SchemaNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    /// Keyword map of an object node.
    pub fn object(&self, id: NodeId) -> Option<&IndexMap<String, Keyword>> {
        match self.node(id) {
            SchemaNode::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn keyword(&self, id: NodeId, name: &str) -> Option<&Keyword> {
        self.object(id)?.get(name)
    }

    /// Plain JSON value of a keyword.
    pub fn value(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.keyword(id, name)?.as_value()
    }

    pub fn str_value(&self, id: NodeId, name: &str) -> Option<&str> {
        self.value(id, name)?.as_str()
    }

    pub fn schema(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.keyword(id, name)?.as_schema()
    }

    /// Import a JSON schema document, returning its root node.
    pub fn import(&mut self, value: &Value) -> NodeId {
        match value {
            Value::Bool(b) => self.push(SchemaNode::Bool(*b)),
            Value::Object(map) => {
                let mut keywords = IndexMap::with_capacity(map.len());
                for (name, v) in map {
                    let keyword = self.import_keyword(name, v);
                    keywords.insert(name.clone(), keyword);
                }
                self.push(SchemaNode::Object(keywords))
            }
            other => self.push(SchemaNode::Literal(other.clone())),
        }
    }

    fn import_keyword(&mut self, name: &str, value: &Value) -> Keyword {
        if SCHEMA_LIST_KEYWORDS.contains(&name)
            && let Value::Array(items) = value
        {
            return Keyword::SchemaList(items.iter().map(|item| self.import(item)).collect());
        }
        if SINGLE_SCHEMA_KEYWORDS.contains(&name) && is_schema_like(value) {
            return Keyword::Schema(self.import(value));
        }
        if SCHEMA_MAP_KEYWORDS.contains(&name)
            && let Value::Object(entries) = value
        {
            return Keyword::SchemaMap(
                entries
                    .iter()
                    .map(|(key, v)| (key.clone(), self.import(v)))
                    .collect(),
            );
        }
        Keyword::Value(value.clone())
    }

    /// Render the subtree at `root` back to JSON.
    ///
    /// A node reached again while it is still being rendered (a cycle
    /// created by `$ref` merging) renders as `{}`. Subtrees shared by
    /// several parents are rendered once.
    pub fn to_value(&self, root: NodeId) -> Value {
        let mut renderer = Renderer {
            tree: self,
            active: HashSet::new(),
            rendered: HashMap::new(),
        };
        renderer.render(root).0
    }
}

struct Renderer<'t> {
    tree: &'t SchemaTree,
    active: HashSet<NodeId>,
    /// Subtrees whose rendering did not cut a cycle
    rendered: HashMap<NodeId, Value>,
}

impl Renderer<'_> {
    /// The JSON of `id` and whether it is free of cycle cuts.
    fn render(&mut self, id: NodeId) -> (Value, bool) {
        if let Some(value) = self.rendered.get(&id) {
            return (value.clone(), true);
        }
        if !self.active.insert(id) {
            return (Value::Object(Map::new()), false);
        }
        let tree = self.tree;
        let mut complete = true;
        let value = match tree.node(id) {
            SchemaNode::Bool(b) => Value::Bool(*b),
            SchemaNode::Literal(v) => v.clone(),
            SchemaNode::Object(keywords) => {
                let mut map = Map::new();
                for (name, keyword) in keywords {
                    let rendered = match keyword {
                        Keyword::Value(v) => v.clone(),
                        Keyword::Schema(child) => self.render_child(*child, &mut complete),
                        Keyword::SchemaMap(children) => Value::Object(
                            children
                                .iter()
                                .map(|(k, child)| (k.clone(), self.render_child(*child, &mut complete)))
                                .collect(),
                        ),
                        Keyword::SchemaList(children) => Value::Array(
                            children
                                .iter()
                                .map(|child| self.render_child(*child, &mut complete))
                                .collect(),
                        ),
                    };
                    map.insert(name.clone(), rendered);
                }
                Value::Object(map)
            }
        };
        self.active.remove(&id);
        if complete {
            self.rendered.insert(id, value.clone());
        }
        (value, complete)
    }

    fn render_child(&mut self, id: NodeId, complete: &mut bool) -> Value {
        let (value, child_complete) = self.render(id);
        *complete &= child_complete;
        value
    }
}

fn is_schema_like(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Bool(_))
}
