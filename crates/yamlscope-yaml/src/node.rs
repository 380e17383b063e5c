//! YAML value with source location tracking.

use crate::SourceInfo;
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use yaml_rust2::Yaml;

/// A YAML value with source location information.
///
/// Wraps an owned `yaml-rust2::Yaml` value together with a parallel
/// `Children` structure that carries the byte range of every child. Owned
/// data keeps the API free of lifetimes, so documents can be cached and
/// shared between validation passes.
///
/// ## Example
///
/// ```rust
/// use yamlscope_yaml::parse;
///
/// let yaml = parse("title: My Document").unwrap();
/// if let Some(title) = yaml.get_hash_value("title") {
///     assert_eq!(title.yaml.as_str(), Some("My Document"));
///     assert_eq!(title.source_info.offset, 7);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct YamlNode {
    /// The complete yaml-rust2::Yaml value (owned).
    pub yaml: Yaml,

    /// Source location for this node.
    pub source_info: SourceInfo,

    /// Explicit tag (e.g. `!Ref`, `!!str`) in display form, with its location.
    pub tag: Option<(String, SourceInfo)>,

    children: Children,
}

#[derive(Debug, Clone)]
enum Children {
    None,
    Array(Vec<YamlNode>),
    Hash(Vec<YamlHashEntry>),
}

/// A key-value pair in a YAML mapping with source tracking.
#[derive(Debug, Clone)]
pub struct YamlHashEntry {
    /// The key with source tracking
    pub key: YamlNode,

    /// The value with source tracking
    pub value: YamlNode,

    /// Source location of the entire entry (key + value)
    pub entry_span: SourceInfo,
}

/// JSON data-model kind of a node, as seen by schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl NodeKind {
    /// JSON Schema type name.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Null => "null",
            NodeKind::Boolean => "boolean",
            NodeKind::Integer => "integer",
            NodeKind::Number => "number",
            NodeKind::String => "string",
            NodeKind::Array => "array",
            NodeKind::Object => "object",
        }
    }
}

impl YamlNode {
    /// Create a node for a scalar or leaf value.
    pub fn new_scalar(yaml: Yaml, source_info: SourceInfo) -> Self {
        Self {
            yaml,
            source_info,
            tag: None,
            children: Children::None,
        }
    }

    /// Create a node for a sequence.
    pub fn new_array(source_info: SourceInfo, items: Vec<YamlNode>) -> Self {
        let yaml = Yaml::Array(items.iter().map(|n| n.yaml.clone()).collect());
        Self {
            yaml,
            source_info,
            tag: None,
            children: Children::Array(items),
        }
    }

    /// Create a node for a mapping.
    ///
    /// Duplicate keys keep every entry for source tracking; the raw `yaml`
    /// hash keeps the last value, as yaml-rust2's own loader does.
    pub fn new_hash(source_info: SourceInfo, entries: Vec<YamlHashEntry>) -> Self {
        let yaml = Yaml::Hash(
            entries
                .iter()
                .map(|e| (e.key.yaml.clone(), e.value.yaml.clone()))
                .collect(),
        );
        Self {
            yaml,
            source_info,
            tag: None,
            children: Children::Hash(entries),
        }
    }

    /// Attach an explicit tag.
    pub fn with_tag(mut self, tag: Option<(String, SourceInfo)>) -> Self {
        self.tag = tag;
        self
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.children, Children::None)
    }

    pub fn is_array(&self) -> bool {
        matches!(self.children, Children::Array(_))
    }

    pub fn is_hash(&self) -> bool {
        matches!(self.children, Children::Hash(_))
    }

    /// Get array children if this is an array.
    pub fn as_array(&self) -> Option<&[YamlNode]> {
        match &self.children {
            Children::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Get hash entries if this is a hash.
    pub fn as_hash(&self) -> Option<&[YamlHashEntry]> {
        match &self.children {
            Children::Hash(entries) => Some(entries),
            _ => None,
        }
    }

    /// Get a value from a hash by key (string comparison).
    pub fn get_hash_value(&self, key: &str) -> Option<&YamlNode> {
        self.get_hash_entry(key).map(|entry| &entry.value)
    }

    /// Get a whole hash entry by key.
    pub fn get_hash_entry(&self, key: &str) -> Option<&YamlHashEntry> {
        self.as_hash()?
            .iter()
            .find(|entry| entry.key.key_text().as_deref() == Some(key))
    }

    /// Get an array element by index.
    pub fn get_array_item(&self, index: usize) -> Option<&YamlNode> {
        self.as_array()?.get(index)
    }

    /// Number of children (array length or hash entry count).
    pub fn len(&self) -> usize {
        match &self.children {
            Children::None => 0,
            Children::Array(items) => items.len(),
            Children::Hash(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON data-model kind of this node.
    pub fn kind(&self) -> NodeKind {
        match &self.yaml {
            Yaml::Boolean(_) => NodeKind::Boolean,
            Yaml::Integer(_) => NodeKind::Integer,
            Yaml::Real(_) => NodeKind::Number,
            Yaml::String(_) => NodeKind::String,
            Yaml::Array(_) => NodeKind::Array,
            Yaml::Hash(_) => NodeKind::Object,
            Yaml::Null | Yaml::BadValue | Yaml::Alias(_) => NodeKind::Null,
        }
    }

    /// Numeric value for integer and real scalars.
    pub fn as_f64(&self) -> Option<f64> {
        match &self.yaml {
            Yaml::Integer(i) => Some(*i as f64),
            Yaml::Real(_) => self.yaml.as_f64(),
            _ => None,
        }
    }

    /// Text of a scalar used as a mapping key.
    ///
    /// Non-string scalar keys (`1: a`, `true: b`) are rendered back to text;
    /// collections used as keys have no text.
    pub fn key_text(&self) -> Option<Cow<'_, str>> {
        match &self.yaml {
            Yaml::String(s) => Some(Cow::Borrowed(s.as_str())),
            Yaml::Real(s) => Some(Cow::Borrowed(s.as_str())),
            Yaml::Integer(i) => Some(Cow::Owned(i.to_string())),
            Yaml::Boolean(b) => Some(Cow::Owned(b.to_string())),
            Yaml::Null => Some(Cow::Borrowed("null")),
            _ => None,
        }
    }

    /// Whether `offset` falls inside this node's range (end inclusive).
    pub fn contains(&self, offset: usize) -> bool {
        self.source_info.contains(offset)
    }

    /// The innermost node whose range contains `offset`, keys included.
    pub fn node_at_offset(&self, offset: usize) -> Option<&YamlNode> {
        self.path_to_offset(offset).last().copied()
    }

    /// Chain of nodes from `self` down to the innermost node containing
    /// `offset`. Empty when `offset` is outside `self`.
    pub fn path_to_offset(&self, offset: usize) -> Vec<&YamlNode> {
        let mut path = Vec::new();
        let mut current = self;
        if !current.contains(offset) {
            return path;
        }
        loop {
            path.push(current);
            let next = match &current.children {
                Children::None => None,
                Children::Array(items) => items.iter().find(|item| item.contains(offset)),
                Children::Hash(entries) => entries.iter().find_map(|entry| {
                    if entry.key.contains(offset) {
                        Some(&entry.key)
                    } else if entry.value.contains(offset)
                        && entry.value.source_info.len > 0
                    {
                        Some(&entry.value)
                    } else {
                        None
                    }
                }),
            };
            match next {
                Some(child) => current = child,
                None => return path,
            }
        }
    }

    /// The entry whose key node is `key`, searched among this node's
    /// descendants by identity.
    pub fn entry_for_key(&self, key: &YamlNode) -> Option<&YamlHashEntry> {
        match &self.children {
            Children::None => None,
            Children::Array(items) => items.iter().find_map(|item| item.entry_for_key(key)),
            Children::Hash(entries) => entries.iter().find_map(|entry| {
                if std::ptr::eq(&entry.key, key) {
                    Some(entry)
                } else {
                    entry.value.entry_for_key(key)
                }
            }),
        }
    }

    /// Convert to a `serde_json::Value` for enum/const comparison.
    pub fn to_json(&self) -> Value {
        match &self.children {
            Children::Array(items) => Value::Array(items.iter().map(YamlNode::to_json).collect()),
            Children::Hash(entries) => {
                let mut map = Map::new();
                for entry in entries {
                    if let Some(key) = entry.key.key_text() {
                        map.insert(key.into_owned(), entry.value.to_json());
                    }
                }
                Value::Object(map)
            }
            Children::None => match &self.yaml {
                Yaml::String(s) => Value::String(s.clone()),
                Yaml::Integer(i) => Value::Number((*i).into()),
                Yaml::Real(_) => self
                    .yaml
                    .as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number),
                Yaml::Boolean(b) => Value::Bool(*b),
                _ => Value::Null,
            },
        }
    }
}

impl YamlHashEntry {
    /// Create an entry, deriving the entry span from key and value.
    pub fn new(key: YamlNode, value: YamlNode) -> Self {
        let entry_span = key.source_info.to(&value.source_info);
        Self {
            key,
            value,
            entry_span,
        }
    }
}
