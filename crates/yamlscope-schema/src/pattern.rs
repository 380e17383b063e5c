//! File pattern associations.

use crate::SchemaId;
use regex::Regex;
use tracing::warn;

/// A `fileMatch` glob and the schemas associated with it.
///
/// `*` matches any run of characters (including `/`); every other character
/// is literal. Patterns are anchored at the end only, so `*.yaml` and
/// `deploy.yaml` both match `file:///repo/deploy.yaml`.
#[derive(Debug, Clone)]
pub struct FilePatternAssociation {
    pattern: String,
    regex: Option<Regex>,
    schema_ids: Vec<SchemaId>,
}

impl FilePatternAssociation {
    pub fn new(pattern: &str) -> Self {
        let source = format!("{}$", regex::escape(pattern).replace(r"\*", ".*"));
        let regex = match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(err) => {
                warn!(pattern, error = %err, "ignoring file pattern that does not compile");
                None
            }
        };
        Self {
            pattern: pattern.to_string(),
            regex,
            schema_ids: Vec::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Associate another schema, keeping insertion order.
    pub fn add_schema(&mut self, id: SchemaId) {
        if !self.schema_ids.contains(&id) {
            self.schema_ids.push(id);
        }
    }

    pub fn schema_ids(&self) -> &[SchemaId] {
        &self.schema_ids
    }

    pub fn matches(&self, resource: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_matches_suffix() {
        let fpa = FilePatternAssociation::new("*.yaml");
        assert!(fpa.matches("a.yaml"));
        assert!(fpa.matches("file:///repo/dir/a.yaml"));
        assert!(!fpa.matches("a.yml"));
        assert!(!fpa.matches("a.yaml.bak"));
    }

    #[test]
    fn test_literal_characters_are_escaped() {
        let fpa = FilePatternAssociation::new("docker-compose.(prod).yml");
        assert!(fpa.matches("/x/docker-compose.(prod).yml"));
        assert!(!fpa.matches("/x/docker-composeX(prod).yml"));
    }

    #[test]
    fn test_add_schema_keeps_order_without_duplicates() {
        let mut fpa = FilePatternAssociation::new("*");
        fpa.add_schema(SchemaId::new("b"));
        fpa.add_schema(SchemaId::new("a"));
        fpa.add_schema(SchemaId::new("b"));
        let ids: Vec<&str> = fpa.schema_ids().iter().map(SchemaId::as_str).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
