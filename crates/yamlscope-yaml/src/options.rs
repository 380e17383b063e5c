//! Parser options: custom tags and YAML version.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which YAML version's scalar resolution rules to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum YamlVersion {
    /// YAML 1.1: `yes`/`no`/`on`/`off` are booleans.
    #[serde(rename = "1.1")]
    V1_1,
    /// YAML 1.2 core schema: only `true`/`false` are booleans.
    #[default]
    #[serde(rename = "1.2")]
    V1_2,
}

/// Node shape a custom tag may be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Scalar,
    Sequence,
    Mapping,
}

/// A user-declared tag such as `!Ref sequence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTag {
    /// Tag in display form, e.g. `!Ref`.
    pub name: String,
    pub kind: TagKind,
}

impl FromStr for CustomTag {
    type Err = String;

    /// Parse a `customTags` entry: `"!Tag"` or `"!Tag kind"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| "empty custom tag".to_string())?;
        let kind = match parts.next() {
            None | Some("scalar") => TagKind::Scalar,
            Some("sequence") => TagKind::Sequence,
            Some("mapping") => TagKind::Mapping,
            Some(other) => return Err(format!("unknown custom tag kind '{other}' for {name}")),
        };
        Ok(CustomTag {
            name: name.to_string(),
            kind,
        })
    }
}

/// Options controlling how a buffer is parsed.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub custom_tags: Vec<CustomTag>,
    pub yaml_version: YamlVersion,
}

impl ParseOptions {
    /// Build options from raw `customTags` strings, skipping malformed entries.
    pub fn from_settings<S: AsRef<str>>(custom_tags: &[S], yaml_version: YamlVersion) -> Self {
        Self {
            custom_tags: custom_tags
                .iter()
                .filter_map(|t| t.as_ref().parse().ok())
                .collect(),
            yaml_version,
        }
    }

    /// Whether `tag` is declared for nodes of `kind`.
    pub fn allows_tag(&self, tag: &str, kind: TagKind) -> bool {
        self.custom_tags
            .iter()
            .any(|t| t.name == tag && t.kind == kind)
    }
}
