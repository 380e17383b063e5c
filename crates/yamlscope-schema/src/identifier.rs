//! Schema identifiers and relative path resolution.

use std::fmt;
use url::Url;

/// URI scheme of synthesized combined schemas.
pub const COMBINED_SCHEME: &str = "combined";

/// Normalized key naming one schema document.
///
/// Normalization strips the fragment (and so any trailing `#`), lets the
/// `url` crate canonicalize scheme and host case, and lower-cases Windows
/// drive letters in `file:` URIs. Strings that are not absolute URIs (e.g.
/// `schema.json`) are kept verbatim minus the fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(String);

impl SchemaId {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let without_fragment = trimmed.split_once('#').map_or(trimmed, |(base, _)| base);

        let candidate = match windows_path_to_uri(without_fragment) {
            Some(uri) => uri,
            None => without_fragment.to_string(),
        };

        match Url::parse(&candidate) {
            Ok(mut url) if url.scheme().len() > 1 => {
                url.set_fragment(None);
                if url.scheme() == "file" {
                    let path = url.path().to_string();
                    if let Some(lowered) = lowercase_drive(&path) {
                        url.set_path(&lowered);
                    }
                }
                SchemaId(url.to_string())
            }
            _ => SchemaId(candidate),
        }
    }

    /// Identifier of the combined schema synthesized for `resource`.
    pub fn combined(resource: &str) -> Self {
        SchemaId(format!("{COMBINED_SCHEME}://{resource}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URI scheme, if the identifier is an absolute URI.
    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once(':')?;
        let valid = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then_some(scheme)
    }

    pub fn is_combined(&self) -> bool {
        self.scheme() == Some(COMBINED_SCHEME)
    }

    /// Text used in user-facing messages: the file-system path for `file:`
    /// identifiers, the identifier itself otherwise.
    pub fn display_name(&self) -> String {
        if self.scheme() == Some("file")
            && let Ok(url) = Url::parse(&self.0)
            && let Ok(path) = url.to_file_path()
        {
            return path.display().to_string();
        }
        self.0.clone()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SchemaId {
    fn from(raw: &str) -> Self {
        SchemaId::new(raw)
    }
}

impl AsRef<str> for SchemaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Whether `reference` starts with `scheme://`.
pub fn is_absolute_uri(reference: &str) -> bool {
    match reference.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty() && scheme.chars().all(|c| c.is_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Resolves a relative schema reference against the identifier that
/// contains it.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, relative: &str, base: &str) -> String;
}

/// Resolves with URL joining when the base is a URI, and by replacing the
/// last path segment otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlPathResolver;

impl PathResolver for UrlPathResolver {
    fn resolve(&self, relative: &str, base: &str) -> String {
        if let Ok(base_url) = Url::parse(base)
            && base_url.scheme().len() > 1
            && let Ok(joined) = base_url.join(relative)
        {
            return joined.to_string();
        }
        let relative = relative.trim_start_matches("./");
        match base.rfind('/') {
            Some(idx) => format!("{}{}", &base[..=idx], relative),
            None => relative.to_string(),
        }
    }
}

fn windows_path_to_uri(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let is_drive = bytes.len() >= 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes.len() == 2 || matches!(bytes[2], b'/' | b'\\'));
    is_drive.then(|| format!("file:///{}", raw.replace('\\', "/")))
}

fn lowercase_drive(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_uppercase() && bytes[2] == b':' {
        let mut lowered = String::with_capacity(path.len());
        lowered.push('/');
        lowered.push(char::from(bytes[1].to_ascii_lowercase()));
        lowered.push_str(&path[2..]);
        Some(lowered)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_hash_and_fragment_stripped() {
        assert_eq!(
            SchemaId::new("https://example.com/schema.json#"),
            SchemaId::new("https://example.com/schema.json")
        );
        assert_eq!(
            SchemaId::new("https://example.com/schema.json#/definitions/a").as_str(),
            "https://example.com/schema.json"
        );
    }

    #[test]
    fn test_drive_letter_case_normalized() {
        assert_eq!(
            SchemaId::new("file:///C:/schemas/a.json"),
            SchemaId::new("file:///c:/schemas/a.json")
        );
        assert_eq!(
            SchemaId::new("C:\\schemas\\a.json").as_str(),
            "file:///c:/schemas/a.json"
        );
    }

    #[test]
    fn test_opaque_identifiers_kept() {
        assert_eq!(SchemaId::new("S1").as_str(), "S1");
        assert_eq!(SchemaId::new("schemas/a.json#").as_str(), "schemas/a.json");
        assert_eq!(SchemaId::new("S1").scheme(), None);
    }

    #[test]
    fn test_scheme_and_combined() {
        let id = SchemaId::combined("a.yaml");
        assert!(id.is_combined());
        assert_eq!(id.as_str(), "combined://a.yaml");
        assert_eq!(SchemaId::new("https://x.org/a").scheme(), Some("https"));
    }

    #[test]
    fn test_display_name_for_files() {
        let id = SchemaId::new("file:///tmp/schema.json");
        assert_eq!(id.display_name(), "/tmp/schema.json");
        assert_eq!(SchemaId::new("https://x.org/a").display_name(), "https://x.org/a");
    }

    #[test]
    fn test_is_absolute_uri() {
        assert!(is_absolute_uri("https://x.org/a.json"));
        assert!(is_absolute_uri("file:///a.json"));
        assert!(!is_absolute_uri("a.json"));
        assert!(!is_absolute_uri("./a.json"));
    }

    #[test]
    fn test_url_path_resolver() {
        let resolver = UrlPathResolver;
        assert_eq!(
            resolver.resolve("other.json", "https://x.org/schemas/main.json"),
            "https://x.org/schemas/other.json"
        );
        assert_eq!(
            resolver.resolve("./b.json", "schemas/a.json"),
            "schemas/b.json"
        );
        assert_eq!(resolver.resolve("b.json", "a.json"), "b.json");
    }
}
