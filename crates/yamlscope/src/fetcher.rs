//! File-system schema fetcher.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;
use yamlscope_schema::{FetchError, SchemaFetcher, is_absolute_uri};

/// Reads schemas from `file://` URIs and plain paths. Other schemes are
/// refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

#[async_trait]
impl SchemaFetcher for FileFetcher {
    async fn fetch(&self, uri: &str) -> Result<String, FetchError> {
        let path = local_path(uri)?;
        debug!(path = %path.display(), "reading schema");
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => FetchError::NotFound(uri.to_string()),
                _ => FetchError::Io {
                    path: path.display().to_string(),
                    source,
                },
            })
    }
}

fn local_path(uri: &str) -> Result<PathBuf, FetchError> {
    if !is_absolute_uri(uri) {
        return Ok(PathBuf::from(uri));
    }
    let url = Url::parse(uri).map_err(|err| FetchError::Other(format!("Invalid URI '{uri}': {err}")))?;
    if url.scheme() != "file" {
        return Err(FetchError::Other(format!(
            "Unable to load schema from '{uri}': only file schemas are supported"
        )));
    }
    url.to_file_path()
        .map_err(|()| FetchError::Other(format!("Invalid file URI '{uri}'")))
}

/// `file://` URI of a local path, made absolute against the current
/// directory.
pub fn file_uri(path: &Path) -> anyhow::Result<String> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|()| anyhow::anyhow!("cannot express {} as a file URI", absolute.display()))
}

/// URIs pass through; anything else is a local path.
pub fn schema_uri(argument: &str) -> anyhow::Result<String> {
    if is_absolute_uri(argument) {
        Ok(argument.to_string())
    } else {
        file_uri(Path::new(argument))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("schemas/a.json").unwrap(), PathBuf::from("schemas/a.json"));
        assert_eq!(
            local_path("file:///tmp/a.json").unwrap(),
            PathBuf::from("/tmp/a.json")
        );
        assert!(matches!(
            local_path("https://x.org/a.json"),
            Err(FetchError::Other(_))
        ));
    }

    #[test]
    fn test_schema_uri() {
        assert_eq!(schema_uri("https://x.org/a.json").unwrap(), "https://x.org/a.json");
        let uri = schema_uri("a.json").unwrap();
        assert!(uri.starts_with("file:///"));
        assert!(uri.ends_with("/a.json"));
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let err = FileFetcher
            .fetch("file:///definitely/not/here.json")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Schema not found: file:///definitely/not/here.json");
    }
}
