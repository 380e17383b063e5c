//! `yamlscope validate`: report schema diagnostics for YAML files.

use crate::fetcher::{FileFetcher, file_uri, schema_uri};
use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use yamlscope_service::{
    Diagnostic, DiagnosticSeverity, Document, LanguageService, LanguageSettings,
    SchemaConfiguration,
};

#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Schema URI or path applied to every input file
    #[arg(short, long)]
    pub schema: Option<String>,

    /// JSON settings file (same shape as the editor settings)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Rank anyOf/oneOf alternatives by matched properties
    #[arg(long)]
    pub kubernetes: bool,

    /// Print diagnostics as JSON
    #[arg(long)]
    pub json: bool,

    /// YAML files to validate
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Diagnostics of one input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }
}

/// Settings from `--settings`, overlaid with the command-line flags.
pub fn load_settings(args: &ValidateArgs) -> Result<LanguageSettings> {
    let mut settings = match &args.settings {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading settings from {}", path.display()))?;
            LanguageSettings::from_json(&text)
                .with_context(|| format!("parsing settings from {}", path.display()))?
        }
        None => LanguageSettings::default(),
    };
    if let Some(schema) = &args.schema {
        settings.schemas.push(SchemaConfiguration {
            uri: schema_uri(schema)?,
            file_match: vec!["*".to_string()],
            schema: None,
        });
    }
    if args.kubernetes {
        settings.is_kubernetes = true;
    }
    settings.validate = true;
    Ok(settings)
}

/// Validate every file of `args`.
pub async fn run(args: &ValidateArgs) -> Result<Vec<FileReport>> {
    let settings = load_settings(args)?;
    let service = LanguageService::new(Some(Arc::new(FileFetcher)));
    service.configure(settings);

    let mut reports = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let document = Document::new(file_uri(path)?, text, 1);
        let diagnostics = service.do_validation(&document).await?;
        info!(file = %path.display(), count = diagnostics.len(), "validated");
        reports.push(FileReport {
            file: path.clone(),
            diagnostics,
        });
    }
    Ok(reports)
}

/// `file:line:col: severity: message`, with 1-based line and column.
pub fn render_diagnostic(file: &Path, diagnostic: &Diagnostic) -> String {
    format!(
        "{}:{}:{}: {}: {}",
        file.display(),
        diagnostic.range.start.line + 1,
        diagnostic.range.start.character + 1,
        diagnostic.severity.as_str(),
        diagnostic.message
    )
}

/// Execute the command. Returns whether any error was reported.
pub async fn execute(args: ValidateArgs) -> Result<bool> {
    let reports = run(&args).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            for diagnostic in &report.diagnostics {
                println!("{}", render_diagnostic(&report.file, diagnostic));
            }
        }
    }
    Ok(reports.iter().any(FileReport::has_errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yamlscope_service::{Position, Range};

    #[test]
    fn test_render_diagnostic() {
        let diagnostic = Diagnostic::new(
            Range::new(Position::new(0, 3), Position::new(0, 8)),
            DiagnosticSeverity::Error,
            "Incorrect type. Expected \"number\".",
        );
        insta::assert_snapshot!(
            render_diagnostic(Path::new("a.yaml"), &diagnostic),
            @r#"a.yaml:1:4: error: Incorrect type. Expected "number"."#
        );
    }

    #[test]
    fn test_flags_overlay_settings() {
        let args = ValidateArgs {
            schema: Some("https://x.org/s.json".into()),
            kubernetes: true,
            files: vec![PathBuf::from("a.yaml")],
            ..ValidateArgs::default()
        };
        let settings = load_settings(&args).unwrap();
        assert!(settings.is_kubernetes);
        assert_eq!(settings.schemas.len(), 1);
        assert_eq!(settings.schemas[0].uri, "https://x.org/s.json");
        assert_eq!(settings.schemas[0].file_match, vec!["*".to_string()]);
    }
}
