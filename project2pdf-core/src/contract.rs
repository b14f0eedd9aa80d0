//! # contract: the renderer port and the per-file conversion types
//!
//! The engine never renders anything itself. Every conversion goes through the
//! [`Renderer`] trait, which turns one source file into PDF bytes. Concrete
//! renderers live in [`crate::render`]: an in-process one and one that shells
//! out to an external converter. Tests use the generated `MockRenderer`.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; the mock is exported under the
//!   `test-export-mocks` feature so integration tests in other crates can use it.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

/// Errors a renderer can report for a single file.
///
/// None of these abort a run: the dispatcher logs them and moves on.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not UTF-8 text")]
    NotText { path: PathBuf },
    #[error("syntax highlighting failed: {0}")]
    Highlight(String),
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {status}")]
    CommandFailed { program: String, status: String },
    #[error("renderer produced no output for {path}")]
    EmptyOutput { path: PathBuf },
    #[error("render task aborted: {0}")]
    Task(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// Trait for turning a single source file into PDF bytes.
///
/// One method per pipeline. The generic pipeline resolves a lexer on its own
/// (by file name, then by content, then plain text); the engine only picks
/// which method to call.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Syntax-highlighted source to PDF.
    async fn render_generic(&self, source: &Path) -> Result<Vec<u8>, RenderError>;

    /// Markdown to PDF.
    async fn render_markdown(&self, source: &Path) -> Result<Vec<u8>, RenderError>;
}

/// Which rendering pipeline a file is routed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    /// Any source or text file, rendered with syntax highlighting.
    Generic,
    /// Markdown documents.
    Markdown,
}

impl ConverterKind {
    /// Invoke the pipeline this kind stands for on `renderer`.
    pub async fn render(
        self,
        renderer: &dyn Renderer,
        source: &Path,
    ) -> Result<Vec<u8>, RenderError> {
        match self {
            ConverterKind::Generic => renderer.render_generic(source).await,
            ConverterKind::Markdown => renderer.render_markdown(source).await,
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterKind::Generic => write!(f, "generic"),
            ConverterKind::Markdown => write!(f, "markdown"),
        }
    }
}

/// Final state of one file after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStatus {
    Succeeded,
    Skipped,
    Failed,
}

/// What happened to one file. Consumed by the run reporter right away.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub status: ConversionStatus,
    pub detail: Option<String>,
}

impl ConversionOutcome {
    pub fn succeeded(source_path: PathBuf, destination_path: PathBuf) -> Self {
        Self {
            source_path,
            destination_path,
            status: ConversionStatus::Succeeded,
            detail: None,
        }
    }

    pub fn skipped(
        source_path: PathBuf,
        destination_path: PathBuf,
        detail: Option<String>,
    ) -> Self {
        Self {
            source_path,
            destination_path,
            status: ConversionStatus::Skipped,
            detail,
        }
    }

    pub fn failed(source_path: PathBuf, destination_path: PathBuf, detail: String) -> Self {
        Self {
            source_path,
            destination_path,
            status: ConversionStatus::Failed,
            detail: Some(detail),
        }
    }
}
