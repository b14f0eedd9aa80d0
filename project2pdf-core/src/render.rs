//! Concrete [`Renderer`]s, chosen when the engine is composed.
//!
//! - [`InProcessRenderer`] renders with this crate's own PDF writer on the
//!   blocking thread pool.
//! - [`CommandRenderer`] runs an external converter as `<program> [args] <src> <dst>`
//!   and reads the PDF it wrote.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::code_to_pdf::{render_source, PageLayout, SourceHighlighter};
use crate::contract::{RenderError, Renderer};
use crate::markdown_to_pdf::render_markdown;

#[derive(Clone)]
pub struct InProcessRenderer {
    highlighter: Arc<SourceHighlighter>,
    layout: PageLayout,
}

impl Default for InProcessRenderer {
    fn default() -> Self {
        Self::new(SourceHighlighter::default(), PageLayout::default())
    }
}

impl InProcessRenderer {
    pub fn new(highlighter: SourceHighlighter, layout: PageLayout) -> Self {
        Self {
            highlighter: Arc::new(highlighter),
            layout,
        }
    }
}

#[async_trait]
impl Renderer for InProcessRenderer {
    async fn render_generic(&self, source: &Path) -> Result<Vec<u8>, RenderError> {
        let highlighter = Arc::clone(&self.highlighter);
        let layout = self.layout;
        let path = source.to_path_buf();
        tokio::task::spawn_blocking(move || render_source(&path, &highlighter, &layout))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }

    async fn render_markdown(&self, source: &Path) -> Result<Vec<u8>, RenderError> {
        let layout = self.layout;
        let path = source.to_path_buf();
        tokio::task::spawn_blocking(move || render_markdown(&path, &layout))
            .await
            .map_err(|e| RenderError::Task(e.to_string()))?
    }
}

/// An external converter invocation: program plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Shells out once per file. Markdown uses its own command when one is set.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    generic: CommandSpec,
    markdown: Option<CommandSpec>,
}

impl CommandRenderer {
    pub fn new(generic: CommandSpec) -> Self {
        Self {
            generic,
            markdown: None,
        }
    }

    pub fn with_markdown(mut self, markdown: CommandSpec) -> Self {
        self.markdown = Some(markdown);
        self
    }

    async fn invoke(&self, command: &CommandSpec, source: &Path) -> Result<Vec<u8>, RenderError> {
        // Removed on drop, whichever way this returns.
        let output = tempfile::Builder::new()
            .prefix("project2pdf-")
            .suffix(".pdf")
            .tempfile()?;
        let output_path: PathBuf = output.path().to_path_buf();

        debug!(
            program = %command.program,
            source = %source.display(),
            "Launching external converter"
        );
        let status = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .arg(source)
            .arg(&output_path)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| RenderError::Spawn {
                program: command.program.clone(),
                source,
            })?;
        if !status.success() {
            error!(program = %command.program, status = %status, "External converter failed");
            return Err(RenderError::CommandFailed {
                program: command.program.clone(),
                status: status.to_string(),
            });
        }

        let bytes = tokio::fs::read(&output_path).await?;
        if bytes.is_empty() {
            return Err(RenderError::EmptyOutput {
                path: source.to_path_buf(),
            });
        }
        Ok(bytes)
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render_generic(&self, source: &Path) -> Result<Vec<u8>, RenderError> {
        self.invoke(&self.generic, source).await
    }

    async fn render_markdown(&self, source: &Path) -> Result<Vec<u8>, RenderError> {
        let command = self.markdown.as_ref().unwrap_or(&self.generic);
        self.invoke(command, source).await
    }
}
