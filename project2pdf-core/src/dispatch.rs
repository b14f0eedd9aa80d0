//! Per-directory conversion: route each file to its pipeline, write the PDF,
//! and turn every failure into a logged outcome instead of an error.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::contract::{ConversionOutcome, ConversionStatus, ConverterKind, Renderer};
use crate::filter::FilterContext;
use crate::mirror::MirroredDirectory;
use crate::registry::ConverterRegistry;
use crate::report::RunReporter;

/// Appended to a file's full name to form its output name.
pub const PDF_SUFFIX: &str = ".pdf";

pub struct ConversionDispatcher {
    renderer: Arc<dyn Renderer>,
    registry: ConverterRegistry,
    concurrency: usize,
}

impl ConversionDispatcher {
    pub fn new(renderer: Arc<dyn Renderer>, registry: ConverterRegistry) -> Self {
        Self {
            renderer,
            registry,
            concurrency: 1,
        }
    }

    /// Maximum number of conversions in flight within one directory.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Convert every eligible file of `dir`, recording each outcome in
    /// `reporter`. Returns how many files were converted.
    pub async fn process_directory(
        &self,
        dir: &MirroredDirectory,
        filter: &FilterContext,
        reporter: &mut RunReporter,
        cancel: &CancellationToken,
    ) -> usize {
        let outcomes: Vec<ConversionOutcome> = stream::iter(dir.files.iter())
            .map(|name| self.process_file(&dir.source, &dir.destination, name, filter, cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut converted = 0;
        for outcome in &outcomes {
            if outcome.status == ConversionStatus::Succeeded {
                converted += 1;
            }
            reporter.record(outcome);
        }
        info!(
            path = %dir.destination.display(),
            converted,
            total = dir.files.len(),
            "HANDLE {converted}/{} files",
            dir.files.len()
        );
        converted
    }

    async fn process_file(
        &self,
        source_dir: &Path,
        destination_dir: &Path,
        name: &OsStr,
        filter: &FilterContext,
        cancel: &CancellationToken,
    ) -> ConversionOutcome {
        let source = source_dir.join(name);
        let mut output_name: OsString = name.to_os_string();
        output_name.push(PDF_SUFFIX);
        let destination = destination_dir.join(output_name);

        if filter.is_blacklisted_file(name) {
            debug!(path = %source.display(), "Skipping excluded file");
            return ConversionOutcome::skipped(source, destination, None);
        }
        if cancel.is_cancelled() {
            debug!(path = %source.display(), "Run cancelled, not converting file");
            return ConversionOutcome::skipped(source, destination, Some("run cancelled".into()));
        }

        let kind = self.registry.resolve_name(name);
        info!(path = %destination.display(), pipeline = %kind, "Generating PDF file");
        self.convert(kind, source, destination).await
    }

    async fn convert(
        &self,
        kind: ConverterKind,
        source: PathBuf,
        destination: PathBuf,
    ) -> ConversionOutcome {
        let bytes = match kind.render(self.renderer.as_ref(), &source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(
                    path = %source.display(),
                    pipeline = %kind,
                    error = %e,
                    "Failed to render file"
                );
                return ConversionOutcome::failed(source, destination, e.to_string());
            }
        };
        if let Err(e) = tokio::fs::write(&destination, &bytes).await {
            error!(path = %destination.display(), error = %e, "Failed to write PDF file");
            return ConversionOutcome::failed(source, destination, e.to_string());
        }
        debug!(path = %destination.display(), size = bytes.len(), "Wrote PDF file");
        ConversionOutcome::succeeded(source, destination)
    }
}
