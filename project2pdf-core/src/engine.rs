//! Top-level run: validate the roots, walk the source tree, dispatch every
//! mirrored directory, and report.
//!
//! Only the checks made before anything is touched on disk are fatal. Once
//! the destination root has been recreated, every failure is confined to its
//! directory or file and the walk always reaches the end (or a cancellation).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RunConfig;
use crate::contract::Renderer;
use crate::dispatch::ConversionDispatcher;
use crate::filter::FilterContext;
use crate::mirror::{default_destination_root, DirectoryMirror, MirrorError, WalkStep};
use crate::report::{RunReporter, RunStats};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid input directory: {0}")]
    SourceNotFound(PathBuf),
    #[error("input path is not a directory: {0}")]
    SourceNotDirectory(PathBuf),
    #[error("output directory {destination} lies inside input directory {source_root}")]
    DestinationInsideSource {
        source_root: PathBuf,
        destination: PathBuf,
    },
    #[error("output directory {destination} contains input directory {source_root}")]
    DestinationContainsSource {
        source_root: PathBuf,
        destination: PathBuf,
    },
    #[error("cannot resolve output directory {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Absolute, validated roots for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRoots {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Check the preconditions of a run without touching the filesystem.
pub fn resolve_roots(
    source_root: &Path,
    destination_root: Option<&Path>,
) -> Result<RunRoots, RunError> {
    let source = source_root
        .canonicalize()
        .map_err(|_| RunError::SourceNotFound(source_root.to_path_buf()))?;
    if !source.is_dir() {
        return Err(RunError::SourceNotDirectory(source));
    }

    let destination = match destination_root {
        Some(path) => std::path::absolute(path).map_err(|source| RunError::Destination {
            path: path.to_path_buf(),
            source,
        })?,
        None => default_destination_root(&source),
    };
    // Compare against the canonical form when the destination already exists.
    let comparable = destination.canonicalize().unwrap_or_else(|_| destination.clone());

    if comparable.starts_with(&source) {
        return Err(RunError::DestinationInsideSource {
            source_root: source,
            destination,
        });
    }
    if source.starts_with(&comparable) {
        return Err(RunError::DestinationContainsSource {
            source_root: source,
            destination,
        });
    }
    Ok(RunRoots {
        source,
        destination,
    })
}

/// Convert the whole tree described by `config` with `renderer`.
pub async fn run(
    config: &RunConfig,
    renderer: Arc<dyn Renderer>,
    cancel: CancellationToken,
) -> Result<RunStats, RunError> {
    let roots = resolve_roots(&config.source_root, config.destination_root.as_deref())?;
    info!(
        source = %roots.source.display(),
        destination = %roots.destination.display(),
        "Starting conversion run"
    );

    let reporter = RunReporter::start();
    let mirror = DirectoryMirror::new(&roots.source, &roots.destination);
    if let Err(e) = mirror.prepare() {
        error!(path = %roots.destination.display(), error = %e, "Cannot create output directory");
        return Err(e.into());
    }

    let mut filter = FilterContext::new(&roots.source, config.blacklist.clone());
    let dispatcher = ConversionDispatcher::new(renderer, config.registry.clone())
        .with_concurrency(config.concurrency);

    Ok(walk(&mirror, &dispatcher, &mut filter, reporter, &cancel).await)
}

async fn walk(
    mirror: &DirectoryMirror,
    dispatcher: &ConversionDispatcher,
    filter: &mut FilterContext,
    mut reporter: RunReporter,
    cancel: &CancellationToken,
) -> RunStats {
    let mut steps = mirror.walk();
    loop {
        if cancel.is_cancelled() {
            warn!("Cancellation requested, stopping the walk");
            break;
        }
        let Some(step) = steps.next_step(filter) else {
            break;
        };
        match step {
            WalkStep::Mirrored(dir) => {
                reporter.directory_visited();
                dispatcher
                    .process_directory(&dir, filter, &mut reporter, cancel)
                    .await;
            }
            WalkStep::Skipped(_) => reporter.directory_skipped(),
            WalkStep::Failed { .. } => reporter.directory_failed(),
        }
    }
    reporter.finish(cancel.is_cancelled())
}
