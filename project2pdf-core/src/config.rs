use std::path::PathBuf;

use tracing::{debug, info};

use crate::filter::Blacklist;
use crate::registry::ConverterRegistry;

/// Everything one run needs, apart from the renderer.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_root: PathBuf,
    /// Defaults to `<source_root>_pdf` when unset.
    pub destination_root: Option<PathBuf>,
    pub blacklist: Blacklist,
    pub registry: ConverterRegistry,
    /// Conversions in flight per directory; `1` converts files one by one.
    pub concurrency: usize,
}

impl RunConfig {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            destination_root: None,
            blacklist: Blacklist::default(),
            registry: ConverterRegistry::default(),
            concurrency: default_concurrency(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            source_root = %self.source_root.display(),
            destination_root = ?self.destination_root,
            concurrency = self.concurrency,
            "Loaded RunConfig"
        );
        debug!(?self, "RunConfig loaded (full debug)");
    }
}

/// One conversion per available CPU.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
