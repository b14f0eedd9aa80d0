//! Extension → pipeline routing.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;

use crate::contract::ConverterKind;

/// Lookup table from file extension to the pipeline that renders it.
///
/// Extensions are matched without the leading dot and case-sensitively.
/// Anything without a route, including files without an extension, goes to
/// the fallback pipeline.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    routes: HashMap<String, ConverterKind>,
    fallback: ConverterKind,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        let mut registry = Self::with_fallback(ConverterKind::Generic);
        registry.register("md", ConverterKind::Markdown);
        registry.register("markdown", ConverterKind::Markdown);
        registry
    }
}

impl ConverterRegistry {
    /// An empty table routing everything to `fallback`.
    pub fn with_fallback(fallback: ConverterKind) -> Self {
        Self {
            routes: HashMap::new(),
            fallback,
        }
    }

    /// Route `extension` to `kind`, returning the previous route if any.
    pub fn register(
        &mut self,
        extension: impl Into<String>,
        kind: ConverterKind,
    ) -> Option<ConverterKind> {
        let extension = extension.into();
        let extension = extension.trim_start_matches('.').to_string();
        self.routes.insert(extension, kind)
    }

    pub fn resolve(&self, extension: Option<&str>) -> ConverterKind {
        extension
            .and_then(|ext| self.routes.get(ext))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Resolve by file name, using the text after the last dot.
    pub fn resolve_name(&self, name: impl AsRef<OsStr>) -> ConverterKind {
        let extension = Path::new(name.as_ref()).extension().and_then(|ext| ext.to_str());
        self.resolve(extension)
    }
}
