//! `load_config` module: loads the optional YAML config file and maps it onto
//! the core [`RunConfig`].
//!
//! This is the only place where user-supplied YAML is parsed. Command-line
//! flags are applied on top of the loaded values by [`crate::cli`].
//!
//! # Accepted schema
//! ```yaml
//! output_dir: ./out          # optional
//! concurrency: 4             # optional
//! filter:                    # merged into the default blacklist
//!   directories: [target]
//!   files: [Cargo.lock]
//!   extensions: [png]
//! routes:                    # extension routes, by pipeline
//!   markdown: [mdx]
//!   generic: [txt]
//! renderer:
//!   kind: command            # or in_process (default)
//!   program: code2pdf
//!   args: ["-l"]
//! ```
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.

use anyhow::Result;
use project2pdf_core::config::RunConfig;
use project2pdf_core::contract::ConverterKind;
use project2pdf_core::filter::Blacklist;
use project2pdf_core::render::CommandSpec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    pub output_dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub filter: Option<Blacklist>,
    #[serde(default)]
    pub routes: BTreeMap<ConverterKind, Vec<String>>,
    #[serde(default)]
    pub renderer: RendererSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RendererSection {
    #[default]
    InProcess,
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// Separate converter for markdown files.
        #[serde(default)]
        markdown: Option<MarkdownCommand>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarkdownCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl From<MarkdownCommand> for CommandSpec {
    fn from(c: MarkdownCommand) -> Self {
        CommandSpec::new(c.program, c.args)
    }
}

impl CliConfig {
    /// Fold this config into a core run config for `source_root`.
    pub fn into_run_config(self, source_root: PathBuf) -> RunConfig {
        let mut run = RunConfig::new(source_root);
        run.destination_root = self.output_dir;
        if let Some(concurrency) = self.concurrency {
            run.concurrency = concurrency.max(1);
        }
        if let Some(filter) = self.filter {
            run.blacklist.extend(filter);
        }
        for (kind, extensions) in self.routes {
            for extension in extensions {
                run.registry.register(extension, kind);
            }
        }
        run
    }
}

/// Loads and parses the YAML config file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file is a valid, empty config.
    if config_content.trim().is_empty() {
        return Ok(CliConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
