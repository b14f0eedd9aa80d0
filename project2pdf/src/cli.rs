//! Command-line interface for project2pdf: argument parsing, config loading
//! and composition of the core engine.
//!
//! All conversion logic lives in [`project2pdf_core`]. This module only
//! decides which renderer to build and which settings win: flags override
//! the YAML config, which overrides the core defaults.

use crate::load_config::{load_config, CliConfig, RendererSection};
use anyhow::{Context, Result};
use clap::Parser;
use project2pdf_core::config::RunConfig;
use project2pdf_core::contract::Renderer;
use project2pdf_core::engine;
use project2pdf_core::render::{CommandRenderer, CommandSpec, InProcessRenderer};
use project2pdf_core::report::RunStats;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Convert every file of a project tree into PDFs, mirroring its layout
/// into `<dir>_pdf`.
#[derive(Debug, Parser)]
#[clap(name = "project2pdf", version, about)]
pub struct Cli {
    /// Project directory to convert
    #[clap(short = 'd', long = "src-dir", alias = "src_dir")]
    pub src_dir: PathBuf,

    /// Output directory (defaults to `<src-dir>_pdf` next to the source)
    #[clap(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// YAML config file with filter lists, routes and renderer selection
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Number of files converted at once within a directory
    #[clap(short = 'j', long)]
    pub jobs: Option<usize>,
}

impl Cli {
    /// Load the config file (if any) and apply the flags on top of it.
    pub fn resolve(&self) -> Result<(RunConfig, RendererSection)> {
        let file_config = match &self.config {
            Some(path) => load_config(path)?,
            None => CliConfig::default(),
        };
        let renderer = file_config.renderer.clone();
        let mut run_config = file_config.into_run_config(self.src_dir.clone());
        if let Some(output_dir) = &self.output_dir {
            run_config.destination_root = Some(output_dir.clone());
        }
        if let Some(jobs) = self.jobs {
            run_config.concurrency = jobs.max(1);
        }
        Ok((run_config, renderer))
    }
}

/// Build the renderer selected by the config.
pub fn build_renderer(section: &RendererSection) -> Arc<dyn Renderer> {
    match section {
        RendererSection::InProcess => Arc::new(InProcessRenderer::default()),
        RendererSection::Command {
            program,
            args,
            markdown,
        } => {
            let mut renderer =
                CommandRenderer::new(CommandSpec::new(program.clone(), args.clone()));
            if let Some(markdown) = markdown {
                renderer = renderer.with_markdown(markdown.clone().into());
            }
            Arc::new(renderer)
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<RunStats> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let (run_config, renderer_section) = cli.resolve()?;
    run_config.trace_loaded();
    let renderer = build_renderer(&renderer_section);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing current files and stopping");
            on_interrupt.cancel();
        }
    });

    let stats = engine::run(&run_config, renderer, cancel)
        .await
        .with_context(|| format!("cannot convert {}", cli.src_dir.display()))?;
    println!("{stats}");
    Ok(stats)
}
