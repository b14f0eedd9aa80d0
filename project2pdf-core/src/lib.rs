#![doc = "project2pdf-core: core engine for project2pdf."]

//! Mirrors a source directory tree into `<root>_pdf` and converts every
//! eligible file into a PDF, one directory at a time.
//!
//! # Usage
//! Build a [`config::RunConfig`], pick a [`contract::Renderer`] from
//! [`render`], and call [`engine::run`].

pub mod code_to_pdf;
pub mod config;
pub mod contract;
pub mod dispatch;
pub mod engine;
pub mod filter;
pub mod markdown_to_pdf;
pub mod mirror;
pub mod registry;
pub mod render;
pub mod report;
