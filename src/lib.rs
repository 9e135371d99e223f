//! docs-localizer - English Markdown documentation tree to Chinese site
//!
//! This library masks code and markup, translates the remaining prose through
//! an AI completion backend, repairs documentation-specific syntax, and
//! rewrites site URLs and anchors so the output tree links to itself.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod core;
pub mod processors;

// Re-export key types for convenience
pub use core::{
    cache::TranslationCache,
    client::{AsyncTranslator, CompletionBackend, WorkersAiBackend},
    config::{RunOptions, TranslatorConfig},
    errors::{DocsError, Result, TranslationError},
    mappings::{Glossary, MappingConfig},
    models::RunSummary,
};

pub use processors::{
    links::LinkRewriter,
    markdown::MarkdownProcessor,
    validate::ValidationReport,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
