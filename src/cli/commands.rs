//! CLI command definitions and handlers

use clap::Subcommand;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::core::config::{RunOptions, TranslatorConfig};
use crate::core::errors::DocsError;
use crate::core::models::RunSummary;
use crate::processors::markdown::MarkdownProcessor;
use crate::processors::validate::ValidationReport;

/// Commands for docs-localizer
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate the source tree into the docs tree
    Translate {
        /// English source root
        #[arg(long, default_value = "content")]
        content_dir: PathBuf,

        /// Translated output root
        #[arg(long, default_value = "docs")]
        docs_dir: PathBuf,

        /// Workers AI model (overrides CF_AI_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Only normalize and rewrite, do not call the model
        #[arg(long)]
        no_ai: bool,

        /// Translation cache file
        #[arg(long, default_value = ".translation-cache.json")]
        cache_file: PathBuf,

        /// Anchor/path mapping file (JSON or YAML); built-in tables otherwise
        #[arg(long)]
        mappings: Option<PathBuf>,

        /// Glossary file (JSON or YAML)
        #[arg(long)]
        glossary: Option<PathBuf>,
    },

    /// Re-apply syntax fixes and link rewriting to an existing docs tree
    PostProcess {
        /// Docs root to rewrite in place
        #[arg(long, default_value = "docs")]
        docs_dir: PathBuf,

        /// Anchor/path mapping file (JSON or YAML)
        #[arg(long)]
        mappings: Option<PathBuf>,
    },

    /// Report leftovers and broken links without changing anything
    Validate {
        /// Docs root to check
        #[arg(long, default_value = "docs")]
        docs_dir: PathBuf,

        /// Anchor/path mapping file (JSON or YAML)
        #[arg(long)]
        mappings: Option<PathBuf>,
    },
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}

/// Handle translate command; `Ok(true)` when any output file changed
#[allow(clippy::too_many_arguments)]
pub async fn handle_translate(
    mut config: TranslatorConfig,
    content_dir: PathBuf,
    docs_dir: PathBuf,
    model: Option<String>,
    no_ai: bool,
    cache_file: PathBuf,
    mappings: Option<PathBuf>,
    glossary: Option<PathBuf>,
) -> anyhow::Result<bool> {
    let start_time = Instant::now();

    if let Some(model) = model {
        config.model = model;
    }

    let options = RunOptions {
        content_dir,
        docs_dir,
        cache_file,
        mappings_file: mappings,
        glossary_file: glossary,
        use_ai: !no_ai,
        max_concurrent: config.max_concurrent,
        ..RunOptions::default()
    };

    info!("Starting documentation translation");
    info!("Source: {}", options.content_dir.display());
    info!("Output: {}", options.docs_dir.display());
    if options.use_ai {
        info!("Model: {}", config.model);
    }
    info!("Concurrency: {}", options.max_concurrent);

    let processor = MarkdownProcessor::from_options(options, config)?.with_progress(progress_bar()?);
    let summary = processor.run().await?;

    print_summary("Translation", &summary, start_time);
    Ok(summary.has_changes())
}

/// Handle post-process command; `Ok(true)` when any file changed
pub async fn handle_post_process(
    docs_dir: PathBuf,
    mappings: Option<PathBuf>,
) -> anyhow::Result<bool> {
    let start_time = Instant::now();
    if !docs_dir.is_dir() {
        return Err(DocsError::config(format!(
            "Docs directory '{}' does not exist",
            docs_dir.display()
        ))
        .into());
    }

    info!("Post-processing {}", docs_dir.display());
    let processor = read_only_processor(&docs_dir, mappings)?.with_progress(progress_bar()?);
    let summary = processor.post_process(&docs_dir).await?;

    print_summary("Post-processing", &summary, start_time);
    Ok(summary.has_changes())
}

/// Handle validate command; `Ok(true)` when no issue was found
pub async fn handle_validate(docs_dir: PathBuf, mappings: Option<PathBuf>) -> anyhow::Result<bool> {
    if !docs_dir.is_dir() {
        return Err(DocsError::config(format!(
            "Docs directory '{}' does not exist",
            docs_dir.display()
        ))
        .into());
    }

    info!("Validating {}", docs_dir.display());
    let processor = read_only_processor(&docs_dir, mappings)?;
    let report = processor.validate(&docs_dir).await?;

    print_report(&report);
    Ok(report.is_clean())
}

/// Processor without a translator, resolving links against `docs_dir`
fn read_only_processor(
    docs_dir: &std::path::Path,
    mappings: Option<PathBuf>,
) -> anyhow::Result<MarkdownProcessor> {
    let options = RunOptions {
        content_dir: docs_dir.to_path_buf(),
        docs_dir: docs_dir.to_path_buf(),
        mappings_file: mappings,
        use_ai: false,
        ..RunOptions::default()
    };

    Ok(MarkdownProcessor::from_options(options, TranslatorConfig::default())?)
}

fn print_summary(label: &str, summary: &RunSummary, start_time: Instant) {
    let duration = start_time.elapsed();
    info!("Completed: {} in {:?}", summary, duration);

    println!("\n✅ {} completed!", label);
    println!("   Processed: {}", summary.processed);
    println!("   Changed: {}", summary.changed);
    println!("   Skipped: {}", summary.skipped);
    println!("   Errors: {}", summary.error_count());
    if summary.cache_entries > 0 {
        println!("   Cached translations: {}", summary.cache_entries);
    }
    if let Some(cache_error) = &summary.cache_error {
        println!("   ⚠️  Cache not saved: {}", cache_error);
    }
    println!("   Time: {:?}", duration);

    if !summary.errors.is_empty() {
        println!("\n⚠️  Files with errors:");
        for failure in &summary.errors {
            println!("   [{}] {}: {}", failure.kind, failure.file, failure.message);
        }
    }

    if let Some(report) = &summary.validation {
        print_report(report);
    }
}

fn print_report(report: &ValidationReport) {
    if report.is_clean() {
        println!("\n✅ {}", report);
        return;
    }

    println!("\n⚠️  {}", report);
    for issue in &report.issues {
        println!("   {}", issue);
    }
}
