//! Main entry point for the docs-localizer CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docs_localizer::cli::commands::{self, Commands};
use docs_localizer::TranslatorConfig;

/// docs-localizer - translate an English Markdown docs tree into a Chinese site
#[derive(Parser, Debug)]
#[command(name = "docs-localizer", version, about, long_about = None)]
struct Args {
    /// Cloudflare API token (defaults to CLOUDFLARE_API_TOKEN env var)
    #[arg(long)]
    api_token: Option<String>,

    /// Cloudflare account ID (defaults to CLOUDFLARE_ACCOUNT_ID env var)
    #[arg(long)]
    account_id: Option<String>,

    /// Translator settings as JSON, instead of environment variables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Maximum files processed concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}={}", env!("CARGO_CRATE_NAME"), level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn translator_config(args: &Args) -> anyhow::Result<TranslatorConfig> {
    let mut config = match &args.config {
        Some(path) => TranslatorConfig::from_file(path)?,
        None => TranslatorConfig::from_env()?,
    };

    // Override config with CLI args if provided
    if let Some(api_token) = &args.api_token {
        config.api_token = api_token.clone();
    }
    if let Some(account_id) = &args.account_id {
        config.account_id = account_id.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.max_concurrent = concurrency;
    }

    Ok(config)
}

/// `Ok(true)` maps to exit code 0, `Ok(false)` to 1
async fn run(args: Args) -> anyhow::Result<bool> {
    let config = translator_config(&args)?;

    match args.command {
        Some(Commands::Translate {
            content_dir,
            docs_dir,
            model,
            no_ai,
            cache_file,
            mappings,
            glossary,
        }) => {
            commands::handle_translate(
                config,
                content_dir,
                docs_dir,
                model,
                no_ai,
                cache_file,
                mappings,
                glossary,
            )
            .await
        }
        Some(Commands::PostProcess { docs_dir, mappings }) => {
            commands::handle_post_process(docs_dir, mappings).await
        }
        Some(Commands::Validate { docs_dir, mappings }) => {
            commands::handle_validate(docs_dir, mappings).await
        }
        None => {
            println!("Please specify a command. Use --help for more information.");
            Ok(false)
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();
    init_tracing(args.verbose);

    let code = match run(args).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("❌ {:#}", e);
            2
        }
    };

    std::process::exit(code);
}
