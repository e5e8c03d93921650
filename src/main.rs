//! Fanyi CLI - translate an EPUB into Simplified Chinese.

use anyhow::{Context, Result};
use clap::Parser;
use fanyi::config::{self, Config};
use fanyi::console::Console;
use fanyi::{OpenAiConnector, Orchestrator, ParserKind, RotationPool, RunOptions, Translator};
use std::path::PathBuf;

/// Translate an EPUB into Simplified Chinese, resuming interrupted runs.
#[derive(Parser, Debug)]
#[command(name = "fanyi")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the EPUB file to translate.
    epub: PathBuf,

    /// API key to use (repeatable; overrides FANYI_API_KEYS and GOOGLE_API_KEY).
    #[arg(long = "api-key", value_name = "KEY")]
    api_keys: Vec<String>,

    /// Model to use (repeatable; overrides the config file).
    #[arg(long = "model", value_name = "MODEL")]
    models: Vec<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long)]
    base_url: Option<String>,

    /// File whose content replaces the default translation prompt.
    #[arg(long, value_name = "FILE")]
    prompt_file: Option<PathBuf>,

    /// Directory for the translated EPUB.
    #[arg(long, default_value = ".", value_name = "DIR")]
    output_dir: PathBuf,

    /// Workspace directory (default: ./temp_epub_translation_<name>).
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Configuration file to use instead of the default location.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Document parser strategy.
    #[arg(long, value_enum)]
    parser: Option<ParserKind>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Disable diagnostic logging.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);
    let console = Console::new();

    console.section("Fanyi - EPUB Translator");

    console.step("Loading configuration...");
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);

    if !config.api.is_configured() {
        let config_path = match &args.config {
            Some(path) => path.clone(),
            None => Config::config_path()?,
        };
        console.error(&format!(
            "No API key provided. Pass --api-key, set {} or {}, or edit: {}",
            config::KEYS_ENV,
            config::GOOGLE_KEY_ENV,
            config_path.display()
        ));
        anyhow::bail!(fanyi::RunError::NoCredentials);
    }
    if config.models().is_empty() {
        console.error("No model configured. Pass --model or set api.models in the config file.");
        anyhow::bail!(fanyi::RunError::NoModels);
    }

    config.validate().context("Invalid configuration")?;
    console.success("Configuration loaded");

    let prompt = resolve_prompt(&config, args.prompt_file.as_deref(), &console);
    let credentials = config.credentials();
    let models = config.models();
    console.info(&format!(
        "{} API keys, models: {}",
        console.count(credentials.len()),
        models.join(", ")
    ));

    let connector = OpenAiConnector::new(&config.api);
    let pool = RotationPool::new(Box::new(connector), credentials, models);
    let translator = Translator::new(prompt, config.translation.clone());
    let parser = args.parser.unwrap_or(config.document.parser);
    let mut orchestrator = Orchestrator::new(translator, pool, parser);

    let options = RunOptions {
        epub_path: args.epub.clone(),
        output_dir: args.output_dir.clone(),
        workspace_dir: args.temp_dir.clone(),
    };

    let summary = orchestrator
        .run(&options)
        .await
        .with_context(|| format!("Failed to translate {}", args.epub.display()))?;

    console.section("Done!");
    console.info(&format!(
        "Processed {} files, skipped {}, failed {}",
        console.count(summary.processed),
        console.count(summary.skipped),
        console.count(summary.failed)
    ));
    console.success(&format!("Output: {}", summary.output_path.display()));
    if !summary.workspace_removed {
        console.warning(&format!(
            "Run again to retry failed files; workspace kept at {}",
            summary.workspace.display()
        ));
    }

    Ok(())
}

/// Applies command-line and environment overrides on top of the config file.
fn apply_overrides(config: &mut Config, args: &Args) {
    let keys_env = std::env::var(config::KEYS_ENV).ok();
    let google_env = std::env::var(config::GOOGLE_KEY_ENV).ok();
    if let Some(keys) =
        config::credential_override(&args.api_keys, keys_env.as_deref(), google_env.as_deref())
    {
        config.api.keys = keys;
    }

    if !args.models.is_empty() {
        config.api.models = args.models.clone();
    }

    if let Some(base_url) = &args.base_url {
        config.api.base_url = base_url.clone();
    }
}

/// Returns the prompt from `--prompt-file` if usable, otherwise the configured one.
fn resolve_prompt(config: &Config, prompt_file: Option<&std::path::Path>, console: &Console) -> String {
    let Some(path) = prompt_file else {
        return config.prompts.translation.clone();
    };

    match config::read_prompt_file(path) {
        Some(prompt) => {
            console.info(&format!("Using custom prompt from {}", path.display()));
            prompt
        }
        None => {
            console.warning(&format!(
                "Prompt file '{}' is missing or empty, using the default prompt",
                path.display()
            ));
            config.prompts.translation.clone()
        }
    }
}

/// Initializes diagnostic logging.
fn init_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
