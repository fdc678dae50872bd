//! LLM Explorer - browse the LLM catalogue site from a terminal, online or
//! offline.
//!
//! Every command opens a page session: the cache worker is registered
//! (precaching the site on a new cache version) and all reads go through it.

mod prompt;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use llm_explorer_core::cache::CacheStorage;
use llm_explorer_core::install::{BrowserEnvironment, DisplayMode, InstallOutcome};
use llm_explorer_core::net::{Request, ResponseSource};
use llm_explorer_core::utils::{format_age, format_bytes, format_date, truncate_string};
use llm_explorer_core::{Config, ModelRecord, PageSession, WebAppManifest};

use prompt::TerminalPrompt;

/// Width of the description column in the model list
const DESCRIPTION_WIDTH: usize = 60;

#[derive(Parser)]
#[command(
    name = "llm-explorer",
    version,
    about = "Browse the LLM Explorer site with an offline cache"
)]
struct Cli {
    /// Never touch the network; serve everything from the cache
    #[arg(long, global = true)]
    offline: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the cache worker and precache the site
    Precache,
    /// Fetch a site path through the cache and print the body
    Fetch {
        /// Site path, e.g. /learn
        path: String,
    },
    /// List the model catalogue, or show one model
    Models {
        /// Model id
        id: Option<String>,
    },
    /// List cache generations on disk
    Generations,
    /// Print the web application manifest
    Manifest,
    /// Report install state and offer to install
    Install(InstallArgs),
}

#[derive(Args)]
struct InstallArgs {
    /// Display mode the app is running in
    #[arg(long, default_value = "browser")]
    display_mode: DisplayMode,

    /// User agent of the browser
    #[arg(long, env = "LLM_EXPLORER_USER_AGENT", default_value = "")]
    user_agent: String,

    /// Document referrer
    #[arg(long, default_value = "")]
    referrer: String,

    /// navigator.standalone as reported by iOS Safari
    #[arg(long)]
    ios_standalone: bool,

    /// Offer the install prompt on this terminal
    #[arg(long)]
    prompt: bool,
}

impl InstallArgs {
    fn environment(&self) -> BrowserEnvironment {
        BrowserEnvironment {
            display_mode: self.display_mode,
            user_agent: self.user_agent.clone(),
            navigator_standalone: self.ios_standalone.then_some(true),
            referrer: self.referrer.clone(),
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load().context("Failed to load configuration")?;
    info!(origin = %config.origin, base_path = %config.base_path, "LLM Explorer starting");

    match cli.command {
        Command::Precache => precache(&config, cli.offline).await,
        Command::Fetch { path } => fetch(&config, cli.offline, &path).await,
        Command::Models { id } => models(&config, cli.offline, id.as_deref()).await,
        Command::Generations => generations(&config),
        Command::Manifest => {
            println!("{}", WebAppManifest::for_base_path(&config.base_path).to_json()?);
            Ok(())
        }
        Command::Install(args) => install(&config, cli.offline, &args).await,
    }
}

async fn precache(config: &Config, offline: bool) -> Result<()> {
    let session = PageSession::open(config, None, offline).await?;
    let status = session
        .worker_status()
        .await
        .ok_or_else(|| anyhow::anyhow!("Offline cache is unavailable"))?;

    println!("Cache version: {}", status.generation);
    println!("Worker state:  {}", status.state);
    match status.controller {
        Some(controller) => println!("Serving from:  {}", controller),
        None => println!("Serving from:  network"),
    }
    Ok(())
}

async fn fetch(config: &Config, offline: bool, path: &str) -> Result<()> {
    let session = PageSession::open(config, None, offline).await?;
    let response = session
        .fetch(path)
        .await
        .with_context(|| format!("Failed to fetch {}", path))?;

    let source = match response.source {
        ResponseSource::Cache => "cache",
        ResponseSource::Network => "network",
    };
    eprintln!(
        "{} {} ({}, {})",
        response.status,
        response.url,
        source,
        format_bytes(response.body.len())
    );
    io::stdout().write_all(&response.body)?;
    Ok(())
}

async fn models(config: &Config, offline: bool, id: Option<&str>) -> Result<()> {
    let session = PageSession::open(config, None, offline).await?;
    let catalogue = session.catalogue().await?;

    match id {
        Some(id) => {
            let model = catalogue
                .find(id)
                .ok_or_else(|| anyhow::anyhow!("No model with id {}", id))?;
            print_model(model);
        }
        None => {
            for model in catalogue.models() {
                println!(
                    "{:<16} {:<24} {:<14} {}",
                    model.id,
                    model.name,
                    model.creator,
                    truncate_string(&model.description, DESCRIPTION_WIDTH)
                );
            }
            eprintln!("{} models", catalogue.len());
        }
    }
    Ok(())
}

fn print_model(model: &ModelRecord) {
    println!("{} ({})", model.name, model.id);
    println!("Creator:  {}", model.creator);
    println!("Released: {}", format_date(&model.release_date));
    println!();
    println!("{}", model.description);

    for (title, items) in [
        ("Key features", &model.key_features),
        ("Use cases", &model.use_cases),
        ("Limitations", &model.limitations),
    ] {
        if items.is_empty() {
            continue;
        }
        println!();
        println!("{}:", title);
        for item in items {
            println!("  - {}", item);
        }
    }

    println!();
    match model.narration() {
        Some(audio) => println!("Narration: {}", audio),
        None => println!("Narration: not available"),
    }
}

fn generations(config: &Config) -> Result<()> {
    let storage = CacheStorage::disk(config.storage_dir()?)?;
    let names = storage.keys()?;
    if names.is_empty() {
        println!("No cache generations. Run `llm-explorer precache` first.");
        return Ok(());
    }

    for name in names {
        let marker = if name == config.cache_version.as_str() {
            "*"
        } else {
            " "
        };
        let entries = storage.entry_count(&name)?;
        let state = if storage.is_complete(&name)? {
            "complete"
        } else {
            "incomplete"
        };
        println!("{} {:<24} {:<10} {} entries", marker, name, state, entries);
    }

    let current = storage.handle(config.cache_version.clone());
    let site = config.site()?;
    for path in config.resources.paths() {
        let request = Request::get(site.url_for(path)?);
        let state = match current.entry(&request)? {
            Some(entry) => format!(
                "{} {}, {}",
                entry.meta.status,
                format_bytes(entry.body.len()),
                format_age(entry.age_minutes())
            ),
            None => "missing".to_string(),
        };
        println!("  {:<28} {}", path, state);
    }
    Ok(())
}

async fn install(config: &Config, offline: bool, args: &InstallArgs) -> Result<()> {
    let mut session = PageSession::open(config, Some(args.environment()), offline).await?;

    if args.prompt && !session.install().is_installed() {
        // This terminal plays the platform: offer the prompt up front
        session
            .install_mut()
            .on_before_install_prompt(Box::new(TerminalPrompt::new()));
    }

    match session.install_mut().trigger_install().await {
        InstallOutcome::Prompted(choice) => {
            info!(?choice, "Install prompt answered");
            if session.install().is_installed() {
                println!("LLM Explorer installed. The cached site is available offline.");
            } else {
                println!("Installation dismissed.");
            }
        }
        InstallOutcome::PromptFailed(e) => {
            println!("{}", e);
            print!("{}", session.install().manual_instructions());
        }
        InstallOutcome::AlreadyInstalled => println!("LLM Explorer is already installed."),
        InstallOutcome::Manual(instructions) => print!("{}", instructions),
    }
    Ok(())
}
