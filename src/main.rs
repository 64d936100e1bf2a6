use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use proofsync::config::Settings;
use proofsync::http::{build_router, AppState};
use proofsync::{telemetry, verify_chain, ChainStore, JsonFileStore, Ledger};

#[derive(Parser)]
#[clap(name = "proofsync", version, about = "Proof-of-work ledger for verifiable achievements")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[clap(short, long, value_parser, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and the chain explorer (default)
    Serve {
        /// Address to listen on
        #[clap(long, value_parser)]
        bind: Option<SocketAddr>,
        /// Chain file
        #[clap(long, value_parser)]
        chain_path: Option<PathBuf>,
        /// Leading zero hex digits required of mined blocks
        #[clap(long, value_parser)]
        difficulty: Option<usize>,
    },
    /// Check linkage, digests and proof-of-work of the stored chain
    Verify {
        #[clap(long, value_parser)]
        chain_path: Option<PathBuf>,
    },
    /// Print the stored chain
    Show {
        #[clap(long, value_parser)]
        chain_path: Option<PathBuf>,
        /// Dump the raw JSON records instead of a summary
        #[clap(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    telemetry::init(&settings.log_filter);

    match cli.command.unwrap_or(Command::Serve {
        bind: None,
        chain_path: None,
        difficulty: None,
    }) {
        Command::Serve {
            bind,
            chain_path,
            difficulty,
        } => {
            if let Some(bind) = bind {
                settings.bind_addr = bind;
            }
            if let Some(path) = chain_path {
                settings.chain_path = path;
            }
            if let Some(difficulty) = difficulty {
                settings.difficulty = difficulty;
            }
            serve(settings).await
        }
        Command::Verify { chain_path } => {
            verify(&chain_path.unwrap_or(settings.chain_path), settings.difficulty)
        }
        Command::Show { chain_path, json } => show(&chain_path.unwrap_or(settings.chain_path), json),
    }
}

async fn serve(settings: Settings) -> Result<()> {
    info!(?settings, "starting proofsync");
    let store = JsonFileStore::new(&settings.chain_path);
    let ledger = Ledger::open(store, settings.ledger_options())
        .with_context(|| format!("failed to open chain at {}", settings.chain_path.display()))?;
    info!(length = ledger.chain().len(), difficulty = ledger.difficulty(), "ledger ready");

    let app = build_router(AppState::new(ledger));
    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!("listening on http://{}", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

fn load_stored(path: &Path) -> Result<Vec<proofsync::Block>> {
    match JsonFileStore::new(path).load()? {
        Some(chain) => Ok(chain),
        None => bail!("no chain stored at {}", path.display()),
    }
}

fn verify(path: &Path, difficulty: usize) -> Result<()> {
    let chain = load_stored(path)?;
    let faults = verify_chain(&chain, difficulty);
    if faults.is_empty() {
        println!("{}: {} block(s), chain valid at difficulty {}", path.display(), chain.len(), difficulty);
        return Ok(());
    }
    for fault in &faults {
        println!("{fault}");
    }
    bail!("{} fault(s) found in {}", faults.len(), path.display())
}

fn show(path: &Path, json: bool) -> Result<()> {
    let chain = load_stored(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&chain)?);
        return Ok(());
    }
    for block in &chain {
        println!(
            "#{:<5} {}  nonce={:<8} score={:<6} {} / {}",
            block.index,
            block.hash.chars().take(16).collect::<String>(),
            block.nonce,
            block.score.to_string(),
            block.user_id,
            block.task_type,
        );
    }
    Ok(())
}
