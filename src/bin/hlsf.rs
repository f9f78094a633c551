//! HLSF CLI: acquire adjacency records and score the graph they form.
//!
//! Usage:
//!   hlsf run <text…> [--depth N] [--fanout N] [--model M]
//!   hlsf ask <prompt…>
//!   hlsf open <token> | ls | export [--dest path] | delete <token>

use clap::{Parser, Subcommand};
use hlsf::acquire::{Acquirer, TokioSleeper};
use hlsf::pipeline::StreamPhase;
use hlsf::record::{is_junk, validate};
use hlsf::{
    CancellationToken, Engine, FileStore, GenerationClient, HlsfConfig, OpenAiClient, OpenStore,
    RecordCache, RecordStore, RunOutcome, SqliteStore, StoreBackend,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "hlsf",
    version,
    about = "LLM-backed adjacency records and a scored, layered knowledge graph"
)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Record store location (directory for files, database for sqlite)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize text, fetch its records and print the scored graph
    Run {
        #[arg(required = true)]
        text: Vec<String>,
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long)]
        fanout: Option<usize>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Answer a prompt, then stream a rewrite informed by the graph
    Ask {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Print the record for a token, acquiring it if needed
    Open { token: String },
    /// List stored tokens
    Ls,
    /// Write every stored record to one JSON file
    Export {
        #[arg(long)]
        dest: Option<PathBuf>,
    },
    /// Delete a stored record
    Delete { token: String },
}

enum Store {
    File(Arc<FileStore>),
    Sqlite(Arc<SqliteStore>),
}

impl Store {
    fn open(config: &HlsfConfig) -> Result<Self, String> {
        let path = config.store_path();
        let store = match config.store.backend {
            StoreBackend::File => FileStore::open(&path).map(|s| Store::File(Arc::new(s))),
            StoreBackend::Sqlite => SqliteStore::open(&path).map(|s| Store::Sqlite(Arc::new(s))),
        };
        store.map_err(|e| format!("Failed to open store at {}: {}", path.display(), e))
    }

    fn records(&self) -> Arc<dyn RecordStore> {
        match self {
            Store::File(s) => s.clone(),
            Store::Sqlite(s) => s.clone(),
        }
    }

    fn export(&self, dest: Option<&Path>, config: &HlsfConfig) -> Result<PathBuf, String> {
        match self {
            Store::File(s) => s.export_to(dest).map_err(|e| e.to_string()),
            Store::Sqlite(s) => {
                let dest = dest.map(Path::to_path_buf).unwrap_or_else(|| {
                    config.store_path().with_file_name("export.json")
                });
                let bundle = s.export_all().map_err(|e| e.to_string())?;
                let json = serde_json::to_string_pretty(&bundle).map_err(|e| e.to_string())?;
                std::fs::write(&dest, json)
                    .map_err(|e| format!("Failed to write {}: {}", dest.display(), e))?;
                Ok(dest)
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<HlsfConfig, String> {
    let mut config = HlsfConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(store) = &cli.store {
        config.store.path = Some(store.clone());
    }
    Ok(config)
}

fn open_engine(config: &HlsfConfig, store: &Store) -> Result<Engine, String> {
    let mut builder = OpenAiClient::builder()
        .base_url(config.llm.base_url.clone())
        .timeout_secs(config.llm.timeout_secs);
    if let Some(key) = &config.llm.api_key {
        builder = builder.api_key(key.clone());
    }
    let client: Arc<dyn GenerationClient> =
        Arc::new(builder.build().map_err(|e| e.to_string())?);
    let acquirer = Acquirer::new(client.clone())
        .with_config(config.acquire_config())
        .with_sleeper(Arc::new(TokioSleeper));
    let cache = Arc::new(RecordCache::new(store.records(), Arc::new(acquirer)));
    Ok(Engine::new(cache, client, config.engine_options()))
}

/// Cancel the run on Ctrl-C; committed records stay saved.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            handle.cancel();
        }
    });
    cancel
}

fn print_outcome(outcome: &RunOutcome) {
    let scored = &outcome.scored;
    println!("Emergent thoughts:");
    for line in &scored.narrative {
        println!("  - {}", line);
    }
    if !scored.ranking.is_empty() {
        println!();
        println!("{:<4}  {:<28}  {:>8}  {:>5}", "RANK", "TOKEN", "SCORE", "LAYER");
        println!("{}", "-".repeat(52));
        for (i, ranked) in scored.ranking.iter().take(10).enumerate() {
            println!(
                "{:<4}  {:<28}  {:>8.3}  {:>5}",
                i + 1,
                ranked.token,
                ranked.score,
                scored.insight.layer(&ranked.token).as_str()
            );
        }
    }
    if !scored.bridges.is_empty() {
        println!();
        println!("Bridges:");
        for bridge in scored.bridges.iter().take(5) {
            println!(
                "  {} ↔ {}  (gap {}, w {:.2})",
                bridge.a, bridge.b, bridge.layer_gap, bridge.weight
            );
        }
    }
    println!();
    println!("{}", outcome.log.report());
}

async fn cmd_run(
    mut config: HlsfConfig,
    text: Vec<String>,
    depth: Option<usize>,
    fanout: Option<usize>,
    model: Option<String>,
) -> Result<(), String> {
    if let Some(depth) = depth {
        config.depth = depth;
    }
    if let Some(fanout) = fanout {
        config.fanout = fanout;
    }
    if let Some(model) = model {
        config.model = model;
    }
    config.validate().map_err(|e| e.to_string())?;

    let store = Store::open(&config)?;
    let engine = open_engine(&config, &store)?;
    let outcome = engine
        .run(&text.join(" "), &cancel_on_interrupt())
        .await
        .map_err(|e| e.to_string())?;
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_ask(config: HlsfConfig, prompt: Vec<String>) -> Result<(), String> {
    let store = Store::open(&config)?;
    let engine = open_engine(&config, &store)?;
    let mut stdout = std::io::stdout();
    let mut current = None;
    let outcome = engine
        .ask(&prompt.join(" "), &cancel_on_interrupt(), |phase, chunk| {
            if current != Some(phase) {
                let header = match phase {
                    StreamPhase::Answer => "Answer:\n",
                    StreamPhase::Reflection => "\n\nRefined answer:\n",
                };
                let _ = write!(stdout, "{}", header);
                current = Some(phase);
            }
            let _ = write!(stdout, "{}", chunk);
            let _ = stdout.flush();
        })
        .await
        .map_err(|e| e.to_string())?;
    println!();
    println!();
    print_outcome(&outcome);
    Ok(())
}

async fn cmd_open(config: HlsfConfig, token: String) -> Result<(), String> {
    let store = Store::open(&config)?;
    let stored = store.records().load(&token).map_err(|e| e.to_string())?;
    let record = match stored.filter(|r| validate(r).is_ok() && !is_junk(r)) {
        Some(record) => record,
        None => {
            let engine = open_engine(&config, &store)?;
            let (record, _) = engine
                .cache()
                .get_or_acquire(&token, &config.model, &cancel_on_interrupt())
                .await
                .map_err(|e| e.to_string())?;
            record
        }
    };
    let json = serde_json::to_string_pretty(&record).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn cmd_ls(config: HlsfConfig) -> Result<(), String> {
    let tokens = Store::open(&config)?
        .records()
        .list()
        .map_err(|e| e.to_string())?;
    if tokens.is_empty() {
        println!("No records stored.");
    }
    for token in tokens {
        println!("{}", token);
    }
    Ok(())
}

fn cmd_export(config: HlsfConfig, dest: Option<PathBuf>) -> Result<(), String> {
    let store = Store::open(&config)?;
    let path = store.export(dest.as_deref(), &config)?;
    println!("Exported records to {}", path.display());
    Ok(())
}

fn cmd_delete(config: HlsfConfig, token: String) -> Result<(), String> {
    let store = Store::open(&config)?;
    match store.records().delete(&token).map_err(|e| e.to_string())? {
        true => {
            println!("Deleted '{}'", token);
            Ok(())
        }
        false => Err(format!("no record for '{}'", token)),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hlsf=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run {
            text,
            depth,
            fanout,
            model,
        } => cmd_run(config, text, depth, fanout, model).await,
        Commands::Ask { prompt } => cmd_ask(config, prompt).await,
        Commands::Open { token } => cmd_open(config, token).await,
        Commands::Ls => cmd_ls(config),
        Commands::Export { dest } => cmd_export(config, dest),
        Commands::Delete { token } => cmd_delete(config, token),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
