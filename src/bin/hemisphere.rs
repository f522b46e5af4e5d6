//! Hemisphere CLI: insight graph builds, workshop import and MCP server.
//!
//! Usage:
//!   hemisphere graph <workshop> [--run-type live] [--db path] [--config file]
//!   hemisphere workshops [--db path]
//!   hemisphere import <bundle.json> [--db path]
//!   hemisphere mcp [--transport stdio] [--db path] [--config file]
//!
//! JSON and tables go to stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use hemisphere::{
    GraphAssembler, HemisphereApi, HemisphereConfig, HttpNarrativeClient, NarrativeClient,
    OpenSource, SqliteSource, DEFAULT_RUN_TYPE,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "hemisphere",
    version,
    about = "Cross-participant insight graph synthesis"
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the hemisphere graph for a workshop run and print it as JSON
    Graph {
        /// Workshop ID
        workshop_id: String,
        /// Run type
        #[arg(long, default_value = DEFAULT_RUN_TYPE)]
        run_type: String,
        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },
    /// List workshop runs with completed sessions
    Workshops,
    /// Import a workshop bundle (JSON) into the database
    Import {
        /// Path to the bundle file
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Start the MCP (Model Context Protocol) server
    Mcp {
        /// Transport type (currently only stdio)
        #[arg(long, default_value = "stdio")]
        transport: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Get the default database path (~/.local/share/hemisphere/hemisphere.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("hemisphere").join("hemisphere.db")
}

fn load_config(path: Option<&Path>) -> Result<HemisphereConfig, String> {
    match path {
        Some(path) => HemisphereConfig::from_yaml_file(path).map_err(|e| e.to_string()),
        None => Ok(HemisphereConfig::default()),
    }
}

fn open_source(db: Option<PathBuf>) -> Result<SqliteSource, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteSource::open(&db_path)
        .map_err(|e| format!("Failed to open database at {}: {}", db_path.display(), e))
}

fn build_api(db: Option<PathBuf>, config: &HemisphereConfig) -> Result<HemisphereApi, String> {
    let source = open_source(db)?;
    let client = if config.narrative.enabled {
        match HttpNarrativeClient::from_config(&config.narrative) {
            Ok(http) => {
                let http: Arc<dyn NarrativeClient> = Arc::new(http);
                Some(http)
            }
            Err(e) => {
                tracing::warn!(error = %e, "narrative client unavailable, using fallback sentences");
                None
            }
        }
    } else {
        None
    };
    let assembler = GraphAssembler::new(config, client);
    Ok(HemisphereApi::new(Arc::new(source), Arc::new(assembler)))
}

fn with_api(
    db: Option<PathBuf>,
    config: &HemisphereConfig,
    run: impl FnOnce(HemisphereApi) -> i32,
) -> i32 {
    match build_api(db, config) {
        Ok(api) => run(api),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_graph(api: &HemisphereApi, workshop_id: &str, run_type: &str, compact: bool) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            return 1;
        }
    };
    let response = rt.block_on(api.hemisphere_graph(workshop_id, run_type));
    let json = if compact {
        serde_json::to_string(&response)
    } else {
        serde_json::to_string_pretty(&response)
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    }
    if response.is_ok() {
        0
    } else {
        1
    }
}

fn cmd_workshops(api: &HemisphereApi) -> i32 {
    let workshops = match api.list_workshops() {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if workshops.is_empty() {
        println!("No workshops imported.");
        return 0;
    }
    println!("{:<36}  {:<16}  {:>8}", "WORKSHOP", "RUN TYPE", "SESSIONS");
    println!("{}", "-".repeat(64));
    for w in workshops {
        println!("{:<36}  {:<16}  {:>8}", w.workshop_id, w.run_type, w.session_count);
    }
    0
}

fn cmd_import(source: &SqliteSource, path: &Path) -> i32 {
    let json = match std::fs::read_to_string(path) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", path.display(), e);
            return 1;
        }
    };
    match source.import_json(&json) {
        Ok(count) => {
            println!("Imported {} session(s) from {}", count, path.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Import { path } => match open_source(cli.db) {
            Ok(source) => cmd_import(&source, &path),
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Graph {
            workshop_id,
            run_type,
            compact,
        } => with_api(cli.db, &config, |api| {
            cmd_graph(&api, &workshop_id, &run_type, compact)
        }),
        Commands::Workshops => with_api(cli.db, &config, |api| cmd_workshops(&api)),
        Commands::Mcp { transport } => {
            if transport != "stdio" {
                eprintln!("error: only 'stdio' transport is currently supported");
                1
            } else {
                with_api(cli.db, &config, hemisphere::mcp::run_mcp_server)
            }
        }
    };
    std::process::exit(code);
}
