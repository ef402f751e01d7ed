//! memoire-mcp — stdio tool-dispatch server exposing the conversational
//! memory engine (Store, Hermès, Sbire) to MCP clients over JSON-RPC.

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use memoire_core::{Hermes, Sbire, Store};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;
use crate::tools::AppState;

struct Args {
    data_dir: Option<PathBuf>,
    knowledge_dir: Option<PathBuf>,
}

fn parse_args() -> Args {
    let argv: Vec<String> = std::env::args().collect();
    let mut args = Args { data_dir: None, knowledge_dir: None };
    let mut i = 1;

    while i < argv.len() {
        match argv[i].as_str() {
            "--help" | "-h" => {
                println!("memoire-mcp {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("MCP stdio server exposing search_memory, search_files, the knowledge");
                println!("tools, explore_links and inspect_memory.");
                println!();
                println!("USAGE:");
                println!("    memoire-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help                 Print help information");
                println!("    -V, --version              Print version information");
                println!("    --data-dir <PATH>          Directory holding memoire.db and fragments/");
                println!("    --knowledge-dir <PATH>     Directory holding the knowledge *.md files");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                   Log level filter (e.g. debug, info, warn, error)");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("memoire-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                let Some(path) = argv.get(i) else {
                    eprintln!("error: --data-dir requires a path argument");
                    std::process::exit(1);
                };
                args.data_dir = Some(PathBuf::from(path));
            }
            "--knowledge-dir" => {
                i += 1;
                let Some(path) = argv.get(i) else {
                    eprintln!("error: --knowledge-dir requires a path argument");
                    std::process::exit(1);
                };
                args.knowledge_dir = Some(PathBuf::from(path));
            }
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'memoire-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    args
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "memoire", "core")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() {
    let args = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("memoire-mcp v{} starting...", env!("CARGO_PKG_VERSION"));

    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        error!("Failed to create data directory {}: {}", data_dir.display(), e);
        std::process::exit(1);
    }

    let db_path = data_dir.join("memoire.db");
    let fragments_root = data_dir.join("fragments");
    let knowledge_dir = args.knowledge_dir.unwrap_or_else(|| data_dir.join("knowledge"));

    if let Err(e) = std::fs::create_dir_all(&fragments_root) {
        error!("Failed to create fragments directory {}: {}", fragments_root.display(), e);
        std::process::exit(1);
    }
    if let Err(e) = std::fs::create_dir_all(&knowledge_dir) {
        error!("Failed to create knowledge directory {}: {}", knowledge_dir.display(), e);
        std::process::exit(1);
    }

    let store = match Store::open(Some(db_path)) {
        Ok(s) => {
            info!("Store initialized successfully");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize store: {}", e);
            std::process::exit(1);
        }
    };

    let hermes = Arc::new(Hermes::new(store.clone(), fragments_root.clone()));
    let sbire = Arc::new(Sbire::new(store.clone(), fragments_root.clone()));
    let state = AppState { store, hermes, sbire, knowledge_dir, fragments_root };

    let server = McpServer::new(state);
    let transport = StdioTransport::new();

    info!("Starting MCP server on stdio...");
    if let Err(e) = transport.run(server).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("memoire-mcp shutting down");
}
