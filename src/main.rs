use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use hexroute::config::{DatasetConfig, ServerConfig};
use hexroute::query::Algorithm;
use hexroute::server;
use hexroute::spatial::IndexKind;
use hexroute::RouteGraph;

#[derive(Parser)]
#[command(name = "hexroute")]
#[command(about = "H3-hierarchical shortest-path engine", long_about = None)]
struct Cli {
    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP query server
    Serve {
        /// JSON config file with server settings and datasets to preload
        #[arg(long)]
        config: Option<PathBuf>,
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
        /// Host to bind
        #[arg(long)]
        host: Option<String>,
        /// Spatial index for new datasets: h3 or rtree
        #[arg(long)]
        index: Option<String>,
        /// Name for the initial dataset
        #[arg(long, default_value = "default")]
        name: String,
        /// Shortcut Parquet file or directory for the initial dataset
        #[arg(long)]
        shortcuts: Option<PathBuf>,
        /// Edge metadata CSV for the initial dataset
        #[arg(long)]
        edges: Option<PathBuf>,
    },
    /// Run a single edge-to-edge query against dataset files
    Route {
        /// Shortcut Parquet file or directory
        #[arg(long)]
        shortcuts: PathBuf,
        /// Edge metadata CSV
        #[arg(long)]
        edges: PathBuf,
        /// Source edge ID
        #[arg(long)]
        source: u32,
        /// Target edge ID
        #[arg(long)]
        target: u32,
        /// classic, pruned, unidirectional, bidijkstra, dijkstra
        #[arg(long, default_value = "pruned")]
        algorithm: String,
        /// Expand the shortcut path to base edges
        #[arg(long)]
        expand: bool,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // argument errors exit 1; --help/--version exit 0
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    server::init_tracing(&cli.log_format);

    let result = match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            index,
            name,
            shortcuts,
            edges,
        } => run_serve(config, port, host, index, name, shortcuts, edges),
        Commands::Route {
            shortcuts,
            edges,
            source,
            target,
            algorithm,
            expand,
        } => run_route(shortcuts, edges, source, target, &algorithm, expand),
    };

    if let Err(e) = result {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_serve(
    config: Option<PathBuf>,
    port: Option<u16>,
    host: Option<String>,
    index: Option<String>,
    name: String,
    shortcuts: Option<PathBuf>,
    edges: Option<PathBuf>,
) -> Result<()> {
    let mut server_config = match config {
        Some(path) => ServerConfig::from_file(&path)?,
        None => ServerConfig::default(),
    };

    // CLI flags override the config file
    if let Some(port) = port {
        server_config.port = port;
    }
    if let Some(host) = host {
        server_config.host = host;
    }
    if let Some(index) = index {
        if IndexKind::parse(&index).is_none() {
            bail!("unknown index type '{index}' (expected h3 or rtree)");
        }
        server_config.index_type = index;
    }
    if let (Some(shortcuts), Some(edges)) = (shortcuts, edges) {
        server_config.datasets.push(DatasetConfig {
            name,
            shortcuts_path: Some(shortcuts.display().to_string()),
            edges_path: Some(edges.display().to_string()),
            db_path: None,
        });
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(server_config))
}

fn run_route(
    shortcuts: PathBuf,
    edges: PathBuf,
    source: u32,
    target: u32,
    algorithm: &str,
    expand: bool,
) -> Result<()> {
    let Some(algorithm) = Algorithm::parse(algorithm) else {
        bail!("unknown algorithm '{algorithm}'");
    };

    let graph = RouteGraph::load(&shortcuts, &edges)?;
    let result = graph.query(algorithm, source, target)?;

    let expanded = expand.then(|| graph.expand_path(&result.path));
    let output = serde_json::json!({
        "distance": result.distance,
        "shortcut_path": result.path,
        "path": expanded,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
