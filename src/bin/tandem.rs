//! Tandem CLI: replay editing sessions and inspect stored projects.
//!
//! Usage:
//!   tandem run <script.yaml> [--db path] [--config path] [-v]
//!   tandem projects [--db path]
//!   tandem show <project-id> [--db path]
//!   tandem delete <project-id> [--db path]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tandem::{
    ProjectEventProcessorRegistry, ProjectId, Script, ScriptRunner, SqliteEditingContextManager,
    TandemConfig,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "tandem",
    version,
    about = "Per-project collaborative event processing"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script and print every payload as a JSON line
    Run {
        /// Script file
        script: PathBuf,
    },
    /// List stored projects
    Projects,
    /// Print a stored project's editing context as JSON
    Show {
        project_id: String,
    },
    /// Delete a stored project
    Delete {
        project_id: String,
    },
}

/// Get the default database path (~/.local/share/tandem/tandem.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("tandem").join("tandem.db")
}

fn init_logging(config: &TandemConfig, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        Level::from_str(&config.log_level).unwrap_or(Level::INFO)
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber is already installed");
    }
}

fn open_store(db: Option<PathBuf>, config: &TandemConfig) -> Result<SqliteEditingContextManager, String> {
    let db_path = db
        .or_else(|| config.database.clone())
        .unwrap_or_else(default_db_path);
    SqliteEditingContextManager::open(&db_path)
        .map_err(|e| format!("Failed to open database {}: {}", db_path.display(), e))
}

fn parse_project_id(raw: &str) -> Result<ProjectId, String> {
    ProjectId::from_str(raw).map_err(|e| format!("invalid project id '{}': {}", raw, e))
}

async fn cmd_run(store: SqliteEditingContextManager, config: &TandemConfig, path: &PathBuf) -> i32 {
    let script = match Script::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let registry = ProjectEventProcessorRegistry::new(config.services(Arc::new(store)));
    let result = ScriptRunner::new(&registry).run(script).await;
    registry.shutdown_all().await;

    match result {
        Ok(report) => {
            for event in &report.events {
                match serde_json::to_string(event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        return 1;
                    }
                }
            }
            eprintln!(
                "Replayed {} payloads for project {}",
                report.events.len(),
                report.project_id
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_projects(store: &SqliteEditingContextManager) -> i32 {
    let projects = match store.list_projects() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if projects.is_empty() {
        println!("No projects stored.");
        return 0;
    }
    println!("{:<36}  {:<24}  {:>7}  {:>15}", "ID", "NAME", "OBJECTS", "REPRESENTATIONS");
    println!("{}", "-".repeat(88));
    for project in projects {
        println!(
            "{:<36}  {:<24}  {:>7}  {:>15}",
            project.id, project.name, project.object_count, project.representation_count
        );
    }
    0
}

fn cmd_show(store: &SqliteEditingContextManager, raw_id: &str) -> i32 {
    let project_id = match parse_project_id(raw_id) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match store.load(&project_id) {
        Ok(Some(ctx)) => match serde_json::to_string_pretty(&ctx) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Ok(None) => {
            eprintln!("Error: project '{}' not found", project_id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_delete(store: &SqliteEditingContextManager, raw_id: &str) -> i32 {
    let project_id = match parse_project_id(raw_id) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match store.delete_project(&project_id) {
        Ok(true) => {
            println!("Deleted project {}", project_id);
            0
        }
        Ok(false) => {
            eprintln!("Error: project '{}' not found", project_id);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match TandemConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => TandemConfig::default(),
    };
    init_logging(&config, cli.verbose);

    let store = match open_store(cli.db, &config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Run { script } => cmd_run(store, &config, &script).await,
        Commands::Projects => cmd_projects(&store),
        Commands::Show { project_id } => cmd_show(&store, &project_id),
        Commands::Delete { project_id } => cmd_delete(&store, &project_id),
    };
    std::process::exit(code);
}
