//! persistree CLI - inspect and drive persisted store state

use clap::{Args, Parser, Subcommand};
use persistree_cli::{load_config, load_state, reduce_file, StorageDir};
use persistree_core::{PersistedSetting, StateTree, DEFAULT_STORAGE_NAME};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "persistree")]
#[command(about = "persistree - persisted state for in-memory stores")]
#[command(version)]
struct Cli {
    /// Storage directory
    #[arg(short, long, default_value = "./persistree-data")]
    data_dir: PathBuf,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Store id
    #[arg(short, long)]
    id: String,

    /// JSON file with the store's initial state
    #[arg(short, long)]
    state: PathBuf,

    /// JSON `persisted` setting (true, false or a record); all top-level keys when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List keys held by a storage
    Keys {
        #[arg(short, long, default_value = DEFAULT_STORAGE_NAME)]
        storage: String,
    },

    /// Print a stored item
    Show {
        key: String,

        #[arg(short, long, default_value = DEFAULT_STORAGE_NAME)]
        storage: String,
    },

    /// Delete a stored item
    Remove {
        key: String,

        #[arg(short, long, default_value = DEFAULT_STORAGE_NAME)]
        storage: String,
    },

    /// List storages in the data directory
    Storages,

    /// Print the view of a state file restricted to paths
    Reduce {
        #[arg(short, long)]
        state: PathBuf,

        /// Dotted path, repeatable
        #[arg(short, long = "path", required = true)]
        paths: Vec<String>,
    },

    /// Print a store's state after restoring from storage
    Restore {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Apply a state file as a mutation and persist it
    Commit {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Roll paths (all when none given) back to the initial state
    Hydrate {
        #[command(flatten)]
        store: StoreArgs,

        /// Dotted path, repeatable
        #[arg(short, long = "path")]
        paths: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(cli.command, &cli.data_dir)
}

fn run(command: Commands, data_dir: &Path) -> anyhow::Result<()> {
    let open = || -> anyhow::Result<StorageDir> {
        info!("Using storage at {}", data_dir.display());
        StorageDir::open(data_dir)
    };

    match command {
        Commands::Keys { storage } => {
            let keys = open()?.keys(&storage)?;
            if keys.is_empty() {
                println!("No keys in storage '{}'.", storage);
            }
            for key in keys {
                println!("{}", key);
            }
        }

        Commands::Show { key, storage } => match open()?.show(&storage, &key)? {
            Some(item) => println!("{}", item),
            None => {
                eprintln!("Error: no item '{}' in storage '{}'", key, storage);
                std::process::exit(1);
            }
        },

        Commands::Remove { key, storage } => {
            if open()?.remove(&storage, &key)? {
                println!("Removed '{}' from '{}'", key, storage);
            } else {
                println!("'{}' was not in '{}'", key, storage);
            }
        }

        Commands::Storages => {
            for name in open()?.storage_names() {
                println!("{}", name);
            }
        }

        Commands::Reduce { state, paths } => {
            print_tree(&reduce_file(&state, &paths)?)?;
        }

        Commands::Restore { store } => {
            let (id, state, config) = store.load()?;
            print_tree(&open()?.restore(&id, state, config)?)?;
        }

        Commands::Commit { store } => {
            let (id, state, config) = store.load()?;
            print_tree(&open()?.commit(&id, state, config)?)?;
        }

        Commands::Hydrate { store, paths } => {
            let (id, state, config) = store.load()?;
            print_tree(&open()?.hydrate(&id, state, config, &paths)?)?;
        }
    }

    Ok(())
}

impl StoreArgs {
    fn load(self) -> anyhow::Result<(String, StateTree, PersistedSetting)> {
        let state = load_state(&self.state)?;
        let config = load_config(self.config.as_deref())?;
        Ok((self.id, state, config))
    }
}

fn print_tree(tree: &StateTree) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(tree)?);
    Ok(())
}
