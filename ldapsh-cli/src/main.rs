//! ldapsh: browse and edit an LDAP directory like a filesystem.

mod commands;
mod completion;
mod line_editor;
mod shell;
mod startup;

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use ldapsh_core::{
    ConnectionStore, DirectoryConnector, DirectoryTree, LdapConnector, MemoryDirectory, Navigator,
    ShellConfig,
};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::line_editor::{InputHistory, LineEditor};
use crate::shell::Shell;
use crate::startup::ConnectArgs;

/// Interactive shell for browsing and editing LDAP directories
#[derive(Parser, Debug)]
#[command(name = "ldapsh", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    /// Store the connection under NAME once connected
    #[arg(long, value_name = "NAME")]
    save: Option<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log everything, including protocol traffic
    #[arg(short, long)]
    debug: bool,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_filter(&self) -> &'static str {
        if self.debug {
            return "trace";
        }
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Human-readable stderr logging plus JSON log files in the data directory.
fn init_tracing(cli: &Cli) -> WorkerGuard {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(EnvFilter::new(cli.log_filter()));

    let log_dir = ldapsh_core::config::data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ldapsh.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();
    guard
}

/// Open the directory to browse. Connections to a server are recorded in
/// the connection store.
fn open_directory(
    cli: &Cli,
    config: &ShellConfig,
    history_path: Option<&Path>,
) -> anyhow::Result<Box<dyn DirectoryConnector>> {
    if let Some(fixture) = &cli.connect.fixture {
        info!(path = %fixture.display(), "Browsing directory fixture");
        return Ok(Box::new(MemoryDirectory::load(fixture)?));
    }

    let mut store = match history_path {
        Some(path) => ConnectionStore::load(path, config.history.max_recent)?,
        None => ConnectionStore::new(config.history.max_recent),
    };
    let data = startup::connection_data(&cli.connect, config, &store)?;

    let mut connector = LdapConnector::connect(&data.uri)?;
    connector.bind(&data.bind_dn, data.password.as_deref().unwrap_or_default())?;
    info!(uri = %connector.uri(), "Connected");

    store.add_recent(data.clone());
    if let Some(name) = &cli.save {
        store.save_connection(name.clone(), data);
    }
    if let Some(path) = history_path
        && let Err(e) = store.save(path)
    {
        warn!(error = %e, "Connection history not saved");
    }

    Ok(Box::new(connector))
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let guard = init_tracing(&cli);

    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if cli.config.is_none() && !ldapsh_core::config::config_exists(Some(&workspace)) {
        debug!("No configuration file found, using defaults");
    }
    let config = ldapsh_core::load_config(Some(&workspace), cli.config.as_deref(), None)
        .context("Configuration error")?;

    let history_path = config.history_path();
    let tree = match open_directory(&cli, &config, history_path.as_deref())
        .and_then(|connector| Ok(DirectoryTree::new(connector)?))
    {
        Ok(tree) => tree,
        Err(e) => {
            error!(error = %e, "Startup failed");
            eprintln!("{e}");
            drop(guard);
            std::process::exit(1);
        }
    };

    let color = config.ui.color && io::stdout().is_terminal();
    let mut shell = Shell::new(commands::registry(), Navigator::new(tree), io::stdout())
        .with_prompt(config.ui.prompt.clone())
        .with_color(color);
    let mut editor = LineEditor::new(InputHistory::new(
        config.input_history_path(),
        config.ui.max_history,
    ));

    shell.run(&mut editor)?;
    debug!("Session ended");
    Ok(())
}
