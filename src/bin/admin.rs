//! Groupwarden admin CLI
//!
//! Run with: cargo run --features cli --bin groupwarden-admin -- --db ./data show

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use groupwarden::{Authorizer, Config, LmdbStore};

#[derive(Parser)]
#[command(name = "groupwarden-admin", about = "Manage groups and permissions in a groupwarden store")]
struct Cli {
    /// LMDB directory
    #[arg(long, default_value = "./groupwarden-data")]
    db: PathBuf,

    /// JSON configuration file (guards, defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a group, optionally with pipe-separated permissions
    CreateGroup {
        name: String,
        guard: Option<String>,
        permissions: Option<String>,
    },

    /// Create a permission
    CreatePermission { name: String, guard: Option<String> },

    /// Show a permissions × groups table per guard
    Show { guard: Option<String> },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> groupwarden::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    let authz = Authorizer::new(LmdbStore::open(&cli.db)?, config)?;

    match cli.command {
        Command::CreateGroup { name, guard, permissions } => {
            let group = authz.provision_group(&name, guard.as_deref(), permissions.as_deref())?;
            println!("Group `{}` created", group.name);
        }
        Command::CreatePermission { name, guard } => {
            let permission = authz.find_or_create_permission(&name, guard.as_deref())?;
            println!("Permission `{}` created", permission.name);
        }
        Command::Show { guard } => {
            let guards = match guard {
                Some(g) => vec![g],
                None => authz.guards_in_use()?,
            };
            for guard in guards {
                println!("Guard: {guard}");
                print!("{}", authz.permission_matrix(&guard)?);
                println!();
            }
        }
    }
    Ok(())
}
