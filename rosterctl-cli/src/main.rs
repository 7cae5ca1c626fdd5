//! rosterctl CLI - sections and students from the command line
//!
//! - `sections`: list sections
//! - `students`: list students, by section or login
//! - `add-student`: insert a student, creating its section if needed, atomically
//! - `migrate`: create the tables

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

mod commands;
mod config;
mod render;
mod tracing_setup;

use commands::Settings;
use config::{ConnectionArgs, RosterConfig};

#[derive(Parser, Debug)]
#[command(
    name = "rosterctl",
    author,
    version,
    about = "Query sections and students, and enroll students atomically"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (defaults to ./rosterctl.toml, then ~/.rosterctl/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List sections as `<id> - <name>`
    Sections(commands::SectionsArgs),
    /// List students
    Students(commands::StudentsArgs),
    /// Add a student, creating the section first if it does not exist
    AddStudent(commands::AddStudentArgs),
    /// Create or update the database schema
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be in the environment before clap reads PG* variables
    let dotenv_files = config::load_dotenv();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug })?;
    for path in &dotenv_files {
        debug!("Loaded .env from {}", path.display());
    }

    let file_config = RosterConfig::load(cli.config.as_deref())?;
    let (connection, session) = cli.connection.resolve(file_config)?;
    debug!(?connection, ?session, "resolved settings");
    let settings = Settings {
        connection,
        session,
    };

    match cli.command {
        Commands::Sections(args) => commands::run_sections(&settings, args).await,
        Commands::Students(args) => commands::run_students(&settings, args).await,
        Commands::AddStudent(args) => commands::run_add_student(&settings, args).await,
        Commands::Migrate => commands::run_migrate(&settings).await,
    }
}
