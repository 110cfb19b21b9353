use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::SystemTime;
use error::CliError;
use syncbox_core::types::{Address, AppConfig, Config};
use syncbox_core::{FileUpload, SyncCore};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "syncbox")]
#[command(about = "Share text and files between devices through a short address")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "SYNCBOX_CONFIG", default_value = "syncbox.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate a random address
    Generate,
    /// Claim a custom address
    Claim { token: String },
    /// Show whether an address is live (renews it if so)
    Status { address: String },
    /// Text operations
    Text {
        #[command(subcommand)]
        command: TextCommands,
    },
    /// Upload a file
    Upload {
        address: String,
        path: PathBuf,
        /// Display name, defaults to the file name
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = "application/octet-stream")]
        mime: String,
    },
    /// Download a file into `dest`
    Download {
        address: String,
        id: String,
        dest: PathBuf,
    },
    /// List texts and files, newest first
    List { address: String },
    /// Delete one file
    RmFile { address: String, id: String },
    /// Delete everything stored under an address
    Purge { address: String },
    /// Run the expiry sweep once
    Sweep,
    /// Show limits in effect
    Info,
    /// Write a config file with default values
    InitConfig,
}

#[derive(Subcommand)]
enum TextCommands {
    /// Save a text; reads stdin when no content is given
    Put {
        address: String,
        content: Option<String>,
    },
    List {
        address: String,
    },
    Get {
        address: String,
        id: String,
    },
    Rm {
        address: String,
        id: String,
    },
}

mod error {
    use syncbox_core::SyncError;
    use syncbox_core::types::AppConfigError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum CliError {
        #[error(transparent)]
        Sync(#[from] SyncError),

        #[error("Config error: {0}")]
        Config(#[from] AppConfigError),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("Output error: {0}")]
        Output(#[from] serde_json::Error),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncbox=info,syncbox_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<Config, CliError> {
    let app_config = AppConfig::load(path)?;

    let errors = app_config.validate();
    if errors.is_empty() {
        return Ok(Config::from(&app_config));
    }
    for error in &errors {
        warn!(path = %path.display(), "{error}, using default");
    }
    Ok(Config::from(&app_config.with_defaults_for_invalid()))
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn parse_address(s: &str) -> Result<Address, CliError> {
    Address::try_from(s).map_err(|e| CliError::Sync(e.into()))
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::InitConfig = cli.command {
        AppConfig::default().save(&cli.config)?;
        info!(path = %cli.config.display(), "config written");
        return Ok(());
    }

    let core = SyncCore::open(load_config(&cli.config)?)?;
    let now = SystemTime::now();

    match cli.command {
        Commands::Generate => print_json(&core.generate_random_address(now)?),
        Commands::Claim { token } => print_json(&core.create_custom_address(&token, now)?),
        Commands::Status { address } => {
            print_json(&core.check_address_status(&parse_address(&address)?, now)?)
        }
        Commands::Text { command } => run_text(&core, command, now),
        Commands::Upload {
            address,
            path,
            name,
            mime,
        } => {
            let original_name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "upload".to_string())
            });
            let upload = FileUpload {
                original_name,
                mime_type: mime,
            };
            let file = std::fs::File::open(&path)?;
            print_json(&core.upload_reader(&parse_address(&address)?, file, upload, now)?)
        }
        Commands::Download { address, id, dest } => {
            let mut download = core.download_file(&parse_address(&address)?, &id, now)?;
            let mut out = std::fs::File::create(&dest)?;
            std::io::copy(&mut download.file, &mut out)?;
            print_json(&download.metadata)
        }
        Commands::List { address } => {
            print_json(&core.list_items(&parse_address(&address)?, now)?)
        }
        Commands::RmFile { address, id } => {
            core.delete_file(&parse_address(&address)?, &id, now)?;
            Ok(())
        }
        Commands::Purge { address } => {
            print_json(&core.delete_all(&parse_address(&address)?, now)?)
        }
        Commands::Sweep => print_json(&core.sweep(now)?),
        Commands::Info => print_json(&core.limits()),
        Commands::InitConfig => Ok(()),
    }
}

fn run_text(core: &SyncCore, command: TextCommands, now: SystemTime) -> Result<(), CliError> {
    match command {
        TextCommands::Put { address, content } => {
            let content = match content {
                Some(content) => content,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            print_json(&core.save_text(&parse_address(&address)?, &content, now)?)
        }
        TextCommands::List { address } => {
            print_json(&core.list_texts(&parse_address(&address)?, now)?)
        }
        TextCommands::Get { address, id } => {
            print_json(&core.get_text(&parse_address(&address)?, &id, now)?)
        }
        TextCommands::Rm { address, id } => {
            core.delete_text(&parse_address(&address)?, &id, now)?;
            Ok(())
        }
    }
}
