//! kaajal CLI
//!
//! Connects to a single Linux host over SSH, identifies it and provisions it

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use eyre::{WrapErr, eyre};
use kaajal_core::{CURRENT_USER, HostProfile, Privilege, ProvisionResult};
use kaajal_exec::{ConnectionType, SshTransport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod prompt;

use config::{ConnectionSettings, Settings};

/// Packages installed by `setup` when none are given
const DEFAULT_PACKAGES: &str = "git tmux vim";

/// kaajal: single-host Linux provisioning over SSH
#[derive(Parser, Debug)]
#[command(name = "kaajal", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Configuration file
    #[arg(long, env = "KAAJAL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "KAAJAL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write the merged connection settings back to the configuration file
    #[arg(long)]
    save: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// How to authenticate
    #[arg(long, value_enum, env = "KAAJAL_CONNECTION_TYPE")]
    connection_type: Option<ConnectionKind>,

    /// Remote user
    #[arg(short, long, env = "KAAJAL_USER")]
    user: Option<String>,

    /// Password of the remote user
    #[arg(long, env = "KAAJAL_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Host name or address
    #[arg(long, env = "KAAJAL_HOST")]
    host: Option<String>,

    /// Private key file
    #[arg(long, env = "KAAJAL_SSH_KEY")]
    ssh_key: Option<PathBuf>,

    /// OpenSSH client config file
    #[arg(long, env = "KAAJAL_SSH_CONFIG")]
    ssh_config: Option<PathBuf>,

    /// Host alias in the SSH config file
    #[arg(long, env = "KAAJAL_SSH_HOST")]
    ssh_host: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionKind {
    /// User name and password
    User,
    /// User name and private key
    SshKey,
    /// Alias from an SSH config file
    SshHost,
}

impl From<ConnectionKind> for ConnectionType {
    fn from(kind: ConnectionKind) -> Self {
        match kind {
            ConnectionKind::User => ConnectionType::User,
            ConnectionKind::SshKey => ConnectionType::SshKey,
            ConnectionKind::SshHost => ConnectionType::SshHost,
        }
    }
}

impl From<ConnectionArgs> for ConnectionSettings {
    fn from(args: ConnectionArgs) -> Self {
        ConnectionSettings {
            connection_type: args.connection_type.map(Into::into),
            user: args.user,
            password: args.password,
            host: args.host,
            ssh_key: args.ssh_key,
            ssh_config: args.ssh_config,
            ssh_config_host: args.ssh_host,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update the system, then install a base set of packages
    Setup {
        /// Packages to install instead of the defaults
        #[arg(long, num_args = 1..)]
        packages: Vec<String>,
    },
    /// Show distribution, package manager and privilege
    Identify {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure the package manager proxy, refresh and upgrade
    Update,
    /// Install packages
    Install {
        /// Package names
        packages: Vec<String>,

        /// File with one package per line
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Create a user with a home directory and bash shell
    #[command(name = "create-user")]
    CreateUser {
        /// User name
        name: String,

        /// Password of the new user
        #[arg(long, env = "KAAJAL_NEW_USER_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Public key to authorize for the new user
        #[arg(long)]
        ssh_key: Option<PathBuf>,

        /// GitHub token file to deploy for the new user
        #[arg(long)]
        github_token: Option<PathBuf>,
    },
    /// Append a public key to a user's authorized_keys
    #[command(name = "copy-ssh-key")]
    CopySshKey {
        /// Public key file
        path: PathBuf,

        /// Target user, the session user by default
        #[arg(long, default_value = CURRENT_USER)]
        user: String,
    },
    /// Deploy a GitHub token to ~/.config/github/token
    #[command(name = "copy-github-token")]
    CopyGithubToken {
        /// Token file
        path: PathBuf,

        /// Target user, the session user by default
        #[arg(long, default_value = CURRENT_USER)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(Settings::default_path);
    let loaded = match &config_path {
        Some(path) => Settings::load_optional(path)?,
        None => None,
    };
    let found = loaded.is_some();

    let mut settings = loaded.unwrap_or_default();
    settings.connection.merge(cli.connection.into());
    if let Some(level) = cli.log_level {
        settings.log.level = Some(level);
    }

    init_tracing(settings.log_level());

    if !found {
        warn!(path = ?config_path, "no config file found, using defaults");
    }

    prompt::ensure_connection_type(
        &mut settings.connection,
        std::io::stdin().is_terminal(),
        &mut prompt::TerminalPrompter,
    )?;

    if cli.save {
        let path = config_path.ok_or_else(|| eyre!("no configuration directory available"))?;
        settings.save(&path)?;
        info!(path = %path.display(), "configuration saved");
    }

    let connection = settings.connection.to_connection_config()?;

    let transport = Arc::new(SshTransport::new());
    transport
        .connect(&connection)
        .await
        .map_err(kaajal_core::ProvisionError::from)
        .wrap_err("failed to connect")?;

    let outcome = run(transport.clone(), cli.command).await;

    if let Err(e) = transport.close().await {
        warn!(error = %e, "failed to close connection");
    }

    outcome
}

/// Install the fmt subscriber; `RUST_LOG` wins over `level`
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(transport: Arc<SshTransport>, command: Commands) -> Result<()> {
    let mut host = HostProfile::new(transport);
    report(host.identify().await)?;

    match command {
        Commands::Setup { packages } => {
            report(host.update().await)?;
            let packages = if packages.is_empty() {
                DEFAULT_PACKAGES.to_string()
            } else {
                packages.join(" ")
            };
            report(host.install(&packages, None).await)?;
        }
        Commands::Identify { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(host.facts())?);
            } else {
                print_facts(&host);
            }
        }
        Commands::Update => report(host.update().await)?,
        Commands::Install { packages, file } => {
            report(host.install(&packages.join(" "), file.as_deref()).await)?;
        }
        Commands::CreateUser {
            name,
            password,
            ssh_key,
            github_token,
        } => {
            report(
                host.create_new_user(
                    &name,
                    password.as_deref(),
                    ssh_key.as_deref(),
                    github_token.as_deref(),
                )
                .await,
            )?;
            println!("created user {name}");
        }
        Commands::CopySshKey { path, user } => report(host.copy_ssh_key(&path, &user).await)?,
        Commands::CopyGithubToken { path, user } => {
            report(host.copy_github_token(&path, &user).await)?;
        }
    }

    Ok(())
}

/// Print a warning, turn a failure into the process error
fn report(result: ProvisionResult) -> Result<()> {
    let outcome = result?;
    if let Some(warning) = outcome.warning {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

fn print_facts(host: &HostProfile) {
    let facts = host.facts();
    let manager = facts
        .package_manager
        .map_or_else(|| "unknown".to_string(), |m| m.to_string());
    let privilege = if facts.is_root() {
        "root"
    } else if facts.privilege == Privilege::PasswordlessSudo {
        "passwordless sudo"
    } else {
        "none"
    };

    println!("Distribution:    {} ({})", facts.pretty_name, facts.id);
    println!("Package manager: {manager}");
    println!("Remote uid:      {}", facts.remote_uid);
    println!("Privilege:       {privilege}");
}
