use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use garage_auth_core::{init_logging, AuthConfig};
use std::path::PathBuf;
use tracing::{error, info};

mod client;
mod commands;

use client::AdminClient;
use commands::*;

#[derive(Parser)]
#[command(name = "garage-auth-admin")]
#[command(about = "Garage back office credential administration")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "garage-auth.toml")]
    config: PathBuf,

    /// Act as this account (required by user and session commands)
    #[arg(long = "as", global = true)]
    as_email: Option<String>,

    /// Password of the acting account (will prompt if not provided)
    #[arg(long = "as-password", global = true)]
    as_password: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the first administrator of an empty store
    InitAdmin {
        /// Administrator email
        #[arg(long)]
        email: String,
        /// Administrator display name
        #[arg(long, default_value = "Administrator")]
        name: String,
        /// Administrator password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Log in and print the issued access token and session handle
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// User management commands
    User {
        #[command(subcommand)]
        action: UserCommands,
    },
    /// Session commands for the acting account
    Session {
        #[command(subcommand)]
        action: SessionCommands,
    },
    /// Password policy and hashing helpers
    Password {
        #[command(subcommand)]
        action: PasswordCommands,
    },
    /// Remove expired sessions and old login attempts once
    Sweep,
    /// Run the periodic sweeper until Ctrl+C
    Serve,
}

impl Commands {
    fn needs_actor(&self) -> bool {
        matches!(self, Commands::User { .. } | Commands::Session { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AuthConfig::load(&cli.config)?;
    config.apply_env_overrides()?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    info!("garage-auth-admin v{} starting", env!("CARGO_PKG_VERSION"));

    let mut client = AdminClient::open(config)?;

    let result = run(&mut client, cli).await;
    let saved = client.finish().await;

    match result {
        Ok(_) => {
            saved?;
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            if let Err(save_error) = saved {
                error!("{:#}", save_error);
            }
            Err(e)
        }
    }
}

async fn run(client: &mut AdminClient, cli: Cli) -> Result<()> {
    if cli.command.needs_actor() {
        let email = cli
            .as_email
            .as_deref()
            .context("This command requires --as <email>")?;
        let password = read_password(&format!("Password for '{}': ", email), cli.as_password.clone())?;
        client.act_as(email, &password).await?;
    }

    match cli.command {
        Commands::InitAdmin {
            email,
            name,
            password,
        } => execute_init_admin(client, &email, &name, password).await,
        Commands::Login { email, password } => execute_login(client, &email, password).await,
        Commands::User { action } => execute_user_command(client, action).await,
        Commands::Session { action } => execute_session_command(client, action).await,
        Commands::Password { action } => execute_password_command(client, action).await,
        Commands::Sweep => execute_sweep(client).await,
        Commands::Serve => execute_serve(client).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_create() {
        let cli = Cli::try_parse_from([
            "garage-auth-admin",
            "--as",
            "admin@garage.example",
            "user",
            "create",
            "mech@garage.example",
            "--name",
            "Mechanic",
            "--role",
            "mechanic",
        ])
        .unwrap();
        assert!(cli.command.needs_actor());
        assert_eq!(cli.as_email.as_deref(), Some("admin@garage.example"));
    }

    #[test]
    fn test_invalid_role_is_rejected() {
        let result = Cli::try_parse_from([
            "garage-auth-admin",
            "user",
            "set-role",
            "mech@garage.example",
            "superuser",
        ]);
        assert!(result.is_err());
    }
}
