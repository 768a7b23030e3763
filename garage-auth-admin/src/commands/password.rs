use super::read_password;
use crate::client::AdminClient;
use anyhow::Result;
use clap::Subcommand;
use garage_auth_core::validate_strength;

#[derive(Subcommand)]
pub enum PasswordCommands {
    /// Check a candidate password against the strength policy
    Check {
        /// Candidate password (will prompt if not provided)
        candidate: Option<String>,
    },
    /// Print the bcrypt hash of a password
    Hash {
        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

pub async fn execute_password_command(
    client: &mut AdminClient,
    command: PasswordCommands,
) -> Result<()> {
    match command {
        PasswordCommands::Check { candidate } => {
            let candidate = read_password("Password to check: ", candidate)?;
            let violations = validate_strength(&candidate);
            if violations.is_empty() {
                println!("✓ Password meets the policy");
            } else {
                println!("✗ Password does not meet the policy:");
                for violation in &violations {
                    println!("  - {}", violation);
                }
            }
        }

        PasswordCommands::Hash { password } => {
            let password = read_password("Password to hash: ", password)?;
            let hash = client.service().hasher().hash(&password).await?;
            println!("{}", hash);
        }
    }

    Ok(())
}
