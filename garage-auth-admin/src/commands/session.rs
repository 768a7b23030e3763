use crate::client::AdminClient;
use anyhow::Result;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum SessionCommands {
    /// List your active sessions
    List,
    /// Revoke one of your sessions by the prefix shown in `session list`
    Revoke {
        /// Handle prefix (at least 8 characters)
        prefix: String,
    },
    /// Revoke all of your sessions
    LogoutAll,
}

pub async fn execute_session_command(
    client: &mut AdminClient,
    command: SessionCommands,
) -> Result<()> {
    let actor = client.actor()?.clone();
    let service = client.service().clone();

    match command {
        SessionCommands::List => {
            let sessions = service.list_sessions(actor.user_id).await?;
            println!(
                "\n{:<12} {:<20} {:<20} {:<16} {}",
                "SESSION", "CREATED", "EXPIRES", "ADDRESS", "AGENT"
            );
            println!("{}", "-".repeat(90));
            for session in &sessions {
                println!(
                    "{:<12} {:<20} {:<20} {:<16} {}",
                    format!("{}...", session.prefix),
                    session.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    session.expires_at.format("%Y-%m-%d %H:%M").to_string(),
                    session.origin_address.as_deref().unwrap_or("-"),
                    session.origin_agent.as_deref().unwrap_or("-"),
                );
            }
            println!("\n{} active session(s)", sessions.len());
        }

        SessionCommands::Revoke { prefix } => {
            let prefix = prefix.trim_end_matches("...");
            let revoked = service.revoke_session_by_prefix(actor.user_id, prefix).await?;
            println!("✓ Revoked {} session(s)", revoked);
        }

        SessionCommands::LogoutAll => {
            let revoked = service.logout_all(actor.user_id).await?;
            println!("✓ Revoked {} session(s)", revoked);
        }
    }

    Ok(())
}
