use super::read_password;
use crate::client::AdminClient;
use anyhow::{anyhow, Result};
use garage_auth_core::spawn_sweeper;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// Create the first administrator of an empty store
pub async fn execute_init_admin(
    client: &mut AdminClient,
    email: &str,
    name: &str,
    password: Option<String>,
) -> Result<()> {
    let password = read_password(&format!("Enter password for '{}': ", email), password)?;
    match client
        .service()
        .ensure_default_admin(email, name, &password)
        .await?
    {
        Some(user) => println!("✓ Created administrator '{}' ({})", user.email, user.id),
        None => println!("Store already has users; nothing to do"),
    }
    Ok(())
}

/// Log in and print the issued credentials as JSON
pub async fn execute_login(
    client: &mut AdminClient,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = read_password(&format!("Password for '{}': ", email), password)?;
    let outcome = client
        .service()
        .login(email, &password, &client.client_info())
        .await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Run one retention sweep
pub async fn execute_sweep(client: &mut AdminClient) -> Result<()> {
    let report = client.service().sweep().await?;
    println!("Expired sessions removed: {}", report.expired_sessions);
    println!("Revoked sessions removed: {}", report.revoked_sessions);
    println!("Login attempts removed:   {}", report.login_attempts);
    Ok(())
}

/// Sweep periodically until Ctrl+C
pub async fn execute_serve(client: &mut AdminClient) -> Result<()> {
    let period = Duration::from_secs(client.service().config().sessions.sweep_interval_secs);
    if period.is_zero() {
        return Err(anyhow!("sessions.sweep_interval_secs must be greater than 0"));
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper = spawn_sweeper(client.service().clone(), period, shutdown_rx);

    info!("Sweeper running every {:?}; press Ctrl+C to stop", period);
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(());
    let completed = sweeper.await?;
    info!("Sweeper stopped after {} sweeps", completed);
    Ok(())
}
