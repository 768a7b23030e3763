use anyhow::{anyhow, Context, Result};
use garage_auth_core::{AuthConfig, AuthService, ClientInfo, MemoryStore, Principal};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

const CLIENT_AGENT: &str = concat!("garage-auth-admin/", env!("CARGO_PKG_VERSION"));

/// Local handle on the credential layer, backed by a snapshot file
pub struct AdminClient {
    service: Arc<AuthService>,
    store: Arc<MemoryStore>,
    snapshot_path: PathBuf,
    actor: Option<Principal>,
    session_handle: Option<String>,
}

impl AdminClient {
    /// Load the snapshot named by the configuration and build the service
    pub fn open(config: AuthConfig) -> Result<Self> {
        let snapshot_path = config.storage.snapshot_path.clone();
        let store = Arc::new(
            MemoryStore::load(&snapshot_path)
                .with_context(|| format!("Failed to open store at {}", snapshot_path.display()))?,
        );
        let service = Arc::new(
            AuthService::new(config, store.clone()).context("Failed to start auth service")?,
        );

        Ok(Self {
            service,
            store,
            snapshot_path,
            actor: None,
            session_handle: None,
        })
    }

    pub fn service(&self) -> &Arc<AuthService> {
        &self.service
    }

    pub fn client_info(&self) -> ClientInfo {
        ClientInfo::new().with_agent(CLIENT_AGENT)
    }

    /// Log in as an existing account; later commands run with its rights
    pub async fn act_as(&mut self, email: &str, password: &str) -> Result<&Principal> {
        debug!("Authenticating as {}", email);
        let outcome = self
            .service
            .login(email, password, &self.client_info())
            .await
            .with_context(|| format!("Login as {} failed", email))?;
        let principal = self.service.authenticate(&outcome.access_token).await?;

        self.session_handle = Some(outcome.session_handle);
        Ok(self.actor.insert(principal))
    }

    /// The acting account, required by user and session commands
    pub fn actor(&self) -> Result<&Principal> {
        self.actor
            .as_ref()
            .ok_or_else(|| anyhow!("This command requires --as <email>"))
    }

    /// End the CLI's own session and write the snapshot back
    pub async fn finish(mut self) -> Result<()> {
        if let Some(handle) = self.session_handle.take() {
            self.service.logout(&handle).await?;
        }
        self.persist()
    }

    pub fn persist(&self) -> Result<()> {
        self.store
            .save(&self.snapshot_path)
            .with_context(|| format!("Failed to save store to {}", self.snapshot_path.display()))?;
        debug!("Saved store to {}", self.snapshot_path.display());
        Ok(())
    }
}
