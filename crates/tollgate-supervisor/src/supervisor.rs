//! Sequenced startup and teardown of the two children.

use tracing::info;

use tollgate_settings::SupervisorSettings;

use crate::errors::Result;
use crate::process::{ManagedProcess, ProcessRole, ProcessSpec};

/// Supervises the backend service and the frontend dev server.
///
/// Startup is sequenced: the frontend is not launched until the
/// backend's port has opened, so the first page load never races the
/// API. Shutdown runs in reverse order and kills rather than waits.
pub struct Supervisor {
    backend: ManagedProcess,
    frontend: ManagedProcess,
}

impl Supervisor {
    /// Build both children from settings without starting them.
    pub fn from_settings(settings: &SupervisorSettings) -> Self {
        Self {
            backend: ManagedProcess::new(ProcessSpec::from_settings(
                ProcessRole::Backend,
                &settings.backend,
            )),
            frontend: ManagedProcess::new(ProcessSpec::from_settings(
                ProcessRole::Frontend,
                &settings.frontend,
            )),
        }
    }

    /// Start both children in order, waiting for each to become ready.
    pub async fn start(&self) -> Result<()> {
        self.backend.start().await?;
        self.backend.wait_for_ready().await?;
        self.frontend.start().await?;
        self.frontend.wait_for_ready().await?;
        info!("all children running");
        Ok(())
    }

    /// Kill both children, frontend first.
    pub async fn shutdown(&self) {
        self.frontend.shutdown().await;
        self.backend.shutdown().await;
    }

    /// The backend child.
    pub fn backend(&self) -> &ManagedProcess {
        &self.backend
    }

    /// The frontend child.
    pub fn frontend(&self) -> &ManagedProcess {
        &self.frontend
    }
}
