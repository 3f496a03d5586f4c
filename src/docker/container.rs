//! Idempotent container lifecycle operations.
//!
//! The controller sits between the orchestration layer and the raw engine.
//! It resolves images through the freshness ledger, replaces stale containers
//! instead of tripping over name conflicts, and treats absence as success on
//! teardown so repeated invocations converge on the same state.

use crate::docker::{
    ContainerSpec, DockerError, Engine, ExecResult, ImageCache, MountSpec, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How long a cached image check stays fresh
    pub image_update_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            image_update_interval: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Engine-facing container operations shared by every site command.
pub struct ContainerController {
    engine: Arc<dyn Engine>,
    images: Mutex<ImageCache>,
    config: ControllerConfig,
}

impl ContainerController {
    /// Create a controller over an engine and an image ledger.
    pub fn new(engine: Arc<dyn Engine>, images: ImageCache, config: ControllerConfig) -> Self {
        Self {
            engine,
            images: Mutex::new(images),
            config,
        }
    }

    /// Access the underlying engine.
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Ensure an image is present and fresh enough.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::ImagePull`] if a due pull fails.
    pub async fn ensure_image(&self, image: &str) -> Result<()> {
        let engine = self.engine.clone();
        let image_ref = image.to_string();

        self.images
            .lock()
            .await
            .ensure(image, self.config.image_update_interval, move || async move {
                engine.pull_image(&image_ref).await
            })
            .await
    }

    /// Ensure the named bridge network exists.
    ///
    /// Returns the network ID and whether it had to be created. Existing
    /// networks are never an error.
    pub async fn ensure_network(&self, name: &str) -> Result<(String, bool)> {
        if let Some(id) = self.engine.network_id(name).await? {
            debug!("network {} already exists", name);
            return Ok((id, false));
        }

        let id = self.engine.create_network(name).await?;
        info!("created network: {}", name);
        Ok((id, true))
    }

    /// Create and start a container, replacing any stale one with the same
    /// name first.
    ///
    /// The replace-then-create sequence makes `run` idempotent across
    /// repeated invocations even when the spec changed in between.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::ContainerCreate`] if creation or start fails.
    pub async fn run(&self, spec: &ContainerSpec) -> Result<String> {
        spec.validate()?;
        self.ensure_image(&spec.image).await?;
        self.remove(&spec.name).await?;

        let id = self.engine.create_container(spec).await?;
        self.engine
            .start_container(&spec.name)
            .await
            .map_err(|e| DockerError::ContainerCreate {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        info!("started container: {}", spec.name);
        Ok(id)
    }

    /// Run a short-lived command container to completion and remove it.
    ///
    /// The exit code and captured output are returned even when the post-run
    /// removal fails; removal problems are only logged.
    pub async fn run_and_clean(&self, spec: &ContainerSpec) -> Result<(i64, String)> {
        spec.validate()?;
        self.ensure_image(&spec.image).await?;
        self.remove(&spec.name).await?;

        let run_result = async {
            self.engine.create_container(spec).await?;
            self.engine
                .start_container(&spec.name)
                .await
                .map_err(|e| DockerError::ContainerCreate {
                    name: spec.name.clone(),
                    reason: e.to_string(),
                })?;

            let exit_code = self.engine.wait_container(&spec.name).await?;
            let output = self.engine.container_logs(&spec.name).await?;
            Ok((exit_code, output))
        }
        .await;

        if let Err(e) = self.remove(&spec.name).await {
            warn!("failed to remove command container {}: {}", spec.name, e);
        }

        run_result
    }

    /// Execute a command inside a running container.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::Exec`] if the container is not running or the
    /// exec transport fails. A non-zero exit status is not an error.
    pub async fn exec(
        &self,
        container: &str,
        as_root: bool,
        command: &[String],
    ) -> Result<ExecResult> {
        let user = if as_root { Some("root") } else { None };
        self.engine.exec(container, user, command).await
    }

    /// Stop a container, treating absence as success.
    pub async fn stop(&self, name: &str) -> Result<()> {
        match self.engine.stop_container(name).await {
            Ok(()) => {
                info!("stopped container: {}", name);
                Ok(())
            }
            Err(DockerError::NotFound(_)) => {
                debug!("container {} not present, nothing to stop", name);
                Ok(())
            }
            Err(DockerError::Api(bollard::errors::Error::DockerResponseServerError {
                status_code: 304,
                ..
            })) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Remove a container, treating absence as success.
    pub async fn remove(&self, name: &str) -> Result<()> {
        match self.engine.remove_container(name).await {
            Ok(()) => {
                debug!("removed container: {}", name);
                Ok(())
            }
            Err(DockerError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Restart a running container.
    pub async fn restart(&self, name: &str) -> Result<()> {
        self.engine.restart_container(name).await
    }

    /// Inspect the mounts of a container, yielding an empty list when it
    /// does not exist.
    pub async fn mounts(&self, name: &str) -> Result<Vec<MountSpec>> {
        match self.engine.container_mounts(name).await {
            Ok(mounts) => Ok(mounts),
            Err(DockerError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
