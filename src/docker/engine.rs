//! Engine capability trait and container spec types.
//!
//! The orchestration layer never talks to bollard directly. It consumes the
//! [`Engine`] trait, which models the daemon operations this tool needs:
//! listing, container lifecycle, networks, image pulls, mount inspection and
//! in-container exec. [`crate::docker::DockerEngine`] is the production
//! implementation; tests substitute an in-memory fake.

use crate::docker::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Specification for a container to be created.
///
/// Environment variables keep their insertion order so that repeated runs of
/// the same site produce identical containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Logical container name, unique per site and role
    pub name: String,
    /// Image reference, e.g. `wordpress:php8.2`
    pub image: String,
    /// Name of the user-defined network to attach to
    pub network: String,
    /// Hostname inside the network
    pub hostname: String,
    /// Ordered `KEY=value` environment assignments
    pub env: Vec<String>,
    /// Container labels
    pub labels: HashMap<String, String>,
    /// Optional command argv overriding the image default
    pub command: Option<Vec<String>>,
    /// Bind mounts
    pub mounts: Vec<MountSpec>,
    /// Allocate a TTY and keep stdin open
    pub interactive: bool,
}

impl ContainerSpec {
    /// Validate invariants that must hold before the spec reaches the engine.
    ///
    /// # Errors
    ///
    /// Returns [`crate::docker::DockerError::InvalidSpec`] if two mounts
    /// share a target path or the image reference is empty.
    pub fn validate(&self) -> Result<()> {
        use crate::docker::DockerError;

        if self.image.is_empty() {
            return Err(DockerError::InvalidSpec {
                name: self.name.clone(),
                reason: "image reference is empty".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for mount in &self.mounts {
            if !seen.insert(mount.target.as_str()) {
                return Err(DockerError::InvalidSpec {
                    name: self.name.clone(),
                    reason: format!("duplicate mount target {}", mount.target),
                });
            }
        }

        Ok(())
    }
}

/// Kind of mount attached to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountKind {
    /// Host directory bind mount
    #[default]
    Bind,
}

/// A single mount attached to a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Host path
    pub source: PathBuf,
    /// Path inside the container
    pub target: String,
    /// Mount kind
    pub kind: MountKind,
}

impl MountSpec {
    /// Create a bind mount.
    pub fn bind(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: MountKind::Bind,
        }
    }
}

/// Result of executing a command inside a running container.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Exit status of the command
    pub exit_code: i64,
    /// Combined captured output
    pub output: String,
}

impl ExecResult {
    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Summary entry returned by [`Engine::list_containers`].
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    /// Container ID
    pub id: String,
    /// Container names, without the leading slash
    pub names: Vec<String>,
    /// Image reference
    pub image: String,
    /// Coarse state such as `running` or `exited`
    pub state: String,
}

/// Operations the orchestration layer consumes from a container engine.
///
/// Any engine exposing these operations is substitutable. Absence of a
/// resource surfaces as [`crate::docker::DockerError::NotFound`] so callers
/// can decide whether it is an error.
#[async_trait]
pub trait Engine: Send + Sync {
    /// List containers, optionally including stopped ones.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;

    /// Create a container from a spec and return its ID.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a created container.
    async fn start_container(&self, name: &str) -> Result<()>;

    /// Stop a running container.
    async fn stop_container(&self, name: &str) -> Result<()>;

    /// Restart a container.
    async fn restart_container(&self, name: &str) -> Result<()>;

    /// Force-remove a container.
    async fn remove_container(&self, name: &str) -> Result<()>;

    /// Block until a container exits and return its status code.
    async fn wait_container(&self, name: &str) -> Result<i64>;

    /// Collect the combined log output of a container.
    async fn container_logs(&self, name: &str) -> Result<String>;

    /// Inspect the mounts attached to a container.
    async fn container_mounts(&self, name: &str) -> Result<Vec<MountSpec>>;

    /// Look up a network by name, returning its ID if it exists.
    async fn network_id(&self, name: &str) -> Result<Option<String>>;

    /// Create a bridge network and return its ID.
    async fn create_network(&self, name: &str) -> Result<String>;

    /// Pull an image from its registry.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Execute a command inside a running container.
    async fn exec(
        &self,
        container: &str,
        user: Option<&str>,
        command: &[String],
    ) -> Result<ExecResult>;
}
