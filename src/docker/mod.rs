//! Container engine access layer.
//!
//! This module owns everything that talks to Docker via the bollard API:
//! connection and availability checking, image freshness tracking, and
//! idempotent container lifecycle operations. Higher layers only see the
//! [`Engine`] trait and the [`ContainerController`], so the concrete engine
//! can be swapped out in tests.
//!
//! ## Architecture
//!
//! - [`engine`]: the engine capability trait and container spec types
//! - [`client`]: bollard-backed [`Engine`] implementation
//! - [`availability`]: daemon reachability guard with bounded retry
//! - [`image`]: persisted image freshness ledger
//! - [`container`]: idempotent create/start/stop/exec operations

mod availability;
mod client;
mod container;
mod engine;
mod image;

pub use availability::{AvailabilityGuard, Launcher};
pub use client::DockerEngine;
pub use container::{ContainerController, ControllerConfig};
pub use engine::{
    ContainerSpec, ContainerSummary, Engine, ExecResult, MountKind, MountSpec,
};
pub use image::ImageCache;

/// Container engine errors.
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    /// The daemon never became reachable within the retry budget
    #[error("container engine unreachable after {attempts} attempts")]
    EngineUnreachable { attempts: u32 },

    /// The platform launcher for the engine could not be spawned
    #[error("unable to launch the container engine: {0}")]
    LauncherFailed(#[source] std::io::Error),

    /// Image pull failed
    #[error("failed to pull image {image}: {reason}")]
    ImagePull { image: String, reason: String },

    /// Network creation failed
    #[error("failed to create network {name}: {reason}")]
    NetworkCreate { name: String, reason: String },

    /// Container creation or start failed
    #[error("failed to create container {name}: {reason}")]
    ContainerCreate { name: String, reason: String },

    /// Command execution inside a container failed
    #[error("failed to exec in container {container}: {reason}")]
    Exec { container: String, reason: String },

    /// A host directory needed for a bind mount could not be prepared
    #[error("failed to prepare mount source {path:?}: {source}")]
    MountPrep {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The database container never accepted connections before the deadline
    #[error("database container {container} did not accept connections in time")]
    DatabaseTimeout { container: String },

    /// A container spec failed validation before being sent to the engine
    #[error("invalid container spec for {name}: {reason}")]
    InvalidSpec { name: String, reason: String },

    /// Container or network not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Docker API error
    #[error("container engine API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, DockerError>;
