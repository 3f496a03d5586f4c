//! # wpdev
//!
//! A simple WordPress development environment for plugin and theme
//! developers. One command brings up a disposable container group (MariaDB,
//! WordPress, optional admin tools) keyed by a site name; the site's working
//! directory is bind-mounted into the install according to what is being
//! developed.
//!
//! ## Architecture
//!
//! - **[`docker`]**: engine access. Availability guarding with bounded
//!   retry, a persisted image freshness ledger, and idempotent container
//!   lifecycle operations behind a substitutable [`docker::Engine`] trait.
//! - **[`site`]**: orchestration. Mount planning per artifact type,
//!   deterministic container specs, and the start/stop/exec surface the CLI
//!   calls.
//! - **[`settings`]**: the per-invocation site descriptor, resolved from
//!   defaults, a TOML config file and the command line.
//! - **[`cli`]**: clap argument definitions and dispatch.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wpdev::settings::Settings;
//! use wpdev::site::Site;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new(Some("acme".to_string()), std::env::current_dir()?)?;
//!     let site = Site::connect(settings).await?;
//!     site.start().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod docker;
pub mod settings;
pub mod site;

pub use docker::{
    AvailabilityGuard, ContainerController, ContainerSpec, ControllerConfig, DockerEngine,
    DockerError, Engine, ExecResult, ImageCache, MountSpec,
};
pub use settings::{DatabaseKind, Settings, SiteType};
pub use site::Site;
