//! Site orchestration.
//!
//! A [`Site`] composes the engine access layer into the operations the CLI
//! exposes: bring the container group up, tear it down, and run wp-cli or
//! server commands against it.
//!
//! - [`mounts`]: bind mount planning per artifact type
//! - [`wordpress`]: deterministic container spec builders

pub mod mounts;
pub mod wordpress;

use crate::docker::{
    AvailabilityGuard, ContainerController, ControllerConfig, DockerEngine, DockerError,
    ExecResult, ImageCache, Result,
};
use crate::settings::{DatabaseKind, Settings, SiteType};
use mounts::{create_site_dir, plan_mounts};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use wordpress::{
    cli_spec, container_name, database_spec, mailpit_spec, phpmyadmin_spec,
    site_container_names, wordpress_spec, NETWORK_NAME,
};

/// How long the database container gets to start accepting connections.
/// Cold starts on slow storage can take several seconds.
const DATABASE_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between database readiness probes.
const DATABASE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One site and the operations the command layer may invoke on it.
pub struct Site {
    settings: Settings,
    docker: ContainerController,
}

impl Site {
    /// Create a site over an existing controller.
    pub fn new(settings: Settings, docker: ContainerController) -> Self {
        Self { settings, docker }
    }

    /// Connect to the container engine and build a site for these settings.
    ///
    /// This is the one place per invocation the availability guard runs.
    ///
    /// # Errors
    ///
    /// Fails when the engine is unreachable after the guard's retry budget.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let guard = AvailabilityGuard::platform_default();
        let engine = DockerEngine::connect(&guard).await?;
        let images = ImageCache::load(&settings.app_directory);
        let controller = ContainerController::new(
            Arc::new(engine),
            images,
            ControllerConfig {
                image_update_interval: settings.update_interval,
            },
        );

        Ok(Self::new(settings, controller))
    }

    /// The settings this site was resolved from.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Host directory holding the WordPress install, created on demand.
    ///
    /// Full sites live directly in the working directory; plugin and theme
    /// projects get a `wordpress` subdirectory so the install never mixes
    /// with the artifact's own source tree.
    fn wordpress_directory(&self) -> Result<PathBuf> {
        let dir = match self.settings.site_type {
            SiteType::Site => self.settings.working_directory.clone(),
            SiteType::Plugin | SiteType::Theme => {
                self.settings.working_directory.join("wordpress")
            }
        };

        create_site_dir(&dir)?;
        Ok(dir)
    }

    /// Bring the site's container group up.
    ///
    /// Dependency order matters: the database container starts before the
    /// application container, and success is only declared once the database
    /// accepts connections.
    ///
    /// # Errors
    ///
    /// Infrastructure failures abort immediately with the failing resource
    /// in the error; [`DockerError::DatabaseTimeout`] when the database
    /// never becomes ready.
    pub async fn start(&self) -> Result<()> {
        info!("starting site: {}", self.settings.name);

        self.docker.ensure_network(NETWORK_NAME).await?;

        let app_dir = self.wordpress_directory()?;

        // The image generates wp-config.php on first boot; a leftover copy
        // from an earlier run would win over changed settings.
        let stale_config = app_dir.join("wp-config.php");
        if stale_config.exists() {
            debug!("removing stale wp-config.php");
            std::fs::remove_file(&stale_config)?;
        }

        let mounts = plan_mounts(&self.settings, &app_dir)?;

        let mut specs = Vec::new();
        if self.settings.database == DatabaseKind::Mariadb {
            create_site_dir(&self.settings.site_directory.join("database"))?;
            specs.push(database_spec(&self.settings));
        }
        specs.push(wordpress_spec(&self.settings, mounts));
        if self.settings.phpmyadmin && self.settings.database == DatabaseKind::Mariadb {
            specs.push(phpmyadmin_spec(&self.settings));
        }
        if self.settings.mailpit {
            specs.push(mailpit_spec(&self.settings));
        }

        for spec in &specs {
            self.docker.run(spec).await?;
        }

        if self.settings.database == DatabaseKind::Mariadb {
            self.verify_database().await?;
        }

        info!("site {} is up at {}", self.settings.name, self.settings.url());
        Ok(())
    }

    /// Stop every container belonging to the site.
    ///
    /// Containers that were never started, or that a previous stop already
    /// removed, are skipped without error.
    pub async fn stop(&self) -> Result<()> {
        info!("stopping site: {}", self.settings.name);

        for name in site_container_names(&self.settings.name) {
            self.docker.stop(&name).await?;
        }

        Ok(())
    }

    /// Stop and remove every container belonging to the site.
    pub async fn destroy(&self) -> Result<()> {
        info!("destroying site: {}", self.settings.name);

        for name in site_container_names(&self.settings.name) {
            self.docker.stop(&name).await?;
            self.docker.remove(&name).await?;
        }

        Ok(())
    }

    /// Run a wp-cli command in a disposable container.
    ///
    /// The command observes the same environment and mounts as the running
    /// application container. A non-zero exit is returned as data, not as an
    /// error.
    pub async fn run_wp_cli(
        &mut self,
        command: Vec<String>,
        interactive: bool,
    ) -> Result<(i64, String)> {
        self.apply_type_override().await?;

        let app_dir = self.wordpress_directory()?;
        let mounts = plan_mounts(&self.settings, &app_dir)?;
        let spec = cli_spec(&self.settings, mounts, command, interactive);

        self.docker.run_and_clean(&spec).await
    }

    /// Execute a command inside the running application container.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::Exec`] when the container is not running.
    pub async fn run_server_command(
        &self,
        command: Vec<String>,
        as_root: bool,
        restart: bool,
    ) -> Result<ExecResult> {
        let container = container_name(&self.settings.name, "wordpress");

        let result = self.docker.exec(&container, as_root, &command).await?;

        if restart {
            self.docker.restart(&container).await?;
        }

        Ok(result)
    }

    /// Infer the artifact type from the running container's bind targets.
    ///
    /// A site started as a plugin or theme keeps that shape for wp-cli runs
    /// even when the current invocation was configured differently.
    async fn apply_type_override(&mut self) -> Result<()> {
        let container = container_name(&self.settings.name, "wordpress");

        for mount in self.docker.mounts(&container).await? {
            if mount.target.contains("/var/www/html/wp-content/plugins/") {
                debug!("existing mounts identify this site as a plugin");
                self.settings.site_type = SiteType::Plugin;
            } else if mount.target.contains("/var/www/html/wp-content/themes/") {
                debug!("existing mounts identify this site as a theme");
                self.settings.site_type = SiteType::Theme;
            }
        }

        Ok(())
    }

    /// Poll the database container until it accepts connections.
    async fn verify_database(&self) -> Result<()> {
        let container = container_name(&self.settings.name, "database");
        let command: Vec<String> = ["mariadb-admin", "ping", "--silent", "-uwordpress", "-pwordpress"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let deadline = tokio::time::Instant::now() + DATABASE_READY_TIMEOUT;

        loop {
            match self.docker.exec(&container, false, &command).await {
                Ok(result) if result.success() => {
                    debug!("database is accepting connections");
                    return Ok(());
                }
                Ok(_) | Err(_) => {}
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(DockerError::DatabaseTimeout { container });
            }

            tokio::time::sleep(DATABASE_POLL_INTERVAL).await;
        }
    }
}
