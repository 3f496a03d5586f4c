//! Engine availability guard.
//!
//! Confirms the container daemon is reachable before any real work starts.
//! On macOS the Docker desktop app can be launched automatically, after which
//! the daemon is polled on a fixed interval until it answers or the attempt
//! budget runs out. Platforms without a launcher fail fast on the first
//! unreachable probe.

use crate::docker::{DockerError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Action that starts the engine when it is not running.
pub type Launcher = Box<dyn Fn() -> std::io::Result<()> + Send + Sync>;

/// Default number of probe attempts after launching the engine.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 12;

/// Default pause between probe attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Guard that ensures the container engine is reachable, launching it once
/// and retrying with a bounded budget where the platform supports it.
pub struct AvailabilityGuard {
    max_attempts: u32,
    poll_interval: Duration,
    launcher: Option<Launcher>,
}

impl AvailabilityGuard {
    /// Create a guard with explicit retry budget, interval and launcher.
    pub fn new(max_attempts: u32, poll_interval: Duration, launcher: Option<Launcher>) -> Self {
        Self {
            max_attempts,
            poll_interval,
            launcher,
        }
    }

    /// Create a guard configured for the current platform.
    ///
    /// macOS gets a launcher that opens Docker Desktop; other platforms get
    /// no launcher and a single fatal probe.
    pub fn platform_default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_POLL_INTERVAL,
            platform_launcher(),
        )
    }

    /// Run the availability check.
    ///
    /// The probe should be a lightweight listing call against the engine. It
    /// is invoked once up front; on failure the launcher (if any) is spawned
    /// and the probe is retried on the configured interval, returning as soon
    /// as one attempt succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::LauncherFailed`] if the launcher cannot be
    /// spawned, or [`DockerError::EngineUnreachable`] once the attempt budget
    /// is exhausted (immediately, when no launcher is configured).
    pub async fn ensure_available<F, Fut>(&self, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        match probe().await {
            Ok(()) => {
                debug!("container engine is reachable");
                return Ok(());
            }
            Err(e) => debug!("container engine probe failed: {}", e),
        }

        let Some(launcher) = &self.launcher else {
            return Err(DockerError::EngineUnreachable { attempts: 1 });
        };

        warn!("container engine doesn't appear to be running, trying to start it");
        launcher().map_err(DockerError::LauncherFailed)?;

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;

            match probe().await {
                Ok(()) => {
                    info!("container engine became reachable on attempt {}", attempt);
                    return Ok(());
                }
                Err(e) => debug!("attempt {}/{} failed: {}", attempt, self.max_attempts, e),
            }
        }

        Err(DockerError::EngineUnreachable {
            attempts: self.max_attempts,
        })
    }
}

impl Default for AvailabilityGuard {
    fn default() -> Self {
        Self::platform_default()
    }
}

fn platform_launcher() -> Option<Launcher> {
    if cfg!(target_os = "macos") {
        Some(Box::new(|| {
            let status = std::process::Command::new("open")
                .args(["-a", "Docker"])
                .status()?;

            if status.success() {
                Ok(())
            } else {
                Err(std::io::Error::other("open -a Docker exited with an error"))
            }
        }))
    } else {
        None
    }
}
