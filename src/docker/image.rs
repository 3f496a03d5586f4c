//! Image freshness ledger.
//!
//! Pulling every image on every invocation makes startup slow and noisy, so
//! pull checks are recorded in a small JSON file under the app directory.
//! An image is pulled again only once its record is older than the configured
//! refresh interval, and at most once per invocation.

use crate::docker::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const LEDGER_FILE_NAME: &str = "images.json";

/// Persisted record of the last freshness check for one image reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// When the image was last checked against its registry
    pub last_checked: DateTime<Utc>,
    /// Refresh interval in seconds in force at the last check
    pub interval_secs: u64,
}

/// Durable mapping of image reference to last-checked timestamp.
///
/// The ledger file is rewritten atomically on every update. A missing or
/// unreadable file is treated as an empty ledger, so every image counts as
/// never checked.
pub struct ImageCache {
    path: PathBuf,
    records: HashMap<String, ImageRecord>,
    checked_this_run: HashSet<String>,
}

impl ImageCache {
    /// Load the ledger from the app directory, tolerating absence.
    pub fn load(app_dir: &Path) -> Self {
        let path = app_dir.join(LEDGER_FILE_NAME);

        let records = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(records) => records,
                Err(e) => {
                    warn!("ignoring unreadable image ledger {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            records,
            checked_this_run: HashSet::new(),
        }
    }

    /// Whether the image is due for a registry pull.
    pub fn needs_refresh(&self, image: &str, interval: Duration, now: DateTime<Utc>) -> bool {
        let Some(record) = self.records.get(image) else {
            return true;
        };

        match now.signed_duration_since(record.last_checked).to_std() {
            Ok(age) => age >= interval,
            // A record from the future counts as fresh.
            Err(_) => false,
        }
    }

    /// Ensure an image is present and fresh, pulling it when due.
    ///
    /// The pull closure runs only when the record is missing or stale. Either
    /// way a successful check refreshes `last_checked` and persists the
    /// ledger, and later calls for the same reference within this invocation
    /// are satisfied from memory without touching the registry again.
    ///
    /// # Errors
    ///
    /// Propagates pull failures, and IO errors from persisting the ledger.
    pub async fn ensure<F, Fut>(&mut self, image: &str, interval: Duration, pull: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if self.checked_this_run.contains(image) {
            debug!("image {} already checked this run", image);
            return Ok(());
        }

        let now = Utc::now();

        if self.needs_refresh(image, interval, now) {
            info!("updating image: {}", image);
            pull().await?;
        } else {
            debug!("image {} is fresh, skipping pull", image);
        }

        self.checked_this_run.insert(image.to_string());
        self.records.insert(
            image.to_string(),
            ImageRecord {
                last_checked: now,
                interval_secs: interval.as_secs(),
            },
        );
        self.save()?;

        Ok(())
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&self.records)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}
