//! Bind mount planning.
//!
//! Every site gets the WordPress directory bound over the document root and
//! the site data directory bound to a fixed auxiliary path used for import
//! and export temp files. Plugin and theme projects additionally get their
//! working directory bound into the matching wp-content subdirectory, which
//! is how the artifact under development appears inside an otherwise
//! throwaway install.

use crate::docker::{DockerError, MountSpec, Result};
use crate::settings::{Settings, SiteType};
use std::path::Path;
use tracing::debug;

/// Document root inside the application containers.
pub const DOCUMENT_ROOT: &str = "/var/www/html";

/// In-container path of the site data directory.
pub const SITE_DATA_TARGET: &str = "/Site";

#[cfg(unix)]
const DIR_MODE: u32 = 0o750;

/// Create a directory tree with the fixed permission mode.
///
/// # Errors
///
/// Returns [`DockerError::MountPrep`] when creation fails.
pub fn create_site_dir(path: &Path) -> Result<()> {
    let result = {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(DIR_MODE)
                .create(path)
        }
        #[cfg(not(unix))]
        {
            std::fs::create_dir_all(path)
        }
    };

    result.map_err(|source| DockerError::MountPrep {
        path: path.to_path_buf(),
        source,
    })
}

/// Compute the bind mounts for a site.
///
/// `app_dir` is the host directory holding the WordPress install. The fixed,
/// non-overlapping target templates make collisions impossible.
///
/// # Errors
///
/// Returns [`DockerError::MountPrep`] when a directory backing one of the
/// binds cannot be created.
pub fn plan_mounts(settings: &Settings, app_dir: &Path) -> Result<Vec<MountSpec>> {
    create_site_dir(app_dir)?;
    create_site_dir(&settings.site_directory)?;

    let mut mounts = vec![
        MountSpec::bind(app_dir, DOCUMENT_ROOT),
        MountSpec::bind(&settings.site_directory, SITE_DATA_TARGET),
    ];

    let artifact_dir = match settings.site_type {
        SiteType::Site => None,
        SiteType::Plugin => Some("plugins"),
        SiteType::Theme => Some("themes"),
    };

    if let Some(kind) = artifact_dir {
        let host_dir = app_dir.join("wp-content").join(kind).join(&settings.name);
        create_site_dir(&host_dir)?;

        let target = format!("{DOCUMENT_ROOT}/wp-content/{kind}/{}", settings.name);
        debug!("mapping working directory as {} at {}", settings.site_type, target);
        mounts.push(MountSpec::bind(&settings.working_directory, target));
    }

    Ok(mounts)
}
