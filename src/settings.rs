//! Site settings.
//!
//! A [`Settings`] value describes one site for one invocation: its name,
//! what kind of artifact is being developed, where its files live and which
//! feature flags are active. It is assembled from built-in defaults, an
//! optional TOML config file and the command line, and is read-only for the
//! orchestration core.

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Directory under $HOME holding the config file, image ledger and site data.
pub const APP_DIR_NAME: &str = ".config/wpdev";

/// Config file name, looked up in the project directory first and the app
/// directory second.
pub const CONFIG_FILE_NAME: &str = "wpdev.toml";

/// What kind of artifact the current directory holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteType {
    /// A full WordPress site
    #[default]
    Site,
    /// A plugin mounted into an otherwise disposable site
    Plugin,
    /// A theme mounted into an otherwise disposable site
    Theme,
}

impl std::fmt::Display for SiteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteType::Site => write!(f, "site"),
            SiteType::Plugin => write!(f, "plugin"),
            SiteType::Theme => write!(f, "theme"),
        }
    }
}

/// Which database backend the site runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// A MariaDB container on the site network
    #[default]
    Mariadb,
    /// The SQLite drop-in inside the application container
    Sqlite,
}

/// Multisite mode for the WordPress install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multisite {
    /// Single-site install
    #[default]
    None,
    /// Multisite with subdomains
    Subdomain,
    /// Multisite with subdirectories
    Subdirectory,
}

/// On-disk configuration, all keys optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    /// PHP version tag for the WordPress images
    pub php: String,
    /// MariaDB image tag
    pub mariadb: String,
    /// Artifact type
    #[serde(rename = "type")]
    pub site_type: SiteType,
    /// Root under which site domains are minted
    pub domain_root: String,
    /// Database backend
    pub database: DatabaseKind,
    /// Log the admin user in automatically
    pub automatic_login: bool,
    /// Define WP_DEBUG in the container
    pub wp_debug: bool,
    /// Define SCRIPT_DEBUG in the container
    pub script_debug: bool,
    /// WP_ENVIRONMENT_TYPE to declare, omitted when unset
    pub environment: Option<String>,
    /// Multisite mode
    pub multisite: Multisite,
    /// Days before a cached image check goes stale
    pub update_interval_days: u64,
    /// Also start a phpMyAdmin container
    pub phpmyadmin: bool,
    /// Also start a Mailpit container
    pub mailpit: bool,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            php: "8.2".to_string(),
            mariadb: "11".to_string(),
            site_type: SiteType::Site,
            domain_root: "sites.wpdev.test".to_string(),
            database: DatabaseKind::Mariadb,
            automatic_login: true,
            wp_debug: false,
            script_debug: false,
            environment: Some("local".to_string()),
            multisite: Multisite::None,
            update_interval_days: 7,
            phpmyadmin: false,
            mailpit: false,
        }
    }
}

impl SettingsFile {
    /// Load the first config file found, falling back to defaults.
    ///
    /// The project directory wins over the app directory so a repo can pin
    /// its own PHP version and flags.
    pub fn discover(working_directory: &Path, app_directory: &Path) -> anyhow::Result<Self> {
        for candidate in [
            working_directory.join(format!(".{CONFIG_FILE_NAME}")),
            app_directory.join(CONFIG_FILE_NAME),
        ] {
            if candidate.is_file() {
                debug!("loading settings from {}", candidate.display());
                let contents = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                return toml::from_str(&contents)
                    .with_context(|| format!("parsing {}", candidate.display()));
            }
        }

        Ok(Self::default())
    }
}

/// Fully resolved description of the site this invocation operates on.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Site name, also the key for container and domain names
    pub name: String,
    /// Artifact type
    pub site_type: SiteType,
    /// Directory the developer is working in
    pub working_directory: PathBuf,
    /// App directory holding config, ledger and site data
    pub app_directory: PathBuf,
    /// Per-site data directory
    pub site_directory: PathBuf,
    /// Domain the site answers on
    pub domain: String,
    /// PHP version tag
    pub php_version: String,
    /// MariaDB image tag
    pub mariadb_version: String,
    /// Database backend
    pub database: DatabaseKind,
    /// Log the admin user in automatically
    pub automatic_login: bool,
    /// Define WP_DEBUG
    pub wp_debug: bool,
    /// Define SCRIPT_DEBUG
    pub script_debug: bool,
    /// WP_ENVIRONMENT_TYPE to declare
    pub environment: Option<String>,
    /// Multisite mode
    pub multisite: Multisite,
    /// Image freshness interval
    pub update_interval: Duration,
    /// Start phpMyAdmin alongside the site
    pub phpmyadmin: bool,
    /// Start Mailpit alongside the site
    pub mailpit: bool,
}

impl Settings {
    /// Resolve settings for the current invocation.
    ///
    /// The site name comes from the `--name` flag when given, otherwise from
    /// the working directory's folder name.
    ///
    /// # Errors
    ///
    /// Fails when no home directory can be determined, the config file is
    /// malformed, or no usable site name can be derived.
    pub fn new(name_flag: Option<String>, working_directory: PathBuf) -> anyhow::Result<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| anyhow!("HOME is not set, cannot locate the app directory"))?;
        let app_directory = home.join(APP_DIR_NAME);

        let file = SettingsFile::discover(&working_directory, &app_directory)?;
        Self::from_parts(name_flag, working_directory, app_directory, file)
    }

    /// Assemble settings from already-loaded parts.
    pub fn from_parts(
        name_flag: Option<String>,
        working_directory: PathBuf,
        app_directory: PathBuf,
        file: SettingsFile,
    ) -> anyhow::Result<Self> {
        let raw_name = match name_flag {
            Some(name) => name,
            None => working_directory
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow!("cannot derive a site name from {}", working_directory.display()))?,
        };

        let name = sanitize_site_name(&raw_name);
        if name.is_empty() {
            return Err(anyhow!("site name {:?} has no usable characters", raw_name));
        }

        let site_directory = app_directory.join("sites").join(&name);
        let domain = format!("{}.{}", name, file.domain_root);

        Ok(Self {
            name,
            site_type: file.site_type,
            working_directory,
            app_directory,
            site_directory,
            domain,
            php_version: file.php,
            mariadb_version: file.mariadb,
            database: file.database,
            automatic_login: file.automatic_login,
            wp_debug: file.wp_debug,
            script_debug: file.script_debug,
            environment: file.environment,
            multisite: file.multisite,
            update_interval: Duration::from_secs(file.update_interval_days * 24 * 60 * 60),
            phpmyadmin: file.phpmyadmin,
            mailpit: file.mailpit,
        })
    }

    /// URL the site is reachable on once started.
    pub fn url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

/// Reduce a raw name to the lowercase alphanumeric-and-dash form used in
/// container names, hostnames and routing rules.
pub fn sanitize_site_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
