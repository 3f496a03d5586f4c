//! Container spec builders for the WordPress stack.
//!
//! Everything in this module is pure data derived from [`Settings`]: names,
//! environment lists, routing labels and full container specs. Two calls
//! with the same settings produce byte-identical results, which is what
//! makes restarts reproducible and lets the spec builders be tested without
//! an engine.

use crate::docker::{ContainerSpec, MountSpec};
use crate::settings::{DatabaseKind, Settings};
use crate::site::mounts::DOCUMENT_ROOT;
use std::collections::HashMap;

/// Name of the shared bridge network all site containers join.
pub const NETWORK_NAME: &str = "wpdev";

/// Marker variable present in every container this tool starts.
pub const ENVIRONMENT_MARKER: &str = "IS_WPDEV_ENVIRONMENT=true";

/// In-container path WordPress stores its database files under.
const DATABASE_DATA_TARGET: &str = "/var/lib/mysql";

/// Role-qualified container name for a site.
pub fn container_name(site: &str, role: &str) -> String {
    format!("wpdev-{site}-{role}")
}

/// The fixed set of containers a site may own, dependencies first.
pub fn site_container_names(site: &str) -> Vec<String> {
    ["database", "wordpress", "phpmyadmin", "mailpit"]
        .into_iter()
        .map(|role| container_name(site, role))
        .collect()
}

/// Compose the environment for the application and wp-cli containers.
///
/// Order is fixed: the marker variable, then the database block, then the
/// optional flags. SQLite mode replaces the whole remote-database block with
/// a single mode flag.
pub fn site_environment(settings: &Settings) -> Vec<String> {
    let mut env = vec![ENVIRONMENT_MARKER.to_string()];

    match settings.database {
        DatabaseKind::Sqlite => env.push("WPDEV_SQLITE=true".to_string()),
        DatabaseKind::Mariadb => env.extend([
            format!(
                "WORDPRESS_DB_HOST={}",
                container_name(&settings.name, "database")
            ),
            "WORDPRESS_DB_USER=wordpress".to_string(),
            "WORDPRESS_DB_PASSWORD=wordpress".to_string(),
            "WORDPRESS_DB_NAME=wordpress".to_string(),
            "WORDPRESS_ADMIN_USER=admin".to_string(),
        ]),
    }

    if settings.automatic_login {
        env.push("WPDEV_ADMIN_LOGIN=true".to_string());
    }

    if settings.wp_debug {
        env.push("WORDPRESS_DEBUG=1".to_string());
    }

    let mut defines = String::new();
    if let Some(environment) = &settings.environment {
        defines.push_str(&format!(
            "define( 'WP_ENVIRONMENT_TYPE', '{environment}' );"
        ));
    }
    if settings.script_debug {
        defines.push_str("define( 'SCRIPT_DEBUG', true );");
    }
    if !defines.is_empty() {
        env.push(format!("WORDPRESS_CONFIG_EXTRA={defines}"));
    }

    env
}

/// Labels the reverse proxy uses to discover and route the site.
pub fn wordpress_labels(settings: &Settings) -> HashMap<String, String> {
    let name = &settings.name;
    let host_rule = format!("Host(`{}`)", settings.domain);

    HashMap::from([
        ("traefik.enable".to_string(), "true".to_string()),
        ("wpdev.type".to_string(), "wordpress".to_string()),
        ("wpdev.site".to_string(), name.clone()),
        (
            format!("traefik.http.routers.wordpress-{name}-http.entrypoints"),
            "web".to_string(),
        ),
        (
            format!("traefik.http.routers.wordpress-{name}-http.rule"),
            host_rule.clone(),
        ),
        (
            format!("traefik.http.routers.wordpress-{name}.entrypoints"),
            "websecure".to_string(),
        ),
        (
            format!("traefik.http.routers.wordpress-{name}.rule"),
            host_rule,
        ),
        (
            format!("traefik.http.routers.wordpress-{name}.tls"),
            "true".to_string(),
        ),
    ])
}

fn service_labels(settings: &Settings, role: &str) -> HashMap<String, String> {
    let name = &settings.name;
    let host_rule = format!("Host(`{role}-{}`)", settings.domain);

    HashMap::from([
        ("traefik.enable".to_string(), "true".to_string()),
        ("wpdev.type".to_string(), role.to_string()),
        ("wpdev.site".to_string(), name.clone()),
        (
            format!("traefik.http.routers.{role}-{name}.entrypoints"),
            "websecure".to_string(),
        ),
        (format!("traefik.http.routers.{role}-{name}.rule"), host_rule),
        (
            format!("traefik.http.routers.{role}-{name}.tls"),
            "true".to_string(),
        ),
    ])
}

/// Spec for the MariaDB container backing the site.
pub fn database_spec(settings: &Settings) -> ContainerSpec {
    let name = container_name(&settings.name, "database");

    ContainerSpec {
        image: format!("mariadb:{}", settings.mariadb_version),
        network: NETWORK_NAME.to_string(),
        hostname: name.clone(),
        name,
        env: vec![
            "MARIADB_ROOT_PASSWORD=password".to_string(),
            "MARIADB_DATABASE=wordpress".to_string(),
            "MARIADB_USER=wordpress".to_string(),
            "MARIADB_PASSWORD=wordpress".to_string(),
        ],
        labels: HashMap::from([
            ("wpdev.type".to_string(), "database".to_string()),
            ("wpdev.site".to_string(), settings.name.clone()),
        ]),
        command: None,
        mounts: vec![MountSpec::bind(
            settings.site_directory.join("database"),
            DATABASE_DATA_TARGET,
        )],
        interactive: false,
    }
}

/// Spec for the WordPress application container.
pub fn wordpress_spec(settings: &Settings, mounts: Vec<MountSpec>) -> ContainerSpec {
    let name = container_name(&settings.name, "wordpress");

    ContainerSpec {
        image: format!("wordpress:php{}", settings.php_version),
        network: NETWORK_NAME.to_string(),
        hostname: name.clone(),
        name,
        env: site_environment(settings),
        labels: wordpress_labels(settings),
        command: None,
        mounts,
        interactive: false,
    }
}

/// Spec for a disposable wp-cli container.
///
/// Reuses the application container's environment and mounts so commands
/// observe exactly the runtime configuration the site runs with.
pub fn cli_spec(
    settings: &Settings,
    mounts: Vec<MountSpec>,
    command: Vec<String>,
    interactive: bool,
) -> ContainerSpec {
    let name = container_name(&settings.name, "wordpress_cli");

    let mut full_command = vec!["wp".to_string(), format!("--path={DOCUMENT_ROOT}")];
    full_command.extend(command);

    ContainerSpec {
        image: format!("wordpress:cli-php{}", settings.php_version),
        network: NETWORK_NAME.to_string(),
        hostname: name.clone(),
        name,
        env: site_environment(settings),
        labels: HashMap::from([("wpdev.site".to_string(), settings.name.clone())]),
        command: Some(full_command),
        mounts,
        interactive,
    }
}

/// Spec for the optional phpMyAdmin container.
pub fn phpmyadmin_spec(settings: &Settings) -> ContainerSpec {
    let name = container_name(&settings.name, "phpmyadmin");

    ContainerSpec {
        image: "phpmyadmin".to_string(),
        network: NETWORK_NAME.to_string(),
        hostname: name.clone(),
        name,
        env: vec![
            format!("PMA_HOST={}", container_name(&settings.name, "database")),
            "PMA_USER=wordpress".to_string(),
            "PMA_PASSWORD=wordpress".to_string(),
        ],
        labels: service_labels(settings, "phpmyadmin"),
        command: None,
        mounts: Vec::new(),
        interactive: false,
    }
}

/// Spec for the optional Mailpit container.
pub fn mailpit_spec(settings: &Settings) -> ContainerSpec {
    let name = container_name(&settings.name, "mailpit");

    ContainerSpec {
        image: "axllent/mailpit".to_string(),
        network: NETWORK_NAME.to_string(),
        hostname: name.clone(),
        name,
        env: Vec::new(),
        labels: service_labels(settings, "mailpit"),
        command: None,
        mounts: Vec::new(),
        interactive: false,
    }
}
