//! Integration tests for container orchestration.
//!
//! These drive the controller and the site orchestrator against an
//! in-memory engine, verifying the idempotency and cleanup semantics that
//! matter across repeated invocations without needing a Docker daemon.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wpdev::docker::{
    ContainerController, ContainerSpec, ContainerSummary, ControllerConfig, DockerError, Engine,
    ExecResult, ImageCache, MountSpec,
};
use wpdev::settings::{DatabaseKind, Settings, SettingsFile, SiteType};
use wpdev::site::wordpress;
use wpdev::site::Site;

#[derive(Default)]
struct FakeState {
    containers: HashMap<String, FakeContainer>,
    networks: Vec<String>,
    pulls: Vec<String>,
    events: Vec<String>,
    fail_remove: HashSet<String>,
    exit_codes: HashMap<String, i64>,
    logs: HashMap<String, String>,
}

struct FakeContainer {
    spec: ContainerSpec,
    running: bool,
}

/// In-memory engine recording every operation.
#[derive(Default)]
struct FakeEngine {
    state: Mutex<FakeState>,
}

impl FakeEngine {
    fn event(&self, event: String) {
        self.state.lock().unwrap().events.push(event);
    }

    fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .containers
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn pull_count(&self, image: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .filter(|p| p.as_str() == image)
            .count()
    }

    fn seed_container(&self, spec: ContainerSpec) {
        let mut state = self.state.lock().unwrap();
        state.containers.insert(
            spec.name.clone(),
            FakeContainer {
                spec,
                running: true,
            },
        );
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn list_containers(&self, _all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .map(|(name, c)| ContainerSummary {
                id: format!("id-{name}"),
                names: vec![name.clone()],
                image: c.spec.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
            })
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, DockerError> {
        self.event(format!("create {}", spec.name));

        let mut state = self.state.lock().unwrap();
        if state.containers.contains_key(&spec.name) {
            return Err(DockerError::ContainerCreate {
                name: spec.name.clone(),
                reason: "name already in use".to_string(),
            });
        }

        state.containers.insert(
            spec.name.clone(),
            FakeContainer {
                spec: spec.clone(),
                running: false,
            },
        );
        Ok(format!("id-{}", spec.name))
    }

    async fn start_container(&self, name: &str) -> Result<(), DockerError> {
        self.event(format!("start {name}"));

        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(name) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(DockerError::NotFound(name.to_string())),
        }
    }

    async fn stop_container(&self, name: &str) -> Result<(), DockerError> {
        self.event(format!("stop {name}"));

        let mut state = self.state.lock().unwrap();
        match state.containers.get_mut(name) {
            Some(container) => {
                container.running = false;
                Ok(())
            }
            None => Err(DockerError::NotFound(name.to_string())),
        }
    }

    async fn restart_container(&self, name: &str) -> Result<(), DockerError> {
        self.event(format!("restart {name}"));

        let state = self.state.lock().unwrap();
        if state.containers.contains_key(name) {
            Ok(())
        } else {
            Err(DockerError::NotFound(name.to_string()))
        }
    }

    async fn remove_container(&self, name: &str) -> Result<(), DockerError> {
        self.event(format!("remove {name}"));

        let mut state = self.state.lock().unwrap();
        if !state.containers.contains_key(name) {
            return Err(DockerError::NotFound(name.to_string()));
        }
        if state.fail_remove.contains(name) {
            return Err(DockerError::Io(std::io::Error::other(
                "injected removal failure",
            )));
        }

        state.containers.remove(name);
        Ok(())
    }

    async fn wait_container(&self, name: &str) -> Result<i64, DockerError> {
        let mut state = self.state.lock().unwrap();
        if let Some(container) = state.containers.get_mut(name) {
            container.running = false;
        }
        Ok(state.exit_codes.get(name).copied().unwrap_or(0))
    }

    async fn container_logs(&self, name: &str) -> Result<String, DockerError> {
        let state = self.state.lock().unwrap();
        Ok(state.logs.get(name).cloned().unwrap_or_default())
    }

    async fn container_mounts(&self, name: &str) -> Result<Vec<MountSpec>, DockerError> {
        let state = self.state.lock().unwrap();
        match state.containers.get(name) {
            Some(container) => Ok(container.spec.mounts.clone()),
            None => Err(DockerError::NotFound(name.to_string())),
        }
    }

    async fn network_id(&self, name: &str) -> Result<Option<String>, DockerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .networks
            .iter()
            .find(|n| n.as_str() == name)
            .map(|n| format!("net-{n}")))
    }

    async fn create_network(&self, name: &str) -> Result<String, DockerError> {
        self.event(format!("create-network {name}"));

        let mut state = self.state.lock().unwrap();
        state.networks.push(name.to_string());
        Ok(format!("net-{name}"))
    }

    async fn pull_image(&self, image: &str) -> Result<(), DockerError> {
        let mut state = self.state.lock().unwrap();
        state.pulls.push(image.to_string());
        Ok(())
    }

    async fn exec(
        &self,
        container: &str,
        _user: Option<&str>,
        command: &[String],
    ) -> Result<ExecResult, DockerError> {
        self.event(format!("exec {container} {}", command.join(" ")));

        let state = self.state.lock().unwrap();
        match state.containers.get(container) {
            Some(c) if c.running => Ok(ExecResult {
                exit_code: 0,
                output: String::new(),
            }),
            Some(_) => Err(DockerError::Exec {
                container: container.to_string(),
                reason: "container is not running".to_string(),
            }),
            None => Err(DockerError::Exec {
                container: container.to_string(),
                reason: "no such container".to_string(),
            }),
        }
    }
}

fn controller_for(engine: &Arc<FakeEngine>, app_dir: &Path) -> ContainerController {
    ContainerController::new(
        engine.clone(),
        ImageCache::load(app_dir),
        ControllerConfig {
            image_update_interval: Duration::from_secs(7 * 86400),
        },
    )
}

fn settings_for(app_dir: &Path, site_type: SiteType) -> Settings {
    let mut file = SettingsFile::default();
    file.site_type = site_type;

    let mut settings = Settings::from_parts(
        Some("acme".to_string()),
        app_dir.join("project"),
        app_dir.to_path_buf(),
        file,
    )
    .unwrap();
    settings.environment = None;
    settings
}

fn plain_spec(name: &str) -> ContainerSpec {
    ContainerSpec {
        name: name.to_string(),
        image: "alpine:latest".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_run_twice_leaves_one_container() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let controller = controller_for(&engine, dir.path());

    let spec = plain_spec("wpdev-acme-wordpress");
    controller.run(&spec).await.unwrap();
    controller.run(&spec).await.unwrap();

    assert_eq!(engine.container_names(), vec!["wpdev-acme-wordpress"]);

    // The second run removed the stale container before creating again.
    let events = engine.events();
    let second_create = events
        .iter()
        .rposition(|e| e == "create wpdev-acme-wordpress")
        .unwrap();
    let removal = events
        .iter()
        .rposition(|e| e == "remove wpdev-acme-wordpress")
        .unwrap();
    assert!(removal < second_create);
}

#[tokio::test]
async fn test_image_checked_once_per_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let controller = controller_for(&engine, dir.path());

    controller.run(&plain_spec("one")).await.unwrap();
    controller.run(&plain_spec("two")).await.unwrap();

    assert_eq!(engine.pull_count("alpine:latest"), 1);
}

#[tokio::test]
async fn test_fresh_ledger_skips_pull_in_next_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());

    let controller = controller_for(&engine, dir.path());
    controller.run(&plain_spec("one")).await.unwrap();

    // A new controller with the persisted ledger stands in for a second
    // invocation inside the freshness interval.
    let controller = controller_for(&engine, dir.path());
    controller.run(&plain_spec("two")).await.unwrap();

    assert_eq!(engine.pull_count("alpine:latest"), 1);
}

#[tokio::test]
async fn test_stop_on_absent_container_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let controller = controller_for(&engine, dir.path());

    controller.stop("wpdev-ghost-wordpress").await.unwrap();
    controller.remove("wpdev-ghost-wordpress").await.unwrap();
}

#[tokio::test]
async fn test_run_and_clean_survives_removal_failure() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let controller = controller_for(&engine, dir.path());

    {
        let mut state = engine.state.lock().unwrap();
        state.exit_codes.insert("job".to_string(), 3);
        state
            .logs
            .insert("job".to_string(), "plugin activated\n".to_string());
        state.fail_remove.insert("job".to_string());
    }

    let (code, output) = controller
        .run_and_clean(&plain_spec("job"))
        .await
        .unwrap();

    assert_eq!(code, 3);
    assert_eq!(output, "plugin activated\n");
    // The container is still there precisely because its removal failed.
    assert_eq!(engine.container_names(), vec!["job"]);
}

#[tokio::test]
async fn test_run_and_clean_removes_the_container() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let controller = controller_for(&engine, dir.path());

    let (code, _) = controller.run_and_clean(&plain_spec("job")).await.unwrap();

    assert_eq!(code, 0);
    assert!(engine.container_names().is_empty());
}

#[tokio::test]
async fn test_ensure_network_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let controller = controller_for(&engine, dir.path());

    let (id_first, created_first) = controller.ensure_network("wpdev").await.unwrap();
    let (id_second, created_second) = controller.ensure_network("wpdev").await.unwrap();

    assert!(created_first);
    assert!(!created_second);
    assert_eq!(id_first, id_second);
    assert_eq!(engine.state.lock().unwrap().networks.len(), 1);
}

#[tokio::test]
async fn test_start_brings_up_database_then_wordpress() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let settings = settings_for(dir.path(), SiteType::Site);
    std::fs::create_dir_all(&settings.working_directory).unwrap();

    let site = Site::new(settings, controller_for(&engine, dir.path()));
    site.start().await.unwrap();

    assert_eq!(
        engine.container_names(),
        vec!["wpdev-acme-database", "wpdev-acme-wordpress"]
    );

    let events = engine.events();
    let database = events
        .iter()
        .position(|e| e == "start wpdev-acme-database")
        .unwrap();
    let wordpress = events
        .iter()
        .position(|e| e == "start wpdev-acme-wordpress")
        .unwrap();
    assert!(database < wordpress);

    // Readiness was verified against the database container.
    assert!(events
        .iter()
        .any(|e| e.starts_with("exec wpdev-acme-database mariadb-admin ping")));
}

#[tokio::test]
async fn test_start_removes_stale_wp_config() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let settings = settings_for(dir.path(), SiteType::Site);
    std::fs::create_dir_all(&settings.working_directory).unwrap();

    let stale = settings.working_directory.join("wp-config.php");
    std::fs::write(&stale, "<?php // generated").unwrap();

    let site = Site::new(settings, controller_for(&engine, dir.path()));
    site.start().await.unwrap();

    assert!(!stale.exists());
}

#[tokio::test]
async fn test_sqlite_site_has_no_database_container() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let mut settings = settings_for(dir.path(), SiteType::Site);
    settings.database = DatabaseKind::Sqlite;
    std::fs::create_dir_all(&settings.working_directory).unwrap();

    let site = Site::new(settings, controller_for(&engine, dir.path()));
    site.start().await.unwrap();

    assert_eq!(engine.container_names(), vec!["wpdev-acme-wordpress"]);

    let state = engine.state.lock().unwrap();
    let env = &state.containers["wpdev-acme-wordpress"].spec.env;
    assert!(env.contains(&"WPDEV_SQLITE=true".to_string()));
    assert!(!env.iter().any(|v| v.starts_with("WORDPRESS_DB_HOST=")));
}

#[tokio::test]
async fn test_stop_site_with_no_containers_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let settings = settings_for(dir.path(), SiteType::Site);

    let site = Site::new(settings, controller_for(&engine, dir.path()));
    site.stop().await.unwrap();
}

#[tokio::test]
async fn test_destroy_removes_all_site_containers() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let settings = settings_for(dir.path(), SiteType::Site);
    std::fs::create_dir_all(&settings.working_directory).unwrap();

    let site = Site::new(settings, controller_for(&engine, dir.path()));
    site.start().await.unwrap();
    site.destroy().await.unwrap();

    assert!(engine.container_names().is_empty());
}

#[tokio::test]
async fn test_wp_cli_inherits_plugin_shape_from_running_site() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());

    // A running application container whose mounts mark the site as a
    // plugin, even though this invocation's settings say otherwise.
    let running = wordpress::wordpress_spec(
        &settings_for(dir.path(), SiteType::Site),
        vec![MountSpec::bind(
            dir.path().join("project"),
            "/var/www/html/wp-content/plugins/acme",
        )],
    );
    engine.seed_container(running);

    let settings = settings_for(dir.path(), SiteType::Site);
    std::fs::create_dir_all(&settings.working_directory).unwrap();

    let mut site = Site::new(settings, controller_for(&engine, dir.path()));
    let (code, _) = site
        .run_wp_cli(vec!["plugin".to_string(), "list".to_string()], false)
        .await
        .unwrap();
    assert_eq!(code, 0);

    let events = engine.events();
    assert!(events.contains(&"create wpdev-acme-wordpress_cli".to_string()));

    // The cli container saw the plugin mount topology.
    let plugin_dir = dir
        .path()
        .join("project")
        .join("wordpress/wp-content/plugins/acme");
    assert!(plugin_dir.is_dir());
}

#[tokio::test]
async fn test_server_command_requires_running_container() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(FakeEngine::default());
    let settings = settings_for(dir.path(), SiteType::Site);

    let site = Site::new(settings, controller_for(&engine, dir.path()));
    let err = site
        .run_server_command(vec!["true".to_string()], false, false)
        .await
        .unwrap_err();

    assert!(matches!(err, DockerError::Exec { .. }));
}
