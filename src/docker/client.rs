//! Bollard-backed engine implementation.
//!
//! Wraps a [`bollard::Docker`] handle behind the [`Engine`] trait. The
//! connection is established once per invocation via local defaults (Unix
//! socket or named pipe) and verified through the [`AvailabilityGuard`]
//! before being handed to the rest of the tool.

use crate::docker::{
    AvailabilityGuard, ContainerSpec, ContainerSummary, DockerError, Engine, ExecResult,
    MountSpec, Result,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    RestartContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, Mount, MountTypeEnum};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions};
use bollard::Docker;
use futures::stream::StreamExt;
use tracing::{debug, info};

/// Seconds a container is given to shut down before the engine kills it.
const STOP_TIMEOUT_SECS: i64 = 10;

/// Docker daemon client.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to the daemon and verify it is reachable.
    ///
    /// The guard's probe is a container listing call, matching the cheapest
    /// operation the daemon answers. This is the only place the availability
    /// check runs; every later operation assumes a live daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be established or the guard
    /// exhausts its retry budget.
    pub async fn connect(guard: &AvailabilityGuard) -> Result<Self> {
        debug!("connecting to container engine via local defaults");
        let docker = Docker::connect_with_local_defaults()?;

        let probe_docker = docker.clone();
        guard
            .ensure_available(move || {
                let docker = probe_docker.clone();
                async move {
                    docker
                        .list_containers(Some(ListContainersOptions::<String> {
                            all: false,
                            ..Default::default()
                        }))
                        .await
                        .map(|_| ())
                        .map_err(DockerError::Api)
                }
            })
            .await?;

        info!("connected to container engine");
        Ok(Self { docker })
    }
}

fn map_not_found(name: &str, e: bollard::errors::Error) -> DockerError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => DockerError::NotFound(name.to_string()),
        e => DockerError::Api(e),
    }
}

#[async_trait]
impl Engine for DockerEngine {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all,
                ..Default::default()
            }))
            .await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c
                    .names
                    .unwrap_or_default()
                    .into_iter()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .collect(),
                image: c.image.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        debug!("creating container: {}", spec.name);

        let mounts: Vec<Mount> = spec
            .mounts
            .iter()
            .map(|m| Mount {
                source: Some(m.source.to_string_lossy().into_owned()),
                target: Some(m.target.clone()),
                typ: Some(MountTypeEnum::BIND),
                ..Default::default()
            })
            .collect();

        let host_config = HostConfig {
            mounts: if mounts.is_empty() { None } else { Some(mounts) },
            network_mode: if spec.network.is_empty() {
                None
            } else {
                Some(spec.network.clone())
            },
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            hostname: if spec.hostname.is_empty() {
                None
            } else {
                Some(spec.hostname.clone())
            },
            env: if spec.env.is_empty() {
                None
            } else {
                Some(spec.env.clone())
            },
            labels: if spec.labels.is_empty() {
                None
            } else {
                Some(spec.labels.clone())
            },
            cmd: spec.command.clone(),
            tty: Some(spec.interactive),
            open_stdin: Some(spec.interactive),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| DockerError::ContainerCreate {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;

        debug!("created container: {} ({})", spec.name, response.id);
        Ok(response.id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| map_not_found(name, e))
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.docker
            .stop_container(
                name,
                Some(StopContainerOptions {
                    t: STOP_TIMEOUT_SECS,
                }),
            )
            .await
            .map_err(|e| map_not_found(name, e))
    }

    async fn restart_container(&self, name: &str) -> Result<()> {
        self.docker
            .restart_container(name, None::<RestartContainerOptions>)
            .await
            .map_err(|e| map_not_found(name, e))
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| map_not_found(name, e))
    }

    async fn wait_container(&self, name: &str) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(name, None::<WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // A non-zero exit status is reported as an error by the API
            // wrapper; the status itself is the result we want.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(map_not_found(name, e)),
            None => Ok(0),
        }
    }

    async fn container_logs(&self, name: &str) -> Result<String> {
        let mut stream = self.docker.logs(
            name,
            Some(LogsOptions::<String> {
                stdout: true,
                stderr: true,
                tail: "all".to_string(),
                ..Default::default()
            }),
        );

        let mut output = String::new();
        while let Some(result) = stream.next().await {
            let log = result.map_err(|e| map_not_found(name, e))?;
            output.push_str(&log.to_string());
        }

        Ok(output)
    }

    async fn container_mounts(&self, name: &str) -> Result<Vec<MountSpec>> {
        let inspect = self
            .docker
            .inspect_container(name, None)
            .await
            .map_err(|e| map_not_found(name, e))?;

        Ok(inspect
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| MountSpec::bind(m.source.unwrap_or_default(), m.destination.unwrap_or_default()))
            .collect())
    }

    async fn network_id(&self, name: &str) -> Result<Option<String>> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(network) => Ok(network.id),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(DockerError::Api(e)),
        }
    }

    async fn create_network(&self, name: &str) -> Result<String> {
        debug!("creating network: {}", name);

        self.docker
            .create_network(CreateNetworkOptions::<String> {
                name: name.to_string(),
                driver: "bridge".to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| DockerError::NetworkCreate {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        self.network_id(name)
            .await?
            .ok_or_else(|| DockerError::NetworkCreate {
                name: name.to_string(),
                reason: "network not visible after creation".to_string(),
            })
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions::<String> {
                from_image: image.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(result) = stream.next().await {
            match result {
                Ok(progress) => {
                    if let Some(status) = progress.status {
                        debug!("pull: {}", status);
                    }
                    if let Some(error) = progress.error {
                        return Err(DockerError::ImagePull {
                            image: image.to_string(),
                            reason: error,
                        });
                    }
                }
                Err(e) => {
                    return Err(DockerError::ImagePull {
                        image: image.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("pulled image: {}", image);
        Ok(())
    }

    async fn exec(
        &self,
        container: &str,
        user: Option<&str>,
        command: &[String],
    ) -> Result<ExecResult> {
        debug!("executing in container {}: {:?}", container, command);

        let options = CreateExecOptions::<String> {
            cmd: Some(command.to_vec()),
            user: user.map(String::from),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(container, options)
            .await
            .map_err(|e| DockerError::Exec {
                container: container.to_string(),
                reason: e.to_string(),
            })?;

        let start = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| DockerError::Exec {
                container: container.to_string(),
                reason: e.to_string(),
            })?;

        let mut output = String::new();

        match start {
            StartExecResults::Attached {
                output: mut stream, ..
            } => {
                while let Some(result) = stream.next().await {
                    let log = result.map_err(|e| DockerError::Exec {
                        container: container.to_string(),
                        reason: e.to_string(),
                    })?;
                    output.push_str(&log.to_string());
                }
            }
            StartExecResults::Detached => {
                return Err(DockerError::Exec {
                    container: container.to_string(),
                    reason: "exec detached unexpectedly".to_string(),
                });
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(|e| DockerError::Exec {
                container: container.to_string(),
                reason: e.to_string(),
            })?;

        Ok(ExecResult {
            exit_code: inspect.exit_code.unwrap_or(0),
            output,
        })
    }
}
