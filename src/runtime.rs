use async_trait::async_trait;
use tracing::debug;

use crate::util::{CommandError, run_command};

pub const DEFAULT_DOCKER_EXECUTABLE: &str = "docker";

/// The container operations a debug session needs.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn remove_container(&self, name: &str, force: bool) -> Result<(), CommandError>;
}

/// Drives the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    executable: String,
}

impl DockerCli {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_EXECUTABLE)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn remove_container(&self, name: &str, force: bool) -> Result<(), CommandError> {
        let mut args = vec!["rm"];
        if force {
            args.push("--force");
        }
        args.push(name);

        debug!("Running {} {}", self.executable, args.join(" "));
        run_command(&self.executable, &args).await?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_client_surfaces_command_error() {
        let cli = DockerCli::new("false");
        let err = cli.remove_container("web-latest", true).await.unwrap_err();
        assert!(matches!(err, CommandError::Failed { ref program, .. } if program == "false"));
    }

    #[tokio::test]
    async fn missing_client_is_an_io_error() {
        let cli = DockerCli::new("/nonexistent/docker-client");
        let err = cli.remove_container("web-latest", true).await.unwrap_err();
        assert!(matches!(err, CommandError::Io(_)));
    }

    #[tokio::test]
    async fn successful_removal() {
        let cli = DockerCli::new("true");
        assert!(cli.remove_container("web-latest", false).await.is_ok());
    }
}
