use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{
    DOCKER_BUILD_TYPE, DOCKER_RUN_TYPE, TaskDefinition, WorkspaceFolder,
    find_associated_build_task,
};
use crate::{
    command_line::{CommandLine, CommandLineBuilder},
    error::{DocktaskError, Result},
    options::{BuildOptions, ExtraHost, PortMapping, RunOptions, VolumeMapping},
    platform::RuntimeTarget,
    resolver,
    util::ensure_not_cancelled,
};

const DOCKER: &str = "docker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTask {
    pub label: String,
    pub platform: String,
    pub command_line: CommandLine,
}

/// Resolves a `docker-build` or `docker-run` task into its command line.
///
/// A run task is resolved against the build task it depends on, so an image
/// tag inferred for the build is the image the run starts.
pub async fn resolve_task(
    folder: &WorkspaceFolder,
    task: &TaskDefinition,
    tasks: &[TaskDefinition],
    cancel: &CancellationToken,
) -> Result<ResolvedTask> {
    let target = RuntimeTarget::from_signals(task)?;
    debug!("Resolving '{}' as {}", task.label, target.platform());

    let command_line = match task.task_type.as_str() {
        DOCKER_BUILD_TYPE => {
            let partial = task.docker_build.clone().unwrap_or_default();
            let build = resolver::resolve_build_options(folder, &target, &partial).await?;
            build_command_line(&build)
        }
        DOCKER_RUN_TYPE => {
            let bound_build = match find_associated_build_task(tasks, task) {
                Some(build_task) => {
                    debug!("'{}' is bound to build task '{}'", task.label, build_task.label);
                    let build_target = RuntimeTarget::from_signals(build_task)?;
                    let partial = build_task.docker_build.clone().unwrap_or_default();
                    Some(resolver::resolve_build_options(folder, &build_target, &partial).await?)
                }
                None => None,
            };
            ensure_not_cancelled(cancel, &task.label)?;

            let partial = task.docker_run.clone().unwrap_or_default();
            let run =
                resolver::resolve_run_options(folder, &target, &partial, bound_build.as_ref())
                    .await?;
            run_command_line(&run)
        }
        other => {
            return Err(DocktaskError::Configuration(format!(
                "Task '{}' has type '{}', only '{}' and '{}' tasks resolve to a command line",
                task.label, other, DOCKER_BUILD_TYPE, DOCKER_RUN_TYPE
            )));
        }
    };
    ensure_not_cancelled(cancel, &task.label)?;

    info!("Resolved '{}': {}", task.label, command_line);
    Ok(ResolvedTask {
        label: task.label.clone(),
        platform: target.platform().to_string(),
        command_line,
    })
}

pub fn build_command_line(options: &BuildOptions) -> CommandLine {
    let dockerfile = options
        .dockerfile
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());
    let context = options
        .context
        .as_ref()
        .map(|p| p.to_string_lossy().to_string());

    CommandLineBuilder::create(DOCKER, &["build", "--rm"])
        .with_flag_arg("--pull", options.pull.unwrap_or(false))
        .with_named_arg("-f", dockerfile.as_deref())
        .with_key_value_args("--build-arg", options.args.as_ref())
        .with_key_value_args("--label", options.labels.as_ref())
        .with_named_arg("-t", options.tag.as_deref())
        .with_named_arg("--target", options.target.as_deref())
        .with_quoted_arg(context.as_deref())
        .build()
}

pub fn run_command_line(options: &RunOptions) -> CommandLine {
    CommandLineBuilder::create(DOCKER, &["run", "-dt"])
        .with_flag_arg("-P", options.ports_publish_all.unwrap_or(false))
        .with_named_arg("--name", options.container_name.as_deref())
        .with_named_arg("--network", options.network.as_deref())
        .with_named_arg("--network-alias", options.network_alias.as_deref())
        .with_key_value_args("-e", options.env.as_ref())
        .with_array_args("--env-file", options.env_files.as_deref(), |f: &String| {
            f.clone()
        })
        .with_key_value_args("--label", options.labels.as_ref())
        .with_array_args("-v", options.volumes.as_deref(), VolumeMapping::to_arg)
        .with_array_args("-p", options.ports.as_deref(), PortMapping::to_arg)
        .with_array_args("--add-host", options.extra_hosts.as_deref(), ExtraHost::to_arg)
        .with_named_arg("--entrypoint", options.entrypoint.as_deref())
        .with_quoted_arg(options.image.as_deref())
        .with_args(options.command.as_ref())
        .build()
}
