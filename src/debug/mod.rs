//! Debug configuration resolution.
//!
//! A debug configuration names a pre-launch task; the run task reached from it
//! (and the build task that run task depends on) supply the image and
//! container the debugger targets. When a run task is found the session is
//! the one creating the container, so the resolved configuration records it
//! in `_containerNameToKill` for cleanup once the session ends.

pub mod session;

pub use session::DebugSessionManager;

use indexmap::IndexMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    error::{DocktaskError, Result},
    options::RunOptions,
    platform::RuntimeTarget,
    resolver,
    task::{
        DebugConfiguration, TaskDefinition, WorkspaceFolder, find_associated_build_task,
        find_associated_run_task,
    },
    util::ensure_not_cancelled,
};

/// How the debugger reaches the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "request",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum DebugLaunch {
    /// Start the program inside the container through a pipe transport.
    Launch {
        program: String,
        args: Vec<String>,
        cwd: String,
        pipe_transport: PipeTransport,
        source_file_map: IndexMap<String, String>,
    },
    /// Attach to an inspector already listening in the container.
    Attach {
        address: String,
        port: u16,
        local_root: String,
        remote_root: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeTransport {
    pub pipe_program: String,
    pub pipe_args: Vec<String>,
    pub debugger_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDebugConfiguration {
    pub name: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_launch_task: Option<String>,
    #[serde(flatten)]
    pub launch: DebugLaunch,
    pub container_name: String,
    pub image: String,
    #[serde(
        rename = "_containerNameToKill",
        skip_serializing_if = "Option::is_none"
    )]
    pub container_name_to_kill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_container_after_debug: Option<bool>,
}

impl ResolvedDebugConfiguration {
    /// Whether the container should be removed once the session ends.
    pub fn removes_container(&self) -> bool {
        self.remove_container_after_debug.unwrap_or(true)
            && self
                .container_name_to_kill
                .as_deref()
                .is_some_and(|name| !name.is_empty())
    }
}

pub async fn resolve_debug_configuration(
    folder: &WorkspaceFolder,
    configuration: &DebugConfiguration,
    tasks: &[TaskDefinition],
    cancel: &CancellationToken,
) -> Result<ResolvedDebugConfiguration> {
    let name = configuration.name.as_str();
    let target = RuntimeTarget::from_signals(configuration)?;
    debug!("Debug configuration '{}' targets {}", name, target.platform());

    let run_task = find_associated_run_task(tasks, configuration);
    let (run_options, launch_target) = match run_task {
        Some(run_task) => {
            debug!("'{}' is backed by run task '{}'", name, run_task.label);
            let run_target = RuntimeTarget::from_signals(run_task)?;
            if run_target.platform() != target.platform() {
                return Err(DocktaskError::Configuration(format!(
                    "Debug configuration '{}' targets {} but its run task '{}' targets {}",
                    name,
                    target.platform(),
                    run_task.label,
                    run_target.platform()
                )));
            }
            let run_options =
                resolve_backing_run_options(folder, run_task, &run_target, tasks, cancel).await?;
            // Run task options, overlaid by what the configuration sets.
            (run_options, run_target.overridden_by(&target))
        }
        None => {
            debug!("'{}' has no associated run task", name);
            let run_options = resolver::resolve_common_run_options(
                folder,
                &RunOptions::default(),
                None,
                resolver::default_tag_suffix(&target),
            );
            (run_options, target)
        }
    };
    ensure_not_cancelled(cancel, name)?;

    let created_container = run_task.and(run_options.container_name.clone());

    let mut targeted = run_options;
    if let Some(override_name) = configuration
        .container_name
        .as_deref()
        .filter(|n| !n.is_empty())
    {
        targeted.container_name = Some(override_name.to_string());
    }

    let launch = resolver::resolve_debug_launch(folder, &launch_target, &targeted).await?;
    ensure_not_cancelled(cancel, name)?;

    let resolved = ResolvedDebugConfiguration {
        name: configuration.name.clone(),
        platform: launch_target.platform().to_string(),
        pre_launch_task: configuration.pre_launch_task.clone(),
        launch,
        container_name: targeted.container_name.unwrap_or_default(),
        image: targeted.image.unwrap_or_default(),
        container_name_to_kill: created_container,
        remove_container_after_debug: configuration.remove_container_after_debug,
    };
    info!(
        "Resolved debug configuration '{}' for container '{}'",
        resolved.name, resolved.container_name
    );

    Ok(resolved)
}

/// Run options of `run_task`, informed by its bound build task.
async fn resolve_backing_run_options(
    folder: &WorkspaceFolder,
    run_task: &TaskDefinition,
    run_target: &RuntimeTarget,
    tasks: &[TaskDefinition],
    cancel: &CancellationToken,
) -> Result<RunOptions> {
    let bound_build = match find_associated_build_task(tasks, run_task) {
        Some(build_task) => {
            ensure_not_cancelled(cancel, &run_task.label)?;
            let build_target = RuntimeTarget::from_signals(build_task)?;
            let partial = build_task.docker_build.clone().unwrap_or_default();
            Some(resolver::resolve_build_options(folder, &build_target, &partial).await?)
        }
        None => None,
    };
    ensure_not_cancelled(cancel, &run_task.label)?;

    let partial = run_task.docker_run.clone().unwrap_or_default();
    resolver::resolve_run_options(folder, run_target, &partial, bound_build.as_ref()).await
}
