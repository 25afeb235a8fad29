//! Compiled managed projects.
//!
//! Defaults: build context is the workspace root and images are tagged
//! `:dev`. No port is published automatically. The workspace root is mounted at
//! `/src` and, unless an entrypoint or command is declared, the container is
//! kept alive with `tail -f /dev/null` so the debugger can launch the program
//! through `docker exec`.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use tracing::debug;

use super::{OptionResolver, resolve_common_run_options};
use crate::{
    command_line::CommandArgs,
    debug::{DebugLaunch, PipeTransport},
    error::{DocktaskError, Result},
    options::{BuildOptions, RunOptions, VolumeMapping},
    platform::NativeRuntimeOptions,
    task::WorkspaceFolder,
    util::{absolutize, container_relative_path},
};

pub const CONTAINER_SOURCE_ROOT: &str = "/src";
pub const DEFAULT_DEBUGGER_PATH: &str = "/remote_debugger/vsdbg";
const PROJECT_PATTERNS: &[&str] = &["*.csproj", "*.fsproj", "*.vbproj"];
const LAUNCHER: &str = "dotnet";

static TARGET_FRAMEWORK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<TargetFrameworks?>\s*([^<;\s]+)").expect("target framework pattern is valid")
});

pub struct NativeResolver;

#[async_trait]
impl OptionResolver for NativeResolver {
    type RuntimeOptions = NativeRuntimeOptions;

    fn default_tag_suffix(&self) -> &'static str {
        "dev"
    }

    async fn resolve_build_options(
        &self,
        folder: &WorkspaceFolder,
        partial: &BuildOptions,
        _runtime: &NativeRuntimeOptions,
    ) -> Result<BuildOptions> {
        let mut resolved = partial.clone();

        let context = resolved
            .context
            .get_or_insert_with(|| folder.path.clone())
            .clone();

        if resolved.dockerfile.is_none() {
            resolved.dockerfile = Some(context.join("Dockerfile"));
        }

        if resolved.tag.is_none() {
            resolved.tag = Some(super::default_image_name(
                &folder.name,
                self.default_tag_suffix(),
            ));
        }

        Ok(resolved)
    }

    async fn resolve_run_options(
        &self,
        folder: &WorkspaceFolder,
        partial: &RunOptions,
        _runtime: &NativeRuntimeOptions,
        bound_build: Option<&BuildOptions>,
    ) -> Result<RunOptions> {
        let mut resolved =
            resolve_common_run_options(folder, partial, bound_build, self.default_tag_suffix());

        if resolved.volumes.is_none() {
            resolved.volumes = Some(vec![VolumeMapping {
                local_path: folder.path.to_string_lossy().to_string(),
                container_path: CONTAINER_SOURCE_ROOT.to_string(),
                permissions: Some("rw".to_string()),
            }]);
        }

        if resolved.entrypoint.is_none()
            && resolved.command.as_ref().is_none_or(CommandArgs::is_empty)
        {
            resolved.entrypoint = Some("tail".to_string());
            resolved.command = Some(CommandArgs::Line("-f /dev/null".to_string()));
        }

        Ok(resolved)
    }

    async fn resolve_debug_launch(
        &self,
        folder: &WorkspaceFolder,
        runtime: &NativeRuntimeOptions,
        run: &RunOptions,
    ) -> Result<DebugLaunch> {
        let project = match &runtime.app_project {
            Some(path) => absolutize(&folder.path, path),
            None => discover_project(&folder.path)?,
        };
        debug!("Using project {}", project.display());

        let project_dir = project.parent().unwrap_or(folder.path.as_path());
        let relative = container_relative_path(&folder.path, project_dir).ok_or_else(|| {
            DocktaskError::Configuration(format!(
                "Project '{}' is outside the workspace folder '{}'",
                project.display(),
                folder.path.display()
            ))
        })?;
        let cwd = join_container_path(CONTAINER_SOURCE_ROOT, &relative);

        let artifact = match runtime.app_output.as_deref().filter(|o| !o.is_empty()) {
            Some(output) => output.to_string(),
            None => default_app_output(&project).await?,
        };

        let container_name = run.container_name.clone().ok_or_else(|| {
            DocktaskError::Configuration("No container name was resolved".to_string())
        })?;

        let mut source_file_map = IndexMap::new();
        source_file_map.insert(
            CONTAINER_SOURCE_ROOT.to_string(),
            folder.path.to_string_lossy().to_string(),
        );

        Ok(DebugLaunch::Launch {
            program: LAUNCHER.to_string(),
            args: vec![join_container_path(&cwd, &artifact)],
            cwd,
            pipe_transport: PipeTransport {
                pipe_program: "docker".to_string(),
                pipe_args: vec!["exec".to_string(), "-i".to_string(), container_name],
                debugger_path: runtime
                    .debugger_path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DEBUGGER_PATH.to_string()),
            },
            source_file_map,
        })
    }
}

fn join_container_path(base: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches("./").trim_matches('/');
    if relative.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), relative)
    }
}

/// Finds the single project file in the workspace root.
fn discover_project(root: &Path) -> Result<PathBuf> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let mut found = Vec::new();

    for pattern in PROJECT_PATTERNS {
        let full_pattern = format!("{}/{}", escaped_root, pattern);
        let entries = glob::glob(&full_pattern)
            .map_err(|e| DocktaskError::Configuration(format!("Invalid project pattern: {}", e)))?;
        found.extend(entries.flatten());
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(DocktaskError::Configuration(format!(
            "No project file found in '{}'; set nativeRuntime.appProject",
            root.display()
        ))),
        n => Err(DocktaskError::Configuration(format!(
            "Found {} project files in '{}'; set nativeRuntime.appProject",
            n,
            root.display()
        ))),
    }
}

/// `bin/Debug/<framework>/<project>.dll`, with the framework read from the
/// project file.
async fn default_app_output(project: &Path) -> Result<String> {
    let contents = tokio::fs::read_to_string(project).await.map_err(|e| {
        DocktaskError::Configuration(format!(
            "Unable to read project '{}': {}",
            project.display(),
            e
        ))
    })?;

    let framework = TARGET_FRAMEWORK
        .captures(&contents)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            DocktaskError::Configuration(format!(
                "Unable to determine the target framework of '{}'; set nativeRuntime.appOutput",
                project.display()
            ))
        })?;

    let name = project
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(format!("bin/Debug/{}/{}.dll", framework, name))
}
