//! `package.json`-described projects.
//!
//! Defaults: build context is the directory holding the package manifest and
//! images are tagged `:latest`. Unless ports are declared (or all ports are
//! published), the inspector port is published on the same host port. Without
//! a declared command or entrypoint the container runs the manifest's entry
//! point under `node --inspect`.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use super::{OptionResolver, resolve_common_run_options};
use crate::{
    command_line::CommandArgs,
    debug::DebugLaunch,
    error::{DocktaskError, Result},
    options::{BuildOptions, PortMapping, RunOptions},
    platform::{InspectMode, ScriptingRuntimeOptions},
    task::WorkspaceFolder,
    util::absolutize,
};

pub const DEFAULT_INSPECT_PORT: u16 = 9229;
pub const DEFAULT_REMOTE_ROOT: &str = "/usr/src/app";
const PACKAGE_MANIFEST: &str = "package.json";

static NODE_START_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*node\s+(?:-\S+\s+)*([^\s-]\S*)").expect("start script pattern is valid")
});

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    scripts: IndexMap<String, String>,
}

pub struct ScriptingResolver;

impl ScriptingResolver {
    fn package_path(folder: &WorkspaceFolder, runtime: &ScriptingRuntimeOptions) -> PathBuf {
        match &runtime.package {
            Some(path) => absolutize(&folder.path, path),
            None => folder.path.join(PACKAGE_MANIFEST),
        }
    }

    fn package_dir(folder: &WorkspaceFolder, runtime: &ScriptingRuntimeOptions) -> PathBuf {
        Self::package_path(folder, runtime)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| folder.path.clone())
    }
}

#[async_trait]
impl OptionResolver for ScriptingResolver {
    type RuntimeOptions = ScriptingRuntimeOptions;

    fn default_tag_suffix(&self) -> &'static str {
        "latest"
    }

    async fn resolve_build_options(
        &self,
        folder: &WorkspaceFolder,
        partial: &BuildOptions,
        runtime: &ScriptingRuntimeOptions,
    ) -> Result<BuildOptions> {
        let mut resolved = partial.clone();

        let context = resolved
            .context
            .get_or_insert_with(|| Self::package_dir(folder, runtime))
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
        runtime: &ScriptingRuntimeOptions,
        bound_build: Option<&BuildOptions>,
    ) -> Result<RunOptions> {
        let mut resolved =
            resolve_common_run_options(folder, partial, bound_build, self.default_tag_suffix());
        let inspect_port = runtime.inspect_port.unwrap_or(DEFAULT_INSPECT_PORT);

        if resolved.ports.is_none() && resolved.ports_publish_all != Some(true) {
            resolved.ports = Some(vec![PortMapping {
                host_port: Some(inspect_port),
                container_port: inspect_port,
                protocol: None,
            }]);
        }

        if resolved.command.as_ref().is_none_or(CommandArgs::is_empty)
            && resolved.entrypoint.is_none()
        {
            let package = Self::package_path(folder, runtime);
            let entry = read_entry_point(&package).await?;
            let flag = match runtime.inspect_mode.unwrap_or_default() {
                InspectMode::Default => "--inspect",
                InspectMode::Break => "--inspect-brk",
            };
            resolved.command = Some(CommandArgs::Tokens(vec![
                "node".to_string(),
                format!("{}=0.0.0.0:{}", flag, inspect_port),
                entry,
            ]));
        }

        Ok(resolved)
    }

    async fn resolve_debug_launch(
        &self,
        folder: &WorkspaceFolder,
        runtime: &ScriptingRuntimeOptions,
        run: &RunOptions,
    ) -> Result<DebugLaunch> {
        let inspect_port = runtime.inspect_port.unwrap_or(DEFAULT_INSPECT_PORT);
        let port = run
            .ports
            .iter()
            .flatten()
            .find(|p| p.container_port == inspect_port)
            .and_then(|p| p.host_port)
            .unwrap_or(inspect_port);
        debug!("Attaching to inspector on host port {}", port);

        Ok(DebugLaunch::Attach {
            address: "localhost".to_string(),
            port,
            local_root: Self::package_dir(folder, runtime)
                .to_string_lossy()
                .to_string(),
            remote_root: runtime
                .remote_root
                .clone()
                .unwrap_or_else(|| DEFAULT_REMOTE_ROOT.to_string()),
        })
    }
}

/// `main` from the manifest, else the script of a `node <script>` start
/// command.
async fn read_entry_point(package: &Path) -> Result<String> {
    let contents = tokio::fs::read_to_string(package).await.map_err(|e| {
        DocktaskError::Configuration(format!(
            "Unable to read package manifest '{}': {}",
            package.display(),
            e
        ))
    })?;

    let manifest: PackageManifest = serde_json::from_str(&contents).map_err(|e| {
        DocktaskError::Configuration(format!(
            "Unable to parse package manifest '{}': {}",
            package.display(),
            e
        ))
    })?;

    if let Some(main) = manifest.main.filter(|m| !m.is_empty()) {
        return Ok(main);
    }

    manifest
        .scripts
        .get("start")
        .and_then(|start| NODE_START_SCRIPT.captures(start))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            DocktaskError::Configuration(format!(
                "Unable to determine the entry point of '{}'; declare 'main', a 'node <script>' start script, or dockerRun.command",
                package.display()
            ))
        })
}
