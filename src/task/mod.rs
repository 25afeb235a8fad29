pub mod analysis;
pub mod config;
pub mod dependency;
pub mod resolve;

pub use analysis::describe_tasks;
pub use config::{UpsertOutcome, Workspace, WorkspaceFile, WorkspaceFolder, load_workspace};
pub use dependency::{find_associated_build_task, find_associated_run_task, find_task_by_label};
pub use resolve::resolve_task;

use serde::{Deserialize, Serialize};

use crate::{
    options::{BuildOptions, RunOptions},
    platform::{NativeRuntimeOptions, PlatformSignals, ScriptingRuntimeOptions},
};

pub const DOCKER_BUILD_TYPE: &str = "docker-build";
pub const DOCKER_RUN_TYPE: &str = "docker-run";
pub const DOCKER_DEBUG_TYPE: &str = "docker";

/// A `dependsOn` value: one label, an ordered list of labels, or a reference
/// to the first declared task of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    Label(String),
    Labels(Vec<String>),
    Type(TaskTypeRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeRef {
    #[serde(rename = "type")]
    pub task_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub label: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_build: Option<BuildOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_run: Option<RunOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_runtime: Option<NativeRuntimeOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripting_runtime: Option<ScriptingRuntimeOptions>,
}

impl TaskDefinition {
    /// Labels this task refers to directly; type references are not included.
    pub fn dependency_labels(&self) -> &[String] {
        match &self.depends_on {
            Some(DependsOn::Label(label)) => std::slice::from_ref(label),
            Some(DependsOn::Labels(labels)) => labels,
            Some(DependsOn::Type(_)) | None => &[],
        }
    }
}

#[cfg(test)]
impl TaskDefinition {
    pub fn new(label: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            task_type: task_type.into(),
            platform: None,
            depends_on: None,
            docker_build: None,
            docker_run: None,
            native_runtime: None,
            scripting_runtime: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_depends_on(mut self, depends_on: DependsOn) -> Self {
        self.depends_on = Some(depends_on);
        self
    }

    pub fn with_build(mut self, build: BuildOptions) -> Self {
        self.docker_build = Some(build);
        self
    }

    pub fn with_scripting_runtime(mut self, options: ScriptingRuntimeOptions) -> Self {
        self.scripting_runtime = Some(options);
        self
    }
}

impl PlatformSignals for TaskDefinition {
    fn display_name(&self) -> &str {
        &self.label
    }

    fn declared_platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    fn native_runtime(&self) -> Option<&NativeRuntimeOptions> {
        self.native_runtime.as_ref()
    }

    fn scripting_runtime(&self) -> Option<&ScriptingRuntimeOptions> {
        self.scripting_runtime.as_ref()
    }
}

fn default_debug_type() -> String {
    DOCKER_DEBUG_TYPE.to_string()
}

fn default_request() -> String {
    "launch".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugConfiguration {
    pub name: String,
    #[serde(rename = "type", default = "default_debug_type")]
    pub config_type: String,
    #[serde(default = "default_request")]
    pub request: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_launch_task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_container_after_debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_runtime: Option<NativeRuntimeOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripting_runtime: Option<ScriptingRuntimeOptions>,
}

#[cfg(test)]
impl DebugConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_type: default_debug_type(),
            request: default_request(),
            platform: None,
            pre_launch_task: None,
            container_name: None,
            remove_container_after_debug: None,
            native_runtime: None,
            scripting_runtime: None,
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_pre_launch_task(mut self, label: impl Into<String>) -> Self {
        self.pre_launch_task = Some(label.into());
        self
    }
}

impl PlatformSignals for DebugConfiguration {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn declared_platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    fn native_runtime(&self) -> Option<&NativeRuntimeOptions> {
        self.native_runtime.as_ref()
    }

    fn scripting_runtime(&self) -> Option<&ScriptingRuntimeOptions> {
        self.scripting_runtime.as_ref()
    }
}
