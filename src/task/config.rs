use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{DebugConfiguration, TaskDefinition, analysis::diagnose_task_graph};
use crate::{
    error::{DocktaskError, Result},
    util::absolutize,
};

static VARIABLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*(?::[A-Za-z_][A-Za-z0-9_]*)?)\}")
        .expect("variable pattern is valid")
});

const TASK_KEYS: [&str; 2] = ["task", "tasks"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigSection {
    /// Workspace folder, relative to the workspace file.
    #[serde(default)]
    folder: Option<PathBuf>,
    #[serde(default)]
    default_debug: Option<String>,
}

/// The records resolution works on, after variable substitution.
#[derive(Debug, Deserialize)]
struct WorkspaceRecords {
    #[serde(rename = "task", alias = "tasks", default)]
    tasks: Vec<TaskDefinition>,
    #[serde(rename = "debug", alias = "configurations", default)]
    debug: Vec<DebugConfiguration>,
}

/// The on-disk document, before variable substitution. Held as a raw tree so
/// saving leaves untouched entries, unknown fields and key names as read.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceFile {
    root: Map<String, Value>,
    tasks_key: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

impl WorkspaceFile {
    /// A document with no tasks, listing them under the key the format of
    /// `config_path` conventionally uses.
    pub fn empty(config_path: &Path) -> Self {
        Self::from_root(Map::new(), config_path)
    }

    fn from_root(root: Map<String, Value>, config_path: &Path) -> Self {
        let fallback = if is_json(config_path) { "tasks" } else { "task" };
        let tasks_key = TASK_KEYS
            .into_iter()
            .find(|key| root.contains_key(*key))
            .unwrap_or(fallback);
        Self { root, tasks_key }
    }

    pub fn tasks(&self) -> &[Value] {
        match self.root.get(self.tasks_key) {
            Some(Value::Array(tasks)) => tasks,
            _ => &[],
        }
    }

    /// Label-keyed insert. An existing label is only replaced when
    /// `overwrite` is set; otherwise the document is left untouched.
    pub fn upsert_task(&mut self, task: Value, overwrite: bool) -> Result<UpsertOutcome> {
        let label = serde_json::from_value::<TaskDefinition>(task.clone())?.label;
        let key = self.tasks_key;
        let entry = self
            .root
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(tasks) = entry else {
            return Err(DocktaskError::Configuration(format!("'{}' must be a list of tasks", key)));
        };

        match tasks.iter().position(|t| task_label(t) == Some(label.as_str())) {
            Some(_) if !overwrite => Err(DocktaskError::DuplicateLabel(label)),
            Some(index) => {
                tasks[index] = task;
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                tasks.push(task);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }
}

pub fn task_label(task: &Value) -> Option<&str> {
    task.get("label").and_then(Value::as_str)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceFolder {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceFolder {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                DocktaskError::Configuration(format!(
                    "Unable to determine task scope for '{}'",
                    path.display()
                ))
            })?;
        Ok(Self { name, path })
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    pub folder: WorkspaceFolder,
    pub tasks: Vec<TaskDefinition>,
    pub debug: Vec<DebugConfiguration>,
    pub default_debug: Option<String>,
}

impl Workspace {
    pub fn task(&self, label: &str) -> Result<&TaskDefinition> {
        super::find_task_by_label(&self.tasks, label)
            .ok_or_else(|| DocktaskError::TaskNotFound(label.to_string()))
    }

    pub fn debug_configuration(&self, name: &str) -> Result<&DebugConfiguration> {
        self.debug
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DocktaskError::DebugConfigurationNotFound(name.to_string()))
    }
}

pub fn load_workspace(config_path: &Path, folder_override: Option<&Path>) -> Result<Workspace> {
    let document = read_document(config_path)?;
    let section: ConfigSection = match document.get("config") {
        Some(value) => serde_json::from_value(value.clone())?,
        None => ConfigSection::default(),
    };

    let folder = resolve_folder(config_path, folder_override, section.folder.as_deref())?;
    debug!("Workspace folder: {}", folder.path.display());

    let mut variables = HashMap::new();
    add_builtin_variables(&mut variables, &folder);

    let document = substitute_variables_in_value(document, &variables);
    let records: WorkspaceRecords = serde_json::from_value(document)?;

    for issue in diagnose_task_graph(&records.tasks) {
        warn!("{}", issue);
    }

    Ok(Workspace {
        folder,
        tasks: records.tasks,
        debug: records.debug,
        default_debug: section.default_debug,
    })
}

pub fn read_workspace_file(config_path: &Path) -> Result<WorkspaceFile> {
    match read_document(config_path)? {
        Value::Object(root) => Ok(WorkspaceFile::from_root(root, config_path)),
        _ => Err(DocktaskError::Configuration(format!(
            "'{}' is not a table of tasks and debug configurations",
            config_path.display()
        ))),
    }
}

pub fn save_workspace_file(config_path: &Path, file: &WorkspaceFile) -> Result<()> {
    let contents = if is_json(config_path) {
        serde_json::to_string_pretty(&file.root)?
    } else {
        toml::to_string_pretty(&file.root)?
    };
    fs::write(config_path, contents)?;
    Ok(())
}

/// Parses TOML or JSON into a single value tree so substitution and
/// deserialization are format independent.
fn read_document(config_path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(config_path)?;
    if is_json(config_path) {
        Ok(serde_json::from_str(&contents)?)
    } else {
        let parsed: toml::Value = toml::from_str(&contents)?;
        Ok(serde_json::to_value(parsed)?)
    }
}

fn is_json(config_path: &Path) -> bool {
    config_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn resolve_folder(
    config_path: &Path,
    folder_override: Option<&Path>,
    declared: Option<&Path>,
) -> Result<WorkspaceFolder> {
    let config_parent = config_path.parent().unwrap_or_else(|| Path::new(""));
    let cwd = env::current_dir()?;
    let base = absolutize(&cwd, config_parent);

    let folder = match (folder_override, declared) {
        (Some(path), _) => absolutize(&cwd, path),
        (None, Some(path)) => absolutize(&base, path),
        (None, None) => base,
    };

    WorkspaceFolder::from_path(normalize(&folder))
}

/// Drops `.` components so folder names come from a real directory.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn add_builtin_variables(variables: &mut HashMap<String, String>, folder: &WorkspaceFolder) {
    for (key, value) in env::vars() {
        variables.insert(format!("env:{}", key), value);
    }

    variables.insert(
        "workspaceFolder".to_string(),
        folder.path.to_string_lossy().to_string(),
    );
    variables.insert("workspaceFolderBasename".to_string(), folder.name.clone());
}

fn substitute_variables_in_value(value: Value, variables: &HashMap<String, String>) -> Value {
    match value {
        Value::String(text) => Value::String(substitute_variables(&text, variables)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute_variables_in_value(item, variables))
                .collect(),
        ),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, item)| (key, substitute_variables_in_value(item, variables)))
                .collect(),
        ),
        other => other,
    }
}

fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    VARIABLE_PATTERN
        .replace_all(text, |caps: &regex::Captures| {
            let var_name = &caps[1];
            variables
                .get(var_name)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::DOCKER_BUILD_TYPE;
    use serde_json::json;

    const WORKSPACE_TOML: &str = r#"
[config]
defaultDebug = "Docker: Node"

[[task]]
label = "docker-build"
type = "docker-build"
platform = "scriptingRuntime"

[task.dockerBuild]
context = "${workspaceFolder}"
tag = "${workspaceFolderBasename}:latest"

[task.dockerBuild.args]
ZETA = "1"
ALPHA = "2"

[[task]]
label = "docker-run: debug"
type = "docker-run"
dependsOn = ["docker-build"]

[task.dockerRun]
env = { UNKNOWN = "${notAVariable}" }

[task.scriptingRuntime]
inspectPort = 9230

[[debug]]
name = "Docker: Node"
preLaunchTask = "docker-run: debug"
platform = "scriptingRuntime"
"#;

    fn write_workspace(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_tasks_in_declaration_order_with_substitution() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("my-app");
        fs::create_dir(&root).unwrap();
        let path = write_workspace(&root, "docktask.toml", WORKSPACE_TOML);

        let workspace = load_workspace(&path, None).unwrap();
        assert_eq!(workspace.folder.name, "my-app");
        assert_eq!(workspace.default_debug.as_deref(), Some("Docker: Node"));

        let labels: Vec<&str> = workspace.tasks.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, ["docker-build", "docker-run: debug"]);

        let build = workspace.tasks[0].docker_build.as_ref().unwrap();
        assert_eq!(build.context.as_deref(), Some(root.as_path()));
        assert_eq!(build.tag.as_deref(), Some("my-app:latest"));
        let arg_keys: Vec<&String> = build.args.as_ref().unwrap().keys().collect();
        assert_eq!(arg_keys, ["ZETA", "ALPHA"]);

        let run = workspace.tasks[1].docker_run.as_ref().unwrap();
        assert_eq!(run.env.as_ref().unwrap()["UNKNOWN"], "${notAVariable}");
        assert_eq!(
            workspace.tasks[1].scripting_runtime.as_ref().unwrap().inspect_port,
            Some(9230)
        );

        let config = workspace.debug_configuration("Docker: Node").unwrap();
        assert_eq!(config.pre_launch_task.as_deref(), Some("docker-run: debug"));
    }

    #[test]
    fn loads_json_with_vscode_style_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workspace(
            dir.path(),
            "tasks.json",
            r#"{
                "config": { "folder": "service" },
                "tasks": [{ "label": "build", "type": "docker-build" }],
                "configurations": [{ "name": "Debug", "preLaunchTask": "build" }]
            }"#,
        );

        let workspace = load_workspace(&path, None).unwrap();
        assert_eq!(workspace.folder.name, "service");
        assert_eq!(workspace.tasks[0].task_type, DOCKER_BUILD_TYPE);
        assert_eq!(workspace.debug[0].name, "Debug");
        assert!(workspace.task("missing").is_err());
    }

    #[test]
    fn env_variables_are_substituted() {
        let mut variables = HashMap::new();
        variables.insert("env:USER_NAME".to_string(), "dev".to_string());
        variables.insert("workspaceFolder".to_string(), "/work".to_string());

        assert_eq!(
            substitute_variables("${workspaceFolder}/${env:USER_NAME}/${env:MISSING}", &variables),
            "/work/dev/${env:MISSING}"
        );
    }

    #[test]
    fn upsert_rejects_duplicate_without_overwrite() {
        let mut file = WorkspaceFile::empty(Path::new("docktask.toml"));
        let original = json!({ "label": "build", "type": "docker-build" });
        assert_eq!(
            file.upsert_task(original.clone(), false).unwrap(),
            UpsertOutcome::Inserted
        );

        let replacement = json!({
            "label": "build",
            "type": "docker-build",
            "platform": "nativeRuntime"
        });
        let err = file.upsert_task(replacement.clone(), false).unwrap_err();
        assert!(matches!(err, DocktaskError::DuplicateLabel(ref label) if label == "build"));
        assert_eq!(file.tasks(), [original]);

        assert_eq!(
            file.upsert_task(replacement.clone(), true).unwrap(),
            UpsertOutcome::Replaced
        );
        assert_eq!(file.tasks(), [replacement]);
    }

    #[test]
    fn upsert_rejects_tasks_without_label() {
        let mut file = WorkspaceFile::empty(Path::new("tasks.json"));
        let err = file.upsert_task(json!({ "type": "shell" }), false).unwrap_err();
        assert!(matches!(err, DocktaskError::Parse(_)));
        assert!(file.tasks().is_empty());
    }

    #[test]
    fn saved_file_reads_back_unsubstituted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workspace(dir.path(), "docktask.toml", WORKSPACE_TOML);

        let mut file = read_workspace_file(&path).unwrap();
        file.upsert_task(json!({ "label": "extra", "type": "shell" }), false)
            .unwrap();
        save_workspace_file(&path, &file).unwrap();

        let reread = read_workspace_file(&path).unwrap();
        assert_eq!(reread.tasks().len(), 3);
        assert_eq!(
            reread.tasks()[0]["dockerBuild"]["context"],
            "${workspaceFolder}"
        );
        assert_eq!(reread, file);

        let workspace = load_workspace(&path, None).unwrap();
        assert_eq!(workspace.default_debug.as_deref(), Some("Docker: Node"));
        assert_eq!(workspace.tasks[2].label, "extra");
    }

    #[test]
    fn saving_keeps_fields_and_keys_it_does_not_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workspace(
            dir.path(),
            "tasks.json",
            r#"{
                "version": "2.0.0",
                "tasks": [
                    {
                        "label": "lint",
                        "type": "shell",
                        "command": "npm run lint",
                        "group": "build"
                    }
                ],
                "configurations": [{ "name": "Debug", "preLaunchTask": "lint" }]
            }"#,
        );

        let mut file = read_workspace_file(&path).unwrap();
        file.upsert_task(json!({ "label": "extra", "type": "docker-build" }), false)
            .unwrap();
        save_workspace_file(&path, &file).unwrap();

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["version"], "2.0.0");
        assert_eq!(saved["tasks"][0]["command"], "npm run lint");
        assert_eq!(saved["tasks"][0]["group"], "build");
        assert_eq!(saved["tasks"][1]["label"], "extra");
        assert_eq!(saved["configurations"][0]["name"], "Debug");
        assert!(saved.get("task").is_none());
        assert!(saved.get("debug").is_none());
    }

    #[test]
    fn empty_file_uses_the_conventional_task_key() {
        assert_eq!(WorkspaceFile::empty(Path::new("tasks.json")).tasks_key, "tasks");
        assert_eq!(WorkspaceFile::empty(Path::new("docktask.toml")).tasks_key, "task");
    }

    #[test]
    fn root_folder_has_no_task_scope() {
        let err = WorkspaceFolder::from_path("/").unwrap_err();
        assert!(matches!(err, DocktaskError::Configuration(_)));
    }
}
