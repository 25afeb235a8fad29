use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use super::{DOCKER_BUILD_TYPE, DOCKER_RUN_TYPE, DependsOn, TaskDefinition, dependency};
use crate::platform::{Platform, classify};

/// A problem in the declared task graph. Issues are reported, never fatal:
/// resolution tolerates all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    DuplicateLabel(String),
    SelfDependency(String),
    MissingDependency { task: String, dependency: String },
    MissingTypeReference { task: String, task_type: String },
    Cycle(Vec<String>),
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::DuplicateLabel(label) => {
                write!(f, "Task label '{}' is declared more than once", label)
            }
            GraphIssue::SelfDependency(label) => write!(f, "Task '{}' depends on itself", label),
            GraphIssue::MissingDependency { task, dependency } => write!(
                f,
                "Task '{}' depends on '{}' which doesn't exist",
                task, dependency
            ),
            GraphIssue::MissingTypeReference { task, task_type } => write!(
                f,
                "Task '{}' depends on a '{}' task but none is declared",
                task, task_type
            ),
            GraphIssue::Cycle(path) => write!(f, "Circular dependency: {}", path.join(" -> ")),
        }
    }
}

pub fn diagnose_task_graph(tasks: &[TaskDefinition]) -> Vec<GraphIssue> {
    let mut issues = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for task in tasks {
        if !seen.insert(task.label.as_str()) {
            issues.push(GraphIssue::DuplicateLabel(task.label.clone()));
        }
    }

    for task in tasks {
        for dep_id in task.dependency_labels() {
            if dep_id == &task.label {
                issues.push(GraphIssue::SelfDependency(task.label.clone()));
            } else if !seen.contains(dep_id.as_str()) {
                issues.push(GraphIssue::MissingDependency {
                    task: task.label.clone(),
                    dependency: dep_id.clone(),
                });
            }
        }

        if let Some(DependsOn::Type(type_ref)) = &task.depends_on {
            if dependency::find_first_task_of_type(tasks, &type_ref.task_type).is_none() {
                issues.push(GraphIssue::MissingTypeReference {
                    task: task.label.clone(),
                    task_type: type_ref.task_type.clone(),
                });
            }
        }
    }

    if let Some(cycle) = detect_cycle(tasks) {
        issues.push(GraphIssue::Cycle(cycle));
    }

    issues
}

fn detect_cycle(tasks: &[TaskDefinition]) -> Option<Vec<String>> {
    let mut task_map: HashMap<&str, &TaskDefinition> = HashMap::new();
    for task in tasks {
        task_map.entry(task.label.as_str()).or_insert(task);
    }

    let mut visited = HashSet::new();
    for task in tasks {
        let mut path = Vec::new();
        if let Some(repeated) = find_cycle(tasks, &task.label, &task_map, &mut visited, &mut path) {
            path.push(repeated);
            return Some(path);
        }
    }

    None
}

fn find_cycle(
    tasks: &[TaskDefinition],
    label: &str,
    task_map: &HashMap<&str, &TaskDefinition>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<String> {
    if path.iter().any(|id| id == label) {
        return Some(label.to_string());
    }

    if visited.contains(label) {
        return None;
    }

    visited.insert(label.to_string());
    path.push(label.to_string());

    if let Some(task) = task_map.get(label) {
        for next in edges(tasks, task) {
            if let Some(repeated) = find_cycle(tasks, next, task_map, visited, path) {
                return Some(repeated);
            }
        }
    }

    path.pop();

    None
}

fn edges<'a>(tasks: &'a [TaskDefinition], task: &'a TaskDefinition) -> Vec<&'a str> {
    match &task.depends_on {
        Some(DependsOn::Type(type_ref)) => {
            dependency::find_first_task_of_type(tasks, &type_ref.task_type)
                .map(|t| vec![t.label.as_str()])
                .unwrap_or_default()
        }
        _ => task
            .dependency_labels()
            .iter()
            .map(String::as_str)
            .collect(),
    }
}

/// One line per task: label, type, classified platform and the build task a
/// run task is bound to.
pub fn describe_tasks(tasks: &[TaskDefinition]) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let mut line = format!("{} [{}]", task.label, task.task_type);
            if task.task_type == DOCKER_BUILD_TYPE || task.task_type == DOCKER_RUN_TYPE {
                let platform = classify(task);
                if platform != Platform::Unknown {
                    line.push_str(&format!(" platform={}", platform));
                } else {
                    line.push_str(" platform=?");
                }
            }
            if task.task_type == DOCKER_RUN_TYPE {
                match dependency::find_associated_build_task(tasks, task) {
                    Some(build) => line.push_str(&format!(" <- {}", build.label)),
                    None => line.push_str(" (no build task)"),
                }
            }
            line
        })
        .collect()
}
