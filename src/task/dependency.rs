use std::collections::HashSet;

use tracing::trace;

use super::{DOCKER_BUILD_TYPE, DOCKER_RUN_TYPE, DebugConfiguration, DependsOn, TaskDefinition};

pub fn find_task_by_label<'a>(
    tasks: &'a [TaskDefinition],
    label: &str,
) -> Option<&'a TaskDefinition> {
    tasks.iter().find(|t| t.label == label)
}

pub fn find_first_task_of_type<'a>(
    tasks: &'a [TaskDefinition],
    task_type: &str,
) -> Option<&'a TaskDefinition> {
    tasks.iter().find(|t| t.task_type == task_type)
}

/// Walks `dependsOn` edges from `start` until a task of `task_type` is found.
///
/// Label lists are explored depth first in declaration order and the first
/// match wins. Every label is visited at most once, so cyclic or
/// self-referencing graphs end in `None`.
pub fn find_task_by_type<'a>(
    tasks: &'a [TaskDefinition],
    task_type: &str,
    start: &'a TaskDefinition,
) -> Option<&'a TaskDefinition> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&'a TaskDefinition> = vec![start];

    while let Some(node) = stack.pop() {
        if !visited.insert(node.label.as_str()) {
            trace!("'{}' already visited", node.label);
            continue;
        }

        if node.task_type == task_type {
            return Some(node);
        }

        match &node.depends_on {
            Some(DependsOn::Type(type_ref)) => {
                if let Some(next) = find_first_task_of_type(tasks, &type_ref.task_type) {
                    stack.push(next);
                }
            }
            Some(DependsOn::Label(_)) | Some(DependsOn::Labels(_)) => {
                for label in node.dependency_labels().iter().rev() {
                    match find_task_by_label(tasks, label) {
                        Some(next) => stack.push(next),
                        None => trace!("'{}' depends on missing task '{}'", node.label, label),
                    }
                }
            }
            None => {}
        }
    }

    None
}

/// The run task feeding a debug session, reached through its `preLaunchTask`.
pub fn find_associated_run_task<'a>(
    tasks: &'a [TaskDefinition],
    configuration: &DebugConfiguration,
) -> Option<&'a TaskDefinition> {
    let label = configuration.pre_launch_task.as_deref()?;
    let start = find_task_by_label(tasks, label)?;
    find_task_by_type(tasks, DOCKER_RUN_TYPE, start)
}

pub fn find_associated_build_task<'a>(
    tasks: &'a [TaskDefinition],
    run_task: &'a TaskDefinition,
) -> Option<&'a TaskDefinition> {
    find_task_by_type(tasks, DOCKER_BUILD_TYPE, run_task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskTypeRef;

    fn labels(items: &[&str]) -> DependsOn {
        DependsOn::Labels(items.iter().map(|s| s.to_string()).collect())
    }

    fn build_and_run() -> Vec<TaskDefinition> {
        vec![
            TaskDefinition::new("A", DOCKER_BUILD_TYPE),
            TaskDefinition::new("B", DOCKER_RUN_TYPE).with_depends_on(labels(&["A"])),
        ]
    }

    #[test]
    fn debug_configuration_finds_run_then_build() {
        let tasks = build_and_run();
        let config = DebugConfiguration::new("Debug").with_pre_launch_task("B");

        let run = find_associated_run_task(&tasks, &config).unwrap();
        assert_eq!(run.label, "B");

        let build = find_associated_build_task(&tasks, run).unwrap();
        assert_eq!(build.label, "A");
    }

    #[test]
    fn no_pre_launch_task_means_no_run_task() {
        let tasks = build_and_run();
        let config = DebugConfiguration::new("Debug");
        assert!(find_associated_run_task(&tasks, &config).is_none());

        let config = DebugConfiguration::new("Debug").with_pre_launch_task("missing");
        assert!(find_associated_run_task(&tasks, &config).is_none());
    }

    #[test]
    fn pre_launch_compound_task_leads_to_run_task() {
        let mut tasks = build_and_run();
        tasks.push(TaskDefinition::new("prepare", "shell").with_depends_on(labels(&["B"])));
        let config = DebugConfiguration::new("Debug").with_pre_launch_task("prepare");

        assert_eq!(find_associated_run_task(&tasks, &config).unwrap().label, "B");
    }

    #[test]
    fn two_task_cycle_terminates() {
        let tasks = vec![
            TaskDefinition::new("A", "shell").with_depends_on(labels(&["B"])),
            TaskDefinition::new("B", "shell").with_depends_on(labels(&["A"])),
        ];

        assert!(find_task_by_type(&tasks, DOCKER_BUILD_TYPE, &tasks[0]).is_none());
        assert!(find_task_by_type(&tasks, DOCKER_BUILD_TYPE, &tasks[1]).is_none());
    }

    #[test]
    fn self_reference_terminates() {
        let tasks = vec![
            TaskDefinition::new("loop", DOCKER_RUN_TYPE)
                .with_depends_on(DependsOn::Label("loop".to_string())),
        ];
        assert!(find_associated_build_task(&tasks, &tasks[0]).is_none());
    }

    #[test]
    fn type_reference_cycle_terminates() {
        let tasks = vec![
            TaskDefinition::new("run", DOCKER_RUN_TYPE).with_depends_on(DependsOn::Type(
                TaskTypeRef {
                    task_type: DOCKER_RUN_TYPE.to_string(),
                },
            )),
        ];
        assert!(find_associated_build_task(&tasks, &tasks[0]).is_none());
    }

    #[test]
    fn type_reference_resolves_first_task_of_type() {
        let tasks = vec![
            TaskDefinition::new("build-1", DOCKER_BUILD_TYPE),
            TaskDefinition::new("build-2", DOCKER_BUILD_TYPE),
            TaskDefinition::new("run", DOCKER_RUN_TYPE).with_depends_on(DependsOn::Type(
                TaskTypeRef {
                    task_type: DOCKER_BUILD_TYPE.to_string(),
                },
            )),
        ];
        assert_eq!(
            find_associated_build_task(&tasks, &tasks[2]).unwrap().label,
            "build-1"
        );
    }

    #[test]
    fn multiple_dependencies_are_first_match_wins() {
        let tasks = vec![
            TaskDefinition::new("lint", "shell"),
            TaskDefinition::new("build-api", DOCKER_BUILD_TYPE),
            TaskDefinition::new("build-web", DOCKER_BUILD_TYPE),
            TaskDefinition::new("run", DOCKER_RUN_TYPE)
                .with_depends_on(labels(&["lint", "build-web", "build-api"])),
        ];
        assert_eq!(
            find_associated_build_task(&tasks, &tasks[3]).unwrap().label,
            "build-web"
        );
    }

    #[test]
    fn depth_first_before_later_siblings() {
        let tasks = vec![
            TaskDefinition::new("prep", "shell").with_depends_on(labels(&["deep-build"])),
            TaskDefinition::new("deep-build", DOCKER_BUILD_TYPE),
            TaskDefinition::new("shallow-build", DOCKER_BUILD_TYPE),
            TaskDefinition::new("run", DOCKER_RUN_TYPE)
                .with_depends_on(labels(&["prep", "shallow-build"])),
        ];
        assert_eq!(
            find_associated_build_task(&tasks, &tasks[3]).unwrap().label,
            "deep-build"
        );
    }

    #[test]
    fn missing_labels_are_skipped() {
        let tasks = vec![
            TaskDefinition::new("build", DOCKER_BUILD_TYPE),
            TaskDefinition::new("run", DOCKER_RUN_TYPE).with_depends_on(labels(&["gone", "build"])),
        ];
        assert_eq!(
            find_associated_build_task(&tasks, &tasks[1]).unwrap().label,
            "build"
        );
    }

    #[test]
    fn label_lookup_prefers_declaration_order() {
        let mut tasks = build_and_run();
        tasks.push(TaskDefinition::new("A", "shell"));
        assert_eq!(
            find_task_by_label(&tasks, "A").unwrap().task_type,
            DOCKER_BUILD_TYPE
        );
    }
}
