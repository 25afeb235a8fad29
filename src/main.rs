use clap::Parser;
use std::{path::Path, process, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod cli;
mod command_line;
mod debug;
mod error;
mod options;
mod output;
mod platform;
mod resolver;
mod runtime;
mod task;
mod util;

use cli::{Cli, Command};
use debug::{DebugSessionManager, resolve_debug_configuration};
use error::{DocktaskError, Result};
use output::OutputFormat;
use runtime::DockerCli;
use task::{
    DOCKER_RUN_TYPE, UpsertOutcome, Workspace, WorkspaceFile, config, describe_tasks,
    find_associated_build_task, find_associated_run_task, load_workspace, resolve_task,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run_docktask(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::new(if verbose { "debug" } else { "warn" }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancelled on Ctrl-C so in-flight resolution stops between steps.
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupted, cancelling resolution");
            token.cancel();
        }
    });
    cancel
}

async fn run_docktask(args: Cli) -> Result<()> {
    let output = args.output;
    let load = || load_workspace(&args.file, args.folder.as_deref());

    match args.command {
        Command::Resolve { label } => {
            let workspace = load()?;
            let task = workspace.task(&label)?;
            let resolved = resolve_task(
                &workspace.folder,
                task,
                &workspace.tasks,
                &cancel_on_interrupt(),
            )
            .await?;
            print(output.render(&resolved, |r| r.command_line.to_string())?);
        }
        Command::Debug { name } => {
            let workspace = load()?;
            let configuration = workspace.debug_configuration(&debug_name(&workspace, name)?)?;
            let resolved = resolve_debug_configuration(
                &workspace.folder,
                configuration,
                &workspace.tasks,
                &cancel_on_interrupt(),
            )
            .await?;
            // A launch description is a JSON document in either format.
            print(serde_json::to_string_pretty(&resolved)?);
        }
        Command::RunTask { name } => {
            let workspace = load()?;
            let configuration = workspace.debug_configuration(&name)?;
            let run_task = find_associated_run_task(&workspace.tasks, configuration);
            print(output.render(&run_task, |t| match t {
                Some(task) => task.label.clone(),
                None => format!("No {} task is associated with '{}'", DOCKER_RUN_TYPE, name),
            })?);
        }
        Command::BuildTask { label } => {
            let workspace = load()?;
            let run_task = workspace.task(&label)?;
            let build_task = find_associated_build_task(&workspace.tasks, run_task);
            print(output.render(&build_task, |t| match t {
                Some(task) => task.label.clone(),
                None => format!("'{}' is not bound to a build task", label),
            })?);
        }
        Command::List => list(&load()?, output)?,
        Command::Add { from, overwrite } => add_tasks(&args.file, &from, overwrite)?,
        Command::Cleanup { name } => {
            let workspace = load()?;
            let configuration = workspace.debug_configuration(&debug_name(&workspace, name)?)?;
            let manager = DebugSessionManager::new(Arc::new(DockerCli::default()));
            let session = manager
                .start_session(
                    &workspace.folder,
                    configuration,
                    &workspace.tasks,
                    &cancel_on_interrupt(),
                )
                .await?;
            if let Some(subscription) = session.subscription() {
                tracing::debug!("Session {} armed container cleanup", subscription.session_id());
            }
            let outcomes = match session.terminated() {
                Some(event) => manager.session_terminated(&event).await,
                None => Vec::new(),
            };
            tracing::debug!(
                "{} cleanup subscriptions remain",
                manager.active_subscriptions().await
            );
            print(output.render(&outcomes, |outcomes| {
                if outcomes.is_empty() {
                    format!("'{}' owns no container to remove", session.name)
                } else {
                    outcomes
                        .iter()
                        .map(|o| {
                            let verb = if o.removed { "Removed" } else { "Failed to remove" };
                            format!("{} {}", verb, o.container_name)
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            })?);
        }
    }

    Ok(())
}

/// The named configuration, or the workspace default.
fn debug_name(workspace: &Workspace, name: Option<String>) -> Result<String> {
    name.or_else(|| workspace.default_debug.clone())
        .ok_or_else(|| {
            DocktaskError::Configuration(
                "No debug configuration given and no defaultDebug declared".to_string(),
            )
        })
}

fn list(workspace: &Workspace, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            let listing = serde_json::json!({
                "folder": workspace.folder.path,
                "tasks": workspace.tasks,
                "debug": workspace.debug,
            });
            print(serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            println!("Workspace: {}", workspace.folder.path.display());
            println!("Tasks:");
            for line in describe_tasks(&workspace.tasks) {
                println!("  {}", line);
            }
            println!("Debug configurations:");
            for configuration in &workspace.debug {
                let is_default =
                    workspace.default_debug.as_deref() == Some(configuration.name.as_str());
                let marker = if is_default { " (default)" } else { "" };
                match &configuration.pre_launch_task {
                    Some(task) => println!("  {}{} -> {}", configuration.name, marker, task),
                    None => println!("  {}{}", configuration.name, marker),
                }
            }
        }
    }
    Ok(())
}

fn add_tasks(file: &Path, from: &Path, overwrite: bool) -> Result<()> {
    let source = config::read_workspace_file(from)?;
    if source.tasks().is_empty() {
        return Err(DocktaskError::Configuration(format!(
            "'{}' declares no tasks",
            from.display()
        )));
    }

    let mut target = if file.exists() {
        config::read_workspace_file(file)?
    } else {
        WorkspaceFile::empty(file)
    };

    let mut outcomes = Vec::new();
    for added in source.tasks() {
        let outcome = target.upsert_task(added.clone(), overwrite)?;
        let label = config::task_label(added).unwrap_or_default().to_string();
        outcomes.push((label, outcome));
    }

    config::save_workspace_file(file, &target)?;
    for (label, outcome) in outcomes {
        let verb = match outcome {
            UpsertOutcome::Inserted => "Added",
            UpsertOutcome::Replaced => "Replaced",
        };
        println!("{} task '{}'", verb, label);
    }
    Ok(())
}

fn print(rendered: String) {
    println!("{}", rendered);
}
