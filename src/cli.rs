use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace file to use
    #[arg(short = 'f', long = "file", default_value = "docktask.toml", global = true)]
    pub file: PathBuf,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// How to print results
    #[arg(long = "output", value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    /// Workspace folder, overriding the one declared in the workspace file
    #[arg(long = "folder", global = true)]
    pub folder: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve a docker-build or docker-run task into its command line
    Resolve {
        /// Task label
        label: String,
    },
    /// Resolve a debug configuration, the default one if no name is given
    Debug {
        /// Debug configuration name
        name: Option<String>,
    },
    /// Show the run task backing a debug configuration
    RunTask {
        /// Debug configuration name
        name: String,
    },
    /// Show the build task a run task is bound to
    BuildTask {
        /// Run task label
        label: String,
    },
    /// List declared tasks and debug configurations
    List,
    /// Add tasks from another workspace file
    Add {
        /// File holding the tasks to add
        #[arg(long = "from")]
        from: PathBuf,

        /// Replace tasks whose label already exists
        #[arg(long = "overwrite")]
        overwrite: bool,
    },
    /// Start and immediately end a debug session, removing the container it
    /// created
    Cleanup {
        /// Debug configuration name
        name: Option<String>,
    },
}
