//! CLI argument parsing with clap derive

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::infra::fetcher::DEFAULT_ARTIFACT_BASE;

/// Release manager for single-host applications
#[derive(Parser)]
#[command(
    name = "keel",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Directory holding one directory per application [default: ~/apps]
    #[arg(long, global = true, env = "KEEL_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Base URL release artifacts are downloaded from
    #[arg(
        long,
        global = true,
        env = "KEEL_ARTIFACT_BASE",
        default_value = DEFAULT_ARTIFACT_BASE,
        value_name = "URL"
    )]
    pub artifact_base: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Prepare an application: directories, config and process manifest
    Setup(commands::setup::SetupArgs),

    /// Fetch, install and activate a release
    Deploy(commands::deploy::DeployArgs),

    /// Re-activate the previous (or a given) installed release
    Rollback(commands::rollback::RollbackArgs),

    /// Show releases, process state and recent deployments
    Status(commands::status::StatusArgs),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            root,
            artifact_base,
            command,
        } = self;
        let ctx = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags {
                yes,
                root,
                artifact_base,
            },
        })?;

        match command {
            Command::Setup(args) => commands::setup::run(&ctx, args).await,
            Command::Deploy(args) => commands::deploy::run(&ctx, args).await,
            Command::Rollback(args) => commands::rollback::run(&ctx, args).await,
            Command::Status(args) => commands::status::run(&ctx, &args).await,
        }
    }
}
