//! Readmark CLI - read your bookmarks offline from the terminal
//!
//! Mirrors a bookmark server into a local library, lists and reads
//! bookmarks from it, and sends favorite, archive and progress edits back.

mod cli;
mod commands;
mod config;
mod error;
#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use readmark_core::models::{FieldChange, ReadProgress};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::ListFlags;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::read::run_read;
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, run_watch};
use crate::config::{resolve_config_path, resolve_db_path};
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "readmark=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config_path = resolve_config_path(cli.config)?;

    match cli.command {
        Some(Commands::Sync { full }) => run_sync(full, &db_path, &config_path).await?,
        Some(Commands::Watch { interval_mins }) => {
            run_watch(interval_mins, &db_path, &config_path).await?;
        }
        Some(Commands::List {
            content_type,
            unread,
            read,
            archived,
            not_archived,
            favorite,
            limit,
            json,
        }) => {
            let flags = ListFlags {
                content_type,
                unread,
                read,
                archived,
                not_archived,
                favorite,
            };
            run_list(flags, limit, json, &db_path).await?;
        }
        Some(Commands::Read { id }) => run_read(&id, &db_path, &config_path).await?,
        Some(Commands::Favorite { id, off }) => {
            run_edit(&id, FieldChange::Favorite(!off), &db_path, &config_path).await?;
        }
        Some(Commands::Archive { id, off }) => {
            run_edit(&id, FieldChange::Archived(!off), &db_path, &config_path).await?;
        }
        Some(Commands::Progress { id, percent }) => {
            let progress = ReadProgress::new(i64::from(percent))?;
            run_edit(
                &id,
                FieldChange::ReadProgress(progress),
                &db_path,
                &config_path,
            )
            .await?;
        }
        Some(Commands::Status { json }) => run_status(json, &db_path).await?,
        Some(Commands::Config { command }) => run_config(command, &config_path)?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
