use std::path::Path;

use readmark_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::config::load_config;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            server_url,
            token,
            page_size,
            interval_mins,
        } => run_config_init(config_path, &server_url, token, page_size, interval_mins),
    }
}

/// Merge the given values into the config file, keeping unspecified ones.
pub fn run_config_init(
    config_path: &Path,
    server_url: &str,
    token: Option<String>,
    page_size: Option<usize>,
    interval_mins: Option<u64>,
) -> Result<(), CliError> {
    let mut config = load_config(config_path)?;

    config.server_url = normalize_text_option(Some(server_url.to_string()));
    if config.server_url.is_none() {
        return Err(CliError::Config("--server-url cannot be empty".into()));
    }
    if let Some(token) = normalize_text_option(token) {
        config.api_token = Some(token);
    }
    if let Some(page_size) = page_size {
        config.page_size = page_size;
    }
    if let Some(interval_mins) = interval_mins {
        config.sync_interval_mins = interval_mins;
    }

    config.save_to_path(config_path)?;
    println!("{}", config_path.display());
    Ok(())
}
