//! Where the CLI keeps its config file and local library.

use std::env;
use std::path::{Path, PathBuf};

use readmark_core::config::ClientConfig;
use readmark_core::util::normalize_text_option;

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "readmark.db";
const APP_DIR: &str = "readmark";

pub const TOKEN_ENV: &str = "READMARK_TOKEN";
pub const DB_PATH_ENV: &str = "READMARK_DB_PATH";

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".into()))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    cli_config_path.map_or_else(default_config_path, Ok)
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(DB_FILE_NAME)
}

pub fn load_config(path: &Path) -> Result<ClientConfig, CliError> {
    Ok(ClientConfig::load_from_path(path)?)
}

pub fn token_from_env() -> Option<String> {
    normalize_text_option(env::var(TOKEN_ENV).ok())
}
