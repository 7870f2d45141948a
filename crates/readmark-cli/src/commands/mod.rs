pub mod common;
pub mod completions;
pub mod config;
pub mod edit;
pub mod list;
pub mod read;
pub mod status;
pub mod sync;
