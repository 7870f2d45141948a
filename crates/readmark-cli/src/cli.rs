use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use readmark_core::ContentType;

#[derive(Parser)]
#[command(name = "readmark")]
#[command(about = "Read your bookmarks offline from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync the local library with the bookmark server
    Sync {
        /// Fetch every bookmark and drop local rows deleted remotely
        #[arg(long)]
        full: bool,
    },
    /// Keep syncing in the foreground at a fixed interval
    Watch {
        /// Minutes between syncs (config value when omitted)
        #[arg(long, value_name = "MINUTES")]
        interval_mins: Option<u64>,
    },
    /// List bookmarks from the local library
    List {
        /// Only bookmarks of this type
        #[arg(long = "type", value_enum, value_name = "TYPE")]
        content_type: Option<ContentTypeArg>,
        /// Only unread bookmarks
        #[arg(long, conflicts_with = "read")]
        unread: bool,
        /// Only fully read bookmarks
        #[arg(long)]
        read: bool,
        /// Only archived bookmarks
        #[arg(long, conflicts_with = "not_archived")]
        archived: bool,
        /// Only bookmarks that are not archived
        #[arg(long)]
        not_archived: bool,
        /// Only favorite bookmarks
        #[arg(long)]
        favorite: bool,
        /// Number of bookmarks to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the article of a bookmark
    Read {
        /// Bookmark ID
        id: String,
    },
    /// Mark a bookmark as favorite
    Favorite {
        /// Bookmark ID
        id: String,
        /// Remove the favorite mark instead
        #[arg(long)]
        off: bool,
    },
    /// Archive a bookmark
    Archive {
        /// Bookmark ID
        id: String,
        /// Move the bookmark back out of the archive
        #[arg(long)]
        off: bool,
    },
    /// Set reading progress of a bookmark
    Progress {
        /// Bookmark ID
        id: String,
        /// Percentage read
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Show local library and sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure the bookmark server connection
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Bookmark server base URL
        #[arg(long, value_name = "URL")]
        server_url: String,
        /// API token (READMARK_TOKEN overrides it at runtime)
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
        /// Bookmarks requested per page
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
        /// Minutes between periodic syncs
        #[arg(long, value_name = "MINUTES")]
        interval_mins: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ContentTypeArg {
    Article,
    Picture,
    Video,
}

impl From<ContentTypeArg> for ContentType {
    fn from(value: ContentTypeArg) -> Self {
        match value {
            ContentTypeArg::Article => Self::Article,
            ContentTypeArg::Picture => Self::Picture,
            ContentTypeArg::Video => Self::Video,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
