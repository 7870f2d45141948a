use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser};
use readmark_core::config::ClientConfig;
use readmark_core::models::{FieldChange, ReadState};
use readmark_core::remote::RemoteBookmark;
use readmark_core::services::LocalBookmarkStore;
use readmark_core::sync::{ReconciliationEngine, SyncOutcome};
use readmark_core::{Bookmark, ContentType};

use crate::cli::{Cli, Commands, CompletionShell, ContentTypeArg};
use crate::commands::common::{
    build_filter, connect_remote, format_relative_time, format_sync_timestamp, parse_bookmark_id,
    title_preview, ListFlags,
};
use crate::commands::completions::render_completions;
use crate::commands::config::run_config_init;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::read::run_read;
use crate::commands::status::collect_status;
use crate::commands::sync::{report_outcome, resolve_interval};
use crate::config::resolve_db_path;
use crate::error::CliError;

fn remote_record(id: &str, title: &str) -> RemoteBookmark {
    RemoteBookmark {
        id: Some(id.to_string()),
        url: Some(format!("https://example.com/{id}")),
        title: Some(title.to_string()),
        has_article: true,
        updated: Some("2024-05-01T12:00:00Z".to_string()),
        ..RemoteBookmark::default()
    }
}

fn bookmark(title: &str) -> Bookmark {
    Bookmark::try_from(remote_record("b1", title)).unwrap()
}

async fn seeded_store(db_path: &std::path::Path) -> LocalBookmarkStore {
    let store = LocalBookmarkStore::open_path(db_path).await.unwrap();
    ReconciliationEngine::new(store.clone())
        .reconcile(
            vec![
                remote_record("one", "First"),
                remote_record("two", "Second"),
            ],
            true,
        )
        .await
        .unwrap();
    store
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn list_read_filters_conflict() {
    assert!(Cli::try_parse_from(["readmark", "list", "--unread", "--read"]).is_err());
    assert!(Cli::try_parse_from(["readmark", "list", "--archived", "--not-archived"]).is_err());
}

#[test]
fn progress_is_limited_to_percentages() {
    assert!(Cli::try_parse_from(["readmark", "progress", "abc", "101"]).is_err());
    let cli = Cli::try_parse_from(["readmark", "progress", "abc", "40"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Progress { ref id, percent: 40 }) if id == "abc"
    ));
}

#[test]
fn list_type_flag_parses_content_types() {
    let cli = Cli::try_parse_from(["readmark", "list", "--type", "video", "--favorite"]).unwrap();
    let Some(Commands::List {
        content_type,
        favorite,
        ..
    }) = cli.command
    else {
        panic!("expected list command");
    };
    assert_eq!(content_type, Some(ContentTypeArg::Video));
    assert!(favorite);
}

#[test]
fn build_filter_combines_flags() {
    let filter = build_filter(
        ListFlags {
            content_type: Some(ContentTypeArg::Picture),
            unread: true,
            not_archived: true,
            favorite: true,
            ..ListFlags::default()
        },
        5,
    );
    assert_eq!(filter.content_type, Some(ContentType::Picture));
    assert_eq!(filter.read_state, Some(ReadState::Unread));
    assert_eq!(filter.archived, Some(false));
    assert_eq!(filter.favorite, Some(true));
    assert_eq!(filter.limit, Some(5));

    let empty = build_filter(ListFlags::default(), 20);
    assert_eq!(empty.read_state, None);
    assert_eq!(empty.archived, None);
    assert_eq!(empty.favorite, None);
}

#[test]
fn parse_bookmark_id_trims_and_rejects_empty() {
    assert_eq!(parse_bookmark_id("  abc ").unwrap().as_str(), "abc");
    assert!(matches!(
        parse_bookmark_id("   "),
        Err(CliError::EmptyBookmarkId)
    ));
}

#[test]
fn title_preview_truncates_and_falls_back_to_url() {
    let long = bookmark("A very   long title that keeps going and going");
    assert_eq!(title_preview(&long, 16), "A very long t...");

    let untitled = bookmark("  ");
    assert_eq!(title_preview(&untitled, 80), "https://example.com/b1");
}

#[test]
fn relative_time_buckets() {
    let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
    let ago = |secs: i64| now - chrono::Duration::seconds(secs);
    assert_eq!(format_relative_time(ago(10), now), "just now");
    assert_eq!(format_relative_time(ago(5 * 60), now), "5m ago");
    assert_eq!(format_relative_time(ago(3 * 3600), now), "3h ago");
    assert_eq!(format_relative_time(ago(2 * 86_400), now), "2d ago");
    assert_eq!(format_relative_time(ago(-60), now), "just now");
}

#[test]
fn sync_timestamp_formats_never() {
    assert_eq!(format_sync_timestamp(None), "never");
    let at = DateTime::<Utc>::from_timestamp(0, 0);
    assert_eq!(format_sync_timestamp(at), "1970-01-01 00:00:00 UTC");
}

#[test]
fn watch_interval_has_a_floor() {
    let configured = Duration::from_secs(3600);
    assert_eq!(resolve_interval(None, configured).unwrap(), configured);
    assert_eq!(
        resolve_interval(Some(30), configured).unwrap(),
        Duration::from_secs(1800)
    );
    assert!(matches!(
        resolve_interval(Some(1), configured),
        Err(CliError::Config(_))
    ));
}

#[test]
fn failed_outcomes_are_errors() {
    assert!(report_outcome(&SyncOutcome::Success {
        inserted: 1,
        updated: 0,
        deleted: 0
    })
    .is_ok());
    let error = report_outcome(&SyncOutcome::NetworkError("timed out".into())).unwrap_err();
    assert_eq!(error.to_string(), "network error: timed out");
}

#[test]
fn explicit_db_path_wins() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[test]
fn remote_requires_server_url() {
    assert!(matches!(
        connect_remote(&ClientConfig::default()),
        Err(CliError::SyncNotConfigured)
    ));
}

#[test]
fn config_init_writes_normalized_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    run_config_init(
        &path,
        " https://read.example.com/ ",
        Some("token-1".into()),
        Some(100),
        None,
    )
    .unwrap();
    run_config_init(&path, "https://read.example.com", None, None, Some(30)).unwrap();

    let config = ClientConfig::load_from_path(&path).unwrap();
    assert_eq!(config.server_url.as_deref(), Some("https://read.example.com"));
    assert_eq!(config.api_token.as_deref(), Some("token-1"));
    assert_eq!(config.page_size, 100);
    assert_eq!(config.sync_interval_mins, 30);
}

#[test]
fn config_init_rejects_invalid_url() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    assert!(run_config_init(&path, "read.example.com", None, None, None).is_err());
    assert!(!path.exists());
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("readmark"));
}

#[tokio::test(flavor = "multi_thread")]
async fn status_of_fresh_library() {
    let dir = tempfile::tempdir().unwrap();
    let report = collect_status(&dir.path().join("readmark.db")).await.unwrap();
    assert_eq!(report.bookmarks, 0);
    assert_eq!(report.pending_edits, 0);
    assert!(!report.initial_sync_done);
    assert_eq!(report.last_sync, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_reads_local_library() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("readmark.db");
    drop(seeded_store(&db_path).await);

    run_list(ListFlags::default(), 10, true, &db_path)
        .await
        .unwrap();
    let report = collect_status(&db_path).await.unwrap();
    assert_eq!(report.bookmarks, 2);
    assert_eq!(report.unread, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn cached_article_reads_offline() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("readmark.db");
    let missing_config = dir.path().join("missing.json");
    let store = seeded_store(&db_path).await;
    store
        .set_article_content(&"one".parse().unwrap(), "<p>cached</p>".into())
        .await
        .unwrap();
    drop(store);

    run_read("one", &db_path, &missing_config).await.unwrap();
    assert!(matches!(
        run_read("two", &db_path, &missing_config).await,
        Err(CliError::SyncNotConfigured)
    ));
    assert!(matches!(
        run_read("nope", &db_path, &missing_config).await,
        Err(CliError::BookmarkNotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn accepted_edit_pulls_server_changes() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("readmark.db");
    let config_path = dir.path().join("config.json");
    drop(seeded_store(&db_path).await);

    let mut server = mockito::Server::new_async().await;
    let patch = server
        .mock("PATCH", "/bookmarks/one")
        .with_status(200)
        .with_body(r#"{"id": "one", "is_marked": true, "updated": "2024-05-02T08:00:00Z"}"#)
        .create_async()
        .await;
    let listing = server
        .mock("GET", "/bookmarks")
        .match_query(mockito::Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[
                {"id": "one", "url": "https://example.com/one", "title": "First",
                 "has_article": true, "is_marked": true, "updated": "2024-05-02T08:00:00Z"},
                {"id": "two", "url": "https://example.com/two", "title": "Second, renamed",
                 "has_article": true, "updated": "2024-05-02T09:00:00Z"}
            ]"#,
        )
        .expect_at_least(1)
        .create_async()
        .await;
    run_config_init(&config_path, &server.url(), None, None, None).unwrap();

    run_edit("one", FieldChange::Favorite(true), &db_path, &config_path)
        .await
        .unwrap();

    patch.assert_async().await;
    listing.assert_async().await;
    let store = LocalBookmarkStore::open_path(&db_path).await.unwrap();
    let renamed = store.get(&"two".parse().unwrap()).await.unwrap().unwrap();
    assert_eq!(renamed.title, "Second, renamed");
    let edited = store.get(&"one".parse().unwrap()).await.unwrap().unwrap();
    assert!(edited.is_favorite);
    assert!(edited.pending.is_empty());
}
