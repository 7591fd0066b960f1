//! Synchronization engine against the mock remote: snapshots, ordering,
//! identity fallback and cache recovery.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use seatsync_client::{
    FetchMode, Navigation, RedirectReason, Refresh, RouteSignal, SnapshotStore, StoreKey, SyncContext,
    UserResolution,
};
use seatsync_core::{UserId, UserRecord};
use seatsync_integration_tests::{MockRemote, Reply, Sheet, fixtures, scratch_dir};
use serde_json::json;

async fn mock_with_fixtures() -> MockRemote {
    let mock = MockRemote::start().await;
    mock.set_rows(Sheet::Users, fixtures::users());
    mock.set_rows(Sheet::Tickets, fixtures::tickets());
    mock.set_rows(Sheet::Admins, fixtures::admins());
    mock
}

#[tokio::test]
async fn test_start_remembers_user_and_loads_linked_ticket() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;

    let resolution = ctx.start(Navigation::new("/ticket").with_user("1001")).await.unwrap();

    assert_eq!(resolution, UserResolution::Incoming(UserId::from("1001")));
    assert!(!ctx.is_loading());
    assert_eq!(ctx.current_user().await.unwrap().full_name, "Ada Smith");
    assert_eq!(ctx.current_ticket().await.unwrap().ticket_id.as_str(), "501");
    assert_eq!(
        ctx.identity().remembered_user_id().await.unwrap(),
        Some(UserId::from("1001"))
    );

    // A later session on the same storage sees the snapshots before fetching.
    let hits = mock.hits(Sheet::Users);
    let next = mock.context(&dir).await;
    next.bootstrap().await.unwrap();
    assert_eq!(next.current_user().await.unwrap().full_name, "Ada Smith");
    assert_eq!(mock.hits(Sheet::Users), hits);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_remembered_user_used_without_incoming_id() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    mock.context(&dir)
        .await
        .start(Navigation::new("/ticket").with_user("1002"))
        .await
        .unwrap();

    let ctx = mock.context(&dir).await;
    let resolution = ctx.start(Navigation::new("/ticket")).await.unwrap();

    assert_eq!(resolution, UserResolution::Remembered(UserId::from("1002")));
    assert_eq!(ctx.current_user().await.unwrap().full_name, "Ben Smith");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_older_response_never_overwrites_newer() {
    let mock = mock_with_fixtures().await;
    mock.script(
        Sheet::Users,
        Reply::Delayed(Duration::from_millis(300), json!([{ "userId": 1, "fullName": "Old" }])),
    );
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;

    let (slow, fast) = tokio::join!(ctx.refresh_all_users(FetchMode::Forced), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.refresh_all_users(FetchMode::Forced).await
    });

    assert_eq!(slow.unwrap(), Refresh::Stale);
    assert_eq!(fast.unwrap(), Refresh::Applied);
    assert_eq!(ctx.users().await.unwrap().len(), 4);

    // Storage agrees with memory.
    let store = SnapshotStore::open(&dir, None).await.unwrap();
    let stored: Vec<UserRecord> = store.get_json(StoreKey::AllUsers).await.unwrap().unwrap();
    assert_eq!(stored.len(), 4);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_guarded_refresh_skips_while_in_flight() {
    let mock = mock_with_fixtures().await;
    mock.script(Sheet::Tickets, Reply::Delayed(Duration::from_millis(200), fixtures::tickets()));
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;

    let (first, second) = tokio::join!(ctx.refresh_all_tickets(FetchMode::Guarded), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        ctx.refresh_all_tickets(FetchMode::Guarded).await
    });

    assert_eq!(first.unwrap(), Refresh::Applied);
    assert_eq!(second.unwrap(), Refresh::Skipped);
    assert_eq!(mock.hits(Sheet::Tickets), 1);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_missing_identity_signals_once_and_never_fetches() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    let mut signals = ctx.signals();

    let resolution = ctx.start(Navigation::new("/ticket")).await.unwrap();
    let refresh = ctx.refresh_current_user(FetchMode::Forced).await.unwrap();

    assert_eq!(resolution, UserResolution::Unresolved);
    assert_eq!(refresh, Refresh::NoIdentity);
    assert_eq!(
        signals.try_recv().unwrap(),
        RouteSignal::RedirectInvalid(RedirectReason::NoIdentity)
    );
    assert!(signals.try_recv().is_err());
    assert_eq!(mock.hits(Sheet::Users), 0);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_admin_pages_need_no_user_identity() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    let mut signals = ctx.signals();

    let resolution = ctx.start(Navigation::new("/admin/users")).await.unwrap();

    assert_eq!(resolution, UserResolution::AdminExempt);
    assert!(signals.try_recv().is_err());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_corrupt_cache_is_discarded_and_rebuilt() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let users_file = dir.join("all_users_data.json");
    std::fs::write(&users_file, b"{\"truncated\": [").unwrap();
    std::fs::write(dir.join("user_data.json"), b"not json").unwrap();

    let ctx = mock.context(&dir).await;
    ctx.bootstrap().await.unwrap();

    assert!(ctx.users().await.is_none());
    assert!(ctx.current_user().await.is_none());
    assert!(!users_file.exists());

    assert_eq!(ctx.refresh_all_users(FetchMode::Forced).await.unwrap(), Refresh::Applied);
    let rebuilt: Vec<UserRecord> = serde_json::from_slice(&std::fs::read(&users_file).unwrap()).unwrap();
    assert_eq!(rebuilt.len(), 4);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_identity_change_replaces_current_snapshots() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.start(Navigation::new("/ticket").with_user("1001")).await.unwrap();
    assert!(ctx.current_ticket().await.is_some());

    let resolution = ctx
        .set_navigation(Navigation::new("/ticket").with_user("1002"))
        .await
        .unwrap();

    assert_eq!(resolution, UserResolution::Incoming(UserId::from("1002")));
    assert_eq!(ctx.current_user().await.unwrap().full_name, "Ben Smith");
    // 1002 links no ticket, so the previous user's ticket must be gone.
    assert!(ctx.current_ticket().await.is_none());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_user_missing_from_collection_keeps_snapshot() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.start(Navigation::new("/ticket").with_user("1001")).await.unwrap();

    mock.set_rows(Sheet::Users, json!([{ "userId": 1002, "admin": "bob" }]));
    let refresh = ctx.refresh_current_user(FetchMode::Forced).await.unwrap();

    assert_eq!(refresh, Refresh::NotFound);
    assert_eq!(ctx.current_user().await.unwrap().full_name, "Ada Smith");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_ticket_snapshot_follows_link_changes() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.start(Navigation::new("/ticket").with_user("1001")).await.unwrap();
    assert_eq!(ctx.current_ticket().await.unwrap().ticket_id.as_str(), "501");

    // Relinked to a ticket the collection does not have yet.
    mock.set_rows(Sheet::Users, json!([{ "userId": 1001, "admin": "alice", "ticketId": 999 }]));
    assert_eq!(ctx.refresh_current_user(FetchMode::Forced).await.unwrap(), Refresh::Applied);
    assert!(ctx.current_ticket().await.is_none());

    // Relinked to a known ticket, then unlinked.
    mock.set_rows(Sheet::Users, json!([{ "userId": 1001, "admin": "alice", "ticketId": 503 }]));
    ctx.refresh_current_user(FetchMode::Forced).await.unwrap();
    assert_eq!(ctx.current_ticket().await.unwrap().ticket_id.as_str(), "503");

    mock.set_rows(Sheet::Users, json!([{ "userId": 1001, "admin": "alice" }]));
    ctx.refresh_current_user(FetchMode::Forced).await.unwrap();
    assert!(ctx.current_ticket().await.is_none());
    assert!(!dir.join("ticket_data.json").exists());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_failed_fetch_keeps_cached_snapshot() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.refresh_all_tickets(FetchMode::Forced).await.unwrap();

    mock.script(Sheet::Tickets, Reply::Body(r#"{"error":"quota"}"#.to_owned()));
    assert!(ctx.refresh_all_tickets(FetchMode::Forced).await.is_err());

    assert_eq!(ctx.tickets().await.unwrap().len(), 3);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_full_logout_forgets_everything() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.start(Navigation::new("/ticket").with_user("1001")).await.unwrap();
    ctx.refresh_all_users(FetchMode::Forced).await.unwrap();

    ctx.logout(true).await.unwrap();

    assert!(ctx.current_user().await.is_none());
    assert!(ctx.users().await.is_none());
    assert!(ctx.identity().remembered_user_id().await.unwrap().is_none());
    assert!(!dir.join("all_users_data.json").exists());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_shutdown_stops_polling() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let mut config = mock.config(&dir);
    config.schedule.poll_interval = Duration::from_millis(100);
    let ctx = SyncContext::connect(&config).await.unwrap();

    let handle = ctx.spawn();
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(mock.hits(Sheet::Tickets) >= 2);
    assert!(ctx.tickets().await.is_some());

    handle.shutdown().await;
    let after = mock.hits(Sheet::Tickets);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mock.hits(Sheet::Tickets), after);

    let _ = std::fs::remove_dir_all(dir);
}
