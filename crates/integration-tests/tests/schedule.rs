//! Warm-up stages and poll ticks against the mock remote.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use seatsync_client::{Navigation, StoreKey, SyncContext};
use seatsync_integration_tests::{MockRemote, Reply, Sheet, fixtures, scratch_dir};

async fn mock_with_fixtures() -> MockRemote {
    let mock = MockRemote::start().await;
    mock.set_rows(Sheet::Users, fixtures::users());
    mock.set_rows(Sheet::Tickets, fixtures::tickets());
    mock.set_rows(Sheet::Admins, fixtures::admins());
    mock
}

#[tokio::test]
async fn test_failing_warmup_stages_do_not_stop_later_ones() {
    let mock = mock_with_fixtures().await;
    // Both user stages get an error object, which is not retried.
    mock.script(Sheet::Users, Reply::Body(r#"{"error":"quota"}"#.to_owned()));
    mock.script(Sheet::Users, Reply::Body(r#"{"error":"quota"}"#.to_owned()));
    let dir = scratch_dir();
    let mut config = mock.config(&dir);
    config.schedule.warmup_stage_delay = Duration::from_millis(10);
    let ctx = SyncContext::connect(&config).await.unwrap();
    ctx.store().put_json(StoreKey::RememberedUserId, "1001").await.unwrap();
    ctx.store().put_json(StoreKey::AdminUsername, "bob").await.unwrap();

    ctx.run_warmup().await;

    assert_eq!(mock.hits(Sheet::Users), 2);
    assert!(ctx.current_user().await.is_none());
    assert!(ctx.users().await.is_none());
    assert_eq!(mock.hits(Sheet::Tickets), 1);
    assert_eq!(ctx.tickets().await.unwrap().len(), 3);
    assert_eq!(mock.hits(Sheet::Admins), 1);
    assert_eq!(ctx.identity().current_admin().await.unwrap().username, "bob");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_poll_tick_rederives_identity_each_time() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.store().put_json(StoreKey::RememberedUserId, "1001").await.unwrap();
    ctx.start(Navigation::new("/ticket")).await.unwrap();
    assert_eq!(ctx.current_user().await.unwrap().full_name, "Ada Smith");

    ctx.poll_tick().await;
    let after_first = mock.hits(Sheet::Users);

    // Another session on the same storage switched the remembered user.
    ctx.store().put_json(StoreKey::RememberedUserId, "1002").await.unwrap();
    ctx.poll_tick().await;

    assert!(mock.hits(Sheet::Users) > after_first);
    assert_eq!(ctx.current_user().await.unwrap().full_name, "Ben Smith");
    assert_eq!(ctx.users().await.unwrap().len(), 4);
    assert_eq!(ctx.tickets().await.unwrap().len(), 3);

    let _ = std::fs::remove_dir_all(dir);
}
