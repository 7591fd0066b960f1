//! Administrator login, ownership filtering, session re-hydration and
//! ticket operations against the mock remote.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use secrecy::SecretString;
use seatsync_client::{ActionError, AuthError, FetchMode, Navigation, RouteSignal, StoreKey};
use seatsync_integration_tests::{MockRemote, Sheet, field, fixtures, scratch_dir};

async fn mock_with_fixtures() -> MockRemote {
    let mock = MockRemote::start().await;
    mock.set_rows(Sheet::Users, fixtures::users());
    mock.set_rows(Sheet::Tickets, fixtures::tickets());
    mock.set_rows(Sheet::Admins, fixtures::admins());
    mock
}

fn secret(value: &str) -> SecretString {
    SecretString::from(value.to_owned())
}

#[tokio::test]
async fn test_login_scopes_views_to_owned_records_in_order() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.start(Navigation::new("/admin")).await.unwrap();
    ctx.refresh_all_users(FetchMode::Forced).await.unwrap();
    ctx.refresh_all_tickets(FetchMode::Forced).await.unwrap();

    assert!(ctx.owned_users(None).await.is_empty());

    let admin = ctx.identity().authenticate("alice", &secret("wonderland")).await.unwrap();
    assert_eq!(admin.sender_name, "Alice");

    let ids: Vec<_> = ctx
        .owned_users(None)
        .await
        .into_iter()
        .map(|u| u.user_id.into_inner())
        .collect();
    assert_eq!(ids, ["1001", "1003", "1004"]);

    let smiths: Vec<_> = ctx
        .owned_users(Some("smith"))
        .await
        .into_iter()
        .map(|u| u.user_id.into_inner())
        .collect();
    assert_eq!(smiths, ["1001", "1004"]);

    let tickets: Vec<_> = ctx
        .owned_tickets(Some("  "))
        .await
        .into_iter()
        .map(|t| t.ticket_id.into_inner())
        .collect();
    assert_eq!(tickets, ["501", "503"]);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_wrong_password_signals_and_clears_session() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.identity().authenticate("alice", &secret("wonderland")).await.unwrap();
    let mut signals = ctx.signals();

    let err = ctx.identity().authenticate("alice", &secret("rabbit")).await.unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(ctx.identity().current_admin().await.is_none());
    assert_eq!(signals.try_recv().unwrap(), RouteSignal::InvalidCredentials);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_blank_credentials_rejected_without_roster_lookup() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    let mut signals = ctx.signals();

    let err = ctx.identity().authenticate("", &secret("x")).await.unwrap_err();

    assert!(matches!(err, AuthError::MissingCredentials));
    assert_eq!(mock.hits(Sheet::Admins), 0);
    assert!(signals.try_recv().is_err());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_username_marker_rehydrates_from_roster() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.store().put_json(StoreKey::AdminUsername, "bob").await.unwrap();

    let admin = ctx.identity().rehydrate_admin().await.unwrap();

    assert_eq!(admin.username, "bob");
    assert_eq!(admin.sender_email, "bob@example.test");
    assert_eq!(mock.hits(Sheet::Admins), 1);

    // Restoring from a full stored record needs no lookup.
    ctx.identity().logout().await;
    ctx.store().put_json(StoreKey::AdminUsername, "bob").await.unwrap();
    ctx.store()
        .put_json(StoreKey::AdminRecord, &*admin)
        .await
        .unwrap();
    assert!(ctx.identity().rehydrate_admin().await.is_some());
    assert_eq!(mock.hits(Sheet::Admins), 1);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_unknown_marker_leaves_admin_absent() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.store().put_json(StoreKey::AdminUsername, "mallory").await.unwrap();

    assert!(ctx.identity().rehydrate_admin().await.is_none());
    assert!(ctx.identity().current_admin().await.is_none());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_transfer_ticket_checks_holder_then_posts() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.identity().authenticate("alice", &secret("wonderland")).await.unwrap();
    ctx.refresh_all_tickets(FetchMode::Forced).await.unwrap();

    let err = ctx
        .transfer_ticket(&"501".into(), &"1002".into(), "new@example.test")
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::Validation(_)));
    assert!(mock.actions().is_empty());

    ctx.transfer_ticket(&"501".into(), &"1001".into(), "new@example.test")
        .await
        .unwrap();

    let actions = mock.actions();
    assert_eq!(actions.len(), 1);
    assert_eq!(field(&actions[0], "action"), Some("transferTicket"));
    assert_eq!(field(&actions[0], "ticketId"), Some("501"));
    assert_eq!(field(&actions[0], "fromUserId"), Some("1001"));
    assert_eq!(field(&actions[0], "toEmail"), Some("new@example.test"));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_delete_ticket_reports_remote_rejection() {
    let mock = mock_with_fixtures().await;
    mock.set_action_reply(200, r#"{"error":"Ticket locked"}"#);
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.identity().authenticate("bob", &secret("builder")).await.unwrap();

    let err = ctx.delete_ticket(&"502".into()).await.unwrap_err();

    assert!(matches!(err, ActionError::Remote(ref m) if m == "Ticket locked"));
    let actions = mock.actions();
    assert_eq!(field(&actions[0], "action"), Some("deleteTicket"));
    assert!(field(&actions[0], "deletedSTAMP").is_some_and(|s| s.ends_with('Z')));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_logout_keeps_durable_snapshots() {
    let mock = mock_with_fixtures().await;
    let dir = scratch_dir();
    let ctx = mock.context(&dir).await;
    ctx.identity().authenticate("alice", &secret("wonderland")).await.unwrap();
    ctx.refresh_all_users(FetchMode::Forced).await.unwrap();

    ctx.logout(false).await.unwrap();

    assert!(ctx.identity().current_admin().await.is_none());
    assert!(ctx.owned_users(None).await.is_empty());
    assert_eq!(ctx.users().await.unwrap().len(), 4);
    assert!(ctx.store().get(StoreKey::AdminUsername).await.unwrap().is_none());

    let _ = std::fs::remove_dir_all(dir);
}
