//! Loading, reloading and backing up the state document.
mod common;

use common::{edit, game, join, player};
use oxmarket::market::errors::GameError;
use oxmarket::market::{economy, trade};
use oxmarket::storage::StateStore;

#[tokio::test]
async fn document_survives_a_reopen() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let bob = join(&g.ctx, "bob").await;
    trade::buy(&g.ctx, &alice, &bob).await.unwrap();
    economy::send_red_packet(&g.ctx, &alice, 100, 2).await.unwrap();
    g.ctx.store.set_disabled(true).await.unwrap();
    let before = g.ctx.store.to_json().await.unwrap();

    let reopened = StateStore::open(g.dir.path(), 3).await.unwrap();
    assert_eq!(reopened.to_json().await.unwrap(), before);
    assert!(reopened.is_disabled().await);
    let bob_again = reopened.get_player(&bob).await.unwrap();
    assert_eq!(bob_again.owner_id.as_deref(), Some(alice.as_str()));
}

#[tokio::test]
async fn empty_file_loads_as_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("state.json"), "  \n").unwrap();
    let store = StateStore::open(dir.path(), 3).await.unwrap();
    assert!(store.list_players().await.is_empty());
    assert_eq!(store.system_balance().await, 0);
}

#[tokio::test]
async fn malformed_file_is_an_error_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{\"players\": [oops").unwrap();
    let err = StateStore::open(dir.path(), 3).await.err().expect("load must fail");
    assert!(!err.is_user_facing());
    assert!(err.to_string().contains("malformed"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"players\": [oops");
}

#[tokio::test]
async fn backups_are_pruned_to_the_newest() {
    let g = game().await;
    join(&g.ctx, "alice").await;
    let mut ids = Vec::new();
    for _ in 0..5 {
        g.clock.advance_secs(60);
        ids.push(g.ctx.store.snapshot_backup(g.ctx.now()).await.unwrap().id);
    }
    let listed: Vec<String> = g.ctx.store.list_backups().await.unwrap().into_iter().map(|b| b.id).collect();
    let newest: Vec<String> = ids.iter().rev().take(3).cloned().collect();
    assert_eq!(listed, newest);
}

#[tokio::test]
async fn restore_brings_back_a_snapshot() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let meta = g.ctx.store.snapshot_backup(g.ctx.now()).await.unwrap();

    edit(&g.ctx, &alice, |p| p.balance = 99_999).await;
    join(&g.ctx, "bob").await;
    g.ctx.store.restore_backup(&meta.id).await.unwrap();

    assert_eq!(player(&g.ctx, &alice).await.balance, 2_000);
    assert_eq!(g.ctx.store.list_players().await.len(), 1);
}

#[tokio::test]
async fn restoring_unknown_backup_is_not_found() {
    let g = game().await;
    let err = g.ctx.store.restore_backup("backup_19990101_000000_000.json").await.unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)));
    let err = g.ctx.store.restore_backup("../state.json").await.unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)));
}

#[tokio::test]
async fn reset_clears_everything() {
    let g = game().await;
    join(&g.ctx, "alice").await;
    g.ctx.store.add_admin("qq:alice").await.unwrap();
    g.ctx.store.reset().await.unwrap();
    assert!(g.ctx.store.list_players().await.is_empty());
    assert!(g.ctx.store.list_admins().await.is_empty());
}

#[tokio::test]
async fn failed_write_leaves_memory_on_the_saved_state() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let path = g.ctx.store.state_path().to_path_buf();
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();

    let err = economy::deposit(&g.ctx, &alice, 100).await.unwrap_err();
    assert!(!err.is_user_facing());
    let p = player(&g.ctx, &alice).await;
    assert_eq!((p.balance, p.bank_balance), (2_000, 0));

    std::fs::remove_dir(&path).unwrap();
    economy::deposit(&g.ctx, &alice, 50).await.unwrap();
    let reopened = StateStore::open(g.dir.path(), 3).await.unwrap();
    let saved = reopened.get_player(&alice).await.unwrap();
    assert_eq!((saved.balance, saved.bank_balance), (1_950, 50));
}
