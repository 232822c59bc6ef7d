//! Test utilities & fixtures.
//! Every game lives in its own temp dir and runs on a manual clock.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use oxmarket::config::GameConfig;
use oxmarket::market::clock::ManualClock;
use oxmarket::market::ledger::Ledger;
use oxmarket::market::players::{ensure_player, Sender};
use oxmarket::market::types::Player;
use oxmarket::market::GameContext;
use oxmarket::storage::StateStore;

pub const PLATFORM: &str = "qq";

#[allow(dead_code)]
pub struct TestGame {
    pub dir: TempDir,
    pub ctx: GameContext,
    pub clock: Arc<ManualClock>,
}

#[allow(dead_code)]
pub async fn game() -> TestGame {
    game_with(GameConfig::default()).await
}

pub async fn game_with(config: GameConfig) -> TestGame {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::open(dir.path(), 3).await.expect("open store");
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()));
    let ctx = GameContext::new(Arc::new(store), config, Ledger::new(50)).with_clock(clock.clone());
    TestGame { dir, ctx, clock }
}

/// Register `user` the way the dispatcher would and return their id.
#[allow(dead_code)]
pub async fn join(ctx: &GameContext, user: &str) -> String {
    let sender = Sender {
        platform: PLATFORM.to_string(),
        user_id: user.to_string(),
        nickname: Some(user.to_string()),
        group_id: None,
    };
    ensure_player(ctx, &sender).await.expect("register").player_id
}

#[allow(dead_code)]
pub async fn player(ctx: &GameContext, id: &str) -> Player {
    ctx.store.get_player(id).await.expect("player exists")
}

/// Apply a direct edit to a player, bypassing game rules.
#[allow(dead_code)]
pub async fn edit(ctx: &GameContext, id: &str, f: impl FnOnce(&mut Player)) {
    let id = id.to_string();
    ctx.store
        .transact(move |doc| {
            f(doc.player_mut(&id)?);
            Ok(())
        })
        .await
        .expect("edit player");
}

/// Ownership links agree in both directions and nobody owns themselves.
#[allow(dead_code)]
pub async fn assert_ownership_consistent(ctx: &GameContext) {
    let players = ctx.store.list_players().await;
    for p in &players {
        if let Some(owner) = &p.owner_id {
            assert_ne!(owner, &p.player_id, "{} owns themselves", p.player_id);
            let owner = players.iter().find(|o| &o.player_id == owner).expect("owner exists");
            assert!(owner.owned_slaves.contains_key(&p.player_id), "{} missing from owner's set", p.player_id);
        }
        for slave in p.owned_slaves.keys() {
            let s = players.iter().find(|o| &o.player_id == slave).expect("slave exists");
            assert_eq!(s.owner_id.as_deref(), Some(p.player_id.as_str()));
        }
    }
}
