//! Work, bank, transfer, robbery and red packets against a real store.
mod common;

use common::{edit, game, game_with, join, player};
use oxmarket::config::{GameConfig, RobberyStrategy};
use oxmarket::market::errors::GameError;
use oxmarket::market::{economy, events, guard};

fn fixed_wages() -> GameConfig {
    GameConfig { work_reward_min: 300, work_reward_max: 300, ..GameConfig::default() }
}

#[tokio::test]
async fn work_pays_fixed_reward_and_starts_cooldown() {
    let g = game_with(fixed_wages()).await;
    let alice = join(&g.ctx, "alice").await;
    assert_eq!(player(&g.ctx, &alice).await.balance, 2000);

    economy::work(&g.ctx, &alice).await.unwrap();
    let p = player(&g.ctx, &alice).await;
    assert_eq!(p.balance, 2300);
    assert_eq!(p.last_work_time, Some(g.ctx.now()));

    let err = economy::work(&g.ctx, &alice).await.unwrap_err();
    assert!(matches!(err, GameError::Precondition(_)));
    assert_eq!(player(&g.ctx, &alice).await.balance, 2300);

    g.clock.advance_secs(300);
    economy::work(&g.ctx, &alice).await.unwrap();
    assert_eq!(player(&g.ctx, &alice).await.balance, 2600);
}

#[tokio::test]
async fn owned_worker_pays_tribute() {
    let g = game_with(fixed_wages()).await;
    let alice = join(&g.ctx, "alice").await;
    let bob = join(&g.ctx, "bob").await;
    oxmarket::market::trade::buy(&g.ctx, &alice, &bob).await.unwrap();
    let before = player(&g.ctx, &alice).await.balance;

    economy::work(&g.ctx, &bob).await.unwrap();
    assert_eq!(player(&g.ctx, &bob).await.balance, 2300);
    assert_eq!(player(&g.ctx, &alice).await.balance, before + 30);

    let history = g.ctx.ledger.history(&g.ctx.store, &alice, 5).await;
    assert_eq!(history[0].category, "tribute");
}

#[tokio::test]
async fn deposits_move_money_exactly_or_not_at_all() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    edit(&g.ctx, &alice, |p| {
        p.balance = 50_000;
        p.deposit_limit = 10_000;
    })
    .await;

    let mut expected_bank = 0;
    let mut expected_cash = 50_000;
    for amount in [1, 999, 4_000, 5_000, 1, 7_000, 2] {
        let result = economy::deposit(&g.ctx, &alice, amount).await;
        let p = player(&g.ctx, &alice).await;
        if expected_bank + amount > 10_000 {
            assert!(matches!(result, Err(GameError::Precondition(_))), "deposit {amount} should fail");
        } else {
            result.unwrap();
            expected_bank += amount;
            expected_cash -= amount;
        }
        assert_eq!(p.bank_balance, expected_bank);
        assert_eq!(p.balance, expected_cash);
    }

    assert!(matches!(economy::deposit(&g.ctx, &alice, -5).await, Err(GameError::Validation(_))));
    economy::withdraw(&g.ctx, &alice, 1_000).await.unwrap();
    assert!(economy::withdraw(&g.ctx, &alice, 1_000_000).await.is_err());
}

#[tokio::test]
async fn transfer_fee_goes_to_system_and_tax_pool() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let bob = join(&g.ctx, "bob").await;

    economy::transfer(&g.ctx, &alice, &bob, 1_000).await.unwrap();
    assert_eq!(player(&g.ctx, &alice).await.balance, 1_000);
    assert_eq!(player(&g.ctx, &bob).await.balance, 2_000 + 970);
    assert_eq!(g.ctx.store.system_balance().await, 30);
    assert_eq!(g.ctx.store.tax_pool().await.amount, 30);

    assert!(economy::transfer(&g.ctx, &alice, &alice, 10).await.is_err());
}

#[tokio::test]
async fn red_packet_split_never_exceeds_total() {
    let g = game().await;
    let sender = join(&g.ctx, "sender").await;
    let reply = economy::send_red_packet(&g.ctx, &sender, 100, 3).await.unwrap();
    assert_eq!(player(&g.ctx, &sender).await.balance, 2000 - 100 - 5);

    let packet_id = g.ctx.store.read(|doc| doc.red_packets.keys().next().cloned()).await.unwrap();
    assert!(reply.contains(&packet_id));

    let mut claimed = 0;
    for user in ["a", "b", "c"] {
        let id = join(&g.ctx, user).await;
        economy::grab_red_packet(&g.ctx, &id, &packet_id).await.unwrap();
        claimed += player(&g.ctx, &id).await.balance - 2000;
    }
    assert!(claimed >= 3 && claimed <= 100, "claimed {claimed}");
    assert!(g.ctx.store.read(|doc| doc.red_packets.is_empty()).await);

    let late = join(&g.ctx, "late").await;
    let err = economy::grab_red_packet(&g.ctx, &late, &packet_id).await.unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)));
}

#[tokio::test]
async fn red_packet_cannot_be_grabbed_twice_or_by_sender() {
    let g = game().await;
    let sender = join(&g.ctx, "sender").await;
    let bob = join(&g.ctx, "bob").await;
    economy::send_red_packet(&g.ctx, &sender, 100, 5).await.unwrap();
    let packet_id = g.ctx.store.read(|doc| doc.red_packets.keys().next().cloned()).await.unwrap();

    assert!(economy::grab_red_packet(&g.ctx, &sender, &packet_id).await.is_err());
    economy::grab_red_packet(&g.ctx, &bob, &packet_id).await.unwrap();
    let err = economy::grab_red_packet(&g.ctx, &bob, &packet_id).await.unwrap_err();
    assert_eq!(err.to_string(), "You already grabbed this red packet.");
}

#[tokio::test]
async fn concurrent_robberies_respect_one_cooldown() {
    let g = game().await;
    let robber = join(&g.ctx, "robber").await;
    let v1 = join(&g.ctx, "v1").await;
    let v2 = join(&g.ctx, "v2").await;

    let (first, second) = tokio::join!(
        economy::rob(&g.ctx, &robber, &v1, None),
        economy::rob(&g.ctx, &robber, &v2, None),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = if results[0].is_ok() { &v2 } else { &v1 };
    let err = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(err.to_string().contains("cooldown"));
    assert_eq!(player(&g.ctx, loser).await.balance, 2000);

    let total: i64 = g.ctx.store.list_players().await.iter().map(|p| p.balance).sum();
    assert!(total <= 6000);
}

#[tokio::test]
async fn robbery_rejects_self_and_unknown_strategy() {
    let g = game().await;
    let robber = join(&g.ctx, "robber").await;
    let victim = join(&g.ctx, "victim").await;
    assert!(matches!(
        economy::rob(&g.ctx, &robber, &robber, None).await,
        Err(GameError::Validation(_))
    ));
    let err = economy::rob(&g.ctx, &robber, &victim, Some("sneaky")).await.unwrap_err();
    assert!(err.to_string().starts_with("Unknown strategy"));
    assert_eq!(player(&g.ctx, &robber).await.last_rob_time, None);
}

#[tokio::test]
async fn loan_is_single_and_repayable() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    economy::request_loan(&g.ctx, &alice, 1_000).await.unwrap();
    assert_eq!(player(&g.ctx, &alice).await.balance, 3_000);
    assert!(economy::request_loan(&g.ctx, &alice, 1_000).await.is_err());

    economy::repay_loan(&g.ctx, &alice, None).await.unwrap();
    let p = player(&g.ctx, &alice).await;
    assert!(p.live_loan().is_none());
    assert!(p.balance < 2_000);
}

#[tokio::test]
async fn oversized_red_packet_is_rejected_without_minting() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let err = economy::send_red_packet(&g.ctx, &alice, i64::MAX, 1).await.unwrap_err();
    assert!(matches!(err, GameError::Validation(_)));
    assert_eq!(player(&g.ctx, &alice).await.balance, 2_000);
    assert!(g.ctx.store.read(|doc| doc.red_packets.is_empty()).await);
    assert_eq!(g.ctx.store.system_balance().await, 0);
}

#[tokio::test]
async fn broke_robber_is_never_fined_below_zero() {
    let g = game().await;
    let robber = join(&g.ctx, "robber").await;
    let victim = join(&g.ctx, "victim").await;
    edit(&g.ctx, &robber, |p| p.balance = 0).await;
    edit(&g.ctx, &victim, |p| p.balance = 0).await;

    let reply = economy::rob(&g.ctx, &robber, &victim, None).await.unwrap();
    assert!(reply.starts_with("Robbery failed"), "{reply}");
    assert_eq!(player(&g.ctx, &robber).await.balance, 0);
    assert_eq!(player(&g.ctx, &victim).await.balance, 0);
}

#[tokio::test]
async fn guard_collects_the_failed_robbers_fine() {
    let g = game().await;
    let robber = join(&g.ctx, "robber").await;
    let guarded = join(&g.ctx, "guarded").await;
    let exposed = join(&g.ctx, "exposed").await;
    guard::hire(&g.ctx, &guarded, "elite").await.unwrap();
    // An empty purse can't be robbed, so both attempts fail.
    edit(&g.ctx, &guarded, |p| p.balance = 0).await;
    edit(&g.ctx, &exposed, |p| p.balance = 0).await;

    economy::rob(&g.ctx, &robber, &guarded, Some("steady")).await.unwrap();
    let fined = 2_000 - player(&g.ctx, &robber).await.balance;
    assert!(fined > 0);
    assert_eq!(player(&g.ctx, &guarded).await.balance, fined);

    g.clock.advance_secs(600);
    economy::rob(&g.ctx, &robber, &exposed, Some("steady")).await.unwrap();
    assert!(player(&g.ctx, &robber).await.balance < 2_000 - fined);
    assert_eq!(player(&g.ctx, &exposed).await.balance, 0);
}

#[tokio::test]
async fn guard_lowers_the_success_rate() {
    let sure = RobberyStrategy {
        key: "sure".into(),
        label: "Sure thing".into(),
        success_rate: 1.0,
        reward_multiplier: 1.0,
        penalty_multiplier: 0.1,
    };
    let g = game_with(GameConfig { rob_strategies: vec![sure], ..GameConfig::default() }).await;
    let robber = join(&g.ctx, "robber").await;
    let victim = join(&g.ctx, "victim").await;

    async fn first_success(g: &common::TestGame, robber: &str, victim: &str) -> String {
        for _ in 0..200 {
            edit(&g.ctx, robber, |p| p.last_rob_time = None).await;
            edit(&g.ctx, victim, |p| p.balance = 2_000).await;
            let reply = economy::rob(&g.ctx, robber, victim, Some("sure")).await.unwrap();
            if reply.starts_with("Robbery succeeded") {
                return reply;
            }
        }
        panic!("no robbery succeeded");
    }

    let unguarded = first_success(&g, &robber, &victim).await;
    assert!(unguarded.contains("success rate 95%"), "{unguarded}");

    guard::hire(&g.ctx, &victim, "elite").await.unwrap();
    let guarded = first_success(&g, &robber, &victim).await;
    assert!(guarded.contains("success rate 75%"), "{guarded}");
}

#[tokio::test]
async fn interest_is_paid_by_the_system_on_a_cooldown() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    economy::deposit(&g.ctx, &alice, 1_000).await.unwrap();

    economy::collect_interest(&g.ctx, &alice).await.unwrap();
    assert_eq!(player(&g.ctx, &alice).await.bank_balance, 1_015);
    assert_eq!(g.ctx.store.system_balance().await, -15);

    let err = economy::collect_interest(&g.ctx, &alice).await.unwrap_err();
    assert!(err.to_string().contains("cooldown"), "{err}");
    assert_eq!(player(&g.ctx, &alice).await.bank_balance, 1_015);

    g.clock.advance_secs(1_800);
    economy::collect_interest(&g.ctx, &alice).await.unwrap();
    assert_eq!(player(&g.ctx, &alice).await.bank_balance, 1_030);
    assert_eq!(g.ctx.store.system_balance().await, -30);
}

#[tokio::test]
async fn credit_upgrades_go_one_level_at_a_time() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    assert!(matches!(economy::upgrade_credit(&g.ctx, &alice).await, Err(GameError::Precondition(_))));
    assert_eq!(player(&g.ctx, &alice).await.credit_level, 1);

    edit(&g.ctx, &alice, |p| p.balance = 30_000).await;
    let mut paid = 0;
    for (level, cost, limit) in [(2, 4_000, 20_000), (3, 9_000, 40_000), (4, 15_000, 80_000)] {
        economy::upgrade_credit(&g.ctx, &alice).await.unwrap();
        paid += cost;
        let p = player(&g.ctx, &alice).await;
        assert_eq!((p.credit_level, p.deposit_limit, p.balance), (level, limit, 30_000 - paid));
        assert_eq!(g.ctx.store.system_balance().await, paid);
    }
    let err = economy::upgrade_credit(&g.ctx, &alice).await.unwrap_err();
    assert_eq!(err.to_string(), "Already at the highest credit level.");
}

#[tokio::test]
async fn higher_bid_refunds_the_leader_and_next_day_pays_out() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let bob = join(&g.ctx, "bob").await;

    events::bid(&g.ctx, &alice, 500).await.unwrap();
    assert_eq!(player(&g.ctx, &alice).await.balance, 1_500);
    assert!(matches!(events::bid(&g.ctx, &bob, 500).await, Err(GameError::Precondition(_))));
    assert_eq!(player(&g.ctx, &bob).await.balance, 2_000);

    let reply = events::bid(&g.ctx, &bob, 600).await.unwrap();
    assert!(reply.contains("alice's bid was refunded"), "{reply}");
    assert_eq!(player(&g.ctx, &alice).await.balance, 2_000);
    assert_eq!(player(&g.ctx, &bob).await.balance, 1_400);

    g.clock.advance_secs(86_400);
    let today = events::describe(&g.ctx).await.unwrap();
    assert!(!today.contains("top bid"), "{today}");
    assert_eq!(player(&g.ctx, &bob).await.balance, 1_400 + 5_000);
    assert_eq!(player(&g.ctx, &alice).await.balance, 2_000);
}
