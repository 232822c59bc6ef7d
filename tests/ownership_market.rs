//! Buy, snatch, release and redeem keep both sides of the ownership relation in step.
mod common;

use common::{assert_ownership_consistent, edit, game, join, player};
use oxmarket::market::errors::GameError;
use oxmarket::market::trade;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn snatch_refunds_the_original_price() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let bob = join(&g.ctx, "bob").await;
    let carol = join(&g.ctx, "carol").await;
    edit(&g.ctx, &carol, |p| p.balance = 20_000).await;

    trade::buy(&g.ctx, &alice, &bob).await.unwrap();
    assert_eq!(player(&g.ctx, &alice).await.balance, 200);
    assert_eq!(player(&g.ctx, &alice).await.owned_slaves[&bob].price, 1_800);
    assert_ownership_consistent(&g.ctx).await;

    // Bob got richer in between; alice still gets back what she paid.
    edit(&g.ctx, &bob, |p| p.balance = 4_000).await;
    trade::snatch(&g.ctx, &carol, &bob).await.unwrap();
    let (a, b, c) = (
        player(&g.ctx, &alice).await,
        player(&g.ctx, &bob).await,
        player(&g.ctx, &carol).await,
    );
    assert_eq!(a.balance, 2_000);
    assert!(a.owned_slaves.is_empty());
    assert_eq!(b.owner_id.as_deref(), Some(carol.as_str()));
    assert_eq!(c.balance, 20_000 - 2 * 2_800);
    assert_ownership_consistent(&g.ctx).await;
}

#[tokio::test]
async fn invalid_purchases_are_rejected() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let bob = join(&g.ctx, "bob").await;

    assert!(matches!(trade::buy(&g.ctx, &alice, &alice).await, Err(GameError::Validation(_))));
    trade::buy(&g.ctx, &alice, &bob).await.unwrap();
    let err = trade::buy(&g.ctx, &alice, &bob).await.unwrap_err();
    assert_eq!(err.to_string(), "They already belong to you.");

    let poor = join(&g.ctx, "poor").await;
    edit(&g.ctx, &poor, |p| p.balance = 10).await;
    assert!(matches!(trade::snatch(&g.ctx, &poor, &bob).await, Err(GameError::Precondition(_))));
    assert_eq!(player(&g.ctx, &bob).await.owner_id.as_deref(), Some(alice.as_str()));
}

#[tokio::test]
async fn release_and_redeem_free_the_player() {
    let g = game().await;
    let alice = join(&g.ctx, "alice").await;
    let bob = join(&g.ctx, "bob").await;

    trade::buy(&g.ctx, &alice, &bob).await.unwrap();
    assert_ok!(trade::release(&g.ctx, &alice, &bob).await);
    assert_eq!(player(&g.ctx, &bob).await.owner_id, None);
    assert_err!(trade::release(&g.ctx, &alice, &bob).await);
    assert_ownership_consistent(&g.ctx).await;

    edit(&g.ctx, &alice, |p| p.balance = 5_000).await;
    trade::buy(&g.ctx, &alice, &bob).await.unwrap();
    let alice_before = player(&g.ctx, &alice).await.balance;
    trade::redeem(&g.ctx, &bob).await.unwrap();
    // valuation 800 + 2000/2 = 1800, redeem at 60%
    assert_eq!(player(&g.ctx, &bob).await.balance, 2_000 - 1_080);
    assert_eq!(player(&g.ctx, &alice).await.balance, alice_before + 1_080);
    assert_ownership_consistent(&g.ctx).await;

    let err = trade::redeem(&g.ctx, &bob).await.unwrap_err();
    assert_eq!(err.to_string(), "You are already free.");
}

#[tokio::test]
async fn admins_buy_for_free_and_are_refunded_nothing() {
    let g = game().await;
    let admin = join(&g.ctx, "admin").await;
    let bob = join(&g.ctx, "bob").await;
    let carol = join(&g.ctx, "carol").await;
    edit(&g.ctx, &carol, |p| p.balance = 20_000).await;
    g.ctx.store.add_admin(&admin).await.unwrap();

    trade::buy(&g.ctx, &admin, &bob).await.unwrap();
    assert_eq!(player(&g.ctx, &admin).await.balance, 2_000);
    assert_eq!(player(&g.ctx, &admin).await.owned_slaves[&bob].price, 0);

    trade::snatch(&g.ctx, &carol, &bob).await.unwrap();
    assert_eq!(player(&g.ctx, &admin).await.balance, 2_000);
    assert_ownership_consistent(&g.ctx).await;
}
