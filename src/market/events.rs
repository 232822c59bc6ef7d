//! The daily black market auction.
//!
//! One auction runs per UTC day. The first touch on a new day settles the
//! previous day's leader, who keeps their bid and receives the reward, and
//! opens a fresh auction.

use chrono::{DateTime, Utc};
use log::info;

use super::currency::{format_coins, require_positive};
use super::errors::{GameError, GameResult};
use super::ledger::Ledger;
use super::types::{Direction, EventState, GameState};
use super::GameContext;

pub const AUCTION_NAME: &str = "black_market";

fn open_auction(reward: i64, now: DateTime<Utc>) -> EventState {
    EventState {
        day: now.date_naive(),
        name: AUCTION_NAME.to_string(),
        title: "Black Market Auction".to_string(),
        description: format!(
            "Today's limited lot goes to the highest bidder, who also wins {}.",
            format_coins(reward)
        ),
        reward,
        top_bid: 0,
        top_player: None,
    }
}

/// Bring the event state to today, settling yesterday's winner first.
pub(crate) fn refresh_in<'a>(
    doc: &'a mut GameState,
    ledger: &Ledger,
    reward: i64,
    now: DateTime<Utc>,
) -> &'a EventState {
    let stale = doc.event_state.as_ref().map_or(true, |state| state.day != now.date_naive());
    if stale {
        if let Some(previous) = doc.event_state.take() {
            settle(doc, ledger, &previous, now);
        }
        doc.event_state = Some(open_auction(reward, now));
    }
    doc.event_state.get_or_insert_with(|| open_auction(reward, now))
}

fn settle(doc: &mut GameState, ledger: &Ledger, state: &EventState, now: DateTime<Utc>) {
    let Some(winner) = state.top_player.as_deref() else {
        return;
    };
    if state.reward <= 0 {
        return;
    }
    if let Some(player) = doc.players.get_mut(winner) {
        player.balance += state.reward;
        player.touch(now);
        info!("auction for {} settled: {} wins {}", state.day, winner, state.reward);
        ledger.record(doc, winner, "auction", state.reward, Direction::Income, "auction winnings", now);
    }
}

pub async fn describe(ctx: &GameContext) -> GameResult<String> {
    let now = ctx.now();
    let reward = ctx.config.auction_reward;
    let ledger = ctx.ledger;
    ctx.store
        .transact(move |doc| {
            let state = refresh_in(doc, &ledger, reward, now);
            let mut text = format!("=== {} ===\n{}", state.title, state.description);
            if state.top_bid > 0 {
                text.push_str(&format!("\nCurrent top bid: {}", format_coins(state.top_bid)));
            }
            Ok(text)
        })
        .await
}

pub async fn bid(ctx: &GameContext, actor: &str, amount: i64) -> GameResult<String> {
    let amount = require_positive(amount)?;
    let now = ctx.now();
    let reward = ctx.config.auction_reward;
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let state = refresh_in(doc, &ledger, reward, now).clone();
            if amount <= state.top_bid {
                return Err(GameError::precondition("Your bid must beat the current top bid."));
            }
            let player = doc.player_mut(&actor)?;
            if amount > player.balance {
                return Err(GameError::precondition("Insufficient balance."));
            }
            player.balance -= amount;
            player.touch(now);

            let mut notice = String::new();
            if let Some(prev_id) = state.top_player.as_deref().filter(|_| state.top_bid > 0) {
                if let Some(prev) = doc.players.get_mut(prev_id) {
                    prev.balance += state.top_bid;
                    prev.touch(now);
                    notice = format!(", {}'s bid was refunded", prev.nickname);
                    ledger.record(doc, prev_id, "auction", state.top_bid, Direction::Income, "outbid refund", now);
                }
            }
            if let Some(live) = doc.event_state.as_mut() {
                live.top_bid = amount;
                live.top_player = Some(actor.clone());
            }
            ledger.record(doc, &actor, "auction", amount, Direction::Expense, "auction bid", now);
            Ok(format!("Bid placed{}. Leading with {}", notice, format_coins(amount)))
        })
        .await
}
