//! Jail: prison labour, bail and the inmate list.

use chrono::Duration;

use super::currency::{format_coins, format_wait};
use super::errors::{GameError, GameResult};
use super::roll_between;
use super::trade::valuation;
use super::types::{Direction, Player};
use super::GameContext;

const BAIL_FLOOR: i64 = 200;
const BAIL_RATIO: f64 = 0.5;
const DEFAULT_REASON: &str = "Gambling";

pub fn bail_cost(player: &Player, now: chrono::DateTime<chrono::Utc>) -> i64 {
    ((valuation(player, now) as f64 * BAIL_RATIO) as i64).max(BAIL_FLOOR)
}

/// Work the sewing machine. Starts a term when the player is free; every
/// shift pays out and shortens the sentence by the shift cooldown.
pub async fn work(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            let jail = &mut player.jail;
            if !jail.is_jailed(now) {
                jail.until = Some(now + Duration::seconds(config.jail_term_seconds));
                if jail.reason.is_empty() {
                    jail.reason = DEFAULT_REASON.to_string();
                }
            }
            if let Some(end) = jail.cooldown_end.filter(|end| now < *end) {
                return Err(GameError::precondition(format!(
                    "The sewing machine is cooling down, try again in {}.",
                    format_wait((end - now).num_seconds())
                )));
            }
            let gain = roll_between(&mut rand::thread_rng(), config.jail_work_min, config.jail_work_max);
            let shift = Duration::seconds(config.jail_work_cooldown_seconds);
            jail.coin += gain;
            jail.cooldown_end = Some(now + shift);
            let until = jail.until.map_or(now, |until| (until - shift).max(now));
            let note = if until <= now {
                jail.until = None;
                jail.reason.clear();
                "Labour complete, you have been released.".to_string()
            } else {
                jail.until = Some(until);
                format!("{} minutes of your sentence remain.", (until - now).num_minutes())
            };
            let total = jail.coin;
            player.balance += gain;
            player.touch(now);
            ledger.record(doc, &actor, "prison labour", gain, Direction::Income, "sewing machine", now);
            Ok(format!(
                "Earned {} on the sewing machine, {} in total\n{}",
                format_coins(gain),
                format_coins(total),
                note
            ))
        })
        .await
}

pub async fn status(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let player = doc.player(actor)?;
            let jail = &player.jail;
            let Some(until) = jail.until.filter(|_| jail.is_jailed(now)) else {
                return Ok("No sentence, you are free to go.".to_string());
            };
            let reason = if jail.reason.is_empty() { "unknown" } else { jail.reason.as_str() };
            Ok(format!(
                "=== Jail ===\nSentence left: {} minutes\nReason: {}\nBail: {}\nEarned inside: {}",
                (until - now).num_minutes(),
                reason,
                format_coins(bail_cost(player, now)),
                format_coins(jail.coin)
            ))
        })
        .await
}

pub async fn bail(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if !player.jail.is_jailed(now) {
                return Err(GameError::precondition("You are not in jail."));
            }
            let cost = bail_cost(player, now);
            if player.balance < cost {
                return Err(GameError::precondition(format!(
                    "Not enough for bail, you need {}",
                    format_coins(cost)
                )));
            }
            player.balance -= cost;
            player.jail.until = None;
            player.jail.reason.clear();
            player.touch(now);
            ledger.record(doc, &actor, "bail", cost, Direction::Expense, "posted bail", now);
            Ok(format!("Bail paid, {} and you walk free.", format_coins(cost)))
        })
        .await
}

pub async fn inmates(ctx: &GameContext) -> String {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let lines: Vec<String> = doc
                .players
                .values()
                .filter_map(|p| {
                    p.jail
                        .until
                        .filter(|until| *until > now)
                        .map(|until| format!("{} - {} minutes", p.nickname, (until - now).num_minutes()))
                })
                .collect();
            if lines.is_empty() {
                "The jail is empty.".to_string()
            } else {
                format!("Current inmates:\n{}", lines.join("\n"))
            }
        })
        .await
}
