//! Means-tested stipend for low-asset players, funded by the system balance.

use super::cooldown_remaining;
use super::currency::{format_coins, format_wait};
use super::errors::{GameError, GameResult};
use super::types::{Direction, Player};
use super::GameContext;
use crate::config::GameConfig;

fn eligible(player: &Player, config: &GameConfig) -> bool {
    player.total_assets() <= config.welfare_threshold
}

pub fn stipend(player: &Player, config: &GameConfig) -> i64 {
    config.welfare_base_amount + i64::from(player.welfare_level) * config.welfare_growth
}

pub async fn preview(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    ctx.store
        .read(|doc| {
            let p = doc.player(actor)?;
            if !eligible(p, &config) {
                return Ok("Your assets are above the welfare line.".to_string());
            }
            if let Some(wait) = cooldown_remaining(p.last_welfare_time, config.welfare_interval_seconds, now) {
                return Ok(format!("Next stipend in {}.", format_wait(wait)));
            }
            Ok(format!("Available stipend: {}", format_coins(stipend(p, &config))))
        })
        .await
}

pub async fn claim(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if !eligible(player, &config) {
                return Err(GameError::precondition("You're too well off to claim welfare."));
            }
            if let Some(wait) = cooldown_remaining(player.last_welfare_time, config.welfare_interval_seconds, now) {
                return Err(GameError::precondition(format!("Wait {} more.", format_wait(wait))));
            }
            let amount = stipend(player, &config);
            player.balance += amount;
            player.last_welfare_time = Some(now);
            player.welfare_income += amount;
            player.welfare_level = (player.welfare_level + 1).min(config.welfare_max_level);
            player.touch(now);
            let total = player.welfare_income;
            doc.adjust_system_balance(-amount);
            ledger.record(doc, &actor, "welfare", amount, Direction::Income, "stipend", now);
            Ok(format!(
                "Stipend of {} received, {} claimed so far",
                format_coins(amount),
                format_coins(total)
            ))
        })
        .await
}
