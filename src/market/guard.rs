//! Bodyguard contracts. An active guard lowers robbery odds against its
//! employer and redirects failed robbers' fines to them.

use chrono::Duration;

use super::currency::format_coins;
use super::errors::{GameError, GameResult};
use super::types::{Direction, GuardContract};
use super::GameContext;

pub fn catalog(ctx: &GameContext) -> String {
    let mut lines = vec!["Guards for hire:".to_string()];
    for guard in &ctx.config.guards {
        lines.push(format!(
            "{} - {} hours - {} (-{:.0}% robbery odds)",
            guard.name,
            guard.duration_hours,
            format_coins(guard.cost),
            guard.protection_bonus * 100.0
        ));
    }
    lines.join("\n")
}

pub async fn hire(ctx: &GameContext, actor: &str, name: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let (actor, name) = (actor.to_string(), name.to_string());
    ctx.store
        .transact(move |doc| {
            let guard = config.guard(&name).ok_or_else(|| {
                let names: Vec<&str> = config.guards.iter().map(|g| g.name.as_str()).collect();
                GameError::validation(format!("Unknown guard. Available: {}", names.join(",")))
            })?;
            let cost = if doc.is_admin(&actor) { 0 } else { guard.cost };
            let player = doc.player_mut(&actor)?;
            if player.balance < cost {
                return Err(GameError::precondition("Insufficient balance."));
            }
            player.balance -= cost;
            player.guard = Some(GuardContract {
                name: guard.name.clone(),
                expires_at: now + Duration::hours(i64::from(guard.duration_hours)),
                protection_bonus: guard.protection_bonus,
            });
            player.touch(now);
            if cost > 0 {
                ledger.record(doc, &actor, "guard", cost, Direction::Expense, format!("hired {}", guard.name), now);
            }
            Ok(format!("Hired {} for {} hours", guard.name, guard.duration_hours))
        })
        .await
}

pub async fn status(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            Ok(match doc.player(actor)?.active_guard(now) {
                None => "No guard on duty.".to_string(),
                Some(guard) => format!(
                    "Guard {} on duty, {} hours left",
                    guard.name,
                    (guard.expires_at - now).num_hours()
                ),
            })
        })
        .await
}
