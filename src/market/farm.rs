//! One crop plot per player: plant, watch it grow, harvest.

use super::currency::format_coins;
use super::errors::{GameError, GameResult};
use super::roll_between;
use super::types::{CropPlot, Direction};
use super::GameContext;
use crate::config::GameConfig;

fn unknown_crop(config: &GameConfig) -> GameError {
    let names: Vec<&str> = config.crops.iter().map(|c| c.name.as_str()).collect();
    GameError::validation(format!("Unknown crop. Available: {}", names.join(",")))
}

pub async fn plant(ctx: &GameContext, actor: &str, crop_name: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let (actor, crop_name) = (actor.to_string(), crop_name.to_string());
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if player.farmland.as_ref().map_or(false, |plot| !plot.is_ready(now)) {
                return Err(GameError::precondition("Your crop is still growing."));
            }
            let crop = config.crop(&crop_name).ok_or_else(|| unknown_crop(&config))?;
            player.farmland = Some(CropPlot {
                crop_name: crop.name.clone(),
                emoji: crop.emoji.clone(),
                planted_at: now,
                grow_hours: crop.grow_hours,
                yield_min: crop.yield_min,
                yield_max: crop.yield_max,
            });
            player.touch(now);
            Ok(format!(
                "Planted {}{}, ripe in {} hours.",
                crop.emoji, crop.name, crop.grow_hours
            ))
        })
        .await
}

pub async fn status(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let Some(plot) = doc.player(actor)?.farmland.as_ref() else {
                return Ok("Nothing planted yet.".to_string());
            };
            let stage = if plot.is_ready(now) { "ripe" } else { "growing" };
            Ok(format!(
                "{}{} - {}, progress {}%",
                plot.emoji,
                plot.crop_name,
                stage,
                plot.progress_percent(now)
            ))
        })
        .await
}

pub async fn harvest(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            let plot = player
                .farmland
                .as_ref()
                .ok_or_else(|| GameError::precondition("You haven't planted anything."))?;
            if !plot.is_ready(now) {
                return Err(GameError::precondition("Your crop isn't ripe yet."));
            }
            let gain = roll_between(&mut rand::thread_rng(), plot.yield_min, plot.yield_max);
            player.balance += gain;
            player.farmland = None;
            player.touch(now);
            ledger.record(doc, &actor, "farm", gain, Direction::Income, "harvest", now);
            Ok(format!("Bumper harvest, earned {}", format_coins(gain)))
        })
        .await
}
