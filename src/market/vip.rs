//! VIP cards: admin-generated one-shot codes that extend VIP time.

use chrono::Duration;
use log::info;
use rand::Rng;

use super::errors::{GameError, GameResult};
use super::players::{auto_task_overview, require_admin};
use super::types::VipCard;
use super::GameContext;

pub const MAX_CARDS_PER_BATCH: i64 = 20;

/// Parse an hour hint: `"N"` or an inclusive range `"A-B"` drawn uniformly.
pub fn parse_hours<R: Rng>(rng: &mut R, text: &str) -> GameResult<u32> {
    let invalid = || GameError::validation(format!("Invalid hours: {}", text));
    let parse = |s: &str| s.trim().parse::<u32>().map_err(|_| invalid());
    let hours = match text.split_once('-') {
        Some((lo, hi)) => {
            let (lo, hi) = (parse(lo)?, parse(hi)?);
            if lo > hi {
                return Err(invalid());
            }
            rng.gen_range(lo..=hi)
        }
        None => parse(text)?,
    };
    if hours == 0 {
        return Err(invalid());
    }
    Ok(hours)
}

fn new_code() -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("VIP-{}", &raw[..12])
}

/// Generate `count` cards of `card_type`. Returns the new codes.
pub async fn generate(
    ctx: &GameContext,
    actor: &str,
    card_type: &str,
    count: i64,
    hours_hint: Option<&str>,
) -> GameResult<Vec<String>> {
    require_admin(ctx, actor).await?;
    if !(1..=MAX_CARDS_PER_BATCH).contains(&count) {
        return Err(GameError::validation(format!(
            "Count must be between 1 and {}.",
            MAX_CARDS_PER_BATCH
        )));
    }
    let definition = ctx
        .config
        .vip_definition(card_type)
        .ok_or_else(|| {
            let keys: Vec<&str> = ctx.config.vip_cards.iter().map(|d| d.key.as_str()).collect();
            GameError::validation(format!("Unknown card type. Available: {}", keys.join(",")))
        })?
        .clone();

    let mut cards = Vec::with_capacity(count as usize);
    {
        let mut rng = rand::thread_rng();
        for _ in 0..count {
            let hours = match hours_hint {
                Some(hint) if definition.custom_hours => parse_hours(&mut rng, hint)?,
                _ => definition.hours,
            };
            cards.push(VipCard {
                code: new_code(),
                card_type: definition.key.clone(),
                hours,
                created_at: ctx.now(),
                redeemed_by: None,
                redeemed_at: None,
            });
        }
    }
    let codes: Vec<String> = cards.iter().map(|c| c.code.clone()).collect();
    ctx.store
        .transact(move |doc| {
            doc.vip_cards.extend(cards);
            Ok(())
        })
        .await?;
    info!(target: "security", "admin {} generated {} {} VIP cards", actor, codes.len(), definition.key);
    Ok(codes)
}

pub async fn redeem(ctx: &GameContext, actor: &str, code: &str) -> GameResult<String> {
    let now = ctx.now();
    let (actor, code) = (actor.to_string(), code.trim().to_string());
    ctx.store
        .transact(move |doc| {
            let card = doc
                .vip_cards
                .iter_mut()
                .find(|card| card.code.eq_ignore_ascii_case(&code))
                .ok_or_else(|| GameError::not_found("No such card code."))?;
            if card.is_redeemed() {
                return Err(GameError::precondition("That card has already been used."));
            }
            card.redeemed_by = Some(actor.clone());
            card.redeemed_at = Some(now);
            let hours = card.hours;
            let player = doc.player_mut(&actor)?;
            let from = player.vip_until.map_or(now, |until| until.max(now));
            let until = from + Duration::hours(i64::from(hours));
            player.vip_until = Some(until);
            player.touch(now);
            Ok(format!("VIP activated, {} hours remaining", (until - now).num_hours()))
        })
        .await
}

pub async fn status(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let player = doc.player(actor)?;
            match player.vip_until.filter(|until| *until > now) {
                None => Ok("You are not a VIP.".to_string()),
                Some(until) => Ok(format!(
                    "VIP: {} hours remaining\nAuto tasks:\n{}",
                    (until - now).num_hours(),
                    auto_task_overview(player)
                )),
            }
        })
        .await
}
