//! Player valuation and the ownership market.
//!
//! Ownership is a two-sided relation: `Player::owner_id` on the owned side and
//! an `OwnedSlave` entry in the owner's `owned_slaves`. Every operation here
//! updates both sides inside one transaction, so the relation is never
//! observable half-written.

use chrono::{DateTime, Utc};
use log::info;

use super::currency::format_coins;
use super::errors::{GameError, GameResult};
use super::ledger::Ledger;
use super::types::{Direction, GameState, OwnedSlave, Player};
use super::GameContext;

pub const MARKET_LISTING_LIMIT: usize = 8;

const VALUATION_BASE: i64 = 800;
const VALUATION_PER_OWNED: i64 = 300;
const VALUATION_FLOOR: i64 = 500;
const VIP_PREMIUM: f64 = 1.2;
const SNATCH_MULTIPLIER: i64 = 2;
const REDEEM_RATIO: f64 = 0.6;

/// Market price of a player: liquid and banked wealth, owned count and VIP status.
pub fn valuation(player: &Player, now: DateTime<Utc>) -> i64 {
    let base = VALUATION_BASE
        + player.balance / 2
        + player.bank_balance / 4
        + player.owned_slaves.len() as i64 * VALUATION_PER_OWNED;
    let priced = if player.is_vip(now) {
        (base as f64 * VIP_PREMIUM) as i64
    } else {
        base
    };
    priced.max(VALUATION_FLOOR)
}

pub fn redeem_price(player: &Player, now: DateTime<Utc>) -> i64 {
    (valuation(player, now) as f64 * REDEEM_RATIO) as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// Pay the plain valuation.
    Buy,
    /// Hostile takeover at twice the valuation.
    Snatch,
}

impl Acquisition {
    fn price(self, target: &Player, now: DateTime<Utc>) -> i64 {
        match self {
            Acquisition::Buy => valuation(target, now),
            Acquisition::Snatch => valuation(target, now) * SNATCH_MULTIPLIER,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Acquisition::Buy => "Bought",
            Acquisition::Snatch => "Snatched",
        }
    }
}

pub async fn list_market(ctx: &GameContext, actor: &str) -> String {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let mut candidates: Vec<(&Player, i64)> = doc
                .players
                .values()
                .filter(|p| p.owner_id.is_none() && p.player_id != actor)
                .map(|p| (p, valuation(p, now)))
                .collect();
            if candidates.is_empty() {
                return "Nobody is for sale right now.".to_string();
            }
            candidates.sort_by(|a, b| b.1.cmp(&a.1));
            let mut lines = vec!["Player market".to_string()];
            for (player, price) in candidates.into_iter().take(MARKET_LISTING_LIMIT) {
                lines.push(format!("{} - {}", player.nickname, format_coins(price)));
            }
            lines.join("\n")
        })
        .await
}

pub async fn list_owned(ctx: &GameContext, actor: &str) -> GameResult<String> {
    ctx.store
        .read(|doc| {
            let player = doc.player(actor)?;
            if player.owned_slaves.is_empty() {
                return Ok("You don't own anyone yet.".to_string());
            }
            let mut lines = vec!["Your holdings:".to_string()];
            for slave in player.owned_slaves.values() {
                lines.push(format!("{} - {}", slave.nickname, format_coins(slave.price)));
            }
            Ok(lines.join("\n"))
        })
        .await
}

/// Detach `target` from its current owner, refunding the price that owner
/// originally paid. Returns the previous owner's id.
fn detach_from_owner(
    ledger: &Ledger,
    doc: &mut GameState,
    target: &str,
    now: DateTime<Utc>,
) -> GameResult<Option<String>> {
    let (previous, nickname) = {
        let t = doc.player(target)?;
        (t.owner_id.clone(), t.nickname.clone())
    };
    let Some(previous) = previous else {
        return Ok(None);
    };
    if let Some(owner) = doc.players.get_mut(&previous) {
        if let Some(entry) = owner.owned_slaves.remove(target) {
            owner.balance += entry.price;
            owner.touch(now);
            ledger.record(
                doc,
                &previous,
                "sale",
                entry.price,
                Direction::Income,
                format!("{} taken over", nickname),
                now,
            );
        }
    }
    doc.player_mut(target)?.owner_id = None;
    Ok(Some(previous))
}

pub async fn acquire(
    ctx: &GameContext,
    buyer: &str,
    target: &str,
    mode: Acquisition,
) -> GameResult<String> {
    if buyer == target {
        return Err(GameError::validation("You can't buy yourself."));
    }
    let now = ctx.now();
    let ledger = ctx.ledger;
    let (buyer_id, target_id) = (buyer.to_string(), target.to_string());
    let (message, previous) = ctx
        .store
        .transact(move |doc| {
            let target = doc.player(&target_id)?;
            if target.owner_id.as_deref() == Some(buyer_id.as_str()) {
                return Err(GameError::precondition("They already belong to you."));
            }
            let nickname = target.nickname.clone();
            let price = mode.price(target, now);
            let payable = if doc.is_admin(&buyer_id) { 0 } else { price };
            if doc.player(&buyer_id)?.balance < payable {
                return Err(GameError::precondition("Insufficient balance, purchase failed."));
            }

            let previous = detach_from_owner(&ledger, doc, &target_id, now)?;

            let buyer = doc.player_mut(&buyer_id)?;
            buyer.balance -= payable;
            buyer.owned_slaves.insert(
                target_id.clone(),
                OwnedSlave {
                    user_id: target_id.clone(),
                    nickname: nickname.clone(),
                    price: payable,
                    loyalty: 0.5,
                },
            );
            buyer.touch(now);
            let target = doc.player_mut(&target_id)?;
            target.owner_id = Some(buyer_id.clone());
            target.touch(now);

            let category = match mode {
                Acquisition::Buy => "purchase",
                Acquisition::Snatch => "takeover",
            };
            ledger.record(doc, &buyer_id, category, payable, Direction::Expense, nickname.clone(), now);
            Ok((
                format!("{} {} for {}", mode.verb(), nickname, format_coins(payable)),
                previous,
            ))
        })
        .await?;
    if let Some(previous) = previous {
        info!("{} took {} over from {}", buyer, target, previous);
    }
    Ok(message)
}

pub async fn buy(ctx: &GameContext, buyer: &str, target: &str) -> GameResult<String> {
    acquire(ctx, buyer, target, Acquisition::Buy).await
}

pub async fn snatch(ctx: &GameContext, buyer: &str, target: &str) -> GameResult<String> {
    acquire(ctx, buyer, target, Acquisition::Snatch).await
}

pub async fn release(ctx: &GameContext, owner: &str, target: &str) -> GameResult<String> {
    let now = ctx.now();
    let (owner_id, target_id) = (owner.to_string(), target.to_string());
    ctx.store
        .transact(move |doc| {
            let owner = doc.player_mut(&owner_id)?;
            if owner.owned_slaves.remove(&target_id).is_none() {
                return Err(GameError::precondition("They don't belong to you."));
            }
            owner.touch(now);
            let target = doc.player_mut(&target_id)?;
            target.owner_id = None;
            target.touch(now);
            Ok(format!("Released {}", target.nickname))
        })
        .await
}

/// Buy yourself free at a discount of the current valuation, paid to the owner.
pub async fn redeem(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player(&actor)?;
            let Some(owner_id) = player.owner_id.clone() else {
                return Err(GameError::precondition("You are already free."));
            };
            let price = redeem_price(player, now);
            if player.balance < price {
                return Err(GameError::precondition("Not enough balance to buy your freedom."));
            }
            let nickname = player.nickname.clone();

            let player = doc.player_mut(&actor)?;
            player.balance -= price;
            player.owner_id = None;
            player.touch(now);
            ledger.record(doc, &actor, "redeem", price, Direction::Expense, "bought freedom", now);

            if let Some(owner) = doc.players.get_mut(&owner_id) {
                owner.balance += price;
                owner.owned_slaves.remove(&actor);
                owner.touch(now);
                ledger.record(doc, &owner_id, "redeem income", price, Direction::Income, nickname, now);
            }
            Ok(format!("You are free. Paid {}", format_coins(price)))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn valuation_has_a_floor() {
        let p = Player::default();
        assert_eq!(valuation(&p, now()), 800);
        let broke = Player { balance: -10_000, ..Player::default() };
        assert_eq!(valuation(&broke, now()), 500);
    }

    #[test]
    fn valuation_counts_wealth_holdings_and_vip() {
        let mut p = Player { balance: 2000, bank_balance: 4000, ..Player::default() };
        p.owned_slaves.insert(
            "qq:x".into(),
            OwnedSlave { user_id: "qq:x".into(), nickname: "x".into(), price: 1, loyalty: 0.5 },
        );
        // 800 + 1000 + 1000 + 300
        assert_eq!(valuation(&p, now()), 3100);
        p.vip_until = Some(now() + Duration::hours(1));
        assert_eq!(valuation(&p, now()), 3720);
        assert_eq!(redeem_price(&p, now()), 2232);
    }
}
