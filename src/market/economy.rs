//! Money-moving operations: work, robbery, bank, credit, transfers, loans and
//! red packets.
//!
//! Each public function is one transaction against the store. Validation
//! happens on the freshly read document, so two commands racing on the same
//! player always see each other's committed effects.

use rand::Rng;

use super::cooldown_remaining;
use super::currency::{checked_total, format_coins, format_wait, require_positive};
use super::errors::{GameError, GameResult};
use super::roll_between;
use super::types::{Direction, Loan, RedPacket};
use super::GameContext;

pub const ROB_RATE_FLOOR: f64 = 0.05;
pub const ROB_RATE_CEILING: f64 = 0.95;
const ROB_LOOT_FACTOR: (f64, f64) = (0.2, 0.6);
const ROB_PENALTY_FACTOR: (f64, f64) = (0.1, 0.4);
const PACKET_ID_LEN: usize = 8;

// ============================================================================
// Work and robbery
// ============================================================================

pub async fn work(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if let Some(wait) = cooldown_remaining(player.last_work_time, config.work_cooldown_seconds, now) {
                return Err(GameError::precondition(format!(
                    "Work is on cooldown, come back in {}.",
                    format_wait(wait)
                )));
            }
            let reward = roll_between(&mut rand::thread_rng(), config.work_reward_min, config.work_reward_max);
            player.balance += reward;
            player.last_work_time = Some(now);
            player.touch(now);
            let owner_id = player.owner_id.clone();
            ledger.record(doc, &actor, "work", reward, Direction::Income, "wages", now);

            let mut message = format!("Work done, earned {}.", format_coins(reward));
            if let Some(owner) = owner_id.and_then(|id| doc.players.get_mut(&id)) {
                let tribute = ((reward as f64 * config.tribute_ratio) as i64).max(1);
                owner.balance += tribute;
                owner.touch(now);
                let owner_id = owner.player_id.clone();
                ledger.record(doc, &owner_id, "tribute", tribute, Direction::Income, "share of wages", now);
                message.push_str(&format!("\nPaid {} tribute to your owner.", format_coins(tribute)));
            }
            Ok(message)
        })
        .await
}

/// Strategy rate minus the victim's guard bonus, clamped to the allowed band.
pub fn rob_success_rate(strategy_rate: f64, guard_bonus: f64) -> f64 {
    (strategy_rate - guard_bonus).clamp(ROB_RATE_FLOOR, ROB_RATE_CEILING)
}

pub async fn rob(ctx: &GameContext, attacker: &str, victim: &str, strategy: Option<&str>) -> GameResult<String> {
    if attacker == victim {
        return Err(GameError::validation("You can't rob yourself."));
    }
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let (attacker, victim) = (attacker.to_string(), victim.to_string());
    let strategy_key = strategy.unwrap_or(config.default_rob_strategy.as_str()).to_string();
    ctx.store
        .transact(move |doc| {
            let (att, vic) = doc.pair_mut(&attacker, &victim)?;
            if let Some(wait) = cooldown_remaining(att.last_rob_time, config.rob_cooldown_seconds, now) {
                return Err(GameError::precondition(format!(
                    "Robbery is on cooldown, come back in {}.",
                    format_wait(wait)
                )));
            }
            let strategy = config.strategy(&strategy_key).ok_or_else(|| {
                let keys: Vec<&str> = config.rob_strategies.iter().map(|s| s.key.as_str()).collect();
                GameError::validation(format!("Unknown strategy. Available: {}", keys.join(",")))
            })?;
            let guard_bonus = vic.active_guard(now).map(|g| g.protection_bonus);
            let guarded = guard_bonus.is_some();
            let rate = rob_success_rate(strategy.success_rate, guard_bonus.unwrap_or(0.0));
            att.last_rob_time = Some(now);
            att.touch(now);

            let mut rng = rand::thread_rng();
            if rng.gen::<f64>() <= rate && vic.balance > 0 {
                let factor = rng.gen_range(ROB_LOOT_FACTOR.0..=ROB_LOOT_FACTOR.1);
                let loot = ((vic.balance as f64 * strategy.reward_multiplier * factor) as i64)
                    .min(vic.balance)
                    .max(1);
                vic.balance -= loot;
                vic.touch(now);
                att.balance += loot;
                let (att_name, vic_name) = (att.nickname.clone(), vic.nickname.clone());
                ledger.record(doc, &attacker, "robbery", loot, Direction::Income, format!("robbed {}", vic_name), now);
                ledger.record(doc, &victim, "robbed", loot, Direction::Expense, format!("robbed by {}", att_name), now);
                Ok(format!(
                    "Robbery succeeded! Took {} (success rate {:.0}%)",
                    format_coins(loot),
                    rate * 100.0
                ))
            } else {
                let factor = rng.gen_range(ROB_PENALTY_FACTOR.0..=ROB_PENALTY_FACTOR.1);
                // At least one coin, but never more than the robber has.
                let loss = ((att.balance as f64 * strategy.penalty_multiplier * factor) as i64)
                    .max(1)
                    .min(att.balance);
                if loss == 0 {
                    return Ok("Robbery failed, but you had nothing to be fined.".to_string());
                }
                att.balance -= loss;
                if guarded {
                    vic.balance += loss;
                    vic.touch(now);
                }
                ledger.record(doc, &attacker, "robbery failed", loss, Direction::Expense, "robbery fine", now);
                if guarded {
                    ledger.record(doc, &victim, "guard payout", loss, Direction::Income, "guard payout", now);
                }
                Ok(format!("Robbery failed, fined {}", format_coins(loss)))
            }
        })
        .await
}

// ============================================================================
// Bank
// ============================================================================

pub async fn deposit(ctx: &GameContext, actor: &str, amount: i64) -> GameResult<String> {
    let amount = require_positive(amount)?;
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if amount > player.balance {
                return Err(GameError::precondition("Insufficient balance."));
            }
            if checked_total(player.bank_balance, amount)? > player.deposit_limit {
                return Err(GameError::precondition("That would exceed your deposit limit."));
            }
            player.balance -= amount;
            player.bank_balance += amount;
            player.touch(now);
            ledger.record(doc, &actor, "deposit", amount, Direction::Expense, "deposited to bank", now);
            Ok(format!("Deposited {}", format_coins(amount)))
        })
        .await
}

/// Deposit as much as the limit allows; used by automation.
pub async fn deposit_up_to_limit(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let room = ctx
        .store
        .read(|doc| doc.player(actor).map(|p| p.balance.min(p.deposit_limit - p.bank_balance)))
        .await?;
    if room <= 0 {
        return Err(GameError::precondition("Nothing to deposit."));
    }
    deposit(ctx, actor, room).await
}

pub async fn withdraw(ctx: &GameContext, actor: &str, amount: i64) -> GameResult<String> {
    let amount = require_positive(amount)?;
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if amount > player.bank_balance {
                return Err(GameError::precondition("Insufficient bank balance."));
            }
            player.bank_balance -= amount;
            player.balance += amount;
            player.touch(now);
            ledger.record(doc, &actor, "withdraw", amount, Direction::Income, "withdrawn from bank", now);
            Ok(format!("Withdrew {}", format_coins(amount)))
        })
        .await
}

pub async fn collect_interest(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if let Some(ready) = player.interest_ready_at.filter(|ready| now < *ready) {
                return Err(GameError::precondition(format!(
                    "Interest is on cooldown, ready in {}.",
                    format_wait((ready - now).num_seconds())
                )));
            }
            let interest = (player.bank_balance as f64 * config.deposit_interest_rate) as i64;
            if interest <= 0 {
                return Err(GameError::precondition("No interest to collect."));
            }
            player.bank_balance += interest;
            player.interest_ready_at = Some(now + chrono::Duration::seconds(config.interest_cooldown_seconds));
            player.touch(now);
            doc.adjust_system_balance(-interest);
            ledger.record(doc, &actor, "interest", interest, Direction::Income, "bank interest", now);
            Ok(format!("Collected {} interest", format_coins(interest)))
        })
        .await
}

pub async fn bank_info(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let rate = ctx.config.deposit_interest_rate;
    ctx.store
        .read(|doc| {
            let p = doc.player(actor)?;
            let mut lines = vec![
                format!(
                    "Bank: {} / limit {}",
                    format_coins(p.bank_balance),
                    format_coins(p.deposit_limit)
                ),
                format!("Interest rate: {:.1}%", rate * 100.0),
            ];
            if let Some(ready) = p.interest_ready_at.filter(|ready| *ready > now) {
                lines.push(format!("Interest ready in {}", format_wait((ready - now).num_seconds())));
            }
            Ok(lines.join("\n"))
        })
        .await
}

pub async fn upgrade_credit(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            let next = config
                .credit_level(player.credit_level + 1)
                .ok_or_else(|| GameError::precondition("Already at the highest credit level."))?;
            if player.balance < next.upgrade_cost {
                return Err(GameError::precondition(format!(
                    "Insufficient balance, the upgrade costs {}",
                    format_coins(next.upgrade_cost)
                )));
            }
            player.balance -= next.upgrade_cost;
            player.credit_level = next.level;
            player.deposit_limit = next.deposit_limit;
            player.touch(now);
            doc.adjust_system_balance(next.upgrade_cost);
            ledger.record(doc, &actor, "credit upgrade", next.upgrade_cost, Direction::Expense, format!("credit Lv.{}", next.level), now);
            Ok(format!(
                "Credit upgraded to Lv.{}, new deposit limit {}",
                next.level,
                format_coins(next.deposit_limit)
            ))
        })
        .await
}

// ============================================================================
// Transfers and loans
// ============================================================================

pub async fn transfer(ctx: &GameContext, sender: &str, recipient: &str, amount: i64) -> GameResult<String> {
    let amount = require_positive(amount)?;
    if sender == recipient {
        return Err(GameError::validation("You can't transfer to yourself."));
    }
    let now = ctx.now();
    let rate = ctx.config.transfer_fee_rate;
    let ledger = ctx.ledger;
    let (sender, recipient) = (sender.to_string(), recipient.to_string());
    ctx.store
        .transact(move |doc| {
            let (from, to) = doc.pair_mut(&sender, &recipient)?;
            if amount > from.balance {
                return Err(GameError::precondition("Insufficient balance."));
            }
            let fee = (amount as f64 * rate) as i64;
            let received = amount - fee;
            let credited = checked_total(to.balance, received)?;
            from.balance -= amount;
            to.balance = credited;
            from.touch(now);
            to.touch(now);
            let (from_name, to_name) = (from.nickname.clone(), to.nickname.clone());
            doc.adjust_system_balance(fee);
            doc.adjust_tax_pool(fee, now);
            ledger.record(doc, &sender, "transfer", amount, Direction::Expense, format!("to {}", to_name), now);
            ledger.record(doc, &recipient, "transfer in", received, Direction::Income, format!("from {}", from_name), now);
            Ok(format!(
                "Transfer complete, {} received, fee {}",
                format_coins(received),
                format_coins(fee)
            ))
        })
        .await
}

pub async fn request_loan(ctx: &GameContext, actor: &str, amount: i64) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if player.live_loan().is_some() {
                return Err(GameError::precondition("Repay your current loan first."));
            }
            let limit = config.credit_level(player.credit_level).map_or(0, |tier| tier.loan_limit);
            if amount <= 0 || amount > limit {
                return Err(GameError::validation(format!("Loan amount must be between 1 and {}.", limit)));
            }
            player.loan = Some(Loan {
                amount,
                rate: config.deposit_interest_rate,
                issued_at: now,
                repaid: false,
            });
            player.balance += amount;
            player.touch(now);
            doc.adjust_system_balance(-amount);
            ledger.record(doc, &actor, "loan", amount, Direction::Income, "loan issued", now);
            Ok(format!("Loan of {} received", format_coins(amount)))
        })
        .await
}

/// Repay the live loan in full. `amount` defaults to principal plus interest;
/// anything less is rejected.
pub async fn repay_loan(ctx: &GameContext, actor: &str, amount: Option<i64>) -> GameResult<String> {
    let now = ctx.now();
    let repay_rate = ctx.config.loan_repay_rate;
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            let principal = player
                .live_loan()
                .map(|loan| loan.amount)
                .ok_or_else(|| GameError::precondition("You have no loan."))?;
            let due = principal + (principal as f64 * repay_rate) as i64;
            let amount = amount.unwrap_or(due);
            if amount < due {
                return Err(GameError::precondition(format!("You must repay at least {}", format_coins(due))));
            }
            if player.balance < amount {
                return Err(GameError::precondition("Insufficient balance."));
            }
            player.balance -= amount;
            if let Some(loan) = player.loan.as_mut() {
                loan.repaid = true;
            }
            player.touch(now);
            doc.adjust_system_balance(amount);
            ledger.record(doc, &actor, "repayment", amount, Direction::Expense, "loan repaid", now);
            Ok(format!("Loan repaid, paid {}", format_coins(amount)))
        })
        .await
}

// ============================================================================
// Red packets
// ============================================================================

pub async fn send_red_packet(ctx: &GameContext, sender: &str, total: i64, parts: i64) -> GameResult<String> {
    if total <= 0 || parts <= 0 {
        return Err(GameError::validation("Amount and parts must be greater than 0."));
    }
    let parts = u32::try_from(parts).map_err(|_| GameError::validation("Too many parts."))?;
    let now = ctx.now();
    let fee_rate = ctx.config.red_packet_fee_rate;
    let ledger = ctx.ledger;
    let sender = sender.to_string();
    ctx.store
        .transact(move |doc| {
            let fee = if doc.is_admin(&sender) { 0 } else { (total as f64 * fee_rate) as i64 };
            let cost = checked_total(total, fee)?;
            let player = doc.player_mut(&sender)?;
            if cost > player.balance {
                return Err(GameError::precondition("Insufficient balance for this red packet."));
            }
            player.balance -= cost;
            player.touch(now);

            let mut packet_id = uuid::Uuid::new_v4().simple().to_string();
            packet_id.truncate(PACKET_ID_LEN);
            while doc.red_packets.contains_key(&packet_id) {
                packet_id = uuid::Uuid::new_v4().simple().to_string();
                packet_id.truncate(PACKET_ID_LEN);
            }
            doc.red_packets.insert(
                packet_id.clone(),
                RedPacket {
                    packet_id: packet_id.clone(),
                    sender_id: sender.clone(),
                    total_amount: total,
                    parts,
                    created_at: now,
                    fee,
                    claimed_amount: 0,
                    claimed_by: Default::default(),
                },
            );
            doc.adjust_system_balance(fee);
            doc.adjust_tax_pool(fee, now);
            ledger.record(doc, &sender, "red packet", cost, Direction::Expense, "sent red packet", now);
            Ok(format!(
                "Red packet {} sent: {} in {} parts, fee {}",
                packet_id,
                format_coins(total),
                parts,
                format_coins(fee)
            ))
        })
        .await
}

enum Grab {
    Claimed(i64),
    TooLate,
}

pub async fn grab_red_packet(ctx: &GameContext, actor: &str, packet_id: &str) -> GameResult<String> {
    let now = ctx.now();
    let ledger = ctx.ledger;
    let (actor, packet_id) = (actor.to_string(), packet_id.trim().to_string());
    let outcome = ctx
        .store
        .transact(move |doc| {
            let packet = doc
                .red_packets
                .get_mut(&packet_id)
                .ok_or_else(|| GameError::not_found("That red packet doesn't exist or has expired."))?;
            if packet.sender_id == actor {
                return Err(GameError::precondition("You can't grab your own red packet."));
            }
            if packet.is_finished() {
                // Purge and commit, then report it as gone.
                doc.red_packets.remove(&packet_id);
                return Ok(Grab::TooLate);
            }
            if packet.claimed_by.contains_key(&actor) {
                return Err(GameError::precondition("You already grabbed this red packet."));
            }
            let remaining_parts = i64::from(packet.parts)
                .saturating_sub(packet.claimed_by.len() as i64)
                .max(1);
            let remaining_amount = packet.total_amount - packet.claimed_amount;
            let ceiling = (remaining_amount / remaining_parts).max(1);
            let claim = rand::thread_rng().gen_range(1..=ceiling).min(remaining_amount);
            packet.claimed_by.insert(actor.clone(), claim);
            packet.claimed_amount += claim;
            if packet.is_finished() {
                doc.red_packets.remove(&packet_id);
            }
            let player = doc.player_mut(&actor)?;
            player.balance += claim;
            player.touch(now);
            ledger.record(doc, &actor, "red packet", claim, Direction::Income, "grabbed red packet", now);
            Ok(Grab::Claimed(claim))
        })
        .await?;
    match outcome {
        Grab::Claimed(claim) => Ok(format!("You grabbed {}", format_coins(claim))),
        Grab::TooLate => Err(GameError::precondition("Too late, the red packet is gone.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rob_rate_is_clamped() {
        assert_eq!(rob_success_rate(0.6, 0.0), 0.6);
        assert_eq!(rob_success_rate(0.6, 2.0), ROB_RATE_FLOOR);
        assert_eq!(rob_success_rate(1.5, 0.0), ROB_RATE_CEILING);
        assert_eq!(rob_success_rate(0.35, 0.4), ROB_RATE_FLOOR);
        assert!((rob_success_rate(0.8, 0.25) - 0.55).abs() < 1e-9);
    }
}
