//! Paid lottery draws against a weighted reward table.

use rand::Rng;

use super::currency::format_coins;
use super::errors::{GameError, GameResult};
use super::roll_between;
use super::types::Direction;
use super::GameContext;
use crate::config::LotteryReward;

/// Pick one reward by weight, or `None` when the table carries no weight.
pub fn pick_reward<'a, R: Rng>(rewards: &'a [LotteryReward], rng: &mut R) -> Option<&'a LotteryReward> {
    let total: f64 = rewards.iter().map(|r| r.weight).sum();
    if total <= 0.0 {
        return None;
    }
    let roll = rng.gen_range(0.0..total);
    let mut upto = 0.0;
    for reward in rewards {
        upto += reward.weight;
        if roll < upto {
            return Some(reward);
        }
    }
    rewards.last()
}

pub async fn draw(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let cost = config.lottery_cost;
            let player = doc.player_mut(&actor)?;
            if player.balance < cost {
                return Err(GameError::precondition(format!(
                    "Insufficient balance, a draw costs {}",
                    format_coins(cost)
                )));
            }
            let mut rng = rand::thread_rng();
            let reward = pick_reward(&config.lottery_rewards, &mut rng)
                .ok_or_else(|| GameError::Internal("lottery has no weighted rewards".to_string()))?;
            let gain = roll_between(&mut rng, reward.min_amount, reward.max_amount);
            player.balance += gain - cost;
            player.touch(now);
            doc.adjust_system_balance(cost - gain);
            ledger.record(doc, &actor, "lottery", cost, Direction::Expense, "lottery ticket", now);
            if gain <= 0 {
                return Ok(format!("{}. No prize this time.", reward.label));
            }
            ledger.record(doc, &actor, "lottery", gain, Direction::Income, reward.label.clone(), now);
            Ok(format!(
                "{}: won {}, net {}",
                reward.label,
                format_coins(gain),
                format_coins(gain - cost)
            ))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reward(label: &str, weight: f64) -> LotteryReward {
        LotteryReward { label: label.into(), min_amount: 0, max_amount: 0, weight }
    }

    #[test]
    fn zero_weight_entries_are_never_picked() {
        let table = vec![reward("never", 0.0), reward("always", 1.0)];
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            assert_eq!(pick_reward(&table, &mut rng).map(|r| r.label.as_str()), Some("always"));
        }
        assert!(pick_reward(&[reward("x", 0.0)], &mut rng).is_none());
    }
}
