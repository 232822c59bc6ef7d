//! Stat training and duels.

use rand::Rng;

use super::cooldown_remaining;
use super::currency::{format_coins, format_wait};
use super::errors::{GameError, GameResult};
use super::types::{Direction, Player, Stat};
use super::GameContext;
use crate::config::GameConfig;

const DUEL_REWARD_FLOOR: i64 = 500;
const DUEL_NOISE: f64 = 5.0;

pub fn parse_stat(text: &str) -> GameResult<Stat> {
    Stat::parse(text).ok_or_else(|| GameError::validation("Unknown stat, use power/endurance/agility."))
}

pub fn training_cost(player: &Player, config: &GameConfig) -> i64 {
    let total: i64 = Stat::ALL.iter().map(|s| i64::from(player.stat(*s))).sum();
    config.training_base_cost + total * config.training_cost_growth
}

/// Permanently raise a stat; used by training and shop items.
pub fn apply_stat_bonus(player: &mut Player, stat: Stat, amount: u32) -> u32 {
    let value = player.stats.entry(stat).or_insert(0);
    *value = value.saturating_add(amount);
    *value
}

/// Stat-weighted strength plus a little luck.
pub fn combat_power<R: Rng>(player: &Player, rng: &mut R) -> f64 {
    f64::from(player.stat(Stat::Power)) * 1.4
        + f64::from(player.stat(Stat::Agility)) * 1.2
        + f64::from(player.stat(Stat::Endurance)) * 1.1
        + rng.gen_range(-DUEL_NOISE..=DUEL_NOISE)
}

pub async fn train(ctx: &GameContext, actor: &str, stat: &str) -> GameResult<String> {
    let stat = parse_stat(stat)?;
    let now = ctx.now();
    let config = ctx.config.clone();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if let Some(wait) = cooldown_remaining(player.last_training_time, config.training_cooldown_seconds, now) {
                return Err(GameError::precondition(format!(
                    "Training is on cooldown, come back in {}.",
                    format_wait(wait)
                )));
            }
            let cost = training_cost(player, &config);
            if player.balance < cost {
                return Err(GameError::precondition(format!(
                    "Insufficient balance, training costs {}",
                    format_coins(cost)
                )));
            }
            let gain = rand::thread_rng().gen_range(config.training_gain_min..=config.training_gain_max.max(config.training_gain_min));
            player.balance -= cost;
            apply_stat_bonus(player, stat, gain);
            player.last_training_time = Some(now);
            player.touch(now);
            doc.adjust_system_balance(cost);
            ledger.record(doc, &actor, "training", cost, Direction::Expense, format!("trained {}", stat.label()), now);
            Ok(format!(
                "Training complete! {} +{}, cost {}",
                stat.label(),
                gain,
                format_coins(cost)
            ))
        })
        .await
}

pub async fn sheet(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let config = ctx.config.clone();
    ctx.store
        .read(|doc| {
            let p = doc.player(actor)?;
            let mut lines = vec!["=== Stats ===".to_string()];
            for stat in Stat::ALL {
                lines.push(format!("{}: {}", stat.label(), p.stat(stat)));
            }
            lines.push(format!("Next training: {}", format_coins(training_cost(p, &config))));
            Ok(lines.join("\n"))
        })
        .await
}

pub async fn duel(ctx: &GameContext, attacker: &str, defender: &str) -> GameResult<String> {
    if attacker == defender {
        return Err(GameError::validation("You can't duel yourself."));
    }
    let now = ctx.now();
    let ratio = ctx.config.duel_reward_ratio;
    let ledger = ctx.ledger;
    let (attacker, defender) = (attacker.to_string(), defender.to_string());
    ctx.store
        .transact(move |doc| {
            let (att, def) = doc.pair_mut(&attacker, &defender)?;
            let mut rng = rand::thread_rng();
            let mut atk_power = combat_power(att, &mut rng);
            let def_power = combat_power(def, &mut rng);
            if atk_power == def_power {
                atk_power += rng.gen_range(-1.0..=1.0);
            }
            let reward = ((def.total_assets().max(1) as f64 * ratio) as i64).max(DUEL_REWARD_FLOOR);
            let (att_name, def_name) = (att.nickname.clone(), def.nickname.clone());
            att.touch(now);
            def.touch(now);

            if atk_power > def_power {
                let loot = reward.min(def.balance).max(0);
                def.balance -= loot;
                att.balance += loot;
                ledger.record(doc, &attacker, "duel", loot, Direction::Income, format!("beat {}", def_name), now);
                ledger.record(doc, &defender, "duel", loot, Direction::Expense, format!("lost to {}", att_name), now);
                Ok(format!("{} wins and takes {}!", att_name, format_coins(loot)))
            } else {
                let fine = (reward / 2).min(att.balance).max(0);
                att.balance -= fine;
                def.balance += fine;
                ledger.record(doc, &attacker, "duel", fine, Direction::Expense, format!("lost to {}", def_name), now);
                ledger.record(doc, &defender, "duel", fine, Direction::Income, format!("beat {}", att_name), now);
                Ok(format!("{} holds the line and collects {}!", def_name, format_coins(fine)))
            }
        })
        .await
}
