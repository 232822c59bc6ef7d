//! Achievements unlocked by a scan that runs after each successful command.

use log::info;

use super::errors::GameResult;
use super::types::{Player, Stat};
use super::GameContext;

pub struct Achievement {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    check: fn(&Player) -> bool,
}

pub static ACHIEVEMENTS: [Achievement; 3] = [
    Achievement {
        key: "rich",
        name: "Tycoon",
        description: "Hold 100k coins in total assets",
        check: |p| p.total_assets() >= 100_000,
    },
    Achievement {
        key: "collector",
        name: "Collector",
        description: "Own at least 3 players",
        check: |p| p.owned_slaves.len() >= 3,
    },
    Achievement {
        key: "strongman",
        name: "Strongman",
        description: "Reach power 5",
        check: |p| p.stat(Stat::Power) >= 5,
    },
];

/// Names of achievements `player` qualifies for but has not unlocked.
pub fn newly_earned(player: &Player) -> Vec<&'static Achievement> {
    ACHIEVEMENTS
        .iter()
        .filter(|a| !player.achievements.contains(a.key) && (a.check)(player))
        .collect()
}

/// Unlock everything the player now qualifies for. Returns the new names.
pub async fn evaluate(ctx: &GameContext, actor: &str) -> GameResult<Vec<&'static str>> {
    let pending = ctx
        .store
        .read(|doc| doc.players.get(actor).map(|p| newly_earned(p).len()).unwrap_or(0))
        .await;
    if pending == 0 {
        return Ok(Vec::new());
    }
    let now = ctx.now();
    let id = actor.to_string();
    let unlocked = ctx
        .store
        .transact(move |doc| {
            let player = doc.player_mut(&id)?;
            let earned: Vec<&'static str> = newly_earned(player).iter().map(|a| a.key).collect();
            for key in &earned {
                player.achievements.insert((*key).to_string());
            }
            player.touch(now);
            Ok(earned)
        })
        .await?;
    let names: Vec<&'static str> = ACHIEVEMENTS
        .iter()
        .filter(|a| unlocked.contains(&a.key))
        .map(|a| a.name)
        .collect();
    info!("{} unlocked {:?}", actor, names);
    Ok(names)
}

pub async fn progress(ctx: &GameContext, actor: &str) -> GameResult<String> {
    ctx.store
        .read(|doc| {
            let player = doc.player(actor)?;
            let (done, todo): (Vec<&Achievement>, Vec<&Achievement>) =
                ACHIEVEMENTS.iter().partition(|a| player.achievements.contains(a.key));
            let list = |items: &[&Achievement]| {
                if items.is_empty() {
                    "none".to_string()
                } else {
                    items.iter().map(|a| format!("{} ({})", a.name, a.description)).collect::<Vec<_>>().join(", ")
                }
            };
            Ok(format!(
                "=== Achievements ===\nUnlocked: {}\nRemaining: {}",
                list(&done),
                list(&todo)
            ))
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::OwnedSlave;

    #[test]
    fn earned_achievements_are_not_repeated() {
        let mut p = Player { balance: 60_000, bank_balance: 40_000, ..Player::default() };
        let keys: Vec<&str> = newly_earned(&p).iter().map(|a| a.key).collect();
        assert_eq!(keys, vec!["rich"]);
        p.achievements.insert("rich".into());
        assert!(newly_earned(&p).is_empty());
    }

    #[test]
    fn collector_needs_three_holdings() {
        let mut p = Player::default();
        for i in 0..3 {
            let id = format!("qq:{i}");
            p.owned_slaves.insert(
                id.clone(),
                OwnedSlave { user_id: id, nickname: "x".into(), price: 1, loyalty: 0.5 },
            );
        }
        let keys: Vec<&str> = newly_earned(&p).iter().map(|a| a.key).collect();
        assert_eq!(keys, vec!["collector"]);
    }
}
