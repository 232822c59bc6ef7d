//! High risk games. The bet leaves the player's balance before the roll.

use rand::Rng;

use super::currency::format_coins;
use super::errors::{GameError, GameResult};
use super::types::Direction;
use super::GameContext;
use crate::config::GameConfig;

const COIN_LOSS_THRESHOLD: f64 = 0.55;
const DICE_PAYOUT: f64 = 2.5;

fn check_bet(amount: i64, config: &GameConfig) -> GameResult<i64> {
    if amount < config.gambling_min_bet {
        return Err(GameError::validation(format!("Minimum bet is {}", config.gambling_min_bet)));
    }
    if amount > config.gambling_max_bet {
        return Err(GameError::validation(format!("Maximum bet is {}", config.gambling_max_bet)));
    }
    Ok(amount)
}

/// Run one bet: deduct, let `play` decide the payout (0 on a loss), record.
async fn wager<F>(ctx: &GameContext, actor: &str, amount: i64, game: &'static str, play: F) -> GameResult<String>
where
    F: FnOnce(i64) -> (i64, String) + Send,
{
    let amount = check_bet(amount, &ctx.config)?;
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if player.balance < amount {
                return Err(GameError::precondition("Insufficient balance."));
            }
            let (payout, message) = play(amount);
            player.balance += payout - amount;
            player.touch(now);
            if payout > 0 {
                ledger.record(doc, &actor, "gamble", payout, Direction::Income, format!("{} win", game), now);
            } else {
                ledger.record(doc, &actor, "gamble", amount, Direction::Expense, format!("{} loss", game), now);
            }
            Ok(message)
        })
        .await
}

pub async fn coin_toss(ctx: &GameContext, actor: &str, amount: i64) -> GameResult<String> {
    wager(ctx, actor, amount, "coin toss", |bet| {
        if rand::thread_rng().gen::<f64>() > COIN_LOSS_THRESHOLD {
            let reward = bet * 2;
            (reward, format!("You win {}", format_coins(reward)))
        } else {
            (0, "Bad luck, the bet is lost.".to_string())
        }
    })
    .await
}

pub async fn dice(ctx: &GameContext, actor: &str, amount: i64) -> GameResult<String> {
    wager(ctx, actor, amount, "dice", |bet| {
        let mut rng = rand::thread_rng();
        let (mine, dealer) = (rng.gen_range(1..=6), rng.gen_range(1..=6));
        if mine >= dealer {
            let reward = (bet as f64 * DICE_PAYOUT) as i64;
            (reward, format!("You rolled {} against the dealer's {}, winning {}", mine, dealer, format_coins(reward)))
        } else {
            (0, format!("You rolled {} against the dealer's {}, the bet is lost.", mine, dealer))
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bets_are_bounded() {
        let config = GameConfig::default();
        assert!(check_bet(99, &config).is_err());
        assert_eq!(check_bet(100, &config).unwrap(), 100);
        assert_eq!(check_bet(5000, &config).unwrap(), 5000);
        assert!(check_bet(5001, &config).is_err());
    }
}
