//! # Market - Game Domain
//!
//! All game rules live here as free async functions that take a
//! [`GameContext`] plus the ids of the players involved. Each operation runs
//! inside one [`StateStore::transact`](crate::storage::StateStore::transact)
//! call: it re-reads every record it touches, validates, mutates and records
//! ledger entries, and either commits everything or nothing.
//!
//! ## Modules
//!
//! - [`economy`] - work, robbery, bank, credit, transfers, loans, red packets
//! - [`trade`] - valuation and ownership (buy, snatch, release, redeem)
//! - [`events`] - the daily auction
//! - [`players`] - registration, lookup, rankings, overviews, admin helpers
//! - [`farm`], [`guard`], [`vip`], [`jail`], [`training`], [`shop`],
//!   [`welfare`], [`lottery`], [`gamble`], [`weather`] - side systems
//! - [`achievement`] - unlock scan run after each command
//! - [`ledger`] - bounded per-player history

pub mod achievement;
pub mod clock;
pub mod currency;
pub mod economy;
pub mod errors;
pub mod events;
pub mod farm;
pub mod gamble;
pub mod guard;
pub mod jail;
pub mod ledger;
pub mod lottery;
pub mod players;
pub mod shop;
pub mod trade;
pub mod training;
pub mod types;
pub mod vip;
pub mod weather;
pub mod welfare;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::GameConfig;
use crate::storage::StateStore;
use clock::{Clock, SystemClock};
use ledger::Ledger;

pub use errors::{GameError, GameResult};

/// Shared handles every operation needs.
#[derive(Clone)]
pub struct GameContext {
    pub store: Arc<StateStore>,
    pub config: Arc<GameConfig>,
    pub clock: Arc<dyn Clock>,
    pub ledger: Ledger,
}

impl GameContext {
    pub fn new(store: Arc<StateStore>, config: GameConfig, ledger: Ledger) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
            ledger,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Seconds left on a cooldown that started at `since`, or `None` when it has elapsed.
pub(crate) fn cooldown_remaining(
    since: Option<DateTime<Utc>>,
    cooldown_secs: i64,
    now: DateTime<Utc>,
) -> Option<i64> {
    let since = since?;
    let elapsed = (now - since).num_seconds();
    if elapsed < cooldown_secs {
        Some(cooldown_secs - elapsed)
    } else {
        None
    }
}

/// Uniform integer in `[lo, hi]`, tolerating a collapsed or inverted range.
pub(crate) fn roll_between<R: rand::Rng>(rng: &mut R, lo: i64, hi: i64) -> i64 {
    if hi <= lo {
        lo
    } else {
        rng.gen_range(lo..=hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn cooldown_remaining_counts_down() {
        let now = Utc::now();
        assert_eq!(cooldown_remaining(None, 300, now), None);
        assert_eq!(cooldown_remaining(Some(now - Duration::seconds(100)), 300, now), Some(200));
        assert_eq!(cooldown_remaining(Some(now - Duration::seconds(300)), 300, now), None);
    }

    #[test]
    fn roll_between_handles_degenerate_ranges() {
        let mut rng = rand::thread_rng();
        assert_eq!(roll_between(&mut rng, 300, 300), 300);
        assert_eq!(roll_between(&mut rng, 5, 1), 5);
        let v = roll_between(&mut rng, 1, 3);
        assert!((1..=3).contains(&v));
    }
}
