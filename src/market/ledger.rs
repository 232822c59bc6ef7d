//! Per-player bounded transaction history.

use chrono::{DateTime, Utc};

use super::types::{Direction, GameState, LedgerEntry};
use crate::storage::StateStore;

pub const DEFAULT_CAPACITY: usize = 30;

#[derive(Debug, Clone, Copy)]
pub struct Ledger {
    capacity: usize,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Ledger {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append one entry inside an open transaction. Call it after the
    /// player's balances have been updated so the entry shows the result.
    pub fn record(
        &self,
        doc: &mut GameState,
        player_id: &str,
        category: &str,
        amount: i64,
        direction: Direction,
        description: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        let (balance, bank_balance) = doc
            .players
            .get(player_id)
            .map_or((0, 0), |p| (p.balance, p.bank_balance));
        let entries = doc.transactions.entry(player_id.to_string()).or_default();
        entries.push_back(LedgerEntry {
            ts: now,
            category: category.to_string(),
            amount,
            direction,
            description: description.into(),
            balance,
            bank_balance,
        });
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Most recent `limit` entries, newest first.
    pub async fn history(&self, store: &StateStore, player_id: &str, limit: usize) -> Vec<LedgerEntry> {
        store
            .read(|doc| {
                doc.transactions
                    .get(player_id)
                    .map(|entries| entries.iter().rev().take(limit).cloned().collect())
                    .unwrap_or_default()
            })
            .await
    }
}
