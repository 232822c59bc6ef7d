//! Persisted data model for the game document.
//!
//! Everything here is plain serde data. Ordered maps are used throughout so
//! that serializing, reloading and serializing again yields identical output.
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{GameError, GameResult};

/// Stable composite key `platform:user_id`.
pub type PlayerId = String;

pub const DEFAULT_TITLE: &str = "Citizen";
pub const DEFAULT_SIGNATURE: &str = "Loves life";

pub fn player_id(platform: &str, user_id: &str) -> PlayerId {
    format!("{}:{}", platform, user_id)
}

// ============================================================================
// Enumerations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Power,
    Endurance,
    Agility,
}

impl Stat {
    pub const ALL: [Stat; 3] = [Stat::Power, Stat::Endurance, Stat::Agility];

    pub fn label(self) -> &'static str {
        match self {
            Stat::Power => "power",
            Stat::Endurance => "endurance",
            Stat::Agility => "agility",
        }
    }

    pub fn parse(text: &str) -> Option<Stat> {
        match text.trim().to_lowercase().as_str() {
            "power" | "str" | "strength" => Some(Stat::Power),
            "endurance" | "vit" | "stamina" => Some(Stat::Endurance),
            "agility" | "agi" | "dex" => Some(Stat::Agility),
            _ => None,
        }
    }
}

/// Recurring action the scheduler can run for a VIP. Declaration order is
/// the execution order within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoTask {
    Work,
    Harvest,
    Deposit,
}

impl AutoTask {
    pub const ALL: [AutoTask; 3] = [AutoTask::Work, AutoTask::Harvest, AutoTask::Deposit];

    pub fn label(self) -> &'static str {
        match self {
            AutoTask::Work => "work",
            AutoTask::Harvest => "harvest",
            AutoTask::Deposit => "deposit",
        }
    }

    pub fn parse(text: &str) -> Option<AutoTask> {
        match text.trim().to_lowercase().as_str() {
            "work" => Some(AutoTask::Work),
            "harvest" => Some(AutoTask::Harvest),
            "deposit" => Some(AutoTask::Deposit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Income,
    Expense,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Income => "in",
            Direction::Expense => "out",
        }
    }
}

// ============================================================================
// Player and nested records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedSlave {
    pub user_id: PlayerId,
    pub nickname: String,
    /// Price recorded at acquisition; refunded if someone else takes over.
    pub price: i64,
    #[serde(default = "default_loyalty")]
    pub loyalty: f64,
}

fn default_loyalty() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropPlot {
    pub crop_name: String,
    pub emoji: String,
    pub planted_at: DateTime<Utc>,
    pub grow_hours: u32,
    pub yield_min: i64,
    pub yield_max: i64,
}

impl CropPlot {
    pub fn ready_at(&self) -> DateTime<Utc> {
        self.planted_at + chrono::Duration::hours(i64::from(self.grow_hours))
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        now >= self.ready_at()
    }

    pub fn progress_percent(&self, now: DateTime<Utc>) -> u32 {
        let elapsed = (now - self.planted_at).num_seconds().max(0);
        let total = (i64::from(self.grow_hours) * 3600).max(1);
        ((elapsed * 100) / total).min(100) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardContract {
    pub name: String,
    pub expires_at: DateTime<Utc>,
    pub protection_bonus: f64,
}

impl GuardContract {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub amount: i64,
    pub rate: f64,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub repaid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JailState {
    pub until: Option<DateTime<Utc>>,
    pub cooldown_end: Option<DateTime<Utc>>,
    /// Accumulated prison labour earnings.
    pub coin: i64,
    pub reason: String,
}

impl JailState {
    pub fn is_jailed(&self, now: DateTime<Utc>) -> bool {
        self.until.map_or(false, |until| until > now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub player_id: PlayerId,
    pub platform: String,
    pub user_id: String,
    pub nickname: String,
    pub group_id: Option<String>,
    pub balance: i64,
    pub bank_balance: i64,
    pub credit_level: u32,
    pub deposit_limit: i64,
    pub interest_ready_at: Option<DateTime<Utc>>,
    pub owner_id: Option<PlayerId>,
    pub owned_slaves: BTreeMap<PlayerId, OwnedSlave>,
    pub last_work_time: Option<DateTime<Utc>>,
    pub last_rob_time: Option<DateTime<Utc>>,
    pub last_training_time: Option<DateTime<Utc>>,
    pub last_welfare_time: Option<DateTime<Utc>>,
    pub last_auto_task: Option<DateTime<Utc>>,
    pub farmland: Option<CropPlot>,
    pub guard: Option<GuardContract>,
    pub loan: Option<Loan>,
    pub jail: JailState,
    pub vip_until: Option<DateTime<Utc>>,
    pub auto_tasks: BTreeMap<AutoTask, bool>,
    pub stats: BTreeMap<Stat, u32>,
    pub inventory: BTreeMap<String, u32>,
    pub achievements: BTreeSet<String>,
    pub welfare_level: u32,
    pub welfare_income: i64,
    pub title: String,
    pub signature: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            player_id: String::new(),
            platform: String::new(),
            user_id: String::new(),
            nickname: String::new(),
            group_id: None,
            balance: 0,
            bank_balance: 0,
            credit_level: 1,
            deposit_limit: 0,
            interest_ready_at: None,
            owner_id: None,
            owned_slaves: BTreeMap::new(),
            last_work_time: None,
            last_rob_time: None,
            last_training_time: None,
            last_welfare_time: None,
            last_auto_task: None,
            farmland: None,
            guard: None,
            loan: None,
            jail: JailState::default(),
            vip_until: None,
            auto_tasks: AutoTask::ALL.iter().map(|t| (*t, false)).collect(),
            stats: BTreeMap::new(),
            inventory: BTreeMap::new(),
            achievements: BTreeSet::new(),
            welfare_level: 0,
            welfare_income: 0,
            title: DEFAULT_TITLE.to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
            created_at: None,
            updated_at: None,
        }
    }
}

impl Player {
    pub fn total_assets(&self) -> i64 {
        self.balance + self.bank_balance
    }

    pub fn is_vip(&self, now: DateTime<Utc>) -> bool {
        self.vip_until.map_or(false, |until| until > now)
    }

    /// The loan that still has to be repaid, if any.
    pub fn live_loan(&self) -> Option<&Loan> {
        self.loan.as_ref().filter(|loan| !loan.repaid)
    }

    pub fn active_guard(&self, now: DateTime<Utc>) -> Option<&GuardContract> {
        self.guard.as_ref().filter(|guard| guard.is_active(now))
    }

    pub fn stat(&self, stat: Stat) -> u32 {
        self.stats.get(&stat).copied().unwrap_or(0)
    }

    pub fn any_auto_task(&self) -> bool {
        self.auto_tasks.values().any(|enabled| *enabled)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
    }
}

// ============================================================================
// System records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipCard {
    pub code: String,
    pub card_type: String,
    pub hours: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub redeemed_by: Option<PlayerId>,
    #[serde(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl VipCard {
    pub fn is_redeemed(&self) -> bool {
        self.redeemed_by.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedPacket {
    pub packet_id: String,
    pub sender_id: PlayerId,
    pub total_amount: i64,
    pub parts: u32,
    pub created_at: DateTime<Utc>,
    /// Fee actually charged to the sender at creation.
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub claimed_amount: i64,
    #[serde(default)]
    pub claimed_by: BTreeMap<PlayerId, i64>,
}

impl RedPacket {
    pub fn is_finished(&self) -> bool {
        self.claimed_by.len() >= self.parts as usize || self.claimed_amount >= self.total_amount
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxPool {
    pub amount: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Daily auction state. `day` is the UTC calendar day the auction belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventState {
    pub day: NaiveDate,
    pub name: String,
    pub title: String,
    pub description: String,
    pub reward: i64,
    #[serde(default)]
    pub top_bid: i64,
    #[serde(default)]
    pub top_player: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ts: DateTime<Utc>,
    pub category: String,
    pub amount: i64,
    pub direction: Direction,
    pub description: String,
    pub balance: i64,
    pub bank_balance: i64,
}

// ============================================================================
// The document
// ============================================================================

/// The single canonical document owned by the state store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub players: BTreeMap<PlayerId, Player>,
    pub vip_cards: Vec<VipCard>,
    pub red_packets: BTreeMap<String, RedPacket>,
    pub admins: BTreeSet<PlayerId>,
    pub transactions: BTreeMap<PlayerId, VecDeque<LedgerEntry>>,
    pub system_balance: i64,
    pub tax_pool: TaxPool,
    pub disabled: bool,
    pub event_state: Option<EventState>,
}

impl GameState {
    pub fn player(&self, id: &str) -> GameResult<&Player> {
        self.players
            .get(id)
            .ok_or_else(|| GameError::not_found("Target player not found."))
    }

    pub fn player_mut(&mut self, id: &str) -> GameResult<&mut Player> {
        self.players
            .get_mut(id)
            .ok_or_else(|| GameError::not_found("Target player not found."))
    }

    pub fn is_admin(&self, id: &str) -> bool {
        self.admins.contains(id)
    }

    pub fn adjust_system_balance(&mut self, amount: i64) {
        self.system_balance += amount;
    }

    /// Adds to the tax pool, never letting it drop below zero.
    pub fn adjust_tax_pool(&mut self, amount: i64, now: DateTime<Utc>) {
        self.tax_pool.amount = (self.tax_pool.amount + amount).max(0);
        self.tax_pool.updated_at = Some(now);
    }

    /// Mutable access to two distinct players at once.
    pub fn pair_mut(&mut self, a: &str, b: &str) -> GameResult<(&mut Player, &mut Player)> {
        if a == b {
            return Err(GameError::Internal(format!("pair_mut called with the same id {}", a)));
        }
        let mut first = None;
        let mut second = None;
        for (id, player) in self.players.iter_mut() {
            if id == a {
                first = Some(player);
            } else if id == b {
                second = Some(player);
            }
        }
        match (first, second) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(GameError::not_found("Target player not found.")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_fields_default_on_load() {
        let json = r#"{"players":{"qq:1":{"player_id":"qq:1","nickname":"ann","balance":50}}}"#;
        let state: GameState = serde_json::from_str(json).unwrap();
        let p = state.player("qq:1").unwrap();
        assert_eq!(p.balance, 50);
        assert_eq!(p.credit_level, 1);
        assert_eq!(p.title, DEFAULT_TITLE);
        assert_eq!(p.auto_tasks.len(), 3);
        assert!(state.vip_cards.is_empty());
        assert!(!state.disabled);
    }

    #[test]
    fn tax_pool_never_goes_negative() {
        let mut state = GameState::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        state.adjust_tax_pool(30, now);
        state.adjust_tax_pool(-100, now);
        assert_eq!(state.tax_pool.amount, 0);
        assert_eq!(state.tax_pool.updated_at, Some(now));
    }

    #[test]
    fn red_packet_finishes_on_either_bound() {
        let now = Utc::now();
        let mut packet = RedPacket {
            packet_id: "p".into(),
            sender_id: "qq:1".into(),
            total_amount: 10,
            parts: 2,
            created_at: now,
            fee: 0,
            claimed_amount: 0,
            claimed_by: BTreeMap::new(),
        };
        assert!(!packet.is_finished());
        packet.claimed_amount = 10;
        assert!(packet.is_finished());
        packet.claimed_amount = 1;
        packet.claimed_by.insert("a".into(), 1);
        packet.claimed_by.insert("b".into(), 0);
        assert!(packet.is_finished());
    }

    #[test]
    fn pair_mut_returns_both_players() {
        let mut state = GameState::default();
        for id in ["qq:a", "qq:b"] {
            state.players.insert(
                id.to_string(),
                Player { player_id: id.to_string(), ..Player::default() },
            );
        }
        let (a, b) = state.pair_mut("qq:b", "qq:a").unwrap();
        a.balance = 1;
        b.balance = 2;
        assert_eq!(state.players["qq:b"].balance, 1);
        assert_eq!(state.players["qq:a"].balance, 2);
        assert!(state.pair_mut("qq:a", "qq:a").is_err());
    }
}
