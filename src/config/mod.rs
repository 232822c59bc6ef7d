//! # Configuration Management Module
//!
//! Loads the TOML configuration that drives every tunable in the game:
//! economy constants, content tables (crops, guards, credit tiers, VIP cards,
//! shop items, lottery rewards), storage location, access policy, automation
//! cadence and logging.
//!
//! ## Configuration Structure
//!
//! - [`GameConfig`] - economy constants and content tables
//! - [`StorageConfig`] - data directory, backup retention, ledger capacity
//! - [`AccessConfig`] - allow/block lists and initial admins
//! - [`AutomationConfig`] - background auto-task cadence
//! - [`LoggingConfig`] - log level and optional log files
//!
//! Every section is `#[serde(default)]`, so a partial file only overrides the
//! keys it names.
//!
//! ```toml
//! [game]
//! starting_balance = 2000
//! work_reward_min = 300
//! work_reward_max = 900
//!
//! [storage]
//! data_dir = "./data"
//! backups_to_keep = 10
//!
//! [access]
//! blocked_users = ["10086"]
//! initial_admins = ["console:root"]
//! ```

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::market::types::Stat;

/// Minimum automation interval, whatever the file says.
pub const MIN_AUTOMATION_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobberyStrategy {
    pub key: String,
    pub label: String,
    pub success_rate: f64,
    pub reward_multiplier: f64,
    pub penalty_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropProfile {
    pub name: String,
    pub emoji: String,
    pub grow_hours: u32,
    pub yield_min: i64,
    pub yield_max: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardProfile {
    pub name: String,
    pub cost: i64,
    pub duration_hours: u32,
    pub protection_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLevel {
    pub level: u32,
    pub upgrade_cost: i64,
    pub deposit_limit: i64,
    pub loan_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VipDefinition {
    pub key: String,
    pub hours: u32,
    pub description: String,
    /// Hour cards accept a custom duration (`N` or `A-B`) at generation time.
    #[serde(default)]
    pub custom_hours: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    pub item_id: String,
    pub name: String,
    pub price: i64,
    pub description: String,
    pub effect_value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_stat: Option<Stat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryReward {
    pub label: String,
    pub min_amount: i64,
    pub max_amount: i64,
    pub weight: f64,
}

/// Economy constants and static content tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub starting_balance: i64,
    pub work_reward_min: i64,
    pub work_reward_max: i64,
    pub work_cooldown_seconds: i64,
    /// Share of a work reward paid to the worker's owner.
    pub tribute_ratio: f64,
    pub rob_cooldown_seconds: i64,
    pub default_rob_strategy: String,
    pub deposit_interest_rate: f64,
    pub interest_cooldown_seconds: i64,
    pub transfer_fee_rate: f64,
    pub loan_repay_rate: f64,
    pub red_packet_fee_rate: f64,
    pub jail_term_seconds: i64,
    pub jail_work_cooldown_seconds: i64,
    pub jail_work_min: i64,
    pub jail_work_max: i64,
    pub training_base_cost: i64,
    pub training_cost_growth: i64,
    pub training_cooldown_seconds: i64,
    pub training_gain_min: u32,
    pub training_gain_max: u32,
    pub duel_reward_ratio: f64,
    pub welfare_interval_seconds: i64,
    pub welfare_base_amount: i64,
    pub welfare_threshold: i64,
    pub welfare_growth: i64,
    pub welfare_max_level: u32,
    pub lottery_cost: i64,
    pub gambling_min_bet: i64,
    pub gambling_max_bet: i64,
    pub auction_reward: i64,
    pub rob_strategies: Vec<RobberyStrategy>,
    pub crops: Vec<CropProfile>,
    pub guards: Vec<GuardProfile>,
    pub credit_levels: Vec<CreditLevel>,
    pub vip_cards: Vec<VipDefinition>,
    pub shop_items: Vec<ShopItem>,
    pub lottery_rewards: Vec<LotteryReward>,
}

impl GameConfig {
    pub fn strategy(&self, key: &str) -> Option<&RobberyStrategy> {
        self.rob_strategies.iter().find(|s| s.key.eq_ignore_ascii_case(key))
    }

    pub fn crop(&self, name: &str) -> Option<&CropProfile> {
        self.crops.iter().find(|c| c.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn guard(&self, name: &str) -> Option<&GuardProfile> {
        self.guards.iter().find(|g| g.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn credit_level(&self, level: u32) -> Option<&CreditLevel> {
        self.credit_levels.iter().find(|c| c.level == level)
    }

    pub fn vip_definition(&self, key: &str) -> Option<&VipDefinition> {
        self.vip_cards.iter().find(|v| v.key.eq_ignore_ascii_case(key))
    }

    pub fn shop_item(&self, item_id: &str) -> Option<&ShopItem> {
        self.shop_items.iter().find(|i| i.item_id.eq_ignore_ascii_case(item_id))
    }

    /// Deposit limit granted to brand new players.
    pub fn base_deposit_limit(&self) -> i64 {
        self.credit_levels.first().map_or(0, |c| c.deposit_limit)
    }

    fn validate(&self) -> Result<()> {
        if self.work_reward_min > self.work_reward_max {
            return Err(anyhow!("game.work_reward_min must not exceed work_reward_max"));
        }
        if self.training_gain_min > self.training_gain_max {
            return Err(anyhow!("game.training_gain_min must not exceed training_gain_max"));
        }
        if self.jail_work_min > self.jail_work_max {
            return Err(anyhow!("game.jail_work_min must not exceed jail_work_max"));
        }
        if self.gambling_min_bet > self.gambling_max_bet {
            return Err(anyhow!("game.gambling_min_bet must not exceed gambling_max_bet"));
        }
        if self.credit_levels.is_empty() {
            return Err(anyhow!("game.credit_levels must contain at least one level"));
        }
        for (idx, level) in self.credit_levels.iter().enumerate() {
            if level.level as usize != idx + 1 {
                return Err(anyhow!(
                    "game.credit_levels must be numbered 1..N in order (found {} at position {})",
                    level.level,
                    idx + 1
                ));
            }
        }
        if self.rob_strategies.is_empty() {
            return Err(anyhow!("game.rob_strategies must not be empty"));
        }
        if self.strategy(&self.default_rob_strategy).is_none() {
            return Err(anyhow!(
                "game.default_rob_strategy '{}' is not a configured strategy",
                self.default_rob_strategy
            ));
        }
        for crop in &self.crops {
            if crop.yield_min > crop.yield_max {
                return Err(anyhow!("crop '{}' has yield_min above yield_max", crop.name));
            }
        }
        for reward in &self.lottery_rewards {
            if reward.min_amount > reward.max_amount || reward.weight < 0.0 {
                return Err(anyhow!("lottery reward '{}' is malformed", reward.label));
            }
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_balance: 2000,
            work_reward_min: 300,
            work_reward_max: 900,
            work_cooldown_seconds: 300,
            tribute_ratio: 0.1,
            rob_cooldown_seconds: 600,
            default_rob_strategy: "balanced".to_string(),
            deposit_interest_rate: 0.015,
            interest_cooldown_seconds: 1800,
            transfer_fee_rate: 0.03,
            loan_repay_rate: 0.05,
            red_packet_fee_rate: 0.05,
            jail_term_seconds: 900,
            jail_work_cooldown_seconds: 300,
            jail_work_min: 120,
            jail_work_max: 360,
            training_base_cost: 800,
            training_cost_growth: 150,
            training_cooldown_seconds: 900,
            training_gain_min: 1,
            training_gain_max: 4,
            duel_reward_ratio: 0.15,
            welfare_interval_seconds: 7200,
            welfare_base_amount: 800,
            welfare_threshold: 15000,
            welfare_growth: 200,
            welfare_max_level: 10,
            lottery_cost: 500,
            gambling_min_bet: 100,
            gambling_max_bet: 5000,
            auction_reward: 5000,
            rob_strategies: vec![
                strategy("steady", "Steady", 0.8, 0.6, 0.4),
                strategy("balanced", "Balanced", 0.6, 1.0, 0.8),
                strategy("risky", "Risky", 0.35, 1.6, 1.2),
            ],
            crops: vec![
                crop("wheat", "🌾", 2, 300, 700),
                crop("watermelon", "🍉", 4, 600, 1100),
                crop("coffee", "☕", 3, 500, 900),
                crop("carrot", "🥕", 2, 250, 600),
            ],
            guards: vec![
                guard("patrol", 400, 6, 0.1),
                guard("elite", 800, 12, 0.25),
                guard("shadow", 1200, 24, 0.4),
            ],
            credit_levels: vec![
                CreditLevel { level: 1, upgrade_cost: 0, deposit_limit: 10_000, loan_limit: 8_000 },
                CreditLevel { level: 2, upgrade_cost: 4_000, deposit_limit: 20_000, loan_limit: 16_000 },
                CreditLevel { level: 3, upgrade_cost: 9_000, deposit_limit: 40_000, loan_limit: 30_000 },
                CreditLevel { level: 4, upgrade_cost: 15_000, deposit_limit: 80_000, loan_limit: 60_000 },
            ],
            vip_cards: vec![
                vip("day", 24, "24 hour VIP", false),
                vip("week", 24 * 7, "7 day VIP", false),
                vip("month", 24 * 30, "30 day VIP", false),
                vip("hour", 1, "Custom hour card", true),
            ],
            shop_items: vec![
                item("str_potion", "Strength Potion", 2400, "Permanent +3 power", 3, Stat::Power),
                item("agi_boots", "Agility Boots", 2200, "Permanent +3 agility", 3, Stat::Agility),
                item("vit_shield", "Vitality Charm", 2600, "Permanent +3 endurance", 3, Stat::Endurance),
            ],
            lottery_rewards: vec![
                reward("Empty handed", 0, 0, 10.0),
                reward("Small prize", 200, 400, 30.0),
                reward("Regular prize", 500, 900, 20.0),
                reward("Big prize", 1200, 2400, 8.0),
                reward("Jackpot", 3000, 5000, 2.0),
            ],
        }
    }
}

fn strategy(key: &str, label: &str, success: f64, reward: f64, penalty: f64) -> RobberyStrategy {
    RobberyStrategy {
        key: key.to_string(),
        label: label.to_string(),
        success_rate: success,
        reward_multiplier: reward,
        penalty_multiplier: penalty,
    }
}

fn crop(name: &str, emoji: &str, grow_hours: u32, yield_min: i64, yield_max: i64) -> CropProfile {
    CropProfile {
        name: name.to_string(),
        emoji: emoji.to_string(),
        grow_hours,
        yield_min,
        yield_max,
    }
}

fn guard(name: &str, cost: i64, duration_hours: u32, protection_bonus: f64) -> GuardProfile {
    GuardProfile { name: name.to_string(), cost, duration_hours, protection_bonus }
}

fn vip(key: &str, hours: u32, description: &str, custom_hours: bool) -> VipDefinition {
    VipDefinition {
        key: key.to_string(),
        hours,
        description: description.to_string(),
        custom_hours,
    }
}

fn item(id: &str, name: &str, price: i64, description: &str, value: u32, stat: Stat) -> ShopItem {
    ShopItem {
        item_id: id.to_string(),
        name: name.to_string(),
        price,
        description: description.to_string(),
        effect_value: value,
        target_stat: Some(stat),
    }
}

fn reward(label: &str, min_amount: i64, max_amount: i64, weight: f64) -> LotteryReward {
    LotteryReward { label: label.to_string(), min_amount, max_amount, weight }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub backups_to_keep: usize,
    pub ledger_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            backups_to_keep: 10,
            ledger_capacity: 30,
        }
    }
}

/// Who may talk to the game. User ids are platform-local sender ids;
/// `initial_admins` are full `platform:user` player ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub allowed_users: Vec<String>,
    pub blocked_users: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub blocked_groups: Vec<String>,
    /// Drop blocked users without a reply instead of telling them.
    pub silent_user_block: bool,
    pub initial_admins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl AutomationConfig {
    /// Effective cycle interval with the minimum floor applied.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(MIN_AUTOMATION_INTERVAL_SECS))
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self { enabled: true, interval_seconds: 600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("oxmarket.log".to_string()),
            security_file: Some("oxmarket-security.log".to_string()),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub game: GameConfig,
    pub storage: StorageConfig,
    pub access: AccessConfig,
    pub automation: AutomationConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config = Self::from_toml(&content)
            .map_err(|e| anyhow!("Failed to load config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.game.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_are_valid() {
        let config = Config::default();
        config.game.validate().unwrap();
        assert_eq!(config.game.starting_balance, 2000);
        assert_eq!(config.game.credit_levels.len(), 4);
        assert_eq!(config.game.base_deposit_limit(), 10_000);
        assert_eq!(config.storage.backups_to_keep, 10);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [game]
            work_reward_min = 300
            work_reward_max = 300

            [access]
            blocked_users = ["42"]
            "#,
        )
        .unwrap();
        assert_eq!(config.game.work_reward_max, 300);
        assert_eq!(config.game.rob_cooldown_seconds, 600);
        assert_eq!(config.access.blocked_users, vec!["42".to_string()]);
        assert!(config.automation.enabled);
    }

    #[test]
    fn test_automation_interval_floor() {
        let cfg = AutomationConfig { enabled: true, interval_seconds: 5 };
        assert_eq!(cfg.interval(), Duration::from_secs(MIN_AUTOMATION_INTERVAL_SECS));
        let cfg = AutomationConfig { enabled: true, interval_seconds: 900 };
        assert_eq!(cfg.interval(), Duration::from_secs(900));
    }

    #[test]
    fn test_invalid_reward_range_rejected() {
        let err = Config::from_toml("[game]\nwork_reward_min = 10\nwork_reward_max = 5\n").unwrap_err();
        assert!(err.to_string().contains("work_reward_min"));
    }

    #[test]
    fn test_default_config_roundtrips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.game.crops.len(), 4);
        assert_eq!(parsed.game.shop_items[0].target_stat, Some(Stat::Power));
        assert_eq!(parsed.game.vip_cards[3].key, "hour");
    }

    #[test]
    fn test_lookups_are_case_insensitive() {
        let game = GameConfig::default();
        assert!(game.strategy("RISKY").is_some());
        assert!(game.crop("Wheat").is_some());
        assert!(game.guard("elite").is_some());
        assert!(game.vip_definition("Week").is_some());
        assert!(game.shop_item("unknown").is_none());
    }
}
