//! Static command table: alias → [`CommandKind`].
//!
//! Every inbound line is split on whitespace; the first token is looked up
//! case-insensitively and the rest become untyped arguments. Text whose first
//! token is not an alias is not a command at all and gets no reply.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Help,
    Info,
    Profile,
    ResetSelf,
    Work,
    Rob,
    Deposit,
    Withdraw,
    Interest,
    Bank,
    CreditUpgrade,
    Transfer,
    Loan,
    Repay,
    RedPacket,
    Grab,
    Market,
    Owned,
    Status,
    Buy,
    Snatch,
    Release,
    Redeem,
    Event,
    Bid,
    Plant,
    Crop,
    Harvest,
    Guards,
    Hire,
    GuardStatus,
    VipGenerate,
    VipRedeem,
    VipStatus,
    AutoTask,
    JailWork,
    JailStatus,
    Bail,
    Inmates,
    Train,
    Stats,
    Duel,
    Shop,
    ShopBuy,
    UseItem,
    Inventory,
    Welfare,
    ClaimWelfare,
    Lottery,
    CoinToss,
    Dice,
    Weather,
    Achievements,
    WealthRanking,
    ValueRanking,
    OwnerRanking,
    PlayerStats,
    EconomyOverview,
    SystemOverview,
    TaxPool,
    Search,
    SetTitle,
    SetSignature,
    Statement,
    Sponsor,
    AddAdmin,
    RemoveAdmin,
    Admins,
    ResetPlayer,
    Backup,
    Backups,
    Restore,
    Wipe,
    Disable,
    Enable,
}

impl CommandKind {
    pub const ALL: [CommandKind; 75] = [
        CommandKind::Help,
        CommandKind::Info,
        CommandKind::Profile,
        CommandKind::ResetSelf,
        CommandKind::Work,
        CommandKind::Rob,
        CommandKind::Deposit,
        CommandKind::Withdraw,
        CommandKind::Interest,
        CommandKind::Bank,
        CommandKind::CreditUpgrade,
        CommandKind::Transfer,
        CommandKind::Loan,
        CommandKind::Repay,
        CommandKind::RedPacket,
        CommandKind::Grab,
        CommandKind::Market,
        CommandKind::Owned,
        CommandKind::Status,
        CommandKind::Buy,
        CommandKind::Snatch,
        CommandKind::Release,
        CommandKind::Redeem,
        CommandKind::Event,
        CommandKind::Bid,
        CommandKind::Plant,
        CommandKind::Crop,
        CommandKind::Harvest,
        CommandKind::Guards,
        CommandKind::Hire,
        CommandKind::GuardStatus,
        CommandKind::VipGenerate,
        CommandKind::VipRedeem,
        CommandKind::VipStatus,
        CommandKind::AutoTask,
        CommandKind::JailWork,
        CommandKind::JailStatus,
        CommandKind::Bail,
        CommandKind::Inmates,
        CommandKind::Train,
        CommandKind::Stats,
        CommandKind::Duel,
        CommandKind::Shop,
        CommandKind::ShopBuy,
        CommandKind::UseItem,
        CommandKind::Inventory,
        CommandKind::Welfare,
        CommandKind::ClaimWelfare,
        CommandKind::Lottery,
        CommandKind::CoinToss,
        CommandKind::Dice,
        CommandKind::Weather,
        CommandKind::Achievements,
        CommandKind::WealthRanking,
        CommandKind::ValueRanking,
        CommandKind::OwnerRanking,
        CommandKind::PlayerStats,
        CommandKind::EconomyOverview,
        CommandKind::SystemOverview,
        CommandKind::TaxPool,
        CommandKind::Search,
        CommandKind::SetTitle,
        CommandKind::SetSignature,
        CommandKind::Statement,
        CommandKind::Sponsor,
        CommandKind::AddAdmin,
        CommandKind::RemoveAdmin,
        CommandKind::Admins,
        CommandKind::ResetPlayer,
        CommandKind::Backup,
        CommandKind::Backups,
        CommandKind::Restore,
        CommandKind::Wipe,
        CommandKind::Disable,
        CommandKind::Enable,
    ];

    /// Runs even while the game is disabled for non-admins.
    pub fn bypasses_maintenance(self) -> bool {
        matches!(self, CommandKind::Enable)
    }
}

/// Alias table. Names are matched lowercase.
pub const ALIASES: &[(&str, CommandKind)] = &[
    ("help", CommandKind::Help),
    ("menu", CommandKind::Help),
    ("me", CommandKind::Info),
    ("info", CommandKind::Info),
    ("profile", CommandKind::Profile),
    ("reset", CommandKind::ResetSelf),
    ("work", CommandKind::Work),
    ("rob", CommandKind::Rob),
    ("deposit", CommandKind::Deposit),
    ("withdraw", CommandKind::Withdraw),
    ("interest", CommandKind::Interest),
    ("bank", CommandKind::Bank),
    ("upgrade-credit", CommandKind::CreditUpgrade),
    ("credit", CommandKind::CreditUpgrade),
    ("transfer", CommandKind::Transfer),
    ("pay", CommandKind::Transfer),
    ("loan", CommandKind::Loan),
    ("repay", CommandKind::Repay),
    ("red-packet", CommandKind::RedPacket),
    ("packet", CommandKind::RedPacket),
    ("grab", CommandKind::Grab),
    ("market", CommandKind::Market),
    ("owned", CommandKind::Owned),
    ("status", CommandKind::Status),
    ("buy", CommandKind::Buy),
    ("snatch", CommandKind::Snatch),
    ("release", CommandKind::Release),
    ("redeem", CommandKind::Redeem),
    ("event", CommandKind::Event),
    ("bid", CommandKind::Bid),
    ("plant", CommandKind::Plant),
    ("crop", CommandKind::Crop),
    ("harvest", CommandKind::Harvest),
    ("guards", CommandKind::Guards),
    ("hire", CommandKind::Hire),
    ("guard", CommandKind::GuardStatus),
    ("vip-generate", CommandKind::VipGenerate),
    ("vip-redeem", CommandKind::VipRedeem),
    ("vip", CommandKind::VipStatus),
    ("auto", CommandKind::AutoTask),
    ("sew", CommandKind::JailWork),
    ("jail", CommandKind::JailStatus),
    ("bail", CommandKind::Bail),
    ("inmates", CommandKind::Inmates),
    ("train", CommandKind::Train),
    ("stats", CommandKind::Stats),
    ("duel", CommandKind::Duel),
    ("shop", CommandKind::Shop),
    ("shop-buy", CommandKind::ShopBuy),
    ("use", CommandKind::UseItem),
    ("inventory", CommandKind::Inventory),
    ("bag", CommandKind::Inventory),
    ("welfare", CommandKind::Welfare),
    ("claim-welfare", CommandKind::ClaimWelfare),
    ("lottery", CommandKind::Lottery),
    ("coin", CommandKind::CoinToss),
    ("dice", CommandKind::Dice),
    ("weather", CommandKind::Weather),
    ("achievements", CommandKind::Achievements),
    ("rich-list", CommandKind::WealthRanking),
    ("value-list", CommandKind::ValueRanking),
    ("owner-list", CommandKind::OwnerRanking),
    ("player-stats", CommandKind::PlayerStats),
    ("economy", CommandKind::EconomyOverview),
    ("system", CommandKind::SystemOverview),
    ("tax-pool", CommandKind::TaxPool),
    ("search", CommandKind::Search),
    ("title", CommandKind::SetTitle),
    ("signature", CommandKind::SetSignature),
    ("statement", CommandKind::Statement),
    ("history", CommandKind::Statement),
    ("sponsor", CommandKind::Sponsor),
    ("add-admin", CommandKind::AddAdmin),
    ("remove-admin", CommandKind::RemoveAdmin),
    ("admins", CommandKind::Admins),
    ("reset-player", CommandKind::ResetPlayer),
    ("backup", CommandKind::Backup),
    ("backups", CommandKind::Backups),
    ("restore", CommandKind::Restore),
    ("wipe", CommandKind::Wipe),
    ("disable", CommandKind::Disable),
    ("enable", CommandKind::Enable),
];

/// A recognised command with its raw argument tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CommandTable {
    by_alias: HashMap<String, CommandKind>,
}

impl CommandTable {
    /// Build from [`ALIASES`], refusing duplicate aliases and kinds nobody can reach.
    pub fn new() -> Result<Self> {
        Self::from_aliases(ALIASES)
    }

    pub fn from_aliases(aliases: &[(&str, CommandKind)]) -> Result<Self> {
        let mut by_alias = HashMap::with_capacity(aliases.len());
        for (alias, kind) in aliases {
            let key = alias.trim().to_lowercase();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(anyhow!("invalid command alias '{}'", alias));
            }
            if let Some(existing) = by_alias.insert(key, *kind) {
                return Err(anyhow!(
                    "command alias '{}' registered twice ({:?} and {:?})",
                    alias,
                    existing,
                    kind
                ));
            }
        }
        let missing: Vec<CommandKind> = CommandKind::ALL
            .iter()
            .copied()
            .filter(|kind| !by_alias.values().any(|k| k == kind))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!("commands without an alias: {:?}", missing));
        }
        Ok(Self { by_alias })
    }

    pub fn len(&self) -> usize {
        self.by_alias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_alias.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<CommandKind> {
        self.by_alias.get(&name.to_lowercase()).copied()
    }

    /// Recognise `text` as a command, or `None` when it is ordinary chat.
    pub fn parse(&self, text: &str) -> Option<ParsedCommand> {
        let mut tokens = text.split_whitespace();
        let name = tokens.next()?;
        let kind = self.lookup(name)?;
        Some(ParsedCommand {
            kind,
            name: name.to_lowercase(),
            args: tokens.map(str::to_string).collect(),
        })
    }

    /// Aliases sorted alphabetically, for the help text.
    pub fn aliases(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_alias.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_table_is_valid() {
        let table = CommandTable::new().unwrap();
        assert_eq!(table.len(), ALIASES.len());
        assert!(table.len() >= 75);
    }

    #[test]
    fn parse_is_case_insensitive_and_splits_arguments() {
        let table = CommandTable::new().unwrap();
        let cmd = table.parse("  ROB   bob  risky ").unwrap();
        assert_eq!(cmd.kind, CommandKind::Rob);
        assert_eq!(cmd.name, "rob");
        assert_eq!(cmd.args, vec!["bob".to_string(), "risky".to_string()]);
        assert!(table.parse("hello everyone").is_none());
        assert!(table.parse("   ").is_none());
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let err = CommandTable::from_aliases(&[("work", CommandKind::Work), ("WORK", CommandKind::Rob)]).unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }

    #[test]
    fn unreachable_kind_is_rejected() {
        let err = CommandTable::from_aliases(&[("work", CommandKind::Work)]).unwrap_err();
        assert!(err.to_string().contains("without an alias"));
    }

    #[test]
    fn every_kind_listed_once() {
        let mut seen = std::collections::HashSet::new();
        for kind in CommandKind::ALL {
            assert!(seen.insert(kind), "{kind:?} listed twice");
        }
    }
}
