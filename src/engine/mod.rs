//! # Engine - Command Dispatch
//!
//! The [`Engine`] is the single entry point for chat adapters. Each inbound
//! line goes through the same pipeline:
//!
//! 1. **Recognise**: the first token is looked up in the [`CommandTable`];
//!    ordinary chat gets no reply.
//! 2. **Access**: the [`AccessPolicy`] allow/block lists run first.
//! 3. **Maintenance**: while the game is disabled only admins get through,
//!    apart from the command that re-enables it.
//! 4. **Resolve**: the sender's player record is fetched or created.
//! 5. **Handle**: an exhaustive `match` over [`CommandKind`] calls into
//!    [`crate::market`].
//! 6. **Reply**: domain errors become their own text, anything else is logged
//!    and answered with [`GENERIC_FAILURE`]. Newly unlocked achievements are
//!    appended to successful replies.
//!
//! The background [`automation`] scheduler shares the same [`GameContext`].

pub mod access;
pub mod automation;
pub mod commands;

use log::{debug, error, warn};

use crate::config::AccessConfig;
use crate::logutil::{command_preview, escape_log, mask_code};
use crate::market::currency::{format_coins, parse_amount, require_amount};
use crate::market::errors::{GameError, GameResult};
use crate::market::players::{self, Ranking, Sender};
use crate::market::types::PlayerId;
use crate::market::weather::WeatherService;
use crate::market::{
    achievement, economy, events, farm, gamble, guard, jail, lottery, shop, trade, training, vip, welfare,
    GameContext,
};
use access::{AccessDecision, AccessPolicy};
use commands::{CommandKind, CommandTable, ParsedCommand};

pub const GENERIC_FAILURE: &str = "Execution failed.";
pub const MAINTENANCE_MESSAGE: &str = "The game is under maintenance, please try again later.";

const STATEMENT_DEFAULT: usize = 10;
const STATEMENT_MAX: usize = 30;
const RANKING_SIZE: usize = 10;
const SEARCH_LIMIT: usize = 5;

const SPONSOR_TEXT: &str = "=== Sponsor ===\n\
Sponsors receive a VIP card from an admin.\n\
VIP perks: automatic work, harvest and deposit every cycle, a 20% valuation bonus.\n\
Ask an admin for a card, then use: vip-redeem <code>";

macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

/// One message from a chat platform.
#[derive(Debug, Clone, Default)]
pub struct Inbound {
    pub platform: String,
    pub user_id: String,
    pub nickname: Option<String>,
    pub group_id: Option<String>,
    pub text: String,
    /// User ids mentioned in the message, in order.
    pub mentions: Vec<String>,
}

impl Inbound {
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            user_id: user_id.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_mention(mut self, user_id: impl Into<String>) -> Self {
        self.mentions.push(user_id.into());
        self
    }

    fn sender(&self) -> Sender {
        Sender {
            platform: self.platform.clone(),
            user_id: self.user_id.clone(),
            nickname: self.nickname.clone(),
            group_id: self.group_id.clone(),
        }
    }
}

/// Arguments of one command after the sender has been resolved.
struct Call<'a> {
    actor: &'a str,
    platform: &'a str,
    mention: Option<&'a str>,
    args: &'a [String],
}

impl<'a> Call<'a> {
    fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.get(index).map(String::as_str)
    }

    fn required(&self, index: usize, what: &str) -> GameResult<&'a str> {
        self.arg(index).ok_or_else(|| GameError::validation(format!("Missing {}.", what)))
    }

    /// Whether the command names somebody other than the sender.
    fn has_target(&self) -> bool {
        self.mention.is_some() || !self.args.is_empty()
    }

    /// Keyword used for the target: a mention replaces it.
    fn target_keyword(&self) -> Option<&'a str> {
        if self.mention.is_some() {
            None
        } else {
            self.arg(0)
        }
    }

    /// Arguments that follow the target.
    fn after_target(&self) -> &'a [String] {
        if self.mention.is_some() || self.args.is_empty() {
            self.args
        } else {
            &self.args[1..]
        }
    }
}

pub struct Engine {
    ctx: GameContext,
    table: CommandTable,
    access: AccessPolicy,
    weather: WeatherService,
    initial_admins: Vec<String>,
}

impl Engine {
    pub fn new(ctx: GameContext, access: &AccessConfig) -> anyhow::Result<Self> {
        Ok(Self {
            ctx,
            table: CommandTable::new()?,
            access: AccessPolicy::new(access),
            weather: WeatherService::default(),
            initial_admins: access.initial_admins.clone(),
        })
    }

    pub fn context(&self) -> &GameContext {
        &self.ctx
    }

    pub fn commands(&self) -> &CommandTable {
        &self.table
    }

    /// Put the configured admins into the admin set.
    pub async fn seed_admins(&self) -> GameResult<usize> {
        players::seed_admins(&self.ctx, &self.initial_admins).await
    }

    /// Handle one inbound message. `None` means stay silent.
    pub async fn dispatch(&self, msg: &Inbound) -> Option<String> {
        let command = self.table.parse(&msg.text)?;
        let preview = if command.kind == CommandKind::VipRedeem {
            let masked: Vec<String> = command.args.iter().map(|a| mask_code(a)).collect();
            command_preview(&command.name, &masked)
        } else {
            command_preview(&command.name, &command.args)
        };
        let sender = msg.sender();
        let actor = sender.player_id();

        if let AccessDecision::Deny(reply) = self.access.check(&msg.user_id, msg.group_id.as_deref()) {
            sec_log!(
                "denied '{}' from {} in group {}",
                preview,
                actor,
                escape_log(msg.group_id.as_deref().unwrap_or("-"))
            );
            return reply.map(str::to_string);
        }

        if !command.kind.bypasses_maintenance()
            && self.ctx.store.is_disabled().await
            && !self.ctx.store.is_admin(&actor).await
        {
            debug!("maintenance: ignored '{}' from {}", preview, actor);
            return Some(MAINTENANCE_MESSAGE.to_string());
        }

        debug!("command '{}' from {}", preview, actor);
        let outcome = match players::ensure_player(&self.ctx, &sender).await {
            Ok(_) => self.handle(&command, msg, &actor).await,
            Err(e) => Err(e),
        };

        Some(match outcome {
            Ok(text) => self.with_achievements(text, &actor).await,
            Err(e) if e.is_user_facing() => e.to_string(),
            Err(e) => {
                error!("command '{}' from {} failed: {}", preview, actor, e);
                GENERIC_FAILURE.to_string()
            }
        })
    }

    async fn with_achievements(&self, mut text: String, actor: &str) -> String {
        match achievement::evaluate(&self.ctx, actor).await {
            Ok(names) => {
                for name in names {
                    text.push_str(&format!("\nAchievement unlocked: {}", name));
                }
            }
            Err(e) => warn!("achievement scan for {} failed: {}", actor, e),
        }
        text
    }

    async fn target(&self, call: &Call<'_>) -> GameResult<PlayerId> {
        self.ctx
            .store
            .read(|doc| players::resolve_target(doc, call.platform, call.mention, call.target_keyword()))
            .await
    }

    async fn handle(&self, command: &ParsedCommand, msg: &Inbound, actor: &str) -> GameResult<String> {
        let call = Call {
            actor,
            platform: &msg.platform,
            mention: msg.mentions.first().map(String::as_str),
            args: &command.args,
        };
        let ctx = &self.ctx;
        match command.kind {
            CommandKind::Help => Ok(self.help_text()),
            CommandKind::Info => players::info(ctx, actor).await,
            CommandKind::Profile => players::profile(ctx, actor).await,
            CommandKind::ResetSelf => players::reset_player(ctx, actor).await,

            CommandKind::Work => economy::work(ctx, actor).await,
            CommandKind::Rob => {
                let victim = self.target(&call).await?;
                let strategy = call.after_target().first().map(String::as_str);
                economy::rob(ctx, actor, &victim, strategy).await
            }
            CommandKind::Deposit => economy::deposit(ctx, actor, require_amount(call.args)?).await,
            CommandKind::Withdraw => economy::withdraw(ctx, actor, require_amount(call.args)?).await,
            CommandKind::Interest => economy::collect_interest(ctx, actor).await,
            CommandKind::Bank => economy::bank_info(ctx, actor).await,
            CommandKind::CreditUpgrade => economy::upgrade_credit(ctx, actor).await,
            CommandKind::Transfer => {
                let recipient = self.target(&call).await?;
                let amount = require_amount(call.after_target())?;
                economy::transfer(ctx, actor, &recipient, amount).await
            }
            CommandKind::Loan => economy::request_loan(ctx, actor, require_amount(call.args)?).await,
            CommandKind::Repay => {
                let amount = call.arg(0).map(parse_amount).transpose()?;
                economy::repay_loan(ctx, actor, amount).await
            }
            CommandKind::RedPacket => {
                let total = require_amount(call.args)?;
                let parts = call
                    .required(1, "number of parts")?
                    .parse::<i64>()
                    .map_err(|_| GameError::validation("Number of parts must be a whole number."))?;
                economy::send_red_packet(ctx, actor, total, parts).await
            }
            CommandKind::Grab => economy::grab_red_packet(ctx, actor, call.required(0, "red packet id")?).await,

            CommandKind::Market => Ok(trade::list_market(ctx, actor).await),
            CommandKind::Owned => trade::list_owned(ctx, actor).await,
            CommandKind::Status => {
                let target = if call.has_target() { self.target(&call).await? } else { actor.to_string() };
                players::market_status(ctx, &target).await
            }
            CommandKind::Buy => trade::buy(ctx, actor, &self.target(&call).await?).await,
            CommandKind::Snatch => trade::snatch(ctx, actor, &self.target(&call).await?).await,
            CommandKind::Release => trade::release(ctx, actor, &self.target(&call).await?).await,
            CommandKind::Redeem => trade::redeem(ctx, actor).await,
            CommandKind::Event => events::describe(ctx).await,
            CommandKind::Bid => events::bid(ctx, actor, require_amount(call.args)?).await,

            CommandKind::Plant => farm::plant(ctx, actor, call.required(0, "crop name")?).await,
            CommandKind::Crop => farm::status(ctx, actor).await,
            CommandKind::Harvest => farm::harvest(ctx, actor).await,
            CommandKind::Guards => Ok(guard::catalog(ctx)),
            CommandKind::Hire => guard::hire(ctx, actor, call.required(0, "guard name")?).await,
            CommandKind::GuardStatus => guard::status(ctx, actor).await,

            CommandKind::VipGenerate => {
                let card_type = call.required(0, "card type")?;
                let count = match call.arg(1) {
                    Some(raw) => raw
                        .parse::<i64>()
                        .map_err(|_| GameError::validation("Count must be a whole number."))?,
                    None => 1,
                };
                let codes = vip::generate(ctx, actor, card_type, count, call.arg(2)).await?;
                Ok(format!("Generated {} {} card(s):\n{}", codes.len(), card_type, codes.join("\n")))
            }
            CommandKind::VipRedeem => vip::redeem(ctx, actor, call.required(0, "card code")?).await,
            CommandKind::VipStatus => vip::status(ctx, actor).await,
            CommandKind::AutoTask => self.auto_task(&call).await,

            CommandKind::JailWork => jail::work(ctx, actor).await,
            CommandKind::JailStatus => jail::status(ctx, actor).await,
            CommandKind::Bail => jail::bail(ctx, actor).await,
            CommandKind::Inmates => Ok(jail::inmates(ctx).await),

            CommandKind::Train => training::train(ctx, actor, call.required(0, "stat")?).await,
            CommandKind::Stats => training::sheet(ctx, actor).await,
            CommandKind::Duel => training::duel(ctx, actor, &self.target(&call).await?).await,

            CommandKind::Shop => Ok(shop::catalog(ctx)),
            CommandKind::ShopBuy => shop::buy(ctx, actor, call.required(0, "item id")?).await,
            CommandKind::UseItem => shop::use_item(ctx, actor, call.required(0, "item id")?).await,
            CommandKind::Inventory => shop::inventory(ctx, actor).await,

            CommandKind::Welfare => welfare::preview(ctx, actor).await,
            CommandKind::ClaimWelfare => welfare::claim(ctx, actor).await,
            CommandKind::Lottery => lottery::draw(ctx, actor).await,
            CommandKind::CoinToss => gamble::coin_toss(ctx, actor, require_amount(call.args)?).await,
            CommandKind::Dice => gamble::dice(ctx, actor, require_amount(call.args)?).await,
            CommandKind::Weather => Ok(self.weather.forecast(ctx.now()).render()),
            CommandKind::Achievements => achievement::progress(ctx, actor).await,

            CommandKind::WealthRanking => Ok(players::ranking(ctx, Ranking::Wealth, RANKING_SIZE).await),
            CommandKind::ValueRanking => Ok(players::ranking(ctx, Ranking::Value, RANKING_SIZE).await),
            CommandKind::OwnerRanking => Ok(players::ranking(ctx, Ranking::Owners, RANKING_SIZE).await),
            CommandKind::PlayerStats => Ok(players::player_stats(ctx).await),
            CommandKind::EconomyOverview => Ok(players::economy_overview(ctx).await),
            CommandKind::SystemOverview => Ok(players::system_overview(ctx).await),
            CommandKind::TaxPool => Ok(players::tax_pool(ctx).await),
            CommandKind::Search => players::search(ctx, call.required(0, "keyword")?, SEARCH_LIMIT).await,
            CommandKind::SetTitle => players::set_title(ctx, actor, &call.args.join(" ")).await,
            CommandKind::SetSignature => players::set_signature(ctx, actor, &call.args.join(" ")).await,
            CommandKind::Statement => self.statement(&call).await,
            CommandKind::Sponsor => Ok(SPONSOR_TEXT.to_string()),

            CommandKind::AddAdmin => players::add_admin(ctx, actor, &self.target(&call).await?).await,
            CommandKind::RemoveAdmin => players::remove_admin(ctx, actor, &self.target(&call).await?).await,
            CommandKind::Admins => Ok(players::list_admins(ctx).await),
            CommandKind::ResetPlayer => players::reset_target(ctx, actor, &self.target(&call).await?).await,
            CommandKind::Backup => {
                players::require_admin(ctx, actor).await?;
                let meta = ctx.store.snapshot_backup(ctx.now()).await?;
                sec_log!("admin {} created backup {}", actor, meta.id);
                Ok(format!("Backup created: {} ({} bytes)", meta.id, meta.size_bytes))
            }
            CommandKind::Backups => {
                players::require_admin(ctx, actor).await?;
                let backups = ctx.store.list_backups().await?;
                if backups.is_empty() {
                    return Ok("No backups yet.".to_string());
                }
                let lines: Vec<String> = backups
                    .iter()
                    .map(|b| format!("{} {} ({} bytes)", b.id, b.created_at.format("%Y-%m-%d %H:%M:%S"), b.size_bytes))
                    .collect();
                Ok(format!("=== Backups ===\n{}", lines.join("\n")))
            }
            CommandKind::Restore => {
                players::require_admin(ctx, actor).await?;
                let name = call.required(0, "backup name")?;
                ctx.store.restore_backup(name).await?;
                self.seed_admins().await?;
                sec_log!("admin {} restored backup {}", actor, escape_log(name));
                Ok(format!("Restored backup {}.", name))
            }
            CommandKind::Wipe => {
                players::require_admin(ctx, actor).await?;
                ctx.store.reset().await?;
                self.seed_admins().await?;
                sec_log!("admin {} wiped the game state", actor);
                Ok("All game data has been cleared.".to_string())
            }
            CommandKind::Disable => self.set_maintenance(actor, true).await,
            CommandKind::Enable => self.set_maintenance(actor, false).await,
        }
    }

    fn help_text(&self) -> String {
        format!("=== Commands ===\n{}", self.table.aliases().join(", "))
    }

    async fn auto_task(&self, call: &Call<'_>) -> GameResult<String> {
        let Some(task) = call.arg(0) else {
            let overview = self
                .ctx
                .store
                .read(|doc| doc.player(call.actor).map(players::auto_task_overview))
                .await?;
            return Ok(format!("=== Auto tasks ===\n{}\nUsage: auto <task> on|off", overview));
        };
        let enabled = match call.arg(1).map(str::to_lowercase).as_deref() {
            Some("on") | Some("enable") => true,
            Some("off") | Some("disable") => false,
            _ => return Err(GameError::validation("Usage: auto <task> on|off")),
        };
        players::toggle_auto_task(&self.ctx, call.actor, task, enabled).await
    }

    /// `statement [target] [limit]`. Reading somebody else's history is admin-only.
    async fn statement(&self, call: &Call<'_>) -> GameResult<String> {
        let first_is_limit = call.arg(0).map_or(false, |a| a.parse::<usize>().is_ok());
        let (target, limit_arg) = if call.mention.is_some() {
            (Some(self.target(call).await?), call.arg(0))
        } else if call.arg(0).is_some() && !first_is_limit {
            (Some(self.target(call).await?), call.arg(1))
        } else {
            (None, call.arg(0))
        };
        let limit = match limit_arg {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| GameError::validation("Limit must be a whole number."))?,
            None => STATEMENT_DEFAULT,
        }
        .clamp(1, STATEMENT_MAX);

        let subject = match target {
            Some(id) if id != call.actor => {
                players::require_admin(&self.ctx, call.actor).await?;
                id
            }
            _ => call.actor.to_string(),
        };
        let nickname = self.ctx.store.read(|doc| doc.player(&subject).map(|p| p.nickname.clone())).await?;
        let entries = self.ctx.ledger.history(&self.ctx.store, &subject, limit).await;
        if entries.is_empty() {
            return Ok(format!("No transactions for {} yet.", nickname));
        }
        let lines: Vec<String> = entries
            .iter()
            .map(|e| {
                format!(
                    "{} [{}] {} {} - {} (cash {})",
                    e.ts.format("%m-%d %H:%M"),
                    e.direction.label(),
                    e.category,
                    format_coins(e.amount),
                    e.description,
                    format_coins(e.balance)
                )
            })
            .collect();
        Ok(format!("=== Statement: {} ===\n{}", nickname, lines.join("\n")))
    }

    async fn set_maintenance(&self, actor: &str, disabled: bool) -> GameResult<String> {
        players::require_admin(&self.ctx, actor).await?;
        self.ctx.store.set_disabled(disabled).await?;
        sec_log!("admin {} {} the game", actor, if disabled { "disabled" } else { "enabled" });
        Ok(if disabled {
            "The game is now in maintenance mode.".to_string()
        } else {
            "The game is open again.".to_string()
        })
    }
}
