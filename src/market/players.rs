//! Player registration, lookup, profiles, rankings and admin membership.

use chrono::{DateTime, Utc};
use log::info;

use super::currency::format_coins;
use super::errors::{GameError, GameResult};
use super::trade::valuation;
use super::types::{player_id, AutoTask, GameState, JailState, Player, PlayerId};
use super::GameContext;
use crate::config::GameConfig;

pub const APPEARANCE_MAX_CHARS: usize = 20;

/// Identity of the sender of an inbound command.
#[derive(Debug, Clone)]
pub struct Sender {
    pub platform: String,
    pub user_id: String,
    pub nickname: Option<String>,
    pub group_id: Option<String>,
}

impl Sender {
    pub fn player_id(&self) -> PlayerId {
        player_id(&self.platform, &self.user_id)
    }
}

fn new_player(sender: &Sender, config: &GameConfig, now: DateTime<Utc>) -> Player {
    Player {
        player_id: sender.player_id(),
        platform: sender.platform.clone(),
        user_id: sender.user_id.clone(),
        nickname: sender
            .nickname
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("player{}", sender.user_id)),
        group_id: sender.group_id.clone().filter(|g| !g.is_empty()),
        balance: config.starting_balance,
        deposit_limit: config.base_deposit_limit(),
        created_at: Some(now),
        updated_at: Some(now),
        ..Player::default()
    }
}

/// Resolve the sender's record, creating it on first contact and refreshing
/// nickname and group when they changed.
pub async fn ensure_player(ctx: &GameContext, sender: &Sender) -> GameResult<Player> {
    let id = sender.player_id();
    let nickname = sender.nickname.clone().filter(|n| !n.trim().is_empty());
    let group = sender.group_id.clone().filter(|g| !g.is_empty());

    let up_to_date = ctx
        .store
        .read(|doc| {
            doc.players.get(&id).filter(|p| {
                nickname.as_ref().map_or(true, |n| *n == p.nickname)
                    && group.as_ref().map_or(true, |g| Some(g) == p.group_id.as_ref())
            })
            .cloned()
        })
        .await;
    if let Some(player) = up_to_date {
        return Ok(player);
    }

    let now = ctx.now();
    let config = ctx.config.clone();
    let sender = sender.clone();
    let (player, created) = ctx
        .store
        .transact(move |doc| match doc.players.get_mut(&sender.player_id()) {
            Some(existing) => {
                if let Some(n) = nickname {
                    existing.nickname = n;
                }
                if let Some(g) = group {
                    existing.group_id = Some(g);
                }
                existing.touch(now);
                Ok((existing.clone(), false))
            }
            None => {
                let fresh = new_player(&sender, &config, now);
                doc.players.insert(fresh.player_id.clone(), fresh.clone());
                Ok((fresh, true))
            }
        })
        .await?;
    if created {
        info!("registered new trader {}", player.player_id);
    }
    Ok(player)
}

/// Exact id or nickname match first, then the first nickname containing `keyword`.
pub fn find_by_keyword<'a>(doc: &'a GameState, keyword: &str) -> Option<&'a Player> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return None;
    }
    doc.players
        .values()
        .find(|p| p.player_id == keyword || p.nickname == keyword)
        .or_else(|| doc.players.values().find(|p| p.nickname.contains(keyword)))
}

/// Resolve a command target: the first mention wins when it names a known
/// player, otherwise the keyword is looked up.
pub fn resolve_target(
    doc: &GameState,
    platform: &str,
    mention: Option<&str>,
    keyword: Option<&str>,
) -> GameResult<PlayerId> {
    if let Some(user) = mention {
        let id = player_id(platform, user);
        if doc.players.contains_key(&id) {
            return Ok(id);
        }
    }
    let keyword = keyword.ok_or_else(|| GameError::validation("Mention someone or give a nickname."))?;
    find_by_keyword(doc, keyword)
        .map(|p| p.player_id.clone())
        .ok_or_else(|| GameError::not_found("Target player not found."))
}

/// Reset a player to a fresh start, detaching ownership in both directions.
pub(crate) fn reset_in(doc: &mut GameState, id: &str, config: &GameConfig, now: DateTime<Utc>) -> GameResult<()> {
    let (owned, owner) = {
        let player = doc.player(id)?;
        (player.owned_slaves.keys().cloned().collect::<Vec<_>>(), player.owner_id.clone())
    };
    for slave_id in owned {
        if let Some(slave) = doc.players.get_mut(&slave_id) {
            slave.owner_id = None;
            slave.touch(now);
        }
    }
    if let Some(owner_id) = owner {
        if let Some(owner) = doc.players.get_mut(&owner_id) {
            owner.owned_slaves.remove(id);
            owner.touch(now);
        }
    }
    let player = doc.player_mut(id)?;
    player.balance = config.starting_balance;
    player.bank_balance = 0;
    player.owned_slaves.clear();
    player.owner_id = None;
    player.farmland = None;
    player.loan = None;
    player.guard = None;
    player.jail = JailState::default();
    player.vip_until = None;
    player.touch(now);
    Ok(())
}

pub async fn reset_player(ctx: &GameContext, id: &str) -> GameResult<String> {
    let now = ctx.now();
    let config = ctx.config.clone();
    let id = id.to_string();
    ctx.store
        .transact(move |doc| {
            reset_in(doc, &id, &config, now)?;
            Ok(format!(
                "Character reset, balance restored to {}.",
                format_coins(config.starting_balance)
            ))
        })
        .await
}

/// Admin reset of another player.
pub async fn reset_target(ctx: &GameContext, actor: &str, target: &str) -> GameResult<String> {
    require_admin(ctx, actor).await?;
    let now = ctx.now();
    let config = ctx.config.clone();
    let target = target.to_string();
    let nickname = ctx
        .store
        .transact(move |doc| {
            reset_in(doc, &target, &config, now)?;
            Ok(doc.player(&target)?.nickname.clone())
        })
        .await?;
    log::info!(target: "security", "admin {} reset player {}", actor, nickname);
    Ok(format!("Reset {}'s data.", nickname))
}

pub fn profile_text(player: &Player, now: DateTime<Utc>) -> String {
    let owner = match &player.owner_id {
        None => "free".to_string(),
        Some(owner) => format!("owned by {}", owner),
    };
    let vip = match player.vip_until {
        Some(until) if until > now => format!("{}h left", (until - now).num_hours()),
        _ => "inactive".to_string(),
    };
    let mut lines = vec![
        format!("Nickname: {}", player.nickname),
        format!("Balance: {}", format_coins(player.balance)),
        format!(
            "Bank: {} / limit {}",
            format_coins(player.bank_balance),
            format_coins(player.deposit_limit)
        ),
        format!("Credit: Lv.{}", player.credit_level),
        format!("Status: {}", owner),
        format!("Owned: {}", player.owned_slaves.len()),
        format!("VIP: {}", vip),
    ];
    if let Some(crop) = &player.farmland {
        lines.push(format!(
            "Crop: {}{} planted {}h ago",
            crop.emoji,
            crop.crop_name,
            (now - crop.planted_at).num_hours()
        ));
    }
    if let Some(loan) = player.live_loan() {
        lines.push(format!("Loan: {} at {:.1}%", format_coins(loan.amount), loan.rate * 100.0));
    }
    lines.join("\n")
}

pub fn appearance_text(player: &Player) -> String {
    format!("Title: {}\nSignature: {}", player.title, player.signature)
}

pub async fn profile(ctx: &GameContext, id: &str) -> GameResult<String> {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let p = doc.player(id)?;
            Ok(format!("{}\n{}", profile_text(p, now), appearance_text(p)))
        })
        .await
}

pub async fn info(ctx: &GameContext, id: &str) -> GameResult<String> {
    let now = ctx.now();
    ctx.store.read(|doc| Ok(profile_text(doc.player(id)?, now))).await
}

// ============================================================================
// Appearance
// ============================================================================

fn validate_appearance(text: &str) -> GameResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(GameError::validation("Text must not be empty."));
    }
    if text.chars().count() > APPEARANCE_MAX_CHARS {
        return Err(GameError::validation(format!(
            "Keep it within {} characters.",
            APPEARANCE_MAX_CHARS
        )));
    }
    Ok(text.to_string())
}

pub async fn set_title(ctx: &GameContext, id: &str, title: &str) -> GameResult<String> {
    let title = validate_appearance(title)?;
    let id = id.to_string();
    let now = ctx.now();
    ctx.store
        .transact(move |doc| {
            let p = doc.player_mut(&id)?;
            p.title = title.clone();
            p.touch(now);
            Ok(format!("Title updated to: {}", title))
        })
        .await
}

pub async fn set_signature(ctx: &GameContext, id: &str, signature: &str) -> GameResult<String> {
    let signature = validate_appearance(signature)?;
    let id = id.to_string();
    let now = ctx.now();
    ctx.store
        .transact(move |doc| {
            let p = doc.player_mut(&id)?;
            p.signature = signature.clone();
            p.touch(now);
            Ok(format!("Signature updated: {}", signature))
        })
        .await
}

// ============================================================================
// Auto tasks
// ============================================================================

pub fn auto_task_overview(player: &Player) -> String {
    AutoTask::ALL
        .iter()
        .map(|task| {
            let on = player.auto_tasks.get(task).copied().unwrap_or(false);
            format!("{}: {}", task.label(), if on { "on" } else { "off" })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn toggle_auto_task(ctx: &GameContext, id: &str, task: &str, enabled: bool) -> GameResult<String> {
    let task = AutoTask::parse(task).ok_or_else(|| {
        let names: Vec<&str> = AutoTask::ALL.iter().map(|t| t.label()).collect();
        GameError::validation(format!("Unknown auto task. Available: {}", names.join(",")))
    })?;
    let id = id.to_string();
    let now = ctx.now();
    ctx.store
        .transact(move |doc| {
            let p = doc.player_mut(&id)?;
            p.auto_tasks.insert(task, enabled);
            p.touch(now);
            Ok(format!(
                "Auto task {} is now {}.",
                task.label(),
                if enabled { "on" } else { "off" }
            ))
        })
        .await
}

// ============================================================================
// Rankings and overviews
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    Wealth,
    Value,
    Owners,
}

pub async fn ranking(ctx: &GameContext, kind: Ranking, limit: usize) -> String {
    ctx.store
        .read(|doc| {
            let mut players: Vec<&Player> = doc.players.values().collect();
            let score = |p: &Player| -> i64 {
                match kind {
                    Ranking::Wealth => p.total_assets(),
                    Ranking::Value => p.total_assets() + p.owned_slaves.len() as i64 * 600,
                    Ranking::Owners => p.owned_slaves.len() as i64,
                }
            };
            players.sort_by(|a, b| score(b).cmp(&score(a)).then(a.player_id.cmp(&b.player_id)));
            let title = match kind {
                Ranking::Wealth => "Wealth ranking",
                Ranking::Value => "Value ranking",
                Ranking::Owners => "Owner ranking",
            };
            let mut lines = vec![title.to_string()];
            for (idx, p) in players.iter().take(limit).enumerate() {
                let shown = match kind {
                    Ranking::Owners => format!("{} owned", p.owned_slaves.len()),
                    _ => format_coins(score(p)),
                };
                lines.push(format!("{}. {} - {}", idx + 1, p.nickname, shown));
            }
            lines.join("\n")
        })
        .await
}

fn stats_text(doc: &GameState) -> String {
    let total = doc.players.len();
    let owners = doc.players.values().filter(|p| !p.owned_slaves.is_empty()).count();
    let owned = doc.players.values().filter(|p| p.owner_id.is_some()).count();
    format!("Players: {}\nOwners: {}\nOwned: {}", total, owners, owned)
}

fn economy_text(doc: &GameState, now: DateTime<Utc>) -> String {
    let coins: i64 = doc.players.values().map(|p| p.balance).sum();
    let deposits: i64 = doc.players.values().map(|p| p.bank_balance).sum();
    let loans: i64 = doc.players.values().filter_map(|p| p.live_loan()).map(|l| l.amount).sum();
    let vips = doc.players.values().filter(|p| p.is_vip(now)).count();
    let mut lines = vec![
        format!("Circulating coins: {}", format_coins(coins)),
        format!("Bank deposits: {}", format_coins(deposits)),
        format!("Outstanding loans: {}", format_coins(loans)),
        format!("VIP count: {}", vips),
    ];
    if let Some(richest) = doc.players.values().max_by_key(|p| p.total_assets()) {
        lines.push(format!(
            "Richest: {} ({})",
            richest.nickname,
            format_coins(richest.total_assets())
        ));
    }
    lines.join("\n")
}

pub async fn player_stats(ctx: &GameContext) -> String {
    ctx.store.read(stats_text).await
}

pub async fn economy_overview(ctx: &GameContext) -> String {
    let now = ctx.now();
    ctx.store.read(|doc| economy_text(doc, now)).await
}

pub async fn system_overview(ctx: &GameContext) -> String {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let pool_time = doc
                .tax_pool
                .updated_at
                .map_or("never".to_string(), |t| t.format("%m-%d %H:%M").to_string());
            format!(
                "{}\n{}\nSystem funds: {}\nTax pool: {} (updated {})",
                stats_text(doc),
                economy_text(doc, now),
                format_coins(doc.system_balance),
                format_coins(doc.tax_pool.amount),
                pool_time
            )
        })
        .await
}

pub async fn tax_pool(ctx: &GameContext) -> String {
    let pool = ctx.store.tax_pool().await;
    let updated = pool
        .updated_at
        .map_or("never".to_string(), |t| t.format("%m-%d %H:%M").to_string());
    format!("Tax pool: {}\nLast update: {}", format_coins(pool.amount), updated)
}

pub async fn search(ctx: &GameContext, keyword: &str, limit: usize) -> GameResult<String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(GameError::validation("Enter a keyword."));
    }
    let matches: Vec<String> = ctx
        .store
        .read(|doc| {
            doc.players
                .values()
                .filter(|p| p.nickname.contains(keyword))
                .take(limit)
                .map(|p| format!("{} ({})", p.nickname, p.player_id))
                .collect()
        })
        .await;
    if matches.is_empty() {
        return Ok("No matching players.".to_string());
    }
    Ok(format!("Search results:\n{}", matches.join("\n")))
}

/// Valuation line used by the `status` command.
pub async fn market_status(ctx: &GameContext, target: &str) -> GameResult<String> {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            let p = doc.player(target)?;
            let owner = p
                .owner_id
                .as_ref()
                .and_then(|o| doc.players.get(o))
                .map_or("none".to_string(), |o| o.nickname.clone());
            Ok(format!(
                "{}\nValue: {}\nOwner: {}",
                p.nickname,
                format_coins(valuation(p, now)),
                owner
            ))
        })
        .await
}

// ============================================================================
// Admins
// ============================================================================

pub async fn require_admin(ctx: &GameContext, id: &str) -> GameResult<()> {
    if ctx.store.is_admin(id).await {
        Ok(())
    } else {
        Err(GameError::permission("Only admins can do that."))
    }
}

/// Add configured admins at boot. Returns how many were new.
pub async fn seed_admins(ctx: &GameContext, ids: &[String]) -> GameResult<usize> {
    let ids: Vec<String> = ids.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if ids.is_empty() {
        return Ok(0);
    }
    ctx.store
        .transact(move |doc| Ok(ids.into_iter().filter(|id| doc.admins.insert(id.clone())).count()))
        .await
}

pub async fn add_admin(ctx: &GameContext, actor: &str, target: &str) -> GameResult<String> {
    require_admin(ctx, actor).await?;
    let nickname = ctx.store.read(|doc| doc.player(target).map(|p| p.nickname.clone())).await?;
    ctx.store.add_admin(target).await?;
    log::info!(target: "security", "admin {} granted admin to {}", actor, target);
    Ok(format!("Granted admin rights to {}.", nickname))
}

pub async fn remove_admin(ctx: &GameContext, actor: &str, target: &str) -> GameResult<String> {
    require_admin(ctx, actor).await?;
    let nickname = ctx.store.read(|doc| doc.player(target).map(|p| p.nickname.clone())).await?;
    if !ctx.store.remove_admin(target).await? {
        return Err(GameError::precondition(format!("{} is not an admin.", nickname)));
    }
    log::info!(target: "security", "admin {} revoked admin from {}", actor, target);
    Ok(format!("Removed admin rights from {}.", nickname))
}

pub async fn list_admins(ctx: &GameContext) -> String {
    ctx.store
        .read(|doc| {
            if doc.admins.is_empty() {
                return "No admins yet.".to_string();
            }
            let names: Vec<String> = doc
                .admins
                .iter()
                .map(|id| doc.players.get(id).map_or(id.clone(), |p| p.nickname.clone()))
                .collect();
            format!("Admins: {}", names.join(", "))
        })
        .await
}
