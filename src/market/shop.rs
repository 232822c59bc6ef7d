//! Item shop and inventory.

use super::currency::format_coins;
use super::errors::{GameError, GameResult};
use super::training::apply_stat_bonus;
use super::types::Direction;
use super::GameContext;

pub fn catalog(ctx: &GameContext) -> String {
    if ctx.config.shop_items.is_empty() {
        return "The shop is empty.".to_string();
    }
    let mut lines = vec!["=== Item Shop ===".to_string()];
    for item in &ctx.config.shop_items {
        lines.push(format!(
            "{} - {} - {}\n{}",
            item.item_id,
            item.name,
            format_coins(item.price),
            item.description
        ));
    }
    lines.join("\n")
}

fn item_not_found() -> GameError {
    GameError::not_found("No such item.")
}

pub async fn buy(ctx: &GameContext, actor: &str, item_id: &str) -> GameResult<String> {
    let item = ctx.config.shop_item(item_id).cloned().ok_or_else(item_not_found)?;
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            if player.balance < item.price {
                return Err(GameError::precondition("Not enough coins for that item."));
            }
            player.balance -= item.price;
            *player.inventory.entry(item.item_id.clone()).or_insert(0) += 1;
            player.touch(now);
            let balance = player.balance;
            doc.adjust_system_balance(item.price);
            ledger.record(doc, &actor, "shop", item.price, Direction::Expense, item.name.clone(), now);
            Ok(format!("Bought {}, {} left", item.name, format_coins(balance)))
        })
        .await
}

pub async fn use_item(ctx: &GameContext, actor: &str, item_id: &str) -> GameResult<String> {
    let item = ctx.config.shop_item(item_id).cloned().ok_or_else(item_not_found)?;
    let stat = item
        .target_stat
        .ok_or_else(|| GameError::precondition("That item has no usable effect yet."))?;
    let now = ctx.now();
    let ledger = ctx.ledger;
    let actor = actor.to_string();
    ctx.store
        .transact(move |doc| {
            let player = doc.player_mut(&actor)?;
            let owned = player.inventory.get(&item.item_id).copied().unwrap_or(0);
            if owned == 0 {
                return Err(GameError::precondition("You don't have that item."));
            }
            let value = apply_stat_bonus(player, stat, item.effect_value);
            player.inventory.insert(item.item_id.clone(), owned - 1);
            player.touch(now);
            ledger.record(doc, &actor, "item", 0, Direction::Income, format!("used {}", item.name), now);
            Ok(format!(
                "Used {}, {} is now {}. {} left",
                item.name,
                stat.label(),
                value,
                owned - 1
            ))
        })
        .await
}

pub async fn inventory(ctx: &GameContext, actor: &str) -> GameResult<String> {
    let config = ctx.config.clone();
    ctx.store
        .read(|doc| {
            let player = doc.player(actor)?;
            let held: Vec<String> = player
                .inventory
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(id, count)| {
                    let name = config.shop_item(id).map_or(id.as_str(), |item| item.name.as_str());
                    format!("{} x{}", name, count)
                })
                .collect();
            if held.is_empty() {
                return Ok("Your bag is empty.".to_string());
            }
            Ok(format!("=== Inventory ===\n{}", held.join("\n")))
        })
        .await
}
