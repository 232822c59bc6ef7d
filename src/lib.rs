//! # Oxmarket - Chat-Command Trading and Economy Game
//!
//! Oxmarket is the engine behind a group-chat economy game. Players earn coins
//! by working, keep them in a bank with a credit ladder, rob each other, hand
//! out red packets, and buy, snatch and release one another on a player
//! market. Side systems (farm, guards, VIP cards, jail, training, shop,
//! welfare, lottery, gambling, weather, achievements, a daily auction) hang
//! off the same persistent document.
//!
//! ## Features
//!
//! - **One document, atomic operations**: every command runs inside a single
//!   store transaction, so cross-player moves (rob, transfer, ownership) can
//!   never lose updates.
//! - **Durable persistence**: temp-file + fsync + rename writes under a file
//!   lock, timestamped backups with SHA-256 manifest and retention.
//! - **Access control**: user and group allow/block lists, admin set,
//!   maintenance mode.
//! - **Automation**: VIP players can opt into background work, harvest and
//!   deposit.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use oxmarket::config::Config;
//! use oxmarket::engine::{Engine, Inbound};
//! use oxmarket::market::{ledger::Ledger, GameContext};
//! use oxmarket::storage::StateStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let store = StateStore::open(&config.storage.data_dir, config.storage.backups_to_keep).await?;
//!     let ctx = GameContext::new(
//!         Arc::new(store),
//!         config.game.clone(),
//!         Ledger::new(config.storage.ledger_capacity),
//!     );
//!     let engine = Engine::new(ctx, &config.access)?;
//!     if let Some(reply) = engine.dispatch(&Inbound::new("qq", "10001", "work")).await {
//!         println!("{}", reply);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML configuration with stock game tables
//! - [`storage`] - the state document, transactions and backups
//! - [`market`] - game rules
//! - [`engine`] - command table, access policy, dispatcher, automation
//! - [`logutil`] - single-line log sanitising
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Chat adapter   │ ← console (bundled) or a bot platform
//! └─────────────────┘
//!          │ Inbound
//! ┌─────────────────┐     ┌──────────────┐
//! │     Engine      │ ←── │  Automation  │
//! └─────────────────┘     └──────────────┘
//!          │
//! ┌─────────────────┐
//! │     Market      │ ← game rules
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   StateStore    │ ← document + backups
//! └─────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod logutil;
pub mod market;
pub mod storage;
