//! Background auto tasks for VIP players.
//!
//! A spawned loop wakes up every `interval` and runs [`run_cycle`]. Each VIP
//! player with at least one task switched on, whose last automatic run is at
//! least one interval old, gets their enabled tasks executed in
//! [`AutoTask::ALL`] order through the same operations a chat command would
//! use. A failing task never stops the others; the player's
//! `last_auto_task` is stamped either way.
//!
//! The loop listens on a command channel next to its timer so callers can
//! force a cycle ([`AutomationHandle::run_now`]) or stop it
//! ([`AutomationHandle::shutdown`]) and wait until it has really stopped.

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::AutomationConfig;
use crate::market::errors::GameResult;
use crate::market::types::{AutoTask, PlayerId};
use crate::market::{economy, farm, GameContext};

/// Outcome of one pass over all players.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub players: usize,
    pub tasks_run: usize,
    pub tasks_failed: usize,
}

/// Players due for automation at `ctx.now()`, with the tasks they enabled.
async fn due_players(ctx: &GameContext, interval: ChronoDuration) -> Vec<(PlayerId, Vec<AutoTask>)> {
    let now = ctx.now();
    ctx.store
        .read(|doc| {
            doc.players
                .values()
                .filter(|p| p.is_vip(now) && p.any_auto_task())
                .filter(|p| p.last_auto_task.map_or(true, |last| now - last >= interval))
                .map(|p| {
                    let tasks = AutoTask::ALL
                        .iter()
                        .copied()
                        .filter(|t| p.auto_tasks.get(t).copied().unwrap_or(false))
                        .collect();
                    (p.player_id.clone(), tasks)
                })
                .collect()
        })
        .await
}

async fn run_task(ctx: &GameContext, id: &str, task: AutoTask) -> GameResult<String> {
    match task {
        AutoTask::Work => economy::work(ctx, id).await,
        AutoTask::Harvest => farm::harvest(ctx, id).await,
        AutoTask::Deposit => economy::deposit_up_to_limit(ctx, id).await,
    }
}

/// Run every due player's tasks once.
pub async fn run_cycle(ctx: &GameContext, interval: Duration) -> CycleReport {
    let interval = ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::seconds(60));
    let due = due_players(ctx, interval).await;
    let mut report = CycleReport { players: due.len(), ..CycleReport::default() };

    for (id, tasks) in due {
        for task in tasks {
            match run_task(ctx, &id, task).await {
                Ok(_) => {
                    report.tasks_run += 1;
                    debug!("auto {} for {} done", task.label(), id);
                }
                Err(e) if e.is_user_facing() => {
                    report.tasks_failed += 1;
                    debug!("auto {} for {} skipped: {}", task.label(), id, e);
                }
                Err(e) => {
                    report.tasks_failed += 1;
                    error!("auto {} for {} failed: {}", task.label(), id, e);
                }
            }
        }
        let now = ctx.now();
        let stamp = ctx
            .store
            .transact(|doc| {
                if let Some(p) = doc.players.get_mut(&id) {
                    p.last_auto_task = Some(now);
                }
                Ok(())
            })
            .await;
        if let Err(e) = stamp {
            error!("could not stamp auto tasks for {}: {}", id, e);
        }
    }

    if report.players > 0 {
        info!(
            "automation cycle: {} players, {} tasks run, {} failed",
            report.players, report.tasks_run, report.tasks_failed
        );
    }
    report
}

enum AutomationCommand {
    RunNow(oneshot::Sender<CycleReport>),
    Shutdown(oneshot::Sender<()>),
}

pub struct AutomationHandle {
    tx: mpsc::UnboundedSender<AutomationCommand>,
    join: JoinHandle<()>,
}

impl AutomationHandle {
    /// Run a cycle immediately and wait for its report.
    pub async fn run_now(&self) -> Option<CycleReport> {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(AutomationCommand::RunNow(tx)).is_ok() {
            rx.await.ok()
        } else {
            None
        }
    }

    /// Stop the loop and wait for the task to finish. A cycle in progress
    /// completes first.
    pub async fn shutdown(self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(AutomationCommand::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        if let Err(e) = self.join.await {
            error!("automation task ended abnormally: {}", e);
        }
    }
}

/// Start the scheduler. With `enabled = false` the loop still answers
/// [`AutomationHandle::run_now`] but never fires on its own.
pub fn spawn(ctx: GameContext, config: &AutomationConfig) -> AutomationHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<AutomationCommand>();
    let interval = config.interval();
    let enabled = config.enabled;

    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so boot is quiet.
        ticker.tick().await;
        info!("automation started (enabled={}, every {}s)", enabled, interval.as_secs());
        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(AutomationCommand::RunNow(reply)) => {
                        let report = run_cycle(&ctx, interval).await;
                        let _ = reply.send(report);
                    }
                    Some(AutomationCommand::Shutdown(done)) => {
                        let _ = done.send(());
                        break;
                    }
                    None => break,
                },
                _ = ticker.tick(), if enabled => {
                    run_cycle(&ctx, interval).await;
                }
            }
        }
        info!("automation stopped");
    });

    AutomationHandle { tx, join }
}
