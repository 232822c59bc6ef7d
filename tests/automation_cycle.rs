//! Background auto tasks for VIP players.
mod common;

use std::time::Duration;

use chrono::Duration as ChronoDuration;
use common::{edit, game_with, join, player};
use oxmarket::config::{AutomationConfig, GameConfig};
use oxmarket::engine::automation::{self, CycleReport};
use oxmarket::market::types::AutoTask;

const INTERVAL: Duration = Duration::from_secs(60);

fn fixed_wages() -> GameConfig {
    GameConfig { work_reward_min: 300, work_reward_max: 300, ..GameConfig::default() }
}

async fn make_vip(ctx: &oxmarket::market::GameContext, id: &str, tasks: &[AutoTask]) {
    let until = ctx.now() + ChronoDuration::days(1);
    let tasks = tasks.to_vec();
    edit(ctx, id, move |p| {
        p.vip_until = Some(until);
        for task in tasks {
            p.auto_tasks.insert(task, true);
        }
    })
    .await;
}

#[tokio::test]
async fn cycle_runs_enabled_tasks_in_order() {
    let g = game_with(fixed_wages()).await;
    let vip = join(&g.ctx, "vip").await;
    make_vip(&g.ctx, &vip, &[AutoTask::Work, AutoTask::Deposit]).await;

    let report = automation::run_cycle(&g.ctx, INTERVAL).await;
    assert_eq!(report, CycleReport { players: 1, tasks_run: 2, tasks_failed: 0 });

    // Work ran before deposit, so the wages were banked too.
    let p = player(&g.ctx, &vip).await;
    assert_eq!(p.bank_balance, 2_300);
    assert_eq!(p.balance, 0);
    assert_eq!(p.last_auto_task, Some(g.ctx.now()));
}

#[tokio::test]
async fn cycle_skips_players_who_are_not_due() {
    let g = game_with(fixed_wages()).await;
    let vip = join(&g.ctx, "vip").await;
    let idle = join(&g.ctx, "idle").await;
    let lapsed = join(&g.ctx, "lapsed").await;
    make_vip(&g.ctx, &vip, &[AutoTask::Work]).await;
    make_vip(&g.ctx, &idle, &[]).await;
    edit(&g.ctx, &lapsed, |p| {
        p.auto_tasks.insert(AutoTask::Work, true);
    })
    .await;

    assert_eq!(automation::run_cycle(&g.ctx, INTERVAL).await.players, 1);
    assert_eq!(player(&g.ctx, &idle).await.balance, 2_000);
    assert_eq!(player(&g.ctx, &lapsed).await.balance, 2_000);
    assert_eq!(player(&g.ctx, &lapsed).await.last_auto_task, None);

    g.clock.advance_secs(30);
    assert_eq!(automation::run_cycle(&g.ctx, INTERVAL).await, CycleReport::default());
}

#[tokio::test]
async fn failed_tasks_do_not_stop_the_cycle_and_still_stamp() {
    let g = game_with(fixed_wages()).await;
    let vip = join(&g.ctx, "vip").await;
    make_vip(&g.ctx, &vip, &[AutoTask::Work, AutoTask::Harvest, AutoTask::Deposit]).await;

    let first = automation::run_cycle(&g.ctx, INTERVAL).await;
    // Nothing planted, so harvest fails between the two that succeed.
    assert_eq!(first, CycleReport { players: 1, tasks_run: 2, tasks_failed: 1 });

    g.clock.advance_secs(120);
    let second = automation::run_cycle(&g.ctx, INTERVAL).await;
    // Work is still cooling down and there is no cash left to deposit.
    assert_eq!(second, CycleReport { players: 1, tasks_run: 0, tasks_failed: 3 });
    assert_eq!(player(&g.ctx, &vip).await.last_auto_task, Some(g.ctx.now()));
}

#[tokio::test]
async fn scheduler_runs_on_demand_and_shuts_down() {
    let g = game_with(fixed_wages()).await;
    let vip = join(&g.ctx, "vip").await;
    make_vip(&g.ctx, &vip, &[AutoTask::Work]).await;

    let handle = automation::spawn(g.ctx.clone(), &AutomationConfig { enabled: true, interval_seconds: 3_600 });
    let report = handle.run_now().await.unwrap();
    assert_eq!(report.tasks_run, 1);
    handle.shutdown().await;
    assert_eq!(player(&g.ctx, &vip).await.balance, 2_300);
}
