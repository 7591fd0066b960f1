//! Warm-up sequence and recurring poll.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{FetchMode, SyncContext};
use crate::config::ScheduleConfig;

/// One stage of the warm-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupStage {
    CurrentUser,
    AllUsers,
    AllTickets,
    Admin,
}

/// A stage and the pause that precedes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupStep {
    pub delay: Duration,
    pub stage: WarmupStage,
}

/// The warm-up plan: current user immediately, then each remaining stage
/// after `warmup_stage_delay`.
#[must_use]
pub fn warmup_plan(schedule: &ScheduleConfig) -> Vec<WarmupStep> {
    let gap = schedule.warmup_stage_delay;
    vec![
        WarmupStep {
            delay: Duration::ZERO,
            stage: WarmupStage::CurrentUser,
        },
        WarmupStep {
            delay: gap,
            stage: WarmupStage::AllUsers,
        },
        WarmupStep {
            delay: gap,
            stage: WarmupStage::AllTickets,
        },
        WarmupStep {
            delay: gap,
            stage: WarmupStage::Admin,
        },
    ]
}

impl SyncContext {
    /// Run the warm-up sequence to completion.
    ///
    /// A failing stage is logged and the sequence moves on.
    pub async fn run_warmup(&self) {
        for step in warmup_plan(&self.inner.schedule) {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            debug!(stage = ?step.stage, "Warm-up stage");
            let result = match step.stage {
                WarmupStage::CurrentUser => self.refresh_current_user(FetchMode::Guarded).await.map(drop),
                WarmupStage::AllUsers => self.refresh_all_users(FetchMode::Guarded).await.map(drop),
                WarmupStage::AllTickets => self.refresh_all_tickets(FetchMode::Guarded).await.map(drop),
                WarmupStage::Admin => {
                    if self.inner.identity.current_admin().await.is_none() {
                        self.inner.identity.rehydrate_admin().await;
                        self.bump();
                    }
                    Ok(())
                }
            };
            if let Err(e) = result {
                warn!(stage = ?step.stage, error = %e, "Warm-up stage failed");
            }
        }
        info!("Warm-up complete");
    }

    /// One poll tick: refresh the current user, all users and all tickets
    /// concurrently. Kinds already in flight are skipped.
    pub async fn poll_tick(&self) {
        let (user, users, tickets) = tokio::join!(
            self.refresh_current_user(FetchMode::Guarded),
            self.refresh_all_users(FetchMode::Guarded),
            self.refresh_all_tickets(FetchMode::Guarded),
        );
        for (what, result) in [("current user", user), ("all users", users), ("all tickets", tickets)] {
            match result {
                Ok(outcome) => debug!(what, ?outcome, "Poll refresh"),
                Err(e) => warn!(what, error = %e, "Poll refresh failed"),
            }
        }
    }

    /// Start the warm-up sequence and the recurring poll in the background.
    ///
    /// Both stop when the returned handle is shut down or dropped.
    #[must_use]
    pub fn spawn(&self) -> SyncHandle {
        let mut tasks = JoinSet::new();

        let ctx = self.clone();
        tasks.spawn(async move { ctx.run_warmup().await });

        let ctx = self.clone();
        let period = self.inner.schedule.poll_interval;
        tasks.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                ctx.poll_tick().await;
            }
        });

        info!(poll_interval_secs = period.as_secs(), "Synchronization started");
        SyncHandle { tasks }
    }
}

/// Owns the background warm-up and poll tasks.
///
/// Dropping the handle cancels both.
pub struct SyncHandle {
    tasks: JoinSet<()>,
}

impl SyncHandle {
    /// Cancel the background tasks and wait for them to stop.
    pub async fn shutdown(mut self) {
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}
        info!("Synchronization stopped");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_orders_stages_with_gaps() {
        let schedule = ScheduleConfig {
            warmup_stage_delay: Duration::from_secs(120),
            ..ScheduleConfig::default()
        };
        let plan = warmup_plan(&schedule);

        let stages: Vec<_> = plan.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            [
                WarmupStage::CurrentUser,
                WarmupStage::AllUsers,
                WarmupStage::AllTickets,
                WarmupStage::Admin
            ]
        );
        assert_eq!(plan[0].delay, Duration::ZERO);
        assert!(plan[1..].iter().all(|s| s.delay == Duration::from_secs(120)));
    }
}
