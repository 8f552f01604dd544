//! Scheduled close jobs
//!
//! The only entry points driven by an external scheduler. Each close walks
//! every user and circle with log-and-continue semantics; every write below
//! is an upsert, so a re-run is harmless, and a last-run guard skips a close
//! that already ran for the same period.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use ql_core::logging::operations;
use ql_core::period::PeriodService;
use ql_core::types::{PeriodKey, PeriodType};

use crate::circles::CircleTaskService;
use crate::directory::UserDirectory;
use crate::error::EngineResult;
use crate::levels::LevelService;
use crate::scores::ScoreService;
use crate::streak::StreakService;
use crate::tasks::TaskProgressService;

/// Summary of one close run
#[derive(Clone, Debug, Default)]
pub struct CloseReport {
    pub period: Option<PeriodKey>,
    pub users_processed: u32,
    pub users_failed: u32,
    pub circles_processed: u32,
    pub level_outcomes: u32,
    pub tasks_expired: u64,
    /// True when the guard detected this period was already closed
    pub skipped: bool,
}

/// Scheduler-driven weekly and monthly closes
#[derive(Clone)]
pub struct ScheduledJobs {
    directory: Arc<dyn UserDirectory>,
    scores: ScoreService,
    levels: LevelService,
    streaks: StreakService,
    tasks: TaskProgressService,
    circles: CircleTaskService,
    period: PeriodService,
    last_run: Arc<RwLock<HashMap<&'static str, PeriodKey>>>,
}

impl ScheduledJobs {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        scores: ScoreService,
        levels: LevelService,
        streaks: StreakService,
        tasks: TaskProgressService,
        circles: CircleTaskService,
        period: PeriodService,
    ) -> Self {
        Self {
            directory,
            scores,
            levels,
            streaks,
            tasks,
            circles,
            period,
            last_run: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Close the week that just ended: snapshot and rank every user, run the
    /// league, reset streak grace, expire stale quests, snapshot and rank
    /// every circle.
    pub async fn run_weekly_close(&self) -> EngineResult<CloseReport> {
        let current = self.period.current_key(PeriodType::Weekly);
        let Some(week) = self.period.previous_week(&current) else {
            warn!(period = %current, "cannot derive previous week, skipping close");
            return Ok(CloseReport::default());
        };
        if self.already_ran("weekly", &week).await {
            info!(period = %week, operation = operations::WEEKLY_CLOSE, "already closed, skipping");
            return Ok(CloseReport {
                period: Some(week),
                skipped: true,
                ..CloseReport::default()
            });
        }

        info!(period = %week, operation = operations::WEEKLY_CLOSE, "weekly close started");
        let mut report = CloseReport {
            period: Some(week.clone()),
            ..CloseReport::default()
        };

        self.levels.seed().await?;
        for user_id in self.directory.list_users().await? {
            let snapshot = self.scores.snapshot_user(&user_id, PeriodType::Weekly, &week);
            let membership = self.levels.ensure_member(&user_id);
            match (snapshot.await, membership.await) {
                (Ok(_), Ok(_)) => report.users_processed += 1,
                (snap, member) => {
                    report.users_failed += 1;
                    if let Err(err) = snap {
                        warn!(user_id = %user_id, error = %err, "user snapshot failed");
                    }
                    if let Err(err) = member {
                        warn!(user_id = %user_id, error = %err, "league membership failed");
                    }
                }
            }
        }

        if let Some((week_start, _)) = self.period.bounds(&week, PeriodType::Weekly) {
            if let Err(err) = self
                .scores
                .calculate_rankings(PeriodType::Weekly, week_start)
                .await
            {
                warn!(period = %week, error = %err, "user ranking pass failed");
            }
        }

        match self.levels.close_week(&week).await {
            Ok(outcomes) => report.level_outcomes = outcomes.len() as u32,
            Err(err) => warn!(period = %week, error = %err, "league close failed"),
        }

        match self.streaks.reset_weekly_grace().await {
            Ok(count) => info!(count, "weekly streak grace reset"),
            Err(err) => warn!(error = %err, "grace reset failed"),
        }

        report.tasks_expired += self.expire_tasks().await;
        report.circles_processed = self.close_circles(PeriodType::Weekly, &week).await;

        self.mark_ran("weekly", week.clone()).await;
        info!(
            period = %week,
            operation = operations::WEEKLY_CLOSE,
            count = report.users_processed,
            "weekly close finished"
        );
        Ok(report)
    }

    /// Close the month that just ended: snapshot and rank users and circles
    pub async fn run_monthly_close(&self) -> EngineResult<CloseReport> {
        let Some(month) = self.previous_month() else {
            return Ok(CloseReport::default());
        };
        if self.already_ran("monthly", &month).await {
            info!(period = %month, operation = operations::MONTHLY_CLOSE, "already closed, skipping");
            return Ok(CloseReport {
                period: Some(month),
                skipped: true,
                ..CloseReport::default()
            });
        }

        info!(period = %month, operation = operations::MONTHLY_CLOSE, "monthly close started");
        let mut report = CloseReport {
            period: Some(month.clone()),
            ..CloseReport::default()
        };

        for user_id in self.directory.list_users().await? {
            match self
                .scores
                .snapshot_user(&user_id, PeriodType::Monthly, &month)
                .await
            {
                Ok(_) => report.users_processed += 1,
                Err(err) => {
                    report.users_failed += 1;
                    warn!(user_id = %user_id, error = %err, "user snapshot failed");
                }
            }
        }

        if let Some((month_start, _)) = self.period.bounds(&month, PeriodType::Monthly) {
            if let Err(err) = self
                .scores
                .calculate_rankings(PeriodType::Monthly, month_start)
                .await
            {
                warn!(period = %month, error = %err, "user ranking pass failed");
            }
        }

        report.tasks_expired += self.expire_tasks().await;
        report.circles_processed = self.close_circles(PeriodType::Monthly, &month).await;

        self.mark_ran("monthly", month.clone()).await;
        info!(
            period = %month,
            operation = operations::MONTHLY_CLOSE,
            count = report.users_processed,
            "monthly close finished"
        );
        Ok(report)
    }

    /// Key of the month preceding the current one
    fn previous_month(&self) -> Option<PeriodKey> {
        let current = self.period.current_key(PeriodType::Monthly);
        let (start, _) = self.period.bounds(&current, PeriodType::Monthly)?;
        let last_of_previous = start.pred_opt()?;
        Some(self.period.key_for(last_of_previous, PeriodType::Monthly))
    }

    async fn close_circles(&self, period_type: PeriodType, key: &PeriodKey) -> u32 {
        let circles = match self.directory.list_circles().await {
            Ok(circles) => circles,
            Err(err) => {
                warn!(error = %err, "cannot enumerate circles");
                return 0;
            }
        };

        let mut processed = 0u32;
        for circle_id in circles {
            match self.scores.snapshot_circle(&circle_id, period_type, key).await {
                Ok(_) => processed += 1,
                Err(err) => {
                    warn!(circle_id = %circle_id, error = %err, "circle snapshot failed");
                }
            }
        }

        if let Some((start, _)) = self.period.bounds(key, period_type) {
            if let Err(err) = self
                .scores
                .calculate_circle_rankings(period_type, start)
                .await
            {
                warn!(period = %key, error = %err, "circle ranking pass failed");
            }
        }
        processed
    }

    async fn expire_tasks(&self) -> u64 {
        let mut expired = 0u64;
        match self.tasks.expire_old_tasks().await {
            Ok(count) => expired += count,
            Err(err) => warn!(error = %err, "quest expiry failed"),
        }
        match self.circles.expire_old_tasks().await {
            Ok(count) => expired += count,
            Err(err) => warn!(error = %err, "circle quest expiry failed"),
        }
        expired
    }

    async fn already_ran(&self, job: &'static str, key: &PeriodKey) -> bool {
        self.last_run.read().await.get(job) == Some(key)
    }

    async fn mark_ran(&self, job: &'static str, key: PeriodKey) {
        self.last_run.write().await.insert(job, key);
    }
}
