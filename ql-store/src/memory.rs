//! In-memory datastore
//!
//! Backing store used by tests and single-node deployments. State lives in
//! `tokio::sync::RwLock` maps; every repository method acquires and releases
//! its lock within the call, so no guard is held across an await point.
//!
//! Two correctness-critical behaviors live here rather than in the services:
//! - `insert_event` enforces the idempotency-key uniqueness constraint, so a
//!   lost insert race surfaces as `StoreError::Duplicate`.
//! - `append_entry` computes `balance_after` under the ledger write lock, so
//!   concurrent appends for one user serialize and the running-balance
//!   invariant holds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use ql_core::types::{CircleId, EventId, EventType, PeriodKey, PeriodType, UserId};

use crate::entities::{
    BadgeDefinitionEntity, CircleContributionEntity, CircleTaskEntity, CircleScoreSnapshotEntity,
    EventEntity, EventStatus, LedgerEntryEntity, LevelEntity, LevelSnapshotEntity, NewLedgerEntry,
    StreakEntity, TaskDefinitionEntity, TaskStatus, UserBadgeEntity, UserLevelEntity,
    UserScoreSnapshotEntity, UserTaskEntity,
};
use crate::error::{StoreError, StoreResult};
use crate::repos::{
    BadgeRepository, CircleRepository, Datastore, EventFilter, EventRepository, LedgerRepository,
    LevelRepository, SnapshotRepository, StreakRepository, TaskRepository,
};

const SEP: char = '\u{1f}';

fn k2(a: &str, b: &str) -> String {
    format!("{a}{SEP}{b}")
}

fn k3(a: &str, b: &str, c: &str) -> String {
    format!("{a}{SEP}{b}{SEP}{c}")
}

/// In-process datastore implementing every repository trait
#[derive(Default)]
pub struct MemoryStore {
    ready: AtomicBool,
    /// idempotency_key -> event
    events: RwLock<HashMap<String, EventEntity>>,
    /// user -> append-ordered entries
    ledger: RwLock<HashMap<UserId, Vec<LedgerEntryEntity>>>,
    /// (user, streak_type) -> streak
    streaks: RwLock<HashMap<String, StreakEntity>>,
    /// slug -> dynamic badge definition
    dynamic_badges: RwLock<HashMap<String, BadgeDefinitionEntity>>,
    /// (user, slug) -> progress row
    user_badges: RwLock<HashMap<String, UserBadgeEntity>>,
    /// slug -> dynamic quest definition
    dynamic_tasks: RwLock<HashMap<String, TaskDefinitionEntity>>,
    /// (user, slug, period) -> quest row
    user_tasks: RwLock<HashMap<String, UserTaskEntity>>,
    /// (circle, slug, period) -> circle quest row
    circle_tasks: RwLock<HashMap<String, CircleTaskEntity>>,
    /// (task_id, user, day) -> journal row
    contributions: RwLock<HashMap<String, CircleContributionEntity>>,
    levels: RwLock<Vec<LevelEntity>>,
    user_levels: RwLock<Vec<UserLevelEntity>>,
    /// (user, period_type, period_start) -> snapshot
    user_snapshots: RwLock<HashMap<String, UserScoreSnapshotEntity>>,
    /// (circle, period_type, period_start) -> snapshot
    circle_snapshots: RwLock<HashMap<String, CircleScoreSnapshotEntity>>,
    level_snapshots: RwLock<Vec<LevelSnapshotEntity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_ready(&self) -> StoreResult<()> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotReady)
        }
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn init_schema(&self) -> StoreResult<()> {
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn insert_event(&self, event: EventEntity) -> StoreResult<EventEntity> {
        self.ensure_ready()?;
        let mut events = self.events.write().await;
        if events.contains_key(&event.idempotency_key) {
            return Err(StoreError::Duplicate(event.idempotency_key));
        }
        events.insert(event.idempotency_key.clone(), event.clone());
        Ok(event)
    }

    async fn find_by_idempotency_key(&self, key: &str) -> StoreResult<Option<EventEntity>> {
        self.ensure_ready()?;
        Ok(self.events.read().await.get(key).cloned())
    }

    async fn find_event(&self, id: &EventId) -> StoreResult<Option<EventEntity>> {
        self.ensure_ready()?;
        Ok(self
            .events
            .read()
            .await
            .values()
            .find(|e| &e.id == id)
            .cloned())
    }

    async fn count_valid_on_day(
        &self,
        user_id: &UserId,
        event_type: &EventType,
        day: NaiveDate,
    ) -> StoreResult<u32> {
        self.ensure_ready()?;
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| {
                &e.user_id == user_id
                    && &e.event_type == event_type
                    && e.occurred_on == day
                    && e.status == EventStatus::Valid
            })
            .count() as u32)
    }

    async fn query_events(&self, filter: &EventFilter) -> StoreResult<Vec<EventEntity>> {
        self.ensure_ready()?;
        let events = self.events.read().await;
        let mut matched: Vec<EventEntity> = events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.occurred_at);
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn append_entry(&self, entry: NewLedgerEntry) -> StoreResult<LedgerEntryEntity> {
        self.ensure_ready()?;
        // Single writer per append: balance and sequence are derived from the
        // tail of the user's entry list while the write lock is held.
        let mut ledger = self.ledger.write().await;
        let entries = ledger.entry(entry.user_id.clone()).or_default();
        let (prev_balance, prev_seq) = entries
            .last()
            .map(|e| (e.balance_after, e.sequence_no))
            .unwrap_or((0, 0));
        let delta = entry.points_delta;
        let row = entry.into_entry(prev_balance + delta, prev_seq + 1);
        entries.push(row.clone());
        Ok(row)
    }

    async fn balance(&self, user_id: &UserId) -> StoreResult<i64> {
        self.ensure_ready()?;
        Ok(self
            .ledger
            .read()
            .await
            .get(user_id)
            .and_then(|entries| entries.last())
            .map(|e| e.balance_after)
            .unwrap_or(0))
    }

    async fn latest_entry(&self, user_id: &UserId) -> StoreResult<Option<LedgerEntryEntity>> {
        self.ensure_ready()?;
        Ok(self
            .ledger
            .read()
            .await
            .get(user_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn history(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<LedgerEntryEntity>> {
        self.ensure_ready()?;
        let ledger = self.ledger.read().await;
        let entries = ledger.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(entries
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn entries_between(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<LedgerEntryEntity>> {
        self.ensure_ready()?;
        let ledger = self.ledger.read().await;
        let entries = ledger.get(user_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(entries
            .iter()
            .filter(|e| e.created_on >= start && e.created_on <= end)
            .cloned()
            .collect())
    }

    async fn total_earned_between(
        &self,
        user_id: &UserId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<i64> {
        let entries = self.entries_between(user_id, start, end).await?;
        Ok(entries
            .iter()
            .filter(|e| e.points_delta > 0)
            .map(|e| e.points_delta)
            .sum())
    }
}

#[async_trait]
impl StreakRepository for MemoryStore {
    async fn get_streak(
        &self,
        user_id: &UserId,
        streak_type: &str,
    ) -> StoreResult<Option<StreakEntity>> {
        self.ensure_ready()?;
        Ok(self
            .streaks
            .read()
            .await
            .get(&k2(user_id.as_str(), streak_type))
            .cloned())
    }

    async fn upsert_streak(&self, streak: StreakEntity) -> StoreResult<StreakEntity> {
        self.ensure_ready()?;
        let key = k2(streak.user_id.as_str(), &streak.streak_type);
        self.streaks.write().await.insert(key, streak.clone());
        Ok(streak)
    }

    async fn reset_all_grace(&self) -> StoreResult<u64> {
        self.ensure_ready()?;
        let mut streaks = self.streaks.write().await;
        let mut touched = 0;
        for streak in streaks.values_mut() {
            if streak.state.grace_used_this_week != 0 {
                streak.state.grace_used_this_week = 0;
                streak.touch();
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[async_trait]
impl BadgeRepository for MemoryStore {
    async fn list_dynamic_badges(&self) -> StoreResult<Vec<BadgeDefinitionEntity>> {
        self.ensure_ready()?;
        Ok(self.dynamic_badges.read().await.values().cloned().collect())
    }

    async fn upsert_dynamic_badge(
        &self,
        definition: BadgeDefinitionEntity,
    ) -> StoreResult<BadgeDefinitionEntity> {
        self.ensure_ready()?;
        self.dynamic_badges
            .write()
            .await
            .insert(definition.slug.clone(), definition.clone());
        Ok(definition)
    }

    async fn get_user_badge(
        &self,
        user_id: &UserId,
        slug: &str,
    ) -> StoreResult<Option<UserBadgeEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_badges
            .read()
            .await
            .get(&k2(user_id.as_str(), slug))
            .cloned())
    }

    async fn upsert_user_badge(&self, badge: UserBadgeEntity) -> StoreResult<UserBadgeEntity> {
        self.ensure_ready()?;
        let key = k2(badge.user_id.as_str(), &badge.badge_slug);
        self.user_badges.write().await.insert(key, badge.clone());
        Ok(badge)
    }

    async fn list_user_badges(&self, user_id: &UserId) -> StoreResult<Vec<UserBadgeEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_badges
            .read()
            .await
            .values()
            .filter(|b| &b.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TaskRepository for MemoryStore {
    async fn list_dynamic_tasks(&self) -> StoreResult<Vec<TaskDefinitionEntity>> {
        self.ensure_ready()?;
        Ok(self.dynamic_tasks.read().await.values().cloned().collect())
    }

    async fn upsert_dynamic_task(
        &self,
        definition: TaskDefinitionEntity,
    ) -> StoreResult<TaskDefinitionEntity> {
        self.ensure_ready()?;
        self.dynamic_tasks
            .write()
            .await
            .insert(definition.slug.clone(), definition.clone());
        Ok(definition)
    }

    async fn get_user_task(
        &self,
        user_id: &UserId,
        slug: &str,
        period_key: &PeriodKey,
    ) -> StoreResult<Option<UserTaskEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_tasks
            .read()
            .await
            .get(&k3(user_id.as_str(), slug, period_key.as_str()))
            .cloned())
    }

    async fn upsert_user_task(&self, task: UserTaskEntity) -> StoreResult<UserTaskEntity> {
        self.ensure_ready()?;
        let key = k3(
            task.user_id.as_str(),
            &task.task_slug,
            task.period_key.as_str(),
        );
        self.user_tasks.write().await.insert(key, task.clone());
        Ok(task)
    }

    async fn list_user_tasks(&self, user_id: &UserId) -> StoreResult<Vec<UserTaskEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_tasks
            .read()
            .await
            .values()
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_tasks_in_progress(&self) -> StoreResult<Vec<UserTaskEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == TaskStatus::InProgress)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CircleRepository for MemoryStore {
    async fn get_circle_task(
        &self,
        circle_id: &CircleId,
        slug: &str,
        period_key: &PeriodKey,
    ) -> StoreResult<Option<CircleTaskEntity>> {
        self.ensure_ready()?;
        Ok(self
            .circle_tasks
            .read()
            .await
            .get(&k3(circle_id.as_str(), slug, period_key.as_str()))
            .cloned())
    }

    async fn upsert_circle_task(&self, task: CircleTaskEntity) -> StoreResult<CircleTaskEntity> {
        self.ensure_ready()?;
        let key = k3(
            task.circle_id.as_str(),
            &task.task_slug,
            task.period_key.as_str(),
        );
        self.circle_tasks.write().await.insert(key, task.clone());
        Ok(task)
    }

    async fn list_circle_tasks_in_progress(&self) -> StoreResult<Vec<CircleTaskEntity>> {
        self.ensure_ready()?;
        Ok(self
            .circle_tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == TaskStatus::InProgress)
            .cloned()
            .collect())
    }

    async fn list_completed_circle_tasks(&self) -> StoreResult<Vec<CircleTaskEntity>> {
        self.ensure_ready()?;
        Ok(self
            .circle_tasks
            .read()
            .await
            .values()
            .filter(|t| t.status == TaskStatus::Completed)
            .cloned()
            .collect())
    }

    async fn add_contribution(
        &self,
        circle_task_id: &str,
        user_id: &UserId,
        day: NaiveDate,
        amount: u32,
    ) -> StoreResult<CircleContributionEntity> {
        self.ensure_ready()?;
        let key = k3(circle_task_id, user_id.as_str(), &day.to_string());
        let mut contributions = self.contributions.write().await;
        let row = contributions
            .entry(key)
            .or_insert_with(|| CircleContributionEntity::new(circle_task_id, user_id.clone(), day));
        row.amount += amount;
        Ok(row.clone())
    }

    async fn contributions_for_task(
        &self,
        circle_task_id: &str,
    ) -> StoreResult<Vec<CircleContributionEntity>> {
        self.ensure_ready()?;
        Ok(self
            .contributions
            .read()
            .await
            .values()
            .filter(|c| c.circle_task_id == circle_task_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LevelRepository for MemoryStore {
    async fn seed_levels(&self, seed: Vec<LevelEntity>) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut levels = self.levels.write().await;
        if levels.is_empty() {
            *levels = seed;
            levels.sort_by_key(|l| l.rank_order);
        }
        Ok(())
    }

    async fn list_levels(&self) -> StoreResult<Vec<LevelEntity>> {
        self.ensure_ready()?;
        Ok(self.levels.read().await.clone())
    }

    async fn find_level(&self, level_id: &str) -> StoreResult<Option<LevelEntity>> {
        self.ensure_ready()?;
        Ok(self
            .levels
            .read()
            .await
            .iter()
            .find(|l| l.id == level_id)
            .cloned())
    }

    async fn find_level_by_rank(&self, rank_order: u32) -> StoreResult<Option<LevelEntity>> {
        self.ensure_ready()?;
        Ok(self
            .levels
            .read()
            .await
            .iter()
            .find(|l| l.rank_order == rank_order)
            .cloned())
    }

    async fn current_level_of(&self, user_id: &UserId) -> StoreResult<Option<UserLevelEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_levels
            .read()
            .await
            .iter()
            .find(|ul| &ul.user_id == user_id && ul.is_current)
            .cloned())
    }

    async fn insert_user_level(&self, row: UserLevelEntity) -> StoreResult<UserLevelEntity> {
        self.ensure_ready()?;
        self.user_levels.write().await.push(row.clone());
        Ok(row)
    }

    async fn close_user_level(&self, row_id: &str, left_at: DateTime<Utc>) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut rows = self.user_levels.write().await;
        let row = rows
            .iter_mut()
            .find(|ul| ul.id == row_id)
            .ok_or_else(|| StoreError::not_found("UserLevel", row_id))?;
        row.is_current = false;
        row.left_at = Some(left_at);
        Ok(())
    }

    async fn members_of_level(&self, level_id: &str) -> StoreResult<Vec<UserLevelEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_levels
            .read()
            .await
            .iter()
            .filter(|ul| ul.level_id == level_id && ul.is_current)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SnapshotRepository for MemoryStore {
    async fn upsert_user_snapshot(
        &self,
        snapshot: UserScoreSnapshotEntity,
    ) -> StoreResult<UserScoreSnapshotEntity> {
        self.ensure_ready()?;
        let key = k3(
            snapshot.user_id.as_str(),
            snapshot.period_type.as_str(),
            &snapshot.period_start.to_string(),
        );
        self.user_snapshots
            .write()
            .await
            .insert(key, snapshot.clone());
        Ok(snapshot)
    }

    async fn list_user_snapshots(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> StoreResult<Vec<UserScoreSnapshotEntity>> {
        self.ensure_ready()?;
        Ok(self
            .user_snapshots
            .read()
            .await
            .values()
            .filter(|s| s.period_type == period_type && s.period_start == period_start)
            .cloned()
            .collect())
    }

    async fn upsert_circle_snapshot(
        &self,
        snapshot: CircleScoreSnapshotEntity,
    ) -> StoreResult<CircleScoreSnapshotEntity> {
        self.ensure_ready()?;
        let key = k3(
            snapshot.circle_id.as_str(),
            snapshot.period_type.as_str(),
            &snapshot.period_start.to_string(),
        );
        self.circle_snapshots
            .write()
            .await
            .insert(key, snapshot.clone());
        Ok(snapshot)
    }

    async fn list_circle_snapshots(
        &self,
        period_type: PeriodType,
        period_start: NaiveDate,
    ) -> StoreResult<Vec<CircleScoreSnapshotEntity>> {
        self.ensure_ready()?;
        Ok(self
            .circle_snapshots
            .read()
            .await
            .values()
            .filter(|s| s.period_type == period_type && s.period_start == period_start)
            .cloned()
            .collect())
    }

    async fn insert_level_snapshot(
        &self,
        snapshot: LevelSnapshotEntity,
    ) -> StoreResult<LevelSnapshotEntity> {
        self.ensure_ready()?;
        self.level_snapshots.write().await.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list_level_snapshots(
        &self,
        user_id: &UserId,
    ) -> StoreResult<Vec<LevelSnapshotEntity>> {
        self.ensure_ready()?;
        Ok(self
            .level_snapshots
            .read()
            .await
            .iter()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    async fn ready_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.init_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_not_ready_until_provisioned() {
        let store = MemoryStore::new();
        let err = store.balance(&UserId::new("u1")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotReady));
        store.init_schema().await.unwrap();
        assert_eq!(store.balance(&UserId::new("u1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_event_idempotency_key_unique() {
        let store = ready_store().await;
        let event = EventEntity::new(
            UserId::new("u1"),
            EventType::from("login_success"),
            "same-key",
            "test",
            day(1),
        );
        store.insert_event(event.clone()).await.unwrap();

        let second = EventEntity::new(
            UserId::new("u1"),
            EventType::from("login_success"),
            "same-key",
            "test",
            day(1),
        );
        let err = store.insert_event(second).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.events.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_append_chains_balances() {
        let store = ready_store().await;
        let user = UserId::new("u1");

        let first = store
            .append_entry(NewLedgerEntry::new(user.clone(), 10, "a", day(1)))
            .await
            .unwrap();
        let second = store
            .append_entry(NewLedgerEntry::new(user.clone(), -3, "b", day(2)))
            .await
            .unwrap();

        assert_eq!(first.balance_after, 10);
        assert_eq!(first.sequence_no, 1);
        assert_eq!(second.balance_after, 7);
        assert_eq!(second.sequence_no, 2);
        assert_eq!(store.balance(&user).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_concurrent_appends_preserve_invariant() {
        use std::sync::Arc;

        let store = Arc::new(ready_store().await);
        let user = UserId::new("u1");

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_entry(NewLedgerEntry::new(user, i % 7 + 1, "spin", day(1)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = store.entries_between(&user, day(1), day(1)).await.unwrap();
        let sum: i64 = entries.iter().map(|e| e.points_delta).sum();
        assert_eq!(store.balance(&user).await.unwrap(), sum);
        let last = store.latest_entry(&user).await.unwrap().unwrap();
        assert_eq!(last.balance_after, sum);
        assert_eq!(last.sequence_no, 50);
    }

    #[tokio::test]
    async fn test_total_earned_ignores_negative_deltas() {
        let store = ready_store().await;
        let user = UserId::new("u1");
        store
            .append_entry(NewLedgerEntry::new(user.clone(), 10, "earn", day(1)))
            .await
            .unwrap();
        store
            .append_entry(NewLedgerEntry::new(user.clone(), -4, "spend", day(1)))
            .await
            .unwrap();
        assert_eq!(
            store.total_earned_between(&user, day(1), day(1)).await.unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_snapshot_upsert_replaces_same_period() {
        let store = ready_store().await;
        let user = UserId::new("u1");
        let snap = UserScoreSnapshotEntity::new(user.clone(), PeriodType::Weekly, day(7), day(13), 5);
        store.upsert_user_snapshot(snap).await.unwrap();
        let snap2 =
            UserScoreSnapshotEntity::new(user.clone(), PeriodType::Weekly, day(7), day(13), 9);
        store.upsert_user_snapshot(snap2).await.unwrap();

        let all = store
            .list_user_snapshots(PeriodType::Weekly, day(7))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].score, 9);
    }

    #[tokio::test]
    async fn test_contribution_journal_accumulates_per_day() {
        let store = ready_store().await;
        let user = UserId::new("u1");
        store.add_contribution("t1", &user, day(1), 1).await.unwrap();
        store.add_contribution("t1", &user, day(1), 1).await.unwrap();
        store.add_contribution("t1", &user, day(2), 1).await.unwrap();

        let rows = store.contributions_for_task("t1").await.unwrap();
        assert_eq!(rows.len(), 2);
        let total: u32 = rows.iter().map(|r| r.amount).sum();
        assert_eq!(total, 3);
    }
}
