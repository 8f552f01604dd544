//! End-to-end engine tests over the in-memory datastore

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use ql_core::config::{TaskDefinitionSpec, TaskType};
use ql_core::constants::{event_types, notifications, outcome_codes};
use ql_core::period::PeriodService;
use ql_core::rules::RuleEngine;
use ql_core::types::{CircleId, EventType, Metadata, PeriodType, UserId};
use ql_engine::{
    BadgeRuleEngine, BadgeService, CircleTaskService, EventIngestionService, IngestRequest,
    IngestStatus, LedgerService, LevelService, Notifier, RecordingNotifier, ScheduledJobs,
    ScoreService, StaticDirectory, StreakService, TaskProgressService, UserDirectory, UserProfile,
};
use ql_store::{
    BadgeRepository, CircleRepository, Datastore, EventFilter, EventRepository, LedgerRepository,
    MemoryStore, SnapshotRepository, StreakEntity, StreakRepository, TaskRepository, TaskStatus,
    TransitionType,
};

struct Harness {
    store: Arc<MemoryStore>,
    directory: Arc<StaticDirectory>,
    notifier: Arc<RecordingNotifier>,
    period: PeriodService,
    ledger: LedgerService,
    streaks: StreakService,
    tasks: TaskProgressService,
    circles: CircleTaskService,
    ingestion: EventIngestionService,
    levels: LevelService,
    jobs: ScheduledJobs,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    store.init_schema().await.unwrap();
    let datastore: Arc<dyn Datastore> = store.clone();

    let period = PeriodService::utc();
    let directory = StaticDirectory::new();
    let notifier = RecordingNotifier::new();
    let notify: Arc<dyn Notifier> = notifier.clone();
    let lookup: Arc<dyn UserDirectory> = directory.clone();

    let ledger = LedgerService::new(datastore.clone(), period.clone());
    let streaks = StreakService::new(datastore.clone(), ledger.clone(), period.clone());
    let badge_rules = BadgeRuleEngine::new(datastore.clone(), period.clone());
    let badges = BadgeService::new(
        datastore.clone(),
        badge_rules,
        notify.clone(),
        period.clone(),
    );
    let tasks = TaskProgressService::new(
        datastore.clone(),
        ledger.clone(),
        badges.clone(),
        notify.clone(),
        period.clone(),
    );
    let circles = CircleTaskService::new(
        datastore.clone(),
        ledger.clone(),
        badges.clone(),
        tasks.clone(),
        lookup.clone(),
        notify.clone(),
        period.clone(),
    );
    let ingestion = EventIngestionService::new(
        datastore.clone(),
        RuleEngine::new(),
        ledger.clone(),
        streaks.clone(),
        tasks.clone(),
        circles.clone(),
        badges.clone(),
        period.clone(),
    );
    let levels = LevelService::new(
        datastore.clone(),
        ingestion.clone(),
        notify.clone(),
        period.clone(),
    );
    let scores = ScoreService::new(
        datastore.clone(),
        ledger.clone(),
        lookup.clone(),
        period.clone(),
    );
    let jobs = ScheduledJobs::new(
        lookup,
        scores,
        levels.clone(),
        streaks.clone(),
        tasks.clone(),
        circles.clone(),
        period.clone(),
    );

    Harness {
        store,
        directory,
        notifier,
        period,
        ledger,
        streaks,
        tasks,
        circles,
        ingestion,
        levels,
        jobs,
    }
}

fn user(id: &str) -> UserId {
    UserId::new(id)
}

fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn login_scenario_awards_and_deduplicates() {
    let h = harness().await;

    let first = h
        .ingestion
        .ingest(IngestRequest::new(user("u42"), event_types::LOGIN_SUCCESS))
        .await
        .unwrap();
    assert_eq!(first.status, IngestStatus::Valid);
    assert_eq!(first.code, outcome_codes::OK);
    assert_eq!(first.awarded_points, 2);
    assert_eq!(first.daily_remaining, Some(0));
    assert!(first.messages[0].contains('2'));

    // Identical submission dedupes before the limit check
    let second = h
        .ingestion
        .ingest(IngestRequest::new(user("u42"), event_types::LOGIN_SUCCESS))
        .await
        .unwrap();
    assert_eq!(second.status, IngestStatus::Duplicate);
    assert_eq!(second.code, outcome_codes::DUPLICATE);
    assert_eq!(second.event_id, first.event_id);

    // Daily check-in quest completed and paid on top of the login points
    let tasks = h.tasks.progress_of(&user("u42")).await.unwrap();
    let checkin = tasks.iter().find(|t| t.task_slug == "daily-checkin").unwrap();
    assert_eq!(checkin.status, TaskStatus::Completed);
    assert_eq!(h.ledger.balance(&user("u42")).await.unwrap(), 2 + 5);

    // First login also earns the first-steps badge
    let kinds = h.notifier.kinds_for(&user("u42")).await;
    assert!(kinds.iter().any(|k| k == notifications::BADGE_EARNED));
    assert!(kinds.iter().any(|k| k == notifications::TASK_COMPLETED));
}

#[tokio::test]
async fn daily_limit_rejects_second_distinct_submission() {
    let h = harness().await;

    let first = h
        .ingestion
        .ingest(
            IngestRequest::new(user("u1"), event_types::LOGIN_SUCCESS)
                .with_metadata(meta(&[("session", json!("a"))])),
        )
        .await
        .unwrap();
    assert_eq!(first.status, IngestStatus::Valid);

    let second = h
        .ingestion
        .ingest(
            IngestRequest::new(user("u1"), event_types::LOGIN_SUCCESS)
                .with_metadata(meta(&[("session", json!("b"))])),
        )
        .await
        .unwrap();
    assert_eq!(second.status, IngestStatus::Rejected);
    assert_eq!(second.code, outcome_codes::DAILY_LIMIT_EXCEEDED);
    assert_eq!(second.awarded_points, 0);
    assert_eq!(second.daily_remaining, Some(0));

    // The rejected submission is still recorded for audit
    let rejected = h
        .store
        .find_event(&second.event_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rejected.rejection_reason.as_deref(), Some("daily_limit_exceeded"));
    assert_eq!(rejected.points_awarded, 0);
}

#[tokio::test]
async fn daily_limit_resets_on_next_calendar_day() {
    let h = harness().await;
    h.period.set_now(Utc::now());

    let first = h
        .ingestion
        .ingest(IngestRequest::new(user("u1"), event_types::LOGIN_SUCCESS))
        .await
        .unwrap();
    assert_eq!(first.status, IngestStatus::Valid);
    assert_eq!(h
        .ingestion
        .ingest(IngestRequest::new(user("u1"), event_types::LOGIN_SUCCESS))
        .await
        .unwrap()
        .status, IngestStatus::Duplicate);

    // The identical submission scores again once the calendar day turns
    h.period.set_now(Utc::now() + Duration::days(1));
    let next_day = h
        .ingestion
        .ingest(IngestRequest::new(user("u1"), event_types::LOGIN_SUCCESS))
        .await
        .unwrap();
    assert_eq!(next_day.status, IngestStatus::Valid);
    assert_eq!(next_day.code, outcome_codes::OK);
    assert_eq!(next_day.awarded_points, 2);
    assert_ne!(next_day.event_id, first.event_id);
}

#[tokio::test]
async fn metadata_override_beats_default_points() {
    let h = harness().await;

    let outcome = h
        .ingestion
        .ingest(
            IngestRequest::new(user("u7"), event_types::DIET_COMPLETED)
                .with_metadata(meta(&[("diet_points", json!(12))])),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, IngestStatus::Valid);
    assert_eq!(outcome.awarded_points, 12);
}

#[tokio::test]
async fn ledger_balance_equals_sum_of_deltas() {
    let h = harness().await;
    let u = user("u1");

    for i in 0..4 {
        h.ingestion
            .ingest(
                IngestRequest::new(u.clone(), event_types::COMMENT_CREATED)
                    .with_entity("comment", format!("c{i}")),
            )
            .await
            .unwrap();
    }
    h.ledger.add_points(&u, -3, "penalty", None, None).await.unwrap();

    let today = h.period.today();
    let entries = h
        .store
        .entries_between(&u, today - Duration::days(1), today)
        .await
        .unwrap();
    let sum: i64 = entries.iter().map(|e| e.points_delta).sum();
    assert_eq!(h.ledger.balance(&u).await.unwrap(), sum);
}

#[tokio::test]
async fn streak_increment_pays_milestone_bonus() {
    let h = harness().await;
    let u = user("u1");

    // Existing two-day streak ending yesterday
    let mut row = StreakEntity::new(u.clone(), "daily_activity");
    row.state.current_count = 2;
    row.state.longest_count = 2;
    row.state.last_activity_date = Some(h.period.today() - Duration::days(1));
    h.store.upsert_streak(row).await.unwrap();

    let outcome = h.streaks.record_activity(&u, "daily_activity").await.unwrap();
    assert_eq!(outcome.current_streak, 3);
    assert!(outcome.is_new_milestone);
    assert_eq!(outcome.bonus_points, 5);
    assert_eq!(h.ledger.balance(&u).await.unwrap(), 5);

    // The bonus is backed by a durable milestone event linked from the ledger
    let milestones = h
        .store
        .query_events(
            &EventFilter::for_user(u.clone())
                .with_types(vec![EventType::new(event_types::STREAK_MILESTONE)]),
        )
        .await
        .unwrap();
    assert_eq!(milestones.len(), 1);
    assert_eq!(milestones[0].points_awarded, 5);
    let entry = h.store.latest_entry(&u).await.unwrap().unwrap();
    assert_eq!(entry.related_event_id.as_ref(), Some(&milestones[0].id));

    // Same-day re-entry is a no-op
    let again = h.streaks.record_activity(&u, "daily_activity").await.unwrap();
    assert_eq!(again.current_streak, 3);
    assert!(!again.is_new_milestone);
    assert_eq!(h.ledger.balance(&u).await.unwrap(), 5);
}

#[tokio::test]
async fn badge_count_progress_and_single_award() {
    let h = harness().await;
    let u = user("u1");

    // conversation-starter: five comments
    for i in 0..3 {
        h.ingestion
            .ingest(
                IngestRequest::new(u.clone(), event_types::COMMENT_CREATED)
                    .with_entity("comment", format!("c{i}")),
            )
            .await
            .unwrap();
    }
    let badges = h.store.list_user_badges(&u).await.unwrap();
    let starter = badges
        .iter()
        .find(|b| b.badge_slug == "conversation-starter")
        .unwrap();
    assert_eq!(starter.current_progress, 3);
    assert!(!starter.is_earned);

    for i in 3..6 {
        h.ingestion
            .ingest(
                IngestRequest::new(u.clone(), event_types::COMMENT_CREATED)
                    .with_entity("comment", format!("c{i}")),
            )
            .await
            .unwrap();
    }
    let badges = h.store.list_user_badges(&u).await.unwrap();
    let starter = badges
        .iter()
        .find(|b| b.badge_slug == "conversation-starter")
        .unwrap();
    assert!(starter.is_earned);
    assert_eq!(starter.current_progress, 5);

    // Earned exactly once despite the sixth comment
    let earned_notifications = h
        .notifier
        .sent()
        .await
        .into_iter()
        .filter(|(uid, kind, payload)| {
            uid == &u
                && kind == notifications::BADGE_EARNED
                && payload["badge"] == json!("conversation-starter")
        })
        .count();
    assert_eq!(earned_notifications, 1);
}

#[tokio::test]
async fn comment_like_milestone_awarded_once_per_threshold() {
    let h = harness().await;
    let u = user("author");

    let first = h
        .ingestion
        .ingest_comment_like_milestone(u.clone(), "c9", 2, 3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, IngestStatus::Valid);
    assert_eq!(first.awarded_points, 5);

    // Same threshold resubmitted later is a duplicate
    let again = h
        .ingestion
        .ingest_comment_like_milestone(u.clone(), "c9", 2, 4)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(again.status, IngestStatus::Duplicate);
    assert_eq!(h.ledger.balance(&u).await.unwrap(), 5);

    // Below-threshold movement awards nothing
    let none = h
        .ingestion
        .ingest_comment_like_milestone(u.clone(), "c9", 3, 10)
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
async fn circle_task_rewards_members_except_professionals() {
    let h = harness().await;
    let circle = CircleId::new("circle-1");
    let athlete = user("athlete");
    let buddy = user("buddy");
    let coach = user("coach");

    h.directory.add_profile(UserProfile::member(athlete.clone(), "Athlete")).await;
    h.directory.add_profile(UserProfile::member(buddy.clone(), "Buddy")).await;
    h.directory
        .add_profile(UserProfile::professional(coach.clone(), "Coach"))
        .await;
    h.directory
        .add_circle(
            circle.clone(),
            vec![athlete.clone(), buddy.clone(), coach.clone()],
        )
        .await;

    // A short circle quest so two workouts complete it
    h.tasks
        .upsert_definition(TaskDefinitionSpec {
            slug: "circle-sprint".to_string(),
            title: "Circle Sprint".to_string(),
            task_type: TaskType::Circle,
            target_value: 2,
            scoring_event_types: vec![EventType::new(event_types::EXERCISE_COMPLETED)],
            reward_score: 20,
            badge_progress_contribution: 1,
            is_active: true,
        })
        .await
        .unwrap();

    let before_buddy = h.ledger.balance(&buddy).await.unwrap();
    for i in 0..2 {
        h.ingestion
            .ingest(
                IngestRequest::new(athlete.clone(), event_types::EXERCISE_COMPLETED)
                    .with_entity("workout", format!("w{i}")),
            )
            .await
            .unwrap();
    }

    let week = h.period.current_key(PeriodType::Weekly);
    let task = h
        .store
        .get_circle_task(&circle, "circle-sprint", &week)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    let contributions = h.store.contributions_for_task(&task.id).await.unwrap();
    let total: u32 = contributions.iter().map(|c| c.amount).sum();
    assert_eq!(total, 2);
    assert!(contributions.iter().all(|c| c.user_id == athlete));

    // Non-participant member is rewarded, professional is not
    assert_eq!(h.ledger.balance(&buddy).await.unwrap(), before_buddy + 20);
    assert_eq!(h.ledger.balance(&coach).await.unwrap(), 0);
    assert!(h
        .notifier
        .kinds_for(&buddy)
        .await
        .iter()
        .any(|k| k == notifications::CIRCLE_TASK_COMPLETED));
    assert!(h.notifier.kinds_for(&coach).await.is_empty());
}

#[tokio::test]
async fn weekly_exercise_quest_counts_one_event_per_day() {
    let h = harness().await;
    let u = user("u1");

    for i in 0..3 {
        h.ingestion
            .ingest(
                IngestRequest::new(u.clone(), event_types::EXERCISE_COMPLETED)
                    .with_entity("workout", format!("w{i}")),
            )
            .await
            .unwrap();
    }

    let week = h.period.current_key(PeriodType::Weekly);
    let weekly = h
        .store
        .get_user_task(&u, "weekly-workouts", &week)
        .await
        .unwrap()
        .unwrap();
    // Three same-day workouts advance the weekly counter once
    assert_eq!(weekly.current_value, 1);
    assert_eq!(weekly.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn level_close_promotes_and_rewards_top_positions() {
    let h = harness().await;
    h.levels.seed().await.unwrap();

    let mut users = Vec::new();
    for i in 0..12 {
        let u = user(&format!("m{i:02}"));
        h.directory
            .add_profile(UserProfile::member(u.clone(), format!("Member {i}")))
            .await;
        h.levels.ensure_member(&u).await.unwrap();
        // Distinct weekly scores: m00 highest, m11 lowest
        h.ledger
            .add_points(&u, (120 - i * 10) as i64, "seed", None, None)
            .await
            .unwrap();
        users.push(u);
    }

    let week = h.period.current_key(PeriodType::Weekly);
    let outcomes = h.levels.close_week(&week).await.unwrap();
    assert_eq!(outcomes.len(), 12);

    let of = |u: &UserId| outcomes.iter().find(|o| &o.user_id == u).unwrap();
    for u in &users[..5] {
        assert_eq!(of(u).transition, TransitionType::Promote);
    }
    for u in &users[5..] {
        // Bottom tier has no lower tier to demote into
        assert_eq!(of(u).transition, TransitionType::Retain);
    }
    assert_eq!(of(&users[0]).rank_position, 1);
    assert_eq!(of(&users[0]).position_reward, Some(50));
    assert_eq!(of(&users[1]).position_reward, Some(25));
    assert_eq!(of(&users[2]).position_reward, Some(15));
    assert_eq!(of(&users[3]).position_reward, None);

    // Promoted members now sit one tier up
    let (level, membership) = h.levels.current_level(&users[0]).await.unwrap().unwrap();
    assert_eq!(level.name, "Silver");
    assert_eq!(membership.transition, TransitionType::Promote);
    assert!(h
        .notifier
        .kinds_for(&users[0])
        .await
        .iter()
        .any(|k| k == notifications::LEVEL_PROMOTE));

    // Rewards flowed through ingestion: balance reflects the bonus
    assert_eq!(h.ledger.balance(&users[0]).await.unwrap(), 120 + 50);

    // Every member got a snapshot for the week
    let history = h.levels.history_of(&users[11]).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rank_position, 12);
}

#[tokio::test]
async fn level_close_rerun_does_not_double_pay_rewards() {
    let h = harness().await;
    h.levels.seed().await.unwrap();

    let u = user("solo");
    h.directory.add_profile(UserProfile::member(u.clone(), "Solo")).await;
    h.levels.ensure_member(&u).await.unwrap();
    h.ledger.add_points(&u, 40, "seed", None, None).await.unwrap();

    let week = h.period.current_key(PeriodType::Weekly);
    h.levels.close_week(&week).await.unwrap();
    let balance_after_first = h.ledger.balance(&u).await.unwrap();
    assert_eq!(balance_after_first, 40 + 50);

    // Re-running the close submits the same position-reward digest
    h.levels.close_week(&week).await.unwrap();
    assert_eq!(h.ledger.balance(&u).await.unwrap(), balance_after_first);
}

#[tokio::test]
async fn weekly_close_job_is_guarded_against_reruns() {
    let h = harness().await;
    for i in 0..3 {
        h.directory
            .add_profile(UserProfile::member(user(&format!("u{i}")), format!("U{i}")))
            .await;
    }

    let first = h.jobs.run_weekly_close().await.unwrap();
    assert!(!first.skipped);
    assert_eq!(first.users_processed, 3);
    assert_eq!(first.users_failed, 0);

    let again = h.jobs.run_weekly_close().await.unwrap();
    assert!(again.skipped);
    assert_eq!(again.users_processed, 0);

    // The closed week's snapshots exist and are ranked
    let week = first.period.unwrap();
    let (start, _) = h.period.bounds(&week, PeriodType::Weekly).unwrap();
    let snapshots = h
        .store
        .list_user_snapshots(PeriodType::Weekly, start)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 3);
    assert!(snapshots.iter().all(|s| s.rank_position.is_some()));
}

#[tokio::test]
async fn monthly_close_snapshots_previous_month() {
    let h = harness().await;
    h.directory
        .add_profile(UserProfile::member(user("u1"), "U1"))
        .await;

    let report = h.jobs.run_monthly_close().await.unwrap();
    assert!(!report.skipped);
    assert_eq!(report.users_processed, 1);

    let month = report.period.unwrap();
    let (start, _) = h.period.bounds(&month, PeriodType::Monthly).unwrap();
    let snapshots = h
        .store
        .list_user_snapshots(PeriodType::Monthly, start)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].score, 0);
}

#[tokio::test]
async fn expired_quests_are_swept_by_period_key() {
    let h = harness().await;
    let u = user("u1");

    // A weekly quest row left over from a past week
    let stale_key = ql_core::types::PeriodKey::new("2020-W01");
    let stale = ql_store::UserTaskEntity::new(u.clone(), "weekly-workouts", stale_key, 3);
    h.store.upsert_user_task(stale).await.unwrap();

    let expired = h.tasks.expire_old_tasks().await.unwrap();
    assert_eq!(expired, 1);
    let tasks = h.tasks.progress_of(&u).await.unwrap();
    assert_eq!(tasks[0].status, TaskStatus::Expired);
}

#[tokio::test]
async fn ingest_fails_cleanly_when_store_not_ready() {
    let store = Arc::new(MemoryStore::new());
    let datastore: Arc<dyn Datastore> = store.clone();
    let period = PeriodService::utc();
    let directory = StaticDirectory::new();
    let notifier = RecordingNotifier::new();
    let notify: Arc<dyn Notifier> = notifier;
    let lookup: Arc<dyn UserDirectory> = directory;

    let ledger = LedgerService::new(datastore.clone(), period.clone());
    let streaks = StreakService::new(datastore.clone(), ledger.clone(), period.clone());
    let badge_rules = BadgeRuleEngine::new(datastore.clone(), period.clone());
    let badges = BadgeService::new(datastore.clone(), badge_rules, notify.clone(), period.clone());
    let tasks = TaskProgressService::new(
        datastore.clone(),
        ledger.clone(),
        badges.clone(),
        notify.clone(),
        period.clone(),
    );
    let circles = CircleTaskService::new(
        datastore.clone(),
        ledger.clone(),
        badges.clone(),
        tasks.clone(),
        lookup,
        notify,
        period.clone(),
    );
    let ingestion = EventIngestionService::new(
        datastore,
        RuleEngine::new(),
        ledger,
        streaks,
        tasks,
        circles,
        badges,
        period,
    );

    let err = ingestion
        .ingest(IngestRequest::new(user("u1"), event_types::LOGIN_SUCCESS))
        .await
        .unwrap_err();
    assert!(matches!(err, ql_engine::EngineError::NotReady));
    assert_eq!(err.code(), outcome_codes::SERVICE_UNAVAILABLE);
}
