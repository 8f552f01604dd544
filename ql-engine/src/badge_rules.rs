//! Badge condition interpreter
//!
//! Evaluates a [`BadgeCondition`] against a user's persisted history. Every
//! variant is dispatched by pattern match; an [`BadgeCondition::Unknown`]
//! condition evaluates to not-passed instead of failing the badge pass.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Utc};

use ql_core::conditions::{BadgeCondition, EventMatcher};
use ql_core::period::PeriodService;
use ql_core::types::{metadata_str, EventType, UserId};
use ql_store::{Datastore, EventEntity, EventFilter};

use crate::error::EngineResult;

/// Outcome of evaluating one condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    pub progress: u32,
    pub max: u32,
}

impl Evaluation {
    fn none() -> Self {
        Self {
            passed: false,
            progress: 0,
            max: 1,
        }
    }

    fn against_target(count: u32, target: u32) -> Self {
        Self {
            passed: count >= target,
            progress: count.min(target),
            max: target,
        }
    }

    /// Progressive conditions are always "passed" and carry no ceiling
    fn progressive(count: u32) -> Self {
        Self {
            passed: true,
            progress: count,
            max: count,
        }
    }
}

/// Interprets declarative badge conditions against persisted history
#[derive(Clone)]
pub struct BadgeRuleEngine {
    store: Arc<dyn Datastore>,
    period: PeriodService,
}

impl BadgeRuleEngine {
    pub fn new(store: Arc<dyn Datastore>, period: PeriodService) -> Self {
        Self { store, period }
    }

    /// Evaluate a condition for a user
    pub async fn evaluate(
        &self,
        user_id: &UserId,
        condition: &BadgeCondition,
    ) -> EngineResult<Evaluation> {
        match condition {
            BadgeCondition::Count {
                event,
                target,
                metadata_field,
                metadata_value,
            } => {
                let events = self.matching_events(user_id, event, None).await?;
                let count = events
                    .iter()
                    .filter(|e| match (metadata_field, metadata_value) {
                        (Some(field), Some(value)) => e.metadata.get(field) == Some(value),
                        (Some(field), None) => e.metadata.contains_key(field),
                        _ => true,
                    })
                    .count() as u32;
                Ok(Evaluation::against_target(count, *target))
            }

            BadgeCondition::CountUniqueDays { event } => {
                let events = self.matching_events(user_id, event, None).await?;
                let days: BTreeSet<NaiveDate> = events.iter().map(|e| e.occurred_on).collect();
                Ok(Evaluation::progressive(days.len() as u32))
            }

            BadgeCondition::Streak {
                streak_type,
                target,
                ..
            } => {
                let current = self
                    .store
                    .get_streak(user_id, streak_type)
                    .await?
                    .map(|row| row.state.current_count)
                    .unwrap_or(0);
                Ok(Evaluation::against_target(current, *target))
            }

            BadgeCondition::ConsecutiveWeeks { event, target } => {
                let events = self.matching_events(user_id, event, None).await?;
                let run = consecutive_week_run(&events);
                Ok(Evaluation::against_target(run, *target))
            }

            BadgeCondition::CountInPeriod {
                event,
                period,
                target,
            } => {
                let bounds = self.period.current_bounds(*period);
                let Some((start, end)) = bounds else {
                    return Ok(Evaluation::none());
                };
                let events = self
                    .matching_events(user_id, event, Some((start, end)))
                    .await?;
                Ok(Evaluation::against_target(events.len() as u32, *target))
            }

            BadgeCondition::Comeback {
                min_gap_days,
                active_days_after,
                lookback_days,
            } => {
                let today = self.period.today();
                let start = today - Duration::days(*lookback_days as i64);
                let matcher = EventMatcher::one(ql_core::constants::event_types::LOGIN_SUCCESS);
                let events = self
                    .matching_events(user_id, &matcher, Some((start, today)))
                    .await?;
                let days: BTreeSet<NaiveDate> = events.iter().map(|e| e.occurred_on).collect();
                let found = has_comeback(&days, *min_gap_days, *active_days_after);
                Ok(Evaluation::against_target(u32::from(found), 1))
            }

            BadgeCondition::CircleContribution {
                share_percent,
                target,
            } => {
                let count = self.contribution_share_count(user_id, *share_percent, None).await?;
                Ok(Evaluation::against_target(count, *target))
            }

            BadgeCondition::CircleHero {
                share_percent,
                target,
                window_days,
            } => {
                let cutoff = Utc::now() - Duration::days(*window_days as i64);
                let count = self
                    .contribution_share_count(user_id, *share_percent, Some(cutoff))
                    .await?;
                Ok(Evaluation::against_target(count, *target))
            }

            BadgeCondition::CountUniqueUsers {
                events,
                counterpart_field,
            } => {
                let filter = EventFilter::for_user(user_id.clone()).with_types(events.clone());
                let rows = self.store.query_events(&filter).await?;
                let counterparts: BTreeSet<String> = rows
                    .iter()
                    .filter_map(|e| metadata_str(&e.metadata, counterpart_field))
                    .map(str::to_string)
                    .collect();
                Ok(Evaluation::progressive(counterparts.len() as u32))
            }

            BadgeCondition::Unknown => Ok(Evaluation::none()),
        }
    }

    /// Fast pre-filter delegated to the condition itself
    pub fn event_matches(event_type: &EventType, condition: &BadgeCondition) -> bool {
        condition.references(event_type)
    }

    async fn matching_events(
        &self,
        user_id: &UserId,
        matcher: &EventMatcher,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> EngineResult<Vec<EventEntity>> {
        let mut filter = EventFilter::for_user(user_id.clone()).with_types(matcher.types());
        if let Some((start, end)) = range {
            filter = filter.between(start, end);
        }
        Ok(self.store.query_events(&filter).await?)
    }

    /// Number of completed circle tasks where this user's share of the total
    /// contribution reached `share_percent`, optionally restricted to tasks
    /// completed after `cutoff`.
    async fn contribution_share_count(
        &self,
        user_id: &UserId,
        share_percent: u32,
        cutoff: Option<chrono::DateTime<Utc>>,
    ) -> EngineResult<u32> {
        let tasks = self.store.list_completed_circle_tasks().await?;
        let mut qualifying = 0u32;
        for task in tasks {
            if let (Some(cutoff), Some(completed_at)) = (cutoff, task.completed_at) {
                if completed_at < cutoff {
                    continue;
                }
            }
            let contributions = self.store.contributions_for_task(&task.id).await?;
            let total: u32 = contributions.iter().map(|c| c.amount).sum();
            if total == 0 {
                continue;
            }
            let mine: u32 = contributions
                .iter()
                .filter(|c| &c.user_id == user_id)
                .map(|c| c.amount)
                .sum();
            if mine * 100 >= total * share_percent {
                if mine > 0 {
                    qualifying += 1;
                }
            }
        }
        Ok(qualifying)
    }
}

/// Run-length of consecutive ISO weeks containing an event, starting from the
/// most recent such week and stopping at the first gap.
fn consecutive_week_run(events: &[EventEntity]) -> u32 {
    let mondays: BTreeSet<NaiveDate> = events
        .iter()
        .map(|e| {
            let days_from_monday = e.occurred_on.weekday().num_days_from_monday() as i64;
            e.occurred_on - Duration::days(days_from_monday)
        })
        .collect();

    let Some(latest) = mondays.iter().next_back().copied() else {
        return 0;
    };

    let mut run = 0u32;
    let mut cursor = latest;
    while mondays.contains(&cursor) {
        run += 1;
        cursor -= Duration::days(7);
    }
    run
}

/// Scan distinct active days (ascending) for a gap of at least `min_gap_days`
/// followed by at least `active_days_after` consecutive active days.
fn has_comeback(days: &BTreeSet<NaiveDate>, min_gap_days: u32, active_days_after: u32) -> bool {
    let ordered: Vec<NaiveDate> = days.iter().copied().collect();
    for i in 1..ordered.len() {
        let gap = (ordered[i] - ordered[i - 1]).num_days();
        if gap < min_gap_days as i64 {
            continue;
        }
        // Count the consecutive run starting at the day after the gap
        let mut run = 1u32;
        let mut j = i;
        while j + 1 < ordered.len() && (ordered[j + 1] - ordered[j]).num_days() == 1 {
            run += 1;
            j += 1;
        }
        if run >= active_days_after {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_comeback_detection() {
        // Active, then a 14-day gap, then 3 consecutive days
        let days: BTreeSet<NaiveDate> =
            [day(1, 1), day(1, 20), day(1, 21), day(1, 22)].into_iter().collect();
        assert!(has_comeback(&days, 14, 3));
        assert!(!has_comeback(&days, 14, 4));
        assert!(!has_comeback(&days, 30, 3));
    }

    #[test]
    fn test_comeback_requires_gap() {
        let days: BTreeSet<NaiveDate> =
            [day(1, 1), day(1, 2), day(1, 3), day(1, 4)].into_iter().collect();
        assert!(!has_comeback(&days, 7, 2));
    }

    #[test]
    fn test_evaluation_against_target_caps_progress() {
        let eval = Evaluation::against_target(9, 5);
        assert!(eval.passed);
        assert_eq!(eval.progress, 5);
        assert_eq!(eval.max, 5);
    }
}
