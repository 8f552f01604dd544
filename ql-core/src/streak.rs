//! Streak-advance math
//!
//! Pure state transition for consecutive-activity tracking. A one-day gap
//! continues the streak; a two-day gap can be forgiven by one of the two
//! weekly grace units; anything larger resets the count to 1.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::MAX_WEEKLY_GRACE;

/// Milestone table: streak length to bonus points
const MILESTONES: &[(u32, i64)] = &[(3, 5), (7, 15), (14, 30), (30, 100), (100, 500)];

/// In-memory streak state advanced by [`advance`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_count: u32,
    pub longest_count: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub grace_used_this_week: u32,
}

/// Outcome of advancing a streak by one activity day
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakAdvance {
    /// Activity already recorded for this day; state unchanged
    SameDay,
    /// Streak continued (possibly by consuming a grace unit)
    Incremented { used_grace: bool },
    /// Streak broken; count reset to 1
    Reset,
}

/// Advance `state` for activity on `today`.
///
/// `longest_count` tracks the running maximum. First-ever activity counts as
/// an increment to 1.
pub fn advance(state: &mut StreakState, today: NaiveDate) -> StreakAdvance {
    let outcome = match state.last_activity_date {
        None => {
            state.current_count = 1;
            StreakAdvance::Incremented { used_grace: false }
        }
        Some(last) => {
            let gap = (today - last).num_days();
            match gap {
                d if d <= 0 => return StreakAdvance::SameDay,
                1 => {
                    state.current_count += 1;
                    StreakAdvance::Incremented { used_grace: false }
                }
                2 if state.grace_used_this_week < MAX_WEEKLY_GRACE => {
                    state.grace_used_this_week += 1;
                    state.current_count += 1;
                    StreakAdvance::Incremented { used_grace: true }
                }
                _ => {
                    state.current_count = 1;
                    StreakAdvance::Reset
                }
            }
        }
    };

    state.last_activity_date = Some(today);
    state.longest_count = state.longest_count.max(state.current_count);
    outcome
}

/// Bonus points if the given streak length is exactly a milestone
pub fn milestone_bonus(length: u32) -> Option<i64> {
    MILESTONES
        .iter()
        .find(|(at, _)| *at == length)
        .map(|(_, bonus)| *bonus)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn test_first_activity_starts_at_one() {
        let mut state = StreakState::default();
        let outcome = advance(&mut state, date(1));
        assert_eq!(outcome, StreakAdvance::Incremented { used_grace: false });
        assert_eq!(state.current_count, 1);
        assert_eq!(state.longest_count, 1);
    }

    #[test]
    fn test_same_day_is_noop() {
        let mut state = StreakState::default();
        advance(&mut state, date(1));
        assert_eq!(advance(&mut state, date(1)), StreakAdvance::SameDay);
        assert_eq!(state.current_count, 1);
    }

    #[test]
    fn test_consecutive_days_increment() {
        let mut state = StreakState::default();
        advance(&mut state, date(1));
        advance(&mut state, date(2));
        assert_eq!(state.current_count, 2);
    }

    #[test]
    fn test_two_day_gap_consumes_grace() {
        let mut state = StreakState::default();
        advance(&mut state, date(1));
        advance(&mut state, date(2));
        // day 3 skipped
        let outcome = advance(&mut state, date(4));
        assert_eq!(outcome, StreakAdvance::Incremented { used_grace: true });
        assert_eq!(state.current_count, 3);
        assert_eq!(state.grace_used_this_week, 1);
    }

    #[test]
    fn test_large_gap_resets() {
        let mut state = StreakState::default();
        advance(&mut state, date(1));
        advance(&mut state, date(2));
        advance(&mut state, date(4));
        // gap of 3 days, grace does not apply
        let outcome = advance(&mut state, date(7));
        assert_eq!(outcome, StreakAdvance::Reset);
        assert_eq!(state.current_count, 1);
        assert_eq!(state.longest_count, 3);
    }

    #[test]
    fn test_two_day_gap_without_grace_resets() {
        let mut state = StreakState {
            grace_used_this_week: MAX_WEEKLY_GRACE,
            ..Default::default()
        };
        advance(&mut state, date(1));
        let outcome = advance(&mut state, date(3));
        assert_eq!(outcome, StreakAdvance::Reset);
        assert_eq!(state.current_count, 1);
    }

    #[test]
    fn test_milestone_table() {
        assert_eq!(milestone_bonus(3), Some(5));
        assert_eq!(milestone_bonus(7), Some(15));
        assert_eq!(milestone_bonus(4), None);
        assert_eq!(milestone_bonus(100), Some(500));
    }
}
