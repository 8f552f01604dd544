//! Scoring rule table
//!
//! The single source of truth for "how many points does X give". Pure lookup,
//! no I/O, trivially unit-testable:
//! 1. Base points per event type
//! 2. Metadata overrides for the few types whose value is carried by the
//!    caller (diet / exercise logs, milestone bonuses, position rewards)
//! 3. Daily scoring limits for a fixed subset of types
//! 4. User-facing message templates

use crate::constants::{event_types, metadata_keys};
use crate::types::{metadata_i64, EventType, Metadata};

/// Base point values per event type
const BASE_POINTS: &[(&str, i64)] = &[
    (event_types::LOGIN_SUCCESS, 2),
    (event_types::BLOG_LIKED, 1),
    (event_types::BLOG_POST_CREATED, 3),
    (event_types::COMMENT_CREATED, 1),
    (event_types::COMMENT_LIKE_MILESTONE, 5),
    (event_types::DIET_COMPLETED, 10),
    (event_types::EXERCISE_COMPLETED, 15),
    (event_types::PROFILE_COMPLETED, 5),
    (event_types::FRIEND_INVITED, 3),
    (event_types::MESSAGE_SENT, 1),
    (event_types::STREAK_MILESTONE, 0),
    (event_types::POSITION_REWARD, 0),
];

/// Event types whose point value may be overridden by a metadata field
const OVERRIDES: &[(&str, &str)] = &[
    (event_types::DIET_COMPLETED, metadata_keys::DIET_POINTS),
    (event_types::EXERCISE_COMPLETED, metadata_keys::EXERCISE_POINTS),
    (event_types::COMMENT_LIKE_MILESTONE, metadata_keys::BONUS_POINTS),
    (event_types::STREAK_MILESTONE, metadata_keys::BONUS_POINTS),
    (event_types::POSITION_REWARD, metadata_keys::REWARD_POINTS),
];

/// Daily scoring limits; absence means unlimited
const DAILY_LIMITS: &[(&str, u32)] = &[
    (event_types::LOGIN_SUCCESS, 1),
    (event_types::BLOG_LIKED, 5),
];

/// Stateless event-to-points lookup
#[derive(Clone, Debug, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Points awarded for an event of the given type.
    ///
    /// Unknown event types award zero. Override fields take precedence over
    /// the base value but never go negative.
    pub fn calculate_points(&self, event_type: &EventType, metadata: &Metadata) -> i64 {
        let base = BASE_POINTS
            .iter()
            .find(|(t, _)| *t == event_type.as_str())
            .map(|(_, p)| *p)
            .unwrap_or(0);

        let overridden = OVERRIDES
            .iter()
            .find(|(t, _)| *t == event_type.as_str())
            .and_then(|(_, key)| metadata_i64(metadata, key));

        overridden.unwrap_or(base).max(0)
    }

    /// Daily scoring limit for the event type, if any
    pub fn daily_limit(&self, event_type: &EventType) -> Option<u32> {
        DAILY_LIMITS
            .iter()
            .find(|(t, _)| *t == event_type.as_str())
            .map(|(_, limit)| *limit)
    }

    /// User-facing message for an awarded event; zero points renders empty.
    pub fn message(&self, event_type: &EventType, points: i64, _metadata: &Metadata) -> String {
        if points == 0 {
            return String::new();
        }
        match event_type.as_str() {
            event_types::LOGIN_SUCCESS => {
                format!("You earned {points} points for logging in today.")
            }
            event_types::BLOG_LIKED => {
                format!("Your post was liked! +{points} points.")
            }
            event_types::BLOG_POST_CREATED => {
                format!("You earned {points} points for publishing a post.")
            }
            event_types::COMMENT_CREATED => {
                format!("You earned {points} points for commenting.")
            }
            event_types::COMMENT_LIKE_MILESTONE => {
                format!("Your comment is popular! Bonus of {points} points.")
            }
            event_types::DIET_COMPLETED => {
                format!("Diet logged. You earned {points} points.")
            }
            event_types::EXERCISE_COMPLETED => {
                format!("Workout complete! You earned {points} points.")
            }
            event_types::PROFILE_COMPLETED => {
                format!("Profile complete. You earned {points} points.")
            }
            event_types::FRIEND_INVITED => {
                format!("Thanks for spreading the word! +{points} points.")
            }
            event_types::STREAK_MILESTONE => {
                format!("Streak milestone reached! Bonus of {points} points.")
            }
            event_types::POSITION_REWARD => {
                format!("League position reward: +{points} points.")
            }
            _ => format!("You earned {points} points."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, serde_json::Value)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_fixed_point_values() {
        let rules = RuleEngine::new();
        let empty = Metadata::new();
        assert_eq!(
            rules.calculate_points(&EventType::from("login_success"), &empty),
            2
        );
        assert_eq!(
            rules.calculate_points(&EventType::from("comment_created"), &empty),
            1
        );
        assert_eq!(
            rules.calculate_points(&EventType::from("unknown_event"), &empty),
            0
        );
    }

    #[test]
    fn test_diet_override_beats_default() {
        let rules = RuleEngine::new();
        let metadata = meta(&[("diet_points", json!(12))]);
        assert_eq!(
            rules.calculate_points(&EventType::from("diet_completed"), &metadata),
            12
        );
        assert_eq!(
            rules.calculate_points(&EventType::from("diet_completed"), &Metadata::new()),
            10
        );
    }

    #[test]
    fn test_override_only_applies_to_listed_types() {
        let rules = RuleEngine::new();
        let metadata = meta(&[("bonus_points", json!(99))]);
        assert_eq!(
            rules.calculate_points(&EventType::from("login_success"), &metadata),
            2
        );
    }

    #[test]
    fn test_negative_override_clamped_to_zero() {
        let rules = RuleEngine::new();
        let metadata = meta(&[("exercise_points", json!(-5))]);
        assert_eq!(
            rules.calculate_points(&EventType::from("exercise_completed"), &metadata),
            0
        );
    }

    #[test]
    fn test_daily_limits() {
        let rules = RuleEngine::new();
        assert_eq!(rules.daily_limit(&EventType::from("login_success")), Some(1));
        assert_eq!(rules.daily_limit(&EventType::from("blog_liked")), Some(5));
        assert_eq!(rules.daily_limit(&EventType::from("diet_completed")), None);
    }

    #[test]
    fn test_message_contains_points() {
        let rules = RuleEngine::new();
        let msg = rules.message(&EventType::from("login_success"), 2, &Metadata::new());
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_zero_points_renders_empty_message() {
        let rules = RuleEngine::new();
        let msg = rules.message(&EventType::from("login_success"), 0, &Metadata::new());
        assert!(msg.is_empty());
    }
}
