//! Badge condition sum type
//!
//! Declarative achievement conditions interpreted by the engine's
//! `BadgeRuleEngine`. Each variant carries its own typed parameters and is
//! dispatched by pattern match; unrecognized payloads deserialize into
//! [`BadgeCondition::Unknown`] and evaluate to "not passed" rather than
//! failing the whole badge pass.

use serde::{Deserialize, Serialize};

use crate::types::{EventType, PeriodType};

/// Matches either a single event type or any member of a set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventMatcher {
    One(EventType),
    Any(Vec<EventType>),
}

impl EventMatcher {
    pub fn one(event: impl Into<String>) -> Self {
        Self::One(EventType::new(event))
    }

    pub fn any<I, S>(events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Any(events.into_iter().map(EventType::new).collect())
    }

    pub fn matches(&self, event_type: &EventType) -> bool {
        match self {
            Self::One(e) => e == event_type,
            Self::Any(set) => set.contains(event_type),
        }
    }

    /// All event types this matcher references
    pub fn types(&self) -> Vec<EventType> {
        match self {
            Self::One(e) => vec![e.clone()],
            Self::Any(set) => set.clone(),
        }
    }
}

/// Declarative badge condition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BadgeCondition {
    /// Count of matching events vs a fixed target, with an optional metadata
    /// field filter.
    Count {
        event: EventMatcher,
        target: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata_field: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata_value: Option<serde_json::Value>,
    },
    /// Distinct calendar days with a matching event; progressive, no ceiling.
    CountUniqueDays { event: EventMatcher },
    /// A named streak's current count vs a target.
    Streak {
        event: EventMatcher,
        streak_type: String,
        target: u32,
    },
    /// Run-length of consecutive ISO weeks containing a matching event,
    /// most recent first.
    ConsecutiveWeeks { event: EventMatcher, target: u32 },
    /// Count of matching events within the current period.
    CountInPeriod {
        event: EventMatcher,
        period: PeriodType,
        target: u32,
    },
    /// A login gap of at least `min_gap_days` followed by at least
    /// `active_days_after` consecutive active days.
    Comeback {
        min_gap_days: u32,
        active_days_after: u32,
        #[serde(default = "default_comeback_lookback")]
        lookback_days: u32,
    },
    /// Count of completed circle tasks where the user's contribution share
    /// reached `share_percent`.
    CircleContribution { share_percent: u32, target: u32 },
    /// Same as `CircleContribution`, restricted to a trailing window.
    CircleHero {
        share_percent: u32,
        target: u32,
        window_days: u32,
    },
    /// Distinct counterpart user ids referenced across a set of event types;
    /// progressive.
    CountUniqueUsers {
        events: Vec<EventType>,
        counterpart_field: String,
    },
    /// Condition type not understood by this engine version.
    #[serde(other)]
    Unknown,
}

fn default_comeback_lookback() -> u32 {
    60
}

impl BadgeCondition {
    /// Fast pre-filter: does an event of this type possibly move this
    /// condition forward? Used to avoid evaluating every badge on every
    /// event.
    pub fn references(&self, event_type: &EventType) -> bool {
        use crate::constants::event_types;
        match self {
            Self::Count { event, .. }
            | Self::CountUniqueDays { event }
            | Self::Streak { event, .. }
            | Self::ConsecutiveWeeks { event, .. }
            | Self::CountInPeriod { event, .. } => event.matches(event_type),
            Self::Comeback { .. } => event_type.as_str() == event_types::LOGIN_SUCCESS,
            Self::CircleContribution { .. } | Self::CircleHero { .. } => {
                event_type.as_str() == event_types::CIRCLE_TASK_COMPLETED
            }
            Self::CountUniqueUsers { events, .. } => events.contains(event_type),
            Self::Unknown => false,
        }
    }

    /// Fixed progress ceiling, when the condition has one
    pub fn fixed_target(&self) -> Option<u32> {
        match self {
            Self::Count { target, .. }
            | Self::Streak { target, .. }
            | Self::ConsecutiveWeeks { target, .. }
            | Self::CountInPeriod { target, .. }
            | Self::CircleContribution { target, .. }
            | Self::CircleHero { target, .. } => Some(*target),
            Self::Comeback { .. } => Some(1),
            Self::CountUniqueDays { .. } | Self::CountUniqueUsers { .. } => None,
            Self::Unknown => Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_matcher_single_and_set() {
        let one = EventMatcher::one("login_success");
        assert!(one.matches(&EventType::from("login_success")));
        assert!(!one.matches(&EventType::from("blog_liked")));

        let any = EventMatcher::any(["diet_completed", "exercise_completed"]);
        assert!(any.matches(&EventType::from("diet_completed")));
        assert!(!any.matches(&EventType::from("login_success")));
    }

    #[test]
    fn test_tagged_deserialization() {
        let condition: BadgeCondition = serde_json::from_value(json!({
            "type": "count",
            "event": "comment_created",
            "target": 5
        }))
        .unwrap();
        assert_eq!(
            condition,
            BadgeCondition::Count {
                event: EventMatcher::one("comment_created"),
                target: 5,
                metadata_field: None,
                metadata_value: None,
            }
        );
    }

    #[test]
    fn test_unknown_type_deserializes_to_unknown() {
        let condition: BadgeCondition =
            serde_json::from_value(json!({ "type": "hologram_affinity" })).unwrap();
        assert_eq!(condition, BadgeCondition::Unknown);
        assert!(!condition.references(&EventType::from("login_success")));
    }

    #[test]
    fn test_references_prefilter() {
        let condition = BadgeCondition::Count {
            event: EventMatcher::one("blog_liked"),
            target: 10,
            metadata_field: None,
            metadata_value: None,
        };
        assert!(condition.references(&EventType::from("blog_liked")));
        assert!(!condition.references(&EventType::from("login_success")));

        let comeback = BadgeCondition::Comeback {
            min_gap_days: 7,
            active_days_after: 3,
            lookback_days: 60,
        };
        assert!(comeback.references(&EventType::from("login_success")));
    }

    #[test]
    fn test_comeback_lookback_default() {
        let condition: BadgeCondition = serde_json::from_value(json!({
            "type": "comeback",
            "min_gap_days": 7,
            "active_days_after": 3
        }))
        .unwrap();
        match condition {
            BadgeCondition::Comeback { lookback_days, .. } => assert_eq!(lookback_days, 60),
            other => panic!("unexpected condition: {other:?}"),
        }
    }
}
