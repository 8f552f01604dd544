//! Period-key arithmetic
//!
//! Canonical string keys for scoring periods, computed in a fixed timezone:
//! - daily: `YYYY-MM-DD`
//! - weekly: `YYYY-Www` (ISO week, Monday start)
//! - monthly: `YYYY-MM`
//!
//! Key math is deterministic for a given wall-clock instant and offset.
//! Parsing a key back into date bounds returns `None` for malformed keys;
//! callers treat an unparsable key as "skip", never as an error.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc, Weekday};

use crate::types::{PeriodKey, PeriodType};

/// Period-key service pinned to a fixed timezone offset
///
/// Clones share the same clock override, so pinning `now` on one handle
/// moves every service holding a clone of it.
#[derive(Clone, Debug)]
pub struct PeriodService {
    offset: FixedOffset,
    pinned: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl PeriodService {
    /// Create a service for the given fixed offset
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            pinned: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a service pinned to UTC
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Current instant in the service timezone
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.instant().with_timezone(&self.offset)
    }

    /// Pin the wall clock to a fixed instant. Subsequent `now` and `today`
    /// calls on this service and all of its clones observe the pinned
    /// instant; used by tests that cross a day or period boundary.
    pub fn set_now(&self, instant: DateTime<Utc>) {
        match self.pinned.write() {
            Ok(mut pinned) => *pinned = Some(instant),
            Err(poisoned) => *poisoned.into_inner() = Some(instant),
        }
    }

    fn instant(&self) -> DateTime<Utc> {
        let pinned = match self.pinned.read() {
            Ok(pinned) => *pinned,
            Err(poisoned) => *poisoned.into_inner(),
        };
        pinned.unwrap_or_else(Utc::now)
    }

    /// Current calendar date in the service timezone
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Canonical key for the current period of the given type
    pub fn current_key(&self, period: PeriodType) -> PeriodKey {
        self.key_for(self.today(), period)
    }

    /// Canonical key for the period containing `date`
    pub fn key_for(&self, date: NaiveDate, period: PeriodType) -> PeriodKey {
        let key = match period {
            PeriodType::Daily => date.format("%Y-%m-%d").to_string(),
            PeriodType::Weekly => {
                let iso = date.iso_week();
                format!("{:04}-W{:02}", iso.year(), iso.week())
            }
            PeriodType::Monthly => date.format("%Y-%m").to_string(),
        };
        PeriodKey::new(key)
    }

    /// Inclusive date bounds for a period key, or `None` if the key does not
    /// parse as a key of the given type.
    pub fn bounds(&self, key: &PeriodKey, period: PeriodType) -> Option<(NaiveDate, NaiveDate)> {
        match period {
            PeriodType::Daily => {
                let day = NaiveDate::parse_from_str(key.as_str(), "%Y-%m-%d").ok()?;
                Some((day, day))
            }
            PeriodType::Weekly => {
                let raw = key.as_str();
                if raw.len() != 8 || &raw[4..6] != "-W" {
                    return None;
                }
                let year: i32 = raw[..4].parse().ok()?;
                let week: u32 = raw[6..8].parse().ok()?;
                let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
                Some((monday, monday + Duration::days(6)))
            }
            PeriodType::Monthly => {
                let raw = key.as_str();
                if raw.len() != 7 || raw.as_bytes().get(4) != Some(&b'-') {
                    return None;
                }
                let year: i32 = raw[..4].parse().ok()?;
                let month: u32 = raw[5..7].parse().ok()?;
                let first = NaiveDate::from_ymd_opt(year, month, 1)?;
                let next = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                Some((first, next - Duration::days(1)))
            }
        }
    }

    /// Bounds of the current period of the given type
    pub fn current_bounds(&self, period: PeriodType) -> Option<(NaiveDate, NaiveDate)> {
        self.bounds(&self.current_key(period), period)
    }

    /// ISO week key preceding the given weekly key, or `None` if the key is
    /// malformed.
    pub fn previous_week(&self, key: &PeriodKey) -> Option<PeriodKey> {
        let (monday, _) = self.bounds(key, PeriodType::Weekly)?;
        Some(self.key_for(monday - Duration::days(7), PeriodType::Weekly))
    }
}

impl Default for PeriodService {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_key_roundtrip() {
        let svc = PeriodService::utc();
        let key = svc.key_for(date(2025, 3, 9), PeriodType::Daily);
        assert_eq!(key.as_str(), "2025-03-09");
        assert_eq!(
            svc.bounds(&key, PeriodType::Daily),
            Some((date(2025, 3, 9), date(2025, 3, 9)))
        );
    }

    #[test]
    fn test_weekly_key_is_iso_week() {
        let svc = PeriodService::utc();
        // 2024-12-30 is a Monday belonging to ISO week 2025-W01
        let key = svc.key_for(date(2024, 12, 30), PeriodType::Weekly);
        assert_eq!(key.as_str(), "2025-W01");
        let (start, end) = svc.bounds(&key, PeriodType::Weekly).unwrap();
        assert_eq!(start, date(2024, 12, 30));
        assert_eq!(end, date(2025, 1, 5));
    }

    #[test]
    fn test_weekly_start_is_monday() {
        let svc = PeriodService::utc();
        let key = svc.key_for(date(2025, 3, 9), PeriodType::Weekly);
        let (start, _) = svc.bounds(&key, PeriodType::Weekly).unwrap();
        assert_eq!(start.weekday(), Weekday::Mon);
    }

    #[test]
    fn test_monthly_bounds_handle_year_end() {
        let svc = PeriodService::utc();
        let key = svc.key_for(date(2025, 12, 15), PeriodType::Monthly);
        assert_eq!(key.as_str(), "2025-12");
        assert_eq!(
            svc.bounds(&key, PeriodType::Monthly),
            Some((date(2025, 12, 1), date(2025, 12, 31)))
        );
    }

    #[test]
    fn test_invalid_keys_have_no_bounds() {
        let svc = PeriodService::utc();
        assert!(svc
            .bounds(&PeriodKey::new("not-a-key"), PeriodType::Daily)
            .is_none());
        assert!(svc
            .bounds(&PeriodKey::new("2025-13"), PeriodType::Monthly)
            .is_none());
        assert!(svc
            .bounds(&PeriodKey::new("2025W01"), PeriodType::Weekly)
            .is_none());
        assert!(svc
            .bounds(&PeriodKey::new("2025-W60"), PeriodType::Weekly)
            .is_none());
    }

    #[test]
    fn test_previous_week_crosses_year_boundary() {
        let svc = PeriodService::utc();
        let prev = svc.previous_week(&PeriodKey::new("2025-W01")).unwrap();
        assert_eq!(prev.as_str(), "2024-W52");
    }

    #[test]
    fn test_pinned_clock_is_shared_by_clones() {
        let svc = PeriodService::utc();
        let clone = svc.clone();
        let instant = DateTime::parse_from_rfc3339("2025-03-09T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        svc.set_now(instant);
        assert_eq!(clone.today(), date(2025, 3, 9));
        svc.set_now(instant + Duration::days(1));
        assert_eq!(clone.today(), date(2025, 3, 10));
    }

    #[test]
    fn test_offset_changes_day_boundary() {
        // +09:00 rolls the date over nine hours earlier than UTC
        let tokyo = PeriodService::new(FixedOffset::east_opt(9 * 3600).unwrap());
        let utc = PeriodService::utc();
        let instant = DateTime::parse_from_rfc3339("2025-03-09T20:00:00Z").unwrap();
        let utc_day = instant.with_timezone(&utc.offset).date_naive();
        let tokyo_day = instant.with_timezone(&tokyo.offset).date_naive();
        assert_eq!(utc_day, date(2025, 3, 9));
        assert_eq!(tokyo_day, date(2025, 3, 10));
    }
}
