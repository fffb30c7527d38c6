//! Daily archive boundary.
//!
//! Tasks belong to a "day" that starts at a fixed local time (05:00 by
//! default). Tasks created before the most recent boundary are archived
//! under the local calendar date of their creation and removed from the
//! active list.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Fixed local time-of-day that starts a new task day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCutoff {
    time: NaiveTime,
    tz: Tz,
}

impl DailyCutoff {
    /// Create a cutoff at `hour:minute` local time in `tz`.
    ///
    /// Out-of-range values fall back to 05:00.
    pub fn new(hour: u32, minute: u32, tz: Tz) -> Self {
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_else(default_cutoff);
        Self { time, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// The most recent boundary at or before `now`.
    pub fn most_recent(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.tz);
        let today = local.date_naive();
        let date = if local.time() >= self.time {
            today
        } else {
            today.pred_opt().unwrap_or(today)
        };
        self.boundary_on(date)
    }

    /// The first boundary strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let recent = self.most_recent(now);
        let local_date = recent.with_timezone(&self.tz).date_naive();
        let next_date = local_date.succ_opt().unwrap_or(local_date);
        let next = self.boundary_on(next_date);
        if next > now {
            next
        } else {
            now + Duration::days(1)
        }
    }

    /// Archive key (`YYYY-MM-DD`) for an instant: its local calendar date.
    pub fn date_key(&self, at: DateTime<Utc>) -> String {
        date_key_of(at.with_timezone(&self.tz).date_naive())
    }

    /// Boundary instant on a local date. Nonexistent local times (DST gaps)
    /// resolve to the first valid instant after the gap.
    fn boundary_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(self.time);
        let resolved = self
            .tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| self.tz.from_local_datetime(&(naive + Duration::hours(1))).earliest());
        match resolved {
            Some(local) => local.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&naive),
        }
    }
}

impl Default for DailyCutoff {
    fn default() -> Self {
        Self {
            time: default_cutoff(),
            tz: Tz::UTC,
        }
    }
}

fn default_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(5, 0, 0).unwrap_or_default()
}

/// Format a date as an archive key.
pub fn date_key_of(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a timezone name, falling back to UTC.
pub fn parse_timezone(name: Option<&str>) -> Tz {
    match name {
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!("Unknown timezone '{}', using UTC", name);
            Tz::UTC
        }),
        None => Tz::UTC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_most_recent_before_and_after_cutoff() {
        let cutoff = DailyCutoff::new(5, 0, Tz::UTC);

        assert_eq!(cutoff.most_recent(utc(2024, 3, 2, 4, 59)), utc(2024, 3, 1, 5, 0));
        assert_eq!(cutoff.most_recent(utc(2024, 3, 2, 5, 0)), utc(2024, 3, 2, 5, 0));
        assert_eq!(cutoff.most_recent(utc(2024, 3, 2, 23, 0)), utc(2024, 3, 2, 5, 0));
    }

    #[test]
    fn test_next_after() {
        let cutoff = DailyCutoff::new(5, 0, Tz::UTC);
        assert_eq!(cutoff.next_after(utc(2024, 3, 2, 4, 0)), utc(2024, 3, 2, 5, 0));
        assert_eq!(cutoff.next_after(utc(2024, 3, 2, 5, 0)), utc(2024, 3, 3, 5, 0));
    }

    #[test]
    fn test_local_timezone_boundary() {
        // Asia/Shanghai is UTC+8 with no DST.
        let cutoff = DailyCutoff::new(5, 0, chrono_tz::Asia::Shanghai);
        // 2024-03-02 05:00 local == 2024-03-01 21:00 UTC
        assert_eq!(cutoff.most_recent(utc(2024, 3, 1, 22, 0)), utc(2024, 3, 1, 21, 0));
        assert_eq!(cutoff.date_key(utc(2024, 3, 1, 22, 0)), "2024-03-02");
    }

    #[test]
    fn test_invalid_time_falls_back() {
        let cutoff = DailyCutoff::new(42, 0, Tz::UTC);
        assert_eq!(cutoff.time(), NaiveTime::from_hms_opt(5, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone(Some("Europe/Paris")), chrono_tz::Europe::Paris);
        assert_eq!(parse_timezone(Some("Not/AZone")), Tz::UTC);
        assert_eq!(parse_timezone(None), Tz::UTC);
    }
}
