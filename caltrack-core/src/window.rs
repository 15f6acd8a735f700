//! Time range queried from both systems on each run.

use chrono::{DateTime, FixedOffset, Local, Months, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::WindowConfig;
use crate::error::CalTrackResult;

/// Past-only range ending at "now". Future events are never reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    /// Carries an explicit UTC offset so the query cannot drift across DST.
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    /// Compute the window from config, resolving hard start dates in the
    /// configured zone (system zone when unset).
    pub fn from_config(now: DateTime<Utc>, config: &WindowConfig) -> CalTrackResult<Self> {
        Ok(match config.zone()? {
            Some(tz) => compute_window(now, config, &tz),
            None => compute_window(now, config, &Local),
        })
    }

    /// Destination query bounds, widened by `padding` on both sides.
    pub fn padded(&self, padding: TimeDelta) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start
                .with_timezone(&Utc)
                .checked_sub_signed(padding)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.end
                .checked_add_signed(padding)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

pub fn compute_window<Tz: TimeZone>(now: DateTime<Utc>, config: &WindowConfig, zone: &Tz) -> SyncWindow {
    let start = match config.hard_start_date {
        Some(date) => local_midnight(date, zone),
        None => now
            .checked_sub_months(Months::new(config.active_window_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
            .fixed_offset(),
    };

    if start > now {
        warn!(start = %start, "Hard start date is in the future; window is empty");
    }

    SyncWindow { start, end: now }
}

/// Midnight of `date` in `zone`. When midnight does not exist (DST gap) the
/// first valid local time of that day is used.
fn local_midnight<Tz: TimeZone>(date: NaiveDate, zone: &Tz) -> DateTime<FixedOffset> {
    let midnight: NaiveDateTime = date.and_time(chrono::NaiveTime::MIN);

    (0..=24 * 60)
        .find_map(|minutes| {
            let local = midnight.checked_add_signed(TimeDelta::minutes(minutes))?;
            zone.from_local_datetime(&local).earliest()
        })
        .map(|dt| dt.fixed_offset())
        .unwrap_or_else(|| midnight.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Sao_Paulo;
    use chrono_tz::Europe::Berlin;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_rolling_window() {
        let config = WindowConfig::default();
        let window = compute_window(now(), &config, &Utc);

        assert_eq!(window.end, now());
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2025, 4, 15, 12, 30, 0).unwrap().fixed_offset()
        );
    }

    #[test]
    fn test_rolling_window_clamps_month_end() {
        let config = WindowConfig {
            active_window_months: 1,
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 8, 0, 0).unwrap();
        let window = compute_window(now, &config, &Utc);
        assert_eq!(window.start.date_naive(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    }

    #[test]
    fn test_hard_start_date_carries_local_offset() {
        let config = WindowConfig {
            hard_start_date: NaiveDate::from_ymd_opt(2025, 1, 10),
            ..Default::default()
        };
        let window = compute_window(now(), &config, &Berlin);

        assert_eq!(window.start.to_rfc3339(), "2025-01-10T00:00:00+01:00");
        assert_eq!(window.end, now(), "End is always now");
    }

    #[test]
    fn test_hard_start_date_in_summer_time() {
        let config = WindowConfig {
            hard_start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
            ..Default::default()
        };
        let window = compute_window(now(), &config, &Berlin);
        assert_eq!(window.start.to_rfc3339(), "2025-06-01T00:00:00+02:00");
    }

    #[test]
    fn test_hard_start_date_midnight_in_dst_gap() {
        // Sao Paulo skipped 00:00-01:00 on 2018-11-04
        let config = WindowConfig {
            hard_start_date: NaiveDate::from_ymd_opt(2018, 11, 4),
            ..Default::default()
        };
        let window = compute_window(now(), &config, &Sao_Paulo);
        assert_eq!(window.start.to_rfc3339(), "2018-11-04T01:00:00-02:00");
    }

    #[test]
    fn test_padded_bounds() {
        let config = WindowConfig::default();
        let window = compute_window(now(), &config, &Utc);
        let (start, end) = window.padded(TimeDelta::minutes(15));

        assert_eq!(start, window.start.with_timezone(&Utc) - TimeDelta::minutes(15));
        assert_eq!(end, now() + TimeDelta::minutes(15));
    }

    #[test]
    fn test_huge_window_saturates_padded_bounds() {
        let config = WindowConfig {
            active_window_months: u32::MAX,
            ..Default::default()
        };
        let window = compute_window(now(), &config, &Utc);
        let (start, end) = window.padded(TimeDelta::minutes(15));

        assert_eq!(start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(end, now() + TimeDelta::minutes(15));
    }

    #[test]
    fn test_from_config_with_zone() {
        let config = WindowConfig {
            hard_start_date: NaiveDate::from_ymd_opt(2025, 1, 10),
            timezone: Some("Europe/Berlin".into()),
            ..Default::default()
        };
        let window = SyncWindow::from_config(now(), &config).unwrap();
        assert_eq!(window.start.offset().local_minus_utc(), 3600);
    }
}
