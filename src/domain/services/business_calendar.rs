use crate::domain::entities::BusinessHours;
use crate::domain::errors::{SlaError, SlaResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// How far ahead to look for open time before giving up.
const MAX_SEARCH_DAYS: i64 = 366;

/// Instant reached after `minutes` of open time have elapsed from `start`,
/// measured against `business_hours` in `timezone`. Closed days, holidays and
/// time outside the day's windows do not count.
pub fn add_business_minutes(
    start: DateTime<Utc>,
    minutes: i64,
    business_hours: &BusinessHours,
    timezone: &str,
) -> SlaResult<DateTime<Utc>> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| SlaError::InvalidTimezone(timezone.to_string()))?;

    let out_of_range = || SlaError::InvalidDuration(format!("{} minutes is out of range", minutes));
    let mut remaining = Duration::try_minutes(minutes.max(0)).ok_or_else(out_of_range)?;

    if business_hours.is_always_open || minutes <= 0 {
        return start.checked_add_signed(remaining).ok_or_else(out_of_range);
    }

    // Reject malformed schedules up front rather than silently treating them as closed.
    for schedule in &business_hours.hours {
        if schedule.weekday().is_none() {
            return Err(SlaError::Validation(format!(
                "Invalid business hours day: {}",
                schedule.day
            )));
        }
        schedule.window().map_err(SlaError::Validation)?;
    }
    if business_hours.hours.is_empty() {
        return Err(SlaError::Validation(format!(
            "Business hours {} have no open days",
            business_hours.id
        )));
    }

    let mut cursor = start;
    let first_day = start.with_timezone(&tz).date_naive();

    for offset in 0..MAX_SEARCH_DAYS {
        let date = first_day + Duration::days(offset);
        if business_hours.is_holiday(date) {
            continue;
        }

        let mut windows = open_windows(business_hours, date, &tz)?;
        windows.sort_by_key(|(open, _)| *open);

        for (open, close) in windows {
            let from = open.max(cursor);
            if from >= close {
                continue;
            }
            let available = close - from;
            if remaining <= available {
                return Ok(from + remaining);
            }
            remaining = remaining - available;
            cursor = close;
        }
    }

    Err(SlaError::Internal(format!(
        "no open business hours within {} days for calendar {}",
        MAX_SEARCH_DAYS, business_hours.id
    )))
}

/// Open windows of `date` as UTC instants.
fn open_windows(
    business_hours: &BusinessHours,
    date: NaiveDate,
    tz: &Tz,
) -> SlaResult<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    use chrono::Datelike;

    let mut windows = Vec::new();
    for schedule in business_hours.schedules_for(date.weekday()) {
        let (start, end) = schedule.window().map_err(SlaError::Validation)?;
        let open = localize(tz, date.and_time(start));
        let close = match end {
            Some(end) => localize(tz, date.and_time(end)),
            None => localize(tz, (date + Duration::days(1)).and_time(NaiveTime::MIN)),
        };
        windows.push((open, close));
    }
    Ok(windows)
}

/// Local wall-clock time to UTC. Times skipped by a DST jump move forward an hour.
fn localize(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{DaySchedule, Holiday};

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn weekdays_nine_to_five() -> BusinessHours {
        let days = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];
        BusinessHours {
            id: "bh-1".into(),
            name: "Office".into(),
            is_always_open: false,
            hours: days
                .iter()
                .map(|d| DaySchedule {
                    day: d.to_string(),
                    start: "09:00".into(),
                    end: "17:00".into(),
                })
                .collect(),
            holidays: vec![],
        }
    }

    #[test]
    fn test_always_open_adds_wall_clock_minutes() {
        let bh = BusinessHours::always_open("bh".into(), "24/7".into());
        let start = utc("2026-03-07T23:50:00Z"); // Saturday
        let deadline = add_business_minutes(start, 30, &bh, "UTC").unwrap();
        assert_eq!(deadline, utc("2026-03-08T00:20:00Z"));
    }

    #[test]
    fn test_within_same_window() {
        // Monday 10:00 UTC + 2h
        let deadline = add_business_minutes(
            utc("2026-03-02T10:00:00Z"),
            120,
            &weekdays_nine_to_five(),
            "UTC",
        )
        .unwrap();
        assert_eq!(deadline, utc("2026-03-02T12:00:00Z"));
    }

    #[test]
    fn test_carries_over_to_next_open_day() {
        // Friday 16:00 + 2h → Monday 10:00
        let deadline = add_business_minutes(
            utc("2026-03-06T16:00:00Z"),
            120,
            &weekdays_nine_to_five(),
            "UTC",
        )
        .unwrap();
        assert_eq!(deadline, utc("2026-03-09T10:00:00Z"));
    }

    #[test]
    fn test_start_before_opening() {
        // Monday 06:00 + 30m → Monday 09:30
        let deadline = add_business_minutes(
            utc("2026-03-02T06:00:00Z"),
            30,
            &weekdays_nine_to_five(),
            "UTC",
        )
        .unwrap();
        assert_eq!(deadline, utc("2026-03-02T09:30:00Z"));
    }

    #[test]
    fn test_skips_holidays() {
        let mut bh = weekdays_nine_to_five();
        bh.holidays.push(Holiday {
            name: "Closed".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            recurring: false,
        });
        // Monday 16:30 + 1h → Wednesday 09:30 (Tuesday is a holiday)
        let deadline =
            add_business_minutes(utc("2026-03-02T16:30:00Z"), 60, &bh, "UTC").unwrap();
        assert_eq!(deadline, utc("2026-03-04T09:30:00Z"));
    }

    #[test]
    fn test_respects_timezone() {
        // 09:00-17:00 in New York (UTC-5 in early March before DST).
        // Monday 13:00 UTC is 08:00 local, so 60 minutes lands at 10:00 local = 15:00 UTC.
        let deadline = add_business_minutes(
            utc("2026-03-02T13:00:00Z"),
            60,
            &weekdays_nine_to_five(),
            "America/New_York",
        )
        .unwrap();
        assert_eq!(deadline, utc("2026-03-02T15:00:00Z"));
    }

    #[test]
    fn test_exact_window_end() {
        let deadline = add_business_minutes(
            utc("2026-03-02T16:00:00Z"),
            60,
            &weekdays_nine_to_five(),
            "UTC",
        )
        .unwrap();
        assert_eq!(deadline, utc("2026-03-02T17:00:00Z"));
    }

    #[test]
    fn test_invalid_timezone() {
        let result = add_business_minutes(
            utc("2026-03-02T10:00:00Z"),
            60,
            &weekdays_nine_to_five(),
            "Mars/Olympus",
        );
        assert!(matches!(result, Err(SlaError::InvalidTimezone(_))));
    }

    #[test]
    fn test_no_open_days() {
        let mut bh = weekdays_nine_to_five();
        bh.hours.clear();
        assert!(add_business_minutes(utc("2026-03-02T10:00:00Z"), 60, &bh, "UTC").is_err());
    }

    #[test]
    fn test_out_of_range_minutes_is_an_error() {
        let mut bh = weekdays_nine_to_five();
        bh.is_always_open = true;
        let start = utc("2026-03-02T10:00:00Z");

        // Past chrono's instant range
        let result = add_business_minutes(start, 144_000_000_000, &bh, "UTC");
        assert!(matches!(result, Err(SlaError::InvalidDuration(_))));

        // Past TimeDelta's own range
        let result = add_business_minutes(start, i64::MAX / 2, &bh, "UTC");
        assert!(matches!(result, Err(SlaError::InvalidDuration(_))));
    }
}
