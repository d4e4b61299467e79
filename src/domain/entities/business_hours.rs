use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Opening window for a specific day of the week
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: String,   // "Monday", "Tuesday", etc.
    pub start: String, // "09:00"
    pub end: String,   // "17:00"
}

impl DaySchedule {
    pub fn weekday(&self) -> Option<Weekday> {
        match self.day.to_lowercase().as_str() {
            "monday" | "mon" => Some(Weekday::Mon),
            "tuesday" | "tue" => Some(Weekday::Tue),
            "wednesday" | "wed" => Some(Weekday::Wed),
            "thursday" | "thu" => Some(Weekday::Thu),
            "friday" | "fri" => Some(Weekday::Fri),
            "saturday" | "sat" => Some(Weekday::Sat),
            "sunday" | "sun" => Some(Weekday::Sun),
            _ => None,
        }
    }

    /// Parsed `[start, end)` window. An `end` of "24:00" closes at midnight.
    pub fn window(&self) -> Result<(NaiveTime, Option<NaiveTime>), String> {
        let start = NaiveTime::parse_from_str(&self.start, "%H:%M")
            .map_err(|_| format!("Invalid start time for {}: {}", self.day, self.start))?;
        if self.end == "24:00" {
            return Ok((start, None));
        }
        let end = NaiveTime::parse_from_str(&self.end, "%H:%M")
            .map_err(|_| format!("Invalid end time for {}: {}", self.day, self.end))?;
        if end <= start {
            return Err(format!(
                "End time must be after start time for {}: {}-{}",
                self.day, self.start, self.end
            ));
        }
        Ok((start, Some(end)))
    }
}

/// Holiday calendar entry; closed all day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub recurring: bool, // repeats annually on same month-day
}

impl Holiday {
    pub fn falls_on(&self, date: NaiveDate) -> bool {
        if self.recurring {
            self.date.month() == date.month() && self.date.day() == date.day()
        } else {
            self.date == date
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub id: String,
    pub name: String,
    pub is_always_open: bool,
    pub hours: Vec<DaySchedule>,
    pub holidays: Vec<Holiday>,
}

impl BusinessHours {
    pub fn always_open(id: String, name: String) -> Self {
        Self {
            id,
            name,
            is_always_open: true,
            hours: Vec::new(),
            holidays: Vec::new(),
        }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.iter().any(|h| h.falls_on(date))
    }

    pub fn schedules_for(&self, weekday: Weekday) -> impl Iterator<Item = &DaySchedule> {
        self.hours
            .iter()
            .filter(move |s| s.weekday() == Some(weekday))
    }
}

/// Team fields used to pick a business-hours calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub business_hours_id: Option<String>,
    pub timezone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_schedule_window() {
        let schedule = DaySchedule {
            day: "Monday".into(),
            start: "09:00".into(),
            end: "17:00".into(),
        };
        assert_eq!(schedule.weekday(), Some(Weekday::Mon));
        let (start, end) = schedule.window().unwrap();
        assert_eq!(start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(end, Some(NaiveTime::from_hms_opt(17, 0, 0).unwrap()));
    }

    #[test]
    fn test_day_schedule_rejects_inverted_window() {
        let schedule = DaySchedule {
            day: "Monday".into(),
            start: "17:00".into(),
            end: "09:00".into(),
        };
        assert!(schedule.window().is_err());
    }

    #[test]
    fn test_recurring_holiday() {
        let holiday = Holiday {
            name: "Christmas".into(),
            date: NaiveDate::from_ymd_opt(2020, 12, 25).unwrap(),
            recurring: true,
        };
        assert!(holiday.falls_on(NaiveDate::from_ymd_opt(2026, 12, 25).unwrap()));
        assert!(!holiday.falls_on(NaiveDate::from_ymd_opt(2026, 12, 24).unwrap()));
    }
}
