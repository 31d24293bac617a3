//! Pure calendar arithmetic: absolute-day ↔ structured-date conversion,
//! configurable month/weekday layouts, leap rules, and season resolution.
//!
//! Absolute day 0 is day 1 of month 0 of the calendar's `start_year`.
//! Conversions are exact for any `i64` day, including negatives and
//! magnitudes of 10^12 (the round-trip law: `absolute_day(date(d)) == d`).

mod leap;

pub use leap::{LeapRule, LeapSchedule};

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: i64 = 1_440;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthDef {
    pub name: String,
    pub days: i64,
    /// Intercalary months sit outside the regular cycle of named days;
    /// fixed events may target them by name instead of month/day.
    #[serde(default)]
    pub intercalary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonDef {
    pub name: String,
    /// 0-based month index of the season's first day.
    pub start_month: usize,
    /// 1-based day-of-month of the season's first day.
    pub start_day: i64,
    #[serde(default)]
    pub sunrise_minute: Option<u32>,
    #[serde(default)]
    pub sunset_minute: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDefinition {
    pub id: String,
    pub months: Vec<MonthDef>,
    #[serde(default)]
    pub weekdays: Vec<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonDef>,
    #[serde(default)]
    pub leap_rules: Vec<LeapRule>,
    #[serde(default)]
    pub start_year: i64,
    #[serde(default)]
    pub year_suffix: Option<String>,
}

/// A structured date derived from an absolute day. Never stored; always
/// recomputed from the day counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarDate {
    pub absolute_day: i64,
    pub year: i64,
    /// 0-based month index.
    pub month: usize,
    pub month_name: String,
    /// 1-based day within the month.
    pub day_of_month: i64,
    /// 1-based day within the year.
    pub day_of_year: i64,
    pub weekday_index: Option<usize>,
    pub weekday: String,
    pub season: Option<String>,
    /// Name of the containing month when it is intercalary.
    pub intercalary: Option<String>,
    /// True for calendars with no months: every field collapses to the raw
    /// day count and all names are empty.
    pub simple_counter: bool,
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.simple_counter {
            write!(f, "Day {}", self.absolute_day)
        } else {
            write!(f, "{} {}, Y{}", self.month_name, self.day_of_month, self.year)
        }
    }
}

/// Compiled calendar: the immutable definition plus the leap schedule and
/// cached base-year length.
#[derive(Debug, Clone)]
pub struct Calendar {
    def: CalendarDefinition,
    leap: LeapSchedule,
    base_days: Vec<i64>,
    base_year_len: i64,
    /// Season list sorted by (start_month, start_day).
    seasons_sorted: Vec<SeasonDef>,
}

impl Calendar {
    pub fn new(def: CalendarDefinition) -> Self {
        let base_days: Vec<i64> = def.months.iter().map(|m| m.days.max(0)).collect();
        let base_year_len = base_days.iter().sum();
        let leap = LeapSchedule::new(def.leap_rules.clone());
        let mut seasons_sorted = def.seasons.clone();
        seasons_sorted.sort_by_key(|s| (s.start_month, s.start_day));
        Self { def, leap, base_days, base_year_len, seasons_sorted }
    }

    pub fn definition(&self) -> &CalendarDefinition {
        &self.def
    }

    pub fn id(&self) -> &str {
        &self.def.id
    }

    pub fn leap(&self) -> &LeapSchedule {
        &self.leap
    }

    /// True when the calendar has no months and operates as a raw counter.
    pub fn is_simple_counter(&self) -> bool {
        self.def.months.is_empty() || self.base_year_len == 0
    }

    /// Average year length in days, accounting for leap days over one full
    /// rule cycle. `None` in simple-counter mode.
    pub fn average_year_days(&self) -> Option<f64> {
        if self.is_simple_counter() {
            return None;
        }
        let base = self.base_year_len as f64;
        Some(match self.leap.per_cycle() {
            Some((leaps, cycle)) if cycle > 0 => base + leaps as f64 / cycle as f64,
            _ => base,
        })
    }

    /// Length of a specific year in days.
    pub fn year_length(&self, year: i64) -> i64 {
        self.base_year_len + i64::from(self.leap.is_leap_year(year))
    }

    /// Per-month day counts for a year (leap day applied).
    pub fn month_days(&self, year: i64) -> Vec<i64> {
        self.leap.month_days(&self.base_days, year)
    }

    /// Absolute day of the first day of `year`.
    ///
    /// Closed form: whole base years plus the signed leap-day count between
    /// `start_year` and `year`, so it stays exact (and fast) at any
    /// magnitude.
    pub fn year_start_day(&self, year: i64) -> i64 {
        let elapsed = year - self.def.start_year;
        elapsed * self.base_year_len + self.leap.leap_days_before(year, self.def.start_year)
    }

    /// Convert a structured (year, month, day-of-month) to an absolute day.
    /// Exact inverse of [`Calendar::date`].
    pub fn absolute_day(&self, year: i64, month: usize, day_of_month: i64) -> i64 {
        if self.is_simple_counter() {
            return day_of_month;
        }
        let days = self.month_days(year);
        let before_month: i64 = days.iter().take(month).sum();
        self.year_start_day(year) + before_month + (day_of_month - 1)
    }

    /// Convert an absolute day to a structured date.
    pub fn date(&self, day: i64) -> CalendarDate {
        if self.is_simple_counter() {
            return CalendarDate {
                absolute_day: day,
                year: day,
                month: 0,
                month_name: String::new(),
                day_of_month: day,
                day_of_year: day,
                weekday_index: None,
                weekday: String::new(),
                season: None,
                intercalary: None,
                simple_counter: true,
            };
        }

        // Estimate the year from the average length, then walk to the year
        // actually containing `day`. The estimate is off by at most one rule
        // cycle's leap surplus, so the walk is bounded and cheap.
        let avg = self.average_year_days().unwrap_or(self.base_year_len as f64);
        let mut year = self.def.start_year + (day as f64 / avg).floor() as i64;
        while day < self.year_start_day(year) {
            year -= 1;
        }
        while day >= self.year_start_day(year + 1) {
            year += 1;
        }

        let mut day_of_year = day - self.year_start_day(year); // 0-based here
        debug_assert!((0..self.year_length(year)).contains(&day_of_year));

        let month_days = self.month_days(year);
        let mut month = 0usize;
        for (i, len) in month_days.iter().enumerate() {
            if day_of_year < *len {
                month = i;
                break;
            }
            day_of_year -= len;
        }
        let day_of_month = day_of_year + 1;
        let doy = day - self.year_start_day(year) + 1;

        let (weekday_index, weekday) = if self.def.weekdays.is_empty() {
            (None, String::new())
        } else {
            let idx = day.rem_euclid(self.def.weekdays.len() as i64) as usize;
            (Some(idx), self.def.weekdays[idx].clone())
        };

        let month_def = &self.def.months[month];
        CalendarDate {
            absolute_day: day,
            year,
            month,
            month_name: month_def.name.clone(),
            day_of_month,
            day_of_year: doy,
            weekday_index,
            weekday,
            season: self.season_for(month, day_of_month),
            intercalary: month_def.intercalary.then(|| month_def.name.clone()),
            simple_counter: false,
        }
    }

    /// Resolve the season containing (month, day-of-month): the latest
    /// season whose start is on or before the date, wrapping to the last
    /// season for dates before the first start (seasons that cross the year
    /// boundary, e.g. a winter starting in the final month).
    pub fn season_for(&self, month: usize, day_of_month: i64) -> Option<String> {
        let seasons = &self.seasons_sorted;
        if seasons.is_empty() {
            return None;
        }
        let current = seasons
            .iter()
            .rev()
            .find(|s| (s.start_month, s.start_day) <= (month, day_of_month))
            .or_else(|| seasons.last());
        current.map(|s| s.name.clone())
    }

    /// Season definition (with solar times) for an absolute day.
    pub fn season_def_for_day(&self, day: i64) -> Option<&SeasonDef> {
        if self.is_simple_counter() {
            return None;
        }
        let date = self.date(day);
        let name = date.season?;
        self.seasons_sorted.iter().find(|s| s.name == name)
    }

    /// Year label with the configured suffix, e.g. `"1024 AR"`.
    pub fn display_year(&self, year: i64) -> String {
        match &self.def.year_suffix {
            Some(suffix) => format!("{year} {suffix}"),
            None => year.to_string(),
        }
    }
}
