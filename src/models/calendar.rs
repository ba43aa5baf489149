//! Calendar and time window models.
//!
//! Defines technician availability: weekly working windows per
//! day-of-week plus blocked dates (leave, training, holidays).
//!
//! # Time Model
//! Times of day are milliseconds from midnight of the date they apply to.
//! Dates are `chrono::NaiveDate`; the consumer decides the time zone.
//!
//! # Precedence
//! Blocked dates override weekly windows. A window on a date is available iff:
//! - The date is not a `blocked_dates` entry, AND
//! - It lies entirely within one weekly window for that weekday
//!   (or the calendar has no weekly windows at all).

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Milliseconds in one minute.
pub const MINUTE_MS: i64 = 60_000;
/// Milliseconds in one hour.
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
/// Milliseconds in one day.
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// A time interval [start, end) within a day.
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    /// Interval start (ms from midnight, inclusive).
    pub start_ms: i64,
    /// Interval end (ms from midnight, exclusive).
    pub end_ms: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Creates a window from whole hours of the day.
    pub fn hours(start_hour: i64, end_hour: i64) -> Self {
        Self::new(start_hour * HOUR_MS, end_hour * HOUR_MS)
    }

    /// A window covering the whole day.
    pub fn full_day() -> Self {
        Self::new(0, DAY_MS)
    }

    /// Duration of this window (ms).
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Whether a time of day falls within this window.
    #[inline]
    pub fn contains(&self, time_ms: i64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms
    }

    /// Whether `other` lies entirely within this window.
    #[inline]
    pub fn covers(&self, other: &Self) -> bool {
        other.start_ms >= self.start_ms && other.end_ms <= self.end_ms
    }

    /// Whether two windows overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }

    /// Whether two windows come closer than `buffer_ms` to each other.
    ///
    /// With a zero buffer this is [`overlaps`](Self::overlaps). Windows that
    /// are exactly `buffer_ms` apart do not conflict.
    pub fn overlaps_with_buffer(&self, other: &Self, buffer_ms: i64) -> bool {
        self.start_ms < other.end_ms + buffer_ms && other.start_ms < self.end_ms + buffer_ms
    }

    /// Same window moved by `delta_ms`.
    pub fn shifted(&self, delta_ms: i64) -> Self {
        Self::new(self.start_ms + delta_ms, self.end_ms + delta_ms)
    }

    /// Start formatted as `HHMM`, used in identifiers.
    pub fn start_hhmm(&self) -> String {
        let minutes = self.start_ms.div_euclid(MINUTE_MS);
        format!("{:02}{:02}", minutes / 60, minutes % 60)
    }
}

/// A recurring availability window on one day of the week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WeeklyWindow {
    /// Day of the week this window applies to.
    pub weekday: Weekday,
    /// Working time on that day.
    pub window: TimeWindow,
}

/// Technician availability calendar.
///
/// Combines recurring weekly windows with blocked dates.
/// If no weekly windows are defined, the technician is available
/// all day on every non-blocked date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Calendar {
    /// Recurring availability per weekday. Empty = always available.
    pub weekly: Vec<WeeklyWindow>,
    /// Dates on which the technician is unavailable (overrides `weekly`).
    pub blocked_dates: Vec<NaiveDate>,
}

impl Calendar {
    /// Creates an empty calendar (no constraints = always available).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a calendar that is always available.
    pub fn always_available() -> Self {
        Self::new()
    }

    /// Creates a Monday-to-Friday calendar with the same hours each day.
    pub fn weekdays(start_hour: i64, end_hour: i64) -> Self {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]
        .into_iter()
        .fold(Self::new(), |cal, day| {
            cal.with_window(day, TimeWindow::hours(start_hour, end_hour))
        })
    }

    /// Adds a weekly availability window.
    pub fn with_window(mut self, weekday: Weekday, window: TimeWindow) -> Self {
        self.weekly.push(WeeklyWindow { weekday, window });
        self
    }

    /// Blocks a whole date.
    pub fn with_blocked_date(mut self, date: NaiveDate) -> Self {
        self.blocked_dates.push(date);
        self
    }

    /// Whether the whole date is blocked.
    pub fn is_blocked(&self, date: NaiveDate) -> bool {
        self.blocked_dates.contains(&date)
    }

    /// Availability windows on a given date, sorted by start.
    pub fn windows_on(&self, date: NaiveDate) -> Vec<TimeWindow> {
        if self.is_blocked(date) {
            return Vec::new();
        }
        if self.weekly.is_empty() {
            return vec![TimeWindow::full_day()];
        }

        let weekday = date.weekday();
        let mut windows: Vec<TimeWindow> = self
            .weekly
            .iter()
            .filter(|w| w.weekday == weekday)
            .map(|w| w.window)
            .collect();
        windows.sort_by_key(|w| w.start_ms);
        windows
    }

    /// Whether the technician works at all on `date`.
    pub fn works_on(&self, date: NaiveDate) -> bool {
        !self.windows_on(date).is_empty()
    }

    /// Whether `window` on `date` lies entirely within declared availability.
    pub fn is_available(&self, date: NaiveDate, window: &TimeWindow) -> bool {
        self.windows_on(date).iter().any(|w| w.covers(window))
    }

    /// Total available time on a date (ms).
    pub fn available_ms_on(&self, date: NaiveDate) -> i64 {
        self.windows_on(date).iter().map(|w| w.duration_ms()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[test]
    fn test_time_window() {
        let w = TimeWindow::new(100, 200);
        assert_eq!(w.duration_ms(), 100);
        assert!(w.contains(100));
        assert!(w.contains(199));
        assert!(!w.contains(200)); // exclusive end
        assert!(!w.contains(50));
    }

    #[test]
    fn test_time_window_overlap() {
        let a = TimeWindow::new(0, 100);
        let b = TimeWindow::new(50, 150);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        let c = TimeWindow::new(100, 200); // touching but not overlapping
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_overlap_with_buffer() {
        let a = TimeWindow::hours(9, 10);
        let b = TimeWindow::new(10 * HOUR_MS + 10 * MINUTE_MS, 11 * HOUR_MS);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps_with_buffer(&b, 15 * MINUTE_MS));
        assert!(b.overlaps_with_buffer(&a, 15 * MINUTE_MS));

        let c = TimeWindow::new(10 * HOUR_MS + 15 * MINUTE_MS, 11 * HOUR_MS);
        assert!(!a.overlaps_with_buffer(&c, 15 * MINUTE_MS)); // exactly one buffer apart
    }

    #[test]
    fn test_start_hhmm() {
        let w = TimeWindow::new(9 * HOUR_MS + 5 * MINUTE_MS, 10 * HOUR_MS);
        assert_eq!(w.start_hhmm(), "0905");
    }

    #[test]
    fn test_calendar_always_available() {
        let cal = Calendar::always_available();
        assert!(cal.works_on(monday()));
        assert_eq!(cal.available_ms_on(monday()), DAY_MS);
    }

    #[test]
    fn test_calendar_weekdays() {
        let cal = Calendar::weekdays(8, 17);
        let saturday = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();

        assert!(cal.works_on(monday()));
        assert!(!cal.works_on(saturday));
        assert!(cal.is_available(monday(), &TimeWindow::hours(9, 11)));
        assert!(!cal.is_available(monday(), &TimeWindow::hours(16, 18)));
        assert_eq!(cal.available_ms_on(monday()), 9 * HOUR_MS);
    }

    #[test]
    fn test_calendar_split_shift() {
        let cal = Calendar::new()
            .with_window(Weekday::Mon, TimeWindow::hours(13, 17))
            .with_window(Weekday::Mon, TimeWindow::hours(8, 12));

        let windows = cal.windows_on(monday());
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0], TimeWindow::hours(8, 12)); // sorted
        // Spanning the lunch gap is not covered by either window
        assert!(!cal.is_available(monday(), &TimeWindow::hours(11, 14)));
    }

    #[test]
    fn test_calendar_blocked_overrides() {
        let cal = Calendar::weekdays(8, 17).with_blocked_date(monday());
        assert!(!cal.works_on(monday()));
        assert!(!cal.is_available(monday(), &TimeWindow::hours(9, 10)));
        assert_eq!(cal.available_ms_on(monday()), 0);
    }
}
