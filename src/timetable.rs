use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SCHOOL_START: &str = "07:30";
pub const GRID_END: &str = "16:30";
pub const LUNCH_BREAK_1: (&str, &str) = ("11:20", "12:15");
pub const LUNCH_BREAK_2: (&str, &str) = ("12:15", "13:15");
pub const DEFAULT_HOUR_HEIGHT: f64 = 60.0;

pub const DAY_NAMES: [&str; 5] = ["Mon", "Tue", "Wed", "Thu", "Fri"];

/// Parses an "HH:MM" wall-clock string into minutes since midnight.
/// Malformed components parse as 0; callers are expected to keep inputs
/// well-formed (matching the permissiveness of the original UI helpers).
pub fn time_to_minutes(time: &str) -> i64 {
    let mut parts = time.splitn(2, ':');
    let h: i64 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(0);
    let m: i64 = parts
        .next()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(0);
    h * 60 + m
}

/// Inverse of `time_to_minutes`. Does not wrap values outside one day.
pub fn minutes_to_time(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// The schedule fields the layout/workload/partition layer operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub id: String,
    pub teacher_id: String,
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
}

/// Vertical placement of a block inside the day column, in pixels from the
/// top of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStyle {
    pub top: f64,
    pub height: f64,
}

impl BlockStyle {
    pub fn top_px(&self) -> String {
        px(self.top)
    }

    pub fn height_px(&self) -> String {
        px(self.height)
    }
}

// CSS-style pixel string; whole values render without a decimal point.
fn px(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}px", v as i64)
    } else {
        format!("{}px", v)
    }
}

/// Time-to-pixel mapping for the weekly grid (07:30-16:30, one row per hour).
#[derive(Debug, Clone, Copy)]
pub struct GridLayout {
    pub hour_height: f64,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            hour_height: DEFAULT_HOUR_HEIGHT,
        }
    }
}

impl GridLayout {
    pub fn new(hour_height: f64) -> Self {
        Self { hour_height }
    }

    /// Linear in elapsed minutes. Times outside the grid window produce
    /// out-of-bounds offsets (negative top, height past the grid); the
    /// layout does not clip.
    pub fn block_style(&self, start_time: &str, end_time: &str) -> BlockStyle {
        let grid_start = time_to_minutes(SCHOOL_START);
        let start = time_to_minutes(start_time) - grid_start;
        let end = time_to_minutes(end_time) - grid_start;
        BlockStyle {
            top: start as f64 / 60.0 * self.hour_height,
            height: (end - start) as f64 / 60.0 * self.hour_height,
        }
    }

    /// Fixed midday overlay bands. Purely visual; no relationship to any
    /// schedule entry.
    pub fn lunch_breaks(&self) -> [BlockStyle; 2] {
        [
            self.block_style(LUNCH_BREAK_1.0, LUNCH_BREAK_1.1),
            self.block_style(LUNCH_BREAK_2.0, LUNCH_BREAK_2.1),
        ]
    }

    /// Hour labels down the left edge of the grid, 07:30 through 16:30.
    pub fn time_slots(&self) -> Vec<String> {
        let start = time_to_minutes(SCHOOL_START);
        let end = time_to_minutes(GRID_END);
        (start..=end)
            .step_by(60)
            .map(minutes_to_time)
            .collect()
    }
}

/// Monday..Friday of the week containing `date`. A Sunday resolves to the
/// Monday six days earlier.
pub fn week_dates(date: NaiveDate) -> Vec<NaiveDate> {
    let back = date.weekday().num_days_from_monday() as i64;
    let monday = date - Duration::days(back);
    (0..5).map(|i| monday + Duration::days(i)).collect()
}

/// Week navigation: a step is exactly seven calendar days.
pub fn shift_week(date: NaiveDate, weeks: i64) -> NaiveDate {
    date + Duration::days(7 * weeks)
}

/// "24 - 28 August" when both endpoints share a month, otherwise
/// "31 Aug - 4 Sep".
pub fn format_date_range(dates: &[NaiveDate]) -> String {
    let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
        return String::new();
    };
    if first.month() == last.month() {
        format!("{} - {} {}", first.day(), last.day(), first.format("%B"))
    } else {
        format!(
            "{} {} - {} {}",
            first.day(),
            first.format("%b"),
            last.day(),
            last.format("%b")
        )
    }
}

pub fn is_today(date: NaiveDate) -> bool {
    date == Local::now().date_naive()
}

/// Total weekly scheduled minutes for one teacher, rendered as "Hh" or
/// "Hh Mm". Durations are summed as-is; a slot with end before start
/// subtracts from the total (malformed data is not repaired here).
pub fn teacher_hours(slots: &[ScheduleSlot], teacher_id: &str) -> String {
    let total: i64 = slots
        .iter()
        .filter(|s| s.teacher_id == teacher_id)
        .map(|s| time_to_minutes(&s.end_time) - time_to_minutes(&s.start_time))
        .sum();
    let hours = total / 60;
    let mins = total % 60;
    if mins == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}m", hours, mins)
    }
}

/// Groups slots into the five weekday buckets (0=Monday..4=Friday). Slots
/// with a day outside [0,4] do not appear in any bucket.
pub fn partition_by_day(slots: &[ScheduleSlot]) -> [Vec<ScheduleSlot>; 5] {
    let mut days: [Vec<ScheduleSlot>; 5] = Default::default();
    for slot in slots {
        if (0..5).contains(&slot.day_of_week) {
            days[slot.day_of_week as usize].push(slot.clone());
        }
    }
    days
}

/// Teacher-selection filter over the visible schedule set. An empty
/// selection means "show all".
#[derive(Debug, Clone, Default)]
pub struct TeacherFilter {
    selected: HashSet<String>,
}

impl TeacherFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds the id if absent, removes it if present. Toggling twice restores
    /// the prior selection.
    pub fn toggle(&mut self, teacher_id: &str) {
        if !self.selected.remove(teacher_id) {
            self.selected.insert(teacher_id.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn matches(&self, slot: &ScheduleSlot) -> bool {
        self.selected.is_empty() || self.selected.contains(&slot.teacher_id)
    }

    pub fn apply(&self, slots: &[ScheduleSlot]) -> Vec<ScheduleSlot> {
        slots.iter().filter(|s| self.matches(s)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: &str, teacher_id: &str, day: i64, start: &str, end: &str) -> ScheduleSlot {
        ScheduleSlot {
            id: id.to_string(),
            teacher_id: teacher_id.to_string(),
            day_of_week: day,
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    #[test]
    fn minutes_round_trip_all_valid_times() {
        for h in 0..24 {
            for m in 0..60 {
                let s = format!("{:02}:{:02}", h, m);
                assert_eq!(minutes_to_time(time_to_minutes(&s)), s);
            }
        }
    }

    #[test]
    fn time_to_minutes_known_values() {
        assert_eq!(time_to_minutes("07:30"), 450);
        assert_eq!(time_to_minutes("00:00"), 0);
        assert_eq!(time_to_minutes("16:30"), 990);
    }

    #[test]
    fn week_dates_are_monday_through_friday() {
        // 2026-08-26 is a Wednesday.
        let wed = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        let dates = week_dates(wed);
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2026, 8, 24).unwrap());
        for pair in dates.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(1));
        }
        assert_eq!(dates[0].weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn sunday_resolves_to_previous_monday() {
        // 2026-08-30 is a Sunday; its week starts 2026-08-24.
        let sun = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let dates = week_dates(sun);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2026, 8, 24).unwrap());
        assert_eq!(dates[4], NaiveDate::from_ymd_opt(2026, 8, 28).unwrap());
    }

    #[test]
    fn shift_week_moves_seven_days() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 26).unwrap();
        assert_eq!(shift_week(d, 1), NaiveDate::from_ymd_opt(2026, 9, 2).unwrap());
        assert_eq!(shift_week(d, -1), NaiveDate::from_ymd_opt(2026, 8, 19).unwrap());
        assert_eq!(week_dates(shift_week(d, 1))[0].weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn date_range_label_same_and_cross_month() {
        let same = week_dates(NaiveDate::from_ymd_opt(2026, 8, 26).unwrap());
        assert_eq!(format_date_range(&same), "24 - 28 August");

        // Week of Mon 2026-08-31 runs into September.
        let cross = week_dates(NaiveDate::from_ymd_opt(2026, 9, 2).unwrap());
        assert_eq!(format_date_range(&cross), "31 Aug - 4 Sep");

        assert_eq!(format_date_range(&[]), "");
    }

    #[test]
    fn block_style_at_grid_start() {
        let grid = GridLayout::default();
        let b = grid.block_style("07:30", "08:30");
        assert_eq!(b.top_px(), "0px");
        assert_eq!(b.height_px(), "60px");
    }

    #[test]
    fn block_style_mid_morning() {
        let grid = GridLayout::default();
        let b = grid.block_style("09:30", "11:00");
        assert_eq!(b.top_px(), "120px");
        assert_eq!(b.height_px(), "90px");
    }

    #[test]
    fn block_style_does_not_clip_out_of_grid_times() {
        let grid = GridLayout::default();
        let before = grid.block_style("06:30", "07:00");
        assert!(before.top < 0.0);
        let after = grid.block_style("16:00", "17:30");
        assert!(after.top + after.height > grid.block_style(SCHOOL_START, GRID_END).height);
    }

    #[test]
    fn lunch_breaks_cover_fixed_windows() {
        let [first, second] = GridLayout::default().lunch_breaks();
        // 11:20 is 230 minutes past 07:30.
        assert_eq!(first.top_px(), "230px");
        assert_eq!(first.height_px(), "55px");
        assert_eq!(second.top_px(), "285px");
        assert_eq!(second.height_px(), "60px");
    }

    #[test]
    fn time_slots_run_hourly_to_grid_end() {
        let slots = GridLayout::default().time_slots();
        assert_eq!(slots.first().map(String::as_str), Some("07:30"));
        assert_eq!(slots.last().map(String::as_str), Some("16:30"));
        assert_eq!(slots.len(), 10);
    }

    #[test]
    fn teacher_hours_sums_and_formats() {
        let slots = vec![
            slot("a", "t1", 0, "07:30", "08:30"),
            slot("b", "t1", 1, "09:30", "11:20"),
            slot("c", "t2", 0, "08:30", "09:30"),
        ];
        assert_eq!(teacher_hours(&slots, "t1"), "2h 50m");
        assert_eq!(teacher_hours(&slots, "t2"), "1h");
        assert_eq!(teacher_hours(&slots, "nobody"), "0h");
    }

    #[test]
    fn partition_drops_out_of_range_days() {
        let slots = vec![
            slot("a", "t1", 0, "07:30", "08:30"),
            slot("b", "t1", 4, "09:30", "10:30"),
            slot("c", "t1", 5, "09:30", "10:30"),
            slot("d", "t1", -1, "09:30", "10:30"),
        ];
        let days = partition_by_day(&slots);
        assert_eq!(days[0].len(), 1);
        assert_eq!(days[0][0].id, "a");
        assert_eq!(days[4].len(), 1);
        assert_eq!(days[1].len() + days[2].len() + days[3].len(), 0);
    }

    #[test]
    fn filter_toggle_is_involutive() {
        let slots = vec![
            slot("a", "t1", 0, "07:30", "08:30"),
            slot("b", "t2", 0, "08:30", "09:30"),
        ];
        let mut filter = TeacherFilter::new();
        assert_eq!(filter.apply(&slots).len(), 2);

        filter.toggle("t1");
        let only_t1 = filter.apply(&slots);
        assert_eq!(only_t1.len(), 1);
        assert_eq!(only_t1[0].id, "a");

        filter.toggle("t1");
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&slots).len(), 2);
    }

    #[test]
    fn empty_selection_shows_everything() {
        let slots = vec![
            slot("a", "t1", 0, "07:30", "08:30"),
            slot("b", "t2", 2, "08:30", "09:30"),
        ];
        let filter = TeacherFilter::from_ids(Vec::<String>::new());
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&slots).len(), slots.len());
    }
}
