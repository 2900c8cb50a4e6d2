//! Single date and date-range picker state
//!
//! The picker is a plain state machine: the host feeds it clicks, hovers and
//! navigation and renders whatever [`DatePicker::cells`] returns. Nothing in
//! here reads a clock; "today" is supplied by the caller as a UTC day.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::month::{MonthCursor, MonthGrid};
use crate::dates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PickerMode {
    #[default]
    Single,
    Range,
}

/// Closed date range, `start <= end` always holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(with = "dates::serde_date")]
    pub start: NaiveDate,
    #[serde(with = "dates::serde_date")]
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range from two days given in any order
    #[must_use]
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        let (start, end) = dates::ordered(a, b);
        Self { start, end }
    }

    #[must_use]
    pub fn contains(&self, day: NaiveDate) -> bool {
        dates::span_contains(self.start, self.end, day)
    }

    #[must_use]
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Static configuration of a picker instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PickerOptions {
    pub mode: PickerMode,
    #[serde(default, with = "dates::serde_date::option")]
    pub min_date: Option<NaiveDate>,
    #[serde(default, with = "dates::serde_date::option")]
    pub max_date: Option<NaiveDate>,
    /// Days that cannot be picked, e.g. days owned by another itinerary
    #[serde(default)]
    pub disabled_dates: BTreeSet<NaiveDate>,
    /// Stage clicks until [`DatePicker::confirm`] is called
    #[serde(default)]
    pub require_confirm: bool,
    /// Ignore "today" when computing the lower bound
    #[serde(default)]
    pub allow_past: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Selection {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

/// What a click did to the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The day is disabled, nothing changed
    Ignored,
    /// Range start chosen, waiting for the end
    RangeStarted(NaiveDate),
    /// Selection staged until confirm or cancel
    Staged,
    /// Selection committed and the picker closed
    Committed,
}

/// Render information for one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayCell {
    /// `None` for padding cells
    pub date: Option<NaiveDate>,
    pub is_today: bool,
    pub is_disabled: bool,
    pub is_selected: bool,
    pub is_range_start: bool,
    pub is_range_end: bool,
    pub is_in_range: bool,
    pub is_in_preview: bool,
}

impl DayCell {
    fn padding() -> Self {
        Self {
            date: None,
            is_today: false,
            is_disabled: true,
            is_selected: false,
            is_range_start: false,
            is_range_end: false,
            is_in_range: false,
            is_in_preview: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatePicker {
    options: PickerOptions,
    today: NaiveDate,
    cursor: MonthCursor,
    open: bool,
    committed: Selection,
    draft: Selection,
    hovered: Option<NaiveDate>,
}

impl DatePicker {
    /// Create a closed picker. The cursor starts at the month of `today`,
    /// or of the effective minimum when that lies later.
    #[must_use]
    pub fn new(options: PickerOptions, today: NaiveDate) -> Self {
        let mut picker = Self {
            cursor: MonthCursor::of(today),
            options,
            today,
            open: false,
            committed: Selection::default(),
            draft: Selection::default(),
            hovered: None,
        };
        if let Some(min) = picker.effective_min_date() {
            if min > today {
                picker.cursor = MonthCursor::of(min);
            }
        }
        picker
    }

    /// Picker whose "today" is the current UTC day
    #[must_use]
    pub fn with_utc_today(options: PickerOptions) -> Self {
        Self::new(options, dates::today_utc())
    }

    #[must_use]
    pub fn options(&self) -> &PickerOptions {
        &self.options
    }

    #[must_use]
    pub fn mode(&self) -> PickerMode {
        self.options.mode
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.today
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn cursor(&self) -> MonthCursor {
        self.cursor
    }

    /// Replace the blocked days, e.g. after another itinerary was saved
    pub fn set_disabled_dates<I: IntoIterator<Item = NaiveDate>>(&mut self, days: I) {
        self.options.disabled_dates = days.into_iter().collect();
    }

    /// Later of `min_date` and today, or just `min_date` when past days are allowed
    #[must_use]
    pub fn effective_min_date(&self) -> Option<NaiveDate> {
        if self.options.allow_past {
            return self.options.min_date;
        }
        Some(
            self.options
                .min_date
                .map_or(self.today, |min| min.max(self.today)),
        )
    }

    #[must_use]
    pub fn is_disabled(&self, day: NaiveDate) -> bool {
        if let Some(min) = self.effective_min_date() {
            if day < min {
                return true;
            }
        }
        if let Some(max) = self.options.max_date {
            if day > max {
                return true;
            }
        }
        self.options.disabled_dates.contains(&day)
    }

    /// Committed single value (the range start in range mode)
    #[must_use]
    pub fn value(&self) -> Option<NaiveDate> {
        self.committed.start
    }

    /// Committed complete range
    #[must_use]
    pub fn range(&self) -> Option<DateRange> {
        match (self.committed.start, self.committed.end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        }
    }

    /// Selection as currently shown, including staged clicks
    #[must_use]
    pub fn pending_start(&self) -> Option<NaiveDate> {
        self.draft.start
    }

    #[must_use]
    pub fn pending_end(&self) -> Option<NaiveDate> {
        self.draft.end
    }

    /// Set the committed single value from outside (form reset, edit mode)
    pub fn set_value(&mut self, value: Option<NaiveDate>) {
        self.committed = Selection {
            start: value,
            end: None,
        };
        self.draft = self.committed;
    }

    /// Set the committed range from outside
    pub fn set_range(&mut self, range: Option<DateRange>) {
        self.committed = match range {
            Some(range) => Selection {
                start: Some(range.start),
                end: Some(range.end),
            },
            None => Selection::default(),
        };
        self.draft = self.committed;
    }

    /// Open the picker on the month of the current value
    pub fn open(&mut self) {
        self.open = true;
        self.draft = self.committed;
        self.hovered = None;
        if let Some(start) = self.committed.start {
            self.cursor = MonthCursor::of(start);
        }
    }

    /// Close without touching the committed value
    pub fn close(&mut self) {
        self.open = false;
        self.hovered = None;
        self.draft = self.committed;
    }

    pub fn next_month(&mut self) {
        self.cursor = self.cursor.next();
    }

    pub fn prev_month(&mut self) {
        self.cursor = self.cursor.prev();
    }

    pub fn jump_to(&mut self, day: NaiveDate) {
        self.cursor = MonthCursor::of(day);
    }

    pub fn hover(&mut self, day: Option<NaiveDate>) {
        self.hovered = day;
    }

    /// Handle a click on a day cell
    pub fn click(&mut self, day: NaiveDate) -> ClickOutcome {
        if self.is_disabled(day) {
            debug!(%day, "ignoring click on disabled day");
            return ClickOutcome::Ignored;
        }

        match self.options.mode {
            PickerMode::Single => {
                self.draft = Selection {
                    start: Some(day),
                    end: None,
                };
                self.settle()
            }
            PickerMode::Range => match (self.draft.start, self.draft.end) {
                (Some(start), None) => {
                    let range = DateRange::new(start, day);
                    self.draft = Selection {
                        start: Some(range.start),
                        end: Some(range.end),
                    };
                    self.hovered = None;
                    self.settle()
                }
                _ => {
                    self.draft = Selection {
                        start: Some(day),
                        end: None,
                    };
                    ClickOutcome::RangeStarted(day)
                }
            },
        }
    }

    fn settle(&mut self) -> ClickOutcome {
        if self.options.require_confirm {
            ClickOutcome::Staged
        } else {
            self.commit();
            ClickOutcome::Committed
        }
    }

    fn commit(&mut self) {
        self.committed = self.draft;
        self.open = false;
        self.hovered = None;
    }

    /// Commit the staged selection. A range with only a start becomes a
    /// single-day range. Returns `false` if nothing was staged.
    pub fn confirm(&mut self) -> bool {
        let Some(start) = self.draft.start else {
            return false;
        };
        if self.options.mode == PickerMode::Range && self.draft.end.is_none() {
            self.draft.end = Some(start);
        }
        self.commit();
        true
    }

    /// Drop the staged selection and close
    pub fn cancel(&mut self) {
        self.close();
    }

    /// Clear both staged and committed selection
    pub fn clear(&mut self) {
        self.committed = Selection::default();
        self.draft = Selection::default();
        self.hovered = None;
    }

    /// Whether `day` is highlighted as part of the hover preview
    #[must_use]
    pub fn is_in_preview(&self, day: NaiveDate) -> bool {
        if self.options.mode != PickerMode::Range {
            return false;
        }
        match (self.draft.start, self.draft.end, self.hovered) {
            (Some(start), None, Some(hovered)) => {
                let (low, high) = dates::ordered(start, hovered);
                dates::span_contains(low, high, day)
            }
            _ => false,
        }
    }

    fn cell(&self, day: NaiveDate) -> DayCell {
        let (is_range_start, is_range_end, is_in_range) = match (self.draft.start, self.draft.end) {
            (Some(start), Some(end)) => (
                day == start,
                day == end,
                dates::span_contains(start, end, day),
            ),
            (Some(start), None) => (day == start, false, false),
            _ => (false, false, false),
        };
        let is_selected = match self.options.mode {
            PickerMode::Single => self.draft.start == Some(day),
            PickerMode::Range => is_range_start || is_range_end,
        };

        DayCell {
            date: Some(day),
            is_today: day == self.today,
            is_disabled: self.is_disabled(day),
            is_selected,
            is_range_start,
            is_range_end,
            is_in_range,
            is_in_preview: self.is_in_preview(day),
        }
    }

    /// Cells for the displayed month, padding included, Sunday first
    #[must_use]
    pub fn cells(&self) -> Vec<DayCell> {
        let grid = MonthGrid::for_cursor(self.cursor);
        let mut cells = Vec::with_capacity(42);
        cells.extend((0..grid.leading_blanks).map(|_| DayCell::padding()));
        cells.extend(grid.days.iter().map(|day| self.cell(*day)));
        cells.extend((0..grid.trailing_blanks()).map(|_| DayCell::padding()));
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 10, 1)
    }

    fn range_picker() -> DatePicker {
        DatePicker::new(
            PickerOptions {
                mode: PickerMode::Range,
                ..PickerOptions::default()
            },
            today(),
        )
    }

    #[test]
    fn test_single_click_commits_and_closes() {
        let mut picker = DatePicker::new(PickerOptions::default(), today());
        picker.open();
        assert_eq!(picker.click(date(2025, 10, 5)), ClickOutcome::Committed);
        assert_eq!(picker.value(), Some(date(2025, 10, 5)));
        assert!(!picker.is_open());
    }

    #[test]
    fn test_single_with_confirm_stages_until_confirmed() {
        let mut picker = DatePicker::new(
            PickerOptions {
                require_confirm: true,
                ..PickerOptions::default()
            },
            today(),
        );
        picker.open();
        assert_eq!(picker.click(date(2025, 10, 5)), ClickOutcome::Staged);
        assert_eq!(picker.value(), None);
        assert_eq!(picker.pending_start(), Some(date(2025, 10, 5)));
        assert!(picker.is_open());

        assert!(picker.confirm());
        assert_eq!(picker.value(), Some(date(2025, 10, 5)));
        assert!(!picker.is_open());
    }

    #[test]
    fn test_cancel_restores_committed_value() {
        let mut picker = DatePicker::new(
            PickerOptions {
                require_confirm: true,
                ..PickerOptions::default()
            },
            today(),
        );
        picker.set_value(Some(date(2025, 10, 3)));
        picker.open();
        picker.click(date(2025, 10, 9));
        picker.cancel();
        assert_eq!(picker.value(), Some(date(2025, 10, 3)));
        assert_eq!(picker.pending_start(), Some(date(2025, 10, 3)));
        assert!(!picker.is_open());
    }

    #[rstest]
    #[case(date(2025, 10, 3), date(2025, 10, 8))]
    #[case(date(2025, 10, 8), date(2025, 10, 3))]
    #[case(date(2025, 10, 8), date(2025, 10, 8))]
    #[case(date(2025, 12, 30), date(2025, 11, 2))]
    fn test_two_clicks_always_ordered(#[case] first: NaiveDate, #[case] second: NaiveDate) {
        let mut picker = range_picker();
        picker.open();
        assert_eq!(picker.click(first), ClickOutcome::RangeStarted(first));
        assert_eq!(picker.click(second), ClickOutcome::Committed);

        let range = picker.range().unwrap();
        assert!(range.start <= range.end);
        assert_eq!(range, DateRange::new(first, second));
    }

    #[test]
    fn test_third_click_restarts_range() {
        let mut picker = DatePicker::new(
            PickerOptions {
                mode: PickerMode::Range,
                require_confirm: true,
                ..PickerOptions::default()
            },
            today(),
        );
        picker.open();
        picker.click(date(2025, 10, 3));
        picker.click(date(2025, 10, 8));
        assert_eq!(
            picker.click(date(2025, 10, 20)),
            ClickOutcome::RangeStarted(date(2025, 10, 20))
        );
        assert_eq!(picker.pending_start(), Some(date(2025, 10, 20)));
        assert_eq!(picker.pending_end(), None);
    }

    #[test]
    fn test_reopening_committed_range_restarts_on_click() {
        let mut picker = range_picker();
        picker.open();
        picker.click(date(2025, 10, 3));
        picker.click(date(2025, 10, 8));
        picker.open();
        assert_eq!(
            picker.click(date(2025, 10, 12)),
            ClickOutcome::RangeStarted(date(2025, 10, 12))
        );
        // committed range untouched until the new one completes
        assert_eq!(
            picker.range(),
            Some(DateRange::new(date(2025, 10, 3), date(2025, 10, 8)))
        );
    }

    #[test]
    fn test_confirm_half_range_becomes_single_day() {
        let mut picker = DatePicker::new(
            PickerOptions {
                mode: PickerMode::Range,
                require_confirm: true,
                ..PickerOptions::default()
            },
            today(),
        );
        picker.open();
        picker.click(date(2025, 10, 4));
        assert!(picker.confirm());
        assert_eq!(
            picker.range(),
            Some(DateRange::new(date(2025, 10, 4), date(2025, 10, 4)))
        );
    }

    #[test]
    fn test_confirm_without_selection() {
        let mut picker = range_picker();
        picker.open();
        assert!(!picker.confirm());
        assert!(picker.is_open());
    }

    #[test]
    fn test_days_before_today_are_disabled_by_default() {
        let picker = DatePicker::new(PickerOptions::default(), today());
        assert!(picker.is_disabled(date(2025, 9, 30)));
        assert!(!picker.is_disabled(today()));
    }

    #[test]
    fn test_effective_min_is_later_of_min_and_today() {
        let early_min = DatePicker::new(
            PickerOptions {
                min_date: Some(date(2025, 9, 1)),
                ..PickerOptions::default()
            },
            today(),
        );
        assert_eq!(early_min.effective_min_date(), Some(today()));
        assert!(early_min.is_disabled(date(2025, 9, 15)));

        let late_min = DatePicker::new(
            PickerOptions {
                min_date: Some(date(2025, 11, 10)),
                ..PickerOptions::default()
            },
            today(),
        );
        assert_eq!(late_min.effective_min_date(), Some(date(2025, 11, 10)));
        assert!(late_min.is_disabled(date(2025, 11, 9)));
        assert_eq!(late_min.cursor(), MonthCursor::new(2025, 10).unwrap());
    }

    #[test]
    fn test_allow_past_uses_only_min_date() {
        let picker = DatePicker::new(
            PickerOptions {
                allow_past: true,
                min_date: Some(date(2025, 1, 1)),
                ..PickerOptions::default()
            },
            today(),
        );
        assert!(!picker.is_disabled(date(2025, 3, 1)));
        assert!(picker.is_disabled(date(2024, 12, 31)));
    }

    #[test]
    fn test_max_and_explicit_disabled_dates() {
        let mut picker = DatePicker::new(
            PickerOptions {
                max_date: Some(date(2025, 10, 20)),
                ..PickerOptions::default()
            },
            today(),
        );
        picker.set_disabled_dates([date(2025, 10, 10)]);

        assert!(picker.is_disabled(date(2025, 10, 21)));
        assert!(picker.is_disabled(date(2025, 10, 10)));
        assert!(!picker.is_disabled(date(2025, 10, 11)));
        assert_eq!(picker.click(date(2025, 10, 10)), ClickOutcome::Ignored);
        assert_eq!(picker.value(), None);
    }

    #[test]
    fn test_hover_preview_spans_both_directions() {
        let mut picker = range_picker();
        picker.open();
        picker.click(date(2025, 10, 10));

        picker.hover(Some(date(2025, 10, 14)));
        assert!(picker.is_in_preview(date(2025, 10, 12)));
        assert!(!picker.is_in_preview(date(2025, 10, 15)));

        picker.hover(Some(date(2025, 10, 6)));
        assert!(picker.is_in_preview(date(2025, 10, 8)));
        assert!(!picker.is_in_preview(date(2025, 10, 12)));

        picker.click(date(2025, 10, 14));
        assert!(!picker.is_in_preview(date(2025, 10, 12)));
    }

    #[test]
    fn test_navigation_wraps_years() {
        let mut picker = DatePicker::new(PickerOptions::default(), date(2025, 12, 15));
        picker.next_month();
        assert_eq!(picker.cursor(), MonthCursor::new(2026, 0).unwrap());
        picker.prev_month();
        picker.prev_month();
        assert_eq!(picker.cursor(), MonthCursor::new(2025, 10).unwrap());
    }

    #[test]
    fn test_cells_mark_today_and_range() {
        let mut picker = range_picker();
        picker.set_range(Some(DateRange::new(date(2025, 10, 3), date(2025, 10, 5))));
        picker.open();
        let cells = picker.cells();

        // October 2025: 3 leading blanks, 31 days, 1 trailing blank
        assert_eq!(cells.len(), 35);
        assert!(cells[..3].iter().all(|cell| cell.date.is_none()));

        let find = |day: u32| {
            cells
                .iter()
                .find(|cell| cell.date == Some(date(2025, 10, day)))
                .copied()
                .unwrap()
        };
        assert!(find(1).is_today);
        assert!(find(3).is_range_start && find(3).is_selected);
        assert!(find(4).is_in_range && !find(4).is_selected);
        assert!(find(5).is_range_end);
        assert!(!find(6).is_in_range);
    }
}
