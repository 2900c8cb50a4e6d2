use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::dates;

/// A month on the UTC calendar, addressed by year and 0-based month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthCursor {
    pub year: i32,
    pub month0: u32,
}

impl MonthCursor {
    /// `None` when `month0` is not in `0..=11`
    #[must_use]
    pub fn new(year: i32, month0: u32) -> Option<Self> {
        (month0 <= 11).then_some(Self { year, month0 })
    }

    /// Month containing `date`
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month0: date.month0(),
        }
    }

    /// Following month, December wraps to January of the next year.
    /// Stays put at the last month `i32` years can address.
    #[must_use]
    pub fn next(self) -> Self {
        if self.month0 >= 11 {
            match self.year.checked_add(1) {
                Some(year) => Self { year, month0: 0 },
                None => self,
            }
        } else {
            Self {
                year: self.year,
                month0: self.month0 + 1,
            }
        }
    }

    /// Preceding month, January wraps to December of the previous year.
    /// Stays put at the first month `i32` years can address.
    #[must_use]
    pub fn prev(self) -> Self {
        if self.month0 == 0 {
            match self.year.checked_sub(1) {
                Some(year) => Self { year, month0: 11 },
                None => self,
            }
        } else {
            Self {
                year: self.year,
                month0: self.month0 - 1,
            }
        }
    }

    #[must_use]
    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month0 + 1, 1)
    }

    #[must_use]
    pub fn days_in_month(self) -> u32 {
        dates::days_in_month(self.year, self.month0)
    }

    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month0() == self.month0
    }

    /// "October 2025"
    #[must_use]
    pub fn label(self) -> String {
        format!("{} {}", dates::month_name(self.month0), self.year)
    }
}

/// Day cells of one month laid out in Sunday-first weeks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month0: u32,
    /// Blank cells before the 1st (0 = month starts on Sunday)
    pub leading_blanks: u32,
    pub days: Vec<NaiveDate>,
}

impl MonthGrid {
    /// Build the grid for a month. An out-of-range month or year yields an
    /// empty grid rather than an error.
    #[must_use]
    pub fn build(year: i32, month0: u32) -> Self {
        let empty = Self {
            year,
            month0,
            leading_blanks: 0,
            days: Vec::new(),
        };

        let Some(cursor) = MonthCursor::new(year, month0) else {
            return empty;
        };
        let Some(first) = cursor.first_day() else {
            return empty;
        };

        let days = first
            .iter_days()
            .take(cursor.days_in_month() as usize)
            .collect();

        Self {
            year,
            month0,
            leading_blanks: first.weekday().num_days_from_sunday(),
            days,
        }
    }

    #[must_use]
    pub fn for_cursor(cursor: MonthCursor) -> Self {
        Self::build(cursor.year, cursor.month0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Blank cells after the last day so the final week is complete
    #[must_use]
    pub fn trailing_blanks(&self) -> u32 {
        if self.days.is_empty() {
            return 0;
        }
        let used = self.leading_blanks + self.days.len() as u32;
        (7 - used % 7) % 7
    }

    /// Rows of seven cells, `None` for padding
    #[must_use]
    pub fn weeks(&self) -> Vec<[Option<NaiveDate>; 7]> {
        if self.days.is_empty() {
            return Vec::new();
        }

        let cells: Vec<Option<NaiveDate>> = std::iter::repeat_n(None, self.leading_blanks as usize)
            .chain(self.days.iter().copied().map(Some))
            .chain(std::iter::repeat_n(None, self.trailing_blanks() as usize))
            .collect();

        cells
            .chunks(7)
            .map(|chunk| {
                let mut week = [None; 7];
                week.copy_from_slice(chunk);
                week
            })
            .collect()
    }
}
