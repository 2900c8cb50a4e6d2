//! Calendar month grids and the date / date-range picker
//!
//! All day arithmetic runs on UTC calendar days, see [`crate::dates`].

pub mod month;
pub mod picker;

pub use month::{MonthCursor, MonthGrid};
pub use picker::{ClickOutcome, DatePicker, DateRange, DayCell, PickerMode, PickerOptions};

use std::fmt::Write;

/// Plain text rendering of a picker month, used by the CLI.
///
/// Disabled days are wrapped in parentheses, selected days in brackets and
/// today is suffixed with `*`.
#[must_use]
pub fn render_text(picker: &DatePicker) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:^35}", picker.cursor().label());
    let _ = writeln!(out, " Su   Mo   Tu   We   Th   Fr   Sa");

    for week in picker.cells().chunks(7) {
        for cell in week {
            let text = match cell.date {
                None => String::new(),
                Some(day) => {
                    let number = chrono::Datelike::day(&day).to_string();
                    let marked = if cell.is_selected || cell.is_in_range {
                        format!("[{number}]")
                    } else if cell.is_disabled {
                        format!("({number})")
                    } else {
                        number
                    };
                    if cell.is_today { format!("{marked}*") } else { marked }
                }
            };
            let _ = write!(out, "{text:>5}");
        }
        out.push('\n');
    }
    out
}
