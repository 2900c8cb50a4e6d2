//! Groups activities and expenses into the days of a trip
//!
//! For every day of the trip the owning itinerary is the first one (in the
//! order given) whose span contains the day. Spans are expected not to
//! overlap; when they do, the extra claims are reported in
//! [`DailyPlan::conflicts`] and the first itinerary keeps the day.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};

use crate::dates;
use crate::models::{Accommodation, Activity, Expense, RecordId, Travel, TravelItinerary};

/// An activity or an expense, as shown in the planner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "item", rename_all = "lowercase")]
pub enum DailyPlanItem {
    Activity(Activity),
    Expense(Expense),
}

impl DailyPlanItem {
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Self::Activity(activity) => activity.date,
            Self::Expense(expense) => expense.date,
        }
    }

    #[must_use]
    pub fn itinerary_id(&self) -> Option<RecordId> {
        match self {
            Self::Activity(activity) => activity.itinerary_id,
            Self::Expense(expense) => expense.itinerary_id,
        }
    }

    #[must_use]
    pub fn cost(&self) -> f64 {
        match self {
            Self::Activity(activity) => activity.cost,
            Self::Expense(expense) => expense.cost,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Activity(activity) => &activity.name,
            Self::Expense(expense) => &expense.description,
        }
    }

    #[must_use]
    pub fn is_activity(&self) -> bool {
        matches!(self, Self::Activity(_))
    }

    /// Activities by start time (untimed last), then expenses
    fn sort_key(&self) -> (u8, bool, Option<NaiveTime>) {
        match self {
            Self::Activity(activity) => (0, activity.start_time.is_none(), activity.start_time),
            Self::Expense(_) => (1, true, None),
        }
    }
}

/// The night of a day and where it is spent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccommodationNight {
    pub accommodation_id: RecordId,
    pub name: String,
    pub nightly_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    /// 1-based position of the day in the trip
    pub day_number: u32,
    pub itinerary_id: Option<RecordId>,
    pub place_name: Option<String>,
    pub items: Vec<DailyPlanItem>,
    pub accommodation: Option<AccommodationNight>,
    pub activity_count: usize,
    pub expense_count: usize,
    /// Activity costs plus expense costs of this day
    pub total_cost: f64,
}

/// Items without a date, grouped by the itinerary they were filed under
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnscheduledGroup {
    pub itinerary_id: Option<RecordId>,
    pub items: Vec<DailyPlanItem>,
}

/// A day claimed by more than one itinerary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayConflict {
    pub date: NaiveDate,
    /// Every claiming itinerary, the owner first
    pub itinerary_ids: Vec<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPlan {
    pub travel_id: RecordId,
    pub days: Vec<DayPlan>,
    pub unscheduled: Vec<UnscheduledGroup>,
    /// Dated items that fall outside the trip range
    pub out_of_range: Vec<DailyPlanItem>,
    pub conflicts: Vec<DayConflict>,
    /// Sum of all scheduled day totals
    pub total_cost: f64,
}

impl DailyPlan {
    #[must_use]
    pub fn day(&self, date: NaiveDate) -> Option<&DayPlan> {
        self.days.iter().find(|day| day.date == date)
    }

    /// Days owned by one itinerary
    pub fn days_for_itinerary(&self, itinerary_id: RecordId) -> impl Iterator<Item = &DayPlan> {
        self.days
            .iter()
            .filter(move |day| day.itinerary_id == Some(itinerary_id))
    }

    #[must_use]
    pub fn unscheduled_count(&self) -> usize {
        self.unscheduled.iter().map(|group| group.items.len()).sum()
    }
}

/// Build the day-by-day view of a trip
#[must_use]
pub fn build_daily_plan(
    trip: &Travel,
    itineraries: &[TravelItinerary],
    activities: &[Activity],
    expenses: &[Expense],
    accommodations: &[Accommodation],
) -> DailyPlan {
    let items = activities
        .iter()
        .cloned()
        .map(DailyPlanItem::Activity)
        .chain(expenses.iter().cloned().map(DailyPlanItem::Expense));

    let mut by_day: BTreeMap<NaiveDate, Vec<DailyPlanItem>> = BTreeMap::new();
    let mut unscheduled: BTreeMap<Option<RecordId>, Vec<DailyPlanItem>> = BTreeMap::new();
    let mut out_of_range = Vec::new();

    for item in items {
        match item.date() {
            Some(day) if trip.contains(day) => by_day.entry(day).or_default().push(item),
            Some(day) => {
                debug!(%day, title = item.title(), "item dated outside the trip");
                out_of_range.push(item);
            }
            None => unscheduled.entry(item.itinerary_id()).or_default().push(item),
        }
    }

    let mut days = Vec::new();
    let mut conflicts = Vec::new();

    for (index, date) in trip.days().enumerate() {
        let mut claims = itineraries.iter().filter(|itinerary| itinerary.contains(date));
        let owner = claims.next();
        let extra: Vec<RecordId> = claims.map(|itinerary| itinerary.id).collect();

        if let Some(owner) = owner {
            if !extra.is_empty() {
                warn!(
                    %date,
                    owner = owner.id,
                    others = ?extra,
                    "day claimed by overlapping itineraries"
                );
                conflicts.push(DayConflict {
                    date,
                    itinerary_ids: std::iter::once(owner.id).chain(extra).collect(),
                });
            }
        }

        let mut day_items = by_day.remove(&date).unwrap_or_default();
        day_items.sort_by_key(DailyPlanItem::sort_key);

        let activity_count = day_items.iter().filter(|item| item.is_activity()).count();
        let expense_count = day_items.len() - activity_count;
        let total_cost = day_items.iter().map(DailyPlanItem::cost).sum();

        let accommodation = accommodations
            .iter()
            .find(|stay| stay.covers(date))
            .map(|stay| AccommodationNight {
                accommodation_id: stay.id,
                name: stay.name.clone(),
                nightly_cost: stay.nightly_cost(),
            });

        days.push(DayPlan {
            date,
            day_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
            itinerary_id: owner.map(|itinerary| itinerary.id),
            place_name: owner.map(|itinerary| itinerary.place_name.clone()),
            items: day_items,
            accommodation,
            activity_count,
            expense_count,
            total_cost,
        });
    }

    let total_cost = days.iter().map(|day| day.total_cost).sum();

    debug!(
        travel_id = trip.id,
        days = days.len(),
        range = %dates::format_date_range_display(trip.start_date, trip.end_date),
        "built daily plan"
    );

    DailyPlan {
        travel_id: trip.id,
        days,
        unscheduled: unscheduled
            .into_iter()
            .map(|(itinerary_id, items)| UnscheduledGroup { itinerary_id, items })
            .collect(),
        out_of_range,
        conflicts,
        total_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExpenseCategory;
    use crate::planner::fixtures::*;

    #[test]
    fn test_every_trip_day_present_with_owner() {
        let itineraries = vec![
            itinerary(10, "Rome", date(10, 1), date(10, 3)),
            itinerary(11, "Florence", date(10, 4), date(10, 5)),
        ];
        let plan = build_daily_plan(&trip(), &itineraries, &[], &[], &[]);

        assert_eq!(plan.days.len(), 6);
        assert_eq!(plan.days[0].day_number, 1);
        assert_eq!(plan.days[0].place_name.as_deref(), Some("Rome"));
        assert_eq!(plan.days[3].itinerary_id, Some(11));
        assert_eq!(plan.days[5].itinerary_id, None);
        assert!(plan.conflicts.is_empty());
        assert_eq!(plan.days_for_itinerary(10).count(), 3);
    }

    #[test]
    fn test_items_summed_per_day() {
        let activities = vec![
            activity(1, "Colosseum", Some(date(10, 2)), 18.0),
            activity(2, "Vatican", Some(date(10, 2)), 25.0),
            activity(3, "Uffizi", Some(date(10, 4)), 20.0),
        ];
        let expenses = vec![
            expense(1, ExpenseCategory::Food, Some(date(10, 2)), 42.5),
            expense(2, ExpenseCategory::Transport, Some(date(10, 4)), 9.5),
        ];
        let plan = build_daily_plan(&trip(), &[], &activities, &expenses, &[]);

        let second = plan.day(date(10, 2)).unwrap();
        assert_eq!(second.activity_count, 2);
        assert_eq!(second.expense_count, 1);
        assert_eq!(second.total_cost, 85.5);

        let fourth = plan.day(date(10, 4)).unwrap();
        assert_eq!(fourth.total_cost, 29.5);

        assert_eq!(plan.day(date(10, 1)).unwrap().total_cost, 0.0);
        assert_eq!(plan.total_cost, 115.0);
    }

    #[test]
    fn test_items_ordered_by_time_then_expenses() {
        let mut late = activity(1, "Dinner cruise", Some(date(10, 2)), 0.0);
        late.start_time = NaiveTime::from_hms_opt(19, 0, 0);
        let mut early = activity(2, "Breakfast", Some(date(10, 2)), 0.0);
        early.start_time = NaiveTime::from_hms_opt(8, 0, 0);
        let untimed = activity(3, "Gelato", Some(date(10, 2)), 0.0);
        let taxi = expense(1, ExpenseCategory::Transport, Some(date(10, 2)), 12.0);

        let plan = build_daily_plan(&trip(), &[], &[untimed, late, early], &[taxi], &[]);
        let titles: Vec<_> = plan.day(date(10, 2)).unwrap().items.iter().map(DailyPlanItem::title).collect();
        assert_eq!(titles, vec!["Breakfast", "Dinner cruise", "Gelato", "expense 1"]);
    }

    #[test]
    fn test_dateless_and_out_of_range_items_kept_aside() {
        let mut idea = activity(1, "Cooking class", None, 60.0);
        idea.itinerary_id = Some(10);
        let loose = activity(2, "Opera", None, 80.0);
        let early = expense(1, ExpenseCategory::Transport, Some(date(9, 20)), 150.0);

        let plan = build_daily_plan(&trip(), &[], &[idea, loose], &[early], &[]);

        assert_eq!(plan.unscheduled_count(), 2);
        assert_eq!(plan.unscheduled[0].itinerary_id, None);
        assert_eq!(plan.unscheduled[1].itinerary_id, Some(10));
        assert_eq!(plan.out_of_range.len(), 1);
        assert_eq!(plan.total_cost, 0.0);
    }

    #[test]
    fn test_overlapping_itineraries_first_wins_and_conflict_reported() {
        let itineraries = vec![
            itinerary(10, "Rome", date(10, 1), date(10, 3)),
            itinerary(11, "Naples", date(10, 3), date(10, 4)),
        ];
        let plan = build_daily_plan(&trip(), &itineraries, &[], &[], &[]);

        assert_eq!(plan.day(date(10, 3)).unwrap().itinerary_id, Some(10));
        assert_eq!(
            plan.conflicts,
            vec![DayConflict {
                date: date(10, 3),
                itinerary_ids: vec![10, 11],
            }]
        );
    }

    #[test]
    fn test_accommodation_nights() {
        let stays = vec![stay(1, date(10, 1), date(10, 3), 200.0)];
        let plan = build_daily_plan(&trip(), &[], &[], &[], &stays);

        let night = plan.day(date(10, 2)).unwrap().accommodation.clone().unwrap();
        assert_eq!(night.nightly_cost, 100.0);
        assert!(plan.day(date(10, 3)).unwrap().accommodation.is_none());
    }
}
