use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{Accommodation, Activity, Expense, Travel};

/// Spend of a trip against its budget, all amounts in the trip currency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub budget: Option<f64>,
    pub currency: String,
    pub activities_total: f64,
    pub expenses_total: f64,
    pub accommodation_total: f64,
    pub total_spent: f64,
    /// Expense totals keyed by expense category. Activity and accommodation
    /// spend is reported in its own fields, never merged in here.
    pub by_category: BTreeMap<String, f64>,
    /// `None` when the trip has no budget
    pub remaining: Option<f64>,
    pub over_budget: bool,
}

impl BudgetSummary {
    /// Share of the budget already spent, `None` without a positive budget
    #[must_use]
    pub fn spent_ratio(&self) -> Option<f64> {
        self.budget
            .filter(|budget| *budget > 0.0)
            .map(|budget| self.total_spent / budget)
    }
}

#[must_use]
pub fn summarize_budget(
    trip: &Travel,
    activities: &[Activity],
    expenses: &[Expense],
    accommodations: &[Accommodation],
) -> BudgetSummary {
    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    for expense in expenses {
        *by_category.entry(expense.category.to_string()).or_default() += expense.cost;
    }

    let activities_total: f64 = activities.iter().map(|activity| activity.cost).sum();
    let expenses_total: f64 = expenses.iter().map(|expense| expense.cost).sum();
    let accommodation_total: f64 = accommodations.iter().map(|stay| stay.cost).sum();

    let total_spent = activities_total + expenses_total + accommodation_total;
    let remaining = trip.budget.map(|budget| budget - total_spent);

    BudgetSummary {
        budget: trip.budget,
        currency: trip.currency.clone(),
        activities_total,
        expenses_total,
        accommodation_total,
        total_spent,
        by_category,
        remaining,
        over_budget: remaining.is_some_and(|left| left < 0.0),
    }
}
