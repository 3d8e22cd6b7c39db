use crate::models::EntityRecord;
use serde::Serialize;

pub const ACTIVE_STATUS: &str = "Aktif";

/// Display totals for a dashboard tile. Not authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Totals {
    pub total_members: usize,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
}

impl Totals {
    pub fn compute(members: &[EntityRecord], incomes: &[EntityRecord], expenses: &[EntityRecord]) -> Self {
        let total_income = sum_amounts(incomes);
        let total_expense = sum_amounts(expenses);
        Self {
            total_members: count_active(members),
            total_income,
            total_expense,
            balance: total_income - total_expense,
        }
    }
}

pub fn sum_amounts(records: &[EntityRecord]) -> f64 {
    records.iter().map(|record| record.amount("amount")).sum()
}

pub fn count_active(members: &[EntityRecord]) -> usize {
    members
        .iter()
        .filter(|member| member.text("status").as_deref() == Some(ACTIVE_STATUS))
        .count()
}
