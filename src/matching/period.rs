//! Effective accounting period of charge payments.
//!
//! The date a social-charge debit hits the bank and the month it settles
//! are not the same thing. Retirement funds post several debits on one
//! calendar day, each settling a consecutive prior month; payroll charges
//! paid early in a month settle the previous month. This module computes
//! the period a payment actually belongs to.

use chrono::{Datelike, Months, NaiveDate};

use crate::types::ChargeCategory;

/// A same-category payment record considered for same-day ranking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeSibling {
    /// Id of the filing the payment settles
    pub id: String,
    pub date: NaiveDate,
}

impl ChargeSibling {
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date,
        }
    }
}

/// Effective accounting period of one charge payment.
///
/// - `RETIREMENT`: payments sharing the exact payment date are ranked by
///   filing id ascending (1-based); the period is the payment date shifted
///   back by `rank` months.
/// - `PAYROLL`: a payment dated on day 1 through 15 settles the prior
///   month; later days settle the payment month itself.
/// - anything else: the payment date is the period.
///
/// Month arithmetic clamps to the end of shorter months, so a 2024-04-30
/// payment ranked second resolves to 2024-02-29. Deterministic for a given
/// sibling set regardless of its order. Consumers compare periods by year
/// and month.
pub fn effective_period(
    payment_date: NaiveDate,
    category: ChargeCategory,
    id: &str,
    same_date_siblings: &[ChargeSibling],
) -> NaiveDate {
    match category {
        ChargeCategory::Retirement => {
            let mut ids: Vec<&str> = same_date_siblings
                .iter()
                .filter(|sibling| sibling.date == payment_date)
                .map(|sibling| sibling.id.as_str())
                .collect();
            if !ids.contains(&id) {
                ids.push(id);
            }
            ids.sort_unstable();
            ids.dedup();
            let rank = ids.iter().position(|sid| *sid == id).unwrap_or(0) as u32 + 1;
            payment_date
                .checked_sub_months(Months::new(rank))
                .unwrap_or(payment_date)
        }
        ChargeCategory::Payroll => {
            if payment_date.day() <= 15 {
                payment_date
                    .checked_sub_months(Months::new(1))
                    .unwrap_or(payment_date)
            } else {
                payment_date
            }
        }
        ChargeCategory::Other => payment_date,
    }
}
