//! Spending rollups by category and by month
//!
//! Pure functions over a receipt slice. They back the summary view and feed
//! the insights and chat prompts.

use std::collections::{BTreeMap, HashMap};

use crate::models::{Category, CategoryAggregate, MonthlyAggregate, Receipt, SpendingSummary};

/// Sum of every receipt's total
pub fn grand_total(receipts: &[Receipt]) -> f64 {
    receipts.iter().map(|r| r.total_amount).sum()
}

/// Group receipts by category.
///
/// Groups appear in order of first occurrence. When the grand total is zero
/// every percentage is 0 rather than NaN.
pub fn spending_by_category(receipts: &[Receipt]) -> Vec<CategoryAggregate> {
    let total = grand_total(receipts);

    let mut order: Vec<Category> = Vec::new();
    let mut groups: HashMap<Category, (f64, usize)> = HashMap::new();

    for receipt in receipts {
        let entry = groups.entry(receipt.category).or_insert_with(|| {
            order.push(receipt.category);
            (0.0, 0)
        });
        entry.0 += receipt.total_amount;
        entry.1 += 1;
    }

    order
        .into_iter()
        .map(|category| {
            let (amount, count) = groups[&category];
            CategoryAggregate {
                category,
                total_amount: amount,
                count,
                percentage_of_grand_total: if total > 0.0 {
                    (amount / total) * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect()
}

/// Group receipts by `YYYY-MM`, oldest month first
pub fn monthly_spending(receipts: &[Receipt]) -> Vec<MonthlyAggregate> {
    let mut months: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for receipt in receipts {
        let entry = months.entry(receipt.month_key()).or_insert((0.0, 0));
        entry.0 += receipt.total_amount;
        entry.1 += 1;
    }

    months
        .into_iter()
        .map(|(month_key, (total_amount, receipt_count))| MonthlyAggregate {
            month_key,
            total_amount,
            receipt_count,
        })
        .collect()
}

/// Category and month rollups in one pass over the caller's data
pub fn summarize(receipts: &[Receipt]) -> SpendingSummary {
    SpendingSummary {
        grand_total: grand_total(receipts),
        receipt_count: receipts.len(),
        by_category: spending_by_category(receipts),
        by_month: monthly_spending(receipts),
    }
}
