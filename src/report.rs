use crate::dataset::View;
use crate::error::{TribesError, TribesResult};
use crate::record::{Record, Tribe, ValueColumn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Total of one column for one tribe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TribeTotal {
    pub tribe: Tribe,
    pub total: u64,
}

/// Per-tribe totals, ascending by total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub column: ValueColumn,
    pub totals: Vec<TribeTotal>,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn get(&self, tribe: &str) -> Option<u64> {
        self.totals
            .iter()
            .find(|entry| entry.tribe.as_str() == tribe)
            .map(|entry| entry.total)
    }

    pub fn max_total(&self) -> u64 {
        self.totals.iter().map(|entry| entry.total).max().unwrap_or(0)
    }
}

/// Sum `column` over `view`, grouped by tribe.
///
/// # Arguments
/// * `view` - Filtered rows to summarize
/// * `column` - Numeric column to add up; must belong to the view's record kind
///
/// # Returns
/// * `TribesResult<Summary>` - Totals ordered ascending, ties broken by tribe
///   name. An empty view gives an empty summary, which callers must not chart.
pub fn sum_by_category<R: Record>(view: &View<R>, column: ValueColumn) -> TribesResult<Summary> {
    if R::KIND.value_column() != column {
        return Err(TribesError::validation(
            "column",
            format!("{} rows have no {} column", R::KIND, column.name()),
        ));
    }

    let mut grouped: BTreeMap<Tribe, u64> = BTreeMap::new();
    for record in view.records() {
        let value = record.value(column).unwrap_or(0);
        *grouped.entry(record.tribe().clone()).or_insert(0) += value;
    }

    let mut totals: Vec<TribeTotal> = grouped
        .into_iter()
        .map(|(tribe, total)| TribeTotal { tribe, total })
        .collect();
    // Stable sort keeps the name order from the map for equal totals.
    totals.sort_by_key(|entry| entry.total);

    Ok(Summary { column, totals })
}

/// Horizontal text bars for terminals, one line per tribe.
pub fn text_bars(summary: &Summary, width: usize) -> Vec<String> {
    let max = summary.max_total().max(1);
    let label_width = summary
        .totals
        .iter()
        .map(|entry| entry.tribe.as_str().chars().count())
        .max()
        .unwrap_or(0);

    summary
        .totals
        .iter()
        .map(|entry| {
            let len = (entry.total as u128 * width as u128 / max as u128) as usize;
            let pad = label_width - entry.tribe.as_str().chars().count();
            format!(
                "{}{} | {} {}",
                entry.tribe,
                " ".repeat(pad),
                "#".repeat(len),
                entry.total
            )
        })
        .collect()
}
