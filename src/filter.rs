use crate::dataset::{Dataset, View, ViewRow};
use crate::record::{Record, Tribe};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Sentinel accepted in place of a tribe name to select every row.
pub const ALL_TRIBES: &str = "All";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    All,
    Tribe(Tribe),
}

impl Category {
    /// `All`, `Todas` (any case) or a blank string select everything.
    pub fn parse(text: &str) -> Category {
        let text = text.trim();
        if text.is_empty()
            || text.eq_ignore_ascii_case(ALL_TRIBES)
            || text.eq_ignore_ascii_case("todas")
        {
            return Category::All;
        }
        match Tribe::new(text) {
            Some(tribe) => Category::Tribe(tribe),
            None => Category::All,
        }
    }

    fn matches(&self, tribe: &Tribe) -> bool {
        match self {
            Category::All => true,
            Category::Tribe(wanted) => wanted == tribe,
        }
    }
}

/// Inclusive date range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// From the earliest to the latest date in `dataset`; today..today when
    /// the dataset is empty.
    pub fn spanning<R: Record>(dataset: &Dataset<R>) -> Self {
        let dates = dataset.rows().iter().map(R::date);
        match (dates.clone().min(), dates.max()) {
            (Some(start), Some(end)) => DateRange { start, end },
            _ => {
                let today = Local::now().date_naive();
                DateRange {
                    start: today,
                    end: today,
                }
            }
        }
    }

    /// Fill whichever bound is missing from the dataset's own span.
    pub fn resolve<R: Record>(
        dataset: &Dataset<R>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        let span = DateRange::spanning(dataset);
        DateRange {
            start: start.unwrap_or(span.start),
            end: end.unwrap_or(span.end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A category and a date range; a row must pass both.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub category: Category,
    pub range: DateRange,
}

impl Filter {
    pub fn apply<R: Record>(&self, dataset: &Dataset<R>) -> View<R> {
        select(dataset, |record| {
            self.category.matches(record.tribe()) && self.range.contains(record.date())
        })
    }
}

pub fn by_category<R: Record>(dataset: &Dataset<R>, category: &Category) -> View<R> {
    select(dataset, |record| category.matches(record.tribe()))
}

pub fn by_date_range<R: Record>(dataset: &Dataset<R>, range: DateRange) -> View<R> {
    select(dataset, |record| range.contains(record.date()))
}

fn select<R: Record>(dataset: &Dataset<R>, keep: impl Fn(&R) -> bool) -> View<R> {
    View {
        rows: dataset
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, record)| keep(*record))
            .map(|(index, record)| ViewRow {
                index: Some(index),
                record: record.clone(),
            })
            .collect(),
    }
}
