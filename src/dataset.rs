use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The full in-memory table for one kind, in insertion order.
///
/// A row is identified only by its position, so every mutation here keeps
/// the relative order of the rows it does not touch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
pub struct Dataset<R: Record> {
    rows: Vec<R>,
}

impl<R: Record> Default for Dataset<R> {
    fn default() -> Self {
        Dataset { rows: Vec::new() }
    }
}

/// A row of a view together with the dataset index it was taken from.
///
/// `index` is `None` for a row added while editing a view; such rows are
/// appended when the edits are applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
pub struct ViewRow<R: Record> {
    #[serde(default)]
    pub index: Option<usize>,
    pub record: R,
}

/// A filtered subset of a dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "R: Record")]
pub struct View<R: Record> {
    pub rows: Vec<ViewRow<R>>,
}

impl<R: Record> Default for View<R> {
    fn default() -> Self {
        View { rows: Vec::new() }
    }
}

/// What `Dataset::apply_edits` changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    pub updated: usize,
    pub appended: usize,
}

impl<R: Record> Dataset<R> {
    pub fn new(rows: Vec<R>) -> Self {
        Dataset { rows }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&R> {
        self.rows.get(index)
    }

    pub fn last(&self) -> Option<&R> {
        self.rows.last()
    }

    /// Every row, each tagged with its own index.
    pub fn full_view(&self) -> View<R> {
        View {
            rows: self
                .rows
                .iter()
                .enumerate()
                .map(|(index, record)| ViewRow {
                    index: Some(index),
                    record: record.clone(),
                })
                .collect(),
        }
    }

    /// Add `record` as the last row and return its index.
    pub fn append(&mut self, record: R) -> usize {
        self.rows.push(record);
        self.rows.len() - 1
    }

    /// Overwrite every row the edited view still points at, and append the
    /// rows it introduces. Nothing is removed.
    pub fn apply_edits(&mut self, edited: &View<R>) -> EditOutcome {
        let mut outcome = EditOutcome::default();
        for row in &edited.rows {
            match row.index {
                Some(index) if index < self.rows.len() => {
                    if self.rows[index] != row.record {
                        self.rows[index] = row.record.clone();
                    }
                    outcome.updated += 1;
                }
                _ => {
                    self.rows.push(row.record.clone());
                    outcome.appended += 1;
                }
            }
        }
        outcome
    }

    /// Remove the rows that were in `original` but are missing from
    /// `surviving`. Returns how many rows were removed.
    pub fn delete_rows(&mut self, surviving: &View<R>, original: &View<R>) -> usize {
        let kept = surviving.indices();
        let doomed: BTreeSet<usize> = original
            .indices()
            .difference(&kept)
            .copied()
            .filter(|index| *index < self.rows.len())
            .collect();

        if doomed.is_empty() {
            return 0;
        }

        let mut position = 0;
        self.rows.retain(|_| {
            let keep = !doomed.contains(&position);
            position += 1;
            keep
        });
        doomed.len()
    }
}

impl<R: Record> View<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The dataset indices this view refers to. New rows carry none.
    pub fn indices(&self) -> BTreeSet<usize> {
        self.rows.iter().filter_map(|row| row.index).collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &R> {
        self.rows.iter().map(|row| &row.record)
    }

    pub fn find(&self, index: usize) -> Option<&ViewRow<R>> {
        self.rows.iter().find(|row| row.index == Some(index))
    }

    /// A copy of this view without the rows at the given dataset indices.
    pub fn without(&self, indices: &BTreeSet<usize>) -> View<R> {
        View {
            rows: self
                .rows
                .iter()
                .filter(|row| row.index.is_none_or(|index| !indices.contains(&index)))
                .cloned()
                .collect(),
        }
    }

    /// A copy of this view with the row at `index` replaced by `record`.
    pub fn with_replaced(&self, index: usize, record: R) -> Option<View<R>> {
        let mut edited = self.clone();
        let row = edited.rows.iter_mut().find(|row| row.index == Some(index))?;
        row.record = record;
        Some(edited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PointsRecord, Tribe};
    use chrono::NaiveDate;

    fn points(day: u32, tribe: &str, game: &str, points: u32) -> PointsRecord {
        PointsRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            tribe: Tribe::new(tribe).unwrap(),
            game: game.to_string(),
            points,
        }
    }

    fn sample() -> Dataset<PointsRecord> {
        Dataset::new(vec![
            points(1, "A", "Race", 3),
            points(2, "B", "Quiz", 10),
            points(3, "A", "Relay", 5),
            points(4, "B", "Chess", 1),
        ])
    }

    #[test]
    fn append_keeps_prior_order() {
        let mut data = sample();
        let index = data.append(points(5, "A", "Swim", 2));
        assert_eq!(index, 4);
        assert_eq!(data.len(), 5);
        assert_eq!(data.get(0).unwrap().game, "Race");
        assert_eq!(data.last().unwrap().game, "Swim");
    }

    #[test]
    fn apply_edits_overwrites_matching_rows_and_appends_new_ones() {
        let mut data = sample();
        let mut edited = View {
            rows: vec![data.full_view().rows[2].clone()],
        };
        edited.rows[0].record.points = 50;
        edited.rows.push(ViewRow {
            index: None,
            record: points(9, "B", "Tag", 4),
        });

        let outcome = data.apply_edits(&edited);

        assert_eq!(outcome, EditOutcome { updated: 1, appended: 1 });
        assert_eq!(data.get(2).unwrap().points, 50);
        assert_eq!(data.get(0).unwrap(), &points(1, "A", "Race", 3));
        assert_eq!(data.get(1).unwrap(), &points(2, "B", "Quiz", 10));
        assert_eq!(data.last().unwrap().game, "Tag");
    }

    #[test]
    fn apply_edits_appends_rows_pointing_past_the_end() {
        let mut data = sample();
        let edited = View {
            rows: vec![ViewRow {
                index: Some(40),
                record: points(9, "B", "Tag", 4),
            }],
        };
        let outcome = data.apply_edits(&edited);
        assert_eq!(outcome.appended, 1);
        assert_eq!(data.len(), 5);
    }

    #[test]
    fn delete_rows_removes_only_rows_dropped_from_the_view() {
        let mut data = sample();
        let original = View {
            rows: data.full_view().rows.into_iter().skip(1).collect(),
        };
        let surviving = original.without(&BTreeSet::from([1, 3]));

        let removed = data.delete_rows(&surviving, &original);

        assert_eq!(removed, original.len() - surviving.len());
        assert_eq!(removed, 2);
        let games: Vec<&str> = data.rows().iter().map(|r| r.game.as_str()).collect();
        assert_eq!(games, vec!["Race", "Relay"]);
    }

    #[test]
    fn delete_rows_ignores_rows_outside_the_original_view() {
        let mut data = sample();
        let original = View {
            rows: vec![data.full_view().rows[0].clone()],
        };
        // Surviving view forgets row 2 too, but row 2 was never in the original view.
        let surviving = View::default();
        assert_eq!(data.delete_rows(&surviving, &original), 1);
        assert_eq!(data.len(), 3);
        assert_eq!(data.get(1).unwrap().game, "Relay");
    }

    #[test]
    fn unchanged_view_deletes_nothing() {
        let mut data = sample();
        let view = data.full_view();
        assert_eq!(data.delete_rows(&view, &view), 0);
        assert_eq!(data, sample());
    }

    #[test]
    fn with_replaced_targets_one_index() {
        let data = sample();
        let view = data.full_view();
        let edited = view.with_replaced(1, points(2, "B", "Quiz", 11)).unwrap();
        assert_eq!(edited.find(1).unwrap().record.points, 11);
        assert_eq!(edited.find(0).unwrap().record.points, 3);
        assert!(view.with_replaced(99, points(2, "B", "Quiz", 11)).is_none());
    }
}
