use crate::config::Config;
use crate::dataset::{Dataset, EditOutcome, View};
use crate::error::TribesResult;
use crate::loader::load;
use crate::record::{ConnectionRecord, DatasetKind, PointsRecord, Record};
use crate::saving::{Snapshot, commit_all, persist, stage};
use std::path::{Path, PathBuf};

/// Owner of both datasets and the files behind them.
///
/// Every mutation re-reads the file first, applies the change to a copy,
/// writes the copy, and only then replaces the in-memory dataset. A failed
/// write leaves memory and disk as they were.
#[derive(Debug)]
pub struct RecordStore {
    points_path: PathBuf,
    connection_path: PathBuf,
    points: Dataset<PointsRecord>,
    connection: Dataset<ConnectionRecord>,
}

/// Record kinds the store keeps a slot for.
pub trait Stored: Record {
    fn slot(store: &RecordStore) -> &Dataset<Self>;
    fn slot_mut(store: &mut RecordStore) -> &mut Dataset<Self>;
    fn path(store: &RecordStore) -> &Path;
}

impl Stored for PointsRecord {
    fn slot(store: &RecordStore) -> &Dataset<Self> {
        &store.points
    }

    fn slot_mut(store: &mut RecordStore) -> &mut Dataset<Self> {
        &mut store.points
    }

    fn path(store: &RecordStore) -> &Path {
        &store.points_path
    }
}

impl Stored for ConnectionRecord {
    fn slot(store: &RecordStore) -> &Dataset<Self> {
        &store.connection
    }

    fn slot_mut(store: &mut RecordStore) -> &mut Dataset<Self> {
        &mut store.connection
    }

    fn path(store: &RecordStore) -> &Path {
        &store.connection_path
    }
}

impl RecordStore {
    /// A store over the configured files. Nothing is read until `load`.
    pub fn new(config: &Config) -> Self {
        RecordStore {
            points_path: config.data_file(DatasetKind::Points),
            connection_path: config.data_file(DatasetKind::Connection),
            points: Dataset::default(),
            connection: Dataset::default(),
        }
    }

    pub fn path_of<R: Stored>(&self) -> &Path {
        R::path(self)
    }

    /// The dataset as of the last load or mutation.
    pub fn dataset<R: Stored>(&self) -> &Dataset<R> {
        R::slot(self)
    }

    /// Re-read `R`'s file; the file is the source of truth.
    pub fn load<R: Stored>(&mut self) -> TribesResult<&Dataset<R>> {
        let outcome = load::<R>(R::path(self))?;
        *R::slot_mut(self) = outcome.dataset;
        Ok(R::slot(self))
    }

    /// Append one record and persist. Returns the new row's index.
    pub fn append<R: Stored>(&mut self, record: R) -> TribesResult<usize> {
        self.mutate(|data: &mut Dataset<R>| data.append(record))
    }

    pub fn apply_edits<R: Stored>(&mut self, edited: &View<R>) -> TribesResult<EditOutcome> {
        self.mutate(|data: &mut Dataset<R>| data.apply_edits(edited))
    }

    /// Returns how many rows were removed. Nothing is written when that is zero.
    pub fn delete_rows<R: Stored>(
        &mut self,
        surviving: &View<R>,
        original: &View<R>,
    ) -> TribesResult<usize> {
        self.load::<R>()?;
        let mut next = R::slot(self).clone();
        let removed = next.delete_rows(surviving, original);
        if removed > 0 {
            persist(&next, R::path(self))?;
            *R::slot_mut(self) = next;
        }
        Ok(removed)
    }

    pub fn snapshot(&mut self) -> TribesResult<Snapshot> {
        self.load::<PointsRecord>()?;
        self.load::<ConnectionRecord>()?;
        Ok(Snapshot::new(&self.points, &self.connection))
    }

    /// Replace both datasets with the snapshot's rows and persist them.
    ///
    /// Both files are written before either is renamed into place; if either
    /// step fails, both files and memory keep their previous content.
    pub fn restore(&mut self, snapshot: Snapshot) -> TribesResult<()> {
        let points = Dataset::new(snapshot.points);
        let connection = Dataset::new(snapshot.connection);
        let staged = vec![
            stage(&points, &self.points_path)?,
            stage(&connection, &self.connection_path)?,
        ];
        commit_all(staged)?;
        log::info!(
            "restored {} points and {} connection rows",
            points.len(),
            connection.len()
        );
        self.points = points;
        self.connection = connection;
        Ok(())
    }

    fn mutate<R: Stored, T>(&mut self, change: impl FnOnce(&mut Dataset<R>) -> T) -> TribesResult<T> {
        self.load::<R>()?;
        let mut next = R::slot(self).clone();
        let result = change(&mut next);
        persist(&next, R::path(self))?;
        *R::slot_mut(self) = next;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ViewRow;
    use crate::record::Tribe;
    use chrono::NaiveDate;

    fn store_in(dir: &Path) -> RecordStore {
        RecordStore::new(&Config::default().with_data_dir(dir))
    }

    fn points(d: u32, game: &str, points: u32) -> PointsRecord {
        PointsRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            tribe: Tribe::new("Tribo Levi").unwrap(),
            game: game.to_string(),
            points,
        }
    }

    #[test]
    fn append_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append(points(1, "Race", 3)).unwrap();
        let record = points(2, "Tug of war", 5);
        assert_eq!(store.append(record.clone()).unwrap(), 1);

        let mut fresh = store_in(dir.path());
        let loaded = fresh.load::<PointsRecord>().unwrap();
        assert_eq!(loaded.last(), Some(&record));
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn file_changes_are_picked_up_before_mutating() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append(points(1, "Race", 3)).unwrap();

        let mut other = store_in(dir.path());
        other.append(points(2, "Quiz", 4)).unwrap();

        store.append(points(3, "Relay", 1)).unwrap();
        let games: Vec<String> = store
            .dataset::<PointsRecord>()
            .rows()
            .iter()
            .map(|r| r.game.clone())
            .collect();
        assert_eq!(games, vec!["Race", "Quiz", "Relay"]);
    }

    #[test]
    fn corrupt_file_aborts_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        let path = store.path_of::<PointsRecord>().to_path_buf();
        std::fs::write(&path, "Date,Tribe\n2024-01-01,Tribo Levi\n").unwrap();

        assert!(store.append(points(1, "Race", 3)).is_err());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Date,Tribe\n2024-01-01,Tribo Levi\n"
        );
    }

    #[test]
    fn edits_touch_only_their_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        for (d, game) in [(1, "Race"), (2, "Quiz"), (3, "Relay")] {
            store.append(points(d, game, 1)).unwrap();
        }
        let edited = View {
            rows: vec![ViewRow {
                index: Some(1),
                record: points(2, "Quiz", 9),
            }],
        };
        let outcome = store.apply_edits(&edited).unwrap();
        assert_eq!(outcome.updated, 1);

        let mut fresh = store_in(dir.path());
        let loaded = fresh.load::<PointsRecord>().unwrap();
        assert_eq!(loaded.get(0), Some(&points(1, "Race", 1)));
        assert_eq!(loaded.get(1), Some(&points(2, "Quiz", 9)));
        assert_eq!(loaded.get(2), Some(&points(3, "Relay", 1)));
    }

    #[test]
    fn snapshot_restore_rewrites_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append(points(1, "Race", 3)).unwrap();
        let snapshot = store.snapshot().unwrap();

        store.append(points(2, "Quiz", 4)).unwrap();
        store.restore(snapshot).unwrap();

        let mut fresh = store_in(dir.path());
        assert_eq!(fresh.load::<PointsRecord>().unwrap().len(), 1);
        assert!(fresh.load::<ConnectionRecord>().unwrap().is_empty());
    }

    #[test]
    fn failed_restore_keeps_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.append(points(1, "Race", 3)).unwrap();
        let snapshot = store.snapshot().unwrap();
        store.append(points(2, "Quiz", 4)).unwrap();

        let points_path = store.path_of::<PointsRecord>().to_path_buf();
        let before = std::fs::read_to_string(&points_path).unwrap();
        let blocker = store.path_of::<ConnectionRecord>().to_path_buf();
        std::fs::create_dir(&blocker).unwrap();
        std::fs::write(blocker.join("keep"), "x").unwrap();

        assert!(store.restore(snapshot).is_err());
        assert_eq!(std::fs::read_to_string(&points_path).unwrap(), before);
        assert_eq!(store.dataset::<PointsRecord>().len(), 2);
    }
}
