use crate::config::Config;
use crate::dataset::{EditOutcome, View};
use crate::error::{TribesError, TribesResult};
use crate::filter::{Category, DateRange, Filter};
use crate::login::{SessionGate, SessionState};
use crate::record::{ConnectionRecord, DatasetKind, PointsRecord, Tribe, parse_date};
use crate::report::{Summary, sum_by_category};
use crate::saving::{Snapshot, decode_snapshot, encode_snapshot};
use crate::store::{RecordStore, Stored};
use chrono::NaiveDate;

/// The last query run against one dataset, and what it returned.
///
/// `view` is dropped by the next mutation of that dataset: its indices may no
/// longer name the rows the caller saw, so edits and deletes need a new query.
#[derive(Debug, Clone)]
pub struct Captured<R: Stored> {
    pub filter: Filter,
    pub view: Option<View<R>>,
}

/// Application context handed to every presentation layer.
///
/// Holds the login gate, the record store and the view each dataset was last
/// queried with. Indices for edits and deletes always come from that view,
/// which is only valid until the dataset next changes.
#[derive(Debug)]
pub struct App {
    config: Config,
    gate: SessionGate,
    store: RecordStore,
    points_view: Option<Captured<PointsRecord>>,
    connection_view: Option<Captured<ConnectionRecord>>,
}

/// Kinds the controller keeps a captured view for.
pub trait Tracked: Stored {
    fn captured(app: &App) -> Option<&Captured<Self>>;
    fn captured_mut(app: &mut App) -> &mut Option<Captured<Self>>;
}

impl Tracked for PointsRecord {
    fn captured(app: &App) -> Option<&Captured<Self>> {
        app.points_view.as_ref()
    }

    fn captured_mut(app: &mut App) -> &mut Option<Captured<Self>> {
        &mut app.points_view
    }
}

impl Tracked for ConnectionRecord {
    fn captured(app: &App) -> Option<&Captured<Self>> {
        app.connection_view.as_ref()
    }

    fn captured_mut(app: &mut App) -> &mut Option<Captured<Self>> {
        &mut app.connection_view
    }
}

impl App {
    pub fn new(config: Config) -> Self {
        App {
            gate: SessionGate::new(config.access_code.clone()),
            store: RecordStore::new(&config),
            config,
            points_view: None,
            connection_view: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session_state(&self) -> SessionState {
        self.gate.state()
    }

    pub fn authenticate(&mut self, code: &str) -> TribesResult<()> {
        self.gate.authenticate(code)
    }

    /// Tribes offered when recording a row.
    pub fn tribes(&self) -> TribesResult<&[Tribe]> {
        self.gate.require()?;
        Ok(self.config.tribes.as_slice())
    }

    // ---- points ----

    pub fn record_points(
        &mut self,
        tribe: &str,
        game: &str,
        points: i64,
        date: &str,
    ) -> TribesResult<usize> {
        self.gate.require()?;
        let record = PointsRecord {
            date: validate_date("date", date)?,
            tribe: self.validate_tribe(tribe)?,
            game: game.trim().to_string(),
            points: validate_count("points", points)?,
        };
        self.record(record)
    }

    pub fn query_points(
        &mut self,
        category: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> TribesResult<View<PointsRecord>> {
        self.query(category, start, end)
    }

    pub fn apply_points_edits(&mut self, edited: &View<PointsRecord>) -> TribesResult<EditOutcome> {
        self.apply_edits(edited)
    }

    pub fn delete_points_rows(&mut self, surviving: &View<PointsRecord>) -> TribesResult<usize> {
        self.delete_rows(surviving)
    }

    pub fn points_summary(&self, view: &View<PointsRecord>) -> TribesResult<Summary> {
        self.summary(view)
    }

    // ---- connection ----

    pub fn record_connection(
        &mut self,
        tribe: &str,
        youth_count: i64,
        date: &str,
    ) -> TribesResult<usize> {
        self.gate.require()?;
        let record = ConnectionRecord {
            date: validate_date("date", date)?,
            tribe: self.validate_tribe(tribe)?,
            youth_count: validate_count("youth count", youth_count)?,
        };
        self.record(record)
    }

    pub fn query_connection(
        &mut self,
        category: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> TribesResult<View<ConnectionRecord>> {
        self.query(category, start, end)
    }

    pub fn apply_connection_edits(
        &mut self,
        edited: &View<ConnectionRecord>,
    ) -> TribesResult<EditOutcome> {
        self.apply_edits(edited)
    }

    pub fn delete_connection_rows(
        &mut self,
        surviving: &View<ConnectionRecord>,
    ) -> TribesResult<usize> {
        self.delete_rows(surviving)
    }

    pub fn connection_summary(&self, view: &View<ConnectionRecord>) -> TribesResult<Summary> {
        self.summary(view)
    }

    // ---- shared by both kinds ----

    /// Append a validated record and persist its dataset.
    pub fn record<R: Tracked>(&mut self, record: R) -> TribesResult<usize> {
        self.gate.require()?;
        let index = self.store.append(record)?;
        self.invalidate::<R>();
        Ok(index)
    }

    /// Load the dataset, filter it and remember the result for later edits.
    pub fn query<R: Tracked>(
        &mut self,
        category: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> TribesResult<View<R>> {
        self.gate.require()?;
        let dataset = self.store.load::<R>()?;
        let filter = Filter {
            category: Category::parse(category),
            range: DateRange::resolve(dataset, start, end),
        };
        let view = filter.apply(dataset);
        *R::captured_mut(self) = Some(Captured {
            filter,
            view: Some(view.clone()),
        });
        Ok(view)
    }

    /// Run the last query for `R` again and capture its fresh result.
    ///
    /// Returns `None` when `R` was never queried.
    pub fn requery<R: Tracked>(&mut self) -> TribesResult<Option<View<R>>> {
        self.gate.require()?;
        let Some(filter) = R::captured(self).map(|captured| captured.filter.clone()) else {
            return Ok(None);
        };
        let view = filter.apply(self.store.load::<R>()?);
        *R::captured_mut(self) = Some(Captured {
            filter,
            view: Some(view.clone()),
        });
        Ok(Some(view))
    }

    /// The view captured by the last query, unless the dataset changed since.
    pub fn current_view<R: Tracked>(&self) -> TribesResult<Option<&View<R>>> {
        self.gate.require()?;
        Ok(R::captured(self).and_then(|captured| captured.view.as_ref()))
    }

    pub fn current_filter<R: Tracked>(&self) -> Option<&Filter> {
        R::captured(self).map(|captured| &captured.filter)
    }

    pub fn apply_edits<R: Tracked>(&mut self, edited: &View<R>) -> TribesResult<EditOutcome> {
        self.gate.require()?;
        if self.captured_view::<R>().is_none() {
            return Err(no_view(R::KIND));
        }
        let outcome = self.store.apply_edits(edited)?;
        self.invalidate::<R>();
        Ok(outcome)
    }

    /// Delete the rows of the captured view that `surviving` no longer has.
    pub fn delete_rows<R: Tracked>(&mut self, surviving: &View<R>) -> TribesResult<usize> {
        self.gate.require()?;
        let original = match self.captured_view::<R>() {
            Some(view) => view.clone(),
            None => return Err(no_view(R::KIND)),
        };
        let removed = self.store.delete_rows(surviving, &original)?;
        if removed > 0 {
            self.invalidate::<R>();
        }
        Ok(removed)
    }

    pub fn summary<R: Tracked>(&self, view: &View<R>) -> TribesResult<Summary> {
        self.gate.require()?;
        sum_by_category(view, R::KIND.value_column())
    }

    /// The whole dataset as CSV, freshly read from its file.
    pub fn export_csv<R: Tracked>(&mut self) -> TribesResult<String> {
        self.gate.require()?;
        let dataset = self.store.load::<R>()?;
        Ok(crate::downloader::to_csv(dataset))
    }

    #[cfg(feature = "web")]
    pub fn export_xlsx<R: Tracked>(&mut self) -> TribesResult<Vec<u8>> {
        self.gate.require()?;
        let dataset = self.store.load::<R>()?;
        crate::downloader::to_xlsx(dataset).map_err(|e| TribesError::Export(e.to_string()))
    }

    pub fn export_snapshot(&mut self) -> TribesResult<Vec<u8>> {
        self.gate.require()?;
        let snapshot = self.store.snapshot()?;
        let mut buffer = Vec::new();
        encode_snapshot(&snapshot, &mut buffer)?;
        Ok(buffer)
    }

    pub fn restore_snapshot(&mut self, bytes: &[u8]) -> TribesResult<()> {
        self.gate.require()?;
        let snapshot = decode_snapshot(bytes)?;
        self.restore(snapshot)
    }

    pub fn restore(&mut self, snapshot: Snapshot) -> TribesResult<()> {
        self.gate.require()?;
        self.store.restore(snapshot)?;
        self.invalidate::<PointsRecord>();
        self.invalidate::<ConnectionRecord>();
        Ok(())
    }

    fn captured_view<R: Tracked>(&self) -> Option<&View<R>> {
        R::captured(self).and_then(|captured| captured.view.as_ref())
    }

    // The filter survives so `requery` can run it again.
    fn invalidate<R: Tracked>(&mut self) {
        if let Some(captured) = R::captured_mut(self) {
            captured.view = None;
        }
    }

    fn validate_tribe(&self, name: &str) -> TribesResult<Tribe> {
        let tribe = Tribe::new(name)
            .ok_or_else(|| TribesError::validation("tribe", "choose a tribe"))?;
        if self.config.tribes.contains(&tribe) {
            Ok(tribe)
        } else {
            let known: Vec<&str> = self.config.tribes.iter().map(Tribe::as_str).collect();
            Err(TribesError::validation(
                "tribe",
                format!("'{}' is not one of: {}", tribe, known.join(", ")),
            ))
        }
    }
}

fn no_view(kind: DatasetKind) -> TribesError {
    TribesError::validation(
        "view",
        format!("run a fresh {} query before editing or deleting", kind),
    )
}

fn validate_date(field: &str, text: &str) -> TribesResult<NaiveDate> {
    parse_date(text)
        .ok_or_else(|| TribesError::validation(field, format!("'{}' is not a YYYY-MM-DD date", text)))
}

fn validate_count(field: &str, value: i64) -> TribesResult<u32> {
    if value < 0 {
        return Err(TribesError::validation(field, "must not be negative"));
    }
    u32::try_from(value).map_err(|_| TribesError::validation(field, "is too large"))
}
