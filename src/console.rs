use crate::controller::{App, Tracked};
use crate::error::{TribesError, TribesResult};
use crate::loader::parse_csv_row;
use crate::record::{ConnectionRecord, DatasetKind, PointsRecord, parse_date};
use crate::report::text_bars;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const BAR_WIDTH: usize = 40;

pub const HELP: &[&str] = &[
    "Commands:",
    "  login <code>                              Unlock everything else",
    "  tribes                                    List the tribes you can record for",
    "  add points <date>,<tribe>,<game>,<points> Record a game result",
    "  add connection <date>,<tribe>,<jovens>    Record youth attendance",
    "  query <kind> [<tribe|All>[,<start>[,<end>]]]  Filter a dataset",
    "  show <kind>                               Print the current view",
    "  edit <kind> <index>,<fields...>           Overwrite one row of the view",
    "  delete <kind> <index>[,<index>...]        Delete rows of the view",
    "  summary <kind>                            Totals per tribe for the view",
    "  export <kind> <file.csv>                  Write the dataset as CSV",
    "  backup <file.bin.gz>                      Write a compressed snapshot",
    "  restore <file.bin.gz>                     Replace both datasets from a snapshot",
    "  q                                         Quit",
    "<kind> is 'points' or 'connection'; dates are YYYY-MM-DD.",
];

/// Result of one console command: a status for the prompt and lines to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub status: String,
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Outcome {
    fn ok(lines: Vec<String>) -> Self {
        Outcome {
            status: "ok".to_string(),
            lines,
            quit: false,
        }
    }

    fn error(err: TribesError) -> Self {
        Outcome {
            status: err.to_string(),
            lines: Vec::new(),
            quit: false,
        }
    }
}

/// Run one line of console input against the app.
pub fn execute(app: &mut App, line: &str) -> Outcome {
    let line = line.trim_end_matches(['\r', '\n']);
    let (command, rest) = split_word(line.trim_start());

    let result = match command {
        "" => Err(TribesError::validation("command", "type 'help' for commands")),
        "q" | "quit" => {
            return Outcome {
                status: "bye".to_string(),
                lines: Vec::new(),
                quit: true,
            };
        }
        "help" => Ok(HELP.iter().map(|line| line.to_string()).collect()),
        "login" => app
            .authenticate(rest.trim())
            .map(|_| vec!["Logged in.".to_string()]),
        "tribes" => app
            .tribes()
            .map(|tribes| tribes.iter().map(|t| t.to_string()).collect()),
        "backup" => backup(app, rest.trim()),
        "restore" => restore(app, rest.trim()),
        "add" | "query" | "show" | "edit" | "delete" | "summary" | "export" => {
            let (kind, args) = split_word(rest.trim_start());
            match DatasetKind::parse(kind) {
                Some(DatasetKind::Points) => run_kind::<PointsRecord>(app, command, args),
                Some(DatasetKind::Connection) => run_kind::<ConnectionRecord>(app, command, args),
                None => Err(TribesError::validation(
                    "kind",
                    format!("'{}' is not 'points' or 'connection'", kind),
                )),
            }
        }
        other => Err(TribesError::validation(
            "command",
            format!("unknown command '{}'", other),
        )),
    };

    match result {
        Ok(lines) => Outcome::ok(lines),
        Err(err) => Outcome::error(err),
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim_start()),
        None => (text, ""),
    }
}

fn run_kind<R: Tracked>(app: &mut App, command: &str, args: &str) -> TribesResult<Vec<String>> {
    match command {
        "add" => add::<R>(app, args),
        "query" => {
            let fields = csv_args(args)?;
            let category = fields.first().map(String::as_str).unwrap_or("");
            let start = optional_date(fields.get(1), "start")?;
            let end = optional_date(fields.get(2), "end")?;
            let view = app.query::<R>(category, start, end)?;
            let mut lines = vec![format!("{} matching {} rows", view.len(), R::KIND)];
            lines.extend(render_rows::<R>(app)?);
            Ok(lines)
        }
        "show" => render_rows::<R>(app),
        "edit" => {
            let fields = csv_args(args)?;
            let Some((index, values)) = fields.split_first() else {
                return Err(TribesError::validation("edit", "give an index and the new fields"));
            };
            let index = parse_index(index)?;
            let values: Vec<&str> = values.iter().map(String::as_str).collect();
            let record = R::from_fields(&values)
                .map_err(|e| TribesError::validation(e.column, e.message))?;
            let edited = current::<R>(app)?
                .with_replaced(index, record)
                .ok_or_else(|| not_in_view(index))?;
            let outcome = app.apply_edits(&edited)?;
            app.requery::<R>()?;
            Ok(vec![format!(
                "{} row(s) saved, {} added",
                outcome.updated, outcome.appended
            )])
        }
        "delete" => {
            let mut doomed = BTreeSet::new();
            for field in csv_args(args)? {
                doomed.insert(parse_index(&field)?);
            }
            if doomed.is_empty() {
                return Err(TribesError::validation("delete", "give at least one index"));
            }
            let view = current::<R>(app)?;
            if let Some(missing) = doomed.iter().find(|i| view.find(**i).is_none()) {
                return Err(not_in_view(*missing));
            }
            let surviving = view.without(&doomed);
            let removed = app.delete_rows(&surviving)?;
            app.requery::<R>()?;
            Ok(vec![format!("{} row(s) deleted", removed)])
        }
        "summary" => {
            let summary = app.summary(current::<R>(app)?)?;
            if summary.is_empty() {
                return Ok(vec!["No rows to chart.".to_string()]);
            }
            Ok(text_bars(&summary, BAR_WIDTH))
        }
        "export" => {
            let target = args.trim();
            if target.is_empty() {
                return Err(TribesError::validation("file", "give a file name"));
            }
            let csv = app.export_csv::<R>()?;
            fs::write(target, csv)?;
            Ok(vec![format!("{} exported to {}", R::KIND, target)])
        }
        other => Err(TribesError::validation(
            "command",
            format!("unknown command '{}'", other),
        )),
    }
}

fn add<R: Tracked>(app: &mut App, args: &str) -> TribesResult<Vec<String>> {
    let fields = csv_args(args)?;
    let field = |i: usize| fields.get(i).map(String::as_str).unwrap_or("");
    let index = match R::KIND {
        DatasetKind::Points => {
            app.record_points(field(1), field(2), parse_number(field(3), "points")?, field(0))?
        }
        DatasetKind::Connection => {
            app.record_connection(field(1), parse_number(field(2), "youth count")?, field(0))?
        }
    };
    // The console shows one view at a time, so it follows its own changes.
    app.requery::<R>()?;
    Ok(vec![format!("Saved {} row {}.", R::KIND, index)])
}

fn backup(app: &mut App, target: &str) -> TribesResult<Vec<String>> {
    if target.is_empty() {
        return Err(TribesError::validation("file", "give a file name"));
    }
    let bytes = app.export_snapshot()?;
    fs::write(target, bytes)?;
    Ok(vec![format!("Snapshot written to {}", target)])
}

fn restore(app: &mut App, source: &str) -> TribesResult<Vec<String>> {
    if source.is_empty() {
        return Err(TribesError::validation("file", "give a file name"));
    }
    // Check the gate before reading anything from disk.
    app.tribes()?;
    let bytes = fs::read(Path::new(source))?;
    app.restore_snapshot(&bytes)?;
    app.requery::<PointsRecord>()?;
    app.requery::<ConnectionRecord>()?;
    Ok(vec![format!("Restored from {}", source)])
}

fn current<R: Tracked>(app: &App) -> TribesResult<&crate::dataset::View<R>> {
    app.current_view::<R>()?.ok_or_else(|| {
        TribesError::validation("view", format!("run 'query {}' first", R::KIND))
    })
}

fn render_rows<R: Tracked>(app: &App) -> TribesResult<Vec<String>> {
    let view = current::<R>(app)?;
    let mut lines = vec![format!("[#] {}", R::KIND.columns().join(" | "))];
    for row in &view.rows {
        let label = row
            .index
            .map(|i| i.to_string())
            .unwrap_or_else(|| "new".to_string());
        lines.push(format!("[{}] {}", label, row.record.to_fields().join(" | ")));
    }
    Ok(lines)
}

fn csv_args(args: &str) -> TribesResult<Vec<String>> {
    parse_csv_row(args).map_err(|e| TribesError::validation("arguments", e))
}

fn parse_index(text: &str) -> TribesResult<usize> {
    text.trim()
        .parse()
        .map_err(|_| TribesError::validation("index", format!("'{}' is not a row index", text)))
}

fn parse_number(text: &str, field: &str) -> TribesResult<i64> {
    text.trim()
        .parse()
        .map_err(|_| TribesError::validation(field, format!("'{}' is not a whole number", text)))
}

fn optional_date(text: Option<&String>, field: &str) -> TribesResult<Option<NaiveDate>> {
    match text.map(|t| t.trim()).filter(|t| !t.is_empty()) {
        None => Ok(None),
        Some(t) => parse_date(t)
            .map(Some)
            .ok_or_else(|| TribesError::validation(field, format!("'{}' is not a date", t))),
    }
}

fn not_in_view(index: usize) -> TribesError {
    TribesError::validation("index", format!("row {} is not in the current view", index))
}
