use crate::dataset::Dataset;
use crate::error::{TribesError, TribesResult};
use crate::record::{Record, canonical_column};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// A loaded dataset and the number of rows dropped for unreadable dates.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome<R: Record> {
    pub dataset: Dataset<R>,
    pub dropped: usize,
}

/// Load a dataset from a CSV file
///
/// A missing file is an empty dataset. A file that exists must have a header
/// naming at least the kind's columns (Portuguese aliases accepted).
///
/// # Arguments
/// * `path` - Path to the CSV file to load
///
/// # Returns
/// * `TribesResult<LoadOutcome<R>>` - The rows in file order, or `CorruptData`
///
/// # Examples
/// ```no_run
/// use std::path::Path;
/// use tribes::loader::load;
/// use tribes::record::PointsRecord;
///
/// match load::<PointsRecord>(Path::new("pontos_tribos.csv")) {
///     Ok(outcome) => println!("Loaded {} rows", outcome.dataset.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn load<R: Record>(path: &Path) -> TribesResult<LoadOutcome<R>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("{} not found, starting with an empty {} dataset", path.display(), R::KIND);
            return Ok(LoadOutcome {
                dataset: Dataset::default(),
                dropped: 0,
            });
        }
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(TribesError::corrupt(path, "file is not valid UTF-8"));
        }
        Err(e) => return Err(e.into()),
    };

    let outcome = from_csv::<R>(&content, path)?;
    if outcome.dropped > 0 {
        log::warn!(
            "{}: dropped {} row(s) with unreadable dates",
            path.display(),
            outcome.dropped
        );
    }
    log::debug!("loaded {} {} rows from {}", outcome.dataset.len(), R::KIND, path.display());
    Ok(outcome)
}

/// Parse CSV text into records of kind `R`.
///
/// `path` only labels errors and log lines.
pub fn from_csv<R: Record>(content: &str, path: &Path) -> TribesResult<LoadOutcome<R>> {
    let table = parse_csv(content).map_err(|e| TribesError::corrupt(path, e))?;
    let mut rows = table.into_iter();

    let header = rows
        .next()
        .ok_or_else(|| TribesError::corrupt(path, "file is empty"))?;
    let positions = column_positions::<R>(&header).map_err(|e| TribesError::corrupt(path, e))?;

    let mut records = Vec::new();
    let mut dropped = 0;
    for (n, row) in rows.enumerate() {
        // Line numbers count the header as line 1.
        let line = n + 2;
        if row.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let fields: Vec<&str> = positions
            .iter()
            .map(|&pos| row.get(pos).map(String::as_str).unwrap_or(""))
            .collect();

        match R::from_fields(&fields) {
            Ok(record) => records.push(record),
            Err(e) if e.is_date() && R::KIND.drops_bad_dates() => {
                log::debug!("{} row {}: dropped, {}", path.display(), line, e);
                dropped += 1;
            }
            Err(e) => {
                return Err(TribesError::corrupt(path, format!("row {}: {}", line, e)));
            }
        }
    }

    Ok(LoadOutcome {
        dataset: Dataset::new(records),
        dropped,
    })
}

// Position of each canonical column of `R` within the header row.
fn column_positions<R: Record>(header: &[String]) -> Result<Vec<usize>, String> {
    let names: Vec<&str> = header
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if i == 0 {
                name.trim_start_matches('\u{feff}')
            } else {
                name
            };
            canonical_column(name)
        })
        .collect();

    R::KIND
        .columns()
        .iter()
        .map(|column| {
            names
                .iter()
                .position(|name| name == column)
                .ok_or_else(|| format!("missing column {}", column))
        })
        .collect()
}

/// Parse CSV text into rows of fields.
///
/// Quoted fields may contain commas, doubled quotes and line breaks. Both
/// `\n` and `\r\n` end a row.
pub fn parse_csv(content: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut row_started = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        row_started = true;
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                row.push(std::mem::take(&mut current_field));
            }
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                row.push(std::mem::take(&mut current_field));
                rows.push(std::mem::take(&mut row));
                row_started = false;
            }
            _ => current_field.push(c),
        }
    }

    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    if row_started {
        row.push(current_field);
        rows.push(row);
    }

    Ok(rows)
}

/// Split a single line of comma-separated input into trimmed fields.
///
/// Used for console arguments; quoting works as in files.
pub fn parse_csv_row(line: &str) -> Result<Vec<String>, String> {
    let mut rows = parse_csv(line.trim())?;
    let row = if rows.is_empty() { Vec::new() } else { rows.remove(0) };
    Ok(row.into_iter().map(|field| field.trim().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ConnectionRecord, PointsRecord};

    fn path() -> &'static Path {
        Path::new("test.csv")
    }

    #[test]
    fn parses_quotes_commas_and_line_breaks() {
        let rows = parse_csv("a,b\r\n\"x, y\",\"say \"\"hi\"\"\nthere\"\n").unwrap();
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["x, y".to_string(), "say \"hi\"\nthere".to_string()],
            ]
        );
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(parse_csv("a,\"b\n").is_err());
    }

    #[test]
    fn console_rows_are_trimmed() {
        assert_eq!(
            parse_csv_row(" 2024-01-01, Tribo Levi ,Tug of war,5 ").unwrap(),
            vec!["2024-01-01", "Tribo Levi", "Tug of war", "5"]
        );
        assert!(parse_csv_row("").unwrap().is_empty());
    }

    #[test]
    fn header_order_and_extra_columns_do_not_matter() {
        let csv = "Points,Note,Game,Tribe,Date\n5,x,Tug of war,Tribo Levi,2024-01-01\n";
        let outcome = from_csv::<PointsRecord>(csv, path()).unwrap();
        let record = outcome.dataset.get(0).unwrap();
        assert_eq!(record.points, 5);
        assert_eq!(record.game, "Tug of war");
    }

    #[test]
    fn portuguese_headers_load() {
        let csv = "Data,Tribo,Jogo,Pontos\n2024-01-01,Tribo Judá,Corrida,7\n";
        let outcome = from_csv::<PointsRecord>(csv, path()).unwrap();
        assert_eq!(outcome.dataset.get(0).unwrap().tribe.as_str(), "Tribo Judá");

        let csv = "Data,Tribo,Jovens\n2024-01-01 00:00:00,Tribo Levi,12.0\n";
        let outcome = from_csv::<ConnectionRecord>(csv, path()).unwrap();
        assert_eq!(outcome.dataset.get(0).unwrap().youth_count, 12);
    }

    #[test]
    fn missing_column_is_corrupt() {
        let err = from_csv::<PointsRecord>("Date,Tribe,Game\n", path()).unwrap_err();
        assert!(matches!(err, TribesError::CorruptData { ref reason, .. } if reason == "missing column Points"));
    }

    #[test]
    fn empty_file_is_corrupt() {
        assert!(matches!(
            from_csv::<ConnectionRecord>("", path()),
            Err(TribesError::CorruptData { .. })
        ));
    }

    #[test]
    fn connection_rows_with_bad_dates_are_dropped() {
        let csv = "Date,Tribe,Jovens\n2024-01-01,Tribo Levi,3\nsoon,Tribo Levi,4\n\n2024-01-02,Tribo Judá,5\n";
        let outcome = from_csv::<ConnectionRecord>(csv, path()).unwrap();
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.dataset.len(), 2);
        assert_eq!(outcome.dataset.get(1).unwrap().youth_count, 5);
    }

    #[test]
    fn points_rows_with_bad_dates_fail_the_load() {
        let csv = "Date,Tribe,Game,Points\nsoon,Tribo Levi,Race,4\n";
        let err = from_csv::<PointsRecord>(csv, path()).unwrap_err();
        assert!(matches!(err, TribesError::CorruptData { ref reason, .. } if reason.starts_with("row 2")));
    }

    #[test]
    fn negative_counts_are_corrupt() {
        let csv = "Date,Tribe,Jovens\n2024-01-01,Tribo Levi,-2\n";
        assert!(matches!(
            from_csv::<ConnectionRecord>(csv, path()),
            Err(TribesError::CorruptData { .. })
        ));
    }

    #[test]
    fn missing_file_is_an_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = load::<PointsRecord>(&dir.path().join("absent.csv")).unwrap();
        assert!(outcome.dataset.is_empty());
        assert_eq!(outcome.dropped, 0);
    }
}
