use crate::dataset::Dataset;
use crate::record::Record;

/// Convert a dataset to CSV format
///
/// Writes the canonical header row for the dataset's kind, then one line per
/// row in dataset order. Fields containing commas, quotes or line breaks are
/// quoted, with inner quotes doubled.
///
/// # Arguments
/// * `dataset` - Reference to the dataset to convert
///
/// # Returns
/// * `String` - CSV content, always ending in a newline
///
/// # Examples
/// ```
/// use tribes::dataset::Dataset;
/// use tribes::downloader::to_csv;
/// use tribes::record::PointsRecord;
///
/// let data = Dataset::<PointsRecord>::default();
/// assert_eq!(to_csv(&data), "Date,Tribe,Game,Points\n");
/// ```
pub fn to_csv<R: Record>(dataset: &Dataset<R>) -> String {
    let mut csv_content = String::new();
    push_line(&mut csv_content, R::KIND.columns().iter().copied());
    for record in dataset.rows() {
        let fields = record.to_fields();
        push_line(&mut csv_content, fields.iter().map(String::as_str));
    }
    csv_content
}

fn push_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, value) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r')
        {
            let escaped = value.replace('"', "\"\"");
            out.push_str(&format!("\"{}\"", escaped));
        } else {
            out.push_str(value);
        }
    }
    out.push('\n');
}

/// Convert a dataset to XLSX format
///
/// One worksheet named after the dataset kind: a header row, then the rows.
/// Counts are written as numbers, everything else as text.
///
/// # Arguments
/// * `dataset` - Reference to the dataset to convert
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx<R: Record>(dataset: &Dataset<R>) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name(R::KIND.label())?;

    let columns = R::KIND.columns();
    let numeric = columns.len() - 1;
    for (c, name) in columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, *name)?;
    }

    for (r, record) in dataset.rows().iter().enumerate() {
        let row = (r + 1) as u32;
        for (c, value) in record.to_fields().iter().enumerate() {
            match value.parse::<f64>() {
                Ok(number) if c == numeric => {
                    worksheet.write_number(row, c as u16, number)?;
                }
                _ => {
                    worksheet.write_string(row, c as u16, value.as_str())?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PointsRecord, Tribe};
    use chrono::NaiveDate;

    #[test]
    fn special_characters_are_quoted() {
        let data = Dataset::new(vec![PointsRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            tribe: Tribe::new("Tribo Levi").unwrap(),
            game: "Cabo de guerra, \"final\"".to_string(),
            points: 5,
        }]);
        assert_eq!(
            to_csv(&data),
            "Date,Tribe,Game,Points\n2024-01-01,Tribo Levi,\"Cabo de guerra, \"\"final\"\"\",5\n"
        );
    }
}
