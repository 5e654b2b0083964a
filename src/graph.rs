#![cfg(feature = "web")]
use crate::record::DatasetKind;
use crate::report::Summary;
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;

/// Configuration options for chart generation
#[derive(Clone, Debug)]
pub struct ChartOptions {
    /// Title displayed at the top of the chart
    pub title: String,

    /// Label for the X-axis
    pub x_label: String,

    /// Label for the Y-axis
    pub y_label: String,

    /// Width of the chart in pixels
    pub width: u32,

    /// Height of the chart in pixels
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: "Chart".to_string(),
            x_label: "Tribe".to_string(),
            y_label: "Total".to_string(),
            width: 800,
            height: 600,
        }
    }
}

impl ChartOptions {
    /// Titles matching the dataset being charted.
    pub fn for_kind(kind: DatasetKind) -> Self {
        match kind {
            DatasetKind::Points => Self {
                title: "Points per tribe".to_string(),
                y_label: "Points".to_string(),
                ..Self::default()
            },
            DatasetKind::Connection => Self {
                title: "Youth per tribe".to_string(),
                y_label: "Jovens".to_string(),
                ..Self::default()
            },
        }
    }
}

/// Renders a summary as a PNG bar chart
///
/// One bar per tribe, left to right in the summary's ascending order.
///
/// # Arguments
/// * `summary` - Per-tribe totals; must not be empty
/// * `options` - Chart titles and size
///
/// # Returns
/// * A Result containing the PNG image data as bytes or an error
///
/// # Implementation Notes
/// * Draws into an in-memory RGB buffer, then encodes it as PNG
pub fn render_bar_chart(
    summary: &Summary,
    options: &ChartOptions,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if summary.is_empty() {
        return Err("nothing to chart".into());
    }

    let names: Vec<String> = summary
        .totals
        .iter()
        .map(|entry| entry.tribe.to_string())
        .collect();
    let bars = names.len() as u32;
    let max_y = summary.max_total() + 1;

    let mut buffer = vec![0u8; options.width as usize * options.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d((0u32..bars).into_segmented(), 0u64..max_y)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .x_label_formatter(&|value| match value {
                SegmentValue::CenterOf(i) => names.get(*i as usize).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .draw()?;

        chart.draw_series(
            Histogram::vertical(&chart)
                .style(BLUE.filled())
                .margin(20)
                .data(
                    summary
                        .totals
                        .iter()
                        .enumerate()
                        .map(|(i, entry)| (i as u32, entry.total)),
                ),
        )?;

        root.present()?;
    }

    let image = RgbImage::from_raw(options.width, options.height, buffer)
        .ok_or("chart buffer has the wrong size")?;
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ValueColumn;

    #[test]
    fn empty_summary_is_not_charted() {
        let summary = Summary {
            column: ValueColumn::Points,
            totals: Vec::new(),
        };
        assert!(render_bar_chart(&summary, &ChartOptions::default()).is_err());
    }

    #[test]
    fn kind_options_name_the_column() {
        assert_eq!(ChartOptions::for_kind(DatasetKind::Connection).y_label, "Jovens");
        assert_eq!(ChartOptions::for_kind(DatasetKind::Points).width, 800);
    }
}
