//! CSV export for markups and measurements
//!
//! Flat tables for takeoff reports and spreadsheets. Measurement values are
//! the stored real-world values; nothing is recomputed on export.

use crate::collection::MarkupCollection;
use crate::config::TextMetrics;
use crate::geometry::{polyline_length, Point};
use crate::markup::Markup;
use crate::measurement::{format_value, label_position, MeasurementType, ScaleSystem};
use sheetmark_model::MarkupKind;
use std::io::Write;

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

pub type CsvExportResult<T> = Result<T, CsvExportError>;

/// Configuration for CSV export
#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,

    /// Include locked markups
    pub include_locked: bool,

    /// Export only markups from specific pages (None = all pages)
    pub page_filter: Option<Vec<u32>>,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
            include_locked: true,
            page_filter: None,
        }
    }
}

impl CsvExportConfig {
    fn includes(&self, markup: &Markup) -> bool {
        if !self.include_locked && markup.locked {
            return false;
        }
        match &self.page_filter {
            Some(pages) => pages.contains(&markup.page),
            None => true,
        }
    }
}

fn writer_for<W: Write>(writer: W, config: &CsvExportConfig) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer)
}

/// Markups of the export, ordered by page and then paint order.
fn exported<'a>(collection: &'a MarkupCollection, config: &CsvExportConfig) -> Vec<&'a Markup> {
    let mut markups: Vec<&Markup> = collection.iter().filter(|m| config.includes(m)).collect();
    markups.sort_by_key(|m| (m.page, m.z_index));
    markups
}

/// Export markups to CSV format
///
/// Columns: ID, Page, Kind, Stroke Color, Fill Color, Stroke Width, Opacity,
/// Text, Group, Locked, Rotation, Layer, Created, Geometry and the four
/// bounding-box extents.
pub fn export_markups_csv<W: Write>(
    writer: W,
    collection: &MarkupCollection,
    metrics: &TextMetrics,
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = writer_for(writer, config);

    if config.include_headers {
        csv_writer.write_record([
            "ID",
            "Page",
            "Kind",
            "Stroke Color",
            "Fill Color",
            "Stroke Width",
            "Opacity",
            "Text",
            "Group",
            "Locked",
            "Rotation",
            "Layer",
            "Created",
            "Geometry",
            "BBox Min X",
            "BBox Min Y",
            "BBox Max X",
            "BBox Max Y",
        ])?;
    }

    for markup in exported(collection, config) {
        let bounds = markup.bounds(metrics);
        csv_writer.write_record(&[
            markup.id.to_string(),
            markup.page.to_string(),
            markup.kind.label().to_string(),
            markup.style.stroke_color.clone(),
            markup.style.fill_color.clone().unwrap_or_default(),
            markup.style.stroke_width.to_string(),
            markup.style.opacity.unwrap_or(1.0).to_string(),
            markup.text.clone().unwrap_or_default(),
            markup.group_id.map(|g| g.to_string()).unwrap_or_default(),
            markup.locked.to_string(),
            markup.rotation.to_string(),
            markup.z_index.to_string(),
            markup.created_at.to_string(),
            format_points(&markup.geometry.points()),
            bounds.min_x.to_string(),
            bounds.min_y.to_string(),
            bounds.max_x.to_string(),
            bounds.max_y.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export measurement and dimension markups to CSV format
///
/// Columns: ID, Page, Kind, Type, Value, Unit, Formatted, Scale, Scale Unit,
/// Label Position X/Y, Geometry. Uncalibrated rows leave the value empty.
pub fn export_measurements_csv<W: Write>(
    writer: W,
    collection: &MarkupCollection,
    scale: Option<&ScaleSystem>,
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = writer_for(writer, config);

    if config.include_headers {
        csv_writer.write_record([
            "ID",
            "Page",
            "Kind",
            "Type",
            "Value",
            "Unit",
            "Formatted",
            "Scale",
            "Scale Unit",
            "Label Position X",
            "Label Position Y",
            "Geometry",
        ])?;
    }

    let rows = exported(collection, config)
        .into_iter()
        .filter(|m| m.kind.is_measurement() || m.kind == MarkupKind::Dimension);

    for markup in rows {
        let points = markup.geometry.points();
        let value = match markup.kind {
            MarkupKind::Dimension => scale.map(|s| {
                (s.to_real_world(polyline_length(&points)), s.unit().to_owned())
            }),
            _ => markup.measurement.as_ref().map(|m| (m.value, m.unit.clone())),
        };
        let label = label_position(markup.kind, &points).unwrap_or_default();

        csv_writer.write_record(&[
            markup.id.to_string(),
            markup.page.to_string(),
            markup.kind.label().to_string(),
            measurement_type_name(markup.kind).to_string(),
            value.as_ref().map(|(v, _)| v.to_string()).unwrap_or_default(),
            value.as_ref().map(|(_, u)| u.clone()).unwrap_or_default(),
            value
                .as_ref()
                .map(|(v, u)| format_value(*v, u))
                .unwrap_or_default(),
            scale.map(|s| s.scale().to_string()).unwrap_or_default(),
            scale.map(|s| s.unit().to_string()).unwrap_or_default(),
            label.x.to_string(),
            label.y.to_string(),
            format_points(&points),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn measurement_type_name(kind: MarkupKind) -> &'static str {
    match MeasurementType::for_kind(kind) {
        Some(MeasurementType::Distance) | None => "Distance",
        Some(MeasurementType::PathLength) => "Path Length",
        Some(MeasurementType::Area) => "Area",
    }
}

/// Points as `(x,y)` pairs with two decimals.
fn format_points(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("({:.2},{:.2})", p.x, p.y))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{MarkupGeometry, MarkupStyle};
    use crate::measurement::recompute_collection;

    fn collection() -> MarkupCollection {
        let mut collection = MarkupCollection::new();
        collection.insert(Markup::new(
            MarkupKind::Rectangle,
            0,
            MarkupGeometry::Corners {
                start: Point::new(0.0, 0.0),
                end: Point::new(10.0, 20.0),
            },
            MarkupStyle::default(),
        ));
        collection.insert(Markup::new(
            MarkupKind::MeasureLine,
            1,
            MarkupGeometry::Segment {
                start: Point::new(0.0, 0.0),
                end: Point::new(50.0, 0.0),
            },
            MarkupStyle::default(),
        ));
        collection
    }

    #[test]
    fn test_export_markups_csv() {
        let mut output = Vec::new();
        export_markups_csv(
            &mut output,
            &collection(),
            &TextMetrics::default(),
            &CsvExportConfig::default(),
        )
        .unwrap();

        let csv_content = String::from_utf8(output).unwrap();
        let mut lines = csv_content.lines();
        assert!(lines.next().unwrap().starts_with("ID,Page,Kind"));
        assert_eq!(lines.count(), 2);
        assert!(csv_content.contains("Rectangle"));
        assert!(csv_content.contains("#E53935"));
        assert!(csv_content.contains("(0.00,0.00);(10.00,20.00)"));
    }

    #[test]
    fn test_export_measurements_csv() {
        let mut markups = collection();
        let scale = ScaleSystem::new(0.1, "m").unwrap();
        recompute_collection(&mut markups, Some(&scale));

        let mut output = Vec::new();
        export_measurements_csv(&mut output, &markups, Some(&scale), &CsvExportConfig::default())
            .unwrap();

        let csv_content = String::from_utf8(output).unwrap();
        assert_eq!(csv_content.lines().count(), 2);
        assert!(csv_content.contains("Distance"));
        assert!(csv_content.contains("5 m"));
        assert!(!csv_content.contains("Rectangle"));
    }

    #[test]
    fn test_uncalibrated_measurement_has_empty_value() {
        let mut output = Vec::new();
        let config = CsvExportConfig {
            include_headers: false,
            ..CsvExportConfig::default()
        };
        export_measurements_csv(&mut output, &collection(), None, &config).unwrap();

        let csv_content = String::from_utf8(output).unwrap();
        let row: Vec<&str> = csv_content.trim_end().split(',').collect();
        assert_eq!(row[3], "Distance");
        assert_eq!(row[4], "");
    }

    #[test]
    fn test_csv_with_page_filter() {
        let mut output = Vec::new();
        let config = CsvExportConfig {
            page_filter: Some(vec![1]),
            delimiter: b';',
            ..CsvExportConfig::default()
        };
        export_markups_csv(&mut output, &collection(), &TextMetrics::default(), &config).unwrap();

        let csv_content = String::from_utf8(output).unwrap();
        assert_eq!(csv_content.lines().count(), 2);
        assert!(csv_content.starts_with("ID;Page;Kind"));
        assert!(!csv_content.contains("Rectangle"));
    }

    #[test]
    fn test_locked_markups_can_be_excluded() {
        let mut markups = collection();
        for id in markups.ids() {
            if let Some(markup) = markups.get_mut(id) {
                markup.locked = true;
            }
        }
        let mut output = Vec::new();
        let config = CsvExportConfig {
            include_locked: false,
            ..CsvExportConfig::default()
        };
        export_markups_csv(&mut output, &markups, &TextMetrics::default(), &config).unwrap();

        assert_eq!(String::from_utf8(output).unwrap().lines().count(), 1);
    }
}
