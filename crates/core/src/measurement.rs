//! Calibration scale and real-world measurement
//!
//! A single [`ScaleSystem`] per document version converts document-space
//! lengths into real units. Measurement markups cache their computed value in
//! their [`MeasurementRecord`]; dimension markups cache a formatted label in
//! their text. Both are recomputed whenever the scale changes.

use crate::collection::MarkupCollection;
use crate::error::CalibrationError;
use crate::geometry::{
    distance, path_midpoint, polygon_area, polyline_length, vertex_centroid, Point,
};
use crate::markup::Markup;
use sheetmark_model::{MarkupId, MarkupKind, MeasurementRecord, ScaleRecord};

/// Units offered by the calibration dialog.
pub const CALIBRATION_UNITS: [&str; 6] = ["m", "ft", "cm", "mm", "in", "yd"];

/// Label shown by measurements and dimensions before a scale exists.
pub const CALIBRATION_NEEDED: &str = "Calibration needed";

/// Calibration progress as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Uncalibrated,
    AwaitingFirstPoint,
    AwaitingSecondPoint,
    ScaleInputPending,
    Calibrated,
}

/// Real-world units per document-space unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSystem {
    scale: f64,
    unit: String,
}

impl ScaleSystem {
    pub fn new(scale: f64, unit: impl Into<String>) -> Option<Self> {
        (scale.is_finite() && scale > 0.0).then(|| Self {
            scale,
            unit: unit.into(),
        })
    }

    /// Two-point calibration from a reference line and the user's real length.
    pub fn two_point(
        start: Point,
        end: Point,
        real_length: &str,
        unit: &str,
    ) -> Result<Self, CalibrationError> {
        let trimmed = real_length.trim();
        let real: f64 = trimmed
            .parse()
            .map_err(|_| CalibrationError::NotANumber(trimmed.to_owned()))?;
        if !real.is_finite() {
            return Err(CalibrationError::NotANumber(trimmed.to_owned()));
        }
        if real <= 0.0 {
            return Err(CalibrationError::NonPositiveLength(real));
        }
        let unit = unit.trim();
        if unit.is_empty() {
            return Err(CalibrationError::EmptyUnit);
        }
        let pixel_length = distance(start, end);
        if pixel_length <= f64::EPSILON {
            return Err(CalibrationError::ZeroLengthReference);
        }

        Ok(Self {
            scale: real / pixel_length,
            unit: unit.to_owned(),
        })
    }

    pub fn from_record(record: &ScaleRecord) -> Option<Self> {
        Self::new(record.scale, record.unit.clone())
    }

    pub fn to_record(&self) -> ScaleRecord {
        ScaleRecord {
            scale: self.scale,
            unit: self.unit.clone(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn to_real_world(&self, document_length: f64) -> f64 {
        document_length * self.scale
    }

    /// Area unit label and the divisor that converts squared units into it.
    pub fn area_unit(&self) -> (String, f64) {
        match self.unit.as_str() {
            "mm" => ("m²".to_owned(), 1e6),
            "cm" => ("m²".to_owned(), 1e4),
            other => (format!("{other}²"), 1.0),
        }
    }

    pub fn to_real_area(&self, document_area: f64) -> f64 {
        let (_, divisor) = self.area_unit();
        document_area * self.scale * self.scale / divisor
    }
}

/// Type of quantity a measurement kind reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementType {
    Distance,
    PathLength,
    Area,
}

impl MeasurementType {
    pub fn for_kind(kind: MarkupKind) -> Option<Self> {
        match kind {
            MarkupKind::MeasureLine => Some(MeasurementType::Distance),
            MarkupKind::MeasurePolyline => Some(MeasurementType::PathLength),
            MarkupKind::MeasureArea => Some(MeasurementType::Area),
            _ => None,
        }
    }
}

/// Compute the real-world value of a measurement kind over `points`.
pub fn measure(kind: MarkupKind, points: &[Point], scale: &ScaleSystem) -> Option<MeasurementRecord> {
    let record = match MeasurementType::for_kind(kind)? {
        MeasurementType::Distance | MeasurementType::PathLength => MeasurementRecord {
            value: scale.to_real_world(polyline_length(points)),
            unit: scale.unit().to_owned(),
        },
        MeasurementType::Area => MeasurementRecord {
            value: scale.to_real_area(polygon_area(points)),
            unit: scale.area_unit().0,
        },
    };
    Some(record)
}

/// Two decimals with trailing zeros trimmed: `5 m`, `2.5 m²`, `0.13 ft`.
pub fn format_value(value: f64, unit: &str) -> String {
    let fixed = format!("{value:.2}");
    let number = match fixed.split_once('.') {
        Some((whole, fraction)) => match fraction.trim_end_matches('0') {
            "" => whole.to_owned(),
            fraction => format!("{whole}.{fraction}"),
        },
        None => fixed.clone(),
    };
    let number = if number == "-0" { "0".to_owned() } else { number };
    format!("{number} {unit}")
}

/// Label for a dimension line of `length` document units.
pub fn dimension_label(length: f64, scale: Option<&ScaleSystem>) -> String {
    match scale {
        Some(scale) => format_value(scale.to_real_world(length), scale.unit()),
        None => CALIBRATION_NEEDED.to_owned(),
    }
}

/// Text shown next to a measurement or dimension markup.
pub fn measurement_label(markup: &Markup) -> Option<String> {
    if markup.kind == MarkupKind::Dimension {
        return Some(
            markup
                .text
                .clone()
                .unwrap_or_else(|| CALIBRATION_NEEDED.to_owned()),
        );
    }
    if !markup.kind.is_measurement() {
        return None;
    }
    Some(match &markup.measurement {
        Some(record) => format_value(record.value, &record.unit),
        None => CALIBRATION_NEEDED.to_owned(),
    })
}

/// Label anchor: segment midpoint, path midpoint, or vertex centroid for areas.
pub fn label_position(kind: MarkupKind, points: &[Point]) -> Option<Point> {
    match kind {
        MarkupKind::MeasureArea => vertex_centroid(points),
        MarkupKind::MeasurePolyline => path_midpoint(points),
        _ => match points {
            [start, .., end] => Some(start.midpoint(*end)),
            [only] => Some(*only),
            [] => None,
        },
    }
}

/// Refresh a markup's cached value or dimension label. Returns true on change.
pub fn refresh_markup(markup: &mut Markup, scale: Option<&ScaleSystem>) -> bool {
    let points = markup.geometry.points();
    if markup.kind == MarkupKind::Dimension {
        let label = dimension_label(polyline_length(&points), scale);
        if markup.text.as_deref() == Some(label.as_str()) {
            return false;
        }
        markup.text = Some(label);
        return true;
    }
    if !markup.kind.is_measurement() {
        return false;
    }
    let next = scale.and_then(|scale| measure(markup.kind, &points, scale));
    if next == markup.measurement {
        return false;
    }
    markup.measurement = next;
    true
}

/// Recompute every measurement and dimension. Point geometry is untouched.
pub fn recompute_collection(
    collection: &mut MarkupCollection,
    scale: Option<&ScaleSystem>,
) -> Vec<MarkupId> {
    let ids = collection.ids();
    ids.into_iter()
        .filter(|id| {
            collection
                .get_mut(*id)
                .is_some_and(|markup| refresh_markup(markup, scale))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{MarkupGeometry, MarkupStyle};

    fn measure_line(length: f64) -> Markup {
        Markup::new(
            MarkupKind::MeasureLine,
            0,
            MarkupGeometry::Segment {
                start: Point::new(0.0, 0.0),
                end: Point::new(length, 0.0),
            },
            MarkupStyle::default(),
        )
    }

    #[test]
    fn test_two_point_calibration() {
        let scale = ScaleSystem::two_point(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            "10",
            "m",
        )
        .expect("valid calibration");
        assert!((scale.scale() - 0.1).abs() < 1e-12);

        let record = measure(
            MarkupKind::MeasureLine,
            &[Point::new(0.0, 0.0), Point::new(30.0, 40.0)],
            &scale,
        )
        .expect("distance");
        assert_eq!(format_value(record.value, &record.unit), "5 m");
    }

    #[test]
    fn test_calibration_rejects_bad_input() {
        let (a, b) = (Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_eq!(
            ScaleSystem::two_point(a, b, "ten", "m"),
            Err(CalibrationError::NotANumber("ten".into()))
        );
        assert_eq!(
            ScaleSystem::two_point(a, b, "-3", "m"),
            Err(CalibrationError::NonPositiveLength(-3.0))
        );
        assert_eq!(
            ScaleSystem::two_point(a, b, "0", "m"),
            Err(CalibrationError::NonPositiveLength(0.0))
        );
        assert!(matches!(
            ScaleSystem::two_point(a, b, "inf", "m"),
            Err(CalibrationError::NotANumber(_))
        ));
        assert_eq!(
            ScaleSystem::two_point(a, a, "5", "m"),
            Err(CalibrationError::ZeroLengthReference)
        );
        assert_eq!(
            ScaleSystem::two_point(a, b, "5", " "),
            Err(CalibrationError::EmptyUnit)
        );
    }

    #[test]
    fn test_area_unit_conversion() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        // 1 document unit = 10 mm, so the square is 1000 mm on a side = 1 m²
        let mm = ScaleSystem::new(10.0, "mm").expect("scale");
        let record = measure(MarkupKind::MeasureArea, &square, &mm).expect("area");
        assert_eq!(record.unit, "m²");
        assert!((record.value - 1.0).abs() < 1e-9);

        let ft = ScaleSystem::new(0.5, "ft").expect("scale");
        let record = measure(MarkupKind::MeasureArea, &square, &ft).expect("area");
        assert_eq!(record.unit, "ft²");
        assert!((record.value - 2500.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_value_trims_zeros() {
        assert_eq!(format_value(5.0, "m"), "5 m");
        assert_eq!(format_value(2.5, "ft"), "2.5 ft");
        assert_eq!(format_value(0.126, "in"), "0.13 in");
        assert_eq!(format_value(-0.001, "m"), "0 m");
        assert_eq!(format_value(120.0, "m"), "120 m");
    }

    #[test]
    fn test_scale_rejects_non_positive() {
        assert!(ScaleSystem::new(0.0, "m").is_none());
        assert!(ScaleSystem::new(f64::NAN, "m").is_none());
        assert!(ScaleSystem::from_record(&ScaleRecord {
            scale: 0.25,
            unit: "ft".into()
        })
        .is_some());
    }

    #[test]
    fn test_recompute_updates_values_only() {
        let mut collection = MarkupCollection::new();
        let a = collection.insert(measure_line(50.0));
        let b = collection.insert(measure_line(20.0));
        let s1 = ScaleSystem::new(0.1, "m").expect("scale");
        recompute_collection(&mut collection, Some(&s1));

        let geometry_before = collection.get(a).map(|m| m.geometry.clone());
        let s2 = ScaleSystem::new(2.0, "ft").expect("scale");
        let changed = recompute_collection(&mut collection, Some(&s2));
        assert_eq!(changed.len(), 2);

        let value = |id| collection.get(id).and_then(|m| m.measurement.clone());
        assert_eq!(value(a).map(|r| r.value), Some(100.0));
        assert_eq!(value(b).map(|r| r.unit), Some("ft".to_owned()));
        assert_eq!(collection.get(a).map(|m| m.geometry.clone()), geometry_before);
    }

    #[test]
    fn test_uncalibrated_labels() {
        let markup = measure_line(10.0);
        assert_eq!(measurement_label(&markup).as_deref(), Some(CALIBRATION_NEEDED));

        let mut dimension = Markup::new(
            MarkupKind::Dimension,
            0,
            MarkupGeometry::Segment {
                start: Point::new(0.0, 0.0),
                end: Point::new(0.0, 40.0),
            },
            MarkupStyle::default(),
        );
        assert!(refresh_markup(&mut dimension, None));
        assert_eq!(dimension.text.as_deref(), Some(CALIBRATION_NEEDED));

        let scale = ScaleSystem::new(0.25, "m").expect("scale");
        assert!(refresh_markup(&mut dimension, Some(&scale)));
        assert_eq!(dimension.text.as_deref(), Some("10 m"));
        assert!(!refresh_markup(&mut dimension, Some(&scale)));
    }

    #[test]
    fn test_label_positions() {
        let points = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        assert_eq!(
            label_position(MarkupKind::MeasureLine, &points[..2]),
            Some(Point::new(5.0, 0.0))
        );
        assert_eq!(
            label_position(MarkupKind::MeasurePolyline, &points),
            Some(Point::new(10.0, 0.0))
        );
        let centroid = label_position(MarkupKind::MeasureArea, &points).expect("centroid");
        assert!((centroid.x - 20.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_calibration_units_listed() {
        assert!(CALIBRATION_UNITS.contains(&"mm"));
        assert_eq!(CALIBRATION_UNITS.len(), 6);
    }
}
