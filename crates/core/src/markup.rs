//! Markup data model
//!
//! A [`Markup`] pairs a [`MarkupKind`] with a kind-shaped [`MarkupGeometry`],
//! so bounding boxes, hit tests, rendering and resizing dispatch on the
//! geometry variant instead of on raw point arrays.

use crate::config::TextMetrics;
use crate::error::MarkupError;
use crate::geometry::{
    distance, distance_to_path, point_in_polygon, point_to_segment_distance, Bounds, Point,
};
use sheetmark_model::{
    unix_millis, GroupId, MarkupId, MarkupKind, MarkupRecord, MeasurementRecord, SymbolRecord,
    TextAlign,
};

/// Side length of the square marker drawn for photo-pin markups.
pub const PIN_MARKER_SIZE: f64 = 24.0;

/// Stroke, fill and text style of a markup.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupStyle {
    pub stroke_color: String,
    pub stroke_width: f64,
    pub fill_color: Option<String>,
    pub fill_opacity: Option<f64>,
    pub opacity: Option<f64>,
    pub font_size: Option<f64>,
    pub text_align: TextAlign,
}

impl Default for MarkupStyle {
    fn default() -> Self {
        Self {
            stroke_color: "#E53935".to_owned(),
            stroke_width: 2.0,
            fill_color: None,
            fill_opacity: None,
            opacity: None,
            font_size: None,
            text_align: TextAlign::Left,
        }
    }
}

/// Kind-shaped geometry in document space.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupGeometry {
    /// Two endpoints: line, arrow, dimension, distance measurement.
    Segment { start: Point, end: Point },

    /// Opposite corners of the frame: rectangle, ellipse, triangle.
    Corners { start: Point, end: Point },

    /// Circle given by its center and a point on the rim.
    Radius { center: Point, edge: Point },

    /// Open path: pen, highlighter, multiline, path measurement.
    Polyline { points: Vec<Point> },

    /// Closed path: polygon, cloud, area measurement.
    Polygon { points: Vec<Point> },

    /// Single placement point. Top-left for text, center for symbols and pins.
    Anchor { position: Point },
}

impl MarkupGeometry {
    /// Shape raw points for `kind`. `None` when too few points are supplied.
    pub fn from_points(kind: MarkupKind, mut points: Vec<Point>) -> Option<Self> {
        if points.len() < kind.min_points() {
            return None;
        }
        let two_point = matches!(
            kind,
            MarkupKind::Line
                | MarkupKind::Arrow
                | MarkupKind::Dimension
                | MarkupKind::MeasureLine
                | MarkupKind::Rectangle
                | MarkupKind::Ellipse
                | MarkupKind::Triangle
                | MarkupKind::Circle
        );
        if two_point && points.len() > 2 {
            tracing::warn!(?kind, count = points.len(), "extra points dropped, keeping the endpoints");
        }
        let geometry = match kind {
            MarkupKind::Line | MarkupKind::Arrow | MarkupKind::Dimension | MarkupKind::MeasureLine => {
                MarkupGeometry::Segment {
                    start: points[0],
                    end: points[points.len() - 1],
                }
            }
            MarkupKind::Rectangle | MarkupKind::Ellipse | MarkupKind::Triangle => {
                MarkupGeometry::Corners {
                    start: points[0],
                    end: points[points.len() - 1],
                }
            }
            MarkupKind::Circle => MarkupGeometry::Radius {
                center: points[0],
                edge: points[points.len() - 1],
            },
            MarkupKind::Pen
            | MarkupKind::Highlighter
            | MarkupKind::Multiline
            | MarkupKind::MeasurePolyline => MarkupGeometry::Polyline { points },
            MarkupKind::Polygon | MarkupKind::Cloud | MarkupKind::MeasureArea => {
                MarkupGeometry::Polygon { points }
            }
            MarkupKind::Text | MarkupKind::Issue | MarkupKind::Symbol | MarkupKind::PhotoPin => {
                points.truncate(1);
                MarkupGeometry::Anchor { position: points[0] }
            }
        };
        Some(geometry)
    }

    pub fn points(&self) -> Vec<Point> {
        match self {
            MarkupGeometry::Segment { start, end } | MarkupGeometry::Corners { start, end } => {
                vec![*start, *end]
            }
            MarkupGeometry::Radius { center, edge } => vec![*center, *edge],
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points } => {
                points.clone()
            }
            MarkupGeometry::Anchor { position } => vec![*position],
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points } => {
                points.len()
            }
            MarkupGeometry::Anchor { .. } => 1,
            _ => 2,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, MarkupGeometry::Polygon { .. })
    }

    /// Whether the stored rotation angle is applied at render and hit-test time.
    ///
    /// Point-based geometry has rotation baked into its points instead.
    pub fn rotates_as_frame(&self) -> bool {
        matches!(
            self,
            MarkupGeometry::Corners { .. } | MarkupGeometry::Radius { .. } | MarkupGeometry::Anchor { .. }
        )
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            MarkupGeometry::Segment { start, end } | MarkupGeometry::Corners { start, end } => {
                *start = start.offset(dx, dy);
                *end = end.offset(dx, dy);
            }
            MarkupGeometry::Radius { center, edge } => {
                *center = center.offset(dx, dy);
                *edge = edge.offset(dx, dy);
            }
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points } => {
                for point in points.iter_mut() {
                    *point = point.offset(dx, dy);
                }
            }
            MarkupGeometry::Anchor { position } => *position = position.offset(dx, dy),
        }
    }

    fn map_points(&mut self, f: impl Fn(Point) -> Point) {
        match self {
            MarkupGeometry::Segment { start, end } | MarkupGeometry::Corners { start, end } => {
                *start = f(*start);
                *end = f(*end);
            }
            MarkupGeometry::Radius { center, edge } => {
                *center = f(*center);
                *edge = f(*edge);
            }
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points } => {
                for point in points.iter_mut() {
                    *point = f(*point);
                }
            }
            MarkupGeometry::Anchor { position } => *position = f(*position),
        }
    }

    /// Move one vertex. Returns false when the index is out of range.
    pub fn set_vertex(&mut self, index: usize, to: Point) -> bool {
        match self {
            MarkupGeometry::Segment { start, end } | MarkupGeometry::Corners { start, end } => {
                match index {
                    0 => *start = to,
                    1 => *end = to,
                    _ => return false,
                }
            }
            MarkupGeometry::Radius { center, edge } => match index {
                0 => *center = to,
                1 => *edge = to,
                _ => return false,
            },
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points } => {
                match points.get_mut(index) {
                    Some(point) => *point = to,
                    None => return false,
                }
            }
            MarkupGeometry::Anchor { position } => {
                if index != 0 {
                    return false;
                }
                *position = to;
            }
        }
        true
    }

    /// Insert a vertex before `index`. Only path geometry grows.
    pub fn insert_vertex(&mut self, index: usize, at: Point) -> bool {
        match self {
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points }
                if index <= points.len() =>
            {
                points.insert(index, at);
                true
            }
            _ => false,
        }
    }

    /// Remove a vertex, refusing to go below `min_points`.
    pub fn remove_vertex(&mut self, index: usize, min_points: usize) -> bool {
        match self {
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points }
                if index < points.len() && points.len() > min_points =>
            {
                points.remove(index);
                true
            }
            _ => false,
        }
    }
}

/// Vertices of the triangle inscribed in a corner frame: apex top-center.
pub fn triangle_vertices(frame: &Bounds) -> [Point; 3] {
    [
        Point::new(frame.center().x, frame.min_y),
        Point::new(frame.max_x, frame.max_y),
        Point::new(frame.min_x, frame.max_y),
    ]
}

/// Property edits from the host's property panel. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupPatch {
    pub stroke_color: Option<String>,
    pub stroke_width: Option<f64>,
    /// `Some(None)` clears the fill.
    pub fill_color: Option<Option<String>>,
    pub fill_opacity: Option<f64>,
    pub opacity: Option<f64>,
    pub text: Option<String>,
    pub font_size: Option<f64>,
    pub text_align: Option<TextAlign>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Markup {
    pub id: MarkupId,
    pub kind: MarkupKind,
    pub page: u32,
    pub geometry: MarkupGeometry,
    pub style: MarkupStyle,
    pub text: Option<String>,
    pub symbol: Option<SymbolRecord>,
    pub measurement: Option<MeasurementRecord>,
    pub group_id: Option<GroupId>,
    pub locked: bool,
    pub z_index: i64,
    /// Degrees in [0, 360).
    pub rotation: f64,
    pub created_at: i64,
}

impl Markup {
    pub fn new(kind: MarkupKind, page: u32, geometry: MarkupGeometry, style: MarkupStyle) -> Self {
        Self {
            id: MarkupId::new_v4(),
            kind,
            page,
            geometry,
            style,
            text: None,
            symbol: None,
            measurement: None,
            group_id: None,
            locked: false,
            z_index: 0,
            rotation: 0.0,
            created_at: unix_millis(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_symbol(mut self, symbol: SymbolRecord) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn from_record(record: &MarkupRecord) -> Result<Self, MarkupError> {
        if record.points.is_empty() {
            return Err(MarkupError::EmptyGeometry { id: record.id });
        }
        let points: Vec<Point> = record.points.iter().copied().map(Point::from_array).collect();
        if points.iter().any(|p| !p.is_finite()) {
            return Err(MarkupError::NonFiniteCoordinate { id: record.id });
        }
        let actual = points.len();
        let geometry = MarkupGeometry::from_points(record.kind, points).ok_or(
            MarkupError::TooFewPoints {
                id: record.id,
                kind: record.kind,
                expected: record.kind.min_points(),
                actual,
            },
        )?;
        if record.kind == MarkupKind::Symbol && record.symbol.is_none() {
            return Err(MarkupError::MissingSymbol { id: record.id });
        }

        Ok(Self {
            id: record.id,
            kind: record.kind,
            page: record.page,
            geometry,
            style: MarkupStyle {
                stroke_color: record.color.clone(),
                stroke_width: record.stroke_width,
                fill_color: record.fill_color.clone(),
                fill_opacity: record.fill_opacity,
                opacity: record.opacity,
                font_size: record.font_size,
                text_align: record.text_align.unwrap_or_default(),
            },
            text: record.text.clone(),
            symbol: record.symbol.clone(),
            measurement: record.measurement.clone(),
            group_id: record.group_id,
            locked: record.locked,
            z_index: record.z_index.unwrap_or_default(),
            rotation: record.rotation.unwrap_or_default().rem_euclid(360.0),
            created_at: record.created_at,
        })
    }

    pub fn to_record(&self) -> MarkupRecord {
        MarkupRecord {
            id: self.id,
            kind: self.kind,
            color: self.style.stroke_color.clone(),
            stroke_width: self.style.stroke_width,
            points: self.geometry.points().into_iter().map(Point::to_array).collect(),
            page: self.page,
            text: self.text.clone(),
            rotation: (self.rotation != 0.0).then_some(self.rotation),
            group_id: self.group_id,
            opacity: self.style.opacity,
            fill_color: self.style.fill_color.clone(),
            fill_opacity: self.style.fill_opacity,
            font_size: self.style.font_size,
            text_align: self
                .kind
                .is_text()
                .then_some(self.style.text_align),
            symbol: self.symbol.clone(),
            measurement: self.measurement.clone(),
            locked: self.locked,
            z_index: Some(self.z_index),
            created_at: self.created_at,
        }
    }

    pub fn font_size(&self, metrics: &TextMetrics) -> f64 {
        self.style.font_size.unwrap_or(metrics.default_font_size)
    }

    /// Whether the stored angle still has to be applied about the frame center.
    pub fn has_frame_rotation(&self) -> bool {
        self.geometry.rotates_as_frame() && self.rotation != 0.0
    }

    /// Bounds before the stored rotation is applied, without stroke padding.
    pub fn local_bounds(&self, metrics: &TextMetrics) -> Bounds {
        match &self.geometry {
            MarkupGeometry::Segment { start, end } | MarkupGeometry::Corners { start, end } => {
                Bounds::from_corners(*start, *end)
            }
            MarkupGeometry::Radius { center, edge } => {
                let r = distance(*center, *edge);
                Bounds::new(center.x - r, center.y - r, center.x + r, center.y + r)
            }
            MarkupGeometry::Polyline { points } | MarkupGeometry::Polygon { points } => {
                Bounds::from_points(points.iter())
                    .unwrap_or_else(|| Bounds::new(0.0, 0.0, 0.0, 0.0))
            }
            MarkupGeometry::Anchor { position } => match self.kind {
                MarkupKind::Symbol => {
                    let half = self.symbol.as_ref().map(|s| s.size).unwrap_or(PIN_MARKER_SIZE) / 2.0;
                    Bounds::new(
                        position.x - half,
                        position.y - half,
                        position.x + half,
                        position.y + half,
                    )
                }
                MarkupKind::PhotoPin => {
                    let half = PIN_MARKER_SIZE / 2.0;
                    Bounds::new(
                        position.x - half,
                        position.y - half,
                        position.x + half,
                        position.y + half,
                    )
                }
                _ => {
                    let text = self.text.as_deref().unwrap_or_default();
                    let (width, height) = metrics.block_size(text, self.font_size(metrics));
                    Bounds::new(position.x, position.y, position.x + width, position.y + height)
                }
            },
        }
    }

    /// Axis-aligned bounds of the markup as drawn.
    pub fn bounds(&self, metrics: &TextMetrics) -> Bounds {
        let local = self.local_bounds(metrics);
        if self.has_frame_rotation() {
            local.rotated(self.rotation)
        } else {
            local
        }
    }

    /// Bounds padded by half the stroke width, used for click tolerance.
    pub fn hit_bounds(&self, metrics: &TextMetrics) -> Bounds {
        self.bounds(metrics).expand(self.style.stroke_width / 2.0)
    }

    /// Shape-specific hit test with `tolerance` in document units.
    pub fn hit_test(&self, point: Point, tolerance: f64, metrics: &TextMetrics) -> bool {
        let pad = self.style.stroke_width / 2.0 + tolerance;
        let p = if self.has_frame_rotation() {
            point.rotate_about(self.local_bounds(metrics).center(), -self.rotation)
        } else {
            point
        };

        match &self.geometry {
            MarkupGeometry::Segment { start, end } => point_to_segment_distance(p, *start, *end) <= pad,
            MarkupGeometry::Corners { start, end } => {
                let frame = Bounds::from_corners(*start, *end);
                match self.kind {
                    MarkupKind::Ellipse => {
                        let center = frame.center();
                        let rx = frame.width() / 2.0 + pad;
                        let ry = frame.height() / 2.0 + pad;
                        let nx = (p.x - center.x) / rx;
                        let ny = (p.y - center.y) / ry;
                        nx * nx + ny * ny <= 1.0
                    }
                    MarkupKind::Triangle => {
                        let tri = triangle_vertices(&frame);
                        point_in_polygon(p, &tri) || distance_to_path(p, &tri, true) <= pad
                    }
                    _ => frame.expand(pad).contains_point(p),
                }
            }
            MarkupGeometry::Radius { center, edge } => {
                distance(*center, p) <= distance(*center, *edge) + pad
            }
            MarkupGeometry::Polyline { points } => distance_to_path(p, points, false) <= pad,
            MarkupGeometry::Polygon { points } => {
                point_in_polygon(p, points) || distance_to_path(p, points, true) <= pad
            }
            MarkupGeometry::Anchor { .. } => self
                .local_bounds(metrics)
                .expand(tolerance)
                .contains_point(p),
        }
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.geometry.translate(dx, dy);
    }

    /// Rotate about an external pivot and accumulate the angle.
    pub fn rotate_about(&mut self, pivot: Point, degrees: f64, metrics: &TextMetrics) {
        if self.geometry.rotates_as_frame() {
            let center = self.local_bounds(metrics).center();
            let moved = center.rotate_about(pivot, degrees);
            self.geometry.translate(moved.x - center.x, moved.y - center.y);
        } else {
            self.geometry.map_points(|p| p.rotate_about(pivot, degrees));
        }
        self.rotation = (self.rotation + degrees).rem_euclid(360.0);
    }

    /// Apply a property patch. Returns true when anything changed.
    pub fn apply_patch(&mut self, patch: &MarkupPatch) -> bool {
        let before = self.clone();
        if let Some(color) = &patch.stroke_color {
            self.style.stroke_color = color.clone();
        }
        if let Some(width) = patch.stroke_width.filter(|w| *w > 0.0) {
            self.style.stroke_width = width;
        }
        if let Some(fill) = &patch.fill_color {
            self.style.fill_color = fill.clone();
        }
        if let Some(fill_opacity) = patch.fill_opacity {
            self.style.fill_opacity = Some(fill_opacity.clamp(0.0, 1.0));
        }
        if let Some(opacity) = patch.opacity {
            self.style.opacity = Some(opacity.clamp(0.0, 1.0));
        }
        if self.kind.is_text() {
            if let Some(text) = &patch.text {
                self.text = Some(text.clone());
            }
            if let Some(size) = patch.font_size.filter(|s| *s > 0.0) {
                self.style.font_size = Some(size);
            }
            if let Some(align) = patch.text_align {
                self.style.text_align = align;
            }
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64, stroke: f64) -> Markup {
        Markup::new(
            MarkupKind::Rectangle,
            0,
            MarkupGeometry::Corners {
                start: Point::new(x0, y0),
                end: Point::new(x1, y1),
            },
            MarkupStyle {
                stroke_width: stroke,
                ..MarkupStyle::default()
            },
        )
    }

    #[test]
    fn test_geometry_from_points_by_kind() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(9.0, 1.0)];
        assert!(matches!(
            MarkupGeometry::from_points(MarkupKind::Line, pts.clone()),
            Some(MarkupGeometry::Segment { .. })
        ));
        assert!(matches!(
            MarkupGeometry::from_points(MarkupKind::Cloud, pts.clone()),
            Some(MarkupGeometry::Polygon { .. })
        ));
        assert!(matches!(
            MarkupGeometry::from_points(MarkupKind::Text, pts.clone()),
            Some(MarkupGeometry::Anchor { .. })
        ));
        assert!(MarkupGeometry::from_points(MarkupKind::Polygon, pts[..2].to_vec()).is_none());
    }

    #[test]
    fn test_two_point_kinds_keep_endpoints_of_longer_input() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(9.0, 1.0)];
        assert_eq!(
            MarkupGeometry::from_points(MarkupKind::Rectangle, pts.clone()),
            Some(MarkupGeometry::Corners {
                start: Point::new(0.0, 0.0),
                end: Point::new(9.0, 1.0),
            })
        );
        assert_eq!(
            MarkupGeometry::from_points(MarkupKind::Arrow, pts),
            Some(MarkupGeometry::Segment {
                start: Point::new(0.0, 0.0),
                end: Point::new(9.0, 1.0),
            })
        );
    }

    #[test]
    fn test_rectangle_hit_uses_stroke_padding() {
        let markup = rect(10.0, 10.0, 50.0, 50.0, 2.0);
        let metrics = TextMetrics::default();
        assert!(markup.hit_test(Point::new(9.0, 30.0), 3.0, &metrics));
        assert!(!markup.hit_test(Point::new(5.0, 30.0), 3.0, &metrics));
        assert!(markup.hit_test(Point::new(30.0, 30.0), 3.0, &metrics));
    }

    #[test]
    fn test_circle_hit_by_radius() {
        let circle = Markup::new(
            MarkupKind::Circle,
            0,
            MarkupGeometry::Radius {
                center: Point::new(0.0, 0.0),
                edge: Point::new(10.0, 0.0),
            },
            MarkupStyle::default(),
        );
        let metrics = TextMetrics::default();
        assert!(circle.hit_test(Point::new(0.0, 12.0), 1.5, &metrics));
        assert!(!circle.hit_test(Point::new(9.0, 9.0), 0.5, &metrics));
    }

    #[test]
    fn test_open_path_hit_is_near_path_only() {
        let pen = Markup::new(
            MarkupKind::Pen,
            0,
            MarkupGeometry::Polyline {
                points: vec![Point::new(0.0, 0.0), Point::new(20.0, 0.0), Point::new(20.0, 20.0)],
            },
            MarkupStyle::default(),
        );
        let metrics = TextMetrics::default();
        assert!(pen.hit_test(Point::new(10.0, 1.5), 1.0, &metrics));
        // Inside the hull but far from the stroke
        assert!(!pen.hit_test(Point::new(10.0, 10.0), 1.0, &metrics));
    }

    #[test]
    fn test_closed_path_hit_includes_interior() {
        let area = Markup::new(
            MarkupKind::MeasureArea,
            0,
            MarkupGeometry::Polygon {
                points: vec![Point::new(0.0, 0.0), Point::new(20.0, 0.0), Point::new(20.0, 20.0)],
            },
            MarkupStyle::default(),
        );
        assert!(area.hit_test(Point::new(15.0, 5.0), 1.0, &TextMetrics::default()));
    }

    #[test]
    fn test_text_bounds_from_glyph_estimate() {
        let text = Markup::new(
            MarkupKind::Text,
            0,
            MarkupGeometry::Anchor {
                position: Point::new(100.0, 100.0),
            },
            MarkupStyle {
                font_size: Some(10.0),
                ..MarkupStyle::default()
            },
        )
        .with_text("hello\nhi");
        let bounds = text.local_bounds(&TextMetrics::default());
        assert!((bounds.width() - 30.0).abs() < 1e-9);
        assert!((bounds.height() - 24.0).abs() < 1e-9);
        assert_eq!(bounds.top_left(), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_symbol_bounds_centered_square() {
        let symbol = Markup::new(
            MarkupKind::Symbol,
            0,
            MarkupGeometry::Anchor {
                position: Point::new(50.0, 50.0),
            },
            MarkupStyle::default(),
        )
        .with_symbol(SymbolRecord {
            id: "valve".into(),
            path_data: "M0 0 L10 10".into(),
            view_box: [0.0, 0.0, 10.0, 10.0],
            size: 40.0,
        });
        assert_eq!(
            symbol.local_bounds(&TextMetrics::default()),
            Bounds::new(30.0, 30.0, 70.0, 70.0)
        );
    }

    #[test]
    fn test_rotating_frame_shape_moves_center_and_accumulates_angle() {
        let mut markup = rect(0.0, 0.0, 10.0, 10.0, 1.0);
        let metrics = TextMetrics::default();
        markup.rotate_about(Point::new(20.0, 5.0), 180.0, &metrics);
        let center = markup.local_bounds(&metrics).center();
        assert!((center.x - 35.0).abs() < 1e-9);
        assert!((center.y - 5.0).abs() < 1e-9);
        assert_eq!(markup.rotation, 180.0);

        markup.rotate_about(center, 270.0, &metrics);
        assert_eq!(markup.rotation, 90.0);
    }

    #[test]
    fn test_rotating_path_rotates_points() {
        let mut line = Markup::new(
            MarkupKind::Line,
            0,
            MarkupGeometry::Segment {
                start: Point::new(0.0, 0.0),
                end: Point::new(10.0, 0.0),
            },
            MarkupStyle::default(),
        );
        line.rotate_about(Point::new(0.0, 0.0), 90.0, &TextMetrics::default());
        let points = line.geometry.points();
        assert!((points[1].x).abs() < 1e-9);
        assert!((points[1].y - 10.0).abs() < 1e-9);
        assert!(!line.has_frame_rotation());
    }

    #[test]
    fn test_record_round_trip_keeps_fields() {
        let mut markup = rect(1.0, 2.0, 3.0, 4.0, 2.0);
        markup.group_id = Some(GroupId::new_v4());
        markup.rotation = 45.0;
        markup.z_index = 7;
        let back = Markup::from_record(&markup.to_record()).expect("valid record");
        assert_eq!(back, markup);
    }

    #[test]
    fn test_record_validation() {
        let mut record = rect(0.0, 0.0, 1.0, 1.0, 1.0).to_record();
        record.points.clear();
        assert!(matches!(
            Markup::from_record(&record),
            Err(MarkupError::EmptyGeometry { .. })
        ));

        record.kind = MarkupKind::Polygon;
        record.points = vec![[0.0, 0.0], [1.0, 1.0]];
        assert!(matches!(
            Markup::from_record(&record),
            Err(MarkupError::TooFewPoints { expected: 3, .. })
        ));

        record.kind = MarkupKind::Symbol;
        record.points = vec![[0.0, 0.0]];
        assert!(matches!(
            Markup::from_record(&record),
            Err(MarkupError::MissingSymbol { .. })
        ));

        record.kind = MarkupKind::Line;
        record.points = vec![[0.0, f64::NAN], [1.0, 1.0]];
        assert!(matches!(
            Markup::from_record(&record),
            Err(MarkupError::NonFiniteCoordinate { .. })
        ));
    }

    #[test]
    fn test_vertex_removal_respects_minimum() {
        let mut geometry = MarkupGeometry::Polygon {
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)],
        };
        assert!(!geometry.remove_vertex(0, 3));
        assert!(geometry.insert_vertex(1, Point::new(0.5, -1.0)));
        assert!(geometry.remove_vertex(0, 3));
        assert_eq!(geometry.vertex_count(), 3);
    }

    #[test]
    fn test_patch_ignores_text_fields_on_shapes() {
        let mut markup = rect(0.0, 0.0, 10.0, 10.0, 2.0);
        let changed = markup.apply_patch(&MarkupPatch {
            text: Some("ignored".into()),
            stroke_color: Some("#000000".into()),
            ..MarkupPatch::default()
        });
        assert!(changed);
        assert!(markup.text.is_none());
        assert_eq!(markup.style.stroke_color, "#000000");
        assert!(!markup.apply_patch(&MarkupPatch::default()));
    }
}
