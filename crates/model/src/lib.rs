//! Sheetmark Data Model
//!
//! Persistence records shared by the editor engine and its repositories:
//! markups, scale calibration and photo pins, plus the repository contract
//! the editor saves through.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub type MarkupId = Uuid;
pub type GroupId = Uuid;
pub type PinId = Uuid;
pub type PhotoId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SheetId(pub Uuid);

impl VersionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl SheetId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for VersionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for SheetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The closed set of markup tool types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupKind {
    Pen,
    Line,
    Multiline,
    Arrow,
    Rectangle,
    Circle,
    Ellipse,
    Triangle,
    Polygon,
    Cloud,
    Highlighter,
    Text,
    Issue,
    Dimension,
    PhotoPin,
    Symbol,
    MeasureLine,
    MeasurePolyline,
    MeasureArea,
}

impl MarkupKind {
    pub const ALL: [MarkupKind; 19] = [
        MarkupKind::Pen,
        MarkupKind::Line,
        MarkupKind::Multiline,
        MarkupKind::Arrow,
        MarkupKind::Rectangle,
        MarkupKind::Circle,
        MarkupKind::Ellipse,
        MarkupKind::Triangle,
        MarkupKind::Polygon,
        MarkupKind::Cloud,
        MarkupKind::Highlighter,
        MarkupKind::Text,
        MarkupKind::Issue,
        MarkupKind::Dimension,
        MarkupKind::PhotoPin,
        MarkupKind::Symbol,
        MarkupKind::MeasureLine,
        MarkupKind::MeasurePolyline,
        MarkupKind::MeasureArea,
    ];

    /// Calibrated measurement kinds carry a computed real-world value.
    pub fn is_measurement(self) -> bool {
        matches!(self, Self::MeasureLine | Self::MeasurePolyline | Self::MeasureArea)
    }

    pub fn is_closed(self) -> bool {
        matches!(self, Self::Polygon | Self::Cloud | Self::MeasureArea)
    }

    pub fn is_text(self) -> bool {
        matches!(self, Self::Text | Self::Issue)
    }

    /// Kinds whose points can be edited one by one.
    pub fn supports_vertex_edit(self) -> bool {
        matches!(
            self,
            Self::Pen
                | Self::Multiline
                | Self::Polygon
                | Self::Cloud
                | Self::MeasureLine
                | Self::MeasurePolyline
                | Self::MeasureArea
        )
    }

    /// Minimum point count that keeps the kind meaningful.
    pub fn min_points(self) -> usize {
        match self {
            Self::Text | Self::Issue | Self::PhotoPin | Self::Symbol => 1,
            kind if kind.is_closed() => 3,
            _ => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pen => "Pen",
            Self::Line => "Line",
            Self::Multiline => "Multiline",
            Self::Arrow => "Arrow",
            Self::Rectangle => "Rectangle",
            Self::Circle => "Circle",
            Self::Ellipse => "Ellipse",
            Self::Triangle => "Triangle",
            Self::Polygon => "Polygon",
            Self::Cloud => "Cloud",
            Self::Highlighter => "Highlighter",
            Self::Text => "Text",
            Self::Issue => "Issue",
            Self::Dimension => "Dimension",
            Self::PhotoPin => "Photo Pin",
            Self::Symbol => "Symbol",
            Self::MeasureLine => "Distance",
            Self::MeasurePolyline => "Path Length",
            Self::MeasureArea => "Area",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// A symbol chosen from the external palette.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: String,
    pub path_data: String,
    /// `[min_x, min_y, width, height]` of the symbol's native frame.
    pub view_box: [f64; 4],
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub value: f64,
    pub unit: String,
}

/// A markup as exchanged with the persistence backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupRecord {
    pub id: MarkupId,
    pub kind: MarkupKind,
    pub color: String,
    pub stroke_width: f64,
    pub points: Vec<[f64; 2]>,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<TextAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<SymbolRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<MeasurementRecord>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
}

/// Calibration scale: real-world units per document-space unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleRecord {
    pub scale: f64,
    pub unit: String,
}

/// A photo pin in normalized page coordinates (0..=1 on both axes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoPinRecord {
    pub id: PinId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub photo_id: Option<PhotoId>,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("markup {0} not found")]
    MarkupNotFound(MarkupId),
    #[error("photo pin {0} not found")]
    PinNotFound(PinId),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Persistence contract for markups, calibration scales and photo pins.
///
/// Calls are independent: no transactionality across a batch is assumed.
pub trait MarkupRepository {
    /// Markups of a document version, ordered by creation time ascending.
    fn load_markups(&self, version: VersionId) -> Result<Vec<MarkupRecord>, RepositoryError>;

    fn create_markup(
        &mut self,
        version: VersionId,
        record: &MarkupRecord,
    ) -> Result<(), RepositoryError>;

    fn update_markup(
        &mut self,
        version: VersionId,
        record: &MarkupRecord,
    ) -> Result<(), RepositoryError>;

    fn delete_markup(&mut self, version: VersionId, id: MarkupId) -> Result<(), RepositoryError>;

    fn load_scale(&self, version: VersionId) -> Result<Option<ScaleRecord>, RepositoryError>;

    fn save_scale(&mut self, version: VersionId, scale: &ScaleRecord)
        -> Result<(), RepositoryError>;

    fn load_photo_pins(&self, sheet: SheetId) -> Result<Vec<PhotoPinRecord>, RepositoryError>;

    fn update_photo_pin_position(
        &mut self,
        sheet: SheetId,
        id: PinId,
        x: f64,
        y: f64,
    ) -> Result<(), RepositoryError>;
}

/// Milliseconds since the Unix epoch, used for `created_at` ordering.
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> MarkupRecord {
        MarkupRecord {
            id: Uuid::nil(),
            kind: MarkupKind::MeasureArea,
            color: "#E53935".to_owned(),
            stroke_width: 2.0,
            points: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]],
            page: 1,
            text: None,
            rotation: None,
            group_id: None,
            opacity: None,
            fill_color: None,
            fill_opacity: None,
            font_size: None,
            text_align: None,
            symbol: None,
            measurement: Some(MeasurementRecord { value: 50.0, unit: "m²".to_owned() }),
            locked: false,
            z_index: None,
            created_at: 0,
        }
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&MarkupKind::MeasurePolyline).expect("serialize kind");
        assert_eq!(json, "\"measure_polyline\"");

        let back: MarkupKind = serde_json::from_str("\"photo_pin\"").expect("deserialize kind");
        assert_eq!(back, MarkupKind::PhotoPin);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(serde_json::from_str::<MarkupKind>("\"hexagon\"").is_err());
    }

    #[test]
    fn record_omits_absent_optional_fields() {
        let json = serde_json::to_string(&sample_record()).expect("serialize record");
        assert!(json.contains("\"measurement\""));
        assert!(!json.contains("\"rotation\""));
        assert!(!json.contains("\"symbol\""));
    }

    #[test]
    fn record_accepts_minimal_payload() {
        let json = r##"{
            "id": "00000000-0000-0000-0000-000000000000",
            "kind": "line",
            "color": "#000000",
            "stroke_width": 1.5,
            "points": [[0, 0], [5, 5]],
            "page": 0
        }"##;
        let record: MarkupRecord = serde_json::from_str(json).expect("minimal record");
        assert_eq!(record.kind, MarkupKind::Line);
        assert!(!record.locked);
        assert_eq!(record.created_at, 0);
        assert!(record.group_id.is_none());
    }

    #[test]
    fn min_points_follow_kind_shape() {
        assert_eq!(MarkupKind::Text.min_points(), 1);
        assert_eq!(MarkupKind::Multiline.min_points(), 2);
        assert_eq!(MarkupKind::Cloud.min_points(), 3);
        assert_eq!(MarkupKind::MeasureArea.min_points(), 3);
    }

    #[test]
    fn vertex_edit_is_limited_to_path_kinds() {
        assert!(MarkupKind::Pen.supports_vertex_edit());
        assert!(MarkupKind::MeasurePolyline.supports_vertex_edit());
        assert!(!MarkupKind::Rectangle.supports_vertex_edit());
        assert!(!MarkupKind::Highlighter.supports_vertex_edit());
    }

    #[test]
    fn every_kind_has_a_label() {
        for kind in MarkupKind::ALL {
            assert!(!kind.label().is_empty());
        }
    }
}
