//! Sheetmark Core Library
//!
//! Headless markup editing engine for construction drawing sheets: markup
//! geometry and hit testing, selection and manipulation, undo history,
//! calibrated measurements, photo pins, and an optimistic sync outbox.
//! [`Editor`] ties it together behind a single-threaded controller.

pub mod collection;
pub mod config;
pub mod csv_export;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod manipulation;
pub mod markup;
pub mod measurement;
pub mod pins;
mod pointer;
pub mod render;
pub mod selection;
pub mod sync;
pub mod transform;
pub mod viewport;

pub use collection::{CollectionDiff, MarkupCollection};
pub use config::{ConfigError, EditorConfig, TextMetrics};
pub use csv_export::{
    export_markups_csv, export_measurements_csv, CsvExportConfig, CsvExportError,
    CsvExportResult,
};
pub use editor::{Editor, EditorEvent, LoadState};
pub use error::{CalibrationError, MarkupError};
pub use geometry::{Bounds, Point};
pub use history::History;
pub use input::{Button, Gesture, Key, Modifiers, PointerEvent, Protocol, Tool, ToolState};
pub use manipulation::{HandleType, ManipulationHandle};
pub use markup::{Markup, MarkupGeometry, MarkupPatch, MarkupStyle};
pub use measurement::{CalibrationState, MeasurementType, ScaleSystem};
pub use pins::{PhotoPin, PinBoard};
pub use render::{Layer, Primitive, Scene, SceneItem};
pub use selection::Selection;
pub use sync::{FlushReport, PendingOp, PersistOp, SyncQueue};
pub use transform::Alignment;
pub use viewport::Viewport;

pub use sheetmark_model::{
    GroupId, MarkupId, MarkupKind, MarkupRecord, MarkupRepository, PhotoId, PhotoPinRecord,
    PinId, RepositoryError, ScaleRecord, SheetId, SymbolRecord, VersionId,
};
