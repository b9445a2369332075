use sheetmark_model::{MarkupId, MarkupKind};

/// Errors raised while converting or validating markups.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarkupError {
    #[error("markup {id} has no points")]
    EmptyGeometry { id: MarkupId },

    #[error("{kind:?} markup {id} needs at least {expected} points, got {actual}")]
    TooFewPoints {
        id: MarkupId,
        kind: MarkupKind,
        expected: usize,
        actual: usize,
    },

    #[error("markup {id} has a non-finite coordinate")]
    NonFiniteCoordinate { id: MarkupId },

    #[error("symbol markup {id} carries no symbol reference")]
    MissingSymbol { id: MarkupId },
}

/// Errors raised by the calibration dialog step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalibrationError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("real length must be positive, got {0}")]
    NonPositiveLength(f64),

    #[error("reference line has zero length")]
    ZeroLengthReference,

    #[error("unit must not be empty")]
    EmptyUnit,

    #[error("no calibration is awaiting input")]
    NotPending,
}
