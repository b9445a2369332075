//! Input model: tools, modifier keys, pointer buttons, and the gesture state machine.
//!
//! `Tool` and `Modifiers` capture the user's intent at the time of a pointer
//! event. `Gesture` is the interaction in progress between events, carrying
//! the context needed to preview it and to commit it on release.

use crate::geometry::Point;
use crate::manipulation::HandleType;
use crate::markup::Markup;
use sheetmark_model::{MarkupId, MarkupKind, PinId};

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer / selection tool (default).
    #[default]
    Select,
    /// Drag to pan the view.
    Pan,
    /// Two clicks define a reference line for the scale.
    Calibrate,
    /// Create markups of one kind.
    Draw(MarkupKind),
}

/// How a drawing tool turns pointer events into a markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Press, drag, release: start and end point.
    Drag,
    /// Every move event appends a point.
    Freehand,
    /// Each click appends a point until the path is finished.
    MultiPoint { closed: bool },
    /// Release fixes an anchor, then a text dialog supplies the content.
    TextEntry,
    /// Two separate clicks.
    ClickClick,
    /// One click places the markup.
    SingleClick,
}

impl Tool {
    pub fn protocol(self) -> Option<Protocol> {
        match self {
            Tool::Select | Tool::Pan => None,
            Tool::Calibrate => Some(Protocol::ClickClick),
            Tool::Draw(kind) => Some(match kind {
                MarkupKind::Line
                | MarkupKind::Arrow
                | MarkupKind::Rectangle
                | MarkupKind::Circle
                | MarkupKind::Ellipse
                | MarkupKind::Triangle
                | MarkupKind::Dimension => Protocol::Drag,
                MarkupKind::Pen | MarkupKind::Highlighter => Protocol::Freehand,
                MarkupKind::Multiline | MarkupKind::MeasurePolyline => {
                    Protocol::MultiPoint { closed: false }
                }
                MarkupKind::Polygon | MarkupKind::Cloud | MarkupKind::MeasureArea => {
                    Protocol::MultiPoint { closed: true }
                }
                MarkupKind::Text | MarkupKind::Issue => Protocol::TextEntry,
                MarkupKind::MeasureLine => Protocol::ClickClick,
                MarkupKind::Symbol | MarkupKind::PhotoPin => Protocol::SingleClick,
            }),
        }
    }

    /// The markup kind this tool creates, if any.
    pub fn kind(self) -> Option<MarkupKind> {
        match self {
            Tool::Draw(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Keyboard modifier keys held during an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    /// Ctrl on Linux/Windows, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Button {
    /// Left mouse button (or single-finger touch).
    #[default]
    Primary,
    /// Middle mouse button.
    Middle,
    /// Right mouse button.
    Secondary,
}

/// Keys the editor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Delete,
    Backspace,
    Enter,
    Char(char),
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub position: Point,
    pub button: Button,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            button: Button::Primary,
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_button(mut self, button: Button) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// The coarse tool state exposed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolState {
    Idle,
    Placing,
    Drawing,
    MultiPointCollecting,
    Panning,
    TextPending,
    ScaleInputPending,
    Selecting,
}

/// The interaction in progress.
///
/// Points are in document space unless named `*_screen`.
#[derive(Debug, Clone, Default)]
pub enum Gesture {
    /// No gesture in progress.
    #[default]
    Idle,
    /// First point of a two-click tool is fixed.
    Placing {
        tool: Tool,
        first: Point,
        hover: Option<Point>,
    },
    /// A drag shape is being sized.
    Drawing {
        kind: MarkupKind,
        start: Point,
        current: Point,
    },
    /// A freehand stroke is being captured.
    Freehand { kind: MarkupKind, points: Vec<Point> },
    /// Clicks are accumulating points.
    Collecting {
        kind: MarkupKind,
        points: Vec<Point>,
        hover: Option<Point>,
    },
    /// The view is being panned; a suspended gesture resumes on release.
    Panning {
        last_screen: Point,
        suspended: Option<Box<Gesture>>,
    },
    /// The anchor is fixed and a text dialog is open.
    TextPending { kind: MarkupKind, anchor: Point },
    /// The reference line is fixed and the scale dialog is open.
    ScaleInputPending { start: Point, end: Point },
    /// Selected markups follow the pointer.
    Moving { last: Point, moved: bool },
    /// A resize handle is being dragged.
    Resizing {
        id: MarkupId,
        handle: HandleType,
        original: Box<Markup>,
    },
    /// A vertex is being dragged.
    DraggingVertex { id: MarkupId, index: usize, moved: bool },
    /// A selection box is open.
    BoxSelecting {
        start: Point,
        current: Point,
        additive: bool,
    },
    /// A photo pin is being dragged. Positions are normalized.
    DraggingPin {
        id: PinId,
        origin: (f64, f64),
        moved: bool,
    },
    /// Two touch points zoom and pan together.
    /// The interrupted gesture resumes when the pinch ends.
    Pinch {
        last_distance: f64,
        last_center_screen: Point,
        suspended: Option<Box<Gesture>>,
    },
}

impl Gesture {
    pub fn state(&self) -> ToolState {
        match self {
            Gesture::Idle => ToolState::Idle,
            Gesture::Placing { .. } => ToolState::Placing,
            Gesture::Drawing { .. } | Gesture::Freehand { .. } => ToolState::Drawing,
            Gesture::Collecting { .. } => ToolState::MultiPointCollecting,
            Gesture::Panning { .. } | Gesture::Pinch { .. } => ToolState::Panning,
            Gesture::TextPending { .. } => ToolState::TextPending,
            Gesture::ScaleInputPending { .. } => ToolState::ScaleInputPending,
            Gesture::Moving { .. }
            | Gesture::Resizing { .. }
            | Gesture::DraggingVertex { .. }
            | Gesture::BoxSelecting { .. }
            | Gesture::DraggingPin { .. } => ToolState::Selecting,
        }
    }

    /// Whether a modal dialog step is awaiting input.
    pub fn is_modal(&self) -> bool {
        matches!(
            self,
            Gesture::TextPending { .. } | Gesture::ScaleInputPending { .. }
        )
    }

    /// Whether this gesture edits existing markups in place before settling.
    pub fn edits_in_place(&self) -> bool {
        matches!(
            self,
            Gesture::Moving { .. } | Gesture::Resizing { .. } | Gesture::DraggingVertex { .. }
        )
    }
}
