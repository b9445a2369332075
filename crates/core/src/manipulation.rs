//! Markup manipulation handles and resizing
//!
//! A single selected markup exposes eight resize handles on its frame, or one
//! size handle for symbols. Vertex editing exposes one handle per point.

use crate::config::TextMetrics;
use crate::geometry::{distance, Bounds, Point};
use crate::markup::{Markup, MarkupGeometry};
use sheetmark_model::{MarkupId, MarkupKind};

/// Smallest symbol display size reachable by dragging the size handle.
pub const MIN_SYMBOL_SIZE: f64 = 4.0;

/// Type of manipulation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleType {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,

    /// Display-size handle of a symbol
    SymbolSize,

    /// Vertex handle during vertex editing
    Vertex(usize),
}

impl HandleType {
    /// The eight frame handles, clockwise from the top-left corner.
    pub const FRAME: [HandleType; 8] = [
        HandleType::TopLeft,
        HandleType::Top,
        HandleType::TopRight,
        HandleType::Right,
        HandleType::BottomRight,
        HandleType::Bottom,
        HandleType::BottomLeft,
        HandleType::Left,
    ];

    fn moves_left(self) -> bool {
        matches!(self, HandleType::TopLeft | HandleType::Left | HandleType::BottomLeft)
    }

    fn moves_right(self) -> bool {
        matches!(self, HandleType::TopRight | HandleType::Right | HandleType::BottomRight)
    }

    fn moves_top(self) -> bool {
        matches!(self, HandleType::TopLeft | HandleType::Top | HandleType::TopRight)
    }

    fn moves_bottom(self) -> bool {
        matches!(self, HandleType::BottomLeft | HandleType::Bottom | HandleType::BottomRight)
    }

    /// Where this handle sits on a frame.
    pub fn position_on(self, frame: &Bounds) -> Point {
        let x = if self.moves_left() {
            frame.min_x
        } else if self.moves_right() {
            frame.max_x
        } else {
            frame.center().x
        };
        let y = if self.moves_top() {
            frame.min_y
        } else if self.moves_bottom() {
            frame.max_y
        } else {
            frame.center().y
        };
        Point::new(x, y)
    }

    /// The frame point that stays put while this handle is dragged.
    fn fixed_point_on(self, frame: &Bounds) -> Point {
        let x = if self.moves_left() {
            frame.max_x
        } else if self.moves_right() {
            frame.min_x
        } else {
            frame.center().x
        };
        let y = if self.moves_top() {
            frame.max_y
        } else if self.moves_bottom() {
            frame.min_y
        } else {
            frame.center().y
        };
        Point::new(x, y)
    }

    /// The frame after dragging this handle to `to`.
    fn drag_frame(self, frame: &Bounds, to: Point) -> Bounds {
        let mut next = *frame;
        if self.moves_left() {
            next.min_x = to.x;
        }
        if self.moves_right() {
            next.max_x = to.x;
        }
        if self.moves_top() {
            next.min_y = to.y;
        }
        if self.moves_bottom() {
            next.max_y = to.y;
        }
        Bounds::new(next.min_x, next.min_y, next.max_x, next.max_y)
    }
}

/// Manipulation handle with position and type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManipulationHandle {
    pub handle_type: HandleType,

    /// Position in document coordinates
    pub position: Point,

    /// Hit radius in document coordinates
    pub size: f64,

    pub markup_id: MarkupId,
}

impl ManipulationHandle {
    pub fn new(handle_type: HandleType, position: Point, size: f64, markup_id: MarkupId) -> Self {
        Self {
            handle_type,
            position,
            size,
            markup_id,
        }
    }

    pub fn hit_test(&self, point: Point) -> bool {
        distance(point, self.position) <= self.size
    }
}

/// Whether a markup shows resize affordances at all.
pub fn is_resizable(markup: &Markup) -> bool {
    !markup.locked && !matches!(markup.kind, MarkupKind::Highlighter | MarkupKind::PhotoPin)
}

fn frame_point(markup: &Markup, local: &Bounds, point: Point) -> Point {
    if markup.has_frame_rotation() {
        point.rotate_about(local.center(), markup.rotation)
    } else {
        point
    }
}

/// Resize handles for a single selected markup.
pub fn generate_handles(
    markup: &Markup,
    handle_size: f64,
    metrics: &TextMetrics,
) -> Vec<ManipulationHandle> {
    if !is_resizable(markup) {
        return Vec::new();
    }

    let local = markup.local_bounds(metrics);
    if markup.kind == MarkupKind::Symbol {
        let corner = HandleType::BottomRight.position_on(&local);
        return vec![ManipulationHandle::new(
            HandleType::SymbolSize,
            frame_point(markup, &local, corner),
            handle_size,
            markup.id,
        )];
    }

    HandleType::FRAME
        .iter()
        .map(|handle| {
            let position = frame_point(markup, &local, handle.position_on(&local));
            ManipulationHandle::new(*handle, position, handle_size, markup.id)
        })
        .collect()
}

/// One handle per vertex, for kinds that support vertex editing.
pub fn vertex_handles(markup: &Markup, handle_size: f64) -> Vec<ManipulationHandle> {
    if markup.locked || !markup.kind.supports_vertex_edit() {
        return Vec::new();
    }
    markup
        .geometry
        .points()
        .into_iter()
        .enumerate()
        .map(|(index, point)| {
            ManipulationHandle::new(HandleType::Vertex(index), point, handle_size, markup.id)
        })
        .collect()
}

/// The handle nearest to `point` among those that it hits.
pub fn handle_at(handles: &[ManipulationHandle], point: Point) -> Option<ManipulationHandle> {
    handles
        .iter()
        .filter(|h| h.hit_test(point))
        .min_by(|a, b| {
            distance(point, a.position).total_cmp(&distance(point, b.position))
        })
        .copied()
}

/// Resize `original` by dragging `handle` to `pointer` (document space).
///
/// Always derives from the markup as it was when the drag started, so the
/// result does not accumulate per-frame rounding.
pub fn resize_markup(
    original: &Markup,
    handle: HandleType,
    pointer: Point,
    metrics: &TextMetrics,
) -> Markup {
    let mut resized = original.clone();
    let local = original.local_bounds(metrics);
    let p = if original.has_frame_rotation() {
        pointer.rotate_about(local.center(), -original.rotation)
    } else {
        pointer
    };

    match (&original.geometry, handle) {
        (MarkupGeometry::Anchor { position }, HandleType::SymbolSize) => {
            let half = (p.x - position.x).abs().max((p.y - position.y).abs());
            if let Some(symbol) = resized.symbol.as_mut() {
                symbol.size = (half * 2.0).max(MIN_SYMBOL_SIZE);
            }
        }
        (_, HandleType::SymbolSize) | (_, HandleType::Vertex(_)) => {}
        (MarkupGeometry::Corners { .. }, _) => {
            let frame = handle.drag_frame(&local, p);
            resized.geometry = MarkupGeometry::Corners {
                start: frame.top_left(),
                end: Point::new(frame.max_x, frame.max_y),
            };
            keep_fixed_point(original, &mut resized, handle, metrics);
        }
        (MarkupGeometry::Radius { .. }, _) => {
            let frame = handle.drag_frame(&local, p);
            let center = frame.center();
            let radius = frame.width().max(frame.height()) / 2.0;
            resized.geometry = MarkupGeometry::Radius {
                center,
                edge: Point::new(center.x + radius, center.y),
            };
        }
        (MarkupGeometry::Anchor { .. }, _) => {
            let frame = handle.drag_frame(&local, p);
            let ratio = if matches!(handle, HandleType::Left | HandleType::Right) {
                frame.width() / local.width().max(f64::EPSILON)
            } else {
                frame.height() / local.height().max(f64::EPSILON)
            };
            let font_size = (original.font_size(metrics) * ratio).max(1.0);
            resized.style.font_size = Some(font_size);
            let (width, height) =
                metrics.block_size(original.text.as_deref().unwrap_or_default(), font_size);
            let x = if handle.moves_left() {
                local.max_x - width
            } else {
                local.min_x
            };
            let y = if handle.moves_top() {
                local.max_y - height
            } else {
                local.min_y
            };
            resized.geometry = MarkupGeometry::Anchor {
                position: Point::new(x, y),
            };
            keep_fixed_point(original, &mut resized, handle, metrics);
        }
        (
            MarkupGeometry::Segment { .. }
            | MarkupGeometry::Polyline { .. }
            | MarkupGeometry::Polygon { .. },
            _,
        ) => {
            let grabbed = handle.position_on(&local);
            let nearest = original
                .geometry
                .points()
                .iter()
                .enumerate()
                .min_by(|a, b| distance(*a.1, grabbed).total_cmp(&distance(*b.1, grabbed)))
                .map(|(index, _)| index);
            if let Some(index) = nearest {
                resized.geometry.set_vertex(index, p);
            }
        }
    }
    resized
}

/// For rotated frames, shift the result so the handle's opposite point stays
/// where it was on screen.
fn keep_fixed_point(original: &Markup, resized: &mut Markup, handle: HandleType, metrics: &TextMetrics) {
    if !original.has_frame_rotation() {
        return;
    }
    let before_frame = original.local_bounds(metrics);
    let after_frame = resized.local_bounds(metrics);
    let before = handle
        .fixed_point_on(&before_frame)
        .rotate_about(before_frame.center(), original.rotation);
    let after = handle
        .fixed_point_on(&after_frame)
        .rotate_about(after_frame.center(), resized.rotation);
    resized.translate(before.x - after.x, before.y - after.y);
}

/// Move a single vertex of `markup`. Returns false for an invalid index.
pub fn move_vertex(markup: &mut Markup, index: usize, to: Point) -> bool {
    markup.geometry.set_vertex(index, to)
}
