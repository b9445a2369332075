//! Render pipeline
//!
//! Maps markups, the in-progress gesture and selection state onto drawable
//! primitives in document space. The host applies the scene's zoom and pan
//! (`screen = document * zoom + pan`) and rasterizes.

use crate::config::EditorConfig;
use crate::geometry::{distance, Bounds, Point};
use crate::input::Gesture;
use crate::manipulation::{HandleType, ManipulationHandle};
use crate::markup::{triangle_vertices, Markup, MarkupGeometry, MarkupStyle};
use crate::measurement::{label_position, measurement_label};
use crate::pins::PhotoPin;
use sheetmark_model::{MarkupId, MarkupKind, PinId, TextAlign};

/// Arrowhead length as a multiple of the stroke width, with a floor.
const ARROW_HEAD_FACTOR: f64 = 4.0;
const ARROW_HEAD_MIN: f64 = 8.0;
/// Half-length of the end ticks on dimension and distance lines.
const TICK_HALF_LENGTH: f64 = 6.0;
const SELECTION_COLOR: &str = "#1E88E5";
const ISSUE_FILL: &str = "#FFF3E0";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { control: Point, to: Point },
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
    pub dashed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub color: String,
    pub opacity: f64,
}

/// Visual primitive types that can be rendered
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Path {
        commands: Vec<PathCommand>,
        stroke: Option<Stroke>,
        fill: Option<Fill>,
    },
    Ellipse {
        center: Point,
        radius_x: f64,
        radius_y: f64,
        stroke: Option<Stroke>,
        fill: Option<Fill>,
    },
    /// Text block anchored at its top-left corner.
    Text {
        position: Point,
        content: String,
        font_size: f64,
        color: String,
        align: TextAlign,
    },
    /// Symbol path data scaled from its view box into a centered square.
    Symbol {
        center: Point,
        size: f64,
        path_data: String,
        view_box: [f64; 4],
        color: String,
    },
    Handle {
        center: Point,
        size: f64,
        handle_type: HandleType,
    },
    /// Photo pin marker.
    Pin {
        id: PinId,
        center: Point,
        radius: f64,
        has_photo: bool,
        label: Option<String>,
    },
}

/// Rotation applied to a primitive about a pivot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub degrees: f64,
    pub pivot: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Markup,
    Preview,
    Decoration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneItem {
    pub markup_id: Option<MarkupId>,
    pub layer: Layer,
    pub opacity: f64,
    pub rotation: Option<Rotation>,
    pub primitive: Primitive,
}

impl SceneItem {
    fn decoration(primitive: Primitive) -> Self {
        Self {
            markup_id: None,
            layer: Layer::Decoration,
            opacity: 1.0,
            rotation: None,
            primitive,
        }
    }
}

/// Everything visible for the active page, bottom-most first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub page: u32,
    pub zoom: f64,
    pub pan: Point,
    pub items: Vec<SceneItem>,
}

impl Scene {
    pub fn items_for(&self, id: MarkupId) -> impl Iterator<Item = &SceneItem> {
        self.items.iter().filter(move |item| item.markup_id == Some(id))
    }

    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &SceneItem> {
        self.items.iter().filter(move |item| item.layer == layer)
    }
}

fn stroke_of(style: &MarkupStyle) -> Stroke {
    Stroke {
        color: style.stroke_color.clone(),
        width: style.stroke_width,
        dashed: false,
    }
}

fn fill_of(style: &MarkupStyle) -> Option<Fill> {
    style.fill_color.as_ref().map(|color| Fill {
        color: color.clone(),
        opacity: style.fill_opacity.unwrap_or(1.0),
    })
}

fn polyline_commands(points: &[Point], closed: bool) -> Vec<PathCommand> {
    let mut commands = Vec::with_capacity(points.len() + 1);
    if let Some((first, rest)) = points.split_first() {
        commands.push(PathCommand::MoveTo(*first));
        commands.extend(rest.iter().map(|p| PathCommand::LineTo(*p)));
        if closed {
            commands.push(PathCommand::Close);
        }
    }
    commands
}

/// Arrowhead triangle at `end`: tip, then the two barbs.
pub fn arrow_head(start: Point, end: Point, stroke_width: f64) -> [Point; 3] {
    let length = (stroke_width * ARROW_HEAD_FACTOR).max(ARROW_HEAD_MIN);
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let spread = std::f64::consts::PI / 7.0;
    [
        end,
        Point::new(
            end.x - length * (angle - spread).cos(),
            end.y - length * (angle - spread).sin(),
        ),
        Point::new(
            end.x - length * (angle + spread).cos(),
            end.y - length * (angle + spread).sin(),
        ),
    ]
}

/// Revision-cloud outline: each edge becomes outward-bulging scallops.
pub fn cloud_path(points: &[Point], scallop_length: f64) -> Vec<PathCommand> {
    if points.len() < 3 || scallop_length <= 0.0 {
        return polyline_commands(points, true);
    }

    let signed_area: f64 = (0..points.len())
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            a.x * b.y - b.x * a.y
        })
        .sum();
    let outward = if signed_area >= 0.0 { 1.0 } else { -1.0 };

    let mut commands = vec![PathCommand::MoveTo(points[0])];
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        let length = distance(a, b);
        if length <= f64::EPSILON {
            continue;
        }
        let count = (length / scallop_length).ceil().max(1.0) as usize;
        let (ux, uy) = ((b.x - a.x) / length, (b.y - a.y) / length);
        let (nx, ny) = (uy * outward, -ux * outward);
        let step = length / count as f64;

        for k in 0..count {
            let from = a.offset(ux * step * k as f64, uy * step * k as f64);
            let to = a.offset(ux * step * (k + 1) as f64, uy * step * (k + 1) as f64);
            let mid = from.midpoint(to);
            commands.push(PathCommand::QuadTo {
                control: mid.offset(nx * step * 0.6, ny * step * 0.6),
                to,
            });
        }
    }
    commands.push(PathCommand::Close);
    commands
}

fn end_ticks(start: Point, end: Point) -> Vec<PathCommand> {
    let length = distance(start, end);
    if length <= f64::EPSILON {
        return Vec::new();
    }
    let (nx, ny) = (
        -(end.y - start.y) / length * TICK_HALF_LENGTH,
        (end.x - start.x) / length * TICK_HALF_LENGTH,
    );
    vec![
        PathCommand::MoveTo(start.offset(nx, ny)),
        PathCommand::LineTo(start.offset(-nx, -ny)),
        PathCommand::MoveTo(end.offset(nx, ny)),
        PathCommand::LineTo(end.offset(-nx, -ny)),
    ]
}

/// Drawable primitives for one markup, in paint order.
pub fn markup_primitives(markup: &Markup, config: &EditorConfig) -> Vec<Primitive> {
    let style = &markup.style;
    let stroke = stroke_of(style);
    let fill = fill_of(style);
    let metrics = config.text_metrics();
    let mut primitives = Vec::new();

    match &markup.geometry {
        MarkupGeometry::Segment { start, end } => {
            primitives.push(Primitive::Path {
                commands: polyline_commands(&[*start, *end], false),
                stroke: Some(stroke.clone()),
                fill: None,
            });
            match markup.kind {
                MarkupKind::Arrow => primitives.push(Primitive::Path {
                    commands: polyline_commands(&arrow_head(*start, *end, style.stroke_width), true),
                    stroke: None,
                    fill: Some(Fill {
                        color: style.stroke_color.clone(),
                        opacity: 1.0,
                    }),
                }),
                MarkupKind::Dimension | MarkupKind::MeasureLine => primitives.push(Primitive::Path {
                    commands: end_ticks(*start, *end),
                    stroke: Some(stroke.clone()),
                    fill: None,
                }),
                _ => {}
            }
        }
        MarkupGeometry::Corners { start, end } => {
            let frame = Bounds::from_corners(*start, *end);
            match markup.kind {
                MarkupKind::Ellipse => primitives.push(Primitive::Ellipse {
                    center: frame.center(),
                    radius_x: frame.width() / 2.0,
                    radius_y: frame.height() / 2.0,
                    stroke: Some(stroke),
                    fill,
                }),
                MarkupKind::Triangle => primitives.push(Primitive::Path {
                    commands: polyline_commands(&triangle_vertices(&frame), true),
                    stroke: Some(stroke),
                    fill,
                }),
                _ => primitives.push(Primitive::Path {
                    commands: polyline_commands(&frame.corners(), true),
                    stroke: Some(stroke),
                    fill,
                }),
            }
        }
        MarkupGeometry::Radius { center, edge } => {
            let radius = distance(*center, *edge);
            primitives.push(Primitive::Ellipse {
                center: *center,
                radius_x: radius,
                radius_y: radius,
                stroke: Some(stroke),
                fill,
            });
        }
        MarkupGeometry::Polyline { points } => primitives.push(Primitive::Path {
            commands: polyline_commands(points, false),
            stroke: Some(stroke),
            fill: None,
        }),
        MarkupGeometry::Polygon { points } => {
            let commands = if markup.kind == MarkupKind::Cloud {
                cloud_path(points, config.cloud_scallop_length)
            } else {
                polyline_commands(points, true)
            };
            primitives.push(Primitive::Path {
                commands,
                stroke: Some(stroke),
                fill,
            });
        }
        MarkupGeometry::Anchor { position } => match markup.kind {
            MarkupKind::Symbol => {
                if let Some(symbol) = &markup.symbol {
                    primitives.push(Primitive::Symbol {
                        center: *position,
                        size: symbol.size,
                        path_data: symbol.path_data.clone(),
                        view_box: symbol.view_box,
                        color: style.stroke_color.clone(),
                    });
                }
            }
            MarkupKind::PhotoPin => {
                let frame = markup.local_bounds(&metrics);
                primitives.push(Primitive::Ellipse {
                    center: *position,
                    radius_x: frame.width() / 2.0,
                    radius_y: frame.height() / 2.0,
                    stroke: Some(stroke),
                    fill: Some(Fill {
                        color: style.stroke_color.clone(),
                        opacity: 0.3,
                    }),
                });
            }
            _ => {
                if markup.kind == MarkupKind::Issue {
                    let frame = markup.local_bounds(&metrics);
                    primitives.push(Primitive::Path {
                        commands: polyline_commands(&frame.corners(), true),
                        stroke: Some(stroke),
                        fill: Some(fill.unwrap_or(Fill {
                            color: ISSUE_FILL.to_owned(),
                            opacity: 1.0,
                        })),
                    });
                }
                primitives.push(Primitive::Text {
                    position: *position,
                    content: markup.text.clone().unwrap_or_default(),
                    font_size: markup.font_size(&metrics),
                    color: style.stroke_color.clone(),
                    align: style.text_align,
                });
            }
        },
    }

    if let Some(label) = measurement_label(markup) {
        let points = markup.geometry.points();
        if let Some(at) = label_position(markup.kind, &points) {
            primitives.push(Primitive::Text {
                position: at,
                content: label,
                font_size: metrics.default_font_size,
                color: style.stroke_color.clone(),
                align: TextAlign::Center,
            });
        }
    }

    primitives
}

/// Scene items for one markup, carrying its opacity and frame rotation.
pub fn markup_items(markup: &Markup, config: &EditorConfig, layer: Layer) -> Vec<SceneItem> {
    let rotation = markup.has_frame_rotation().then(|| Rotation {
        degrees: markup.rotation,
        pivot: markup.local_bounds(&config.text_metrics()).center(),
    });
    markup_primitives(markup, config)
        .into_iter()
        .map(|primitive| SceneItem {
            markup_id: Some(markup.id),
            layer,
            opacity: markup.style.opacity.unwrap_or(1.0),
            rotation,
            primitive,
        })
        .collect()
}

fn dashed(color: &str, width: f64) -> Stroke {
    Stroke {
        color: color.to_owned(),
        width,
        dashed: true,
    }
}

/// Preview of the in-progress gesture. `px` is one screen pixel in document units.
pub fn gesture_preview(
    gesture: &Gesture,
    style: &MarkupStyle,
    config: &EditorConfig,
    page: u32,
    px: f64,
) -> Vec<SceneItem> {
    let preview = |kind: MarkupKind, points: Vec<Point>| -> Vec<SceneItem> {
        MarkupGeometry::from_points(kind, points)
            .map(|geometry| {
                let markup = Markup::new(kind, page, geometry, style.clone());
                markup_items(&markup, config, Layer::Preview)
            })
            .unwrap_or_default()
    };
    let guide = |points: &[Point], closed: bool| SceneItem {
        markup_id: None,
        layer: Layer::Preview,
        opacity: 1.0,
        rotation: None,
        primitive: Primitive::Path {
            commands: polyline_commands(points, closed),
            stroke: Some(dashed(&style.stroke_color, px)),
            fill: None,
        },
    };

    match gesture {
        Gesture::Drawing { kind, start, current } => preview(*kind, vec![*start, *current]),
        Gesture::Freehand { kind, points } => {
            if points.len() >= 2 {
                preview(*kind, points.clone())
            } else {
                Vec::new()
            }
        }
        Gesture::Collecting { kind, points, hover } => {
            let mut items = Vec::new();
            let mut path = points.clone();
            if let Some(hover) = hover {
                path.push(*hover);
            }
            if path.len() >= 2 {
                items.push(guide(&path, kind.is_closed() && path.len() >= 3));
            }
            if let Some(first) = points.first() {
                items.push(SceneItem {
                    layer: Layer::Preview,
                    ..SceneItem::decoration(Primitive::Ellipse {
                        center: *first,
                        radius_x: config.close_radius_px * px,
                        radius_y: config.close_radius_px * px,
                        stroke: Some(dashed(&style.stroke_color, px)),
                        fill: None,
                    })
                });
            }
            items
        }
        Gesture::Placing {
            first,
            hover: Some(hover),
            ..
        } => vec![guide(&[*first, *hover], false)],
        Gesture::ScaleInputPending { start, end } => vec![guide(&[*start, *end], false)],
        Gesture::BoxSelecting { start, current, .. } => {
            let frame = Bounds::from_corners(*start, *current);
            vec![SceneItem::decoration(Primitive::Path {
                commands: polyline_commands(&frame.corners(), true),
                stroke: Some(dashed(SELECTION_COLOR, px)),
                fill: Some(Fill {
                    color: SELECTION_COLOR.to_owned(),
                    opacity: 0.08,
                }),
            })]
        }
        _ => Vec::new(),
    }
}

/// Dashed outline around a selected markup, following its frame rotation.
pub fn selection_outline(markup: &Markup, config: &EditorConfig, px: f64) -> SceneItem {
    let metrics = config.text_metrics();
    let local = markup.local_bounds(&metrics).expand(markup.style.stroke_width / 2.0 + 2.0 * px);
    let corners = if markup.has_frame_rotation() {
        let center = local.center();
        local
            .corners()
            .map(|corner| corner.rotate_about(center, markup.rotation))
    } else {
        local.corners()
    };
    SceneItem {
        markup_id: Some(markup.id),
        ..SceneItem::decoration(Primitive::Path {
            commands: polyline_commands(&corners, true),
            stroke: Some(dashed(SELECTION_COLOR, px)),
            fill: None,
        })
    }
}

pub fn handle_items(handles: &[ManipulationHandle]) -> Vec<SceneItem> {
    handles
        .iter()
        .map(|handle| SceneItem {
            markup_id: Some(handle.markup_id),
            ..SceneItem::decoration(Primitive::Handle {
                center: handle.position,
                size: handle.size,
                handle_type: handle.handle_type,
            })
        })
        .collect()
}

/// Pin markers with a constant on-screen radius.
pub fn pin_items(pins: &[&PhotoPin], page_size: (f64, f64), radius: f64) -> Vec<SceneItem> {
    pins.iter()
        .map(|pin| {
            SceneItem::decoration(Primitive::Pin {
                id: pin.id,
                center: pin.position(page_size),
                radius,
                has_photo: pin.has_photo(),
                label: pin.label.clone(),
            })
        })
        .collect()
}
