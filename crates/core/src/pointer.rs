//! Pointer, touch, wheel and keyboard handling for [`Editor`].
//!
//! Positions arrive in screen space and are mapped to document space once
//! per event. Each handler takes the current gesture out of the editor,
//! decides the next one and puts it back.

use crate::editor::{Editor, EditorEvent, LoadState};
use crate::geometry::{distance, nearest_edge, Point};
use crate::input::{Button, Gesture, Key, Modifiers, PointerEvent, Protocol, Tool};
use crate::manipulation::{handle_at, move_vertex, resize_markup, HandleType};
use crate::measurement::refresh_markup;
use crate::pins::normalize;
use crate::selection::{box_select, click_select};
use crate::sync::PersistOp;
use crate::transform;
use sheetmark_model::{MarkupId, MarkupKind};
use tracing::debug;

impl Editor {
    fn accepts_input(&self) -> bool {
        self.load_state == LoadState::Ready
    }

    /// Screen distance between two document points.
    fn screen_distance(&self, a: Point, b: Point) -> f64 {
        distance(a, b) * self.viewport.zoom()
    }

    pub fn pointer_down(&mut self, event: PointerEvent) -> Vec<EditorEvent> {
        if !self.accepts_input() || self.gesture.is_modal() {
            return self.take_events();
        }
        let doc = self.viewport.to_document(event.position);

        if event.button == Button::Middle || (self.tool == Tool::Pan && event.button == Button::Primary) {
            let suspended = match std::mem::take(&mut self.gesture) {
                Gesture::Idle => None,
                other => Some(Box::new(other)),
            };
            self.gesture = Gesture::Panning {
                last_screen: event.position,
                suspended,
            };
            return self.take_events();
        }

        if event.button == Button::Secondary {
            if matches!(self.gesture, Gesture::Collecting { .. }) {
                self.finish_multipoint();
            }
            return self.take_events();
        }

        match self.tool {
            Tool::Select => self.select_down(doc, event.modifiers),
            Tool::Pan => {}
            Tool::Calibrate => self.click_click(Tool::Calibrate, doc),
            Tool::Draw(kind) => match self.tool.protocol() {
                Some(Protocol::Drag) => {
                    self.gesture = Gesture::Drawing {
                        kind,
                        start: doc,
                        current: doc,
                    };
                }
                Some(Protocol::Freehand) => {
                    self.gesture = Gesture::Freehand {
                        kind,
                        points: vec![doc],
                    };
                }
                Some(Protocol::MultiPoint { closed }) => self.collect_point(kind, closed, doc),
                Some(Protocol::ClickClick) => self.click_click(self.tool, doc),
                Some(Protocol::SingleClick) => {
                    if kind == MarkupKind::Symbol && self.symbol.is_none() {
                        self.emit(EditorEvent::SymbolNeeded);
                    } else {
                        self.create_markup(kind, vec![doc], None);
                    }
                }
                // The anchor is fixed on release.
                Some(Protocol::TextEntry) | None => {}
            },
        }
        self.take_events()
    }

    fn select_down(&mut self, doc: Point, modifiers: Modifiers) {
        let tolerance = self.px(self.config.hit_tolerance_px);

        if let Some(id) = self.selection.single() {
            if let Some(handle) = handle_at(&self.active_handles(), doc) {
                self.gesture = match handle.handle_type {
                    HandleType::Vertex(index) => Gesture::DraggingVertex {
                        id,
                        index,
                        moved: false,
                    },
                    handle_type => match self.markups.get(id) {
                        Some(markup) => Gesture::Resizing {
                            id,
                            handle: handle_type,
                            original: Box::new(markup.clone()),
                        },
                        None => Gesture::Idle,
                    },
                };
                return;
            }

            if self.vertex_edit && self.insert_vertex_at(id, doc, tolerance) {
                return;
            }
        }

        if let Some(page_size) = self.page_size {
            let radius = self.px(self.config.pin_radius_px);
            let hit = self.pins.hit_test(
                doc,
                page_size,
                radius,
                self.config.pin_collision_tolerance,
            );
            if let Some(pin) = hit.and_then(|id| self.pins.get(id)) {
                self.gesture = Gesture::DraggingPin {
                    id: pin.id,
                    origin: (pin.x, pin.y),
                    moved: false,
                };
                return;
            }
        }

        let hit = self
            .markups
            .hit_test(self.active_page, doc, tolerance, &self.metrics);
        match hit {
            Some(id) if modifiers.shift => {
                if click_select(&mut self.selection, &self.markups, Some(id), true) {
                    self.after_selection_change();
                }
            }
            Some(id) => {
                if !self.selection.contains(id)
                    && click_select(&mut self.selection, &self.markups, Some(id), false)
                {
                    self.after_selection_change();
                }
                self.gesture = Gesture::Moving {
                    last: doc,
                    moved: false,
                };
            }
            None => {
                if !modifiers.shift && click_select(&mut self.selection, &self.markups, None, false) {
                    self.after_selection_change();
                }
                self.vertex_edit = false;
                self.gesture = Gesture::BoxSelecting {
                    start: doc,
                    current: doc,
                    additive: modifiers.shift,
                };
            }
        }
    }

    fn after_selection_change(&mut self) {
        self.vertex_edit = false;
        self.emit(EditorEvent::SelectionChanged);
        self.emit(EditorEvent::RenderNeeded);
    }

    /// Insert a vertex where the pointer touches an edge of the markup in
    /// vertex edit, and start dragging it.
    fn insert_vertex_at(&mut self, id: MarkupId, doc: Point, tolerance: f64) -> bool {
        let Some(markup) = self.markups.get_mut(id) else {
            return false;
        };
        if markup.locked || !markup.kind.supports_vertex_edit() {
            return false;
        }
        let points = markup.geometry.points();
        let closed = markup.geometry.is_closed();
        let reach = tolerance + markup.style.stroke_width / 2.0;
        let Some((edge, dist, foot)) = nearest_edge(doc, &points, closed) else {
            return false;
        };
        if dist > reach || !markup.geometry.insert_vertex(edge + 1, foot) {
            return false;
        }
        debug!(%id, index = edge + 1, "vertex inserted");
        self.gesture = Gesture::DraggingVertex {
            id,
            index: edge + 1,
            moved: true,
        };
        self.emit(EditorEvent::RenderNeeded);
        true
    }

    /// Handle a click of a two-click tool: calibration or distance measurement.
    fn click_click(&mut self, tool: Tool, doc: Point) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Placing { first, .. } => {
                if self.screen_distance(first, doc) < self.config.min_shape_px {
                    debug!("second point too close, ignored");
                    self.gesture = Gesture::Placing {
                        tool,
                        first,
                        hover: Some(doc),
                    };
                    return;
                }
                match tool {
                    Tool::Calibrate => {
                        self.gesture = Gesture::ScaleInputPending { start: first, end: doc };
                        self.emit(EditorEvent::ScaleInputRequested {
                            pixel_length: distance(first, doc),
                        });
                    }
                    _ => {
                        if let Some(kind) = tool.kind() {
                            self.create_markup(kind, vec![first, doc], None);
                        }
                    }
                }
            }
            _ => {
                self.gesture = Gesture::Placing {
                    tool,
                    first: doc,
                    hover: None,
                };
            }
        }
        self.emit(EditorEvent::RenderNeeded);
    }

    fn collect_point(&mut self, kind: MarkupKind, closed: bool, doc: Point) {
        let gesture = std::mem::take(&mut self.gesture);
        let Gesture::Collecting { mut points, .. } = gesture else {
            self.gesture = Gesture::Collecting {
                kind,
                points: vec![doc],
                hover: None,
            };
            return;
        };

        let near_first = points
            .first()
            .is_some_and(|first| self.screen_distance(*first, doc) <= self.config.close_radius_px);
        if closed && points.len() >= kind.min_points() && near_first {
            self.gesture = Gesture::Collecting {
                kind,
                points,
                hover: None,
            };
            self.finish_multipoint();
            return;
        }

        let duplicate = points
            .last()
            .is_some_and(|last| self.screen_distance(*last, doc) < self.config.min_shape_px);
        if !duplicate {
            points.push(doc);
        }
        self.gesture = Gesture::Collecting {
            kind,
            points,
            hover: Some(doc),
        };
        self.emit(EditorEvent::RenderNeeded);
    }

    /// Commit the multi-point gesture if it has enough points.
    fn finish_multipoint(&mut self) -> bool {
        let gesture = std::mem::take(&mut self.gesture);
        let Gesture::Collecting { kind, points, hover } = gesture else {
            self.gesture = gesture;
            return false;
        };
        if points.len() < kind.min_points() {
            debug!(?kind, count = points.len(), "not enough points to finish");
            self.gesture = Gesture::Collecting { kind, points, hover };
            return false;
        }
        self.create_markup(kind, points, None);
        self.emit(EditorEvent::RenderNeeded);
        true
    }

    pub fn pointer_move(&mut self, event: PointerEvent) -> Vec<EditorEvent> {
        if !self.accepts_input() {
            return self.take_events();
        }
        let doc = self.viewport.to_document(event.position);

        self.gesture = match std::mem::take(&mut self.gesture) {
            Gesture::Panning {
                last_screen,
                suspended,
            } => {
                self.viewport.pan_by(
                    event.position.x - last_screen.x,
                    event.position.y - last_screen.y,
                );
                Gesture::Panning {
                    last_screen: event.position,
                    suspended,
                }
            }
            Gesture::Drawing { kind, start, .. } => Gesture::Drawing {
                kind,
                start,
                current: doc,
            },
            Gesture::Freehand { kind, mut points } => {
                if points.last() != Some(&doc) {
                    points.push(doc);
                }
                Gesture::Freehand { kind, points }
            }
            Gesture::Collecting { kind, points, .. } => Gesture::Collecting {
                kind,
                points,
                hover: Some(doc),
            },
            Gesture::Placing { tool, first, .. } => Gesture::Placing {
                tool,
                first,
                hover: Some(doc),
            },
            Gesture::Moving { last, .. } => {
                let ids = self.unlocked_selection();
                transform::translate(&mut self.markups, &ids, doc.x - last.x, doc.y - last.y);
                Gesture::Moving {
                    last: doc,
                    moved: true,
                }
            }
            Gesture::Resizing {
                id,
                handle,
                original,
            } => {
                let mut resized = resize_markup(&original, handle, doc, &self.metrics);
                refresh_markup(&mut resized, self.scale.as_ref());
                self.markups.replace(resized);
                Gesture::Resizing {
                    id,
                    handle,
                    original,
                }
            }
            Gesture::DraggingVertex { id, index, moved } => {
                let scale = self.scale.as_ref();
                let moved = match self.markups.get_mut(id) {
                    Some(markup) => {
                        if move_vertex(markup, index, doc) {
                            refresh_markup(markup, scale);
                            true
                        } else {
                            moved
                        }
                    }
                    None => moved,
                };
                Gesture::DraggingVertex { id, index, moved }
            }
            Gesture::BoxSelecting { start, additive, .. } => Gesture::BoxSelecting {
                start,
                current: doc,
                additive,
            },
            Gesture::DraggingPin { id, origin, moved } => {
                let moved = match self.page_size.and_then(|size| normalize(doc, size)) {
                    Some((x, y)) => self.pins.move_pin(id, x, y).is_some() || moved,
                    None => moved,
                };
                Gesture::DraggingPin { id, origin, moved }
            }
            other => {
                self.gesture = other;
                return self.take_events();
            }
        };
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    pub fn pointer_up(&mut self, event: PointerEvent) -> Vec<EditorEvent> {
        if !self.accepts_input() {
            return self.take_events();
        }
        let doc = self.viewport.to_document(event.position);

        match std::mem::take(&mut self.gesture) {
            Gesture::Panning { suspended, .. } => {
                self.gesture = suspended.map(|g| *g).unwrap_or_default();
            }
            Gesture::Drawing { kind, start, .. } => {
                if self.screen_distance(start, doc) < self.config.min_shape_px {
                    debug!(?kind, "degenerate shape discarded");
                    self.emit(EditorEvent::RenderNeeded);
                } else {
                    self.create_markup(kind, vec![start, doc], None);
                }
            }
            Gesture::Freehand { kind, mut points } => {
                if points.last() != Some(&doc) {
                    points.push(doc);
                }
                if points.len() < 2 {
                    debug!(?kind, "stroke too short, discarded");
                    self.emit(EditorEvent::RenderNeeded);
                } else {
                    self.create_markup(kind, points, None);
                }
            }
            Gesture::Moving { moved, .. } => {
                if moved {
                    self.settle("move");
                }
            }
            Gesture::Resizing { .. } => {
                self.settle("resize");
            }
            Gesture::DraggingVertex { moved, .. } => {
                if moved {
                    self.settle("vertex");
                }
            }
            Gesture::BoxSelecting {
                start, additive, ..
            } => {
                if self.screen_distance(start, doc) >= self.config.min_shape_px {
                    let ids = box_select(&self.markups, self.active_page, start, doc, &self.metrics);
                    let changed = if additive {
                        self.selection.extend(ids)
                    } else {
                        self.selection.set(ids)
                    };
                    if changed {
                        self.after_selection_change();
                    }
                }
                self.emit(EditorEvent::RenderNeeded);
            }
            Gesture::DraggingPin { id, origin, moved } => {
                if let Some(pin) = self.pins.get(id).filter(|_| moved) {
                    debug!(%id, x = pin.x, y = pin.y, "pin moved");
                    self.sync.enqueue(PersistOp::UpdatePin {
                        id,
                        x: pin.x,
                        y: pin.y,
                        previous: origin,
                    });
                }
            }
            Gesture::Idle => {
                if let (Tool::Draw(kind), Some(Protocol::TextEntry)) = (self.tool, self.tool.protocol()) {
                    if event.button == Button::Primary {
                        self.gesture = Gesture::TextPending { kind, anchor: doc };
                        self.emit(EditorEvent::TextInputRequested);
                        self.emit(EditorEvent::RenderNeeded);
                    }
                }
            }
            other => self.gesture = other,
        }
        self.take_events()
    }

    /// Double-click: finish a multi-point gesture, delete a vertex, or enter
    /// vertex edit on the selected markup.
    pub fn double_click(&mut self, event: PointerEvent) -> Vec<EditorEvent> {
        if !self.accepts_input() || self.gesture.is_modal() {
            return self.take_events();
        }
        let doc = self.viewport.to_document(event.position);

        if matches!(self.gesture, Gesture::Collecting { .. }) {
            self.finish_multipoint();
            return self.take_events();
        }
        if self.tool != Tool::Select {
            return self.take_events();
        }
        let Some(id) = self.selection.single() else {
            return self.take_events();
        };

        if self.vertex_edit {
            if let Some(HandleType::Vertex(index)) =
                handle_at(&self.active_handles(), doc).map(|h| h.handle_type)
            {
                self.abandon_gesture();
                let removed = self.markups.get_mut(id).is_some_and(|markup| {
                    let min_points = markup.kind.min_points();
                    markup.geometry.remove_vertex(index, min_points)
                });
                if removed {
                    self.settle("vertex_delete");
                } else {
                    debug!(%id, index, "vertex delete refused");
                }
            }
            return self.take_events();
        }

        let tolerance = self.px(self.config.hit_tolerance_px);
        let hit = self
            .markups
            .get(id)
            .is_some_and(|m| m.hit_test(doc, tolerance, &self.metrics));
        if hit {
            self.abandon_gesture();
            return self.enter_vertex_edit();
        }
        self.take_events()
    }

    /// Wheel zoom anchored at the pointer.
    pub fn wheel(&mut self, delta_y: f64, position: Point) -> Vec<EditorEvent> {
        if !self.accepts_input() {
            return self.take_events();
        }
        self.viewport
            .wheel_zoom(delta_y, position, self.config.wheel_zoom_sensitivity);
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    // Touch: one finger acts as the primary pointer, two fingers pinch.

    pub fn touch_start(&mut self, id: u64, position: Point) -> Vec<EditorEvent> {
        if !self.accepts_input() {
            return self.take_events();
        }
        self.touches.insert(id, position);
        match self.touches.len() {
            1 => {
                self.pinch_residue = false;
                self.touch_anchor = Some(self.gesture.clone());
                self.pointer_down(PointerEvent::primary(position.x, position.y))
            }
            2 => {
                let suspended = self.suspend_for_pinch();
                match self.pinch_metrics() {
                    Some((distance, center)) => {
                        self.gesture = Gesture::Pinch {
                            last_distance: distance,
                            last_center_screen: center,
                            suspended,
                        };
                    }
                    None => self.gesture = suspended.map(|g| *g).unwrap_or_default(),
                }
                self.take_events()
            }
            _ => self.take_events(),
        }
    }

    /// Take the current gesture out of the way of a pinch.
    ///
    /// A multi-point gesture loses the point the first finger added and is
    /// kept for resumption, as is an open dialog. Anything the first finger
    /// started on its own is abandoned.
    fn suspend_for_pinch(&mut self) -> Option<Box<Gesture>> {
        let anchor = self.touch_anchor.take();
        match std::mem::take(&mut self.gesture) {
            Gesture::Idle => None,
            Gesture::Pinch { suspended, .. } | Gesture::Panning { suspended, .. } => suspended,
            gesture if gesture.is_modal() => Some(Box::new(gesture)),
            Gesture::Collecting {
                kind,
                mut points,
                hover,
            } if matches!(
                &anchor,
                Some(Gesture::Collecting { kind: before_kind, points: before, .. })
                    if *before_kind == kind && before.len() + 1 == points.len()
            ) =>
            {
                points.pop();
                debug!(?kind, points = points.len(), "multi-point gesture suspended for pinch");
                Some(Box::new(Gesture::Collecting { kind, points, hover }))
            }
            other => {
                self.gesture = other;
                self.abandon_gesture();
                None
            }
        }
    }

    pub fn touch_move(&mut self, id: u64, position: Point) -> Vec<EditorEvent> {
        if !self.accepts_input() {
            return self.take_events();
        }
        let Some(slot) = self.touches.get_mut(&id) else {
            return self.take_events();
        };
        *slot = position;

        if self.pinch_residue {
            return self.take_events();
        }
        if let Gesture::Pinch {
            last_distance,
            last_center_screen,
            ..
        } = self.gesture
        {
            let Some((distance, center)) = self.pinch_metrics() else {
                return self.take_events();
            };
            if last_distance > f64::EPSILON {
                let target = self.viewport.zoom() * distance / last_distance;
                self.viewport.zoom_at(target, last_center_screen);
            }
            self.viewport.pan_by(
                center.x - last_center_screen.x,
                center.y - last_center_screen.y,
            );
            if let Gesture::Pinch {
                last_distance,
                last_center_screen,
                ..
            } = &mut self.gesture
            {
                *last_distance = distance;
                *last_center_screen = center;
            }
            self.emit(EditorEvent::RenderNeeded);
            return self.take_events();
        }

        if self.touches.len() == 1 {
            return self.pointer_move(PointerEvent::primary(position.x, position.y));
        }
        self.take_events()
    }

    pub fn touch_end(&mut self, id: u64) -> Vec<EditorEvent> {
        let Some(position) = self.touches.remove(&id) else {
            return self.take_events();
        };
        if matches!(self.gesture, Gesture::Pinch { .. }) {
            if self.touches.len() < 2 {
                if let Gesture::Pinch { suspended, .. } = std::mem::take(&mut self.gesture) {
                    self.gesture = suspended.map(|g| *g).unwrap_or_default();
                }
                self.pinch_residue = !self.touches.is_empty();
                self.emit(EditorEvent::RenderNeeded);
            }
            return self.take_events();
        }
        if self.pinch_residue {
            self.pinch_residue = !self.touches.is_empty();
            return self.take_events();
        }
        if self.touches.is_empty() {
            return self.pointer_up(PointerEvent::primary(position.x, position.y));
        }
        self.take_events()
    }

    /// Distance between the first two touches and their centroid, in screen space.
    fn pinch_metrics(&self) -> Option<(f64, Point)> {
        let mut touches = self.touches.values();
        let a = *touches.next()?;
        let b = *touches.next()?;
        Some((distance(a, b), a.midpoint(b)))
    }

    pub fn key_down(&mut self, key: Key, modifiers: Modifiers) -> Vec<EditorEvent> {
        if self.gesture.is_modal() && key != Key::Escape {
            return self.take_events();
        }
        match key {
            Key::Escape => {
                if !matches!(self.gesture, Gesture::Idle) {
                    self.abandon_gesture();
                } else if self.vertex_edit {
                    return self.exit_vertex_edit();
                } else {
                    return self.clear_selection();
                }
                self.take_events()
            }
            Key::Delete | Key::Backspace => {
                if matches!(self.gesture, Gesture::Idle) {
                    return self.delete_selection();
                }
                self.take_events()
            }
            Key::Enter => {
                if matches!(self.gesture, Gesture::Collecting { .. }) {
                    self.finish_multipoint();
                }
                self.take_events()
            }
            Key::Char(c) if modifiers.command() => match c.to_ascii_lowercase() {
                'z' if modifiers.shift => self.redo(),
                'z' => self.undo(),
                'y' => self.redo(),
                'd' => self.duplicate_selection(),
                'g' if modifiers.shift => self.ungroup_selection(),
                'g' => self.group_selection(),
                _ => self.take_events(),
            },
            Key::Char(_) => self.take_events(),
        }
    }
}
