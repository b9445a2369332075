//! Editor controller
//!
//! [`Editor`] owns every piece of interactive state for one sheet version:
//! markups, history, selection, the active tool and gesture, the viewport,
//! the calibration scale, photo pins and the sync outbox. All mutation goes
//! through its methods on a single thread; each returns the events the host
//! should react to.
//!
//! Outside of an in-place gesture (move, resize, vertex drag) the live
//! collection always equals the history snapshot at the cursor. A settle
//! point diffs the two, queues the persistence work and pushes a snapshot.

use crate::collection::MarkupCollection;
use crate::config::{ConfigError, EditorConfig, TextMetrics};
use crate::error::CalibrationError;
use crate::geometry::Point;
use crate::history::History;
use crate::input::{Gesture, Tool, ToolState};
use crate::manipulation::{generate_handles, vertex_handles, ManipulationHandle};
use crate::markup::{Markup, MarkupGeometry, MarkupPatch, MarkupStyle};
use crate::measurement::{recompute_collection, CalibrationState, ScaleSystem};
use crate::pins::PinBoard;
use crate::render::{self, Layer, Scene};
use crate::selection::Selection;
use crate::sync::{PersistOp, PinRevert, SyncQueue};
use crate::transform::{self, Alignment};
use crate::viewport::Viewport;
use sheetmark_model::{
    GroupId, MarkupId, MarkupKind, MarkupRecord, MarkupRepository, PhotoPinRecord,
    RepositoryError, ScaleRecord, SheetId, SymbolRecord, VersionId,
};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Page bitmap lifecycle. Pointer input is only handled while `Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// Notifications for the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    RenderNeeded,
    SelectionChanged,
    /// Open the text dialog for a fixed anchor.
    TextInputRequested,
    /// Open the scale dialog for a reference line of this document length.
    ScaleInputRequested { pixel_length: f64 },
    /// A measurement tool was used without a calibration scale.
    CalibrationNeeded,
    /// The symbol tool was used before a symbol was chosen.
    SymbolNeeded,
    /// Transient, non-blocking message.
    Notice(String),
    LoadStateChanged(LoadState),
}

pub struct Editor {
    pub(crate) config: EditorConfig,
    pub(crate) metrics: TextMetrics,
    pub(crate) version: VersionId,
    pub(crate) sheet: SheetId,
    pub(crate) markups: MarkupCollection,
    pub(crate) history: History,
    pub(crate) selection: Selection,
    pub(crate) tool: Tool,
    pub(crate) style: MarkupStyle,
    pub(crate) symbol: Option<SymbolRecord>,
    pub(crate) gesture: Gesture,
    pub(crate) vertex_edit: bool,
    pub(crate) viewport: Viewport,
    pub(crate) scale: Option<ScaleSystem>,
    pub(crate) pins: PinBoard,
    pub(crate) sync: SyncQueue,
    pub(crate) active_page: u32,
    pub(crate) load_state: LoadState,
    pub(crate) page_size: Option<(f64, f64)>,
    pub(crate) touches: BTreeMap<u64, Point>,
    /// Gesture in effect before the first finger went down.
    pub(crate) touch_anchor: Option<Gesture>,
    /// Fingers left over from a pinch are ignored until all are lifted.
    pub(crate) pinch_residue: bool,
    events: Vec<EditorEvent>,
}

impl Editor {
    pub fn new(config: EditorConfig, version: VersionId, sheet: SheetId) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, version, sheet))
    }

    pub fn with_default_config(version: VersionId, sheet: SheetId) -> Self {
        Self::build(EditorConfig::default(), version, sheet)
    }

    fn build(config: EditorConfig, version: VersionId, sheet: SheetId) -> Self {
        Self {
            metrics: config.text_metrics(),
            version,
            sheet,
            markups: MarkupCollection::new(),
            history: History::new(MarkupCollection::new(), config.history_limit),
            selection: Selection::new(),
            tool: Tool::default(),
            style: MarkupStyle::default(),
            symbol: None,
            gesture: Gesture::Idle,
            vertex_edit: false,
            viewport: Viewport::new(config.min_zoom, config.max_zoom),
            scale: None,
            pins: PinBoard::new(),
            sync: SyncQueue::new(),
            active_page: 0,
            load_state: LoadState::Loading,
            page_size: None,
            touches: BTreeMap::new(),
            touch_anchor: None,
            pinch_residue: false,
            events: Vec::new(),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Accessors

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn version(&self) -> VersionId {
        self.version
    }

    pub fn sheet(&self) -> SheetId {
        self.sheet
    }

    pub fn markups(&self) -> &MarkupCollection {
        &self.markups
    }

    pub fn markup(&self, id: MarkupId) -> Option<&Markup> {
        self.markups.get(id)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn tool_state(&self) -> ToolState {
        self.gesture.state()
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn style(&self) -> &MarkupStyle {
        &self.style
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn scale(&self) -> Option<&ScaleSystem> {
        self.scale.as_ref()
    }

    pub fn pins(&self) -> &PinBoard {
        &self.pins
    }

    pub fn sync(&self) -> &SyncQueue {
        &self.sync
    }

    /// Direct access to the outbox for hosts that drive persistence themselves.
    pub fn sync_mut(&mut self) -> &mut SyncQueue {
        &mut self.sync
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn active_page(&self) -> u32 {
        self.active_page
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn page_size(&self) -> Option<(f64, f64)> {
        self.page_size
    }

    pub fn is_vertex_editing(&self) -> bool {
        self.vertex_edit
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.sync.has_unsaved_changes()
    }

    pub fn calibration_state(&self) -> CalibrationState {
        match (&self.gesture, self.tool) {
            (Gesture::ScaleInputPending { .. }, _) => CalibrationState::ScaleInputPending,
            (
                Gesture::Placing {
                    tool: Tool::Calibrate,
                    ..
                },
                _,
            ) => CalibrationState::AwaitingSecondPoint,
            (Gesture::Idle, Tool::Calibrate) => CalibrationState::AwaitingFirstPoint,
            _ if self.scale.is_some() => CalibrationState::Calibrated,
            _ => CalibrationState::Uncalibrated,
        }
    }

    // ------------------------------------------------------------------
    // Events and settle points

    pub(crate) fn emit(&mut self, event: EditorEvent) {
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    pub(crate) fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }

    /// Screen pixels as a document length at the current zoom.
    pub(crate) fn px(&self, pixels: f64) -> f64 {
        self.viewport.px_to_document(pixels)
    }

    /// Persist everything that changed since the last snapshot and push a
    /// new one. Returns false when nothing changed.
    pub(crate) fn settle(&mut self, action: &'static str) -> bool {
        recompute_collection(&mut self.markups, self.scale.as_ref());
        let diff = self.history.current().diff(&self.markups);
        if diff.is_empty() {
            return false;
        }
        debug!(action, changes = diff.len(), "settle");
        self.sync.enqueue_diff(&diff);
        self.history.push(self.markups.clone());
        self.prune_selection();
        self.emit(EditorEvent::RenderNeeded);
        true
    }

    /// Drop selected ids that no longer exist or left the active page.
    pub(crate) fn prune_selection(&mut self) {
        let markups = &self.markups;
        let page = self.active_page;
        if self
            .selection
            .retain(|id| markups.get(id).is_some_and(|m| m.page == page))
        {
            self.emit(EditorEvent::SelectionChanged);
        }
        if self.selection.single().is_none() {
            self.vertex_edit = false;
        }
    }

    /// Abandon the gesture in progress, undoing any transient edits.
    pub(crate) fn abandon_gesture(&mut self) {
        let gesture = std::mem::take(&mut self.gesture);
        match gesture {
            Gesture::Idle => return,
            ref g if g.edits_in_place() => {
                self.markups = self.history.current().clone();
                self.prune_selection();
            }
            Gesture::DraggingPin {
                id,
                origin,
                moved: true,
            } => {
                self.pins.move_pin(id, origin.0, origin.1);
            }
            _ => {}
        }
        debug!("gesture abandoned");
        self.emit(EditorEvent::RenderNeeded);
    }

    pub fn cancel_gesture(&mut self) -> Vec<EditorEvent> {
        self.abandon_gesture();
        self.take_events()
    }

    /// Selected ids that may be mutated.
    pub(crate) fn unlocked_selection(&self) -> Vec<MarkupId> {
        self.selection
            .ids()
            .into_iter()
            .filter(|id| self.markups.get(*id).is_some_and(|m| !m.locked))
            .collect()
    }

    // ------------------------------------------------------------------
    // Tools and style

    pub fn set_tool(&mut self, tool: Tool) -> Vec<EditorEvent> {
        self.abandon_gesture();
        self.vertex_edit = false;
        if tool != Tool::Select && self.selection.clear() {
            self.emit(EditorEvent::SelectionChanged);
        }
        self.tool = tool;
        debug!(?tool, "tool changed");

        if let Tool::Draw(kind) = tool {
            if kind.is_measurement() && self.scale.is_none() {
                self.emit(EditorEvent::CalibrationNeeded);
            }
            if kind == MarkupKind::Symbol && self.symbol.is_none() {
                self.emit(EditorEvent::SymbolNeeded);
            }
        }
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    /// Style applied to markups created from now on.
    pub fn set_style(&mut self, style: MarkupStyle) {
        self.style = style;
    }

    /// The symbol placed by the symbol tool, as chosen from the palette.
    pub fn set_symbol(&mut self, symbol: SymbolRecord) {
        self.symbol = Some(symbol);
    }

    // ------------------------------------------------------------------
    // Selection

    /// Select markups programmatically. Locked and off-page ids are ignored.
    pub fn select(&mut self, ids: &[MarkupId]) -> Vec<EditorEvent> {
        let page = self.active_page;
        let markups = &self.markups;
        let valid: Vec<MarkupId> = ids
            .iter()
            .copied()
            .filter(|id| markups.get(*id).is_some_and(|m| m.page == page && !m.locked))
            .collect();
        if self.selection.set(valid) {
            self.vertex_edit = false;
            self.emit(EditorEvent::SelectionChanged);
            self.emit(EditorEvent::RenderNeeded);
        }
        self.take_events()
    }

    pub fn clear_selection(&mut self) -> Vec<EditorEvent> {
        self.vertex_edit = false;
        if self.selection.clear() {
            self.emit(EditorEvent::SelectionChanged);
            self.emit(EditorEvent::RenderNeeded);
        }
        self.take_events()
    }

    /// Enter vertex editing on the single selected markup.
    pub fn enter_vertex_edit(&mut self) -> Vec<EditorEvent> {
        let editable = self
            .selection
            .single()
            .and_then(|id| self.markups.get(id))
            .is_some_and(|m| !m.locked && m.kind.supports_vertex_edit());
        if editable && !self.vertex_edit {
            self.vertex_edit = true;
            self.emit(EditorEvent::RenderNeeded);
        }
        self.take_events()
    }

    pub fn exit_vertex_edit(&mut self) -> Vec<EditorEvent> {
        if std::mem::take(&mut self.vertex_edit) {
            self.emit(EditorEvent::RenderNeeded);
        }
        self.take_events()
    }

    /// Handles shown for the current single selection.
    pub fn active_handles(&self) -> Vec<ManipulationHandle> {
        let Some(markup) = self.selection.single().and_then(|id| self.markups.get(id)) else {
            return Vec::new();
        };
        if markup.page != self.active_page {
            return Vec::new();
        }
        let size = self.px(self.config.handle_size_px);
        if self.vertex_edit {
            vertex_handles(markup, size)
        } else {
            generate_handles(markup, size, &self.metrics)
        }
    }

    // ------------------------------------------------------------------
    // Selection operations

    pub fn align(&mut self, alignment: Alignment) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        if ids.len() < 2 {
            debug!(count = ids.len(), "align needs at least two unlocked markups");
            return self.take_events();
        }
        self.abandon_gesture();
        transform::align(&mut self.markups, &ids, alignment, &self.metrics);
        self.settle("align");
        self.take_events()
    }

    pub fn rotate_selection(&mut self, degrees: f64) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        if ids.is_empty() || degrees.rem_euclid(360.0) == 0.0 {
            return self.take_events();
        }
        self.abandon_gesture();
        transform::rotate(&mut self.markups, &ids, degrees, &self.metrics);
        self.settle("rotate");
        self.take_events()
    }

    pub fn group_selection(&mut self) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        if ids.len() < 2 {
            return self.take_events();
        }
        self.abandon_gesture();
        let group = GroupId::new_v4();
        for id in &ids {
            if let Some(markup) = self.markups.get_mut(*id) {
                markup.group_id = Some(group);
            }
        }
        self.settle("group");
        self.take_events()
    }

    pub fn ungroup_selection(&mut self) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        if ids.is_empty() {
            return self.take_events();
        }
        self.abandon_gesture();
        for id in &ids {
            if let Some(markup) = self.markups.get_mut(*id) {
                markup.group_id = None;
            }
        }
        self.markups.normalize_groups();
        self.settle("ungroup");
        self.take_events()
    }

    /// Clone the selection with an offset and select the clones.
    pub fn duplicate_selection(&mut self) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        if ids.is_empty() {
            return self.take_events();
        }
        self.abandon_gesture();
        let clones = transform::duplicate(&self.markups, &ids, self.config.duplicate_offset);
        let clone_ids: Vec<MarkupId> = clones
            .into_iter()
            .map(|clone| self.markups.insert(clone))
            .collect();
        self.selection.set(clone_ids);
        self.vertex_edit = false;
        self.emit(EditorEvent::SelectionChanged);
        self.settle("duplicate");
        self.take_events()
    }

    pub fn bring_to_front(&mut self) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        self.abandon_gesture();
        transform::bring_to_front(&mut self.markups, &ids);
        self.settle("bring_to_front");
        self.take_events()
    }

    pub fn send_to_back(&mut self) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        self.abandon_gesture();
        transform::send_to_back(&mut self.markups, &ids);
        self.settle("send_to_back");
        self.take_events()
    }

    /// Lock the selection. Locked markups stay selected until the selection
    /// changes but are ignored by every mutation.
    pub fn lock_selection(&mut self) -> Vec<EditorEvent> {
        let ids = self.selection.ids();
        self.set_locked(&ids, true)
    }

    pub fn unlock(&mut self, ids: &[MarkupId]) -> Vec<EditorEvent> {
        self.set_locked(ids, false)
    }

    pub fn unlock_selection(&mut self) -> Vec<EditorEvent> {
        let ids = self.selection.ids();
        self.set_locked(&ids, false)
    }

    fn set_locked(&mut self, ids: &[MarkupId], locked: bool) -> Vec<EditorEvent> {
        self.abandon_gesture();
        for id in ids {
            if let Some(markup) = self.markups.get_mut(*id) {
                markup.locked = locked;
            }
        }
        if locked {
            self.vertex_edit = false;
        }
        self.settle(if locked { "lock" } else { "unlock" });
        self.take_events()
    }

    pub fn delete_selection(&mut self) -> Vec<EditorEvent> {
        let ids = self.unlocked_selection();
        if ids.is_empty() {
            return self.take_events();
        }
        self.abandon_gesture();
        for id in &ids {
            self.markups.remove(*id);
        }
        self.markups.normalize_groups();
        if self.selection.clear() {
            self.emit(EditorEvent::SelectionChanged);
        }
        self.vertex_edit = false;
        self.settle("delete");
        self.take_events()
    }

    /// Apply a property-panel edit to one markup.
    pub fn update_properties(&mut self, id: MarkupId, patch: &MarkupPatch) -> Vec<EditorEvent> {
        let changed = match self.markups.get_mut(id) {
            Some(markup) if markup.locked => {
                warn!(%id, "refusing to edit a locked markup");
                false
            }
            Some(markup) => markup.apply_patch(patch),
            None => false,
        };
        if changed {
            self.settle("properties");
        }
        self.take_events()
    }

    /// Delete every unlocked markup on the active page.
    pub fn clear_page(&mut self) -> Vec<EditorEvent> {
        let page = self.active_page;
        self.clear_where(|m| m.page == page)
    }

    /// Delete every unlocked markup of the version.
    pub fn clear_all(&mut self) -> Vec<EditorEvent> {
        self.clear_where(|_| true)
    }

    fn clear_where(&mut self, mut matches: impl FnMut(&Markup) -> bool) -> Vec<EditorEvent> {
        self.abandon_gesture();
        self.markups.retain(|m| m.locked || !matches(m));
        self.markups.normalize_groups();
        self.settle("clear");
        self.take_events()
    }

    // ------------------------------------------------------------------
    // History

    pub fn undo(&mut self) -> Vec<EditorEvent> {
        self.abandon_gesture();
        if let Some(snapshot) = self.history.undo().cloned() {
            self.restore(snapshot, "undo");
        }
        self.take_events()
    }

    pub fn redo(&mut self) -> Vec<EditorEvent> {
        self.abandon_gesture();
        if let Some(snapshot) = self.history.redo().cloned() {
            self.restore(snapshot, "redo");
        }
        self.take_events()
    }

    fn restore(&mut self, snapshot: MarkupCollection, action: &'static str) {
        let diff = self.markups.diff(&snapshot);
        debug!(action, changes = diff.len(), "history restore");
        self.sync.enqueue_diff(&diff);
        self.markups = snapshot;
        self.prune_selection();
        self.emit(EditorEvent::RenderNeeded);
    }

    // ------------------------------------------------------------------
    // Text and calibration dialogs

    /// Complete the text dialog. Blank text discards the pending markup.
    pub fn submit_text(&mut self, text: &str) -> Vec<EditorEvent> {
        let Gesture::TextPending { kind, anchor } = self.gesture else {
            return self.take_events();
        };
        self.gesture = Gesture::Idle;
        if text.trim().is_empty() {
            debug!("empty text discarded");
        } else {
            self.create_markup(kind, vec![anchor], Some(text.to_owned()));
        }
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    pub fn cancel_text(&mut self) -> Vec<EditorEvent> {
        if matches!(self.gesture, Gesture::TextPending { .. }) {
            self.gesture = Gesture::Idle;
            self.emit(EditorEvent::RenderNeeded);
        }
        self.take_events()
    }

    /// Complete the scale dialog with the real length of the reference line.
    ///
    /// Invalid input leaves the dialog pending.
    pub fn submit_calibration(
        &mut self,
        real_length: &str,
        unit: &str,
    ) -> Result<Vec<EditorEvent>, CalibrationError> {
        let Gesture::ScaleInputPending { start, end } = self.gesture else {
            return Err(CalibrationError::NotPending);
        };
        let scale = ScaleSystem::two_point(start, end, real_length, unit).map_err(|error| {
            warn!(%error, "calibration input rejected");
            error
        })?;
        self.gesture = Gesture::Idle;
        self.apply_scale(scale);
        Ok(self.take_events())
    }

    pub fn cancel_calibration(&mut self) -> Vec<EditorEvent> {
        if matches!(
            self.gesture,
            Gesture::ScaleInputPending { .. }
                | Gesture::Placing {
                    tool: Tool::Calibrate,
                    ..
                }
        ) {
            self.gesture = Gesture::Idle;
            self.emit(EditorEvent::RenderNeeded);
        }
        self.take_events()
    }

    /// Set the scale directly, as from a known drawing scale.
    pub fn set_scale(&mut self, scale: ScaleSystem) -> Vec<EditorEvent> {
        self.abandon_gesture();
        self.apply_scale(scale);
        self.take_events()
    }

    /// Store a new scale and recompute every measurement under it.
    ///
    /// Snapshots are rewritten too, so undo never brings back values from an
    /// older calibration. No history entry is pushed.
    fn apply_scale(&mut self, scale: ScaleSystem) {
        info!(scale = scale.scale(), unit = scale.unit(), "calibrated");
        self.sync.enqueue(PersistOp::SaveScale(scale.to_record()));

        let before = self.markups.clone();
        recompute_collection(&mut self.markups, Some(&scale));
        self.history.rewrite(|snapshot| {
            recompute_collection(snapshot, Some(&scale));
        });
        let diff = before.diff(&self.markups);
        if !diff.is_empty() {
            info!(count = diff.len(), "measurements recomputed");
            self.sync.enqueue_diff(&diff);
        }

        self.scale = Some(scale);
        self.emit(EditorEvent::RenderNeeded);
    }

    // ------------------------------------------------------------------
    // Creation

    /// Build, measure, insert and persist a new markup.
    pub(crate) fn create_markup(
        &mut self,
        kind: MarkupKind,
        points: Vec<Point>,
        text: Option<String>,
    ) -> Option<MarkupId> {
        let Some(geometry) = MarkupGeometry::from_points(kind, points) else {
            debug!(?kind, "too few points, markup discarded");
            return None;
        };
        let mut style = self.style.clone();
        if kind == MarkupKind::Highlighter {
            style.stroke_width *= self.config.highlighter_width_factor;
            style.opacity = Some(self.config.highlighter_opacity);
        }

        let mut markup = Markup::new(kind, self.active_page, geometry, style);
        markup.text = text;
        if kind == MarkupKind::Symbol {
            let Some(mut symbol) = self.symbol.clone() else {
                self.emit(EditorEvent::SymbolNeeded);
                return None;
            };
            symbol.size = self.config.symbol_size;
            markup.symbol = Some(symbol);
        }
        if (kind.is_measurement() || kind == MarkupKind::Dimension) && self.scale.is_none() {
            self.emit(EditorEvent::CalibrationNeeded);
        }

        let id = self.markups.insert(markup);
        debug!(%id, ?kind, "markup created");
        self.settle("create");
        Some(id)
    }

    // ------------------------------------------------------------------
    // Persistence

    /// Replace all state with persisted records.
    ///
    /// Invalid records are skipped. Records without a z-index stack in load
    /// order.
    pub fn hydrate(&mut self, records: &[MarkupRecord], scale: Option<&ScaleRecord>) -> Vec<EditorEvent> {
        self.abandon_gesture();
        let mut markups = Vec::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            match Markup::from_record(record) {
                Ok(mut markup) => {
                    if record.z_index.is_none() {
                        markup.z_index = position as i64;
                    }
                    markups.push(markup);
                }
                Err(error) => warn!(id = %record.id, %error, "skipping invalid markup record"),
            }
        }
        info!(
            loaded = markups.len(),
            skipped = records.len() - markups.len(),
            "markups hydrated"
        );

        self.markups = MarkupCollection::from_markups(markups);
        self.history.reset(self.markups.clone());
        self.scale = scale.and_then(ScaleSystem::from_record);
        self.vertex_edit = false;
        if self.selection.clear() {
            self.emit(EditorEvent::SelectionChanged);
        }
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    pub fn hydrate_pins(&mut self, records: &[PhotoPinRecord]) -> Vec<EditorEvent> {
        self.pins.replace_all(records);
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    /// Load markups, scale and pins from a repository.
    pub fn load_from(&mut self, repository: &dyn MarkupRepository) -> Result<Vec<EditorEvent>, RepositoryError> {
        let records = repository.load_markups(self.version)?;
        let scale = repository.load_scale(self.version)?;
        let pins = repository.load_photo_pins(self.sheet)?;
        let mut events = self.hydrate(&records, scale.as_ref());
        events.extend(self.hydrate_pins(&pins));
        events.dedup();
        Ok(events)
    }

    /// Execute queued persistence work against `repository`.
    ///
    /// Failed markup and scale writes stay queued for [`Editor::retry_failed`].
    /// Failed pin moves are reverted by refetching the sheet's pins, falling
    /// back to the last known-good position.
    pub fn flush(&mut self, repository: &mut dyn MarkupRepository) -> Vec<EditorEvent> {
        let report = self.sync.flush(repository, self.version, self.sheet);
        if !report.pin_reverts.is_empty() {
            match repository.load_photo_pins(self.sheet) {
                Ok(records) => self.pins.replace_all(&records),
                Err(error) => {
                    warn!(%error, "pin refetch failed, restoring previous positions");
                    for revert in &report.pin_reverts {
                        self.revert_pin(*revert);
                    }
                }
            }
            self.emit(EditorEvent::Notice("Pin position could not be saved".to_owned()));
            self.emit(EditorEvent::RenderNeeded);
        }
        if !report.failed.is_empty() {
            self.emit(EditorEvent::Notice(format!(
                "{} change(s) could not be saved",
                report.failed.len()
            )));
        }
        self.take_events()
    }

    /// Report a failure for an operation handed out by [`SyncQueue::take_pending`].
    pub fn report_sync_failure(&mut self, seq: u64, error: &RepositoryError) -> Vec<EditorEvent> {
        match self.sync.report_failure(seq, error.to_string()) {
            Some(revert) => {
                self.revert_pin(revert);
                self.emit(EditorEvent::Notice("Pin position could not be saved".to_owned()));
                self.emit(EditorEvent::RenderNeeded);
            }
            None => self.emit(EditorEvent::Notice("A change could not be saved".to_owned())),
        }
        self.take_events()
    }

    fn revert_pin(&mut self, revert: PinRevert) {
        self.pins.move_pin(revert.id, revert.x, revert.y);
    }

    /// Queue every parked failure again.
    pub fn retry_failed(&mut self) -> usize {
        self.sync.retry_failed()
    }

    // ------------------------------------------------------------------
    // Page lifecycle and viewport

    /// Switch pages. Input is ignored until [`Editor::page_ready`].
    pub fn set_active_page(&mut self, page: u32) -> Vec<EditorEvent> {
        self.abandon_gesture();
        self.active_page = page;
        self.vertex_edit = false;
        if self.selection.clear() {
            self.emit(EditorEvent::SelectionChanged);
        }
        self.page_size = None;
        self.set_load_state(LoadState::Loading);
        self.take_events()
    }

    /// The page bitmap decoded; fit it and enable input.
    pub fn page_ready(&mut self, width: f64, height: f64) -> Vec<EditorEvent> {
        self.page_size = Some((width, height));
        self.viewport.fit_page(
            width,
            height,
            self.config.fit_margin,
            self.config.fit_caps_at_native,
        );
        self.set_load_state(LoadState::Ready);
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    pub fn page_failed(&mut self, message: impl Into<String>) -> Vec<EditorEvent> {
        let message = message.into();
        warn!(page = self.active_page, %message, "page failed to load");
        self.abandon_gesture();
        self.set_load_state(LoadState::Failed(message));
        self.take_events()
    }

    /// Go back to loading after a failure. The host refetches the page.
    pub fn retry_page_load(&mut self) -> Vec<EditorEvent> {
        if matches!(self.load_state, LoadState::Failed(_)) {
            self.set_load_state(LoadState::Loading);
        }
        self.take_events()
    }

    fn set_load_state(&mut self, state: LoadState) {
        if self.load_state != state {
            self.load_state = state.clone();
            self.emit(EditorEvent::LoadStateChanged(state));
        }
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) -> Vec<EditorEvent> {
        self.viewport.set_size(width, height);
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    pub fn fit_page(&mut self) -> Vec<EditorEvent> {
        if let Some((width, height)) = self.page_size {
            self.viewport.fit_page(
                width,
                height,
                self.config.fit_margin,
                self.config.fit_caps_at_native,
            );
            self.emit(EditorEvent::RenderNeeded);
        }
        self.take_events()
    }

    /// Anchored zoom about a screen point.
    pub fn zoom_at(&mut self, zoom: f64, anchor: Point) -> Vec<EditorEvent> {
        self.viewport.zoom_at(zoom, anchor);
        self.emit(EditorEvent::RenderNeeded);
        self.take_events()
    }

    // ------------------------------------------------------------------
    // Rendering

    /// Everything to draw for the active page.
    pub fn scene(&self) -> Scene {
        let px = self.px(1.0);
        let mut items = Vec::new();

        for markup in self.markups.paint_order(self.active_page) {
            items.extend(render::markup_items(markup, &self.config, Layer::Markup));
        }
        if let Some(page_size) = self.page_size {
            let visible = self.pins.visible_pins(self.config.pin_collision_tolerance);
            items.extend(render::pin_items(
                &visible,
                page_size,
                self.px(self.config.pin_radius_px),
            ));
        }
        items.extend(render::gesture_preview(
            &self.gesture,
            &self.style,
            &self.config,
            self.active_page,
            px,
        ));
        for id in self.selection.ids() {
            if let Some(markup) = self.markups.get(id).filter(|m| m.page == self.active_page) {
                items.push(render::selection_outline(markup, &self.config, px));
            }
        }
        items.extend(render::handle_items(&self.active_handles()));

        Scene {
            page: self.active_page,
            zoom: self.viewport.zoom(),
            pan: self.viewport.pan(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> Editor {
        let mut editor = Editor::with_default_config(VersionId::random(), SheetId::random());
        editor.set_viewport_size(1000.0, 1000.0);
        editor.page_ready(1000.0, 1000.0);
        editor
    }

    fn add_rect(editor: &mut Editor, x: f64) -> MarkupId {
        let id = editor.markups.insert(Markup::new(
            MarkupKind::Rectangle,
            0,
            MarkupGeometry::Corners {
                start: Point::new(x, 0.0),
                end: Point::new(x + 10.0, 10.0),
            },
            MarkupStyle::default(),
        ));
        editor.settle("test");
        id
    }

    #[test]
    fn test_settle_enqueues_and_pushes() {
        let mut editor = editor();
        add_rect(&mut editor, 0.0);
        assert!(editor.can_undo());
        assert_eq!(editor.sync.pending_count(), 1);
        assert!(!editor.settle("noop"));
    }

    #[test]
    fn test_undo_enqueues_inverse_diff() {
        let mut editor = editor();
        let id = add_rect(&mut editor, 0.0);
        editor.sync.take_pending();

        editor.undo();
        assert!(editor.markups.is_empty());
        let ops = editor.sync.take_pending();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, PersistOp::Delete(id));

        editor.redo();
        assert!(editor.markups.contains(id));
    }

    #[test]
    fn test_locked_markups_survive_clear() {
        let mut editor = editor();
        let a = add_rect(&mut editor, 0.0);
        let b = add_rect(&mut editor, 20.0);
        editor.select(&[a]);
        editor.lock_selection();

        editor.clear_page();
        assert!(editor.markups.contains(a));
        assert!(!editor.markups.contains(b));
    }

    #[test]
    fn test_select_skips_locked() {
        let mut editor = editor();
        let a = add_rect(&mut editor, 0.0);
        editor.markups.get_mut(a).unwrap().locked = true;
        editor.settle("lock");
        editor.take_events();

        let events = editor.select(&[a]);
        assert!(events.is_empty());
        assert!(editor.selection.is_empty());
    }

    #[test]
    fn test_update_properties_is_undoable() {
        let mut editor = editor();
        let id = add_rect(&mut editor, 0.0);
        let patch = MarkupPatch {
            stroke_color: Some("#00FF00".into()),
            ..MarkupPatch::default()
        };
        editor.update_properties(id, &patch);
        assert_eq!(editor.markup(id).unwrap().style.stroke_color, "#00FF00");

        editor.undo();
        assert_eq!(editor.markup(id).unwrap().style.stroke_color, "#E53935");
    }

    #[test]
    fn test_duplicate_selects_clones() {
        let mut editor = editor();
        let id = add_rect(&mut editor, 0.0);
        editor.select(&[id]);
        editor.duplicate_selection();

        assert_eq!(editor.markups.len(), 2);
        assert!(!editor.selection.contains(id));
        assert_eq!(editor.selection.len(), 1);
    }

    #[test]
    fn test_page_lifecycle_events() {
        let mut editor = Editor::with_default_config(VersionId::random(), SheetId::random());
        let events = editor.page_failed("decode error");
        assert_eq!(
            events,
            vec![EditorEvent::LoadStateChanged(LoadState::Failed("decode error".into()))]
        );
        let events = editor.retry_page_load();
        assert_eq!(events, vec![EditorEvent::LoadStateChanged(LoadState::Loading)]);
        editor.page_ready(100.0, 100.0);
        assert_eq!(editor.load_state(), &LoadState::Ready);
    }

    #[test]
    fn test_calibration_requires_pending_dialog() {
        let mut editor = editor();
        assert_eq!(
            editor.submit_calibration("10", "m"),
            Err(CalibrationError::NotPending)
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EditorConfig {
            history_limit: 0,
            ..EditorConfig::default()
        };
        assert!(Editor::new(config, VersionId::random(), SheetId::random()).is_err());
    }
}
