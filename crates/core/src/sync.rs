//! Sync queue
//!
//! The optimistic outbox between the in-memory editor state and a
//! [`MarkupRepository`]. Edits are applied locally first; every settle point
//! enqueues the matching persistence work here. Failures of markup and scale
//! writes are parked for retry, failed pin moves hand back the position to
//! revert to.

use crate::collection::CollectionDiff;
use sheetmark_model::{
    MarkupId, MarkupRecord, MarkupRepository, PinId, RepositoryError, ScaleRecord, SheetId,
    VersionId,
};
use std::collections::VecDeque;

/// One unit of persistence work.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    Create(MarkupRecord),
    Update(MarkupRecord),
    Delete(MarkupId),
    SaveScale(ScaleRecord),
    UpdatePin {
        id: PinId,
        x: f64,
        y: f64,
        /// Last known-good position.
        previous: (f64, f64),
    },
}

impl PersistOp {
    pub fn markup_id(&self) -> Option<MarkupId> {
        match self {
            PersistOp::Create(record) | PersistOp::Update(record) => Some(record.id),
            PersistOp::Delete(id) => Some(*id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PersistOp::Create(_) => "create",
            PersistOp::Update(_) => "update",
            PersistOp::Delete(_) => "delete",
            PersistOp::SaveScale(_) => "save_scale",
            PersistOp::UpdatePin { .. } => "update_pin",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp {
    pub seq: u64,
    pub op: PersistOp,
}

/// A write that failed and waits for [`SyncQueue::retry_failed`].
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOp {
    pub pending: PendingOp,
    pub error: String,
}

/// Pin position to restore after a failed move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinRevert {
    pub id: PinId,
    pub x: f64,
    pub y: f64,
}

/// Outcome of [`SyncQueue::flush`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    pub succeeded: usize,
    pub failed: Vec<FailedOp>,
    pub pin_reverts: Vec<PinRevert>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.pin_reverts.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct SyncQueue {
    next_seq: u64,
    pending: VecDeque<PendingOp>,
    in_flight: Vec<PendingOp>,
    failed: Vec<FailedOp>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an operation and return its sequence number.
    ///
    /// Work that has not been handed out yet is coalesced: a later update
    /// replaces an earlier pending create/update of the same markup, and a
    /// delete cancels a pending create outright.
    ///
    /// Parked failures for the same markup are superseded the same way, so a
    /// retry never replays a write older than what the backend already has.
    pub fn enqueue(&mut self, op: PersistOp) -> u64 {
        if let Some(seq) = self.supersede_parked(&op) {
            return seq;
        }
        match &op {
            PersistOp::Update(record) => {
                if let Some(slot) = self.pending.iter_mut().find(|p| {
                    matches!(&p.op, PersistOp::Create(r) | PersistOp::Update(r) if r.id == record.id)
                }) {
                    match &mut slot.op {
                        PersistOp::Create(r) | PersistOp::Update(r) => *r = record.clone(),
                        _ => {}
                    }
                    return slot.seq;
                }
            }
            PersistOp::Delete(id) => {
                let created_here = self
                    .pending
                    .iter()
                    .any(|p| matches!(&p.op, PersistOp::Create(r) if r.id == *id));
                self.pending.retain(|p| p.op.markup_id() != Some(*id));
                if created_here {
                    return self.bump();
                }
            }
            PersistOp::SaveScale(scale) => {
                if let Some(slot) = self
                    .pending
                    .iter_mut()
                    .find(|p| matches!(p.op, PersistOp::SaveScale(_)))
                {
                    slot.op = PersistOp::SaveScale(scale.clone());
                    return slot.seq;
                }
            }
            PersistOp::UpdatePin { id, x, y, .. } => {
                if let Some(slot) = self
                    .pending
                    .iter_mut()
                    .find(|p| matches!(p.op, PersistOp::UpdatePin { id: pin, .. } if pin == *id))
                {
                    if let PersistOp::UpdatePin { x: px, y: py, .. } = &mut slot.op {
                        *px = *x;
                        *py = *y;
                    }
                    return slot.seq;
                }
            }
            PersistOp::Create(_) => {}
        }

        let seq = self.bump();
        self.pending.push_back(PendingOp { seq, op });
        seq
    }

    /// Reconcile parked failures with a newer operation on the same markup.
    ///
    /// Returns a sequence number when the new operation has been fully
    /// absorbed and must not be queued.
    fn supersede_parked(&mut self, op: &PersistOp) -> Option<u64> {
        let id = op.markup_id()?;
        let index = self
            .failed
            .iter()
            .position(|f| f.pending.op.markup_id() == Some(id))?;

        let parked_create = matches!(self.failed[index].pending.op, PersistOp::Create(_));
        match op {
            // The backend never saw the markup: the create stays parked and
            // carries the newest record.
            PersistOp::Update(record) if parked_create => {
                let parked = &mut self.failed[index].pending;
                parked.op = PersistOp::Create(record.clone());
                Some(parked.seq)
            }
            PersistOp::Delete(_) if parked_create => {
                self.failed.remove(index);
                tracing::debug!(%id, "parked create dropped by delete");
                Some(self.bump())
            }
            _ => {
                let dropped = self.failed.remove(index);
                tracing::debug!(%id, op = dropped.pending.op.name(), "parked write superseded");
                None
            }
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Queue the persistence work that turns the backend's copy into the
    /// diff's target collection.
    pub fn enqueue_diff(&mut self, diff: &CollectionDiff) -> usize {
        for markup in &diff.created {
            self.enqueue(PersistOp::Create(markup.to_record()));
        }
        for markup in &diff.updated {
            self.enqueue(PersistOp::Update(markup.to_record()));
        }
        for id in &diff.deleted {
            self.enqueue(PersistOp::Delete(*id));
        }
        diff.len()
    }

    /// Hand out every pending operation in order, marking it in flight.
    pub fn take_pending(&mut self) -> Vec<PendingOp> {
        let taken: Vec<PendingOp> = self.pending.drain(..).collect();
        self.in_flight.extend(taken.iter().cloned());
        taken
    }

    /// Mark an in-flight operation as persisted.
    pub fn acknowledge(&mut self, seq: u64) -> bool {
        let before = self.in_flight.len();
        self.in_flight.retain(|p| p.seq != seq);
        self.in_flight.len() != before
    }

    /// Record a failed in-flight operation.
    ///
    /// Pin moves are not retried; their previous position is returned so the
    /// caller can revert. Everything else is parked for retry.
    pub fn report_failure(&mut self, seq: u64, error: impl Into<String>) -> Option<PinRevert> {
        let index = self.in_flight.iter().position(|p| p.seq == seq)?;
        let pending = self.in_flight.remove(index);
        let error = error.into();
        tracing::warn!(seq, op = pending.op.name(), %error, "persistence failed");

        if let Some(id) = pending.op.markup_id() {
            if self.absorbed_by_newer(&pending, id) {
                return None;
            }
        }

        if let PersistOp::UpdatePin { id, previous, .. } = pending.op {
            return Some(PinRevert {
                id,
                x: previous.0,
                y: previous.1,
            });
        }
        self.failed.push(FailedOp { pending, error });
        None
    }

    /// Whether a newer queued or in-flight write for `id` makes the failed
    /// one obsolete. A failed create turns the next update into a create.
    fn absorbed_by_newer(&mut self, failed: &PendingOp, id: MarkupId) -> bool {
        let newer = self
            .pending
            .iter_mut()
            .chain(self.in_flight.iter_mut())
            .filter(|p| p.seq > failed.seq && p.op.markup_id() == Some(id))
            .min_by_key(|p| p.seq);
        let Some(newer) = newer else {
            return false;
        };
        if let (PersistOp::Create(_), PersistOp::Update(record)) = (&failed.op, &newer.op) {
            newer.op = PersistOp::Create(record.clone());
        }
        tracing::debug!(%id, seq = failed.seq, "failed write superseded by newer one");
        true
    }

    /// Move parked failures back into the pending queue, oldest first.
    pub fn retry_failed(&mut self) -> usize {
        let count = self.failed.len();
        for failed in self.failed.drain(..) {
            self.pending.push_back(failed.pending);
        }
        self.pending.make_contiguous().sort_by_key(|p| p.seq);
        count
    }

    fn is_parked(&self, seq: u64) -> bool {
        self.failed.iter().any(|f| f.pending.seq == seq)
    }

    pub fn failures(&self) -> &[FailedOp] {
        &self.failed
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingOp> {
        self.pending.iter()
    }

    /// Whether anything has not been confirmed by the backend.
    pub fn has_unsaved_changes(&self) -> bool {
        !self.pending.is_empty() || !self.in_flight.is_empty() || !self.failed.is_empty()
    }

    /// Execute every pending operation against `repository`, in order.
    pub fn flush(
        &mut self,
        repository: &mut dyn MarkupRepository,
        version: VersionId,
        sheet: SheetId,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        for pending in self.take_pending() {
            match execute(&pending.op, repository, version, sheet) {
                Ok(()) => {
                    self.acknowledge(pending.seq);
                    report.succeeded += 1;
                }
                Err(error) => {
                    let message = error.to_string();
                    match self.report_failure(pending.seq, message.clone()) {
                        Some(revert) => report.pin_reverts.push(revert),
                        None if self.is_parked(pending.seq) => report.failed.push(FailedOp {
                            pending,
                            error: message,
                        }),
                        None => {}
                    }
                }
            }
        }
        report
    }
}

/// Run one operation against the repository.
pub fn execute(
    op: &PersistOp,
    repository: &mut dyn MarkupRepository,
    version: VersionId,
    sheet: SheetId,
) -> Result<(), RepositoryError> {
    match op {
        PersistOp::Create(record) => repository.create_markup(version, record),
        PersistOp::Update(record) => repository.update_markup(version, record),
        PersistOp::Delete(id) => repository.delete_markup(version, *id),
        PersistOp::SaveScale(scale) => repository.save_scale(version, scale),
        PersistOp::UpdatePin { id, x, y, .. } => {
            repository.update_photo_pin_position(sheet, *id, *x, *y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetmark_model::MarkupKind;

    fn record(id: MarkupId, color: &str) -> MarkupRecord {
        MarkupRecord {
            id,
            kind: MarkupKind::Line,
            color: color.to_owned(),
            stroke_width: 2.0,
            points: vec![[0.0, 0.0], [10.0, 0.0]],
            page: 0,
            text: None,
            rotation: None,
            group_id: None,
            opacity: None,
            fill_color: None,
            fill_opacity: None,
            font_size: None,
            text_align: None,
            symbol: None,
            measurement: None,
            locked: false,
            z_index: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_update_coalesces_into_pending_create() {
        let id = MarkupId::new_v4();
        let mut queue = SyncQueue::new();
        let seq = queue.enqueue(PersistOp::Create(record(id, "#000")));
        assert_eq!(queue.enqueue(PersistOp::Update(record(id, "#fff"))), seq);

        let ops = queue.take_pending();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, PersistOp::Create(record(id, "#fff")));
    }

    #[test]
    fn test_delete_cancels_pending_create() {
        let id = MarkupId::new_v4();
        let mut queue = SyncQueue::new();
        queue.enqueue(PersistOp::Create(record(id, "#000")));
        queue.enqueue(PersistOp::Delete(id));
        assert_eq!(queue.pending_count(), 0);
        assert!(!queue.has_unsaved_changes());
    }

    #[test]
    fn test_delete_after_handed_out_create_is_kept() {
        let id = MarkupId::new_v4();
        let mut queue = SyncQueue::new();
        queue.enqueue(PersistOp::Create(record(id, "#000")));
        let taken = queue.take_pending();
        queue.enqueue(PersistOp::Delete(id));

        assert!(queue.acknowledge(taken[0].seq));
        assert_eq!(queue.take_pending()[0].op, PersistOp::Delete(id));
    }

    #[test]
    fn test_failures_park_for_retry() {
        let mut queue = SyncQueue::new();
        let first = queue.enqueue(PersistOp::Delete(MarkupId::new_v4()));
        let second = queue.enqueue(PersistOp::Delete(MarkupId::new_v4()));
        queue.take_pending();

        assert_eq!(queue.report_failure(second, "offline"), None);
        assert_eq!(queue.report_failure(first, "offline"), None);
        assert_eq!(queue.failed_count(), 2);
        assert!(queue.has_unsaved_changes());

        assert_eq!(queue.retry_failed(), 2);
        let seqs: Vec<u64> = queue.take_pending().iter().map(|p| p.seq).collect();
        assert_eq!(seqs, vec![first, second]);
    }

    #[test]
    fn test_newer_update_supersedes_parked_update() {
        let id = MarkupId::new_v4();
        let mut queue = SyncQueue::new();
        let stale = queue.enqueue(PersistOp::Update(record(id, "#AAAAAA")));
        queue.take_pending();
        queue.report_failure(stale, "offline");
        assert_eq!(queue.failed_count(), 1);

        queue.enqueue(PersistOp::Update(record(id, "#BBBBBB")));
        assert_eq!(queue.failed_count(), 0);
        assert_eq!(queue.retry_failed(), 0);

        let ops = queue.take_pending();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, PersistOp::Update(record(id, "#BBBBBB")));
    }

    #[test]
    fn test_delete_drops_parked_create() {
        let id = MarkupId::new_v4();
        let mut queue = SyncQueue::new();
        let create = queue.enqueue(PersistOp::Create(record(id, "#000")));
        queue.take_pending();
        queue.report_failure(create, "offline");

        queue.enqueue(PersistOp::Delete(id));
        assert_eq!(queue.failed_count(), 0);
        assert_eq!(queue.pending_count(), 0);
        assert!(!queue.has_unsaved_changes());
    }

    #[test]
    fn test_update_folds_into_parked_create() {
        let id = MarkupId::new_v4();
        let mut queue = SyncQueue::new();
        let create = queue.enqueue(PersistOp::Create(record(id, "#000")));
        queue.take_pending();
        queue.report_failure(create, "offline");

        assert_eq!(queue.enqueue(PersistOp::Update(record(id, "#fff"))), create);
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.retry_failed(), 1);
        assert_eq!(queue.take_pending()[0].op, PersistOp::Create(record(id, "#fff")));
    }

    #[test]
    fn test_failure_behind_newer_in_flight_write_is_not_parked() {
        let id = MarkupId::new_v4();
        let mut queue = SyncQueue::new();
        let create = queue.enqueue(PersistOp::Create(record(id, "#000")));
        queue.take_pending();
        let update = queue.enqueue(PersistOp::Update(record(id, "#fff")));
        queue.take_pending();

        assert_eq!(queue.report_failure(create, "offline"), None);
        assert_eq!(queue.failed_count(), 0);

        // The update now has to create the markup itself.
        queue.report_failure(update, "offline");
        assert_eq!(queue.retry_failed(), 1);
        assert_eq!(queue.take_pending()[0].op, PersistOp::Create(record(id, "#fff")));
    }

    #[test]
    fn test_retry_never_replays_stale_writes() {
        use sheetmark_storage::MemoryRepository;

        let version = VersionId::random();
        let sheet = SheetId::random();
        let updated = MarkupId::new_v4();
        let mut repo =
            MemoryRepository::new().with_markups(version, vec![record(updated, "#000000")]);
        let mut queue = SyncQueue::new();

        repo.fail_next_writes(1);
        queue.enqueue(PersistOp::Update(record(updated, "#AAAAAA")));
        assert_eq!(queue.flush(&mut repo, version, sheet).failed.len(), 1);
        queue.enqueue(PersistOp::Update(record(updated, "#BBBBBB")));
        assert!(queue.flush(&mut repo, version, sheet).is_clean());

        let removed = MarkupId::new_v4();
        repo.fail_next_writes(1);
        queue.enqueue(PersistOp::Create(record(removed, "#000000")));
        assert_eq!(queue.flush(&mut repo, version, sheet).failed.len(), 1);
        queue.enqueue(PersistOp::Delete(removed));
        assert!(queue.flush(&mut repo, version, sheet).is_clean());

        queue.retry_failed();
        assert!(queue.flush(&mut repo, version, sheet).is_clean());
        assert_eq!(
            repo.markup(version, updated).map(|r| r.color.as_str()),
            Some("#BBBBBB")
        );
        assert!(repo.markup(version, removed).is_none());
        assert_eq!(repo.markups(version).len(), 1);
        assert!(!queue.has_unsaved_changes());
    }

    #[test]
    fn test_pin_failure_returns_revert() {
        let pin = PinId::new_v4();
        let mut queue = SyncQueue::new();
        let seq = queue.enqueue(PersistOp::UpdatePin {
            id: pin,
            x: 0.7,
            y: 0.7,
            previous: (0.2, 0.3),
        });
        queue.take_pending();

        let revert = queue.report_failure(seq, "offline");
        assert_eq!(
            revert,
            Some(PinRevert {
                id: pin,
                x: 0.2,
                y: 0.3
            })
        );
        assert_eq!(queue.failed_count(), 0);
    }
}
