//! Snapshot undo/redo history
//!
//! A linear list of full-collection snapshots with a cursor. Pushing
//! truncates the redo tail; the oldest snapshots fall off past the limit.

use crate::collection::MarkupCollection;

#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<MarkupCollection>,
    cursor: usize,
    limit: usize,
}

impl History {
    /// `limit` counts undo steps; the baseline snapshot is kept on top of it.
    pub fn new(baseline: MarkupCollection, limit: usize) -> Self {
        Self {
            snapshots: vec![baseline],
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Drop all history and start over from `baseline`.
    pub fn reset(&mut self, baseline: MarkupCollection) {
        self.snapshots = vec![baseline];
        self.cursor = 0;
    }

    /// Snapshot at the cursor.
    pub fn current(&self) -> &MarkupCollection {
        &self.snapshots[self.cursor]
    }

    pub fn push(&mut self, snapshot: MarkupCollection) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        if self.snapshots.len() > self.limit + 1 {
            let excess = self.snapshots.len() - (self.limit + 1);
            self.snapshots.drain(..excess);
        }
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn undo(&mut self) -> Option<&MarkupCollection> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.snapshots[self.cursor])
    }

    pub fn redo(&mut self) -> Option<&MarkupCollection> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(&self.snapshots[self.cursor])
    }

    /// Number of undo steps available.
    pub fn undo_depth(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Apply `f` to every snapshot, for derived data that must stay
    /// consistent across history (recomputed measurements).
    pub fn rewrite(&mut self, mut f: impl FnMut(&mut MarkupCollection)) {
        for snapshot in self.snapshots.iter_mut() {
            f(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::markup::{Markup, MarkupGeometry, MarkupStyle};
    use sheetmark_model::MarkupKind;

    fn dot(x: f64) -> Markup {
        Markup::new(
            MarkupKind::Text,
            0,
            MarkupGeometry::Anchor {
                position: Point::new(x, 0.0),
            },
            MarkupStyle::default(),
        )
    }

    fn with(markups: &[&Markup]) -> MarkupCollection {
        let mut collection = MarkupCollection::new();
        for markup in markups {
            collection.insert((*markup).clone());
        }
        collection
    }

    #[test]
    fn test_undo_redo_walks_snapshots() {
        let a = dot(1.0);
        let b = dot(2.0);
        let mut history = History::new(MarkupCollection::new(), 10);
        history.push(with(&[&a]));
        history.push(with(&[&a, &b]));

        assert_eq!(history.undo().map(MarkupCollection::len), Some(1));
        assert_eq!(history.undo().map(MarkupCollection::len), Some(0));
        assert!(history.undo().is_none());
        assert_eq!(history.redo().map(MarkupCollection::len), Some(1));
        assert_eq!(history.redo().map(MarkupCollection::len), Some(2));
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let a = dot(1.0);
        let mut history = History::new(MarkupCollection::new(), 10);
        history.push(with(&[&a]));
        history.undo();
        assert!(history.can_redo());

        history.push(with(&[&dot(5.0)]));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(MarkupCollection::new(), 2);
        for i in 0..5 {
            history.push(with(&[&dot(i as f64)]));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.undo_depth(), 2);
        history.undo();
        history.undo();
        assert!(!history.can_undo());
        assert_eq!(history.current().len(), 1);
    }

    #[test]
    fn test_rewrite_touches_every_snapshot() {
        let mut history = History::new(with(&[&dot(1.0)]), 10);
        history.push(with(&[&dot(2.0)]));
        history.rewrite(|snapshot| snapshot.retain(|_| false));
        assert!(history.current().is_empty());
        assert!(history.undo().is_some_and(MarkupCollection::is_empty));
    }
}
