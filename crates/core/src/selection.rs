//! Selection set and selection rules

use crate::collection::MarkupCollection;
use crate::config::TextMetrics;
use crate::geometry::{Bounds, Point};
use sheetmark_model::MarkupId;
use std::collections::BTreeSet;

/// Currently selected markup ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: BTreeSet<MarkupId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: MarkupId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> Vec<MarkupId> {
        self.ids.iter().copied().collect()
    }

    /// The only selected id, when exactly one is selected.
    pub fn single(&self) -> Option<MarkupId> {
        if self.ids.len() == 1 {
            self.ids.iter().next().copied()
        } else {
            None
        }
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.ids.is_empty();
        self.ids.clear();
        changed
    }

    /// Replace the selection. Returns true when it changed.
    pub fn set(&mut self, ids: impl IntoIterator<Item = MarkupId>) -> bool {
        let next: BTreeSet<MarkupId> = ids.into_iter().collect();
        let changed = next != self.ids;
        self.ids = next;
        changed
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = MarkupId>) -> bool {
        let before = self.ids.len();
        self.ids.extend(ids);
        self.ids.len() != before
    }

    /// Toggle a set of ids as a unit: remove all if all are selected, else add all.
    pub fn toggle(&mut self, ids: &[MarkupId]) {
        if !ids.is_empty() && ids.iter().all(|id| self.ids.contains(id)) {
            for id in ids {
                self.ids.remove(id);
            }
        } else {
            self.ids.extend(ids.iter().copied());
        }
    }

    /// Drop ids that no longer satisfy `keep`. Returns true when any were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(MarkupId) -> bool) -> bool {
        let before = self.ids.len();
        self.ids.retain(|id| keep(*id));
        self.ids.len() != before
    }
}

/// Expand a hit markup to its full unlocked group.
pub fn expand_group(collection: &MarkupCollection, id: MarkupId) -> Vec<MarkupId> {
    let Some(markup) = collection.get(id) else {
        return Vec::new();
    };
    match markup.group_id {
        Some(group) => collection
            .group_members(group)
            .into_iter()
            .filter(|member| collection.get(*member).is_some_and(|m| !m.locked))
            .collect(),
        None => vec![id],
    }
}

/// Apply a click on `hit` to the selection.
///
/// A plain click replaces the selection with the hit (group-expanded), a
/// shift click toggles it, and a plain click on empty canvas clears.
/// Returns true when the selection changed.
pub fn click_select(
    selection: &mut Selection,
    collection: &MarkupCollection,
    hit: Option<MarkupId>,
    toggle: bool,
) -> bool {
    match (hit, toggle) {
        (Some(id), false) => selection.set(expand_group(collection, id)),
        (Some(id), true) => {
            let before = selection.clone();
            selection.toggle(&expand_group(collection, id));
            *selection != before
        }
        (None, false) => selection.clear(),
        (None, true) => false,
    }
}

/// Markups selected by a drag box between two document points.
///
/// Full bounding-box containment applies to mouse and touch alike; group
/// members pull in the rest of their group.
pub fn box_select(
    collection: &MarkupCollection,
    page: u32,
    from: Point,
    to: Point,
    metrics: &TextMetrics,
) -> Vec<MarkupId> {
    let area = Bounds::from_corners(from, to);
    let mut picked: BTreeSet<MarkupId> = BTreeSet::new();
    for id in collection.contained_in(page, &area, metrics) {
        picked.extend(expand_group(collection, id));
    }
    picked.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{Markup, MarkupGeometry, MarkupStyle};
    use sheetmark_model::{GroupId, MarkupKind};

    fn line(x: f64) -> Markup {
        Markup::new(
            MarkupKind::Line,
            0,
            MarkupGeometry::Segment {
                start: Point::new(x, 0.0),
                end: Point::new(x + 10.0, 0.0),
            },
            MarkupStyle::default(),
        )
    }

    fn grouped_pair(collection: &mut MarkupCollection) -> (MarkupId, MarkupId) {
        let group = GroupId::new_v4();
        let mut a = line(0.0);
        let mut b = line(20.0);
        a.group_id = Some(group);
        b.group_id = Some(group);
        (collection.insert(a), collection.insert(b))
    }

    #[test]
    fn test_plain_click_selects_whole_group() {
        let mut collection = MarkupCollection::new();
        let (a, b) = grouped_pair(&mut collection);
        let mut selection = Selection::new();

        assert!(click_select(&mut selection, &collection, Some(a), false));
        assert!(selection.contains(a) && selection.contains(b));
    }

    #[test]
    fn test_group_expansion_skips_locked_members() {
        let mut collection = MarkupCollection::new();
        let (a, b) = grouped_pair(&mut collection);
        if let Some(markup) = collection.get_mut(b) {
            markup.locked = true;
        }
        assert_eq!(expand_group(&collection, a), vec![a]);
    }

    #[test]
    fn test_shift_click_toggles() {
        let mut collection = MarkupCollection::new();
        let a = collection.insert(line(0.0));
        let b = collection.insert(line(50.0));
        let mut selection = Selection::new();

        click_select(&mut selection, &collection, Some(a), false);
        click_select(&mut selection, &collection, Some(b), true);
        assert_eq!(selection.len(), 2);
        click_select(&mut selection, &collection, Some(a), true);
        assert_eq!(selection.ids(), vec![b]);
    }

    #[test]
    fn test_click_on_empty_canvas() {
        let mut collection = MarkupCollection::new();
        let a = collection.insert(line(0.0));
        let mut selection = Selection::new();
        selection.set([a]);

        assert!(!click_select(&mut selection, &collection, None, true));
        assert_eq!(selection.len(), 1);
        assert!(click_select(&mut selection, &collection, None, false));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_box_select_contains_fully() {
        let metrics = TextMetrics::default();
        let mut collection = MarkupCollection::new();
        let inside = collection.insert(line(0.0));
        collection.insert(line(25.0));

        let picked = box_select(
            &collection,
            0,
            Point::new(30.0, 10.0),
            Point::new(-5.0, -10.0),
            &metrics,
        );
        assert_eq!(picked, vec![inside]);
    }

    #[test]
    fn test_single_requires_exactly_one() {
        let mut selection = Selection::new();
        assert!(selection.single().is_none());
        let id = MarkupId::new_v4();
        selection.set([id]);
        assert_eq!(selection.single(), Some(id));
        selection.extend([MarkupId::new_v4()]);
        assert!(selection.single().is_none());
    }
}
