//! Markup collection
//!
//! Insertion-ordered storage of markups with z-order queries, hit testing
//! and snapshot diffing. Snapshots for history are plain clones.

use crate::config::TextMetrics;
use crate::geometry::{Bounds, Point};
use crate::markup::Markup;
use sheetmark_model::{GroupId, MarkupId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupCollection {
    markups: Vec<Markup>,
}

/// Difference between two collections, expressed as persistence work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionDiff {
    pub created: Vec<Markup>,
    pub updated: Vec<Markup>,
    pub deleted: Vec<MarkupId>,
}

impl CollectionDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

impl MarkupCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-ordered markups, keeping their z-indices.
    pub fn from_markups(markups: Vec<Markup>) -> Self {
        Self { markups }
    }

    pub fn len(&self) -> usize {
        self.markups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Markup> {
        self.markups.iter()
    }

    pub fn ids(&self) -> Vec<MarkupId> {
        self.markups.iter().map(|m| m.id).collect()
    }

    pub fn get(&self, id: MarkupId) -> Option<&Markup> {
        self.markups.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MarkupId) -> Option<&mut Markup> {
        self.markups.iter_mut().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MarkupId) -> bool {
        self.get(id).is_some()
    }

    pub fn max_z(&self) -> Option<i64> {
        self.markups.iter().map(|m| m.z_index).max()
    }

    pub fn min_z(&self) -> Option<i64> {
        self.markups.iter().map(|m| m.z_index).min()
    }

    /// Append a markup on top of everything else.
    pub fn insert(&mut self, mut markup: Markup) -> MarkupId {
        markup.z_index = self.max_z().map_or(0, |z| z + 1);
        let id = markup.id;
        self.markups.push(markup);
        id
    }

    /// Replace an existing markup in place. Returns false when the id is unknown.
    pub fn replace(&mut self, markup: Markup) -> bool {
        match self.get_mut(markup.id) {
            Some(slot) => {
                *slot = markup;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: MarkupId) -> Option<Markup> {
        let index = self.markups.iter().position(|m| m.id == id)?;
        Some(self.markups.remove(index))
    }

    pub fn retain(&mut self, keep: impl FnMut(&Markup) -> bool) {
        self.markups.retain(keep);
    }

    pub fn on_page(&self, page: u32) -> impl Iterator<Item = &Markup> {
        self.markups.iter().filter(move |m| m.page == page)
    }

    /// Markups of a page bottom-most first. Ties keep insertion order.
    pub fn paint_order(&self, page: u32) -> Vec<&Markup> {
        let mut ordered: Vec<&Markup> = self.on_page(page).collect();
        ordered.sort_by_key(|m| m.z_index);
        ordered
    }

    /// Topmost unlocked markup on `page` under `point`.
    pub fn hit_test(
        &self,
        page: u32,
        point: Point,
        tolerance: f64,
        metrics: &TextMetrics,
    ) -> Option<MarkupId> {
        self.paint_order(page)
            .into_iter()
            .rev()
            .filter(|m| !m.locked)
            .find(|m| m.hit_test(point, tolerance, metrics))
            .map(|m| m.id)
    }

    /// Unlocked markups on `page` whose bounds lie fully inside `area`.
    pub fn contained_in(&self, page: u32, area: &Bounds, metrics: &TextMetrics) -> Vec<MarkupId> {
        self.paint_order(page)
            .into_iter()
            .filter(|m| !m.locked && area.contains_bounds(&m.bounds(metrics)))
            .map(|m| m.id)
            .collect()
    }

    pub fn group_members(&self, group_id: GroupId) -> Vec<MarkupId> {
        self.markups
            .iter()
            .filter(|m| m.group_id == Some(group_id))
            .map(|m| m.id)
            .collect()
    }

    /// Clear group ids shared by only one markup. Returns the ids that changed.
    pub fn normalize_groups(&mut self) -> Vec<MarkupId> {
        let mut counts: HashMap<GroupId, usize> = HashMap::new();
        for group in self.markups.iter().filter_map(|m| m.group_id) {
            *counts.entry(group).or_default() += 1;
        }

        let mut changed = Vec::new();
        for markup in self.markups.iter_mut() {
            if let Some(group) = markup.group_id {
                if counts.get(&group).copied().unwrap_or_default() < 2 {
                    markup.group_id = None;
                    changed.push(markup.id);
                }
            }
        }
        changed
    }

    /// Combined bounds of the given markups.
    pub fn combined_bounds(&self, ids: &[MarkupId], metrics: &TextMetrics) -> Option<Bounds> {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(|m| m.bounds(metrics))
            .reduce(|acc, b| acc.union(&b))
    }

    /// What `target` creates, updates and deletes relative to `self`.
    pub fn diff(&self, target: &MarkupCollection) -> CollectionDiff {
        let before: HashMap<MarkupId, &Markup> = self.markups.iter().map(|m| (m.id, m)).collect();
        let after_ids: HashSet<MarkupId> = target.markups.iter().map(|m| m.id).collect();

        let mut diff = CollectionDiff::default();
        for markup in &target.markups {
            match before.get(&markup.id) {
                None => diff.created.push(markup.clone()),
                Some(previous) if *previous != markup => diff.updated.push(markup.clone()),
                Some(_) => {}
            }
        }
        diff.deleted = self
            .markups
            .iter()
            .filter(|m| !after_ids.contains(&m.id))
            .map(|m| m.id)
            .collect();
        diff
    }
}
