//! Multi-markup transforms: align, rotate, duplicate, z-order.
//!
//! Callers pass only unlocked ids; nothing here checks the lock flag.

use crate::collection::MarkupCollection;
use crate::config::TextMetrics;
use crate::markup::Markup;
use sheetmark_model::{unix_millis, GroupId, MarkupId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
    /// Align horizontal centers on a common vertical axis.
    CenterHorizontal,
    /// Align vertical centers on a common horizontal axis.
    CenterVertical,
}

/// Per-markup `(id, dx, dy)` that aligns each bounds to the combined bounds.
///
/// Document space is Y-down, so `Top` aligns minimum Y.
pub fn alignment_deltas(
    collection: &MarkupCollection,
    ids: &[MarkupId],
    alignment: Alignment,
    metrics: &TextMetrics,
) -> Vec<(MarkupId, f64, f64)> {
    let Some(combined) = collection.combined_bounds(ids, metrics) else {
        return Vec::new();
    };
    let center = combined.center();

    ids.iter()
        .filter_map(|id| collection.get(*id))
        .filter_map(|markup| {
            let b = markup.bounds(metrics);
            let (dx, dy) = match alignment {
                Alignment::Left => (combined.min_x - b.min_x, 0.0),
                Alignment::Right => (combined.max_x - b.max_x, 0.0),
                Alignment::Top => (0.0, combined.min_y - b.min_y),
                Alignment::Bottom => (0.0, combined.max_y - b.max_y),
                Alignment::CenterHorizontal => (center.x - b.center().x, 0.0),
                Alignment::CenterVertical => (0.0, center.y - b.center().y),
            };
            (dx.abs() > f64::EPSILON || dy.abs() > f64::EPSILON).then_some((markup.id, dx, dy))
        })
        .collect()
}

pub fn align(
    collection: &mut MarkupCollection,
    ids: &[MarkupId],
    alignment: Alignment,
    metrics: &TextMetrics,
) -> usize {
    let deltas = alignment_deltas(collection, ids, alignment, metrics);
    for (id, dx, dy) in &deltas {
        if let Some(markup) = collection.get_mut(*id) {
            markup.translate(*dx, *dy);
        }
    }
    deltas.len()
}

pub fn translate(collection: &mut MarkupCollection, ids: &[MarkupId], dx: f64, dy: f64) {
    for id in ids {
        if let Some(markup) = collection.get_mut(*id) {
            markup.translate(dx, dy);
        }
    }
}

/// Rotate markups about the center of their combined bounds.
pub fn rotate(
    collection: &mut MarkupCollection,
    ids: &[MarkupId],
    degrees: f64,
    metrics: &TextMetrics,
) -> bool {
    let Some(combined) = collection.combined_bounds(ids, metrics) else {
        return false;
    };
    let pivot = combined.center();
    for id in ids {
        if let Some(markup) = collection.get_mut(*id) {
            markup.rotate_about(pivot, degrees, metrics);
        }
    }
    true
}

/// Clones with fresh ids, offset by `offset` on both axes.
///
/// Groups among the originals map to fresh groups among the clones.
pub fn duplicate(collection: &MarkupCollection, ids: &[MarkupId], offset: f64) -> Vec<Markup> {
    let mut group_map: HashMap<GroupId, GroupId> = HashMap::new();
    let created_at = unix_millis();
    ids.iter()
        .filter_map(|id| collection.get(*id))
        .map(|original| {
            let mut clone = original.clone();
            clone.id = MarkupId::new_v4();
            clone.created_at = created_at;
            clone.group_id = original
                .group_id
                .map(|group| *group_map.entry(group).or_insert_with(GroupId::new_v4));
            clone.translate(offset, offset);
            clone
        })
        .collect()
}

/// Raise markups above everything else, keeping their relative order.
pub fn bring_to_front(collection: &mut MarkupCollection, ids: &[MarkupId]) {
    let Some(max) = collection.max_z() else {
        return;
    };
    for (offset, id) in ordered_by_z(collection, ids).into_iter().enumerate() {
        if let Some(markup) = collection.get_mut(id) {
            markup.z_index = max + 1 + offset as i64;
        }
    }
}

/// Lower markups below everything else, keeping their relative order.
pub fn send_to_back(collection: &mut MarkupCollection, ids: &[MarkupId]) {
    let Some(min) = collection.min_z() else {
        return;
    };
    let ordered = ordered_by_z(collection, ids);
    let count = ordered.len() as i64;
    for (offset, id) in ordered.into_iter().enumerate() {
        if let Some(markup) = collection.get_mut(id) {
            markup.z_index = min - count + offset as i64;
        }
    }
}

fn ordered_by_z(collection: &MarkupCollection, ids: &[MarkupId]) -> Vec<MarkupId> {
    let mut markups: Vec<&Markup> = ids.iter().filter_map(|id| collection.get(*id)).collect();
    markups.sort_by_key(|m| m.z_index);
    markups.into_iter().map(|m| m.id).collect()
}
