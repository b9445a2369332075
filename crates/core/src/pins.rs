//! Photo pins
//!
//! Pins live in normalized page coordinates (`0.0..=1.0` on both axes) so they
//! stay put across zoom levels and page rasterization sizes.

use crate::geometry::{distance, Point};
use sheetmark_model::{PhotoId, PhotoPinRecord, PinId};

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoPin {
    pub id: PinId,
    pub x: f64,
    pub y: f64,
    pub label: Option<String>,
    pub photo_id: Option<PhotoId>,
}

impl PhotoPin {
    pub fn from_record(record: &PhotoPinRecord) -> Self {
        Self {
            id: record.id,
            x: record.x.clamp(0.0, 1.0),
            y: record.y.clamp(0.0, 1.0),
            label: record.label.clone(),
            photo_id: record.photo_id,
        }
    }

    pub fn to_record(&self) -> PhotoPinRecord {
        PhotoPinRecord {
            id: self.id,
            x: self.x,
            y: self.y,
            label: self.label.clone(),
            photo_id: self.photo_id,
        }
    }

    pub fn has_photo(&self) -> bool {
        self.photo_id.is_some()
    }

    /// Position in document space for a page of `page_size`.
    pub fn position(&self, page_size: (f64, f64)) -> Point {
        denormalize(self.x, self.y, page_size)
    }

    fn collides_with(&self, other: &PhotoPin, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }
}

/// Document point to normalized page coordinates, clamped to the page.
///
/// Returns `None` for an empty page.
pub fn normalize(point: Point, page_size: (f64, f64)) -> Option<(f64, f64)> {
    let (width, height) = page_size;
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some((
        (point.x / width).clamp(0.0, 1.0),
        (point.y / height).clamp(0.0, 1.0),
    ))
}

pub fn denormalize(x: f64, y: f64, page_size: (f64, f64)) -> Point {
    Point::new(x * page_size.0, y * page_size.1)
}

/// The pins of the active sheet.
#[derive(Debug, Clone, Default)]
pub struct PinBoard {
    pins: Vec<PhotoPin>,
}

impl PinBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[PhotoPinRecord]) -> Self {
        Self {
            pins: records.iter().map(PhotoPin::from_record).collect(),
        }
    }

    /// Replace every pin with freshly fetched records.
    pub fn replace_all(&mut self, records: &[PhotoPinRecord]) {
        *self = Self::from_records(records);
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoPin> {
        self.pins.iter()
    }

    pub fn get(&self, id: PinId) -> Option<&PhotoPin> {
        self.pins.iter().find(|pin| pin.id == id)
    }

    /// Move a pin, clamping to the page. Returns the previous position.
    pub fn move_pin(&mut self, id: PinId, x: f64, y: f64) -> Option<(f64, f64)> {
        let pin = self.pins.iter_mut().find(|pin| pin.id == id)?;
        let previous = (pin.x, pin.y);
        pin.x = x.clamp(0.0, 1.0);
        pin.y = y.clamp(0.0, 1.0);
        Some(previous)
    }

    /// Pins to draw. Of colliding pins only one is shown, preferring one
    /// with an attached photo.
    pub fn visible_pins(&self, tolerance: f64) -> Vec<&PhotoPin> {
        let mut visible: Vec<&PhotoPin> = Vec::with_capacity(self.pins.len());
        for pin in &self.pins {
            match visible.iter_mut().find(|shown| shown.collides_with(pin, tolerance)) {
                Some(shown) => {
                    if pin.has_photo() && !shown.has_photo() {
                        *shown = pin;
                    }
                }
                None => visible.push(pin),
            }
        }
        visible
    }

    /// Topmost visible pin whose marker contains `point` (document space).
    pub fn hit_test(
        &self,
        point: Point,
        page_size: (f64, f64),
        radius: f64,
        collision_tolerance: f64,
    ) -> Option<PinId> {
        self.visible_pins(collision_tolerance)
            .into_iter()
            .rev()
            .find(|pin| distance(pin.position(page_size), point) <= radius)
            .map(|pin| pin.id)
    }
}
