use sheetmark_model::{
    MarkupId, MarkupRecord, MarkupRepository, PhotoPinRecord, PinId, RepositoryError,
    ScaleRecord, SheetId, VersionId,
};
use std::collections::HashMap;
use tracing::debug;

/// In-process repository.
///
/// Writes can be made to fail with [`set_offline`](Self::set_offline) or
/// [`fail_next_writes`](Self::fail_next_writes); failed writes leave the
/// stored state untouched.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    markups: HashMap<VersionId, Vec<MarkupRecord>>,
    scales: HashMap<VersionId, ScaleRecord>,
    pins: HashMap<SheetId, Vec<PhotoPinRecord>>,
    offline: bool,
    failing_writes: usize,
    writes: usize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markups(mut self, version: VersionId, records: Vec<MarkupRecord>) -> Self {
        self.markups.insert(version, records);
        self
    }

    pub fn with_scale(mut self, version: VersionId, scale: ScaleRecord) -> Self {
        self.scales.insert(version, scale);
        self
    }

    pub fn with_photo_pins(mut self, sheet: SheetId, pins: Vec<PhotoPinRecord>) -> Self {
        self.pins.insert(sheet, pins);
        self
    }

    /// Every read and write fails while offline.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// The next `count` writes fail.
    pub fn fail_next_writes(&mut self, count: usize) {
        self.failing_writes = count;
    }

    /// Successful writes so far.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn markups(&self, version: VersionId) -> &[MarkupRecord] {
        self.markups.get(&version).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn markup(&self, version: VersionId, id: MarkupId) -> Option<&MarkupRecord> {
        self.markups(version).iter().find(|record| record.id == id)
    }

    pub fn scale(&self, version: VersionId) -> Option<&ScaleRecord> {
        self.scales.get(&version)
    }

    pub fn photo_pins(&self, sheet: SheetId) -> &[PhotoPinRecord] {
        self.pins.get(&sheet).map(Vec::as_slice).unwrap_or_default()
    }

    fn check_read(&self) -> Result<(), RepositoryError> {
        if self.offline {
            return Err(RepositoryError::Unavailable("offline".to_owned()));
        }
        Ok(())
    }

    fn begin_write(&mut self, op: &'static str) -> Result<(), RepositoryError> {
        self.check_read()?;
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            debug!(op, "injected write failure");
            return Err(RepositoryError::Unavailable(format!("{op} rejected")));
        }
        self.writes += 1;
        Ok(())
    }
}

impl MarkupRepository for MemoryRepository {
    fn load_markups(&self, version: VersionId) -> Result<Vec<MarkupRecord>, RepositoryError> {
        self.check_read()?;
        let mut records = self.markups(version).to_vec();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    fn create_markup(
        &mut self,
        version: VersionId,
        record: &MarkupRecord,
    ) -> Result<(), RepositoryError> {
        self.begin_write("create")?;
        let records = self.markups.entry(version).or_default();
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(())
    }

    fn update_markup(
        &mut self,
        version: VersionId,
        record: &MarkupRecord,
    ) -> Result<(), RepositoryError> {
        if self.markup(version, record.id).is_none() {
            return Err(RepositoryError::MarkupNotFound(record.id));
        }
        self.begin_write("update")?;
        if let Some(existing) = self
            .markups
            .get_mut(&version)
            .and_then(|records| records.iter_mut().find(|existing| existing.id == record.id))
        {
            *existing = record.clone();
        }
        Ok(())
    }

    fn delete_markup(&mut self, version: VersionId, id: MarkupId) -> Result<(), RepositoryError> {
        self.begin_write("delete")?;
        if let Some(records) = self.markups.get_mut(&version) {
            records.retain(|record| record.id != id);
        }
        Ok(())
    }

    fn load_scale(&self, version: VersionId) -> Result<Option<ScaleRecord>, RepositoryError> {
        self.check_read()?;
        Ok(self.scales.get(&version).cloned())
    }

    fn save_scale(
        &mut self,
        version: VersionId,
        scale: &ScaleRecord,
    ) -> Result<(), RepositoryError> {
        self.begin_write("save_scale")?;
        self.scales.insert(version, scale.clone());
        Ok(())
    }

    fn load_photo_pins(&self, sheet: SheetId) -> Result<Vec<PhotoPinRecord>, RepositoryError> {
        self.check_read()?;
        Ok(self.photo_pins(sheet).to_vec())
    }

    fn update_photo_pin_position(
        &mut self,
        sheet: SheetId,
        id: PinId,
        x: f64,
        y: f64,
    ) -> Result<(), RepositoryError> {
        if !self.photo_pins(sheet).iter().any(|pin| pin.id == id) {
            return Err(RepositoryError::PinNotFound(id));
        }
        self.begin_write("update_pin")?;
        if let Some(pin) = self
            .pins
            .get_mut(&sheet)
            .and_then(|pins| pins.iter_mut().find(|pin| pin.id == id))
        {
            pin.x = x;
            pin.y = y;
        }
        Ok(())
    }
}
