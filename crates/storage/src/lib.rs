//! Markup repositories.
//!
//! [`FileRepository`] keeps one JSON file per document version and one per
//! sheet under a local data directory. [`MemoryRepository`] keeps everything
//! in process and can be told to fail, for exercising sync recovery.

mod memory;

pub use memory::MemoryRepository;

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sheetmark_model::{
    MarkupId, MarkupRecord, MarkupRepository, PhotoPinRecord, PinId, RepositoryError,
    ScaleRecord, SheetId, VersionId,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MARKUPS_SCHEMA_VERSION: u32 = 1;
const PINS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported schema version {found} in {path}")]
    UnsupportedSchema { path: PathBuf, found: u32 },
}

impl From<StorageError> for RepositoryError {
    fn from(error: StorageError) -> Self {
        RepositoryError::Storage(error.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VersionEnvelope {
    version: u32,
    #[serde(default)]
    markups: Vec<MarkupRecord>,
    #[serde(default)]
    scale: Option<ScaleRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SheetEnvelope {
    version: u32,
    #[serde(default)]
    pins: Vec<PhotoPinRecord>,
}

trait Envelope: Serialize + DeserializeOwned + Default {
    const SCHEMA_VERSION: u32;

    fn version_mut(&mut self) -> &mut u32;
}

impl Envelope for VersionEnvelope {
    const SCHEMA_VERSION: u32 = MARKUPS_SCHEMA_VERSION;

    fn version_mut(&mut self) -> &mut u32 {
        &mut self.version
    }
}

impl Envelope for SheetEnvelope {
    const SCHEMA_VERSION: u32 = PINS_SCHEMA_VERSION;

    fn version_mut(&mut self) -> &mut u32 {
        &mut self.version
    }
}

/// JSON sidecar storage.
///
/// Layout under the root: `versions/<version-id>.json` holds the markups and
/// calibration scale of a document version, `sheets/<sheet-id>.json` the
/// photo pins of a sheet. Writes go to a temporary file that is renamed over
/// the target.
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Sheetmark", "Sheetmark")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Replace the photo pins of a sheet. Pins are created by the photo
    /// workflow outside the editor; this is how they reach the store.
    pub fn save_photo_pins(
        &self,
        sheet: SheetId,
        pins: &[PhotoPinRecord],
    ) -> Result<(), StorageError> {
        let envelope = SheetEnvelope { version: PINS_SCHEMA_VERSION, pins: pins.to_vec() };
        write_atomic(&self.sheet_path(sheet), &envelope)
    }

    fn version_path(&self, version: VersionId) -> PathBuf {
        self.root.join("versions").join(format!("{version}.json"))
    }

    fn sheet_path(&self, sheet: SheetId) -> PathBuf {
        self.root.join("sheets").join(format!("{sheet}.json"))
    }

    fn load_version(&self, version: VersionId) -> Result<VersionEnvelope, StorageError> {
        read_envelope(&self.version_path(version))
    }

    fn update_version(
        &self,
        version: VersionId,
        apply: impl FnOnce(&mut VersionEnvelope) -> Result<(), RepositoryError>,
    ) -> Result<(), RepositoryError> {
        let mut envelope = self.load_version(version)?;
        apply(&mut envelope)?;
        write_atomic(&self.version_path(version), &envelope)?;
        Ok(())
    }

    fn load_sheet(&self, sheet: SheetId) -> Result<SheetEnvelope, StorageError> {
        read_envelope(&self.sheet_path(sheet))
    }
}

/// Read an envelope, treating a missing file as empty. The result is stamped
/// with the current schema version.
fn read_envelope<T: Envelope>(path: &Path) -> Result<T, StorageError> {
    let mut envelope = if path.exists() {
        let bytes = fs::read(path)?;
        let mut envelope: T = serde_json::from_slice(&bytes)?;
        let found = *envelope.version_mut();
        if found > T::SCHEMA_VERSION {
            return Err(StorageError::UnsupportedSchema { path: path.to_path_buf(), found });
        }
        envelope
    } else {
        T::default()
    };
    *envelope.version_mut() = T::SCHEMA_VERSION;
    Ok(envelope)
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(value)?;
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, bytes)?;
    fs::rename(&temp, path)?;
    debug!(path = %path.display(), "written");
    Ok(())
}

impl MarkupRepository for FileRepository {
    fn load_markups(&self, version: VersionId) -> Result<Vec<MarkupRecord>, RepositoryError> {
        let mut markups = self.load_version(version)?.markups;
        markups.sort_by_key(|record| record.created_at);
        Ok(markups)
    }

    /// Creating an id that already exists overwrites it, so a retried create
    /// is harmless.
    fn create_markup(
        &mut self,
        version: VersionId,
        record: &MarkupRecord,
    ) -> Result<(), RepositoryError> {
        self.update_version(version, |envelope| {
            match envelope.markups.iter_mut().find(|m| m.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => envelope.markups.push(record.clone()),
            }
            Ok(())
        })
    }

    fn update_markup(
        &mut self,
        version: VersionId,
        record: &MarkupRecord,
    ) -> Result<(), RepositoryError> {
        self.update_version(version, |envelope| {
            let existing = envelope
                .markups
                .iter_mut()
                .find(|m| m.id == record.id)
                .ok_or(RepositoryError::MarkupNotFound(record.id))?;
            *existing = record.clone();
            Ok(())
        })
    }

    /// Deleting a missing markup succeeds.
    fn delete_markup(&mut self, version: VersionId, id: MarkupId) -> Result<(), RepositoryError> {
        self.update_version(version, |envelope| {
            let before = envelope.markups.len();
            envelope.markups.retain(|m| m.id != id);
            if envelope.markups.len() == before {
                warn!(%id, "delete of unknown markup");
            }
            Ok(())
        })
    }

    fn load_scale(&self, version: VersionId) -> Result<Option<ScaleRecord>, RepositoryError> {
        Ok(self.load_version(version)?.scale)
    }

    fn save_scale(
        &mut self,
        version: VersionId,
        scale: &ScaleRecord,
    ) -> Result<(), RepositoryError> {
        self.update_version(version, |envelope| {
            envelope.scale = Some(scale.clone());
            Ok(())
        })
    }

    fn load_photo_pins(&self, sheet: SheetId) -> Result<Vec<PhotoPinRecord>, RepositoryError> {
        Ok(self.load_sheet(sheet)?.pins)
    }

    fn update_photo_pin_position(
        &mut self,
        sheet: SheetId,
        id: PinId,
        x: f64,
        y: f64,
    ) -> Result<(), RepositoryError> {
        let mut envelope = self.load_sheet(sheet)?;
        let pin = envelope
            .pins
            .iter_mut()
            .find(|pin| pin.id == id)
            .ok_or(RepositoryError::PinNotFound(id))?;
        pin.x = x;
        pin.y = y;
        write_atomic(&self.sheet_path(sheet), &envelope)?;
        Ok(())
    }
}
