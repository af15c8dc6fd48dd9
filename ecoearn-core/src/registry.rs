//! Bin registry operations: creation, QR payloads, and fill levels.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{Bin, BinId, FillLevel, Occupancy};
use crate::ports::{BinStore, StoreError};
use crate::token;

#[derive(thiserror::Error, Debug)]
/// Errors raised by registry operations.
pub enum RegistryError {
    /// Bin name was blank.
    #[error("Please enter a bin name")]
    EmptyName,
    /// No picture was supplied.
    #[error("Please select an image")]
    MissingImage,
    /// Requested bin does not exist.
    #[error("Bin not found: {0}")]
    BinNotFound(BinId),
    /// Reading the image or writing the export failed.
    #[error("File error: {0}")]
    Io(#[from] io::Error),
    /// Store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Picture attached to a new bin.
#[derive(Debug, Clone)]
pub struct BinImage {
    /// MIME type, e.g. `image/png`.
    pub mime: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl BinImage {
    /// Encode as a `data:` URL, the form stored on the bin record.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Guess the MIME type from a file extension, defaulting to PNG.
    #[must_use]
    pub fn mime_for(path: &Path) -> &'static str {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            _ => "image/png",
        }
    }
}

/// Bin registry facade over a [`BinStore`].
pub struct BinRegistry {
    bins: Arc<dyn BinStore>,
}

impl fmt::Debug for BinRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("BinRegistry").finish_non_exhaustive()
    }
}

impl BinRegistry {
    /// Create a registry over `bins`.
    #[must_use]
    pub fn new(bins: Arc<dyn BinStore>) -> Self {
        Self { bins }
    }

    /// Create a bin with a fresh id and its QR payload in a single insert.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] or [`RegistryError::MissingImage`]
    /// for invalid input and [`RegistryError::Store`] when the insert fails.
    pub async fn create_bin(&self, name: &str, image: &BinImage) -> Result<Bin, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if image.bytes.is_empty() {
            return Err(RegistryError::MissingImage);
        }

        let id = BinId(Uuid::new_v4().simple().to_string());
        let bin = Bin {
            qr_data: Some(token::encode(&id).to_payload()),
            id,
            name: name.to_owned(),
            location: None,
            level: FillLevel::EMPTY,
            occupancy: Occupancy::Inactive,
            image: Some(image.to_data_url()),
        };

        self.bins.insert(&bin).await?;
        info!(bin = %bin.id, name = %bin.name, "bin created");
        Ok(bin)
    }

    /// Read the picture from `path` and [`create_bin`](Self::create_bin).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the file cannot be read, plus the
    /// errors of [`create_bin`](Self::create_bin).
    pub async fn create_bin_from_file(
        &self,
        name: &str,
        path: &Path,
    ) -> Result<Bin, RegistryError> {
        let bytes = tokio::fs::read(path).await?;
        let image = BinImage {
            mime: BinImage::mime_for(path).to_owned(),
            bytes,
        };
        self.create_bin(name, &image).await
    }

    /// All bins, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] when the store fails.
    pub async fn list_bins(&self) -> Result<Vec<Bin>, RegistryError> {
        let mut bins = self.bins.list().await?;
        bins.sort_by(|left, right| {
            left.name
                .to_lowercase()
                .cmp(&right.name.to_lowercase())
                .then_with(|| left.id.cmp(&right.id))
        });
        debug!(count = bins.len(), "listed bins");
        Ok(bins)
    }

    /// One bin.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BinNotFound`] for unknown ids.
    pub async fn bin(&self, id: &BinId) -> Result<Bin, RegistryError> {
        self.bins
            .get(id)
            .await?
            .ok_or_else(|| RegistryError::BinNotFound(id.clone()))
    }

    /// Issue a new QR payload for `id` and store it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BinNotFound`] for unknown ids.
    pub async fn regenerate_qr(&self, id: &BinId) -> Result<String, RegistryError> {
        let payload = token::encode(id).to_payload();
        match self.bins.set_qr_data(id, &payload).await {
            Ok(()) => Ok(payload),
            Err(StoreError::NotFound) => Err(RegistryError::BinNotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Write the bin's QR payload to `bin-<id>-qr-code.txt` inside `dir`.
    ///
    /// A payload is generated and stored first if the bin has none.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BinNotFound`] for unknown ids and
    /// [`RegistryError::Io`] when the file cannot be written.
    pub async fn export_qr(&self, id: &BinId, dir: &Path) -> Result<PathBuf, RegistryError> {
        let bin = self.bin(id).await?;
        let payload = match bin.qr_data.filter(|data| !data.is_empty()) {
            Some(payload) => payload,
            None => self.regenerate_qr(id).await?,
        };

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("bin-{id}-qr-code.txt"));
        tokio::fs::write(&path, payload.as_bytes()).await?;
        info!(bin = %id, path = %path.display(), "exported QR payload");
        Ok(path)
    }

    /// Record a new fill level reported by a sensor or a report.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::BinNotFound`] for unknown ids.
    pub async fn set_fill_level(&self, id: &BinId, level: FillLevel) -> Result<(), RegistryError> {
        match self.bins.set_fill_level(id, level).await {
            Ok(()) => {
                debug!(bin = %id, %level, "fill level updated");
                Ok(())
            }
            Err(StoreError::NotFound) => Err(RegistryError::BinNotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn registry() -> BinRegistry {
        BinRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn png() -> BinImage {
        BinImage {
            mime: String::from("image/png"),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[tokio::test]
    async fn created_bin_carries_its_own_qr_payload() {
        let registry = registry();

        let bin = registry.create_bin("  Mobod MRF ", &png()).await.expect("create");

        assert_eq!(bin.name, "Mobod MRF", "name trimmed");
        assert_eq!(bin.occupancy, Occupancy::Inactive, "new bins are free");
        assert_eq!(bin.level, FillLevel::EMPTY, "new bins are empty");
        let payload = bin.qr_data.as_deref().expect("payload stored");
        let decoded = token::decode(payload).expect("payload decodes");
        assert_eq!(decoded.bin_id, bin.id, "payload names the new bin");
        assert_eq!(
            bin.image.as_deref(),
            Some("data:image/png;base64,iVBORw=="),
            "image stored as data URL"
        );
    }

    #[tokio::test]
    async fn creation_validates_input() {
        let registry = registry();
        assert!(
            matches!(registry.create_bin("   ", &png()).await, Err(RegistryError::EmptyName)),
            "blank name"
        );
        let empty = BinImage {
            mime: String::from("image/png"),
            bytes: Vec::new(),
        };
        assert!(
            matches!(registry.create_bin("Plaza", &empty).await, Err(RegistryError::MissingImage)),
            "missing image"
        );
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let registry = registry();
        for name in ["plaza", "Barangay Hall", "market"] {
            registry.create_bin(name, &png()).await.expect("create");
        }
        let names: Vec<String> = registry
            .list_bins()
            .await
            .expect("list")
            .into_iter()
            .map(|bin| bin.name)
            .collect();
        assert_eq!(names, ["Barangay Hall", "market", "plaza"], "case-insensitive order");
    }

    #[tokio::test]
    async fn export_writes_payload_file() {
        let registry = registry();
        let bin = registry.create_bin("Plaza", &png()).await.expect("create");
        let dir = tempfile::tempdir().expect("tempdir");

        let path = registry.export_qr(&bin.id, dir.path()).await.expect("export");

        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some(format!("bin-{}-qr-code.txt", bin.id).as_str()),
            "file named after bin"
        );
        let written = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(Some(written), bin.qr_data, "stored payload written");
    }

    #[tokio::test]
    async fn image_file_is_read_with_mime_from_extension() {
        let registry = registry();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bin.JPG");
        std::fs::write(&path, [1_u8, 2, 3]).expect("write image");

        let bin = registry
            .create_bin_from_file("Plaza", &path)
            .await
            .expect("create");

        assert!(
            bin.image.is_some_and(|url| url.starts_with("data:image/jpeg;base64,")),
            "jpeg data URL"
        );
    }

    #[tokio::test]
    async fn fill_level_and_regenerate_require_existing_bin() {
        let registry = registry();
        let ghost = BinId::from("ghost");
        assert!(
            matches!(
                registry.set_fill_level(&ghost, FillLevel::FULL).await,
                Err(RegistryError::BinNotFound(_))
            ),
            "fill level on unknown bin"
        );
        assert!(
            matches!(registry.regenerate_qr(&ghost).await, Err(RegistryError::BinNotFound(_))),
            "regenerate on unknown bin"
        );

        let bin = registry.create_bin("Plaza", &png()).await.expect("create");
        registry.set_fill_level(&bin.id, FillLevel::FULL).await.expect("level");
        assert_eq!(
            registry.bin(&bin.id).await.expect("bin").level,
            FillLevel::FULL,
            "level stored"
        );
    }
}
