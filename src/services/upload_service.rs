use crate::config::UploadConfig;
use crate::models::{Asset, IncomingFile};
use crate::services::asset_catalog::AssetCatalog;
use crate::services::storage::{StorageBackend, StorageError};
use crate::utils::id::IdGenerator;
use crate::utils::validation::{UploadValidator, ValidationError, storage_extension};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Attempts at finding an unused key when `verify_unique_ids` is on.
const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Only one file can be uploaded at a time")]
    MultipleFiles,

    #[error("{0}")]
    ValidationFailed(#[from] ValidationError),

    #[error("Upload failed: {0}")]
    StorageFailed(#[from] StorageError),
}

impl UploadError {
    /// Stable machine-readable reason code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFile => "no_file",
            Self::MultipleFiles => "multiple_files",
            Self::ValidationFailed(e) => e.code(),
            Self::StorageFailed(_) => "storage_failed",
        }
    }
}

/// Validate, name, store and record one uploaded video.
///
/// Holds no per-request state, so a single instance is shared by all
/// concurrent requests.
pub struct UploadService {
    storage: Arc<dyn StorageBackend>,
    ids: Arc<dyn IdGenerator>,
    catalog: Arc<AssetCatalog>,
    validator: UploadValidator,
    verify_unique_ids: bool,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        ids: Arc<dyn IdGenerator>,
        catalog: Arc<AssetCatalog>,
        config: &UploadConfig,
    ) -> Self {
        Self {
            storage,
            ids,
            catalog,
            validator: UploadValidator::new(config.max_file_size),
            verify_unique_ids: config.verify_unique_ids,
        }
    }

    pub fn validator(&self) -> UploadValidator {
        self.validator
    }

    pub async fn handle_upload(&self, file: Option<IncomingFile>) -> Result<Asset, UploadError> {
        let file = file.ok_or(UploadError::NoFile)?;

        // 1. Policy check, before any id or write
        self.validator.validate(&file.content_type, file.size())?;

        // 2. Identity and key
        let (id, storage_key) = self.allocate_key(&file.original_name).await?;

        // 3. Single backend write
        let size = file.size() as u64;
        let storage_location = self
            .storage
            .put(&storage_key, file.data, &file.content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    "❌ Storage write failed for key={} backend={}: {}",
                    storage_key,
                    self.storage.name(),
                    e
                );
                UploadError::StorageFailed(e)
            })?;

        // 4. Record
        let asset = Asset {
            id,
            original_name: file.original_name,
            size,
            mime_type: file.content_type,
            uploaded_at: Utc::now(),
            storage_key,
            storage_location,
        };
        self.catalog.insert(asset.clone());

        tracing::info!(
            "✅ Stored video id={} name={} size={} type={}",
            asset.id,
            asset.original_name,
            asset.size,
            asset.mime_type
        );

        Ok(asset)
    }

    async fn allocate_key(&self, original_name: &str) -> Result<(String, String), UploadError> {
        let extension = storage_extension(original_name);

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.new_id();
            let key = storage_key(&id, extension.as_deref());

            if !self.verify_unique_ids || !self.storage.exists(&key).await? {
                return Ok((id, key));
            }
            tracing::warn!("Generated key {} already exists, retrying", key);
        }

        Err(UploadError::StorageFailed(StorageError::Backend(format!(
            "could not allocate an unused key after {} attempts",
            MAX_ID_ATTEMPTS
        ))))
    }
}

/// `{id}.{ext}`, or the bare id when there is no usable extension.
pub fn storage_key(id: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}
