use crate::models::Asset;
use dashmap::DashMap;

/// In-process index of stored assets, keyed by id.
///
/// Only the upload pipeline inserts, and only after the backend write has
/// succeeded, so every entry here points at a complete object.
#[derive(Default)]
pub struct AssetCatalog {
    assets: DashMap<String, Asset>,
}

impl AssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, asset: Asset) {
        self.assets.insert(asset.id.clone(), asset);
    }

    pub fn get(&self, id: &str) -> Option<Asset> {
        self.assets.get(id).map(|entry| entry.value().clone())
    }

    /// Accepts either a bare id or a storage key such as `{id}.mp4`.
    pub fn find(&self, id_or_key: &str) -> Option<Asset> {
        if let Some(asset) = self.get(id_or_key) {
            return Some(asset);
        }
        let (id, _) = id_or_key.rsplit_once('.')?;
        self.get(id).filter(|asset| asset.storage_key == id_or_key)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
