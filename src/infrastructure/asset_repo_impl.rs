// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::models::asset::{public_url_for_key, AssetRecord, AssetType, AssetVariant};
use crate::domain::repositories::asset_repository::{AssetRepository, AssetUpload};
use crate::domain::repositories::storage_repository::{StorageError, StorageRepository};

/// 资源清单在存储中的键
pub const MANIFEST_KEY: &str = "manifest.json";

/// 基于对象存储的资源仓库实现
///
/// 二进制内容写入对象存储，当前记录保存在内存索引中，
/// 并可整体持久化为 `manifest.json`。
pub struct AssetRepositoryImpl {
    storage: Arc<dyn StorageRepository>,
    index: DashMap<(String, AssetType), AssetRecord>,
    public_prefix: String,
}

impl AssetRepositoryImpl {
    pub fn new(storage: Arc<dyn StorageRepository>, public_prefix: impl Into<String>) -> Self {
        Self {
            storage,
            index: DashMap::new(),
            public_prefix: public_prefix.into(),
        }
    }

    /// 创建仓库并从存储中的清单恢复索引
    pub async fn load(
        storage: Arc<dyn StorageRepository>,
        public_prefix: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let repository = Self::new(storage, public_prefix);

        if let Some(bytes) = repository.storage.read(MANIFEST_KEY).await? {
            let records: Vec<AssetRecord> = serde_json::from_slice(&bytes)?;
            for record in records {
                if let Err(e) = record.validate() {
                    warn!(website_id = %record.website_id, error = %e, "Skipping invalid manifest entry");
                    continue;
                }
                repository
                    .index
                    .insert((record.website_id.clone(), record.asset_type), record);
            }
            debug!(count = repository.index.len(), "Loaded asset manifest");
        }

        Ok(repository)
    }

    /// 将当前索引写回存储
    pub async fn save_manifest(&self) -> Result<(), StorageError> {
        let records = self.sorted_records();
        let bytes = serde_json::to_vec_pretty(&records)?;
        self.storage.write(MANIFEST_KEY, &bytes).await?;
        debug!(count = records.len(), "Saved asset manifest");
        Ok(())
    }

    fn sorted_records(&self) -> Vec<AssetRecord> {
        let mut records: Vec<AssetRecord> =
            self.index.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| {
            a.website_id
                .cmp(&b.website_id)
                .then(a.asset_type.cmp(&b.asset_type))
        });
        records
    }

    /// 删除一条记录占用的全部对象，返回成功删除的键
    async fn delete_blobs(&self, keys: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut deleted = Vec::new();
        for key in keys {
            match self.storage.delete(&key).await {
                Ok(()) => deleted.push(key),
                Err(e) => warn!(key = %key, error = %e, "Failed to delete stale asset"),
            }
        }
        deleted
    }
}

fn record_keys(record: &AssetRecord) -> Vec<String> {
    std::iter::once(record.storage_key())
        .chain(record.variants.iter().map(|v| v.key.clone()))
        .collect()
}

#[async_trait]
impl AssetRepository for AssetRepositoryImpl {
    async fn store(&self, upload: AssetUpload) -> Result<AssetRecord, StorageError> {
        let AssetUpload {
            mut record,
            data,
            variants,
        } = upload;

        record
            .validate()
            .map_err(|e| StorageError::Other(e.to_string()))?;

        let key = record.storage_key();
        self.storage.write(&key, &data).await?;
        record.file_size_bytes = data.len() as u64;

        record.variants.clear();
        for variant in variants {
            let variant_key = record.variant_key(variant.dimensions, variant.format);
            match self.storage.write(&variant_key, &variant.data).await {
                Ok(()) => record.variants.push(AssetVariant {
                    dimensions: variant.dimensions,
                    format: variant.format,
                    key: variant_key,
                    file_size_bytes: variant.data.len() as u64,
                }),
                Err(e) => {
                    warn!(
                        website_id = %record.website_id,
                        asset_type = %record.asset_type,
                        key = %variant_key,
                        error = %e,
                        "Variant write failed, skipping"
                    );
                }
            }
        }

        let previous = self
            .index
            .insert((record.website_id.clone(), record.asset_type), record.clone());

        // 旧版本的对象不再被引用
        if let Some(previous) = previous {
            let current: HashSet<String> = record_keys(&record).into_iter().collect();
            let stale = record_keys(&previous)
                .into_iter()
                .filter(|k| !current.contains(k));
            let deleted = self.delete_blobs(stale).await;
            if !deleted.is_empty() {
                debug!(website_id = %record.website_id, asset_type = %record.asset_type, count = deleted.len(), "Replaced previous asset");
            }
        }

        Ok(record)
    }

    async fn current(&self, website_id: &str, asset_type: AssetType) -> Option<AssetRecord> {
        self.index
            .get(&(website_id.to_string(), asset_type))
            .map(|entry| entry.value().clone())
    }

    async fn read(
        &self,
        website_id: &str,
        asset_type: AssetType,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        match self.current(website_id, asset_type).await {
            Some(record) => self.storage.read(&record.storage_key()).await,
            None => Ok(None),
        }
    }

    async fn records(&self) -> Vec<AssetRecord> {
        self.sorted_records()
    }

    async fn cleanup(&self, referenced: &HashSet<String>) -> Result<Vec<String>, StorageError> {
        let orphaned: Vec<AssetRecord> = self
            .index
            .iter()
            .filter(|entry| !referenced.contains(&entry.value().storage_key()))
            .map(|entry| entry.value().clone())
            .collect();

        let mut deleted = Vec::new();
        for record in orphaned {
            let keys = record_keys(&record);
            let removed = self.delete_blobs(keys.clone()).await;
            // 只有全部对象删除成功才移除索引，下次清理会重试
            if removed.len() == keys.len() {
                self.index
                    .remove(&(record.website_id.clone(), record.asset_type));
            }
            deleted.extend(removed);
        }

        info!(count = deleted.len(), "Cleanup finished");
        Ok(deleted)
    }

    fn public_url(&self, record: &AssetRecord) -> String {
        public_url_for_key(&self.public_prefix, &record.storage_key())
    }
}
