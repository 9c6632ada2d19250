// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

use crate::config::settings::StorageSettings;
use crate::domain::models::asset::AssetFormat;
use crate::domain::repositories::storage_repository::{BlobStat, StorageError, StorageRepository};

/// S3 对象存储实现
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(
        region: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        endpoint: Option<String>,
    ) -> Self {
        let credentials =
            aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let mut config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .credentials_provider(credentials);

        if let Some(ep) = endpoint {
            config_builder = config_builder.endpoint_url(ep).force_path_style(true);
        }

        let config = config_builder.build();
        let client = aws_sdk_s3::Client::from_conf(config);

        Self { client, bucket }
    }
}

#[async_trait]
impl StorageRepository for S3Storage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let content_type = mime_for_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Other(e.to_string()))?
                    .into_bytes();
                Ok(Some(data.to_vec()))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(StorageError::Other(service_error.to_string()))
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.stat(key).await?.is_some())
    }

    async fn stat(&self, key: &str) -> Result<Option<BlobStat>, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => {
                let modified = output
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_else(Utc::now);
                Ok(Some(BlobStat {
                    size: output.content_length().unwrap_or_default().max(0) as u64,
                    modified,
                }))
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(None)
                } else {
                    Err(StorageError::Other(service_error.to_string()))
                }
            }
        }
    }
}

/// 本地文件系统存储实现
///
/// 写入先落到同目录的临时文件再重命名，读取方不会看到半写的文件。
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// 将键映射为根目录下的路径，拒绝绝对路径与 `..`
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl StorageRepository for LocalStorage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let full_path = self.resolve(key)?;

        // 确保目录存在
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        let temp_path = full_path.with_file_name(format!(".{}.tmp", file_name));

        fs::write(&temp_path, data).await?;
        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let full_path = self.resolve(key)?;

        match fs::read(&full_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let full_path = self.resolve(key)?;

        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let full_path = self.resolve(key)?;
        Ok(fs::try_exists(&full_path).await?)
    }

    async fn stat(&self, key: &str) -> Result<Option<BlobStat>, StorageError> {
        let full_path = self.resolve(key)?;

        match fs::metadata(&full_path).await {
            Ok(metadata) => Ok(Some(BlobStat {
                size: metadata.len(),
                modified: metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// 内存存储实现（用于测试与试运行）
#[derive(Default)]
pub struct InMemoryStorage {
    data: RwLock<HashMap<String, (Vec<u8>, DateTime<Utc>)>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的全部键，按字典序排列
    pub async fn keys(&self) -> Vec<String> {
        let map = self.data.read().await;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageRepository for InMemoryStorage {
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut map = self.data.write().await;
        map.insert(key.to_string(), (data.to_vec(), Utc::now()));
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let map = self.data.read().await;
        Ok(map.get(key).map(|(data, _)| data.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.data.write().await;
        map.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let map = self.data.read().await;
        Ok(map.contains_key(key))
    }

    async fn stat(&self, key: &str) -> Result<Option<BlobStat>, StorageError> {
        let map = self.data.read().await;
        Ok(map.get(key).map(|(data, modified)| BlobStat {
            size: data.len() as u64,
            modified: *modified,
        }))
    }
}

fn mime_for_key(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    if extension.eq_ignore_ascii_case("json") {
        return "application/json";
    }
    extension
        .parse::<AssetFormat>()
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream")
}

/// 存储工厂函数
pub fn create_storage_repository(
    settings: &StorageSettings,
) -> Result<Arc<dyn StorageRepository>, StorageError> {
    match settings.storage_type.as_str() {
        "local" => {
            let base_path = settings
                .local_path
                .as_ref()
                .cloned()
                .unwrap_or_else(|| "./public/assets".to_string());
            Ok(Arc::new(LocalStorage::new(base_path)))
        }
        "s3" => {
            let required = |value: &Option<String>, name: &str| {
                value
                    .clone()
                    .ok_or_else(|| StorageError::Other(format!("storage.{} is required for s3", name)))
            };
            Ok(Arc::new(S3Storage::new(
                required(&settings.s3_region, "s3_region")?,
                required(&settings.s3_bucket, "s3_bucket")?,
                required(&settings.s3_access_key, "s3_access_key")?,
                required(&settings.s3_secret_key, "s3_secret_key")?,
                settings.s3_endpoint.clone(),
            )))
        }
        "memory" => Ok(Arc::new(InMemoryStorage::new())),
        other => Err(StorageError::Other(format!(
            "Unsupported storage type: {}",
            other
        ))),
    }
}
