// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 键不合法（例如试图跳出存储根目录）
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储错误
    #[error("Storage error: {0}")]
    Other(String),
}

/// 对象元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStat {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// 存储仓库特质
///
/// 以键访问二进制对象的存储接口
#[async_trait]
pub trait StorageRepository: Send + Sync {
    /// 使用指定键写入数据，已存在时覆盖
    async fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// 根据键读取数据
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// 根据键删除数据，键不存在时视为成功
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// 检查存储中是否存在指定键
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// 读取对象大小与修改时间
    async fn stat(&self, key: &str) -> Result<Option<BlobStat>, StorageError>;
}
