// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::models::asset::{AssetFormat, AssetRecord, AssetType, Dimensions};
use crate::domain::repositories::storage_repository::StorageError;

/// 待写入的附加版本
#[derive(Debug, Clone)]
pub struct VariantUpload {
    pub dimensions: Dimensions,
    pub format: AssetFormat,
    pub data: Vec<u8>,
}

/// 待写入的资源
#[derive(Debug, Clone)]
pub struct AssetUpload {
    pub record: AssetRecord,
    pub data: Vec<u8>,
    pub variants: Vec<VariantUpload>,
}

impl AssetUpload {
    pub fn new(record: AssetRecord, data: Vec<u8>) -> Self {
        Self {
            record,
            data,
            variants: Vec::new(),
        }
    }
}

/// 资源仓库特质
///
/// 以 (websiteId, assetType) 为键保存当前资源。写入总是覆盖，
/// 不同网站的写入互不冲突。
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// 保存资源并替换该组合的当前记录
    ///
    /// 单个附加版本写入失败只会被跳过，返回的记录只包含成功写入的版本。
    async fn store(&self, upload: AssetUpload) -> Result<AssetRecord, StorageError>;

    /// 读取当前记录
    async fn current(&self, website_id: &str, asset_type: AssetType) -> Option<AssetRecord>;

    /// 读取当前资源的二进制内容
    async fn read(
        &self,
        website_id: &str,
        asset_type: AssetType,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// 全部当前记录
    async fn records(&self) -> Vec<AssetRecord>;

    /// 删除未被引用的资源，返回被删除的存储键
    ///
    /// `referenced` 为仍被网站记录引用的存储键集合。
    async fn cleanup(&self, referenced: &HashSet<String>) -> Result<Vec<String>, StorageError>;

    /// 记录对应的公开 URL
    fn public_url(&self, record: &AssetRecord) -> String;
}
