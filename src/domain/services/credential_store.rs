// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::errors::ValidationError;
use crate::domain::models::credential::{CredentialRecord, CredentialSummary};

/// 凭据存储
///
/// 网站 id 到凭据记录的内存映射。写入前校验记录形状，
/// 校验失败时不做任何修改。持久化由基础设施层负责。
#[derive(Debug, Default)]
pub struct CredentialStore {
    records: RwLock<BTreeMap<String, CredentialRecord>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询凭据，不存在时返回 `None`
    pub fn get(&self, website_id: &str) -> Option<CredentialRecord> {
        self.records.read().get(website_id).cloned()
    }

    /// 写入或替换凭据
    ///
    /// # Returns
    ///
    /// * `Ok(())` - 写入成功
    /// * `Err(ValidationError)` - 记录不合法，包含全部违规项
    pub fn put(&self, record: CredentialRecord) -> Result<(), ValidationError> {
        record.validate()?;
        debug!(
            website_id = %record.website_id,
            method = record.method.name(),
            "Storing credential"
        );
        self.records
            .write()
            .insert(record.website_id.clone(), record);
        Ok(())
    }

    /// 删除凭据，返回记录是否存在
    pub fn remove(&self, website_id: &str) -> bool {
        self.records.write().remove(website_id).is_some()
    }

    /// 按网站 id 排序的摘要列表
    pub fn list(&self) -> Vec<CredentialSummary> {
        self.records
            .read()
            .values()
            .map(CredentialRecord::summary)
            .collect()
    }

    /// 全部记录的快照，用于持久化
    pub fn snapshot(&self) -> Vec<CredentialRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
