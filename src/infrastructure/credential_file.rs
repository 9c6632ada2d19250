// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;
use tracing::{info, warn};

use crate::domain::models::credential::CredentialRecord;
use crate::domain::services::credential_store::CredentialStore;
use crate::infrastructure::json_file::{read_optional, write_json_atomic, DataFileError};

/// 从 JSON 文件加载凭据
///
/// 文件不存在时返回空存储。不合法的条目逐条记录警告并跳过，
/// 不影响其余条目。
pub async fn load_credentials(path: impl AsRef<Path>) -> Result<CredentialStore, DataFileError> {
    let path = path.as_ref();
    let store = CredentialStore::new();

    let Some(bytes) = read_optional(path).await? else {
        info!(path = %path.display(), "Credential file not found, starting empty");
        return Ok(store);
    };

    let entries: Vec<serde_json::Value> =
        serde_json::from_slice(&bytes).map_err(|e| DataFileError::json(path, e))?;

    for (index, entry) in entries.into_iter().enumerate() {
        let record = match serde_json::from_value::<CredentialRecord>(entry) {
            Ok(record) => record,
            Err(e) => {
                warn!(index, error = %e, "Skipping invalid credential entry");
                continue;
            }
        };
        let website_id = record.website_id.clone();
        if let Err(e) = store.put(record) {
            warn!(index, website_id = %website_id, error = %e, "Skipping invalid credential entry");
        }
    }

    info!(path = %path.display(), count = store.len(), "Loaded credentials");
    Ok(store)
}

/// 将凭据存储原子写回文件
pub async fn save_credentials(
    path: impl AsRef<Path>,
    store: &CredentialStore,
) -> Result<(), DataFileError> {
    let path = path.as_ref();
    let records = store.snapshot();
    write_json_atomic(path, &records).await?;
    info!(path = %path.display(), count = records.len(), "Saved credentials");
    Ok(())
}
