// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::info;

use crate::domain::errors::ValidationError;
use crate::domain::models::website::WebsiteRecord;
use crate::infrastructure::json_file::{read_optional, write_json_atomic, DataFileError};

/// 加载网站目录
///
/// 全部记录都会被校验，重复 id 与字段违规一并报告。
pub async fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<WebsiteRecord>, DataFileError> {
    let path = path.as_ref();
    let bytes = read_optional(path).await?.ok_or_else(|| {
        DataFileError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "website catalog not found"),
        )
    })?;

    let websites: Vec<WebsiteRecord> =
        serde_json::from_slice(&bytes).map_err(|e| DataFileError::json(path, e))?;
    validate_catalog(&websites)?;

    info!(path = %path.display(), count = websites.len(), "Loaded website catalog");
    Ok(websites)
}

/// 写回网站目录（包含状态与资源路径）
pub async fn save_catalog(
    path: impl AsRef<Path>,
    websites: &[WebsiteRecord],
) -> Result<(), DataFileError> {
    let path = path.as_ref();
    write_json_atomic(path, websites).await?;
    info!(path = %path.display(), count = websites.len(), "Saved website catalog");
    Ok(())
}

/// 校验整个目录，返回全部违规项
pub fn validate_catalog(websites: &[WebsiteRecord]) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for website in websites {
        if !seen.insert(website.id.as_str()) {
            duplicates.insert(website.id.as_str());
        }
    }
    violations.extend(
        duplicates
            .into_iter()
            .map(|id| format!("duplicate website id: {}", id)),
    );

    for (index, website) in websites.iter().enumerate() {
        if let Err(e) = website.validate_record() {
            let label = if website.id.is_empty() {
                format!("#{}", index)
            } else {
                website.id.clone()
            };
            violations.extend(e.violations().iter().map(|v| format!("{}: {}", label, v)));
        }
    }

    ValidationError::check(violations)
}
