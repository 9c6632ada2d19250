// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::domain::errors::ValidationError;

/// 数据文件错误
#[derive(Error, Debug)]
pub enum DataFileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl DataFileError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// 读取文件内容，文件不存在时返回 `None`
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, DataFileError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DataFileError::io(path, e)),
    }
}

/// 以缩进 JSON 原子写入：先写临时文件再重命名
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), DataFileError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|e| DataFileError::json(path, e))?;
    bytes.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| DataFileError::io(parent, e))?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    fs::write(&temp, &bytes)
        .await
        .map_err(|e| DataFileError::io(&temp, e))?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(DataFileError::io(path, e));
    }
    Ok(())
}
