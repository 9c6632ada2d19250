// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fmt;
use thiserror::Error;

use crate::domain::models::asset::{AssetFormat, AssetType};

/// 领域错误类型
///
/// 表示在领域层可能发生的各种错误情况，包括状态转换错误
/// 和实体不变量被破坏的情况。
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换，当网站状态转换不符合业务规则时发生
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// 验证错误，当输入数据不符合领域规则时发生
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 资源格式不属于资源类型允许的集合
    #[error("Format {format} is not allowed for asset type {asset_type}")]
    FormatNotAllowed {
        asset_type: AssetType,
        format: AssetFormat,
    },

    #[error("Unknown asset type: {0}")]
    UnknownAssetType(String),

    #[error("Unknown asset format: {0}")]
    UnknownAssetFormat(String),
}

/// 校验失败
///
/// 收集全部被违反的规则，而不是只报告第一条。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<String>,
}

impl ValidationError {
    pub fn new(violations: Vec<String>) -> Self {
        Self { violations }
    }

    pub fn single(violation: impl Into<String>) -> Self {
        Self {
            violations: vec![violation.into()],
        }
    }

    /// 被违反的规则列表
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// 若收集到任何违规则返回错误
    pub fn check(violations: Vec<String>) -> Result<(), ValidationError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self::new(violations))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: {}", self.violations.join("; "))
    }
}
