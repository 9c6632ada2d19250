// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::domain::errors::{DomainError, ValidationError};
use crate::domain::models::asset::AssetType;
use crate::engines::validators;

/// 网站记录
///
/// 目录中的一个站点。由导入步骤创建，在生成过程中由批处理编排器
/// 推进其状态，并写回生成的资源路径。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteRecord {
    /// 稳定且唯一的标识符
    #[validate(length(min = 1, message = "id is required"))]
    pub id: String,
    /// 展示名称
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    /// 站点地址，必须为 http/https
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,
    /// 站点描述，50-200 个字符
    #[validate(length(
        min = 50,
        max = 200,
        message = "description must be between 50 and 200 characters"
    ))]
    pub description: String,
    /// 是否需要登录后才能截图
    #[serde(default)]
    pub requires_auth: bool,
    /// 当前处理状态
    #[serde(default)]
    pub state: WebsiteState,
    /// 最近一次状态变更时间
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_path: Option<String>,
    /// 登录失败原因（不影响资源生成）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_error: Option<String>,
    /// 最近一次资源生成失败原因
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_error: Option<String>,
    /// 需要人工登录
    #[serde(default)]
    pub needs_manual_auth: bool,
}

fn validate_http_url(url: &str) -> Result<(), validator::ValidationError> {
    validators::validate_url(url).map(|_| ()).map_err(|e| {
        let mut error = validator::ValidationError::new("url");
        error.message = Some(Cow::Owned(format!("url {}", e)));
        error
    })
}

/// 网站处理状态
///
/// 状态转换遵循以下流程：
/// Pending → Processing → Completed / Retry / Failed，Retry → Processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebsiteState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Retry,
}

impl fmt::Display for WebsiteState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WebsiteState::Pending => write!(f, "pending"),
            WebsiteState::Processing => write!(f, "processing"),
            WebsiteState::Completed => write!(f, "completed"),
            WebsiteState::Failed => write!(f, "failed"),
            WebsiteState::Retry => write!(f, "retry"),
        }
    }
}

impl FromStr for WebsiteState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WebsiteState::Pending),
            "processing" => Ok(WebsiteState::Processing),
            "completed" => Ok(WebsiteState::Completed),
            "failed" => Ok(WebsiteState::Failed),
            "retry" => Ok(WebsiteState::Retry),
            _ => Err(()),
        }
    }
}

impl WebsiteRecord {
    /// 创建一个待处理的网站记录
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
        requires_auth: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            description: description.into(),
            requires_auth,
            state: WebsiteState::Pending,
            last_updated: Utc::now(),
            screenshot_path: None,
            logo_path: None,
            favicon_path: None,
            auth_error: None,
            asset_error: None,
            needs_manual_auth: false,
        }
    }

    /// 校验记录，返回全部违规项
    pub fn validate_record(&self) -> Result<(), ValidationError> {
        match self.validate() {
            Ok(()) => Ok(()),
            Err(errors) => {
                let mut violations: Vec<String> = errors
                    .field_errors()
                    .into_iter()
                    .flat_map(|(field, errs)| {
                        errs.iter().map(move |e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| format!("{} is invalid", field))
                        })
                    })
                    .collect();
                violations.sort();
                Err(ValidationError::new(violations))
            }
        }
    }

    /// 开始处理
    ///
    /// 除 Processing 以外的任何状态都可以重新进入处理流程。
    pub fn begin(&mut self) -> Result<(), DomainError> {
        match self.state {
            WebsiteState::Processing => Err(self.invalid(WebsiteState::Processing)),
            _ => {
                self.transition(WebsiteState::Processing);
                Ok(())
            }
        }
    }

    /// 标记处理成功
    pub fn complete(&mut self) -> Result<(), DomainError> {
        match self.state {
            WebsiteState::Processing => {
                self.asset_error = None;
                self.transition(WebsiteState::Completed);
                Ok(())
            }
            _ => Err(self.invalid(WebsiteState::Completed)),
        }
    }

    /// 标记等待重试
    pub fn mark_retry(&mut self) -> Result<(), DomainError> {
        match self.state {
            WebsiteState::Processing => {
                self.transition(WebsiteState::Retry);
                Ok(())
            }
            _ => Err(self.invalid(WebsiteState::Retry)),
        }
    }

    /// 标记失败并记录原因
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        match self.state {
            WebsiteState::Processing | WebsiteState::Retry => {
                self.asset_error = Some(reason.into());
                self.transition(WebsiteState::Failed);
                Ok(())
            }
            _ => Err(self.invalid(WebsiteState::Failed)),
        }
    }

    /// 读取某类资源的公开路径
    pub fn asset_path(&self, asset_type: AssetType) -> Option<&str> {
        match asset_type {
            AssetType::Screenshot => self.screenshot_path.as_deref(),
            AssetType::Logo => self.logo_path.as_deref(),
            AssetType::Favicon => self.favicon_path.as_deref(),
        }
    }

    /// 写入某类资源的公开路径
    pub fn set_asset_path(&mut self, asset_type: AssetType, path: String) {
        match asset_type {
            AssetType::Screenshot => self.screenshot_path = Some(path),
            AssetType::Logo => self.logo_path = Some(path),
            AssetType::Favicon => self.favicon_path = Some(path),
        }
    }

    fn transition(&mut self, to: WebsiteState) {
        self.state = to;
        self.last_updated = Utc::now();
    }

    fn invalid(&self, to: WebsiteState) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}
