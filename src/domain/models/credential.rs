// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::errors::ValidationError;

/// 用户名/密码凭据
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 认证方式
///
/// 每种方式携带自己需要的字段，登录流程按变体分派。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// 表单登录
    Email(PasswordCredentials),
    /// 第三方登录，找不到提供方按钮时可选地退回表单登录
    OAuth {
        provider: String,
        fallback: Option<PasswordCredentials>,
    },
    /// 单点登录，字段名到值的映射
    Sso { fields: BTreeMap<String, String> },
    /// 需要人工完成登录
    Manual { fields: BTreeMap<String, String> },
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Email(_) => "email",
            AuthMethod::OAuth { .. } => "oauth",
            AuthMethod::Sso { .. } => "sso",
            AuthMethod::Manual { .. } => "manual",
        }
    }

    fn has_password(&self) -> bool {
        match self {
            AuthMethod::Email(c) => !c.password.is_empty(),
            AuthMethod::OAuth { fallback, .. } => {
                fallback.as_ref().is_some_and(|c| !c.password.is_empty())
            }
            AuthMethod::Sso { .. } | AuthMethod::Manual { .. } => false,
        }
    }
}

/// 凭据记录
///
/// 一个网站对应一条认证配置。序列化格式为扁平的 JSON 对象：
/// `{"websiteId", "method", "username", "password", "oauthProvider", "additionalFields"}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CredentialEntry", into = "CredentialEntry")]
pub struct CredentialRecord {
    pub website_id: String,
    pub method: AuthMethod,
}

impl CredentialRecord {
    pub fn new(website_id: impl Into<String>, method: AuthMethod) -> Self {
        Self {
            website_id: website_id.into(),
            method,
        }
    }

    pub fn email(
        website_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(
            website_id,
            AuthMethod::Email(PasswordCredentials {
                username: username.into(),
                password: password.into(),
            }),
        )
    }

    /// 校验记录形状，收集全部违规项
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        if self.website_id.trim().is_empty() {
            violations.push("websiteId is required".to_string());
        }

        match &self.method {
            AuthMethod::Email(credentials) => {
                check_password_credentials(credentials, "", &mut violations);
            }
            AuthMethod::OAuth { provider, fallback } => {
                if provider.trim().is_empty() {
                    violations.push("oauthProvider is required".to_string());
                }
                if let Some(credentials) = fallback {
                    check_password_credentials(credentials, "fallback ", &mut violations);
                }
            }
            AuthMethod::Sso { fields } | AuthMethod::Manual { fields } => {
                if fields.keys().any(|k| k.trim().is_empty()) {
                    violations.push("additionalFields keys must not be empty".to_string());
                }
            }
        }

        ValidationError::check(violations)
    }

    /// 不含敏感信息的摘要
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            website_id: self.website_id.clone(),
            method: self.method.name().to_string(),
            has_password: self.method.has_password(),
        }
    }
}

fn check_password_credentials(
    credentials: &PasswordCredentials,
    prefix: &str,
    violations: &mut Vec<String>,
) {
    if credentials.username.trim().is_empty() {
        violations.push(format!("{}username is required", prefix));
    }
    if credentials.password.is_empty() {
        violations.push(format!("{}password is required", prefix));
    }
}

/// 凭据摘要，用于列表展示
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub website_id: String,
    pub method: String,
    pub has_password: bool,
}

/// 凭据文件中的原始条目
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEntry {
    pub website_id: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_provider: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_fields: BTreeMap<String, String>,
}

impl TryFrom<CredentialEntry> for CredentialRecord {
    type Error = ValidationError;

    fn try_from(entry: CredentialEntry) -> Result<Self, Self::Error> {
        let method = match entry.method.trim().to_ascii_lowercase().as_str() {
            "email" => AuthMethod::Email(PasswordCredentials {
                username: entry.username.unwrap_or_default(),
                password: entry.password.unwrap_or_default(),
            }),
            "oauth" => {
                let fallback = match (entry.username, entry.password) {
                    (None, None) => None,
                    (username, password) => Some(PasswordCredentials {
                        username: username.unwrap_or_default(),
                        password: password.unwrap_or_default(),
                    }),
                };
                AuthMethod::OAuth {
                    provider: entry.oauth_provider.unwrap_or_default(),
                    fallback,
                }
            }
            "sso" => AuthMethod::Sso {
                fields: entry.additional_fields,
            },
            "manual" => AuthMethod::Manual {
                fields: entry.additional_fields,
            },
            other => {
                let mut violations = Vec::new();
                if entry.website_id.trim().is_empty() {
                    violations.push("websiteId is required".to_string());
                }
                violations.push(format!("unsupported authentication method: {}", other));
                return Err(ValidationError::new(violations));
            }
        };

        let record = CredentialRecord {
            website_id: entry.website_id,
            method,
        };
        record.validate()?;
        Ok(record)
    }
}

impl From<CredentialRecord> for CredentialEntry {
    fn from(record: CredentialRecord) -> Self {
        let mut entry = CredentialEntry {
            website_id: record.website_id,
            method: record.method.name().to_string(),
            ..Default::default()
        };
        match record.method {
            AuthMethod::Email(c) => {
                entry.username = Some(c.username);
                entry.password = Some(c.password);
            }
            AuthMethod::OAuth { provider, fallback } => {
                entry.oauth_provider = Some(provider);
                if let Some(c) = fallback {
                    entry.username = Some(c.username);
                    entry.password = Some(c.password);
                }
            }
            AuthMethod::Sso { fields } | AuthMethod::Manual { fields } => {
                entry.additional_fields = fields;
            }
        }
        entry
    }
}
