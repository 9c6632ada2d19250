// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;
use url::Url;

/// URL 校验错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("is not a valid URL: {0}")]
    Parse(String),
    #[error("must use http or https, got {0}")]
    Scheme(String),
    #[error("must have a host")]
    MissingHost,
}

/// 校验 URL 是否为带主机名的 http/https 地址
pub fn validate_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::Scheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}

/// 将页面中的相对地址解析为绝对地址
///
/// `data:` URI 原样返回；无法解析时返回 `None`。
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("data:") {
        return Some(href.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// 站点根目录下的 `/favicon.ico`
pub fn default_favicon_url(page_url: &str) -> Option<String> {
    let url = Url::parse(page_url).ok()?;
    url.join("/favicon.ico").ok().map(|u| u.to_string())
}
