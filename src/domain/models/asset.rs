// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// 资源类型
///
/// 每个网站最多拥有一个当前的截图、Logo 和 Favicon。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// 页面截图
    Screenshot,
    /// 网站 Logo
    Logo,
    /// 网站图标
    Favicon,
}

impl AssetType {
    /// 全部资源类型，按生成顺序排列
    pub const ALL: [AssetType; 3] = [AssetType::Screenshot, AssetType::Logo, AssetType::Favicon];

    /// 该资源类型允许的输出格式
    pub fn allowed_formats(&self) -> &'static [AssetFormat] {
        match self {
            AssetType::Screenshot => &[AssetFormat::Png, AssetFormat::Jpg, AssetFormat::Webp],
            AssetType::Logo => &[
                AssetFormat::Svg,
                AssetFormat::Png,
                AssetFormat::Jpg,
                AssetFormat::Webp,
            ],
            AssetType::Favicon => &[AssetFormat::Ico, AssetFormat::Png, AssetFormat::Webp],
        }
    }

    /// 判断格式是否被该资源类型接受
    pub fn accepts(&self, format: AssetFormat) -> bool {
        self.allowed_formats().contains(&format)
    }

    /// 该资源类型的最高编码质量
    pub fn max_quality(&self) -> u8 {
        match self {
            AssetType::Screenshot => 90,
            AssetType::Logo => 95,
            AssetType::Favicon => 80,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Screenshot => "screenshot",
            AssetType::Logo => "logo",
            AssetType::Favicon => "favicon",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "screenshot" => Ok(AssetType::Screenshot),
            "logo" => Ok(AssetType::Logo),
            "favicon" => Ok(AssetType::Favicon),
            other => Err(DomainError::UnknownAssetType(other.to_string())),
        }
    }
}

/// 资源文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Png,
    Jpg,
    Webp,
    Svg,
    Ico,
}

impl AssetFormat {
    /// 文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            AssetFormat::Png => "png",
            AssetFormat::Jpg => "jpg",
            AssetFormat::Webp => "webp",
            AssetFormat::Svg => "svg",
            AssetFormat::Ico => "ico",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AssetFormat::Png => "image/png",
            AssetFormat::Jpg => "image/jpeg",
            AssetFormat::Webp => "image/webp",
            AssetFormat::Svg => "image/svg+xml",
            AssetFormat::Ico => "image/x-icon",
        }
    }

    /// 是否为位图格式（可被解码、缩放、重新编码）
    pub fn is_raster(&self) -> bool {
        !matches!(self, AssetFormat::Svg)
    }

    /// 根据文件头识别格式
    ///
    /// 只识别本系统可能产出或下载到的格式，其余返回 `None`。
    pub fn sniff(data: &[u8]) -> Option<AssetFormat> {
        if data.starts_with(&[0x89, b'P', b'N', b'G']) {
            return Some(AssetFormat::Png);
        }
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(AssetFormat::Jpg);
        }
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            return Some(AssetFormat::Webp);
        }
        if data.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
            return Some(AssetFormat::Ico);
        }
        let head = String::from_utf8_lossy(&data[..data.len().min(512)]).to_ascii_lowercase();
        let head = head.trim_start();
        if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
            return Some(AssetFormat::Svg);
        }
        None
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AssetFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(AssetFormat::Png),
            "jpg" | "jpeg" => Ok(AssetFormat::Jpg),
            "webp" => Ok(AssetFormat::Webp),
            "svg" => Ok(AssetFormat::Svg),
            "ico" => Ok(AssetFormat::Ico),
            other => Err(DomainError::UnknownAssetFormat(other.to_string())),
        }
    }
}

/// 像素尺寸，宽高均严格为正
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Result<Self, DomainError> {
        if width == 0 || height == 0 {
            return Err(DomainError::ValidationError(format!(
                "dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 资源的附加尺寸/格式版本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetVariant {
    pub dimensions: Dimensions,
    pub format: AssetFormat,
    pub key: String,
    pub file_size_bytes: u64,
}

/// 资源记录
///
/// 每个 (websiteId, assetType) 组合只存在一条当前记录，
/// 新的生成结果会覆盖旧记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub website_id: String,
    pub asset_type: AssetType,
    pub format: AssetFormat,
    pub dimensions: Dimensions,
    pub file_size_bytes: u64,
    pub generated_at: DateTime<Utc>,
    pub optimized: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<AssetVariant>,
}

impl AssetRecord {
    /// 创建资源记录，格式必须属于资源类型允许的集合
    pub fn new(
        website_id: impl Into<String>,
        asset_type: AssetType,
        format: AssetFormat,
        dimensions: Dimensions,
        file_size_bytes: u64,
    ) -> Result<Self, DomainError> {
        let record = Self {
            website_id: website_id.into(),
            asset_type,
            format,
            dimensions,
            file_size_bytes,
            generated_at: Utc::now(),
            optimized: false,
            variants: Vec::new(),
        };
        record.validate()?;
        Ok(record)
    }

    /// 校验记录不变量
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.website_id.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "websiteId is required".to_string(),
            ));
        }
        if !self.asset_type.accepts(self.format) {
            return Err(DomainError::FormatNotAllowed {
                asset_type: self.asset_type,
                format: self.format,
            });
        }
        Dimensions::new(self.dimensions.width, self.dimensions.height)?;
        Ok(())
    }

    /// 存储中的文件名：`{websiteId}-{assetType}-{timestamp}.{format}`
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.{}",
            self.website_id,
            self.asset_type,
            self.generated_at.timestamp_millis(),
            self.format.extension()
        )
    }

    /// 存储键，按资源类型分目录
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.asset_type, self.file_name())
    }

    /// 某个附加版本的存储键
    pub fn variant_key(&self, dimensions: Dimensions, format: AssetFormat) -> String {
        format!(
            "{}/{}-{}@{}-{}.{}",
            self.asset_type,
            self.website_id,
            self.asset_type,
            dimensions,
            self.generated_at.timestamp_millis(),
            format.extension()
        )
    }

    /// 对外公开的 URL：`{prefix}/{assetType}/{file}`
    pub fn public_url(&self, prefix: &str) -> String {
        public_url_for_key(prefix, &self.storage_key())
    }
}

/// 将存储键拼接为公开 URL
pub fn public_url_for_key(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key)
}

/// 从公开 URL 中还原存储键，前缀不匹配时返回 `None`
pub fn key_from_public_url<'a>(prefix: &str, url: &'a str) -> Option<&'a str> {
    url.strip_prefix(prefix.trim_end_matches('/'))
        .and_then(|rest| rest.strip_prefix('/'))
}
