// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 资源生成器
//!
//! 每个生成器负责一种资源：打开浏览器会话，必要时登录，截取或定位资源，
//! 优化后写入资源仓库。Logo 与 Favicon 在页面中找不到时使用确定性的
//! 合成资源作为回退。

pub mod favicon;
pub mod fallback;
mod glyphs;
pub mod logo;
pub mod screenshot;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::models::asset::{AssetFormat, AssetRecord, AssetType, Dimensions};
use crate::domain::models::credential::CredentialRecord;
use crate::domain::models::website::WebsiteRecord;
use crate::domain::repositories::asset_repository::{AssetRepository, AssetUpload, VariantUpload};
use crate::domain::services::optimizer::{self, OptimizeOptions, Optimizer};
use crate::engines::session::{BrowserSession, SessionOptions};
use crate::engines::traits::{BrowserEngine, EngineError};
use crate::utils::retry_policy::is_retryable_error;

pub use favicon::FaviconGenerator;
pub use logo::LogoGenerator;
pub use screenshot::ScreenshotGenerator;

/// SVG 没有声明尺寸时使用的名义尺寸
const NOMINAL_SVG_EDGE: u32 = 512;

/// 生成失败
///
/// 携带网站 id 与根因；`retryable` 决定编排器是否再次尝试。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to generate {asset_type} for {website_id}: {message}")]
pub struct GenerationError {
    pub website_id: String,
    pub asset_type: AssetType,
    pub message: String,
    pub retryable: bool,
}

impl GenerationError {
    pub fn new(
        website_id: impl Into<String>,
        asset_type: AssetType,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            website_id: website_id.into(),
            asset_type,
            message: message.into(),
            retryable,
        }
    }

    fn from_engine(website_id: &str, asset_type: AssetType, error: EngineError) -> Self {
        let retryable = error.is_retryable();
        Self::new(website_id, asset_type, error.to_string(), retryable)
    }
}

/// 附加版本规格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub width: u32,
    pub height: u32,
    pub format: AssetFormat,
}

impl VariantSpec {
    pub fn new(width: u32, height: u32, format: AssetFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }
}

/// 生成结果
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    /// 已写入仓库的记录
    pub record: AssetRecord,
    /// 前端引用的公开 URL
    pub public_url: String,
    /// 登录失败原因（资源仍然生成）
    pub auth_error: Option<String>,
    /// 该网站需要人工登录
    pub needs_manual_auth: bool,
    /// 是否为合成的回退资源
    pub fallback: bool,
}

/// 资源生成器特质
#[async_trait]
pub trait AssetGenerator: Send + Sync {
    /// 生成的资源类型
    fn asset_type(&self) -> AssetType;

    /// 访问网站并生成资源
    ///
    /// # 参数
    ///
    /// * `website` - 目标网站
    /// * `credential` - 该网站的凭据；只有 `requires_auth` 为真时才会使用
    async fn generate(
        &self,
        website: &WebsiteRecord,
        credential: Option<&CredentialRecord>,
    ) -> Result<GeneratedAsset, GenerationError>;

    /// 不访问网络的合成资源
    ///
    /// 没有回退路径的资源类型返回不可重试的错误。
    async fn generate_fallback(
        &self,
        website: &WebsiteRecord,
    ) -> Result<GeneratedAsset, GenerationError> {
        Err(GenerationError::new(
            &website.id,
            self.asset_type(),
            format!("{} has no synthetic fallback", self.asset_type()),
            false,
        ))
    }
}

/// 生成器共享的依赖
#[derive(Clone)]
pub struct GeneratorContext {
    pub engine: Arc<dyn BrowserEngine>,
    pub repository: Arc<dyn AssetRepository>,
    /// 为 `None` 时原样保存
    pub optimizer: Option<Arc<Optimizer>>,
    pub session: SessionOptions,
    pub variants: Vec<VariantSpec>,
}

impl GeneratorContext {
    pub fn new(engine: Arc<dyn BrowserEngine>, repository: Arc<dyn AssetRepository>) -> Self {
        Self {
            engine,
            repository,
            optimizer: None,
            session: SessionOptions::default(),
            variants: Vec::new(),
        }
    }

    pub fn with_optimizer(mut self, optimizer: Arc<Optimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    pub fn with_variants(mut self, variants: Vec<VariantSpec>) -> Self {
        self.variants = variants;
        self
    }
}

/// 登录步骤的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AuthOutcome {
    pub auth_error: Option<String>,
    pub needs_manual_auth: bool,
}

/// 打开网站并按需登录
///
/// 登录失败不会中断生成：字段缺失、无法自动化等情况记录在 `AuthOutcome` 中，
/// 只有暂时性错误会作为可重试的生成错误返回。
pub(crate) async fn open_and_authenticate(
    context: &GeneratorContext,
    session: &mut BrowserSession,
    website: &WebsiteRecord,
    credential: Option<&CredentialRecord>,
    asset_type: AssetType,
) -> Result<AuthOutcome, GenerationError> {
    session
        .open(&website.url, context.session.navigation_timeout)
        .await
        .map_err(|e| GenerationError::from_engine(&website.id, asset_type, e))?;

    let credential = match (website.requires_auth, credential) {
        (true, Some(credential)) => credential,
        (true, None) => {
            debug!(website_id = %website.id, "No credential stored, continuing unauthenticated");
            return Ok(AuthOutcome::default());
        }
        (false, _) => return Ok(AuthOutcome::default()),
    };

    match session.authenticate(credential).await {
        Ok(true) => {
            info!(website_id = %website.id, method = credential.method.name(), "Authenticated");
            Ok(AuthOutcome::default())
        }
        Ok(false) => {
            warn!(website_id = %website.id, "Authentication did not leave the login page");
            Ok(AuthOutcome {
                auth_error: Some("authentication did not leave the login page".to_string()),
                needs_manual_auth: false,
            })
        }
        Err(EngineError::NotAutomated(method)) => {
            info!(website_id = %website.id, method = %method, "Manual authentication required");
            Ok(AuthOutcome {
                auth_error: None,
                needs_manual_auth: true,
            })
        }
        Err(e) if e.is_retryable() => Err(GenerationError::from_engine(&website.id, asset_type, e)),
        Err(e) => {
            warn!(website_id = %website.id, error = %e, "Authentication failed, continuing unauthenticated");
            Ok(AuthOutcome {
                auth_error: Some(e.to_string()),
                needs_manual_auth: false,
            })
        }
    }
}

/// 资源的像素尺寸，位图解码失败时返回 `None`
pub fn asset_dimensions(data: &[u8], format: AssetFormat) -> Option<Dimensions> {
    if format.is_raster() {
        optimizer::raster_dimensions(data)
    } else {
        Some(svg_dimensions(data))
    }
}

static SVG_VIEWBOX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"viewBox\s*=\s*["']\s*[-\d.]+[\s,]+[-\d.]+[\s,]+([\d.]+)[\s,]+([\d.]+)\s*["']"#)
        .expect("Failed to compile viewBox regex")
});
static SVG_WIDTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<svg[^>]*?\swidth\s*=\s*["']([\d.]+)(px)?["']"#)
        .expect("Failed to compile width regex")
});
static SVG_HEIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<svg[^>]*?\sheight\s*=\s*["']([\d.]+)(px)?["']"#)
        .expect("Failed to compile height regex")
});

/// 从 SVG 文档中读取尺寸
///
/// 优先使用根元素的 width/height，其次 viewBox，都没有时为 512x512。
pub fn svg_dimensions(data: &[u8]) -> Dimensions {
    let text = String::from_utf8_lossy(data);
    let parse = |re: &Regex, group: usize| -> Option<u32> {
        re.captures(&text)
            .and_then(|c| c.get(group))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|v| v.round() as u32)
            .filter(|v| *v > 0)
    };

    let from_attrs = parse(&SVG_WIDTH, 1).zip(parse(&SVG_HEIGHT, 1));
    let from_viewbox = parse(&SVG_VIEWBOX, 1).zip(parse(&SVG_VIEWBOX, 2));
    let (width, height) = from_attrs
        .or(from_viewbox)
        .unwrap_or((NOMINAL_SVG_EDGE, NOMINAL_SVG_EDGE));
    Dimensions { width, height }
}

/// 待保存的原始资源
pub(crate) struct Capture {
    pub data: Vec<u8>,
    pub format: AssetFormat,
    pub fallback: bool,
}

/// 优化、生成附加版本并写入仓库
pub(crate) async fn persist(
    context: &GeneratorContext,
    website: &WebsiteRecord,
    asset_type: AssetType,
    capture: Capture,
    auth: AuthOutcome,
) -> Result<GeneratedAsset, GenerationError> {
    let fail = |message: String, retryable: bool| {
        GenerationError::new(&website.id, asset_type, message, retryable)
    };

    let Capture {
        mut data,
        format,
        fallback,
    } = capture;
    let mut dimensions = asset_dimensions(&data, format)
        .ok_or_else(|| fail(format!("captured {} data could not be decoded", format), false))?;
    let source = data.clone();
    let mut optimized = false;

    if let (Some(optimizer), true) = (&context.optimizer, format.is_raster()) {
        match optimizer.optimize(&data, OptimizeOptions::new(asset_type, format)) {
            Ok(result) if result.data.len() >= data.len() => {
                debug!(
                    website_id = %website.id,
                    %asset_type,
                    original_size = data.len(),
                    optimized_size = result.data.len(),
                    "Optimized output is not smaller, keeping original"
                );
            }
            Ok(result) => {
                debug!(
                    website_id = %website.id,
                    %asset_type,
                    ratio = result.compression_ratio,
                    "Optimized asset"
                );
                data = result.data;
                dimensions = result.dimensions;
                optimized = true;
            }
            Err(e) => {
                warn!(website_id = %website.id, %asset_type, error = %e, "Optimization failed, keeping original");
            }
        }
    }

    let mut record = AssetRecord::new(
        &website.id,
        asset_type,
        format,
        dimensions,
        data.len() as u64,
    )
    .map_err(|e| fail(e.to_string(), false))?;
    record.optimized = optimized;

    let variants = render_variants(context, website, asset_type, format, &source);
    let upload = AssetUpload {
        record,
        data,
        variants,
    };

    let stored = context.repository.store(upload).await.map_err(|e| {
        let message = e.to_string();
        let retryable = is_retryable_error(&message);
        fail(message, retryable)
    })?;

    metrics::counter!("assets_generated_total", "asset_type" => asset_type.as_str()).increment(1);
    if fallback {
        metrics::counter!("assets_fallback_total", "asset_type" => asset_type.as_str())
            .increment(1);
    }

    let public_url = context.repository.public_url(&stored);
    info!(
        website_id = %website.id,
        %asset_type,
        format = %stored.format,
        dimensions = %stored.dimensions,
        fallback,
        url = %public_url,
        "Asset stored"
    );

    Ok(GeneratedAsset {
        record: stored,
        public_url,
        auth_error: auth.auth_error,
        needs_manual_auth: auth.needs_manual_auth,
        fallback,
    })
}

/// 按配置生成附加版本，单个版本失败只记录日志
fn render_variants(
    context: &GeneratorContext,
    website: &WebsiteRecord,
    asset_type: AssetType,
    format: AssetFormat,
    source: &[u8],
) -> Vec<VariantUpload> {
    if context.variants.is_empty() {
        return Vec::new();
    }
    if !format.is_raster() {
        debug!(website_id = %website.id, %asset_type, "Vector source, skipping raster variants");
        return Vec::new();
    }

    let default_optimizer = Optimizer::default();
    let optimizer = context.optimizer.as_deref().unwrap_or(&default_optimizer);

    context
        .variants
        .iter()
        .filter_map(|spec| {
            let target = match Dimensions::new(spec.width, spec.height) {
                Ok(target) => target,
                Err(e) => {
                    warn!(website_id = %website.id, %asset_type, error = %e, "Skipping variant");
                    return None;
                }
            };
            let options = OptimizeOptions::new(asset_type, spec.format).with_target(target);
            match optimizer.optimize(source, options) {
                Ok(result) => Some(VariantUpload {
                    dimensions: result.dimensions,
                    format: spec.format,
                    data: result.data,
                }),
                Err(e) => {
                    warn!(
                        website_id = %website.id,
                        %asset_type,
                        variant = %target,
                        format = %spec.format,
                        error = %e,
                        "Variant generation failed, skipping"
                    );
                    None
                }
            }
        })
        .collect()
}
