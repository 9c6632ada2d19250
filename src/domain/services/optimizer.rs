// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use image::codecs::ico::IcoEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use thiserror::Error;
use tracing::debug;

use crate::domain::models::asset::{AssetFormat, AssetType, Dimensions};

/// 超过该大小的输入会额外降低质量
const LARGE_INPUT_BYTES: usize = 1024 * 1024;
/// 大输入降质的下限
const MIN_REDUCED_QUALITY: u8 = 60;
/// ICO 格式单张图片的最大边长
const ICO_MAX_EDGE: u32 = 256;

/// 图片优化错误
#[derive(Error, Debug)]
pub enum OptimizationError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Format {0} cannot be re-encoded")]
    UnsupportedFormat(AssetFormat),
    #[error("Format {format} is not allowed for {asset_type}")]
    FormatNotAllowed {
        asset_type: AssetType,
        format: AssetFormat,
    },
}

/// 优化器配置
#[derive(Debug, Clone, Copy)]
pub struct OptimizerConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub screenshot_quality: u8,
    pub logo_quality: u8,
    pub favicon_quality: u8,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            screenshot_quality: 85,
            logo_quality: 90,
            favicon_quality: 80,
        }
    }
}

/// 单次优化的参数
#[derive(Debug, Clone, Copy)]
pub struct OptimizeOptions {
    pub asset_type: AssetType,
    pub target_width: Option<u32>,
    pub target_height: Option<u32>,
    pub quality: Option<u8>,
    pub format: AssetFormat,
}

impl OptimizeOptions {
    pub fn new(asset_type: AssetType, format: AssetFormat) -> Self {
        Self {
            asset_type,
            target_width: None,
            target_height: None,
            quality: None,
            format,
        }
    }

    pub fn with_target(mut self, dimensions: Dimensions) -> Self {
        self.target_width = Some(dimensions.width);
        self.target_height = Some(dimensions.height);
        self
    }
}

/// 优化结果
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    pub data: Vec<u8>,
    pub format: AssetFormat,
    pub dimensions: Dimensions,
    pub original_size: u64,
    pub optimized_size: u64,
    /// 输出大小与输入大小之比，小于 1 表示变小
    pub compression_ratio: f64,
}

/// 图片优化器
///
/// 纯函数式的重新编码步骤：解码、按比例缩放、按资源类型限制质量后重新编码。
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// 优化图片
    ///
    /// # 参数
    ///
    /// * `input` - 原始图片数据
    /// * `options` - 目标尺寸、质量与格式
    ///
    /// # 返回值
    ///
    /// * `Ok(OptimizedImage)` - 优化后的数据及压缩信息
    /// * `Err(OptimizationError)` - 输入损坏或格式不支持，调用方应保留原图
    pub fn optimize(
        &self,
        input: &[u8],
        options: OptimizeOptions,
    ) -> Result<OptimizedImage, OptimizationError> {
        if !options.asset_type.accepts(options.format) {
            return Err(OptimizationError::FormatNotAllowed {
                asset_type: options.asset_type,
                format: options.format,
            });
        }
        if !options.format.is_raster() {
            return Err(OptimizationError::UnsupportedFormat(options.format));
        }
        if AssetFormat::sniff(input) == Some(AssetFormat::Svg) {
            return Err(OptimizationError::UnsupportedFormat(AssetFormat::Svg));
        }

        let image =
            image::load_from_memory(input).map_err(|e| OptimizationError::Decode(e.to_string()))?;
        let original = Dimensions::new(image.width(), image.height())
            .map_err(|e| OptimizationError::Decode(e.to_string()))?;

        let (mut max_width, mut max_height) = (self.config.max_width, self.config.max_height);
        if options.format == AssetFormat::Ico {
            max_width = max_width.min(ICO_MAX_EDGE);
            max_height = max_height.min(ICO_MAX_EDGE);
        }
        let target = compute_target_dimensions(
            original,
            options.target_width,
            options.target_height,
            max_width,
            max_height,
        );

        let resized = if target == original {
            image
        } else {
            image.resize_exact(target.width, target.height, FilterType::Lanczos3)
        };

        let quality = self.effective_quality(options.asset_type, options.quality, input.len());
        let data = encode_image(&resized, options.format, quality)?;

        let original_size = input.len() as u64;
        let optimized_size = data.len() as u64;
        let compression_ratio = if original_size == 0 {
            1.0
        } else {
            optimized_size as f64 / original_size as f64
        };

        debug!(
            asset_type = %options.asset_type,
            format = %options.format,
            from = %original,
            to = %target,
            quality,
            original_size,
            optimized_size,
            "Image optimized"
        );

        Ok(OptimizedImage {
            data,
            format: options.format,
            dimensions: target,
            original_size,
            optimized_size,
            compression_ratio,
        })
    }

    /// 计算实际使用的编码质量
    ///
    /// 先按资源类型封顶，输入超过 1MB 时再降低 10（不低于 60）。
    pub fn effective_quality(
        &self,
        asset_type: AssetType,
        requested: Option<u8>,
        input_len: usize,
    ) -> u8 {
        let configured = requested.unwrap_or(match asset_type {
            AssetType::Screenshot => self.config.screenshot_quality,
            AssetType::Logo => self.config.logo_quality,
            AssetType::Favicon => self.config.favicon_quality,
        });
        let quality = configured.clamp(1, asset_type.max_quality());
        if input_len > LARGE_INPUT_BYTES {
            quality
                .saturating_sub(10)
                .max(MIN_REDUCED_QUALITY.min(quality))
        } else {
            quality
        }
    }
}

/// 计算保持宽高比的目标尺寸
///
/// 未指定目标时只缩小不放大；任何情况下都不超过最大宽高。
pub fn compute_target_dimensions(
    original: Dimensions,
    target_width: Option<u32>,
    target_height: Option<u32>,
    max_width: u32,
    max_height: u32,
) -> Dimensions {
    let (box_width, box_height) = if target_width.is_none() && target_height.is_none() {
        (original.width.min(max_width), original.height.min(max_height))
    } else {
        (
            target_width.unwrap_or(u32::MAX).min(max_width),
            target_height.unwrap_or(u32::MAX).min(max_height),
        )
    };

    let scale = (box_width.max(1) as f64 / original.width as f64)
        .min(box_height.max(1) as f64 / original.height as f64);

    let width = ((original.width as f64 * scale).round() as u32).max(1);
    let height = ((original.height as f64 * scale).round() as u32).max(1);
    Dimensions { width, height }
}

/// 将图片编码为指定格式
pub fn encode_image(
    image: &DynamicImage,
    format: AssetFormat,
    quality: u8,
) -> Result<Vec<u8>, OptimizationError> {
    let mut out = Vec::new();
    let (width, height) = (image.width(), image.height());
    let result = match format {
        AssetFormat::Png => {
            let rgba = image.to_rgba8();
            PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilterType::Adaptive)
                .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
        }
        AssetFormat::Jpg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        AssetFormat::Webp => {
            // image 的 WebP 编码器只支持无损模式，质量参数不生效
            let rgba = image.to_rgba8();
            WebPEncoder::new_lossless(&mut out).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )
        }
        AssetFormat::Ico => {
            let rgba = image.to_rgba8();
            IcoEncoder::new(&mut out).write_image(
                rgba.as_raw(),
                width,
                height,
                ExtendedColorType::Rgba8,
            )
        }
        AssetFormat::Svg => return Err(OptimizationError::UnsupportedFormat(format)),
    };
    result.map_err(|e| OptimizationError::Encode(e.to_string()))?;
    Ok(out)
}

/// 读取位图尺寸
pub fn raster_dimensions(data: &[u8]) -> Option<Dimensions> {
    let image = image::load_from_memory(data).ok()?;
    Dimensions::new(image.width(), image.height()).ok()
}
