// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::generators::VariantSpec;
use crate::domain::models::asset::AssetFormat;
use crate::domain::services::optimizer::OptimizerConfig;
use crate::engines::session::SessionOptions;
use crate::engines::traits::Viewport;
use crate::workers::orchestrator::BatchConfig;

/// 应用程序配置设置
///
/// 包含浏览器、流水线、存储、优化器、文件路径、日志与指标等配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 浏览器配置
    pub browser: BrowserSettings,
    /// 流水线配置
    pub pipeline: PipelineSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 图片优化配置
    pub optimizer: OptimizerSettings,
    /// 数据文件路径
    pub paths: PathSettings,
    /// 日志配置
    pub logging: LoggingSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 各资源类型的附加版本
    #[serde(default)]
    pub variants: VariantSettings,
}

/// 浏览器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// 远程调试地址，设置后不再启动本地浏览器
    pub remote_debugging_url: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// CDP 请求超时（毫秒）
    pub request_timeout_ms: u64,
    pub headless: bool,
}

/// 流水线配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    /// 每批并发处理的网站数
    pub batch_size: usize,
    /// 每个网站的最大尝试次数
    pub per_item_retries: u32,
    /// 线性退避基数（毫秒）
    pub backoff_base_ms: u64,
    /// 批次之间的等待时间（毫秒）
    pub inter_batch_delay_ms: u64,
    /// 导航超时（毫秒）
    pub navigation_timeout_ms: u64,
    /// 网络空闲等待（毫秒）
    pub network_idle_ms: u64,
    /// 是否在保存前优化图片
    pub optimize: bool,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 存储类型 (local, s3, memory)
    pub storage_type: String,
    /// 本地存储路径 (当 type=local 时使用)
    pub local_path: Option<String>,
    /// 公开 URL 前缀
    pub public_prefix: String,
    /// S3 区域
    pub s3_region: Option<String>,
    /// S3 存储桶名称
    pub s3_bucket: Option<String>,
    /// S3 访问密钥
    pub s3_access_key: Option<String>,
    /// S3 密钥
    pub s3_secret_key: Option<String>,
    /// S3 端点 (可选，用于 MinIO 等兼容服务)
    pub s3_endpoint: Option<String>,
}

/// 图片优化配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerSettings {
    pub max_width: u32,
    pub max_height: u32,
    pub screenshot_quality: u8,
    pub logo_quality: u8,
    pub favicon_quality: u8,
}

/// 数据文件路径
#[derive(Debug, Clone, Deserialize)]
pub struct PathSettings {
    /// 网站目录文件
    pub websites_file: String,
    /// 凭据文件
    pub credentials_file: String,
    /// 构建报告输出文件
    pub report_file: String,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 是否输出 JSON 格式日志
    pub json: bool,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: String,
}

/// 附加版本配置
#[derive(Debug, Clone, Deserialize)]
pub struct VariantSettings {
    #[serde(default)]
    pub screenshot: Vec<VariantSpec>,
    #[serde(default)]
    pub logo: Vec<VariantSpec>,
    #[serde(default)]
    pub favicon: Vec<VariantSpec>,
}

impl Default for VariantSettings {
    fn default() -> Self {
        Self {
            screenshot: vec![
                VariantSpec::new(1280, 720, AssetFormat::Webp),
                VariantSpec::new(640, 360, AssetFormat::Webp),
            ],
            logo: vec![VariantSpec::new(256, 256, AssetFormat::Png)],
            favicon: vec![
                VariantSpec::new(32, 32, AssetFormat::Png),
                VariantSpec::new(16, 16, AssetFormat::Png),
            ],
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次叠加默认值、`config/default`、`config/{SITESHOT_ENV}` 和
    /// `SITESHOT__` 前缀的环境变量
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_file(None)
    }

    /// 额外叠加一个显式指定的配置文件（优先级高于 config/ 目录）
    pub fn with_file(path: Option<&str>) -> Result<Self, ConfigError> {
        let env = std::env::var("SITESHOT_ENV").unwrap_or_else(|_| "default".to_string());
        let mut builder = Config::builder()
            // Browser
            .set_default("browser.viewport_width", 1920)?
            .set_default("browser.viewport_height", 1080)?
            .set_default("browser.request_timeout_ms", 30_000)?
            .set_default("browser.headless", true)?
            // Pipeline
            .set_default("pipeline.batch_size", 3)?
            .set_default("pipeline.per_item_retries", 3)?
            .set_default("pipeline.backoff_base_ms", 2_000)?
            .set_default("pipeline.inter_batch_delay_ms", 3_000)?
            .set_default("pipeline.navigation_timeout_ms", 30_000)?
            .set_default("pipeline.network_idle_ms", 1_500)?
            .set_default("pipeline.optimize", true)?
            // Storage
            .set_default("storage.storage_type", "local")?
            .set_default("storage.local_path", "./public/assets")?
            .set_default("storage.public_prefix", "/assets")?
            // Optimizer
            .set_default("optimizer.max_width", 1920)?
            .set_default("optimizer.max_height", 1080)?
            .set_default("optimizer.screenshot_quality", 85)?
            .set_default("optimizer.logo_quality", 90)?
            .set_default("optimizer.favicon_quality", 80)?
            // Paths
            .set_default("paths.websites_file", "data/websites.json")?
            .set_default("paths.credentials_file", "data/credentials.json")?
            .set_default("paths.report_file", "data/build-report.json")?
            // Observability
            .set_default("logging.json", false)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen_addr", "0.0.0.0:9000")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder
            .add_source(Environment::with_prefix("SITESHOT").separator("__"))
            .build()?
            .try_deserialize()
    }
}

impl PipelineSettings {
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            per_item_retries: self.per_item_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            inter_batch_delay: Duration::from_millis(self.inter_batch_delay_ms),
        }
    }
}

impl Settings {
    /// 浏览器会话参数
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            viewport: Viewport {
                width: self.browser.viewport_width,
                height: self.browser.viewport_height,
            },
            navigation_timeout: Duration::from_millis(self.pipeline.navigation_timeout_ms),
            network_idle: Duration::from_millis(self.pipeline.network_idle_ms),
        }
    }
}

impl From<&OptimizerSettings> for OptimizerConfig {
    fn from(settings: &OptimizerSettings) -> Self {
        OptimizerConfig {
            max_width: settings.max_width,
            max_height: settings.max_height,
            screenshot_quality: settings.screenshot_quality,
            logo_quality: settings.logo_quality,
            favicon_quality: settings.favicon_quality,
        }
    }
}
