// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::errors::ValidationError;
use crate::domain::models::asset::AssetFormat;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 导航失败（网络错误、页面崩溃等）
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 登录表单中找不到必需的字段
    #[error("Login field not found: {0}")]
    FieldNotFound(String),
    /// 该认证方式无法自动完成
    #[error("Authentication method {0} is not automated")]
    NotAutomated(String),
    /// 凭据形状不合法
    #[error("Invalid credential: {0}")]
    InvalidCredential(#[from] ValidationError),
    /// URL 不合法
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// 浏览器无法启动
    #[error("Browser launch failed: {0}")]
    Launch(String),
    /// 会话尚未启动或已关闭
    #[error("Browser session is not open")]
    SessionClosed,
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 导航失败、超时以及连接类请求错误返回 true，其余返回 false
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::Navigation(_) | EngineError::Timeout => true,
            _ => false,
        }
    }
}

/// 认证步骤的错误视图
pub type AuthError = EngineError;

/// 视口尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// 截图区域（CSS 像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 浏览器可直接输出的截图格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    Png,
    Jpeg,
    Webp,
}

impl CaptureFormat {
    /// 资源格式对应的截图格式，SVG 与 ICO 无法直接截取
    pub fn from_asset_format(format: AssetFormat) -> Option<Self> {
        match format {
            AssetFormat::Png => Some(CaptureFormat::Png),
            AssetFormat::Jpg => Some(CaptureFormat::Jpeg),
            AssetFormat::Webp => Some(CaptureFormat::Webp),
            AssetFormat::Svg | AssetFormat::Ico => None,
        }
    }

    pub fn asset_format(&self) -> AssetFormat {
        match self {
            CaptureFormat::Png => AssetFormat::Png,
            CaptureFormat::Jpeg => AssetFormat::Jpg,
            CaptureFormat::Webp => AssetFormat::Webp,
        }
    }
}

/// 截图配置
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// 未指定区域时是否截取整页
    pub full_page: bool,
    /// 截图区域
    pub clip: Option<ClipRegion>,
    pub format: CaptureFormat,
    /// 质量 (1-100)，PNG 忽略
    pub quality: Option<u8>,
}

/// 页面中的一个具体元素
///
/// 同一选择器可能命中多个元素（例如隐藏的诱饵输入框排在真正的输入框前面），
/// `index` 是目标在全部命中元素中按文档顺序的位置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub selector: String,
    pub index: usize,
}

impl ElementTarget {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }

    /// 选择器命中的第一个元素
    pub fn first(selector: impl Into<String>) -> Self {
        Self::new(selector, 0)
    }
}

impl fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 0 {
            write!(f, "{}", self.selector)
        } else {
            write!(f, "{} >> nth={}", self.selector, self.index)
        }
    }
}

/// 浏览器页面
///
/// 每个页面拥有独立的浏览器上下文（cookie、存储互不共享）。
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// 导航到指定 URL，等待 load 事件
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), EngineError>;

    /// 当前页面 URL
    async fn current_url(&self) -> Result<String, EngineError>;

    /// 当前页面 HTML
    async fn content(&self) -> Result<String, EngineError>;

    /// 向目标输入框填入文本
    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<(), EngineError>;

    /// 点击目标元素
    async fn click(&self, target: &ElementTarget) -> Result<(), EngineError>;

    /// 点击第一个可见文本匹配的按钮或链接（忽略大小写）
    ///
    /// 返回是否找到并点击了元素。
    async fn click_by_text(&self, text: &str) -> Result<bool, EngineError>;

    /// 等待网络空闲
    async fn wait_for_idle(&self, idle: Duration, timeout: Duration) -> Result<(), EngineError>;

    /// 页面截图
    async fn screenshot(&self, options: &CaptureOptions) -> Result<Vec<u8>, EngineError>;

    /// 单个元素截图，输出 PNG
    async fn element_screenshot(&self, target: &ElementTarget) -> Result<Vec<u8>, EngineError>;

    /// 下载页面引用的资源
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, EngineError>;

    /// 关闭页面并释放浏览器上下文
    async fn close(&self) -> Result<(), EngineError>;
}

/// 浏览器引擎特质
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// 在新的浏览器上下文中打开空白页面
    async fn new_page(&self, viewport: Viewport) -> Result<Box<dyn BrowserPage>, EngineError>;

    /// 关闭浏览器进程
    async fn shutdown(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// 引擎名称
    fn name(&self) -> &'static str;
}
