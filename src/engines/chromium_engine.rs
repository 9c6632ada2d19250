// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, Viewport as ClipViewport,
};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::settings::BrowserSettings;
use crate::engines::traits::{
    BrowserEngine, BrowserPage, CaptureFormat, CaptureOptions, ElementTarget, EngineError,
    Viewport,
};

/// 基于 chromiumoxide 的浏览器引擎
///
/// 整个运行期间只启动一个浏览器进程，每个会话使用独立的浏览器上下文。
pub struct ChromiumEngine {
    browser: Arc<Mutex<Browser>>,
    handler: JoinHandle<()>,
    client: reqwest::Client,
}

impl ChromiumEngine {
    /// 连接远程浏览器或启动本地浏览器
    ///
    /// 启动失败是整个运行的致命错误。
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, EngineError> {
        let request_timeout = Duration::from_millis(settings.request_timeout_ms);

        let (browser, mut handler) = if let Some(ref url) = settings.remote_debugging_url {
            info!("Connecting to remote Chrome instance at: {}", url);
            Browser::connect(url)
                .await
                .map_err(|e| EngineError::Launch(format!("Failed to connect to remote Chrome: {}", e)))?
        } else {
            let mut builder = BrowserConfig::builder()
                .no_sandbox()
                .request_timeout(request_timeout)
                .window_size(settings.viewport_width, settings.viewport_height)
                .arg("--disable-gpu")
                .arg("--disable-dev-shm-usage");
            if !settings.headless {
                builder = builder.with_head();
            }

            Browser::launch(builder.build().map_err(EngineError::Launch)?)
                .await
                .map_err(|e| EngineError::Launch(e.to_string()))?
        };

        // 浏览器事件必须被持续消费
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("siteshot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
            client,
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_page(&self, viewport: Viewport) -> Result<Box<dyn BrowserPage>, EngineError> {
        let browser = self.browser.lock().await;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| EngineError::Other(format!("Failed to create browser context: {}", e)))?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(EngineError::Other)?;
        let page = browser
            .new_page(target)
            .await
            .map_err(|e| EngineError::Other(e.to_string()))?;
        drop(browser);

        page.execute(SetDeviceMetricsOverrideParams::new(
            viewport.width as i64,
            viewport.height as i64,
            1.0,
            false,
        ))
        .await
        .map_err(|e| EngineError::Other(format!("Failed to set viewport: {}", e)))?;

        debug!(context = ?context_id, "Opened browser context");
        Ok(Box::new(ChromiumPage {
            page,
            context_id,
            client: self.client.clone(),
            browser: Arc::clone(&self.browser),
        }))
    }

    async fn shutdown(&self) -> Result<(), EngineError> {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        self.handler.abort();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

/// chromiumoxide 页面
pub struct ChromiumPage {
    page: Page,
    context_id: BrowserContextId,
    client: reqwest::Client,
    browser: Arc<Mutex<Browser>>,
}

impl ChromiumPage {
    fn other(context: &str, e: impl std::fmt::Display) -> EngineError {
        EngineError::Other(format!("{}: {}", context, e))
    }

    /// 按文档顺序取选择器的第 `index` 个命中元素
    async fn resolve(&self, target: &ElementTarget) -> Result<Element, EngineError> {
        self.page
            .find_elements(target.selector.as_str())
            .await
            .ok()
            .and_then(|elements| elements.into_iter().nth(target.index))
            .ok_or_else(|| EngineError::FieldNotFound(target.to_string()))
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), EngineError> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| EngineError::Timeout)?
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, EngineError> {
        self.page
            .url()
            .await
            .map_err(|e| Self::other("Failed to read URL", e))
            .map(|url| url.unwrap_or_default())
    }

    async fn content(&self) -> Result<String, EngineError> {
        self.page
            .content()
            .await
            .map_err(|e| Self::other("Failed to read content", e))
    }

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<(), EngineError> {
        self.resolve(target)
            .await?
            .click()
            .await
            .map_err(|e| Self::other("Focus failed", e))?
            .type_str(value)
            .await
            .map_err(|e| Self::other("Input failed", e))?;
        Ok(())
    }

    async fn click(&self, target: &ElementTarget) -> Result<(), EngineError> {
        self.resolve(target)
            .await?
            .click()
            .await
            .map_err(|e| Self::other("Click failed", e))?;
        Ok(())
    }

    async fn click_by_text(&self, text: &str) -> Result<bool, EngineError> {
        let needle = serde_json::to_string(&text.trim().to_lowercase())
            .map_err(|e| Self::other("Failed to encode text", e))?;
        let script = format!(
            r#"(() => {{
                const needle = {};
                const nodes = document.querySelectorAll('button, a, [role=button], input[type=submit], input[type=button]');
                for (const node of nodes) {{
                    const label = (node.innerText || node.value || node.getAttribute('aria-label') || '')
                        .replace(/\s+/g, ' ').trim().toLowerCase();
                    if (label === needle && node.offsetParent !== null) {{
                        node.click();
                        return true;
                    }}
                }}
                return false;
            }})()"#,
            needle
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|e| Self::other("Script failed", e))?
            .into_value::<bool>()
            .map_err(|e| Self::other("Unexpected script result", e))
    }

    async fn wait_for_idle(&self, idle: Duration, timeout: Duration) -> Result<(), EngineError> {
        // chromiumoxide 没有 networkidle 事件，先等待可能的导航，再静默等待
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(EngineError::Navigation(e.to_string())),
            Err(_) => return Err(EngineError::Timeout),
        }
        tokio::time::sleep(idle).await;
        Ok(())
    }

    async fn screenshot(&self, options: &CaptureOptions) -> Result<Vec<u8>, EngineError> {
        let format = match options.format {
            CaptureFormat::Png => CaptureScreenshotFormat::Png,
            CaptureFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
            CaptureFormat::Webp => CaptureScreenshotFormat::Webp,
        };

        let mut builder = ScreenshotParams::builder()
            .format(format)
            .full_page(options.full_page);
        if let Some(quality) = options.quality {
            if options.format != CaptureFormat::Png {
                builder = builder.quality(quality as i64);
            }
        }
        if let Some(clip) = options.clip {
            builder = builder.clip(ClipViewport {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            });
        }

        self.page
            .screenshot(builder.build())
            .await
            .map_err(|e| Self::other("Page screenshot failed", e))
    }

    async fn element_screenshot(&self, target: &ElementTarget) -> Result<Vec<u8>, EngineError> {
        self.resolve(target)
            .await?
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| Self::other("Element screenshot failed", e))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, EngineError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn close(&self) -> Result<(), EngineError> {
        // 页面关闭失败时仍然要释放上下文
        let closed = self
            .page
            .clone()
            .close()
            .await
            .map_err(|e| Self::other("Failed to close page", e));
        if let Err(e) = &closed {
            warn!(error = %e, "Page close failed, disposing browser context anyway");
        }
        let disposed = self
            .browser
            .lock()
            .await
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map(|_| ())
            .map_err(|e| Self::other("Failed to dispose browser context", e));
        closed.and(disposed)
    }
}
