// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 脚本化的内存浏览器引擎
//!
//! 每个站点由一段 HTML、提交表单后的跳转地址和可下载的资源组成，
//! 页面的所有操作都会记录下来供断言使用。

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use siteshot::domain::models::website::WebsiteRecord;
use siteshot::engines::session::SessionOptions;
use siteshot::engines::traits::{
    BrowserEngine, BrowserPage, CaptureOptions, ElementTarget, EngineError, Viewport,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DESCRIPTION: &str =
    "A curated website used in integration tests, described with more than fifty characters.";

pub fn website(id: &str, requires_auth: bool) -> WebsiteRecord {
    WebsiteRecord::new(
        id,
        format!("Site {}", id.to_uppercase()),
        site_url(id),
        DESCRIPTION,
        requires_auth,
    )
}

pub fn site_url(id: &str) -> String {
    format!("https://{}.example.com/", id)
}

pub fn session_options() -> SessionOptions {
    SessionOptions {
        viewport: Viewport {
            width: 64,
            height: 48,
        },
        navigation_timeout: Duration::from_secs(5),
        network_idle: Duration::from_millis(0),
    }
}

/// 纯色 PNG
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([30, 120, 200, 255]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// 伪随机噪点 PNG，几乎无法压缩
pub fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut seed: u32 = 0x2545_f491;
    let image = RgbaImage::from_fn(width, height, |_, _| {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [r, g, b, _] = seed.to_le_bytes();
        Rgba([r, g, b, 255])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub const LOGIN_FORM: &str = r#"<html><body>
    <form action="/session">
      <input type="email" name="email">
      <input type="password" name="password">
      <button type="submit">Sign in</button>
    </form>
  </body></html>"#;

pub const PLAIN_PAGE: &str = r#"<html><body><h1>Welcome</h1></body></html>"#;

/// 一个脚本化站点
#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    pub html: String,
    /// 提交表单或点击登录按钮后跳转到的地址
    pub after_submit: Option<String>,
    /// 可下载的资源（绝对 URL → 内容）
    pub resources: HashMap<String, Vec<u8>>,
    /// 前若干次导航失败
    pub failing_navigations: u32,
}

impl FakeSite {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Default::default()
        }
    }

    pub fn redirect_after_submit(mut self, url: &str) -> Self {
        self.after_submit = Some(url.to_string());
        self
    }

    pub fn resource(mut self, url: &str, data: Vec<u8>) -> Self {
        self.resources.insert(url.to_string(), data);
        self
    }

    pub fn failing(mut self, navigations: u32) -> Self {
        self.failing_navigations = navigations;
        self
    }
}

#[derive(Default)]
struct EngineState {
    sites: Mutex<HashMap<String, FakeSite>>,
    actions: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// 脚本化浏览器引擎
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_site(self, url: &str, site: FakeSite) -> Self {
        self.state.sites.lock().insert(url.to_string(), site);
        self
    }

    /// 全部页面操作，形如 `fill input[type=email]=me@example.com`
    pub fn actions(&self) -> Vec<String> {
        self.state.actions.lock().clone()
    }

    pub fn navigations_to(&self, url: &str) -> usize {
        let needle = format!("goto {}", url);
        self.actions().iter().filter(|a| **a == needle).count()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn new_page(&self, viewport: Viewport) -> Result<Box<dyn BrowserPage>, EngineError> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            state: self.state.clone(),
            viewport,
            current: Mutex::new("about:blank".to_string()),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakePage {
    state: Arc<EngineState>,
    viewport: Viewport,
    current: Mutex<String>,
}

impl FakePage {
    fn record(&self, action: String) {
        self.state.actions.lock().push(action);
    }

    fn site(&self) -> Option<FakeSite> {
        let current = self.current.lock().clone();
        self.state.sites.lock().get(&current).cloned()
    }

    fn submit(&self) {
        if let Some(target) = self.site().and_then(|s| s.after_submit) {
            *self.current.lock() = target;
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), EngineError> {
        self.record(format!("goto {}", url));
        let mut sites = self.state.sites.lock();
        let site = sites
            .get_mut(url)
            .ok_or_else(|| EngineError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED {}", url)))?;
        if site.failing_navigations > 0 {
            site.failing_navigations -= 1;
            return Err(EngineError::Navigation("net::ERR_CONNECTION_RESET".to_string()));
        }
        drop(sites);
        *self.current.lock() = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, EngineError> {
        Ok(self.current.lock().clone())
    }

    async fn content(&self) -> Result<String, EngineError> {
        Ok(self
            .site()
            .map(|s| s.html)
            .unwrap_or_else(|| PLAIN_PAGE.to_string()))
    }

    async fn fill(&self, target: &ElementTarget, value: &str) -> Result<(), EngineError> {
        self.record(format!("fill {}={}", target, value));
        Ok(())
    }

    async fn click(&self, target: &ElementTarget) -> Result<(), EngineError> {
        self.record(format!("click {}", target));
        self.submit();
        Ok(())
    }

    async fn click_by_text(&self, text: &str) -> Result<bool, EngineError> {
        let html = self.content().await?.to_lowercase();
        let found = html.contains(&format!(">{}<", text.to_lowercase()));
        if found {
            self.record(format!("click text {}", text));
            self.submit();
        }
        Ok(found)
    }

    async fn wait_for_idle(&self, _idle: Duration, _timeout: Duration) -> Result<(), EngineError> {
        Ok(())
    }

    async fn screenshot(&self, options: &CaptureOptions) -> Result<Vec<u8>, EngineError> {
        self.record("screenshot".to_string());
        let (width, height) = match options.clip {
            Some(clip) => (clip.width as u32, clip.height as u32),
            None => (self.viewport.width, self.viewport.height * 2),
        };
        Ok(png(width, height))
    }

    async fn element_screenshot(&self, target: &ElementTarget) -> Result<Vec<u8>, EngineError> {
        self.record(format!("element screenshot {}", target));
        Ok(png(40, 20))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, EngineError> {
        self.record(format!("fetch {}", url));
        let current = self.current.lock().clone();
        let sites = self.state.sites.lock();
        sites
            .values()
            .find_map(|s| s.resources.get(url).cloned())
            .ok_or_else(|| EngineError::Other(format!("404 Not Found: {} (from {})", url, current)))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
