// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::models::asset::{AssetFormat, AssetType};
use crate::domain::models::credential::{AuthMethod, CredentialRecord, PasswordCredentials};
use crate::engines::locators;
use crate::engines::traits::{
    AuthError, BrowserEngine, BrowserPage, CaptureFormat, CaptureOptions, ClipRegion,
    EngineError, Viewport,
};
use crate::engines::validators;

/// 会话参数
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub viewport: Viewport,
    /// 单次导航的超时时间
    pub navigation_timeout: Duration,
    /// 判定网络空闲前等待的静默时间
    pub network_idle: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            navigation_timeout: Duration::from_secs(30),
            network_idle: Duration::from_millis(1500),
        }
    }
}

/// 页面中定位到的资源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedAsset {
    pub data: Vec<u8>,
    pub format: AssetFormat,
}

/// 浏览器会话
///
/// 一次对单个网站的访问。会话独占自己的浏览器上下文，
/// 不会在并发的条目之间共享。
pub struct BrowserSession {
    engine: Arc<dyn BrowserEngine>,
    options: SessionOptions,
    page: Option<Box<dyn BrowserPage>>,
}

impl BrowserSession {
    pub fn new(engine: Arc<dyn BrowserEngine>, options: SessionOptions) -> Self {
        Self {
            engine,
            options,
            page: None,
        }
    }

    /// 创建浏览器上下文，已启动时直接返回
    pub async fn start(&mut self) -> Result<(), EngineError> {
        if self.page.is_none() {
            let page = self.engine.new_page(self.options.viewport).await?;
            self.page = Some(page);
        }
        Ok(())
    }

    fn page(&self) -> Result<&dyn BrowserPage, EngineError> {
        self.page.as_deref().ok_or(EngineError::SessionClosed)
    }

    /// 打开页面
    ///
    /// 导航成功后会尝试关闭年龄验证、Cookie 同意等拦截层，失败只记录日志。
    pub async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), EngineError> {
        let url = validators::validate_url(url)
            .map_err(|e| EngineError::InvalidUrl(format!("{} {}", url, e)))?;
        self.start().await?;

        let page = self.page()?;
        page.goto(url.as_str(), timeout).await?;
        debug!(url = %url, "Page loaded");

        if let Err(e) = page
            .wait_for_idle(self.options.network_idle, timeout)
            .await
        {
            debug!(url = %url, error = %e, "Network did not settle after load");
        }

        self.dismiss_gate().await;
        Ok(())
    }

    async fn dismiss_gate(&self) {
        let Ok(page) = self.page() else {
            return;
        };

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                debug!(error = %e, "Could not read page for gate detection");
                return;
            }
        };

        let Some(text) = locators::gate_button_text(&html) else {
            return;
        };

        match page.click_by_text(text).await {
            Ok(true) => {
                info!(button = text, "Dismissed page gate");
                if let Err(e) = page
                    .wait_for_idle(self.options.network_idle, self.options.navigation_timeout)
                    .await
                {
                    debug!(error = %e, "Network did not settle after gate dismissal");
                }
            }
            Ok(false) => debug!(button = text, "Gate button vanished before click"),
            Err(e) => warn!(button = text, error = %e, "Failed to dismiss page gate"),
        }
    }

    /// 使用凭据登录
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 登录后页面离开了登录/授权地址
    /// * `Ok(false)` - 表单已提交但仍停留在登录页
    /// * `Err(AuthError)` - 凭据不合法、字段缺失、无法自动化或网络错误
    pub async fn authenticate(&self, credential: &CredentialRecord) -> Result<bool, AuthError> {
        credential.validate()?;

        match &credential.method {
            AuthMethod::Email(credentials) => self.login_with_password(credentials).await,
            AuthMethod::OAuth { provider, fallback } => {
                self.login_with_provider(provider, fallback.as_ref()).await
            }
            AuthMethod::Sso { fields } => {
                let page = self.page()?;
                for (name, value) in fields {
                    let html = page.content().await?;
                    let candidates = locators::named_field_selectors(name);
                    let target = locators::first_match(&html, &candidates)
                        .ok_or_else(|| EngineError::FieldNotFound(name.clone()))?;
                    page.fill(&target, value).await?;
                }
                self.submit_and_check().await
            }
            AuthMethod::Manual { .. } => Err(EngineError::NotAutomated("manual".to_string())),
        }
    }

    async fn login_with_password(&self, credentials: &PasswordCredentials) -> Result<bool, AuthError> {
        let page = self.page()?;
        let html = page.content().await?;

        let username = locators::first_match(&html, locators::USERNAME_CANDIDATES)
            .ok_or_else(|| EngineError::FieldNotFound("username".to_string()))?;
        let password = locators::first_match(&html, locators::PASSWORD_CANDIDATES)
            .ok_or_else(|| EngineError::FieldNotFound("password".to_string()))?;
        let submit = locators::first_match(&html, locators::SUBMIT_CANDIDATES)
            .ok_or_else(|| EngineError::FieldNotFound("submit".to_string()))?;

        page.fill(&username, &credentials.username).await?;
        page.fill(&password, &credentials.password).await?;
        page.click(&submit).await?;
        self.settle().await?;

        let url = page.current_url().await?;
        let success = !locators::looks_like_login_url(&url);
        debug!(url = %url, success, "Password login submitted");
        Ok(success)
    }

    async fn login_with_provider(
        &self,
        provider: &str,
        fallback: Option<&PasswordCredentials>,
    ) -> Result<bool, AuthError> {
        let page = self.page()?;
        let html = page.content().await?;

        let selectors = locators::oauth_provider_selectors(provider);
        let mut clicked = false;
        if let Some(target) = locators::first_match(&html, &selectors) {
            page.click(&target).await?;
            clicked = true;
        } else {
            for text in locators::oauth_provider_texts(provider) {
                if page.click_by_text(&text).await? {
                    clicked = true;
                    break;
                }
            }
        }

        if !clicked {
            return match fallback {
                Some(credentials) => {
                    info!(provider, "Provider control not found, falling back to password login");
                    self.login_with_password(credentials).await
                }
                None => Err(EngineError::FieldNotFound(format!("{} login control", provider))),
            };
        }

        self.settle().await?;
        let url = page.current_url().await?;
        let success = !locators::looks_like_auth_url(&url);
        debug!(provider, url = %url, success, "Provider login clicked");
        Ok(success)
    }

    async fn submit_and_check(&self) -> Result<bool, AuthError> {
        let page = self.page()?;
        let html = page.content().await?;
        if let Some(submit) = locators::first_match(&html, locators::SUBMIT_CANDIDATES) {
            page.click(&submit).await?;
        }
        self.settle().await?;

        let url = page.current_url().await?;
        Ok(!locators::looks_like_login_url(&url))
    }

    async fn settle(&self) -> Result<(), EngineError> {
        let page = self.page()?;
        match page
            .wait_for_idle(self.options.network_idle, self.options.navigation_timeout)
            .await
        {
            Err(EngineError::Timeout) => {
                debug!("Network idle wait timed out, continuing");
                Ok(())
            }
            other => other,
        }
    }

    /// 截图，未指定区域时截取整页
    pub async fn screenshot(
        &self,
        region: Option<ClipRegion>,
        format: CaptureFormat,
        quality: Option<u8>,
    ) -> Result<Vec<u8>, EngineError> {
        let options = CaptureOptions {
            full_page: region.is_none(),
            clip: region,
            format,
            quality,
        };
        self.page()?.screenshot(&options).await
    }

    /// 在页面中定位 Logo 或 Favicon
    ///
    /// 找不到时返回 `Ok(None)`，由调用方生成回退资源。
    pub async fn locate_asset(&self, kind: AssetType) -> Result<Option<LocatedAsset>, EngineError> {
        match kind {
            AssetType::Logo => self.locate_logo().await,
            AssetType::Favicon => self.locate_favicon().await,
            AssetType::Screenshot => Ok(None),
        }
    }

    async fn locate_logo(&self) -> Result<Option<LocatedAsset>, EngineError> {
        let page = self.page()?;
        let html = page.content().await?;
        let Some(found) = locators::find_logo(&html) else {
            debug!("No logo candidate matched");
            return Ok(None);
        };

        let base = page.current_url().await?;
        let src = found
            .src
            .as_deref()
            .and_then(|src| validators::resolve_url(&base, src));

        // SVG 直接下载，保留矢量格式
        if let Some(src) = src.as_deref().filter(|s| is_svg_reference(s)) {
            match self.download(src).await {
                Ok(data) if AssetFormat::sniff(&data) == Some(AssetFormat::Svg) => {
                    return Ok(Some(LocatedAsset {
                        data,
                        format: AssetFormat::Svg,
                    }));
                }
                Ok(_) => debug!(src, "Logo source is not an SVG document"),
                Err(e) => debug!(src, error = %e, "Failed to download SVG logo"),
            }
        }

        match page.element_screenshot(&found.target).await {
            Ok(data) => Ok(Some(LocatedAsset {
                data,
                format: AssetFormat::Png,
            })),
            Err(e) => {
                debug!(element = %found.target, error = %e, "Logo element screenshot failed");
                let Some(src) = src else {
                    return Ok(None);
                };
                match self.download(&src).await {
                    Ok(data) => Ok(sniffed(data).filter(|a| AssetType::Logo.accepts(a.format))),
                    Err(e) => {
                        debug!(src = %src, error = %e, "Failed to download logo");
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn locate_favicon(&self) -> Result<Option<LocatedAsset>, EngineError> {
        let page = self.page()?;
        let html = page.content().await?;
        let base = page.current_url().await?;

        let mut candidates: Vec<String> = locators::favicon_hrefs(&html)
            .iter()
            .filter_map(|href| validators::resolve_url(&base, href))
            .collect();
        if let Some(default) = validators::default_favicon_url(&base) {
            if !candidates.contains(&default) {
                candidates.push(default);
            }
        }

        for candidate in candidates {
            let data = match self.download(&candidate).await {
                Ok(data) => data,
                Err(e) => {
                    debug!(href = %candidate, error = %e, "Favicon candidate unavailable");
                    continue;
                }
            };
            match sniffed(data) {
                Some(asset) if AssetType::Favicon.accepts(asset.format) => return Ok(Some(asset)),
                Some(asset) => debug!(href = %candidate, format = %asset.format, "Skipping favicon format"),
                None => debug!(href = %candidate, "Unrecognised favicon data"),
            }
        }
        Ok(None)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, EngineError> {
        if let Some(data) = decode_data_uri(url) {
            return Ok(data);
        }
        self.page()?.fetch(url).await
    }

    /// 关闭会话，可重复调用
    pub async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(error = %e, "Failed to close browser context");
            }
        }
    }
}

fn is_svg_reference(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.starts_with("data:image/svg")
        || lower
            .split(['?', '#'])
            .next()
            .is_some_and(|path| path.ends_with(".svg"))
}

fn sniffed(data: Vec<u8>) -> Option<LocatedAsset> {
    AssetFormat::sniff(&data).map(|format| LocatedAsset { data, format })
}

/// 解码 `data:` URI，只支持 base64 与百分号未编码的纯文本
fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if meta.ends_with(";base64") {
        BASE64.decode(payload.trim()).ok()
    } else {
        Some(payload.as_bytes().to_vec())
    }
}
