// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use tracing::instrument;

use crate::domain::generators::{
    open_and_authenticate, persist, AssetGenerator, Capture, GeneratedAsset, GenerationError,
    GeneratorContext,
};
use crate::domain::models::asset::{AssetFormat, AssetType};
use crate::domain::models::credential::CredentialRecord;
use crate::domain::models::website::WebsiteRecord;
use crate::engines::session::BrowserSession;
use crate::engines::traits::{CaptureFormat, ClipRegion};

/// 截图生成器
///
/// 默认截取首屏视口；截图没有合成回退。
pub struct ScreenshotGenerator {
    context: GeneratorContext,
    format: CaptureFormat,
    quality: Option<u8>,
    full_page: bool,
}

impl ScreenshotGenerator {
    pub fn new(context: GeneratorContext) -> Self {
        Self {
            context,
            format: CaptureFormat::Png,
            quality: None,
            full_page: false,
        }
    }

    pub fn with_format(mut self, format: CaptureFormat, quality: Option<u8>) -> Self {
        self.format = format;
        self.quality = quality;
        self
    }

    pub fn full_page(mut self, full_page: bool) -> Self {
        self.full_page = full_page;
        self
    }

    fn region(&self) -> Option<ClipRegion> {
        if self.full_page {
            return None;
        }
        let viewport = self.context.session.viewport;
        Some(ClipRegion {
            x: 0.0,
            y: 0.0,
            width: viewport.width as f64,
            height: viewport.height as f64,
        })
    }

    async fn capture(
        &self,
        session: &mut BrowserSession,
        website: &WebsiteRecord,
        credential: Option<&CredentialRecord>,
    ) -> Result<GeneratedAsset, GenerationError> {
        let auth = open_and_authenticate(
            &self.context,
            session,
            website,
            credential,
            AssetType::Screenshot,
        )
        .await?;

        let data = session
            .screenshot(self.region(), self.format, self.quality)
            .await
            .map_err(|e| GenerationError::from_engine(&website.id, AssetType::Screenshot, e))?;

        let format: AssetFormat = self.format.asset_format();
        persist(
            &self.context,
            website,
            AssetType::Screenshot,
            Capture {
                data,
                format,
                fallback: false,
            },
            auth,
        )
        .await
    }
}

#[async_trait]
impl AssetGenerator for ScreenshotGenerator {
    fn asset_type(&self) -> AssetType {
        AssetType::Screenshot
    }

    #[instrument(skip_all, fields(website_id = %website.id))]
    async fn generate(
        &self,
        website: &WebsiteRecord,
        credential: Option<&CredentialRecord>,
    ) -> Result<GeneratedAsset, GenerationError> {
        let started = std::time::Instant::now();
        let mut session = BrowserSession::new(self.context.engine.clone(), self.context.session);
        let result = self.capture(&mut session, website, credential).await;
        session.close().await;

        metrics::histogram!("asset_generation_seconds", "asset_type" => "screenshot")
            .record(started.elapsed().as_secs_f64());
        result
    }
}
