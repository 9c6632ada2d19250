// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::domain::generators::fallback;
use crate::domain::generators::{
    asset_dimensions, open_and_authenticate, persist, AssetGenerator, AuthOutcome, Capture,
    GeneratedAsset, GenerationError, GeneratorContext,
};
use crate::domain::models::asset::{AssetFormat, AssetType};
use crate::domain::models::credential::CredentialRecord;
use crate::domain::models::website::WebsiteRecord;
use crate::engines::session::BrowserSession;

/// Logo 生成器
///
/// 页面中找不到 Logo 时生成首字母 SVG。
pub struct LogoGenerator {
    context: GeneratorContext,
}

impl LogoGenerator {
    pub fn new(context: GeneratorContext) -> Self {
        Self { context }
    }

    async fn capture(
        &self,
        session: &mut BrowserSession,
        website: &WebsiteRecord,
        credential: Option<&CredentialRecord>,
    ) -> Result<GeneratedAsset, GenerationError> {
        let auth =
            open_and_authenticate(&self.context, session, website, credential, AssetType::Logo)
                .await?;

        let located = match session.locate_asset(AssetType::Logo).await {
            Ok(located) => located,
            Err(e) => {
                warn!(website_id = %website.id, error = %e, "Logo lookup failed");
                None
            }
        };

        match located.filter(|asset| asset_dimensions(&asset.data, asset.format).is_some()) {
            Some(asset) => {
                persist(
                    &self.context,
                    website,
                    AssetType::Logo,
                    Capture {
                        data: asset.data,
                        format: asset.format,
                        fallback: false,
                    },
                    auth,
                )
                .await
            }
            None => {
                info!(website_id = %website.id, "No logo on page, using generated logo");
                self.synthesize(website, auth).await
            }
        }
    }

    async fn synthesize(
        &self,
        website: &WebsiteRecord,
        auth: AuthOutcome,
    ) -> Result<GeneratedAsset, GenerationError> {
        let data = fallback::render_logo(&website.name, &website.id);
        persist(
            &self.context,
            website,
            AssetType::Logo,
            Capture {
                data,
                format: AssetFormat::Svg,
                fallback: true,
            },
            auth,
        )
        .await
    }
}

#[async_trait]
impl AssetGenerator for LogoGenerator {
    fn asset_type(&self) -> AssetType {
        AssetType::Logo
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

        metrics::histogram!("asset_generation_seconds", "asset_type" => "logo")
            .record(started.elapsed().as_secs_f64());
        result
    }

    #[instrument(skip_all, fields(website_id = %website.id))]
    async fn generate_fallback(
        &self,
        website: &WebsiteRecord,
    ) -> Result<GeneratedAsset, GenerationError> {
        self.synthesize(website, AuthOutcome::default()).await
    }
}
