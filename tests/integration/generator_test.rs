// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use siteshot::domain::generators::fallback::palette_color;
use siteshot::domain::generators::{
    AssetGenerator, FaviconGenerator, GeneratorContext, LogoGenerator, ScreenshotGenerator,
    VariantSpec,
};
use siteshot::domain::models::asset::{AssetFormat, AssetType, Dimensions};
use siteshot::domain::models::credential::{AuthMethod, CredentialRecord};
use siteshot::domain::models::website::WebsiteState;
use siteshot::domain::repositories::asset_repository::AssetRepository;
use siteshot::domain::services::credential_store::CredentialStore;
use siteshot::domain::services::optimizer::{encode_image, Optimizer, OptimizerConfig};
use siteshot::infrastructure::asset_repo_impl::AssetRepositoryImpl;
use siteshot::infrastructure::storage::InMemoryStorage;
use siteshot::utils::sleeper::RecordingSleeper;
use siteshot::workers::orchestrator::{BatchConfig, BatchOrchestrator};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, Rgba, RgbaImage};

use super::helpers::{
    noisy_png, session_options, site_url, website, FakeEngine, FakeSite, LOGIN_FORM, PLAIN_PAGE,
};

struct Harness {
    engine: FakeEngine,
    storage: Arc<InMemoryStorage>,
    repository: Arc<AssetRepositoryImpl>,
}

impl Harness {
    fn new(engine: FakeEngine) -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let repository = Arc::new(AssetRepositoryImpl::new(storage.clone(), "/assets"));
        Self {
            engine,
            storage,
            repository,
        }
    }

    fn context(&self) -> GeneratorContext {
        GeneratorContext::new(Arc::new(self.engine.clone()), self.repository.clone())
            .with_session(session_options())
    }
}

fn orchestrator(credentials: CredentialStore, sleeper: Arc<RecordingSleeper>) -> BatchOrchestrator {
    BatchOrchestrator::new(
        BatchConfig {
            batch_size: 2,
            per_item_retries: 3,
            backoff_base: Duration::from_millis(50),
            inter_batch_delay: Duration::from_millis(500),
        },
        Arc::new(credentials),
    )
    .with_sleeper(sleeper)
}

#[tokio::test]
async fn test_missing_credential_is_not_an_auth_error() {
    let engine = FakeEngine::new()
        .with_site(&site_url("a"), FakeSite::new(PLAIN_PAGE))
        .with_site(&site_url("b"), FakeSite::new(LOGIN_FORM));
    let harness = Harness::new(engine);
    let generator = ScreenshotGenerator::new(harness.context());
    let mut websites = vec![website("a", false), website("b", true)];

    let run = orchestrator(CredentialStore::new(), Arc::new(RecordingSleeper::new()))
        .run_batch(&generator, &mut websites)
        .await;

    assert_eq!(run.outcome.successful, 2);
    for site in &websites {
        assert_eq!(site.state, WebsiteState::Completed);
        assert!(site.auth_error.is_none());
        assert!(site
            .screenshot_path
            .as_deref()
            .unwrap()
            .starts_with(&format!("/assets/screenshot/{}-screenshot-", site.id)));
    }
    assert!(!harness.engine.actions().iter().any(|a| a.starts_with("fill")));

    let record = harness
        .repository
        .current("b", AssetType::Screenshot)
        .await
        .unwrap();
    assert_eq!(record.format, AssetFormat::Png);
    assert_eq!(record.dimensions, Dimensions::new(64, 48).unwrap());
    assert_eq!(harness.engine.opened(), harness.engine.closed());
}

#[tokio::test]
async fn test_failed_login_still_captures_screenshot() {
    let engine = FakeEngine::new().with_site(
        &site_url("b"),
        FakeSite::new("<html><body><p>members only</p></body></html>"),
    );
    let harness = Harness::new(engine);
    let generator = ScreenshotGenerator::new(harness.context());

    let credential = CredentialRecord::email("b", "me@example.com", "hunter2");
    let asset = generator
        .generate(&website("b", true), Some(&credential))
        .await
        .unwrap();

    assert_eq!(
        asset.auth_error.as_deref(),
        Some("Login field not found: username")
    );
    assert!(!asset.needs_manual_auth);
    assert!(harness.engine.actions().contains(&"screenshot".to_string()));
}

#[tokio::test]
async fn test_manual_credential_flags_website() {
    let engine = FakeEngine::new().with_site(&site_url("m"), FakeSite::new(LOGIN_FORM));
    let harness = Harness::new(engine);
    let generator = ScreenshotGenerator::new(harness.context());

    let credentials = CredentialStore::new();
    credentials
        .put(CredentialRecord::new(
            "m",
            AuthMethod::Manual {
                fields: BTreeMap::new(),
            },
        ))
        .unwrap();
    let mut websites = vec![website("m", true)];

    let run = orchestrator(credentials, Arc::new(RecordingSleeper::new()))
        .run_batch(&generator, &mut websites)
        .await;

    assert_eq!(run.outcome.successful, 1);
    assert!(websites[0].needs_manual_auth);
    assert!(websites[0].auth_error.is_none());
}

#[tokio::test]
async fn test_transient_navigation_failures_are_retried() {
    let engine = FakeEngine::new().with_site(&site_url("flaky"), FakeSite::new(PLAIN_PAGE).failing(2));
    let harness = Harness::new(engine);
    let generator = ScreenshotGenerator::new(harness.context());
    let sleeper = Arc::new(RecordingSleeper::new());
    let mut websites = vec![website("flaky", false)];

    let run = orchestrator(CredentialStore::new(), sleeper.clone())
        .run_batch(&generator, &mut websites)
        .await;

    assert_eq!(run.outcome.successful, 1);
    assert_eq!(harness.engine.navigations_to(&site_url("flaky")), 3);
    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_millis(50), Duration::from_millis(100)]
    );
}

#[tokio::test]
async fn test_unreachable_screenshot_fails_after_retry_ceiling() {
    let engine = FakeEngine::new().with_site(&site_url("down"), FakeSite::new(PLAIN_PAGE).failing(10));
    let harness = Harness::new(engine);
    let generator = ScreenshotGenerator::new(harness.context());
    let mut websites = vec![website("down", false), website("up", false)];
    // "up" 不在脚本中，导航同样失败
    let run = orchestrator(CredentialStore::new(), Arc::new(RecordingSleeper::new()))
        .run_batch(&generator, &mut websites)
        .await;

    assert_eq!(run.outcome.failed, 2);
    assert_eq!(harness.engine.navigations_to(&site_url("down")), 3);
    assert_eq!(websites[0].state, WebsiteState::Failed);
    assert!(websites[0]
        .asset_error
        .as_deref()
        .unwrap()
        .contains("net::ERR_CONNECTION_RESET"));
}

#[tokio::test]
async fn test_logo_fallback_when_page_has_no_logo() {
    let engine = FakeEngine::new().with_site(&site_url("nologo"), FakeSite::new(PLAIN_PAGE));
    let harness = Harness::new(engine);
    let generator = LogoGenerator::new(harness.context());
    let site = website("nologo", false);

    let asset = generator.generate(&site, None).await.unwrap();
    assert!(asset.fallback);
    assert_eq!(asset.record.format, AssetFormat::Svg);
    assert_eq!(asset.record.dimensions, Dimensions::new(256, 256).unwrap());

    let first = harness
        .repository
        .read("nologo", AssetType::Logo)
        .await
        .unwrap()
        .unwrap();
    let color = palette_color("nologo");
    assert!(String::from_utf8(first.clone()).unwrap().contains(color.hex));

    // 回退资源是确定性的，覆盖后仍然只有一条记录
    let again = generator.generate_fallback(&site).await.unwrap();
    assert!(again.record.generated_at >= asset.record.generated_at);
    let second = harness
        .repository
        .read("nologo", AssetType::Logo)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(harness.repository.records().await.len(), 1);
}

#[tokio::test]
async fn test_logo_fallback_when_site_is_unreachable() {
    let harness = Harness::new(FakeEngine::new());
    let generator = LogoGenerator::new(harness.context());
    let mut websites = vec![website("offline", false)];

    let run = orchestrator(CredentialStore::new(), Arc::new(RecordingSleeper::new()))
        .run_batch(&generator, &mut websites)
        .await;

    assert_eq!(run.outcome.successful, 1);
    assert!(run.generated[0].fallback);
    assert_eq!(websites[0].state, WebsiteState::Completed);
    assert!(websites[0].logo_path.as_deref().unwrap().ends_with(".svg"));
}

#[tokio::test]
async fn test_favicon_is_optimized_with_variants() {
    let html = r#"<html><head><link rel="icon" href="/favicon-64.png"></head></html>"#;
    let source = noisy_png(64, 64);
    let engine = FakeEngine::new().with_site(
        &site_url("icons"),
        FakeSite::new(html).resource("https://icons.example.com/favicon-64.png", source.clone()),
    );
    let harness = Harness::new(engine);
    let optimizer = Optimizer::new(OptimizerConfig {
        max_width: 16,
        max_height: 16,
        ..OptimizerConfig::default()
    });
    let context = harness
        .context()
        .with_optimizer(Arc::new(optimizer))
        .with_variants(vec![
            VariantSpec::new(32, 32, AssetFormat::Png),
            VariantSpec::new(16, 16, AssetFormat::Png),
        ]);
    let generator = FaviconGenerator::new(context);

    let asset = generator.generate(&website("icons", false), None).await.unwrap();

    assert!(!asset.fallback);
    assert!(asset.record.optimized);
    assert!(asset.record.file_size_bytes < source.len() as u64);
    assert_eq!(asset.record.dimensions, Dimensions::new(16, 16).unwrap());
    assert_eq!(asset.record.format, AssetFormat::Png);
    let sizes: Vec<u32> = asset.record.variants.iter().map(|v| v.dimensions.width).collect();
    assert_eq!(sizes, vec![32, 16]);
    // 主文件加两个附加版本
    assert_eq!(harness.storage.keys().await.len(), 3);
}

#[tokio::test]
async fn test_optimization_without_savings_keeps_original_bytes() {
    // 与优化器相同的编码参数，重新编码不会更小
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(32, 32, Rgba([200, 40, 40, 255])));
    let source = encode_image(&image, AssetFormat::Png, 80).unwrap();
    let html = r#"<html><head><link rel="icon" href="/favicon.png"></head></html>"#;
    let engine = FakeEngine::new().with_site(
        &site_url("tight"),
        FakeSite::new(html).resource("https://tight.example.com/favicon.png", source.clone()),
    );
    let harness = Harness::new(engine);
    let context = harness
        .context()
        .with_optimizer(Arc::new(Optimizer::default()));
    let generator = FaviconGenerator::new(context);

    let asset = generator.generate(&website("tight", false), None).await.unwrap();

    assert!(!asset.record.optimized);
    assert_eq!(asset.record.file_size_bytes, source.len() as u64);
    let stored = harness
        .repository
        .read("tight", AssetType::Favicon)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, source);
}

#[tokio::test]
async fn test_favicon_fallback_is_png() {
    let engine = FakeEngine::new().with_site(&site_url("bare"), FakeSite::new(PLAIN_PAGE));
    let harness = Harness::new(engine);
    let generator = FaviconGenerator::new(harness.context());

    let asset = generator.generate(&website("bare", false), None).await.unwrap();
    assert!(asset.fallback);
    assert_eq!(asset.record.format, AssetFormat::Png);
    assert_eq!(asset.record.dimensions, Dimensions::new(32, 32).unwrap());
}

#[tokio::test]
async fn test_screenshot_has_no_fallback() {
    let harness = Harness::new(FakeEngine::new());
    let generator = ScreenshotGenerator::new(harness.context());

    let err = generator
        .generate_fallback(&website("x", false))
        .await
        .unwrap_err();
    assert!(!err.retryable);
    assert_eq!(err.asset_type, AssetType::Screenshot);
}
