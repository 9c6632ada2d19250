// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use siteshot::config::settings::Settings;
use siteshot::domain::models::asset::AssetType;
use siteshot::domain::models::batch::BuildReport;
use siteshot::domain::models::credential::CredentialRecord;
use siteshot::domain::models::website::{WebsiteRecord, WebsiteState};
use siteshot::domain::repositories::asset_repository::AssetRepository;
use siteshot::domain::services::credential_store::CredentialStore;
use siteshot::infrastructure::asset_repo_impl::{AssetRepositoryImpl, MANIFEST_KEY};
use siteshot::infrastructure::catalog::{load_catalog, save_catalog};
use siteshot::infrastructure::credential_file::save_credentials;
use siteshot::infrastructure::storage::InMemoryStorage;
use siteshot::utils::sleeper::RecordingSleeper;
use siteshot::workers::orchestrator::CANCELLED_MESSAGE;
use siteshot::workers::pipeline::{cleanup_assets, Pipeline, PipelineOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::helpers::{site_url, website, FakeEngine, FakeSite, LOGIN_FORM, PLAIN_PAGE};

struct Workspace {
    _dir: TempDir,
    settings: Settings,
    websites_file: PathBuf,
    report_file: PathBuf,
}

async fn workspace(websites: &[WebsiteRecord], credentials: &CredentialStore) -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let websites_file = dir.path().join("websites.json");
    let credentials_file = dir.path().join("credentials.json");
    let report_file = dir.path().join("build-report.json");

    save_catalog(&websites_file, websites).await.unwrap();
    save_credentials(&credentials_file, credentials).await.unwrap();

    let config = format!(
        r#"
[browser]
viewport_width = 64
viewport_height = 48

[pipeline]
batch_size = 2
per_item_retries = 2
backoff_base_ms = 10
inter_batch_delay_ms = 0
navigation_timeout_ms = 1000
network_idle_ms = 0
optimize = true

[storage]
storage_type = "memory"
public_prefix = "/assets"

[paths]
websites_file = "{}"
credentials_file = "{}"
report_file = "{}"

[[variants.screenshot]]
width = 32
height = 24
format = "png"
"#,
        websites_file.display(),
        credentials_file.display(),
        report_file.display()
    );
    let config_file = dir.path().join("siteshot.toml");
    std::fs::write(&config_file, config).unwrap();
    let settings = Settings::with_file(Some(config_file.to_str().unwrap())).unwrap();

    Workspace {
        _dir: dir,
        settings,
        websites_file,
        report_file,
    }
}

fn engine() -> FakeEngine {
    FakeEngine::new()
        .with_site(&site_url("a"), FakeSite::new(PLAIN_PAGE))
        .with_site(
            &site_url("b"),
            FakeSite::new(LOGIN_FORM).redirect_after_submit("https://b.example.com/dashboard"),
        )
}

fn credentials() -> CredentialStore {
    let store = CredentialStore::new();
    store
        .put(CredentialRecord::email("b", "me@example.com", "hunter2"))
        .unwrap();
    store
}

fn pipeline(ws: &Workspace, engine: &FakeEngine, storage: &Arc<InMemoryStorage>) -> Pipeline {
    Pipeline::new(ws.settings.clone(), Arc::new(engine.clone()), storage.clone())
        .with_sleeper(Arc::new(RecordingSleeper::new()))
}

async fn read_report(path: &Path) -> BuildReport {
    let text = tokio::fs::read_to_string(path).await.unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn test_full_run_updates_catalog_manifest_and_report() {
    let ws = workspace(&[website("a", false), website("b", true)], &credentials()).await;
    let engine = engine();
    let storage = Arc::new(InMemoryStorage::new());

    let report = pipeline(&ws, &engine, &storage)
        .run(&PipelineOptions::default())
        .await
        .unwrap();

    assert_eq!(report.totals.websites, 2);
    assert_eq!(report.totals.screenshots, 2);
    assert_eq!(report.totals.logos, 2);
    assert_eq!(report.totals.favicons, 2);
    assert_eq!(report.categories.auth_required.successful, 1);
    assert_eq!(report.categories.public.successful, 1);
    assert_eq!(report.config.batch_size, 2);
    assert_eq!(read_report(&ws.report_file).await.totals, report.totals);

    let catalog = load_catalog(&ws.websites_file).await.unwrap();
    for site in &catalog {
        assert_eq!(site.state, WebsiteState::Completed);
        assert!(site.auth_error.is_none());
        for asset_type in AssetType::ALL {
            assert!(site.asset_path(asset_type).unwrap().starts_with("/assets/"));
        }
    }
    assert!(engine
        .actions()
        .contains(&"fill input[type=password]=hunter2".to_string()));

    assert!(storage.keys().await.contains(&MANIFEST_KEY.to_string()));
    let repository = AssetRepositoryImpl::load(storage.clone(), "/assets").await.unwrap();
    assert_eq!(repository.records().await.len(), 6);
    let screenshot = repository.current("a", AssetType::Screenshot).await.unwrap();
    assert_eq!(screenshot.variants.len(), 1);
    assert_eq!(screenshot.variants[0].dimensions.width, 32);
}

#[tokio::test]
async fn test_only_and_ids_limit_the_run() {
    let ws = workspace(&[website("a", false), website("b", true)], &credentials()).await;
    let engine = engine();
    let storage = Arc::new(InMemoryStorage::new());

    let options = PipelineOptions {
        only: vec![AssetType::Logo],
        ids: vec!["a".to_string()],
    };
    let report = pipeline(&ws, &engine, &storage).run(&options).await.unwrap();

    assert_eq!(report.totals.websites, 1);
    assert!(report.outcomes.screenshot.is_none());
    assert!(report.outcomes.favicon.is_none());
    assert_eq!(report.outcomes.logo.as_ref().unwrap().total, 1);

    let catalog = load_catalog(&ws.websites_file).await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert!(catalog[0].logo_path.is_some());
    assert!(catalog[0].screenshot_path.is_none());
    assert_eq!(catalog[1].state, WebsiteState::Pending);
    assert!(catalog[1].logo_path.is_none());
    assert_eq!(engine.navigations_to(&site_url("b")), 0);
}

#[tokio::test]
async fn test_unreachable_site_is_reported_and_marked_failed() {
    let ws = workspace(&[website("a", false), website("down", false)], &CredentialStore::new()).await;
    let engine = engine();
    let storage = Arc::new(InMemoryStorage::new());
    let sleeper = Arc::new(RecordingSleeper::new());

    let options = PipelineOptions {
        only: vec![AssetType::Screenshot],
        ids: Vec::new(),
    };
    let report = pipeline(&ws, &engine, &storage)
        .with_sleeper(sleeper.clone())
        .run(&options)
        .await
        .unwrap();

    let outcome = report.outcomes.screenshot.unwrap();
    assert_eq!(outcome.successful, 1);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.failed_ids().contains("down"));
    assert_eq!(report.categories.public.failed, 1);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(10)]);

    let catalog = load_catalog(&ws.websites_file).await.unwrap();
    assert_eq!(catalog[0].state, WebsiteState::Completed);
    assert_eq!(catalog[1].state, WebsiteState::Failed);
    assert!(catalog[1].screenshot_path.is_none());
    assert!(catalog[1].asset_error.is_some());
}

#[tokio::test]
async fn test_screenshot_failure_survives_fallback_logo_and_favicon() {
    let ws = workspace(&[website("a", false), website("down", false)], &CredentialStore::new()).await;
    let engine = engine();
    let storage = Arc::new(InMemoryStorage::new());

    let report = pipeline(&ws, &engine, &storage)
        .run(&PipelineOptions::default())
        .await
        .unwrap();

    assert_eq!(report.outcomes.screenshot.as_ref().unwrap().failed, 1);
    assert_eq!(report.outcomes.logo.as_ref().unwrap().successful, 2);
    assert_eq!(report.outcomes.favicon.as_ref().unwrap().successful, 2);
    assert_eq!(report.categories.public.failed, 1);

    let catalog = load_catalog(&ws.websites_file).await.unwrap();
    assert_eq!(catalog[0].state, WebsiteState::Completed);
    assert!(catalog[0].asset_error.is_none());

    let down = &catalog[1];
    assert_eq!(down.state, WebsiteState::Failed);
    assert!(down.screenshot_path.is_none());
    assert!(down.asset_error.as_deref().unwrap().starts_with("screenshot: "));
    assert!(down.logo_path.as_deref().unwrap().ends_with(".svg"));
    assert!(down.favicon_path.is_some());
}

#[tokio::test]
async fn test_cancelled_run_records_every_site() {
    let ws = workspace(&[website("a", false), website("b", true)], &credentials()).await;
    let engine = engine();
    let storage = Arc::new(InMemoryStorage::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let options = PipelineOptions {
        only: vec![AssetType::Screenshot],
        ids: Vec::new(),
    };
    let report = pipeline(&ws, &engine, &storage)
        .with_cancellation(cancel)
        .run(&options)
        .await
        .unwrap();

    let outcome = report.outcomes.screenshot.unwrap();
    assert_eq!(outcome.failed, 2);
    assert!(outcome.failures.iter().all(|f| f.error == CANCELLED_MESSAGE));
    assert_eq!(engine.opened(), 0);
}

#[tokio::test]
async fn test_cleanup_removes_assets_of_dropped_sites() {
    let ws = workspace(&[website("a", false), website("b", true)], &credentials()).await;
    let engine = engine();
    let storage = Arc::new(InMemoryStorage::new());

    pipeline(&ws, &engine, &storage)
        .run(&PipelineOptions::default())
        .await
        .unwrap();

    let mut catalog = load_catalog(&ws.websites_file).await.unwrap();
    catalog.retain(|w| w.id == "a");
    save_catalog(&ws.websites_file, &catalog).await.unwrap();

    let deleted = cleanup_assets(&ws.settings, storage.clone()).await.unwrap();
    assert!(!deleted.is_empty());
    assert!(deleted.iter().all(|key| key.contains("/b-")));

    let remaining = storage.keys().await;
    assert!(remaining.iter().all(|key| !key.contains("/b-")));
    assert!(remaining.iter().any(|key| key.contains("/a-")));

    let repository = AssetRepositoryImpl::load(storage.clone(), "/assets").await.unwrap();
    assert_eq!(repository.records().await.len(), 3);
    assert!(cleanup_assets(&ws.settings, storage).await.unwrap().is_empty());
}
