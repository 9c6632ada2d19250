// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Context;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::settings::Settings;
use crate::domain::generators::{
    AssetGenerator, FaviconGenerator, GeneratorContext, LogoGenerator, ScreenshotGenerator,
};
use crate::domain::models::asset::{key_from_public_url, AssetType};
use crate::domain::models::batch::{BuildReport, ReportConfig, ReportOutcomes};
use crate::domain::models::website::WebsiteRecord;
use crate::domain::repositories::asset_repository::AssetRepository;
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::domain::services::optimizer::Optimizer;
use crate::engines::traits::BrowserEngine;
use crate::infrastructure::asset_repo_impl::AssetRepositoryImpl;
use crate::infrastructure::catalog::{load_catalog, save_catalog};
use crate::infrastructure::credential_file::load_credentials;
use crate::infrastructure::report::write_report;
use crate::utils::sleeper::{Sleeper, TokioSleeper};
use crate::workers::orchestrator::BatchOrchestrator;

/// 一次运行的筛选条件
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// 只生成这些资源类型；为空时生成全部
    pub only: Vec<AssetType>,
    /// 只处理这些网站；为空时处理整个目录
    pub ids: Vec<String>,
}

impl PipelineOptions {
    /// 按生成顺序排列的资源类型
    pub fn asset_types(&self) -> Vec<AssetType> {
        AssetType::ALL
            .into_iter()
            .filter(|t| self.only.is_empty() || self.only.contains(t))
            .collect()
    }
}

/// 完整流水线：对目录中的网站依次生成截图、Logo 与 Favicon，
/// 写回目录、资源清单与构建报告。
pub struct Pipeline {
    settings: Settings,
    engine: Arc<dyn BrowserEngine>,
    storage: Arc<dyn StorageRepository>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        engine: Arc<dyn BrowserEngine>,
        storage: Arc<dyn StorageRepository>,
    ) -> Self {
        Self {
            settings,
            engine,
            storage,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 运行流水线并返回构建报告
    #[instrument(skip_all)]
    pub async fn run(&self, options: &PipelineOptions) -> anyhow::Result<BuildReport> {
        let paths = &self.settings.paths;
        let mut websites = load_catalog(&paths.websites_file)
            .await
            .context("Failed to load website catalog")?;
        let credentials = Arc::new(
            load_credentials(&paths.credentials_file)
                .await
                .context("Failed to load credentials")?,
        );
        let repository = Arc::new(
            AssetRepositoryImpl::load(
                self.storage.clone(),
                self.settings.storage.public_prefix.clone(),
            )
            .await
            .context("Failed to load asset manifest")?,
        );

        let (mut selected, positions) = select_websites(&websites, &options.ids);
        info!(
            selected = selected.len(),
            catalog = websites.len(),
            asset_types = ?options.asset_types(),
            "Starting pipeline"
        );

        let orchestrator =
            BatchOrchestrator::new(self.settings.pipeline.batch_config(), credentials)
                .with_sleeper(self.sleeper.clone())
                .with_cancellation(self.cancel.clone());

        let mut outcomes = ReportOutcomes::default();
        let mut failures: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for asset_type in options.asset_types() {
            let generator = self.generator(asset_type, repository.clone());
            let run = orchestrator.run_batch(generator.as_ref(), &mut selected).await;
            for failure in &run.outcome.failures {
                failures
                    .entry(failure.website_id.clone())
                    .or_default()
                    .push(format!("{}: {}", asset_type, failure.error));
            }
            let slot = match asset_type {
                AssetType::Screenshot => &mut outcomes.screenshot,
                AssetType::Logo => &mut outcomes.logo,
                AssetType::Favicon => &mut outcomes.favicon,
            };
            *slot = Some(run.outcome);
        }
        carry_failures(&mut selected, &failures);

        for (website, position) in selected.iter().zip(positions) {
            websites[position] = website.clone();
        }

        save_catalog(&paths.websites_file, &websites)
            .await
            .context("Failed to save website catalog")?;
        repository
            .save_manifest()
            .await
            .context("Failed to save asset manifest")?;

        let report = BuildReport::summarize(self.report_config(), &selected, outcomes);
        write_report(&paths.report_file, &report)
            .await
            .context("Failed to write build report")?;

        Ok(report)
    }

    fn generator(
        &self,
        asset_type: AssetType,
        repository: Arc<dyn AssetRepository>,
    ) -> Box<dyn AssetGenerator> {
        let variants = &self.settings.variants;
        let mut context = GeneratorContext::new(self.engine.clone(), repository)
            .with_session(self.settings.session_options());
        if self.settings.pipeline.optimize {
            context = context.with_optimizer(Arc::new(Optimizer::new(
                (&self.settings.optimizer).into(),
            )));
        }

        match asset_type {
            AssetType::Screenshot => Box::new(ScreenshotGenerator::new(
                context.with_variants(variants.screenshot.clone()),
            )),
            AssetType::Logo => Box::new(LogoGenerator::new(
                context.with_variants(variants.logo.clone()),
            )),
            AssetType::Favicon => Box::new(FaviconGenerator::new(
                context.with_variants(variants.favicon.clone()),
            )),
        }
    }

    fn report_config(&self) -> ReportConfig {
        let pipeline = &self.settings.pipeline;
        ReportConfig {
            batch_size: pipeline.batch_size,
            per_item_retries: pipeline.per_item_retries,
            backoff_base_ms: pipeline.backoff_base_ms,
            inter_batch_delay_ms: pipeline.inter_batch_delay_ms,
            optimize: pipeline.optimize,
        }
    }
}

/// 按 id 选出待处理的网站，返回副本及其在目录中的位置
fn select_websites(websites: &[WebsiteRecord], ids: &[String]) -> (Vec<WebsiteRecord>, Vec<usize>) {
    if !ids.is_empty() {
        let known: HashSet<&str> = websites.iter().map(|w| w.id.as_str()).collect();
        for id in ids.iter().filter(|id| !known.contains(id.as_str())) {
            warn!(website_id = %id, "Requested website is not in the catalog");
        }
    }

    websites
        .iter()
        .enumerate()
        .filter(|(_, w)| ids.is_empty() || ids.iter().any(|id| id == &w.id))
        .map(|(position, w)| (w.clone(), position))
        .unzip()
}

/// 任一资源类型失败的网站在整次运行结束时保持失败
///
/// 后续类型的成功（包括回退资源）会把状态推进到 completed，这里按失败顺序
/// 拼接原因重新标记，已写入的资源路径保持不变。
fn carry_failures(websites: &mut [WebsiteRecord], failures: &BTreeMap<String, Vec<String>>) {
    for website in websites.iter_mut() {
        let Some(errors) = failures.get(&website.id) else {
            continue;
        };
        let reason = errors.join("; ");
        if let Err(e) = website.begin().and_then(|_| website.fail(reason)) {
            warn!(website_id = %website.id, error = %e, "Failed to record website failure");
        }
    }
}

/// 删除不再被任何网站引用的资源，返回被删除的存储键
pub async fn cleanup_assets(
    settings: &Settings,
    storage: Arc<dyn StorageRepository>,
) -> anyhow::Result<Vec<String>> {
    let websites = load_catalog(&settings.paths.websites_file)
        .await
        .context("Failed to load website catalog")?;
    let prefix = settings.storage.public_prefix.as_str();
    let repository = AssetRepositoryImpl::load(storage, prefix)
        .await
        .context("Failed to load asset manifest")?;

    let referenced = referenced_keys(&websites, prefix);
    let deleted = repository.cleanup(&referenced).await?;
    repository.save_manifest().await?;
    Ok(deleted)
}

/// 网站记录中仍被引用的存储键
pub fn referenced_keys(websites: &[WebsiteRecord], prefix: &str) -> HashSet<String> {
    websites
        .iter()
        .flat_map(|w| AssetType::ALL.into_iter().filter_map(move |t| w.asset_path(t)))
        .filter_map(|path| key_from_public_url(prefix, path))
        .map(str::to_string)
        .collect()
}
