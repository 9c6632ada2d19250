// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::generators::{AssetGenerator, GeneratedAsset, GenerationError};
use crate::domain::models::batch::{BatchOutcome, ItemFailure};
use crate::domain::models::website::WebsiteRecord;
use crate::domain::services::credential_store::CredentialStore;
use crate::utils::retry_policy::{RetryDecision, RetryPolicy};
use crate::utils::sleeper::{Sleeper, TokioSleeper};

/// 取消后尚未开始的条目使用的失败信息
pub const CANCELLED_MESSAGE: &str = "cancelled before start";

/// 批处理配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// 每批并发处理的条目数
    pub batch_size: usize,
    /// 每个条目的最大尝试次数
    pub per_item_retries: u32,
    /// 线性退避基数
    pub backoff_base: Duration,
    /// 批次之间的等待
    pub inter_batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            per_item_retries: 3,
            backoff_base: Duration::from_secs(2),
            inter_batch_delay: Duration::from_secs(3),
        }
    }
}

/// 一次批处理的结果
#[derive(Debug, Clone, Default)]
pub struct BatchRun {
    pub outcome: BatchOutcome,
    /// 成功生成的资源，顺序与输入一致
    pub generated: Vec<GeneratedAsset>,
}

/// 批处理编排器
///
/// 将网站按 `batch_size` 分块，块内并发生成、块间串行并等待间隔。
/// 单个条目的失败不会影响同批的其他条目。
pub struct BatchOrchestrator {
    config: BatchConfig,
    credentials: Arc<CredentialStore>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig, credentials: Arc<CredentialStore>) -> Self {
        Self {
            config,
            credentials,
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

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// 对全部网站运行一个生成器
    ///
    /// 网站记录的状态与资源路径在原地更新。
    #[instrument(skip_all, fields(asset_type = %generator.asset_type(), total = websites.len()))]
    pub async fn run_batch(
        &self,
        generator: &dyn AssetGenerator,
        websites: &mut [WebsiteRecord],
    ) -> BatchRun {
        let total = websites.len();
        let batch_size = self.config.batch_size.max(1);
        let chunk_count = total.div_ceil(batch_size);
        let mut run = BatchRun {
            outcome: BatchOutcome::new(total),
            generated: Vec::new(),
        };

        for (index, chunk) in websites.chunks_mut(batch_size).enumerate() {
            if self.cancel.is_cancelled() {
                for website in chunk.iter() {
                    run.outcome.record_failure(&website.id, CANCELLED_MESSAGE);
                }
                continue;
            }

            info!(
                chunk = index + 1,
                chunks = chunk_count,
                size = chunk.len(),
                "Processing batch"
            );

            let results = join_all(
                chunk
                    .iter_mut()
                    .map(|website| self.process_item(generator, website)),
            )
            .await;

            for result in results {
                match result {
                    Ok(asset) => {
                        run.outcome.record_success();
                        run.generated.push(asset);
                    }
                    Err(failure) => {
                        run.outcome.record_failure(failure.website_id, failure.error);
                    }
                }
            }

            let is_last = index + 1 == chunk_count;
            if !is_last && !self.cancel.is_cancelled() {
                debug!(delay_ms = self.config.inter_batch_delay.as_millis() as u64, "Waiting before next batch");
                tokio::select! {
                    _ = self.sleeper.sleep(self.config.inter_batch_delay) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        info!(
            successful = run.outcome.successful,
            failed = run.outcome.failed,
            "Batch run finished"
        );
        run
    }

    /// 处理单个条目：重试、回退并更新网站状态
    #[instrument(skip_all, fields(website_id = %website.id))]
    async fn process_item(
        &self,
        generator: &dyn AssetGenerator,
        website: &mut WebsiteRecord,
    ) -> Result<GeneratedAsset, ItemFailure> {
        let asset_type = generator.asset_type();
        let credential = if website.requires_auth {
            self.credentials.get(&website.id)
        } else {
            None
        };

        if let Err(e) = website.begin() {
            return Err(ItemFailure {
                website_id: website.id.clone(),
                error: e.to_string(),
            });
        }

        let policy = RetryPolicy::new(self.config.per_item_retries, self.config.backoff_base);
        let mut state = policy.start();

        let last_error: GenerationError = loop {
            let attempt = state.begin_attempt();
            metrics::counter!("batch_item_attempts_total", "asset_type" => asset_type.as_str())
                .increment(1);

            match generator.generate(website, credential.as_ref()).await {
                Ok(asset) => {
                    self.apply_success(website, &asset);
                    return Ok(asset);
                }
                Err(error) => match state.on_failure(error.retryable) {
                    RetryDecision::Retry { delay } => {
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error.message,
                            "Generation failed, retrying"
                        );
                        transition(website, WebsiteRecord::mark_retry);
                        self.sleeper.sleep(delay).await;
                        transition(website, WebsiteRecord::begin);
                    }
                    RetryDecision::GiveUp { attempts } => {
                        warn!(attempts, error = %error.message, "Generation failed, giving up");
                        break error;
                    }
                },
            }
        };

        match generator.generate_fallback(website).await {
            Ok(asset) => {
                info!(%asset_type, "Stored synthetic fallback after failed attempts");
                self.apply_success(website, &asset);
                Ok(asset)
            }
            Err(fallback_error) => {
                debug!(error = %fallback_error.message, "No fallback available");
                metrics::counter!("batch_items_failed_total", "asset_type" => asset_type.as_str())
                    .increment(1);
                let message = last_error.message;
                if let Err(e) = website.fail(message.clone()) {
                    warn!(error = %e, "Unexpected state while recording failure");
                }
                Err(ItemFailure {
                    website_id: website.id.clone(),
                    error: message,
                })
            }
        }
    }

    fn apply_success(&self, website: &mut WebsiteRecord, asset: &GeneratedAsset) {
        website.set_asset_path(asset.record.asset_type, asset.public_url.clone());
        if let Some(auth_error) = &asset.auth_error {
            website.auth_error = Some(auth_error.clone());
        }
        if asset.needs_manual_auth {
            website.needs_manual_auth = true;
        }
        transition(website, WebsiteRecord::complete);
    }
}

fn transition(
    website: &mut WebsiteRecord,
    step: fn(&mut WebsiteRecord) -> Result<(), crate::domain::errors::DomainError>,
) {
    if let Err(e) = step(website) {
        warn!(website_id = %website.id, error = %e, "Unexpected state transition");
    }
}
