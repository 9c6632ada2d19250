// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::models::website::WebsiteRecord;

/// 单个失败项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub website_id: String,
    pub error: String,
}

/// 一次批处理运行的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchOutcome {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.successful += 1;
    }

    pub fn record_failure(&mut self, website_id: impl Into<String>, error: impl Into<String>) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            website_id: website_id.into(),
            error: error.into(),
        });
    }

    /// 失败网站的 id 集合
    pub fn failed_ids(&self) -> HashSet<&str> {
        self.failures.iter().map(|f| f.website_id.as_str()).collect()
    }
}

/// 构建报告中使用的配置快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    pub batch_size: usize,
    pub per_item_retries: u32,
    pub backoff_base_ms: u64,
    pub inter_batch_delay_ms: u64,
    pub optimize: bool,
}

/// 各类资源的生成数量
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub websites: usize,
    pub screenshots: usize,
    pub logos: usize,
    pub favicons: usize,
}

/// 按资源类型划分的运行结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOutcomes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<BatchOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<BatchOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<BatchOutcome>,
}

impl ReportOutcomes {
    pub fn iter(&self) -> impl Iterator<Item = &BatchOutcome> {
        [&self.screenshot, &self.logo, &self.favicon]
            .into_iter()
            .flatten()
    }
}

/// 单个分类的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// 需要登录与公开站点的分类统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCategories {
    pub auth_required: CategoryStats,
    pub public: CategoryStats,
}

/// 构建报告
///
/// 每次完整流水线运行写出一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub generated_at: DateTime<Utc>,
    pub config: ReportConfig,
    pub totals: ReportTotals,
    pub outcomes: ReportOutcomes,
    pub categories: ReportCategories,
}

impl BuildReport {
    /// 根据网站列表和各资源类型的运行结果汇总报告
    ///
    /// 一个网站只要在任一资源类型中失败就计为失败。
    pub fn summarize(
        config: ReportConfig,
        websites: &[WebsiteRecord],
        outcomes: ReportOutcomes,
    ) -> Self {
        let failed: HashSet<&str> = outcomes
            .iter()
            .flat_map(|o| o.failures.iter().map(|f| f.website_id.as_str()))
            .collect();

        let mut categories = ReportCategories::default();
        for website in websites {
            let stats = if website.requires_auth {
                &mut categories.auth_required
            } else {
                &mut categories.public
            };
            stats.total += 1;
            if failed.contains(website.id.as_str()) {
                stats.failed += 1;
            } else {
                stats.successful += 1;
            }
        }

        let totals = ReportTotals {
            websites: websites.len(),
            screenshots: outcomes.screenshot.as_ref().map_or(0, |o| o.successful),
            logos: outcomes.logo.as_ref().map_or(0, |o| o.successful),
            favicons: outcomes.favicon.as_ref().map_or(0, |o| o.successful),
        };

        Self {
            generated_at: Utc::now(),
            config,
            totals,
            outcomes,
            categories,
        }
    }
}
