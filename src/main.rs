// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use clap::Parser;
use siteshot::cli::{self, Cli};
use siteshot::config::settings::Settings;
use siteshot::infrastructure::metrics::init_metrics;
use siteshot::utils::telemetry;
use tracing::info;

/// 主函数
///
/// 解析命令行、加载配置、初始化日志与指标后分派子命令
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().to_string());
    let settings = Settings::with_file(config_path.as_deref())?;

    // 2. Initialize logging
    telemetry::init_telemetry(settings.logging.json);
    info!("Starting siteshot...");

    // 3. Initialize Prometheus metrics
    if settings.metrics.enabled {
        init_metrics(&settings.metrics.listen_addr);
    }

    cli::execute(cli.command, settings).await
}
