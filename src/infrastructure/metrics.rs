// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 安装 Prometheus 导出器
///
/// 地址无效或端口被占用时只记录警告，流水线照常运行。
pub fn init_metrics(listen_addr: &str) {
    let addr: SocketAddr = match listen_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", listen_addr, e);
            return;
        }
    };

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!(
            "Failed to install Prometheus recorder: {}. This might happen if the port is already in use.",
            e
        );
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!(
        "assets_generated_total",
        Unit::Count,
        "Assets written to the repository, by asset type"
    );
    describe_counter!(
        "assets_fallback_total",
        Unit::Count,
        "Synthetic fallback assets written, by asset type"
    );
    describe_counter!(
        "batch_item_attempts_total",
        Unit::Count,
        "Generator invocations made by the batch orchestrator"
    );
    describe_counter!(
        "batch_items_failed_total",
        Unit::Count,
        "Batch items recorded as failed after exhausting retries"
    );
    describe_histogram!(
        "asset_generation_seconds",
        Unit::Seconds,
        "Wall time of a single asset generation attempt"
    );
}
