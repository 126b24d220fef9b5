// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::MetricsSettings;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 初始化指标系统
///
/// 安装 Prometheus 导出器并注册队列相关指标。
/// 地址无效或端口被占用时只记录警告，不影响队列运行。
pub fn init_metrics(settings: &MetricsSettings) {
    if !settings.enabled {
        info!("Metrics exporter disabled");
        return;
    }

    let addr: SocketAddr = match settings.listen_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(
                "Invalid metrics listen address {}: {}",
                settings.listen_address, e
            );
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!("llmq_enqueued_total", "Total number of LLM requests enqueued");
    describe_counter!(
        "llmq_tick_total",
        "Total number of queue ticks, labelled by outcome"
    );
    describe_counter!(
        "llmq_stuck_recovered_total",
        "Total number of stale PROCESSING entries returned to PENDING"
    );
    describe_counter!(
        "llmq_generation_total",
        "Total number of text generation calls, labelled by status"
    );
    describe_histogram!(
        "llmq_generation_duration_seconds",
        "Duration of text generation calls in seconds"
    );
    describe_counter!(
        "llmq_xp_reward_total",
        "Total number of task reward updates, labelled by award source"
    );

    info!("Metrics exporter listening on {}", addr);
}
