// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use llmq::config::settings::Settings;
use llmq::domain::services::llm_service::ChatCompletionClient;
use llmq::infrastructure::database::connection;
use llmq::infrastructure::metrics;
use llmq::infrastructure::repositories::queue_entry_repo_impl::QueueEntryRepositoryImpl;
use llmq::infrastructure::repositories::task_reward_repo_impl::TaskRewardRepositoryImpl;
use llmq::queue::llm_queue::LlmQueueService;
use llmq::utils::telemetry;
use llmq::workers::llm_queue_worker::LlmQueueWorker;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// 主函数
///
/// 后台队列进程入口：连接数据库、执行迁移并持续排空LLM请求队列
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting llmq worker...");

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    metrics::init_metrics(&settings.metrics);

    // 3. Connect to database and run migrations
    let db = Arc::new(connection::connect_and_migrate(&settings.database).await?);

    // 4. Initialize components
    if settings.llm.api_key.is_none() {
        warn!("LLM API key not configured; every queued request will fail");
    }
    let generator = Arc::new(ChatCompletionClient::new(&settings.llm)?);
    let entries = Arc::new(QueueEntryRepositoryImpl::new(db.clone()));
    let tasks = Arc::new(TaskRewardRepositoryImpl::new(db.clone()));
    let queue = Arc::new(
        LlmQueueService::new(entries, tasks, generator).with_settings(&settings.queue),
    );

    // 5. Start worker and drain anything left from a previous run
    let worker = LlmQueueWorker::new(queue, &settings.worker);
    let trigger = worker.trigger();
    let handle = worker.start();
    trigger.fire();

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => warn!("Unable to listen for shutdown signal: {}", err),
    }

    // In-flight entries are recovered by the next process after the stale threshold
    handle.abort();
    info!("llmq worker shut down");

    Ok(())
}
