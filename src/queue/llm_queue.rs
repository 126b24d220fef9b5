// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::QueueSettings;
use crate::domain::models::queue_entry::{
    DomainError, QueueEntry, QueueResult, QueueStatus, FEATURE_XP_REWARD,
};
use crate::domain::repositories::queue_entry_repository::{
    QueueEntryRepository, RepositoryError,
};
use crate::domain::repositories::task_reward_repository::TaskRewardRepository;
use crate::domain::services::llm_service::{GenerationOutcome, TextGenerationClient};
use crate::domain::services::post_processing::{PostProcessEffect, PostProcessorRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 两次外部调用之间的默认最小间隔（毫秒），对应上游免费额度的速率限制
pub const DEFAULT_COOLDOWN_MS: i64 = 4_000;

/// Processing 条目被视为卡住的默认时长（毫秒），为外部调用典型耗时的数倍
pub const DEFAULT_STALE_AFTER_MS: i64 = 15_000;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// 领域错误
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// LLM请求队列特质
///
/// 暴露给路由层与后台触发器的操作集合
#[async_trait]
pub trait LlmQueue: Send + Sync {
    /// 入队一个文本生成请求，立即返回条目ID
    async fn enqueue(
        &self,
        user_id: &str,
        prompt: &str,
        feature: &str,
        task_id: Option<&str>,
    ) -> Result<Uuid, QueueError>;

    /// 指定任务是否已有未完成的经验值建议请求
    async fn has_pending_xp_suggestion_for_task(&self, task_id: &str) -> Result<bool, QueueError>;

    /// 查询请求结果，不属于该用户的条目返回 `None`
    async fn get_result(
        &self,
        request_id: Uuid,
        user_id: &str,
    ) -> Result<Option<QueueResult>, QueueError>;

    /// 推进队列一步，最多处理一个条目
    async fn tick(&self) -> Result<bool, QueueError>;

    /// 是否仍有 Pending 或 Processing 条目
    async fn has_unfinished_work(&self) -> Result<bool, QueueError>;
}

/// 基于仓库的LLM请求队列实现
///
/// 所有并发控制都落在仓库的条件更新上：认领时执行
/// `UPDATE ... SET status = 'PROCESSING' WHERE id = ? AND status = 'PENDING'`，
/// 影响行数为 0 即说明被其他调用抢先。调用方负责把 `tick` 串行化。
pub struct LlmQueueService<R, T, G>
where
    R: QueueEntryRepository,
    T: TaskRewardRepository,
    G: TextGenerationClient,
{
    /// 队列条目仓库
    entries: Arc<R>,
    /// 任务奖励仓库
    tasks: Arc<T>,
    /// 文本生成客户端
    generator: Arc<G>,
    /// 功能后处理注册表
    post_processors: PostProcessorRegistry,
    /// 冷却时间
    cooldown: Duration,
    /// 卡住判定时长
    stale_after: Duration,
}

impl<R, T, G> LlmQueueService<R, T, G>
where
    R: QueueEntryRepository,
    T: TaskRewardRepository,
    G: TextGenerationClient,
{
    /// 使用默认节奏创建队列服务
    ///
    /// # 参数
    ///
    /// * `entries` - 队列条目仓库
    /// * `tasks` - 任务奖励仓库
    /// * `generator` - 文本生成客户端
    pub fn new(entries: Arc<R>, tasks: Arc<T>, generator: Arc<G>) -> Self {
        Self {
            entries,
            tasks,
            generator,
            post_processors: PostProcessorRegistry::default(),
            cooldown: Duration::milliseconds(DEFAULT_COOLDOWN_MS),
            stale_after: Duration::milliseconds(DEFAULT_STALE_AFTER_MS),
        }
    }

    /// 按配置覆盖冷却时间与卡住判定时长
    pub fn with_settings(mut self, settings: &QueueSettings) -> Self {
        self.cooldown = settings.cooldown();
        self.stale_after = settings.stale_after();
        self
    }

    /// 直接指定冷却时间与卡住判定时长
    pub fn with_timing(mut self, cooldown: Duration, stale_after: Duration) -> Self {
        self.cooldown = cooldown;
        self.stale_after = stale_after;
        self
    }

    /// 替换功能后处理注册表
    pub fn with_post_processors(mut self, registry: PostProcessorRegistry) -> Self {
        self.post_processors = registry;
        self
    }

    /// (a) 把最早一个卡住的 Processing 条目退回 Pending
    ///
    /// 每次 tick 至多恢复一个条目；条件更新保证刚完成的条目不会被覆盖
    async fn recover_stuck(&self, now: DateTime<FixedOffset>) -> Result<(), QueueError> {
        // A threshold before the representable range means nothing can be stale yet
        let Some(threshold) = now.checked_sub_signed(self.stale_after) else {
            return Ok(());
        };
        let Some(stuck) = self.entries.find_oldest_stale_processing(threshold).await? else {
            return Ok(());
        };

        let demoted = stuck.clone().recover(now)?;
        let recovered = self
            .entries
            .compare_and_set_status(
                demoted.id,
                QueueStatus::Processing,
                demoted.status,
                demoted.updated_at,
            )
            .await?;

        if recovered {
            counter!("llmq_stuck_recovered_total").increment(1);
            warn!(
                entry_id = %stuck.id,
                feature = %stuck.feature,
                last_update = %stuck.updated_at,
                "Recovered stuck LLM queue entry"
            );
        }
        Ok(())
    }

    /// (b) 距离最近一次终态写入是否已超过冷却时间
    async fn cooldown_passed(&self, now: DateTime<FixedOffset>) -> Result<bool, QueueError> {
        let Some(latest) = self.entries.find_latest_processed().await? else {
            return Ok(true);
        };
        let Some(processed_at) = latest.processed_at else {
            return Ok(true);
        };

        Ok(now.signed_duration_since(processed_at) >= self.cooldown)
    }

    /// (c) 认领最早的 Pending 条目
    async fn claim_next(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<QueueEntry>, QueueError> {
        let Some(candidate) = self.entries.find_oldest_pending().await? else {
            return Ok(None);
        };

        let claimed = self
            .entries
            .compare_and_set_status(candidate.id, QueueStatus::Pending, QueueStatus::Processing, now)
            .await?;

        if !claimed {
            debug!(entry_id = %candidate.id, "Lost claim race");
            return Ok(None);
        }

        Ok(Some(candidate.claim(now)?))
    }

    /// (d) 调用外部服务并写入终态
    async fn generate_and_finalize(
        &self,
        entry: QueueEntry,
    ) -> Result<(QueueEntry, GenerationOutcome), QueueError> {
        let started = Instant::now();
        let outcome = self.generator.generate(&entry.prompt).await;
        histogram!("llmq_generation_duration_seconds").record(started.elapsed().as_secs_f64());

        let finished_at: DateTime<FixedOffset> = Utc::now().into();
        let finished = match &outcome {
            GenerationOutcome::Success { text } => {
                counter!("llmq_generation_total", "status" => "success").increment(1);
                entry.complete(text.clone(), finished_at)?
            }
            GenerationOutcome::Failure { .. } => {
                counter!("llmq_generation_total", "status" => "failure").increment(1);
                let message = outcome.error_message().unwrap_or_default().to_string();
                entry.fail(message, finished_at)?
            }
        };

        self.entries.save_outcome(&finished).await?;
        Ok((finished, outcome))
    }

    /// (e) 执行功能相关的副作用
    async fn apply_post_processing(
        &self,
        entry: &QueueEntry,
        outcome: &GenerationOutcome,
    ) -> Result<(), QueueError> {
        let Some(PostProcessEffect::UpdateTaskReward(update)) =
            self.post_processors.process(entry, outcome)
        else {
            return Ok(());
        };

        let source = update.award_source.to_string();
        if self.tasks.apply(&update).await? {
            counter!("llmq_xp_reward_total", "source" => source.clone()).increment(1);
            debug!(
                task_id = %update.task_id,
                reward = ?update.reward,
                source = %source,
                "Applied task reward"
            );
        } else {
            warn!(task_id = %update.task_id, "Task for reward update not found");
        }
        Ok(())
    }
}

#[async_trait]
impl<R, T, G> LlmQueue for LlmQueueService<R, T, G>
where
    R: QueueEntryRepository,
    T: TaskRewardRepository,
    G: TextGenerationClient,
{
    async fn enqueue(
        &self,
        user_id: &str,
        prompt: &str,
        feature: &str,
        task_id: Option<&str>,
    ) -> Result<Uuid, QueueError> {
        let entry = QueueEntry::new(user_id, prompt, feature, task_id.map(str::to_string));
        let created = self.entries.create(&entry).await?;

        let label = self.post_processors.metric_label(&created.feature).to_string();
        counter!("llmq_enqueued_total", "feature" => label).increment(1);
        debug!(entry_id = %created.id, feature = %created.feature, "Enqueued LLM request");
        Ok(created.id)
    }

    async fn has_pending_xp_suggestion_for_task(&self, task_id: &str) -> Result<bool, QueueError> {
        // Advisory only: a concurrent enqueue can still slip in between check and insert
        Ok(self
            .entries
            .exists_unfinished_for_task(FEATURE_XP_REWARD, task_id)
            .await?)
    }

    async fn get_result(
        &self,
        request_id: Uuid,
        user_id: &str,
    ) -> Result<Option<QueueResult>, QueueError> {
        let entry = self.entries.find_for_user(request_id, user_id).await?;
        Ok(entry.map(QueueResult::from))
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<bool, QueueError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        self.recover_stuck(now).await?;

        if !self.cooldown_passed(now).await? {
            counter!("llmq_tick_total", "outcome" => "cooldown").increment(1);
            return Ok(false);
        }

        let Some(claimed) = self.claim_next(now).await? else {
            counter!("llmq_tick_total", "outcome" => "idle").increment(1);
            return Ok(false);
        };

        let entry_id = claimed.id;
        let (finished, outcome) = self.generate_and_finalize(claimed).await?;
        info!(
            entry_id = %entry_id,
            feature = %finished.feature,
            status = %finished.status,
            "Processed LLM queue entry"
        );

        self.apply_post_processing(&finished, &outcome).await?;

        counter!("llmq_tick_total", "outcome" => "processed").increment(1);
        Ok(true)
    }

    async fn has_unfinished_work(&self) -> Result<bool, QueueError> {
        Ok(self.entries.count_unfinished().await? > 0)
    }
}

#[async_trait]
impl<Q: LlmQueue + ?Sized> LlmQueue for Arc<Q> {
    async fn enqueue(
        &self,
        user_id: &str,
        prompt: &str,
        feature: &str,
        task_id: Option<&str>,
    ) -> Result<Uuid, QueueError> {
        (**self).enqueue(user_id, prompt, feature, task_id).await
    }

    async fn has_pending_xp_suggestion_for_task(&self, task_id: &str) -> Result<bool, QueueError> {
        (**self).has_pending_xp_suggestion_for_task(task_id).await
    }

    async fn get_result(
        &self,
        request_id: Uuid,
        user_id: &str,
    ) -> Result<Option<QueueResult>, QueueError> {
        (**self).get_result(request_id, user_id).await
    }

    async fn tick(&self) -> Result<bool, QueueError> {
        (**self).tick().await
    }

    async fn has_unfinished_work(&self) -> Result<bool, QueueError> {
        (**self).has_unfinished_work().await
    }
}
