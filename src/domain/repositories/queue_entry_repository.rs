// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::{QueueEntry, QueueStatus};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}

/// 队列条目仓库特质
///
/// 定义队列存储需要提供的最小操作集合：插入、带排序的单条查询、
/// 以ID加状态为条件的比较交换更新，以及按ID的无条件更新。
/// 所有操作均不依赖数据库事务。
#[async_trait]
pub trait QueueEntryRepository: Send + Sync {
    /// 插入新条目
    async fn create(&self, entry: &QueueEntry) -> Result<QueueEntry, RepositoryError>;

    /// 按ID和所属用户查找条目
    async fn find_for_user(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<QueueEntry>, RepositoryError>;

    /// 判断指定功能和任务是否存在未完成（Pending/Processing）的条目
    async fn exists_unfinished_for_task(
        &self,
        feature: &str,
        task_id: &str,
    ) -> Result<bool, RepositoryError>;

    /// 查找最早的、`updated_at` 早于给定时间的 Processing 条目
    async fn find_oldest_stale_processing(
        &self,
        updated_before: DateTime<FixedOffset>,
    ) -> Result<Option<QueueEntry>, RepositoryError>;

    /// 查找 `processed_at` 最新的终态条目
    async fn find_latest_processed(&self) -> Result<Option<QueueEntry>, RepositoryError>;

    /// 查找最早创建的 Pending 条目
    async fn find_oldest_pending(&self) -> Result<Option<QueueEntry>, RepositoryError>;

    /// 条件状态变更
    ///
    /// 仅当条目当前状态等于 `from` 时才写入 `to`，以单条 UPDATE 完成。
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 恰好更新了一行
    /// * `Ok(false)` - 条件不满足，未更新任何行
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<FixedOffset>,
    ) -> Result<bool, RepositoryError>;

    /// 写入终态字段（status/result/error/processed_at/updated_at）
    async fn save_outcome(&self, entry: &QueueEntry) -> Result<(), RepositoryError>;

    /// 统计未完成条目数量
    async fn count_unfinished(&self) -> Result<u64, RepositoryError>;
}
