// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task_reward::TaskRewardUpdate;
use crate::domain::repositories::queue_entry_repository::RepositoryError;
use async_trait::async_trait;

/// 任务奖励仓库特质
///
/// 外部任务记录的写入接口，队列只写奖励值和奖励来源
#[async_trait]
pub trait TaskRewardRepository: Send + Sync {
    /// 应用奖励更新
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 任务存在并已更新
    /// * `Ok(false)` - 任务不存在
    async fn apply(&self, update: &TaskRewardUpdate) -> Result<bool, RepositoryError>;
}
