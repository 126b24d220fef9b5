// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::task_reward::TaskRewardUpdate;
use crate::domain::repositories::queue_entry_repository::RepositoryError;
use crate::domain::repositories::task_reward_repository::TaskRewardRepository;
use crate::infrastructure::database::entities::task as task_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;

/// 任务奖励仓库实现
#[derive(Clone)]
pub struct TaskRewardRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl TaskRewardRepositoryImpl {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskRewardRepository for TaskRewardRepositoryImpl {
    async fn apply(&self, update: &TaskRewardUpdate) -> Result<bool, RepositoryError> {
        let now: DateTime<FixedOffset> = Utc::now().into();

        let mut query = task_entity::Entity::update_many()
            .col_expr(
                task_entity::Column::XpAwardSource,
                Expr::value(Some(update.award_source.to_string())),
            )
            .col_expr(task_entity::Column::UpdatedAt, Expr::value(now));

        // A missing reward keeps whatever value the task already has
        if let Some(reward) = update.reward {
            query = query.col_expr(task_entity::Column::XpReward, Expr::value(reward));
        }

        let result = query
            .filter(task_entity::Column::Id.eq(update.task_id.as_str()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected > 0)
    }
}
