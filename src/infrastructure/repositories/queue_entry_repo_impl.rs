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

use crate::domain::models::queue_entry::{QueueEntry, QueueStatus};
use crate::domain::repositories::queue_entry_repository::{
    QueueEntryRepository, RepositoryError,
};
use crate::infrastructure::database::entities::llm_queue_entry as entry_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 队列条目仓库实现
///
/// 基于SeaORM实现。状态变更全部通过带条件的 `UPDATE` 完成，
/// 不使用事务或行锁。
#[derive(Clone)]
pub struct QueueEntryRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl QueueEntryRepositoryImpl {
    /// 创建新的队列条目仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<entry_entity::Model> for QueueEntry {
    fn from(model: entry_entity::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            prompt: model.prompt,
            feature: model.feature,
            task_id: model.task_id,
            status: model.status.parse().unwrap_or_default(),
            result: model.result_text,
            error: model.error_message,
            created_at: model.created_at,
            updated_at: model.updated_at,
            processed_at: model.processed_at,
        }
    }
}

impl From<QueueEntry> for entry_entity::ActiveModel {
    fn from(entry: QueueEntry) -> Self {
        Self {
            id: Set(entry.id),
            user_id: Set(entry.user_id),
            prompt: Set(entry.prompt),
            feature: Set(entry.feature),
            task_id: Set(entry.task_id),
            status: Set(entry.status.to_string()),
            result_text: Set(entry.result),
            error_message: Set(entry.error),
            created_at: Set(entry.created_at),
            updated_at: Set(entry.updated_at),
            processed_at: Set(entry.processed_at),
        }
    }
}

fn unfinished_statuses() -> Vec<String> {
    vec![
        QueueStatus::Pending.to_string(),
        QueueStatus::Processing.to_string(),
    ]
}

#[async_trait]
impl QueueEntryRepository for QueueEntryRepositoryImpl {
    async fn create(&self, entry: &QueueEntry) -> Result<QueueEntry, RepositoryError> {
        let model: entry_entity::ActiveModel = entry.clone().into();

        let inserted = model.insert(self.db.as_ref()).await?;
        Ok(inserted.into())
    }

    async fn find_for_user(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<QueueEntry>, RepositoryError> {
        let model = entry_entity::Entity::find()
            .filter(entry_entity::Column::Id.eq(id))
            .filter(entry_entity::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn exists_unfinished_for_task(
        &self,
        feature: &str,
        task_id: &str,
    ) -> Result<bool, RepositoryError> {
        let count = entry_entity::Entity::find()
            .filter(entry_entity::Column::Feature.eq(feature))
            .filter(entry_entity::Column::TaskId.eq(task_id))
            .filter(entry_entity::Column::Status.is_in(unfinished_statuses()))
            .count(self.db.as_ref())
            .await?;

        Ok(count > 0)
    }

    async fn find_oldest_stale_processing(
        &self,
        updated_before: DateTime<FixedOffset>,
    ) -> Result<Option<QueueEntry>, RepositoryError> {
        let model = entry_entity::Entity::find()
            .filter(entry_entity::Column::Status.eq(QueueStatus::Processing.to_string()))
            .filter(entry_entity::Column::UpdatedAt.lt(updated_before))
            .order_by_asc(entry_entity::Column::UpdatedAt)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_latest_processed(&self) -> Result<Option<QueueEntry>, RepositoryError> {
        let model = entry_entity::Entity::find()
            .filter(entry_entity::Column::Status.is_in(vec![
                QueueStatus::Done.to_string(),
                QueueStatus::Failed.to_string(),
            ]))
            .filter(entry_entity::Column::ProcessedAt.is_not_null())
            .order_by_desc(entry_entity::Column::ProcessedAt)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_oldest_pending(&self) -> Result<Option<QueueEntry>, RepositoryError> {
        let model = entry_entity::Entity::find()
            .filter(entry_entity::Column::Status.eq(QueueStatus::Pending.to_string()))
            .order_by_asc(entry_entity::Column::CreatedAt)
            // Same-timestamp entries still resolve to one stable candidate
            .order_by_asc(entry_entity::Column::Id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: QueueStatus,
        to: QueueStatus,
        at: DateTime<FixedOffset>,
    ) -> Result<bool, RepositoryError> {
        // Single UPDATE ... WHERE id = ? AND status = ?; rows_affected decides the winner
        let result = entry_entity::Entity::update_many()
            .col_expr(entry_entity::Column::Status, Expr::value(to.to_string()))
            .col_expr(entry_entity::Column::UpdatedAt, Expr::value(at))
            .filter(entry_entity::Column::Id.eq(id))
            .filter(entry_entity::Column::Status.eq(from.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    async fn save_outcome(&self, entry: &QueueEntry) -> Result<(), RepositoryError> {
        let result = entry_entity::Entity::update_many()
            .col_expr(
                entry_entity::Column::Status,
                Expr::value(entry.status.to_string()),
            )
            .col_expr(
                entry_entity::Column::ResultText,
                Expr::value(entry.result.clone()),
            )
            .col_expr(
                entry_entity::Column::ErrorMessage,
                Expr::value(entry.error.clone()),
            )
            .col_expr(
                entry_entity::Column::ProcessedAt,
                Expr::value::<Option<DateTime<FixedOffset>>>(entry.processed_at),
            )
            .col_expr(entry_entity::Column::UpdatedAt, Expr::value(entry.updated_at))
            .filter(entry_entity::Column::Id.eq(entry.id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn count_unfinished(&self) -> Result<u64, RepositoryError> {
        let count = entry_entity::Entity::find()
            .filter(entry_entity::Column::Status.is_in(unfinished_statuses()))
            .count(self.db.as_ref())
            .await?;

        Ok(count)
    }
}
