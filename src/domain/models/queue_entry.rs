// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 经验值奖励建议功能标签
///
/// 带有此标签的条目在完成后会回写关联任务的奖励值
pub const FEATURE_XP_REWARD: &str = "xp-reward";

/// LLM请求队列条目
///
/// 表示一次待执行的文本生成请求及其生命周期状态。
/// 除 `status`、`result`、`error`、`updated_at`、`processed_at` 外，
/// 其余字段在创建后不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    /// 条目唯一标识符
    pub id: Uuid,
    /// 所属用户ID
    pub user_id: String,
    /// 提交给文本生成服务的提示词
    pub prompt: String,
    /// 调用方功能标签，例如 `xp-reward`
    pub feature: String,
    /// 关联的外部任务ID（仅 `xp-reward` 使用）
    pub task_id: Option<String>,
    /// 当前状态
    pub status: QueueStatus,
    /// 生成结果，仅在 `Done` 状态下非空
    pub result: Option<String>,
    /// 错误信息，仅在 `Failed` 状态下非空
    pub error: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 最后一次状态变更时间
    pub updated_at: DateTime<FixedOffset>,
    /// 进入终态的时间
    pub processed_at: Option<DateTime<FixedOffset>>,
}

/// 队列条目状态
///
/// 状态转换遵循以下流程：
/// Pending → Processing → Done/Failed
///
/// 另有一条仅用于恢复的路径：陈旧的 Processing → Pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// 等待处理
    #[default]
    Pending,
    /// 已被某次 tick 认领，正在调用外部服务
    Processing,
    /// 生成成功
    Done,
    /// 生成失败
    Failed,
}

impl QueueStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Done | QueueStatus::Failed)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "PENDING"),
            QueueStatus::Processing => write!(f, "PROCESSING"),
            QueueStatus::Done => write!(f, "DONE"),
            QueueStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for QueueStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(QueueStatus::Pending),
            "PROCESSING" => Ok(QueueStatus::Processing),
            "DONE" => Ok(QueueStatus::Done),
            "FAILED" => Ok(QueueStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: QueueStatus, to: QueueStatus },
}

/// 结果查询投影
///
/// 轮询接口返回给调用方的字段子集
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueResult {
    pub status: QueueStatus,
    pub feature: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub processed_at: Option<DateTime<FixedOffset>>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<QueueEntry> for QueueResult {
    fn from(entry: QueueEntry) -> Self {
        Self {
            status: entry.status,
            feature: entry.feature,
            result: entry.result,
            error: entry.error,
            created_at: entry.created_at,
            processed_at: entry.processed_at,
            updated_at: entry.updated_at,
        }
    }
}

impl QueueEntry {
    /// 创建一个新的待处理条目
    ///
    /// # 参数
    ///
    /// * `user_id` - 所属用户ID
    /// * `prompt` - 提示词
    /// * `feature` - 功能标签
    /// * `task_id` - 关联的外部任务ID
    pub fn new(
        user_id: impl Into<String>,
        prompt: impl Into<String>,
        feature: impl Into<String>,
        task_id: Option<String>,
    ) -> Self {
        let now: DateTime<FixedOffset> = Utc::now().into();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            prompt: prompt.into(),
            feature: feature.into(),
            task_id,
            status: QueueStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    /// 认领条目：Pending → Processing
    pub fn claim(mut self, at: DateTime<FixedOffset>) -> Result<Self, DomainError> {
        self.transition(QueueStatus::Pending, QueueStatus::Processing)?;
        self.updated_at = at;
        Ok(self)
    }

    /// 生成成功：Processing → Done
    pub fn complete(
        mut self,
        text: impl Into<String>,
        at: DateTime<FixedOffset>,
    ) -> Result<Self, DomainError> {
        self.transition(QueueStatus::Processing, QueueStatus::Done)?;
        self.result = Some(text.into());
        self.error = None;
        self.processed_at = Some(at);
        self.updated_at = at;
        Ok(self)
    }

    /// 生成失败：Processing → Failed
    pub fn fail(
        mut self,
        error: impl Into<String>,
        at: DateTime<FixedOffset>,
    ) -> Result<Self, DomainError> {
        self.transition(QueueStatus::Processing, QueueStatus::Failed)?;
        self.result = None;
        self.error = Some(error.into());
        self.processed_at = Some(at);
        self.updated_at = at;
        Ok(self)
    }

    /// 恢复卡住的条目：Processing → Pending
    pub fn recover(mut self, at: DateTime<FixedOffset>) -> Result<Self, DomainError> {
        self.transition(QueueStatus::Processing, QueueStatus::Pending)?;
        self.updated_at = at;
        Ok(self)
    }

    fn transition(&mut self, from: QueueStatus, to: QueueStatus) -> Result<(), DomainError> {
        if self.status != from {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
