// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 奖励值允许的最大值
pub const MAX_XP_REWARD: i64 = 1_000_000;

/// 任务奖励来源
///
/// 标记任务的经验值奖励是由谁确定的
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AwardSource {
    /// 模型给出了可用的奖励值
    AiConfirmed,
    /// 模型调用失败或输出不可用
    AiFailed,
}

impl fmt::Display for AwardSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AwardSource::AiConfirmed => write!(f, "AI_CONFIRMED"),
            AwardSource::AiFailed => write!(f, "AI_FAILED"),
        }
    }
}

impl FromStr for AwardSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AI_CONFIRMED" => Ok(AwardSource::AiConfirmed),
            "AI_FAILED" => Ok(AwardSource::AiFailed),
            _ => Err(()),
        }
    }
}

/// 对外部任务记录的奖励更新
///
/// `reward` 为 `None` 时保留任务原有的奖励值，仅更新来源标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRewardUpdate {
    pub task_id: String,
    pub reward: Option<i64>,
    pub award_source: AwardSource,
}

impl TaskRewardUpdate {
    pub fn confirmed(task_id: impl Into<String>, reward: i64) -> Self {
        Self {
            task_id: task_id.into(),
            reward: Some(reward),
            award_source: AwardSource::AiConfirmed,
        }
    }

    pub fn failed(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            reward: None,
            award_source: AwardSource::AiFailed,
        }
    }
}
