// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_entry::{QueueEntry, FEATURE_XP_REWARD};
use crate::domain::models::task_reward::{TaskRewardUpdate, MAX_XP_REWARD};
use crate::domain::services::llm_service::GenerationOutcome;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static FIRST_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+").expect("integer pattern is valid"));

/// 后处理副作用
///
/// 后处理函数只描述要做什么，由队列服务负责执行
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessEffect {
    /// 更新外部任务的奖励值与来源
    UpdateTaskReward(TaskRewardUpdate),
}

/// 后处理函数
///
/// 纯函数：输入已完成的条目和生成结果，输出可选的副作用
pub type PostProcessor = fn(&QueueEntry, &GenerationOutcome) -> Option<PostProcessEffect>;

/// 按功能标签分发的后处理注册表
#[derive(Clone)]
pub struct PostProcessorRegistry {
    processors: HashMap<String, PostProcessor>,
}

impl Default for PostProcessorRegistry {
    /// 默认注册 `xp-reward` 处理函数
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FEATURE_XP_REWARD, xp_reward);
        registry
    }
}

impl PostProcessorRegistry {
    pub fn empty() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// 注册或替换某个功能标签的处理函数
    pub fn register(&mut self, feature: impl Into<String>, processor: PostProcessor) {
        self.processors.insert(feature.into(), processor);
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.processors.contains_key(feature)
    }

    /// 指标标签用的功能名；未注册的功能统一归为 `other`，避免标签基数无限增长
    pub fn metric_label<'a>(&self, feature: &'a str) -> &'a str {
        if self.contains(feature) {
            feature
        } else {
            "other"
        }
    }

    /// 对条目执行其功能标签对应的处理函数，未注册的标签没有副作用
    pub fn process(
        &self,
        entry: &QueueEntry,
        outcome: &GenerationOutcome,
    ) -> Option<PostProcessEffect> {
        self.processors
            .get(entry.feature.as_str())
            .and_then(|processor| processor(entry, outcome))
    }
}

/// 提取文本中出现的第一个整数
///
/// 超出 `i64` 范围的数字视为无法解析
pub fn extract_first_integer(text: &str) -> Option<i64> {
    FIRST_INTEGER
        .find(text)
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// `xp-reward` 后处理
///
/// 生成成功且文本中第一个整数位于 `[0, MAX_XP_REWARD]` 时确认奖励；
/// 其余情况（调用失败、无整数、越界）仅标记为 AI 失败，保留原奖励值。
pub fn xp_reward(entry: &QueueEntry, outcome: &GenerationOutcome) -> Option<PostProcessEffect> {
    let task_id = entry.task_id.as_deref()?;

    let reward = match outcome {
        GenerationOutcome::Success { text } => {
            extract_first_integer(text).filter(|value| (0..=MAX_XP_REWARD).contains(value))
        }
        GenerationOutcome::Failure { .. } => None,
    };

    let update = match reward {
        Some(value) => TaskRewardUpdate::confirmed(task_id, value),
        None => TaskRewardUpdate::failed(task_id),
    };

    Some(PostProcessEffect::UpdateTaskReward(update))
}
