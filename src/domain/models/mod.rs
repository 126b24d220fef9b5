// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 包含队列条目及其关联任务奖励的核心数据结构
pub mod queue_entry;
pub mod task_reward;
