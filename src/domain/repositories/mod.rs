// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 队列条目仓库（queue_entry_repository）：管理LLM请求条目的存储与条件更新
/// - 任务奖励仓库（task_reward_repository）：回写外部任务的经验值奖励
pub mod queue_entry_repository;
pub mod task_reward_repository;
