// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域层仓库接口基于SeaORM的具体实现
pub mod queue_entry_repo_impl;
pub mod task_reward_repo_impl;
