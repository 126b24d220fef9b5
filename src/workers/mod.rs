// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供后台队列推进：串行地调用 `tick` 直到队列排空
pub mod llm_queue_worker;
pub mod worker;

pub use worker::Worker;
