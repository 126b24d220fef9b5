// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供LLM请求队列：入队、去重检查、结果查询与逐步推进
pub mod llm_queue;
