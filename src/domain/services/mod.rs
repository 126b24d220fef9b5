// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - LLM服务（llm_service）：外部文本生成客户端抽象及其 HTTP 实现
/// - 后处理（post_processing）：按功能标签分发的生成结果后处理
pub mod llm_service;
pub mod post_processing;
