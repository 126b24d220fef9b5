// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含队列条目模型、仓库接口、文本生成抽象与后处理规则
pub mod domain;

/// 基础设施模块
///
/// 提供数据库、仓库实现与指标导出
pub mod infrastructure;

/// 队列模块
///
/// 实现LLM请求队列及其逐步推进算法
pub mod queue;

/// 工具模块
///
/// 提供错误类型与遥测初始化
pub mod utils;

/// 工作器模块
///
/// 实现后台队列排空
pub mod workers;
