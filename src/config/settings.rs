// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::queue::llm_queue::{DEFAULT_COOLDOWN_MS, DEFAULT_STALE_AFTER_MS};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、LLM、队列节奏、后台工作器和指标等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// LLM配置
    pub llm: LlmSettings,
    /// 队列配置
    pub queue: QueueSettings,
    /// 后台工作器配置
    pub worker: WorkerSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
    /// 是否输出 SQL 日志
    pub sqlx_logging: bool,
}

/// LLM配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    /// LLM API密钥
    pub api_key: Option<String>,
    /// 使用的模型名称
    pub model: String,
    /// LLM API基础URL
    pub api_base_url: String,
    /// 单次请求超时时间（秒）
    pub request_timeout_secs: u64,
}

/// 队列节奏配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// 两次外部调用之间的最小间隔（毫秒）
    pub cooldown_ms: u64,
    /// Processing 条目被视为卡住的时长（毫秒）
    pub stale_after_ms: u64,
}

impl QueueSettings {
    /// 冷却时间；超出可表示范围时取最大值
    pub fn cooldown(&self) -> chrono::Duration {
        millis_to_duration(self.cooldown_ms).unwrap_or(chrono::Duration::MAX)
    }

    /// 卡住判定时长；超出可表示范围时取最大值
    pub fn stale_after(&self) -> chrono::Duration {
        millis_to_duration(self.stale_after_ms).unwrap_or(chrono::Duration::MAX)
    }

    /// 校验毫秒配置均可转换为时长
    ///
    /// # Returns
    ///
    /// * `Ok(())` - 配置有效
    /// * `Err(ConfigError)` - 某个值超出范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("queue.cooldown_ms", self.cooldown_ms),
            ("queue.stale_after_ms", self.stale_after_ms),
        ] {
            if millis_to_duration(value).is_none() {
                return Err(ConfigError::Message(format!(
                    "{key} is out of range: {value}"
                )));
            }
        }
        Ok(())
    }
}

fn millis_to_duration(ms: u64) -> Option<chrono::Duration> {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
}

/// 后台工作器配置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 队列仍有未完成条目时两次 tick 之间的等待时间（毫秒）
    pub poll_interval_ms: u64,
    /// 没有触发信号时的空闲唤醒间隔（毫秒）
    pub idle_interval_ms: u64,
    /// 单次排空最多执行的 tick 次数
    pub max_ticks_per_drain: u32,
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

/// 指标配置
#[derive(Debug, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用 Prometheus 导出器
    pub enabled: bool,
    /// 导出器监听地址
    pub listen_address: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 依次加载默认值、`config/default`、`config/{APP_ENVIRONMENT}`，
    /// 最后由 `LLMQ__` 前缀的环境变量覆盖
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let settings: Settings = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("LLMQ").separator("__"))
            .build()?
            .try_deserialize()?;

        settings.queue.validate()?;
        Ok(settings)
    }

    /// 仅包含默认值的配置构建器
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            // Default DB settings
            .set_default("database.url", "sqlite://llmq.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            .set_default("database.sqlx_logging", false)?
            // Default LLM settings
            .set_default("llm.model", "gpt-4o-mini")?
            .set_default("llm.api_base_url", "https://api.openai.com/v1")?
            .set_default("llm.request_timeout_secs", 30)?
            // Queue pacing tuned for free-tier upstream quotas
            .set_default("queue.cooldown_ms", DEFAULT_COOLDOWN_MS)?
            .set_default("queue.stale_after_ms", DEFAULT_STALE_AFTER_MS)?
            // Default worker settings
            .set_default("worker.poll_interval_ms", 1000)?
            .set_default("worker.idle_interval_ms", 30_000)?
            .set_default("worker.max_ticks_per_drain", 500)?
            // Default metrics settings
            .set_default("metrics.enabled", true)?
            .set_default("metrics.listen_address", "0.0.0.0:9000")
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
