// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LlmSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 外部调用失败且未给出原因时使用的错误信息
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// 文本生成结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// 生成成功
    Success { text: String },
    /// 生成失败，错误信息原样透传
    Failure { error: Option<String> },
}

impl GenerationOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        GenerationOutcome::Success { text: text.into() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        GenerationOutcome::Failure {
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success { .. })
    }

    /// 失败时的错误信息，缺省为 `Unknown error`
    pub fn error_message(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Success { .. } => None,
            GenerationOutcome::Failure { error } => {
                Some(error.as_deref().unwrap_or(UNKNOWN_ERROR))
            }
        }
    }
}

/// 文本生成客户端特质
///
/// 外部文本生成服务的黑盒抽象。实现方不得返回 `Err` 或 panic，
/// 所有失败都以 `GenerationOutcome::Failure` 表达。
#[async_trait]
pub trait TextGenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> GenerationOutcome;
}

/// 生成请求内部错误
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("LLM API key not configured")]
    MissingApiKey,

    #[error("Failed to send request to LLM API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM API returned error: {status} - {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid response format from LLM API")]
    InvalidResponse,
}

/// Chat Completions 客户端 - 处理与 OpenAI 兼容接口的交互
///
/// # 配置
///
/// 通过 `LlmSettings` 进行配置：
/// - `api_key` - LLM API密钥
/// - `model` - 使用的模型名称
/// - `api_base_url` - LLM API基础URL
/// - `request_timeout_secs` - 单次请求超时时间
pub struct ChatCompletionClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_base_url: String,
}

impl ChatCompletionClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone().filter(|key| !key.is_empty()),
            model: settings.model.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn new_with_config(api_key: String, model: String, api_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key),
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// 发送单轮对话请求并返回模型输出的文本
    ///
    /// # 错误
    /// * 当API密钥未配置时返回错误
    /// * 当请求发送失败或接口返回非成功状态码时返回错误
    /// * 当响应中缺少消息内容时返回错误
    pub async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(GenerationError::MissingApiKey)?;

        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.0
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status { status, body });
        }

        let body: Value = response.json().await?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .ok_or(GenerationError::InvalidResponse)
    }
}

#[async_trait]
impl TextGenerationClient for ChatCompletionClient {
    async fn generate(&self, prompt: &str) -> GenerationOutcome {
        match self.complete(prompt).await {
            Ok(text) => GenerationOutcome::Success { text },
            Err(e) => {
                debug!(error = %e, "Text generation request failed");
                GenerationOutcome::failure(e.to_string())
            }
        }
    }
}
