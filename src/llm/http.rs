//! [`HttpLlmAdapter`] — a concrete [`LlmAdapter`] backed by a local HTTP
//! generation endpoint.
//!
//! Grounded in the one backend this system has historically deployed
//! against: a local model server exposing a single `generate`-style POST
//! endpoint. Prompt construction, truncation, and output coercion mirror
//! that deployment's behavior verbatim, including the exact two tokens the
//! model is constrained to and the fallback to `normal` on anything else.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

use super::{LlmAdapter, LlmVerdict};

const SENSITIVE_TOKEN: &str = "敏感";
const NORMAL_TOKEN: &str = "正常";

const PROMPT_TEMPLATE: &str = r"你是专业的内容安全检测系统。请严格按照以下规则进行判断：

【敏感内容标准】
必须同时满足以下条件才判定为敏感：
1. 包含明确的辱骂词汇（如：白痴、傻逼、去死等）
2. 包含暴力威胁（如：杀了你、打你、伤害等）
3. 包含违法内容（如：毒品、犯罪、违法等）
4. 包含色情内容（如：性暗示、色情描述等）
5. 包含歧视内容（如：种族歧视、性别歧视等）

【检测文本】
{text}

【判断规则】
- 如果文本明显包含上述任何一类敏感内容，回答：敏感
- 如果文本是正常的日常对话、描述、询问等，回答：正常
- 对于模糊边界的内容，倾向于判定为正常

【输出要求】
请严格按照以下格式输出，不要添加任何其他内容：
敏感
或
正常";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Calls a local HTTP generation endpoint and coerces its output to
/// [`LlmVerdict`]. Any transport failure, non-success status, malformed
/// body, or response other than exactly the two constrained tokens is
/// coerced to [`LlmVerdict::Normal`] — the adapter never returns an error
/// and never panics on a hostile or broken backend.
pub struct HttpLlmAdapter {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmAdapter {
    /// Build an adapter from `config` (the `llm` section of a
    /// [`crate::config::GatewayConfig`]), constructing its own `reqwest`
    /// client with the configured per-call timeout.
    ///
    /// # Panics
    ///
    /// Panics if the underlying TLS backend fails to initialize, which in
    /// practice only happens on a misconfigured build.
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .expect("reqwest client builds with rustls-tls enabled");
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmAdapter for HttpLlmAdapter {
    async fn classify(&self, text: &str) -> LlmVerdict {
        let prompt = PROMPT_TEMPLATE.replacen("{text}", text, 1);
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            temperature: 0.0,
        };

        let response = match self.client.post(self.endpoint()).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "llm backend call failed; coercing to normal");
                return LlmVerdict::Normal;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "llm backend returned non-success status; coercing to normal");
            return LlmVerdict::Normal;
        }

        let parsed: GenerateResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "llm backend response was not valid JSON; coercing to normal");
                return LlmVerdict::Normal;
            }
        };

        match parsed.response.trim() {
            SENSITIVE_TOKEN => LlmVerdict::Sensitive,
            NORMAL_TOKEN => LlmVerdict::Normal,
            other => {
                tracing::warn!(output = %other, "llm backend returned an unconstrained token; coercing to normal");
                LlmVerdict::Normal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_matches_historical_deployment_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(!config.model.is_empty());
    }

    #[test]
    fn endpoint_joins_base_url_and_path_without_double_slash() {
        let adapter = HttpLlmAdapter::new(LlmConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..LlmConfig::default()
        });
        assert_eq!(adapter.endpoint(), "http://localhost:11434/api/generate");
    }
}
