use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, StatusCode};

use crate::agent::AgentError;
use crate::agent::config::ModelConfig;
use crate::agent::prompt::ModelRequest;
use crate::agent::session::Role;

use super::ModelBackend;

pub mod models;

use models::{
    GeminiContent, GeminiErrorBody, GeminiPart, GeminiPayload, GeminiResponse, GenerationConfig,
};

/// `ModelBackend` 的 Gemini 實作，透過 `generateContent` 端點取得結構化回覆。
pub struct GeminiBackend {
    /// 不含金鑰的生成端點。
    endpoint: String,
    /// 以 `key` 查詢參數附加在 URL 上的 API 金鑰。
    api_key: String,
    /// 每次請求共用的生成參數與回覆結構。
    generation: GenerationConfig,
    /// 用於日誌的標籤，例如 `Gemini (gemini-3-pro-preview)`。
    label: String,
    /// `reqwest` 的非同步 HTTP 客戶端。
    client: Client,
}

impl GeminiBackend {
    /// 根據模型設定與已解析的金鑰建立後端。
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("建立 HTTP 客戶端失敗")?;
        Ok(Self {
            endpoint: config.endpoint(),
            api_key,
            generation: GenerationConfig::new(config.temperature, config.top_k, config.top_p),
            label: format!("Gemini ({})", config.model),
            client,
        })
    }

    /// 將指示區塊與歷史轉換為 Gemini 的請求主體。
    ///
    /// 指示區塊以第一個 `user` 內容送出，後面接著完整的對話歷史。
    fn payload<'a>(&'a self, request: ModelRequest<'a>) -> GeminiPayload<'a> {
        let mut contents = Vec::with_capacity(request.turns.len() + 1);
        contents.push(GeminiContent {
            role: Role::User.as_str(),
            parts: vec![GeminiPart {
                text: request.instruction,
            }],
        });
        contents.extend(request.turns.iter().map(|turn| GeminiContent {
            role: turn.role().as_str(),
            parts: vec![GeminiPart { text: turn.text() }],
        }));
        GeminiPayload {
            contents,
            generation_config: self.generation.clone(),
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, request: ModelRequest<'_>) -> Result<String, AgentError> {
        let payload = self.payload(request);
        info!(
            "送出 Gemini 請求：{} 個歷史回合",
            payload.contents.len().saturating_sub(1)
        );

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &text);
            warn!("Gemini 回應錯誤 ({}): {}", status, text);
            return Err(err);
        }

        let body = response.text().await?;
        debug!("Gemini 完整回應: {}", body);

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|err| {
            error!("無法解析 Gemini 回應主體: {err}");
            AgentError::InvalidResponseShape
        })?;
        let text = parsed.first_text().ok_or_else(|| {
            error!("Gemini 回應缺少候選文字: {}", body);
            AgentError::InvalidResponseShape
        })?;
        debug!("模型原始回覆: {}", text);
        Ok(text)
    }
}

/// 將非成功的 HTTP 狀態碼轉換為使用者可理解的錯誤類別。
///
/// 若回應主體是 `{"error": {"message": ...}}` 則取用遠端提供的訊息，
/// 否則直接附上原始文字。
pub fn classify_failure(status: StatusCode, body: &str) -> AgentError {
    let detail = serde_json::from_str::<GeminiErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::SERVICE_UNAVAILABLE => AgentError::ServiceUnavailable,
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::AuthFailure,
        StatusCode::BAD_REQUEST => AgentError::BadRequest(detail),
        other => AgentError::RequestFailed {
            status: other.as_u16(),
            detail,
        },
    }
}
