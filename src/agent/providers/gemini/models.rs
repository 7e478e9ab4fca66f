//! Gemini `generateContent` 的請求與回應結構。

use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
pub struct GeminiPart<'a> {
    pub text: &'a str,
}

#[derive(Serialize, Debug)]
pub struct GeminiContent<'a> {
    pub role: &'a str,
    pub parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPayload<'a> {
    pub contents: Vec<GeminiContent<'a>>,
    pub generation_config: GenerationConfig,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub response_mime_type: &'static str,
    pub response_schema: serde_json::Value,
}

impl GenerationConfig {
    pub fn new(temperature: f32, top_k: u32, top_p: f32) -> Self {
        Self {
            temperature,
            top_k,
            top_p,
            response_mime_type: "application/json",
            response_schema: reply_schema(),
        }
    }
}

/// 模型回覆必須符合的結構：`message` 必填，`function` 可省略。
pub fn reply_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "message": {
                "type": "string",
                "description": "Plain English explanation of what the code will do"
            },
            "function": {
                "type": "string",
                "description": "Complete executable JavaScript code wrapped in async IIFE. Use empty string when just interpreting data."
            }
        },
        "required": ["message"]
    })
}

#[derive(Deserialize, Debug, Default)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    /// 第一個候選的第一段文字；任何一層缺漏或為空字串都回傳 `None`。
    pub fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiCandidateContent {
    #[serde(default)]
    pub parts: Vec<GeminiPartOwned>,
}

#[derive(Deserialize, Debug)]
pub struct GeminiPartOwned {
    #[serde(default)]
    pub text: Option<String>,
}

/// 錯誤回應的主體：`{"error": {"message": "..."}}`。
#[derive(Deserialize, Debug)]
pub struct GeminiErrorBody {
    pub error: GeminiErrorDetail,
}

#[derive(Deserialize, Debug)]
pub struct GeminiErrorDetail {
    #[serde(default)]
    pub message: String,
}
