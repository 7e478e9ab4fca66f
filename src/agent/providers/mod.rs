//! `providers` 模組負責與遠端語言模型通訊的具體實作。
//!
//! 每個子模組都實現了 `ModelBackend` trait，抽象化了特定 API 的細節。

/// `gemini` 模組：透過 HTTP 與 Google Gemini `generateContent` 端點通訊。
pub mod gemini;

use async_trait::async_trait;

use crate::agent::AgentError;
use crate::agent::prompt::ModelRequest;

/// 定義了所有模型後端都必須遵守的通用行為介面。
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// 回傳此後端的名稱，用於日誌記錄。
    fn name(&self) -> &str;

    /// 將請求送往模型，並回傳模型回覆的原始文字。
    ///
    /// 不做任何自動重試；失敗時回傳已分類的 `AgentError`。
    async fn generate(&self, request: ModelRequest<'_>) -> Result<String, AgentError>;
}
