//! 聊天代理的核心流程。
//!
//! 此模組描述從使用者訊息到模型回覆的每一步：對話狀態、請求組裝、
//! 遠端呼叫、回覆驗證，以及把 UI 事件分派到這些步驟的路由器。

/// `config` 模組：`config/plugin.toml` 的解析格式與啟動時的金鑰偵測。
pub mod config;

/// `error` 模組：聊天路徑上所有可能的失敗，以及對應的使用者訊息。
pub mod error;

/// `message` 模組：UI 與外掛之間往來的事件，以及驗證後的模型回覆。
pub mod message;

/// `prompt` 模組：固定指示區塊與請求組裝。
pub mod prompt;

/// `providers` 模組：與遠端模型通訊的後端實作。
pub mod providers;

/// `reply` 模組：模型回覆的解析與驗證。
pub mod reply;

/// `router` 模組：單一消費者的事件路由器，擁有整個工作階段。
pub mod router;

/// `session` 模組：對話歷史。
pub mod session;

pub use error::AgentError;
pub use message::{AssistantReply, InboundEvent, OutboundEvent};
pub use router::{Router, RouterHandle, SessionEnd};
pub use session::{Role, Session, Turn};
