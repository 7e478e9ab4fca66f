//! 解析並驗證模型回傳的結構化回覆。

use serde_json::Value;

use super::{AgentError, AssistantReply};

/// 將模型回傳的文字解析為 [`AssistantReply`]。
///
/// 文字本身必須是一個 JSON 物件：`message` 為必要的非空字串，
/// `function` 可省略或為 `null`（視為空字串），若存在則必須是字串。
pub fn parse_reply(text: &str) -> Result<AssistantReply, AgentError> {
    let parsed: Value =
        serde_json::from_str(text).map_err(|err| AgentError::MalformedResponse(err.to_string()))?;

    let object = parsed.as_object().ok_or(AgentError::NotAnObject)?;

    let message = match object.get("message") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        _ => {
            log::warn!("模型回覆缺少有效的 message 欄位: {}", text);
            return Err(AgentError::MissingMessage);
        }
    };

    let function = match object.get("function") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(code)) => code.clone(),
        Some(other) => {
            log::warn!("模型回覆的 function 欄位型別錯誤: {}", other);
            return Err(AgentError::InvalidFunctionField);
        }
    };

    Ok(AssistantReply { message, function })
}
