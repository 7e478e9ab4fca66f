use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 經過驗證的模型回覆。
///
/// `message` 是給使用者看的說明；`function` 是要在宿主環境執行的程式碼，
/// 當模型只是在解讀資料時為空字串。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantReply {
    pub message: String,
    #[serde(default)]
    pub function: String,
}

impl AssistantReply {
    pub fn new(message: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            function: function.into(),
        }
    }

    /// 回覆是否附帶需要執行的程式碼。
    pub fn has_code(&self) -> bool {
        !self.function.trim().is_empty()
    }
}

/// 由 UI 傳入外掛的事件。
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// 使用者送出一則新的聊天訊息。
    SendMessage { message: String },
    /// 將上一次執行錯誤回饋給模型，請它修正程式碼。
    SendErrorFeedback { error: String },
    /// 執行一段程式碼；`messageId` 由 UI 自行決定，原樣帶回。
    ExecuteCode {
        code: String,
        #[serde(rename = "messageId", default)]
        message_id: Value,
    },
    /// 結束外掛工作階段。
    Cancel,
}

/// 由外掛送回 UI 的事件。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundEvent {
    AiResponse {
        data: AssistantReply,
        #[serde(
            rename = "isRetry",
            default,
            skip_serializing_if = "std::ops::Not::not"
        )]
        is_retry: bool,
    },
    ApiError {
        error: String,
    },
    ExecutionSuccess {
        #[serde(rename = "messageId")]
        message_id: Value,
        #[serde(rename = "returnValue")]
        return_value: Value,
    },
    ExecutionError {
        #[serde(rename = "messageId")]
        message_id: Value,
        error: String,
        stack: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn inbound_events_parse_from_ui_shape() {
        let send: InboundEvent =
            serde_json::from_value(json!({"type": "send-message", "message": "hi"})).unwrap();
        assert_eq!(
            send,
            InboundEvent::SendMessage {
                message: "hi".into()
            }
        );

        let exec: InboundEvent = serde_json::from_value(
            json!({"type": "execute-code", "code": "1", "messageId": "msg-7"}),
        )
        .unwrap();
        assert_eq!(
            exec,
            InboundEvent::ExecuteCode {
                code: "1".into(),
                message_id: json!("msg-7"),
            }
        );

        let cancel: InboundEvent = serde_json::from_value(json!({"type": "cancel"})).unwrap();
        assert_eq!(cancel, InboundEvent::Cancel);
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let result = serde_json::from_value::<InboundEvent>(json!({"type": "resize"}));
        assert!(result.is_err());
    }

    #[test]
    fn retry_flag_only_serialized_when_set() {
        let plain = OutboundEvent::AiResponse {
            data: AssistantReply::new("hello", ""),
            is_retry: false,
        };
        assert_eq!(
            serde_json::to_value(&plain).unwrap(),
            json!({"type": "ai-response", "data": {"message": "hello", "function": ""}})
        );

        let retry = OutboundEvent::AiResponse {
            data: AssistantReply::new("fixed", "(async () => {})();"),
            is_retry: true,
        };
        assert_eq!(serde_json::to_value(&retry).unwrap()["isRetry"], json!(true));
    }

    #[test]
    fn execution_events_use_camel_case_fields() {
        let ok = OutboundEvent::ExecutionSuccess {
            message_id: json!(3),
            return_value: json!({"width": 200}),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"type": "execution-success", "messageId": 3, "returnValue": {"width": 200}})
        );

        let failed = OutboundEvent::ExecutionError {
            message_id: json!(3),
            error: "x".into(),
            stack: String::new(),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"type": "execution-error", "messageId": 3, "error": "x", "stack": ""})
        );
    }
}
