//! 組裝送往模型的請求：固定的指示區塊加上完整的對話歷史。

use super::session::{Session, Turn};

/// 內建的設計代理指示，說明輸出格式與宿主 API 的常見用法。
pub const DEFAULT_INSTRUCTION: &str = include_str!("system_prompt.md");

/// 一次模型呼叫所需的全部內容。
///
/// `turns` 借用自工作階段，因此請求存在期間不會有其他回合被附加。
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    /// 固定的指示區塊。
    pub instruction: &'a str,
    /// 包含最新使用者回合的完整歷史。
    pub turns: &'a [Turn],
}

/// 將使用者訊息附加到歷史中，並回傳包含完整歷史的請求。
///
/// 歷史不做截斷或摘要，會隨著工作階段持續成長。
pub fn build_request<'a>(
    session: &'a mut Session,
    instruction: &'a str,
    user_message: impl Into<String>,
) -> ModelRequest<'a> {
    session.push_user(user_message);
    ModelRequest {
        instruction,
        turns: session.turns(),
    }
}

/// 將一次執行錯誤包裝成請模型修正程式碼的使用者訊息。
pub fn error_feedback_message(error: &str) -> String {
    format!(
        "The previous code resulted in this error:\n\n{}\n\nPlease fix the code and try again.",
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::session::Role;

    #[test]
    fn user_turn_is_appended_before_building() {
        let mut session = Session::new();
        session.push_user("first");
        session.push_model("{\"message\":\"ok\"}");

        let request = build_request(&mut session, "instruction", "second");
        assert_eq!(request.instruction, "instruction");
        assert_eq!(request.turns.len(), 3);
        let last = request.turns.last().unwrap();
        assert_eq!(last.role(), Role::User);
        assert_eq!(last.text(), "second");

        assert_eq!(session.len(), 3);
    }

    #[test]
    fn default_instruction_describes_output_contract() {
        assert!(DEFAULT_INSTRUCTION.contains("\"message\""));
        assert!(DEFAULT_INSTRUCTION.contains("\"function\""));
        assert!(DEFAULT_INSTRUCTION.contains("The code execution returned the following data:"));
    }

    #[test]
    fn error_feedback_wraps_the_error() {
        let text = error_feedback_message("TypeError: node is undefined");
        assert_eq!(
            text,
            "The previous code resulted in this error:\n\nTypeError: node is undefined\n\nPlease fix the code and try again."
        );
    }
}
