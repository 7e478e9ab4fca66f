use serde::{Deserialize, Serialize};

/// 對話中每一個回合的發話者。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 使用者（包含由錯誤回饋合成的訊息）。
    User,
    /// 遠端語言模型。
    Model,
}

impl Role {
    /// 回傳送往遠端 API 時使用的角色字串。
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// 代表對話歷史中的單一回合。建立後即不可變更。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// 管理一個外掛工作階段的完整對話狀態。
///
/// 歷史只會附加、不會截斷；工作階段在外掛啟動時建立，結束時隨之丟棄，
/// 不做任何持久化。
#[derive(Debug, Default)]
pub struct Session {
    /// 依時間順序儲存的所有回合。
    turns: Vec<Turn>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// 回傳對話歷史的不可變切片。
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// 附加一個使用者回合。必須在呼叫遠端 API 之前完成。
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::user(text));
    }

    /// 附加模型回傳的原始文字。僅在收到完整回應後呼叫。
    pub fn push_model(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::model(text));
    }
}
