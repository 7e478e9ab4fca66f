use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::prompt::DEFAULT_INSTRUCTION;

/// 設定檔相對於工作區根目錄的位置。
pub const CONFIG_FILE: &str = "config/plugin.toml";

/// 外掛設定的頂層結構，從 `config/plugin.toml` 載入。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// 遠端模型的連線與生成參數。
    #[serde(default)]
    pub model: ModelConfig,
    /// 執行程式碼的宿主環境。
    #[serde(default)]
    pub host: HostConfig,
    /// 程式碼執行的權限。
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Settings {
    /// 從指定的工作區目錄讀取設定。
    /// 如果 `config/plugin.toml` 不存在，則使用全部預設值。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_FILE);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("讀取外掛設定失敗: {}", config_path.display()))?;
            let parsed: Settings = toml::from_str(&raw)
                .with_context(|| format!("解析外掛設定失敗: {}", config_path.display()))?;
            Ok(parsed.normalize(workspace_root))
        } else {
            Ok(Self::default())
        }
    }

    /// 啟動函式：載入設定並解析 API 金鑰。
    ///
    /// 找不到金鑰時回傳 `NeedsApiKey`，由呼叫端決定如何提示使用者。
    pub fn bootstrap(workspace_root: &Path) -> Result<SettingsBootstrap> {
        let config_path = workspace_root.join(CONFIG_FILE);
        let from_file = config_path.exists();
        let settings = Self::load(workspace_root)?;

        let Some(api_key) = settings.model.resolved_api_key() else {
            let source = settings
                .model
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
            return Ok(SettingsBootstrap::NeedsApiKey {
                instructions: format!(
                    "No Gemini API key found. Set `api_key` under [model] in {} or export {}.",
                    CONFIG_FILE, source
                ),
            });
        };

        let message = if from_file {
            format!("已載入 {} 設定", CONFIG_FILE)
        } else {
            format!("未找到 {}，使用預設設定", CONFIG_FILE)
        };
        Ok(SettingsBootstrap::Ready {
            settings,
            api_key,
            message: Some(message),
        })
    }

    /// 標準化設定中的所有相對路徑，使其相對於工作區根目錄。
    fn normalize(mut self, workspace_root: &Path) -> Self {
        self.model.normalize(workspace_root);
        self.host.normalize_paths(workspace_root);
        self
    }

    /// 回傳要送給模型的指示區塊。
    /// 若設定了 `system_prompt_file` 則讀取該檔案，否則使用內建指示。
    pub fn instruction(&self) -> Result<String> {
        match &self.model.system_prompt_file {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("讀取系統提示詞失敗: {}", path.display())),
            None => Ok(DEFAULT_INSTRUCTION.to_string()),
        }
    }
}

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// 遠端 Gemini 模型的設定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// 模型名稱，用於組成預設端點。
    #[serde(default = "default_model")]
    pub model: String,
    /// 完整的生成端點 URL；未指定時依模型名稱產生。
    #[serde(default)]
    pub base_url: Option<String>,
    /// 直接在設定中指定的 API 金鑰。
    #[serde(default)]
    pub api_key: Option<String>,
    /// 用於讀取 API 金鑰的環境變數名稱。
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// 取代內建指示區塊的檔案（可選）。
    #[serde(default)]
    pub system_prompt_file: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            system_prompt_file: None,
        }
    }
}

impl ModelConfig {
    fn normalize(&mut self, workspace_root: &Path) {
        if let Some(path) = self.system_prompt_file.as_mut()
            && path.is_relative()
        {
            *path = workspace_root.join(&path);
        }
    }

    /// 解析並回傳最終的 API 金鑰。
    /// 優先順序：`api_key` 欄位 > `api_key_env` 環境變數。空白值視為未設定。
    pub fn resolved_api_key(&self) -> Option<String> {
        let key = if let Some(key) = &self.api_key {
            Some(key.clone())
        } else if let Some(var) = &self.api_key_env {
            env::var(var).ok()
        } else {
            None
        };
        key.filter(|key| !key.trim().is_empty())
    }

    /// 回傳生成端點（不含金鑰）。
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            ),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> Option<String> {
    Some(DEFAULT_API_KEY_ENV.to_string())
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_k() -> u32 {
    40
}

fn default_top_p() -> f32 {
    0.95
}

/// 定義了執行程式碼的宿主環境種類。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HostConfig {
    /// 內嵌的 JavaScript 引擎。
    Embedded(EmbeddedHostConfig),
    /// 透過本地子程序（stdio）與外部宿主執行環境通訊。
    LocalProcess(LocalProcessConfig),
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig::Embedded(EmbeddedHostConfig::default())
    }
}

impl HostConfig {
    fn normalize_paths(&mut self, workspace_root: &Path) {
        match self {
            HostConfig::Embedded(config) => config.normalize(workspace_root),
            HostConfig::LocalProcess(config) => config.normalize(workspace_root),
        }
    }
}

/// 內嵌宿主的設定。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddedHostConfig {
    /// 啟動時依序執行的腳本，用於註冊宿主 API 的綁定。
    #[serde(default)]
    pub prelude: Vec<PathBuf>,
}

impl EmbeddedHostConfig {
    fn normalize(&mut self, workspace_root: &Path) {
        for path in &mut self.prelude {
            if path.is_relative() {
                *path = workspace_root.join(&path);
            }
        }
    }

    /// 讀取所有 prelude 腳本的內容。
    pub fn load_prelude(&self) -> Result<Vec<String>> {
        self.prelude
            .iter()
            .map(|path| {
                fs::read_to_string(path)
                    .with_context(|| format!("讀取 prelude 腳本失敗: {}", path.display()))
            })
            .collect()
    }
}

/// 本地程序宿主的設定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalProcessConfig {
    /// 要執行的程式（例如 `node`）。
    pub program: String,
    /// 傳遞給程式的命令列參數。
    #[serde(default)]
    pub args: Vec<String>,
    /// 程式的工作目錄。如果為相對路徑，會被解析為相對於工作區根目錄。
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// 為子程序設定的額外環境變數。
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl LocalProcessConfig {
    /// 標準化 `working_dir` 和 `args` 中的路徑。
    fn normalize(&mut self, workspace_root: &Path) {
        if let Some(dir) = self.working_dir.as_mut()
            && dir.is_relative()
        {
            *dir = workspace_root.join(&dir);
        }
        // 指向工作區內既有檔案的相對參數轉為絕對路徑。
        self.args = self
            .args
            .iter()
            .map(|arg| {
                let path = Path::new(arg);
                if path.is_relative() {
                    let candidate = workspace_root.join(path);
                    if candidate.exists() {
                        return candidate.to_string_lossy().into();
                    }
                }
                arg.clone()
            })
            .collect();
    }
}

/// 程式碼執行的權限設定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// 是否允許執行模型產生的程式碼。
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_enabled() -> bool {
    true
}

/// 設定啟動時的狀態。
#[derive(Debug)]
pub enum SettingsBootstrap {
    /// 設定與金鑰皆已就緒。
    Ready {
        settings: Settings,
        api_key: String,
        message: Option<String>,
    },
    /// 需要使用者提供 API 金鑰才能繼續。
    NeedsApiKey { instructions: String },
}
