use std::path::Path;

use anyhow::{Context, Result};
use log::info;

/// log4rs 設定檔相對於工作區根目錄的位置。
pub const LOG_CONFIG_FILE: &str = "config/log4rs.yaml";

/// 初始化日誌系統。
///
/// 工作區中有 `config/log4rs.yaml` 時交由 log4rs 處理；否則使用 env_logger，
/// 預設層級為 `info`，可由 `RUST_LOG` 覆寫。兩者都不會寫入 stdout，
/// stdout 保留給 UI 事件。
pub fn init(workspace_root: &Path) -> Result<()> {
    let config_path = workspace_root.join(LOG_CONFIG_FILE);
    if config_path.is_file() {
        log4rs::init_file(&config_path, Default::default())
            .with_context(|| format!("載入日誌設定失敗: {}", config_path.display()))?;
        info!("已載入日誌設定 {}", config_path.display());
        return Ok(());
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .try_init()
        .context("初始化 env_logger 失敗")?;
    Ok(())
}
