use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use crate::agent::config::LocalProcessConfig;

use super::{ExecutionOutcome, ScriptFailure, ScriptHost};

/// `ScriptHost` 的本地程序實作：把程式碼交給外部的宿主執行環境。
///
/// 每次執行寫入一行 `{"id", "code"}`，並讀回一行
/// `{"id", "ok", "value" | "error", "stack"}`。
pub struct LocalProcessHost {
    /// 持有子程序的控制代碼；`kill_on_drop` 確保外掛結束時子程序一併終止。
    _child: Child,
    /// stdin 與 stdout 一起鎖住，確保一次只有一個執行在進行中。
    io: Mutex<ProcessIo>,
    /// 遞增的請求編號，用於核對回應。
    next_id: AtomicU64,
    /// 用於日誌的標籤。
    label: String,
}

struct ProcessIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

#[derive(Serialize)]
struct HostRequest<'a> {
    id: u64,
    code: &'a str,
}

#[derive(Deserialize)]
struct HostReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: String,
    #[serde(default)]
    stack: String,
}

impl LocalProcessHost {
    /// 根據提供的設定，啟動宿主程序並建立 stderr 監聽任務。
    pub fn start(config: &LocalProcessConfig, workspace_root: &Path) -> Result<Self> {
        let label = Path::new(&config.program)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&config.program)
            .to_string();

        let mut command = Command::new(&config.program);
        command.args(&config.args);
        if let Some(dir) = config.working_dir.as_ref() {
            command.current_dir(dir);
        } else {
            command.current_dir(workspace_root);
        }
        command
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(anyhow!("找不到宿主執行檔：{}", config.program));
            }
            Err(err) => return Err(anyhow!("無法啟動宿主程序 {}: {}", label, err)),
        };

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("宿主 stdin 管道不存在"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("宿主 stdout 管道不存在"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("宿主 stderr 管道不存在"))?;

        // stderr 的每一行都記錄為警告。
        let stderr_label = label.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("[{}] {}", stderr_label, line);
            }
        });

        Ok(Self {
            _child: child,
            io: Mutex::new(ProcessIo {
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            next_id: AtomicU64::new(1),
            label,
        })
    }

    async fn round_trip(&self, code: &str) -> Result<HostReply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&HostRequest { id, code }).context("序列化執行請求失敗")?;
        line.push('\n');

        let mut io = self.io.lock().await;
        io.stdin
            .write_all(line.as_bytes())
            .await
            .context("寫入宿主請求失敗")?;
        io.stdin.flush().await.context("刷新宿主 stdin 失敗")?;

        loop {
            let raw = io
                .stdout
                .next_line()
                .await
                .context("讀取宿主標準輸出失敗")?
                .ok_or_else(|| anyhow!("宿主程序 {} 已結束", self.label))?;
            if raw.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HostReply>(&raw) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => debug!("略過過期的宿主回應 #{}", reply.id),
                Err(_) => warn!("宿主回應解析失敗: {}", raw),
            }
        }
    }
}

#[async_trait]
impl ScriptHost for LocalProcessHost {
    fn name(&self) -> &str {
        &self.label
    }

    async fn execute(&self, code: &str) -> ExecutionOutcome {
        match self.round_trip(code).await {
            Ok(reply) if reply.ok => Ok(reply.value),
            Ok(reply) => Err(ScriptFailure::new(reply.error, reply.stack)),
            Err(err) => Err(ScriptFailure::new(format!("{err:#}"), "")),
        }
    }
}
