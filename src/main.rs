use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use log::{error, info};
use tokio::io::{self, BufReader};
use tokio::sync::mpsc;

use promptcanvas::agent::config::{Settings, SettingsBootstrap};
use promptcanvas::agent::providers::gemini::GeminiBackend;
use promptcanvas::agent::{Router, router};
use promptcanvas::{host, ipc, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // The workspace root holds `config/`; defaults to the current directory.
    let workspace_root = match env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => env::current_dir().context("無法取得目前目錄")?,
    };
    let workspace_root = workspace_root.canonicalize().unwrap_or(workspace_root);
    logging::init(&workspace_root)?;

    let (settings, api_key) = match Settings::bootstrap(&workspace_root)? {
        SettingsBootstrap::Ready {
            settings,
            api_key,
            message,
        } => {
            if let Some(message) = message {
                info!("{}", message);
            }
            (settings, api_key)
        }
        SettingsBootstrap::NeedsApiKey { instructions } => {
            error!("{}", instructions);
            bail!(instructions);
        }
    };

    let instruction = settings.instruction()?;
    let backend = GeminiBackend::new(&settings.model, api_key)?;
    let host = host::from_settings(&settings.host, &settings.execution, &workspace_root)?;
    let router = Router::new(instruction, Box::new(backend), host);

    let (handle, inbox) = router::channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(ipc::pump_outbound(io::stdout(), outbound_rx));
    let reader = tokio::spawn(ipc::pump_inbound(BufReader::new(io::stdin()), handle));

    let end = router.run(inbox, outbound_tx).await;
    info!("Plugin session ended: {:?}", end);

    writer.await.context("UI 輸出任務異常結束")??;
    if reader.is_finished() {
        reader.await.context("UI 輸入任務異常結束")??;
    } else {
        reader.abort();
    }
    Ok(())
}
