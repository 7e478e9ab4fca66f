//! Newline-delimited JSON transport between the chat UI and the router.
//!
//! Each inbound line is one [`InboundEvent`]; each outbound event is written
//! as one line and flushed immediately so the UI sees it without buffering.

use anyhow::{Context, Result};
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::agent::router::RouterHandle;
use crate::agent::{InboundEvent, OutboundEvent};

/// Reads events until end of input or until the router stops accepting them.
///
/// Lines that do not parse are logged and skipped; a bad line never ends the
/// session.
pub async fn pump_inbound<R>(reader: R, router: RouterHandle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("讀取 UI 事件失敗")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match serde_json::from_str::<InboundEvent>(line) {
            Ok(event) => event,
            Err(err) => {
                warn!("無法解析 UI 事件 ({err}): {line}");
                continue;
            }
        };
        let is_cancel = matches!(event, InboundEvent::Cancel);
        if router.submit(event).is_err() || is_cancel {
            break;
        }
    }
    debug!("UI 輸入結束");
    Ok(())
}

/// Writes outbound events until the router drops its sender.
pub async fn pump_outbound<W>(mut writer: W, mut events: UnboundedReceiver<OutboundEvent>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.recv().await {
        let mut line = serde_json::to_string(&event).context("序列化 UI 事件失敗")?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .context("寫入 UI 事件失敗")?;
        writer.flush().await.context("刷新 UI 輸出失敗")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AssistantReply;
    use crate::agent::router;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn inbound_lines_become_events_and_bad_lines_are_skipped() {
        let input = concat!(
            "{\"type\":\"send-message\",\"message\":\"hi\"}\n",
            "not json\n",
            "\n",
            "{\"type\":\"execute-code\",\"code\":\"1\",\"messageId\":4}\n",
            "{\"type\":\"cancel\"}\n",
            "{\"type\":\"send-message\",\"message\":\"after cancel\"}\n",
        );
        let (handle, inbox) = router::channel();
        pump_inbound(input.as_bytes(), handle).await.unwrap();

        let mut events = inbox_events(inbox);
        assert_eq!(
            events.remove(0),
            InboundEvent::SendMessage {
                message: "hi".into()
            }
        );
        assert_eq!(
            events.remove(0),
            InboundEvent::ExecuteCode {
                code: "1".into(),
                message_id: json!(4)
            }
        );
        assert_eq!(events.remove(0), InboundEvent::Cancel);
        assert!(events.is_empty());
    }

    fn inbox_events(inbox: router::RouterInbox) -> Vec<InboundEvent> {
        let mut rx = inbox.into_events();
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn outbound_events_are_written_one_per_line() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(OutboundEvent::AiResponse {
            data: AssistantReply::new("hi", ""),
            is_retry: false,
        })
        .unwrap();
        tx.send(OutboundEvent::ApiError {
            error: "Rate limit exceeded.".into(),
        })
        .unwrap();
        drop(tx);

        let mut buffer = Vec::new();
        pump_outbound(&mut buffer, rx).await.unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![
                json!({"type": "ai-response", "data": {"message": "hi", "function": ""}}),
                json!({"type": "api-error", "error": "Rate limit exceeded."}),
            ]
        );
    }
}
