use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use crate::agent::message::{InboundEvent, OutboundEvent};
use crate::agent::prompt::{build_request, error_feedback_message};
use crate::agent::providers::ModelBackend;
use crate::agent::reply::parse_reply;
use crate::agent::session::Session;
use crate::agent::{AgentError, AssistantReply};
use crate::host::ScriptHost;

/// What the router decided to do with one inbound event.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// Relay this event to the UI.
    Reply(OutboundEvent),
    /// The UI asked to close the plugin.
    Terminate,
}

/// Why [`Router::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A `cancel` event arrived.
    Cancelled,
    /// Every [`RouterHandle`] was dropped, so no more events can arrive.
    Disconnected,
}

/// Returned by [`RouterHandle::submit`] once the router has stopped.
#[derive(Debug, thiserror::Error)]
#[error("the plugin session has ended")]
pub struct RouterClosed;

/// The message router and the owner of the conversation session.
///
/// `Router` is responsible for:
/// - Holding the `Session` for the plugin's lifetime; nothing else can touch it.
/// - Handling inbound events strictly one at a time from a single queue.
/// - Translating every failure into an outbound event so the plugin stays usable.
pub struct Router {
    session: Session,
    instruction: String,
    backend: Box<dyn ModelBackend>,
    host: Box<dyn ScriptHost>,
}

/// Cloneable entry point for feeding events to a running router.
#[derive(Clone)]
pub struct RouterHandle {
    events: UnboundedSender<InboundEvent>,
    cancel: Arc<watch::Sender<bool>>,
}

impl RouterHandle {
    /// Queues an event. A `cancel` is also signalled out-of-band so it ends the
    /// session even while another event is mid-flight.
    pub fn submit(&self, event: InboundEvent) -> Result<(), RouterClosed> {
        if matches!(event, InboundEvent::Cancel) {
            self.cancel.send_replace(true);
        }
        self.events.send(event).map_err(|_| RouterClosed)
    }
}

/// The receiving side handed to [`Router::run`].
pub struct RouterInbox {
    events: UnboundedReceiver<InboundEvent>,
    cancel: watch::Receiver<bool>,
}

impl RouterInbox {
    #[cfg(test)]
    pub(crate) fn into_events(self) -> UnboundedReceiver<InboundEvent> {
        self.events
    }
}

/// Creates the single-consumer event queue used to drive a router.
pub fn channel() -> (RouterHandle, RouterInbox) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = watch::channel(false);
    (
        RouterHandle {
            events: events_tx,
            cancel: Arc::new(cancel_tx),
        },
        RouterInbox {
            events: events_rx,
            cancel: cancel_rx,
        },
    )
}

impl Router {
    /// Starts a fresh session. The session is dropped together with the router.
    pub fn new(
        instruction: impl Into<String>,
        backend: Box<dyn ModelBackend>,
        host: Box<dyn ScriptHost>,
    ) -> Self {
        Self {
            session: Session::new(),
            instruction: instruction.into(),
            backend,
            host,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consumes events until a cancel arrives or every handle is dropped.
    /// Outbound events are pushed to `outbound` in the order they are produced.
    pub async fn run(
        mut self,
        mut inbox: RouterInbox,
        outbound: UnboundedSender<OutboundEvent>,
    ) -> SessionEnd {
        info!(
            "Router started: backend {}, host {}",
            self.backend.name(),
            self.host.name()
        );
        loop {
            let event = tokio::select! {
                biased;
                _ = cancelled(&mut inbox.cancel) => return SessionEnd::Cancelled,
                event = inbox.events.recv() => match event {
                    Some(event) => event,
                    None => return SessionEnd::Disconnected,
                },
            };

            let dispatch = tokio::select! {
                biased;
                _ = cancelled(&mut inbox.cancel) => {
                    info!("Cancel received while an event was in flight");
                    return SessionEnd::Cancelled;
                }
                dispatch = self.handle(event) => dispatch,
            };

            match dispatch {
                Dispatch::Reply(reply) => {
                    if outbound.send(reply).is_err() {
                        warn!("UI channel closed, dropping outbound event");
                    }
                }
                Dispatch::Terminate => return SessionEnd::Cancelled,
            }
        }
    }

    /// Handles a single event to completion.
    pub async fn handle(&mut self, event: InboundEvent) -> Dispatch {
        match event {
            InboundEvent::SendMessage { message } => self.converse(message, false).await,
            InboundEvent::SendErrorFeedback { error } => {
                debug!("Sending execution error back to the model: {}", error);
                self.converse(error_feedback_message(&error), true).await
            }
            InboundEvent::ExecuteCode { code, message_id } => {
                Dispatch::Reply(self.execute(&code, message_id).await)
            }
            InboundEvent::Cancel => {
                info!("Cancel requested, closing the plugin session");
                Dispatch::Terminate
            }
        }
    }

    async fn converse(&mut self, text: String, is_retry: bool) -> Dispatch {
        let reply = match self.exchange(text).await {
            Ok(data) => {
                if !data.has_code() {
                    debug!("Model reply carries no code to run");
                }
                OutboundEvent::AiResponse { data, is_retry }
            }
            Err(err) => {
                if err.is_reply_error() {
                    warn!("Model reply rejected: {err}");
                } else {
                    error!("Model API error: {err}");
                }
                OutboundEvent::ApiError {
                    error: err.to_string(),
                }
            }
        };
        Dispatch::Reply(reply)
    }

    /// One request/response round: the user turn is recorded before the call,
    /// the model's raw text right after it arrives, then the text is validated.
    async fn exchange(&mut self, text: String) -> Result<AssistantReply, AgentError> {
        let raw = {
            let request = build_request(&mut self.session, &self.instruction, text);
            self.backend.generate(request).await?
        };
        self.session.push_model(raw.as_str());
        parse_reply(&raw)
    }

    async fn execute(&self, code: &str, message_id: Value) -> OutboundEvent {
        match self.host.execute(code).await {
            Ok(return_value) => {
                debug!("Execution {} succeeded", message_id);
                OutboundEvent::ExecutionSuccess {
                    message_id,
                    return_value,
                }
            }
            Err(failure) => {
                warn!("Execution {} failed: {}", message_id, failure.message);
                OutboundEvent::ExecutionError {
                    message_id,
                    error: failure.message,
                    stack: failure.stack,
                }
            }
        }
    }
}

/// Resolves once cancel has been signalled. If the signal can no longer be
/// sent, it never resolves and the event queue decides when to stop.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let signalled = cancel.wait_for(|flag| *flag).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}
