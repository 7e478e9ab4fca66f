//! Chat-to-design-automation bridge.
//!
//! Chat messages go to a remote language model, the model answers with an
//! explanation and a JavaScript snippet, and the snippet runs against a host
//! scripting surface whose outcome is relayed back to the chat UI.

pub mod agent;
pub mod host;
pub mod ipc;
pub mod logging;
