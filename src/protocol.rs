//! Wire contract between the terminal session and the execution backend.
//!
//! Every frame is a JSON text message shaped `{"event": <name>, "data": <payload>}`.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, ShellError};

/// A tenant environment a terminal session can attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    /// Declared environment kind (e.g. `laravel`), used to pick quick actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl Target {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            environment: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn environment_label(&self) -> &str {
        self.environment.as_deref().unwrap_or("unknown")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Parses `ID` or `ID:KIND`.
impl FromStr for Target {
    type Err = ShellError;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (id, kind) = match raw.split_once(':') {
            Some((id, kind)) => (id.trim(), Some(kind.trim())),
            None => (raw, None),
        };
        if id.is_empty() {
            return Err(ShellError::InvalidTarget(raw.to_string()));
        }
        let target = Target::new(id);
        Ok(match kind.filter(|k| !k.is_empty()) {
            Some(kind) => target.with_environment(kind),
            None => target,
        })
    }
}

/// Frames sent from the session to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    ExecuteCommand {
        command: String,
        #[serde(rename = "targetId")]
        target_id: String,
    },
    Ping,
}

impl ClientMessage {
    pub fn execute(command: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self::ExecuteCommand {
            command: command.into(),
            target_id: target_id.into(),
        }
    }

    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    #[default]
    Stdout,
    Stderr,
}

/// Events streamed by the backend for the command in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    CommandStarted { command: String },
    CommandOutput { data: String, stream: OutputStream },
    CommandCompleted,
    CommandError { error: String },
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct StartedPayload {
    command: String,
}

#[derive(Debug, Default, Deserialize)]
struct OutputPayload {
    #[serde(default)]
    data: String,
    #[serde(rename = "type", default)]
    stream: OutputStream,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: String,
}

/// A missing or `null` payload decodes as the empty payload.
fn payload_or_default<T: DeserializeOwned + Default>(data: Value) -> Result<T> {
    if data.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(data)?)
}

impl ServerEvent {
    /// Decode one inbound text frame.
    ///
    /// Returns `Ok(None)` for well-formed frames this session does not act on
    /// (heartbeats, unknown event names).
    pub fn decode(text: &str) -> Result<Option<Self>> {
        let frame: RawFrame = serde_json::from_str(text)?;
        let event = match frame.event.as_str() {
            "command_started" => {
                let payload: StartedPayload = serde_json::from_value(frame.data)?;
                ServerEvent::CommandStarted {
                    command: payload.command,
                }
            }
            "command_output" => {
                let payload: OutputPayload = payload_or_default(frame.data)?;
                ServerEvent::CommandOutput {
                    data: payload.data,
                    stream: payload.stream,
                }
            }
            "command_completed" => ServerEvent::CommandCompleted,
            "command_error" => {
                let payload: ErrorPayload = payload_or_default(frame.data)?;
                ServerEvent::CommandError {
                    error: payload.error,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Encode as the backend would put it on the wire.
    pub fn to_frame(&self) -> String {
        let value = match self {
            ServerEvent::CommandStarted { command } => json!({
                "event": "command_started",
                "data": { "command": command, "type": "command" },
            }),
            ServerEvent::CommandOutput { data, stream } => json!({
                "event": "command_output",
                "data": { "data": data, "type": stream },
            }),
            ServerEvent::CommandCompleted => json!({
                "event": "command_completed",
                "data": {},
            }),
            ServerEvent::CommandError { error } => json!({
                "event": "command_error",
                "data": { "error": error },
            }),
        };
        value.to_string()
    }

    /// Whether this event ends the command in flight.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerEvent::CommandCompleted | ServerEvent::CommandError { .. }
        )
    }
}

/// Everything a channel can deliver to its session, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Handshake completed.
    Open,
    /// An established connection was lost.
    Closed { reason: Option<String> },
    /// A handshake attempt failed.
    Failed { reason: String },
    /// The transport is about to retry.
    Reconnecting { attempt: u32 },
    Server(ServerEvent),
}

impl From<ServerEvent> for ChannelEvent {
    fn from(event: ServerEvent) -> Self {
        ChannelEvent::Server(event)
    }
}
