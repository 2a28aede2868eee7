//! Session state machine for one terminal attached to one target.
//!
//! A `Session` owns its transcript and history. It never touches the
//! transport: outbound frames are returned to the caller, and inbound
//! traffic arrives as [`ChannelEvent`]s through [`Session::handle`].
//! Switching targets means dropping the session and building a new one.

use serde::Serialize;

use crate::credentials::Credential;
use crate::display::format_command;
use crate::error::{Result, ShellError};
use crate::history::{History, Recall};
use crate::normalize::normalize;
use crate::protocol::{ChannelEvent, ClientMessage, ServerEvent, Target};
use crate::quick_actions::QuickAction;
use crate::transcript::{LineKind, Transcript};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Disconnected,
    Connecting,
    Connected,
}

impl Connectivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Connectivity::Disconnected => "disconnected",
            Connectivity::Connecting => "connecting",
            Connectivity::Connected => "connected",
        }
    }
}

/// Side effects the host should apply after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Hand input focus back to the operator.
    FocusInput,
}

/// What the host needs to open a channel for this session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub target: Target,
    pub credential: Credential,
}

#[derive(Debug)]
pub struct Session {
    target: Target,
    connectivity: Connectivity,
    executing: bool,
    transcript: Transcript,
    history: History,
}

impl Session {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            connectivity: Connectivity::Disconnected,
            executing: false,
            transcript: Transcript::new(),
            history: History::new(),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity == Connectivity::Connected
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// `DISCONNECTED -> CONNECTING`.
    ///
    /// Without a credential the session stays disconnected, an error line is
    /// appended and nothing should be sent to the backend.
    pub fn connect(&mut self, credential: Option<&Credential>) -> Result<ConnectRequest> {
        if self.connectivity != Connectivity::Disconnected {
            return Err(ShellError::AlreadyConnecting);
        }
        let Some(credential) = credential else {
            self.transcript
                .append(ShellError::MissingCredential.to_string(), LineKind::Error);
            return Err(ShellError::MissingCredential);
        };
        self.connectivity = Connectivity::Connecting;
        tracing::debug!(
            target = "tenant_shell::session",
            target_id = %self.target.id,
            "connecting"
        );
        Ok(ConnectRequest {
            target: self.target.clone(),
            credential: credential.clone(),
        })
    }

    /// Accept a command for execution.
    ///
    /// Returns the frame to transmit, or `None` when the submission is
    /// silently dropped (not connected, already executing, or blank input).
    pub fn submit(&mut self, input: &str) -> Option<ClientMessage> {
        if !self.is_connected() || self.executing {
            tracing::debug!(
                target = "tenant_shell::session",
                connectivity = ?self.connectivity,
                executing = self.executing,
                "submission ignored"
            );
            return None;
        }
        if input.trim().is_empty() {
            return None;
        }

        self.history.record(input);
        self.transcript
            .append(format_command(input.trim()), LineKind::Command);
        self.executing = true;
        Some(ClientMessage::execute(input, self.target.id.clone()))
    }

    pub fn run_quick_action(&mut self, action: &QuickAction) -> Option<ClientMessage> {
        self.submit(&action.command)
    }

    pub fn recall_previous(&mut self) -> Option<String> {
        self.history.previous().map(str::to_string)
    }

    pub fn recall_next(&mut self) -> Recall {
        self.history.next()
    }

    /// Apply one inbound event. Events must be fed in arrival order.
    pub fn handle(&mut self, event: ChannelEvent) -> Effect {
        match event {
            ChannelEvent::Open => self.on_open(),
            ChannelEvent::Closed { reason } => self.on_lost(reason),
            ChannelEvent::Failed { reason } => self.on_handshake_failed(reason),
            ChannelEvent::Reconnecting { attempt } => self.on_reconnecting(attempt),
            ChannelEvent::Server(event) => self.on_server_event(event),
        }
    }

    fn on_open(&mut self) -> Effect {
        if self.connectivity != Connectivity::Connecting {
            tracing::debug!(
                target = "tenant_shell::session",
                connectivity = ?self.connectivity,
                "unexpected open ignored"
            );
            return Effect::None;
        }
        self.connectivity = Connectivity::Connected;
        self.executing = false;
        self.transcript
            .append(format!("Connected to {}", self.target.id), LineKind::Success);
        self.transcript.append(
            format!("Environment: {}", self.target.environment_label()),
            LineKind::Success,
        );
        Effect::FocusInput
    }

    fn on_lost(&mut self, reason: Option<String>) -> Effect {
        match self.connectivity {
            Connectivity::Disconnected => Effect::None,
            Connectivity::Connecting => {
                self.on_handshake_failed(reason.unwrap_or_else(|| "connection closed".into()))
            }
            Connectivity::Connected => {
                let abandoned = self.executing;
                self.connectivity = Connectivity::Disconnected;
                self.executing = false;
                let line = match reason {
                    Some(reason) => format!("Disconnected from terminal server: {reason}"),
                    None => "Disconnected from terminal server".to_string(),
                };
                self.transcript.append(line, LineKind::Error);
                if abandoned {
                    tracing::warn!(
                        target = "tenant_shell::session",
                        target_id = %self.target.id,
                        "connection lost while a command was executing"
                    );
                    Effect::FocusInput
                } else {
                    Effect::None
                }
            }
        }
    }

    fn on_handshake_failed(&mut self, reason: String) -> Effect {
        if self.connectivity != Connectivity::Connecting {
            return Effect::None;
        }
        self.connectivity = Connectivity::Disconnected;
        self.executing = false;
        self.transcript
            .append(format!("Connection failed: {reason}"), LineKind::Error);
        Effect::None
    }

    fn on_reconnecting(&mut self, attempt: u32) -> Effect {
        if self.connectivity != Connectivity::Disconnected {
            return Effect::None;
        }
        self.connectivity = Connectivity::Connecting;
        self.transcript.append(
            format!("Reconnecting (attempt {attempt})..."),
            LineKind::Info,
        );
        Effect::None
    }

    fn on_server_event(&mut self, event: ServerEvent) -> Effect {
        if !self.is_connected() {
            tracing::debug!(
                target = "tenant_shell::session",
                event = ?event,
                "server event outside a connection ignored"
            );
            return Effect::None;
        }
        match event {
            ServerEvent::CommandStarted { command } => {
                self.transcript.append(
                    format!("Executing: {}", format_command(&command)),
                    LineKind::Info,
                );
                Effect::None
            }
            ServerEvent::CommandOutput { data, stream } => {
                for line in normalize(&data, stream) {
                    self.transcript.append(line.text, line.stream.into());
                }
                Effect::None
            }
            ServerEvent::CommandCompleted => {
                self.executing = false;
                self.transcript.append("Command completed", LineKind::Success);
                Effect::FocusInput
            }
            ServerEvent::CommandError { error } => {
                self.executing = false;
                let detail = match error.trim() {
                    "" => "command failed",
                    detail => detail,
                };
                self.transcript
                    .append(format!("Error: {detail}"), LineKind::Error);
                Effect::FocusInput
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OutputStream;

    fn credential() -> Credential {
        Credential::new("tok").unwrap()
    }

    fn connected(target: Target) -> Session {
        let mut session = Session::new(target);
        session.connect(Some(&credential())).unwrap();
        session.handle(ChannelEvent::Open);
        session
    }

    fn contents(session: &Session) -> Vec<(LineKind, String)> {
        session
            .transcript()
            .lines()
            .iter()
            .map(|l| (l.kind, l.content.clone()))
            .collect()
    }

    #[test]
    fn connect_without_credential_stays_disconnected() {
        let mut session = Session::new(Target::new("site-1"));
        let result = session.connect(None);
        assert!(matches!(result, Err(ShellError::MissingCredential)));
        assert_eq!(session.connectivity(), Connectivity::Disconnected);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript().lines()[0].kind, LineKind::Error);
    }

    #[test]
    fn connect_twice_is_rejected_without_a_line() {
        let mut session = Session::new(Target::new("site-1"));
        session.connect(Some(&credential())).unwrap();
        assert!(matches!(
            session.connect(Some(&credential())),
            Err(ShellError::AlreadyConnecting)
        ));
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn open_announces_target_and_environment() {
        let session = connected(Target::new("site-1").with_environment("laravel"));
        assert_eq!(session.connectivity(), Connectivity::Connected);
        assert!(!session.is_executing());
        assert_eq!(
            contents(&session),
            vec![
                (LineKind::Success, "Connected to site-1".to_string()),
                (LineKind::Success, "Environment: laravel".to_string()),
            ]
        );
    }

    #[test]
    fn submit_requires_connection() {
        let mut session = Session::new(Target::new("site-1"));
        assert_eq!(session.submit("ls"), None);
        session.connect(Some(&credential())).unwrap();
        assert_eq!(session.submit("ls"), None);
        assert!(session.transcript().is_empty());
        assert!(session.history().is_empty());
    }

    #[test]
    fn blank_submission_is_ignored() {
        let mut session = connected(Target::new("site-1"));
        let before = session.transcript().len();
        assert_eq!(session.submit("   \t"), None);
        assert_eq!(session.transcript().len(), before);
        assert!(!session.is_executing());
        assert!(session.history().is_empty());
    }

    #[test]
    fn submit_echoes_formatted_and_sends_raw() {
        let mut session = connected(Target::new("site-1"));
        let raw = "export PATH=/x && /usr/local/bin/php8.2 artisan migrate";
        let frame = session.submit(raw).unwrap();
        assert_eq!(frame, ClientMessage::execute(raw, "site-1"));
        assert!(session.is_executing());
        let echo = session.transcript().last().unwrap();
        assert_eq!(echo.kind, LineKind::Command);
        assert_eq!(echo.content, "php artisan migrate");
        assert_eq!(session.history().entries(), [raw]);
    }

    #[test]
    fn second_submission_while_executing_is_dropped() {
        let mut session = connected(Target::new("site-1"));
        session.submit("sleep 10").unwrap();
        let lines = session.transcript().len();
        assert_eq!(session.submit("ls"), None);
        assert_eq!(session.transcript().len(), lines);
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.transcript().count(LineKind::Command), 1);
    }

    #[test]
    fn output_and_completion_flow() {
        let mut session = connected(Target::new("site-1"));
        session.submit("make").unwrap();
        let start = session.transcript().len();

        assert_eq!(
            session.handle(
                ServerEvent::CommandStarted {
                    command: "/usr/local/bin/composer install".into()
                }
                .into()
            ),
            Effect::None
        );
        session.handle(
            ServerEvent::CommandOutput {
                data: "\x1b[32mCompiling...\x1b[0m\nDone.\n".into(),
                stream: OutputStream::Stdout,
            }
            .into(),
        );
        session.handle(
            ServerEvent::CommandOutput {
                data: "warning: unused\n".into(),
                stream: OutputStream::Stderr,
            }
            .into(),
        );
        assert!(session.is_executing());
        assert_eq!(
            session.handle(ServerEvent::CommandCompleted.into()),
            Effect::FocusInput
        );
        assert!(!session.is_executing());

        let tail: Vec<_> = contents(&session).split_off(start);
        assert_eq!(
            tail,
            vec![
                (LineKind::Info, "Executing: composer install".to_string()),
                (LineKind::Stdout, "Compiling...".to_string()),
                (LineKind::Stdout, "Done.".to_string()),
                (LineKind::Stderr, "warning: unused".to_string()),
                (LineKind::Success, "Command completed".to_string()),
            ]
        );
    }

    #[test]
    fn command_error_returns_to_idle() {
        let mut session = connected(Target::new("site-1"));
        session.submit("rm -rf /").unwrap();
        let effect = session.handle(
            ServerEvent::CommandError {
                error: "command not allowed".into(),
            }
            .into(),
        );
        assert_eq!(effect, Effect::FocusInput);
        assert!(!session.is_executing());
        let last = session.transcript().last().unwrap();
        assert_eq!(last.kind, LineKind::Error);
        assert_eq!(last.content, "Error: command not allowed");
        assert!(session.submit("ls").is_some());
    }

    #[test]
    fn bare_error_frame_still_ends_the_command() {
        let mut session = connected(Target::new("site-1"));
        session.submit("php artisan migrate").unwrap();
        let event = ServerEvent::decode(r#"{"event":"command_error"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(session.handle(event.into()), Effect::FocusInput);
        assert!(!session.is_executing());
        assert_eq!(
            session.transcript().last().unwrap().content,
            "Error: command failed"
        );
    }

    #[test]
    fn disconnect_abandons_execution() {
        let mut session = connected(Target::new("site-1"));
        session.submit("sleep 100").unwrap();
        let effect = session.handle(ChannelEvent::Closed { reason: None });
        assert_eq!(effect, Effect::FocusInput);
        assert_eq!(session.connectivity(), Connectivity::Disconnected);
        assert!(!session.is_executing());
        assert_eq!(
            session.transcript().last().unwrap().content,
            "Disconnected from terminal server"
        );
        assert_eq!(session.submit("ls"), None);
    }

    #[test]
    fn reconnect_cycle() {
        let mut session = connected(Target::new("site-1"));
        session.handle(ChannelEvent::Closed {
            reason: Some("reset by peer".into()),
        });
        session.handle(ChannelEvent::Reconnecting { attempt: 1 });
        assert_eq!(session.connectivity(), Connectivity::Connecting);
        session.handle(ChannelEvent::Failed {
            reason: "refused".into(),
        });
        assert_eq!(session.connectivity(), Connectivity::Disconnected);
        session.handle(ChannelEvent::Reconnecting { attempt: 2 });
        session.handle(ChannelEvent::Open);
        assert!(session.is_connected());

        let kinds: Vec<_> = contents(&session).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                LineKind::Success,
                LineKind::Success,
                LineKind::Error,
                LineKind::Info,
                LineKind::Error,
                LineKind::Info,
                LineKind::Success,
                LineKind::Success,
            ]
        );
    }

    #[test]
    fn server_events_while_disconnected_are_ignored() {
        let mut session = Session::new(Target::new("site-1"));
        session.handle(
            ServerEvent::CommandOutput {
                data: "late".into(),
                stream: OutputStream::Stdout,
            }
            .into(),
        );
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn output_while_idle_is_still_recorded() {
        let mut session = connected(Target::new("site-1"));
        let before = session.transcript().len();
        session.handle(
            ServerEvent::CommandOutput {
                data: "trailing\n".into(),
                stream: OutputStream::Stdout,
            }
            .into(),
        );
        assert_eq!(session.transcript().len(), before + 1);
        assert!(!session.is_executing());
    }

    #[test]
    fn quick_action_goes_through_the_same_gate() {
        let mut session = connected(Target::new("site-1").with_environment("node"));
        let action = QuickAction {
            id: "npm-build".into(),
            label: "Build".into(),
            command: "/usr/local/bin/npm run build".into(),
            description: String::new(),
        };
        let frame = session.run_quick_action(&action).unwrap();
        assert_eq!(
            frame,
            ClientMessage::execute("/usr/local/bin/npm run build", "site-1")
        );
        assert_eq!(session.transcript().last().unwrap().content, "npm run build");
        assert_eq!(session.run_quick_action(&action), None);
    }
}
