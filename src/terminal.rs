//! Drives the active session: operator input in, channel events in,
//! transcript updates out.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::channel::{ChannelHandle, Connector};
use crate::credentials::Credential;
use crate::error::ShellError;
use crate::history::Recall;
use crate::protocol::{ChannelEvent, ClientMessage, Target};
use crate::quick_actions::{QuickAction, QuickActionCatalog};
use crate::session::{Connectivity, Effect, Session};
use crate::transcript::TerminalLine;

/// What the operator can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorInput {
    Submit(String),
    QuickAction(String),
    HistoryPrevious,
    HistoryNext,
    SwitchTarget(Target),
    Quit,
}

/// What the display should render, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalUpdate {
    /// A new target is active; drop everything shown so far.
    Reset {
        target: Target,
        quick_actions: Vec<QuickAction>,
    },
    Line(TerminalLine),
    /// Replace the input with a history entry (`None` clears it).
    Recall(Option<String>),
    Focus,
    Status {
        connectivity: Connectivity,
        executing: bool,
    },
}

pub type UpdateSender = mpsc::UnboundedSender<TerminalUpdate>;

pub struct Terminal<C> {
    connector: C,
    credential: Option<Credential>,
    catalog: QuickActionCatalog,
    session: Option<Session>,
    channel: Option<ChannelHandle>,
    updates: UpdateSender,
    published: usize,
    last_status: Option<(Connectivity, bool)>,
}

impl<C: Connector> Terminal<C> {
    pub fn new(
        connector: C,
        credential: Option<Credential>,
        catalog: QuickActionCatalog,
        updates: UpdateSender,
    ) -> Self {
        Self {
            connector,
            credential,
            catalog,
            session: None,
            channel: None,
            updates,
            published: 0,
            last_status: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    pub fn set_credential(&mut self, credential: Option<Credential>) {
        self.credential = credential;
    }

    /// Quick actions offered for the active target.
    pub fn quick_actions(&self) -> &[QuickAction] {
        let kind = self
            .session
            .as_ref()
            .and_then(|s| s.target().environment.as_deref());
        self.catalog.for_environment(kind)
    }

    /// Tear down the current session and channel, then connect to `target`.
    pub async fn switch_target(&mut self, target: Target) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        self.session = None;
        self.published = 0;
        self.last_status = None;

        info!(
            target = "tenant_shell::terminal",
            target_id = %target.id,
            environment = %target.environment_label(),
            "switching target"
        );
        let quick_actions = self
            .catalog
            .for_environment(target.environment.as_deref())
            .to_vec();
        self.emit(TerminalUpdate::Reset {
            target: target.clone(),
            quick_actions,
        });

        let mut session = Session::new(target);
        match session.connect(self.credential.as_ref()) {
            Ok(request) => self.channel = Some(self.connector.open(request)),
            Err(error) => {
                warn!(
                    target = "tenant_shell::terminal",
                    error = %error,
                    "not connecting"
                );
            }
        }
        self.session = Some(session);
        self.publish(Effect::None);
    }

    /// Submit a command. Returns `true` when it was transmitted.
    pub async fn submit(&mut self, input: &str) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(frame) = session.submit(input) else {
            return false;
        };
        self.transmit(frame).await
    }

    /// Run a quick action for the active target by id.
    pub async fn run_quick_action(&mut self, id: &str) -> bool {
        let kind = self
            .session
            .as_ref()
            .and_then(|s| s.target().environment.as_deref());
        let Some(action) = self.catalog.find(kind, id).cloned() else {
            warn!(
                target = "tenant_shell::terminal",
                action = %id,
                "unknown quick action"
            );
            return false;
        };
        let Some(frame) = self
            .session
            .as_mut()
            .and_then(|s| s.run_quick_action(&action))
        else {
            return false;
        };
        self.transmit(frame).await
    }

    pub fn recall_previous(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if let Some(entry) = session.recall_previous() {
                self.emit(TerminalUpdate::Recall(Some(entry)));
            }
        }
    }

    pub fn recall_next(&mut self) {
        if let Some(session) = self.session.as_mut() {
            match session.recall_next() {
                Recall::Entry(entry) => self.emit(TerminalUpdate::Recall(Some(entry))),
                Recall::Cleared => self.emit(TerminalUpdate::Recall(None)),
                Recall::Unchanged => {}
            }
        }
    }

    /// Apply one operator input. Returns `false` on quit.
    pub async fn handle_input(&mut self, input: OperatorInput) -> bool {
        match input {
            OperatorInput::Submit(command) => {
                self.submit(&command).await;
            }
            OperatorInput::QuickAction(id) => {
                self.run_quick_action(&id).await;
            }
            OperatorInput::HistoryPrevious => self.recall_previous(),
            OperatorInput::HistoryNext => self.recall_next(),
            OperatorInput::SwitchTarget(target) => self.switch_target(target).await,
            OperatorInput::Quit => return false,
        }
        true
    }

    /// Wait for and apply the next channel event.
    /// Returns `false` when there is no channel to wait on.
    pub async fn pump(&mut self) -> bool {
        if self.channel.is_none() {
            return false;
        }
        let event = next_channel_event(&mut self.channel).await;
        self.apply_channel_event(event);
        true
    }

    /// Process operator inputs and channel events until quit.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<OperatorInput>) {
        loop {
            tokio::select! {
                input = inputs.recv() => {
                    match input {
                        Some(input) => {
                            if !self.handle_input(input).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                event = next_channel_event(&mut self.channel) => {
                    self.apply_channel_event(event);
                }
            }
        }
        self.shutdown().await;
    }

    pub async fn shutdown(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        debug!(target = "tenant_shell::terminal", "terminal shut down");
    }

    async fn transmit(&mut self, frame: ClientMessage) -> bool {
        self.publish(Effect::None);
        let sent = match &self.channel {
            Some(channel) => channel.send(frame).await,
            None => Err(ShellError::NotConnected),
        };
        match sent {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    target = "tenant_shell::terminal",
                    error = %error,
                    "failed to transmit command"
                );
                self.channel = None;
                self.apply_session_event(ChannelEvent::Closed {
                    reason: Some("channel closed".into()),
                });
                false
            }
        }
    }

    fn apply_channel_event(&mut self, event: Option<ChannelEvent>) {
        match event {
            Some(event) => self.apply_session_event(event),
            None => {
                debug!(target = "tenant_shell::terminal", "channel task ended");
                self.channel = None;
                self.apply_session_event(ChannelEvent::Closed {
                    reason: Some("channel closed".into()),
                });
            }
        }
    }

    fn apply_session_event(&mut self, event: ChannelEvent) {
        let effect = match self.session.as_mut() {
            Some(session) => session.handle(event),
            None => Effect::None,
        };
        self.publish(effect);
    }

    /// Push transcript lines appended since the last publish, then status and focus.
    fn publish(&mut self, effect: Effect) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let fresh: Vec<TerminalLine> = session.transcript().since(self.published).to_vec();
        self.published = session.transcript().len();
        let status = (session.connectivity(), session.is_executing());

        for line in fresh {
            self.emit(TerminalUpdate::Line(line));
        }
        if self.last_status != Some(status) {
            self.last_status = Some(status);
            self.emit(TerminalUpdate::Status {
                connectivity: status.0,
                executing: status.1,
            });
        }
        if effect == Effect::FocusInput {
            self.emit(TerminalUpdate::Focus);
        }
    }

    fn emit(&self, update: TerminalUpdate) {
        if self.updates.send(update).is_err() {
            debug!(target = "tenant_shell::terminal", "update receiver dropped");
        }
    }
}

async fn next_channel_event(channel: &mut Option<ChannelHandle>) -> Option<ChannelEvent> {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}
