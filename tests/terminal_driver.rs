//! Terminal driver tests against in-memory channels.

use std::sync::{Arc, Mutex};

use tenant_shell::{
    ChannelEndpoint, ChannelEvent, ChannelHandle, ClientMessage, ConnectRequest, Connectivity,
    Connector, Credential, LineKind, OperatorInput, OutputStream, QuickActionCatalog,
    ServerEvent, Target, Terminal, TerminalUpdate,
};
use tokio::sync::mpsc;

#[derive(Clone, Default)]
struct FakeConnector {
    endpoints: Arc<Mutex<Vec<ChannelEndpoint>>>,
    requests: Arc<Mutex<Vec<ConnectRequest>>>,
}

impl FakeConnector {
    fn take_endpoint(&self) -> ChannelEndpoint {
        self.endpoints.lock().unwrap().remove(0)
    }

    fn opened(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Connector for FakeConnector {
    fn open(&self, request: ConnectRequest) -> ChannelHandle {
        let (handle, endpoint) = ChannelHandle::pair();
        self.requests.lock().unwrap().push(request);
        self.endpoints.lock().unwrap().push(endpoint);
        handle
    }
}

fn terminal_with(
    credential: Option<Credential>,
) -> (
    Terminal<FakeConnector>,
    FakeConnector,
    mpsc::UnboundedReceiver<TerminalUpdate>,
) {
    let connector = FakeConnector::default();
    let (tx, rx) = mpsc::unbounded_channel();
    let terminal = Terminal::new(
        connector.clone(),
        credential,
        QuickActionCatalog::builtin(),
        tx,
    );
    (terminal, connector, rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<TerminalUpdate>) -> Vec<TerminalUpdate> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}

fn lines(updates: &[TerminalUpdate]) -> Vec<(LineKind, String)> {
    updates
        .iter()
        .filter_map(|update| match update {
            TerminalUpdate::Line(line) => Some((line.kind, line.content.clone())),
            _ => None,
        })
        .collect()
}

fn status(connectivity: Connectivity, executing: bool) -> TerminalUpdate {
    TerminalUpdate::Status {
        connectivity,
        executing,
    }
}

async fn open_terminal(
    target: Target,
) -> (
    Terminal<FakeConnector>,
    ChannelEndpoint,
    mpsc::UnboundedReceiver<TerminalUpdate>,
) {
    let (mut terminal, connector, mut rx) = terminal_with(Credential::new("tok"));
    terminal.switch_target(target).await;
    let endpoint = connector.take_endpoint();
    endpoint.emit(ChannelEvent::Open).await.unwrap();
    assert!(terminal.pump().await);
    drain(&mut rx);
    (terminal, endpoint, rx)
}

#[tokio::test]
async fn connect_announces_reset_then_connection() {
    let (mut terminal, connector, mut rx) = terminal_with(Credential::new("tok"));
    let target = Target::new("site-1").with_environment("laravel");

    terminal.switch_target(target.clone()).await;
    let updates = drain(&mut rx);
    assert!(matches!(
        &updates[0],
        TerminalUpdate::Reset { target: t, quick_actions } if *t == target && !quick_actions.is_empty()
    ));
    assert_eq!(updates[1], status(Connectivity::Connecting, false));
    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.requests.lock().unwrap()[0].target, target);

    let endpoint = connector.take_endpoint();
    endpoint.emit(ChannelEvent::Open).await.unwrap();
    assert!(terminal.pump().await);
    let updates = drain(&mut rx);
    assert_eq!(
        lines(&updates),
        vec![
            (LineKind::Success, "Connected to site-1".to_string()),
            (LineKind::Success, "Environment: laravel".to_string()),
        ]
    );
    assert_eq!(updates[2], status(Connectivity::Connected, false));
    assert_eq!(updates.last(), Some(&TerminalUpdate::Focus));
}

#[tokio::test]
async fn missing_credential_never_opens_a_channel() {
    let (mut terminal, connector, mut rx) = terminal_with(None);

    terminal.switch_target(Target::new("site-2")).await;

    let updates = drain(&mut rx);
    assert_eq!(
        lines(&updates),
        vec![(
            LineKind::Error,
            "Authentication token not found; log in again".to_string()
        )]
    );
    assert_eq!(updates.last(), Some(&status(Connectivity::Disconnected, false)));
    assert_eq!(connector.opened(), 0);
    assert!(!terminal.has_channel());
    assert!(!terminal.pump().await);
    assert!(!terminal.submit("ls").await);
}

#[tokio::test]
async fn command_round_trip() {
    let (mut terminal, mut endpoint, mut rx) =
        open_terminal(Target::new("site-3").with_environment("laravel")).await;
    let raw = "export PATH=/x && /usr/local/bin/php8.2 artisan migrate";

    assert!(terminal.submit(raw).await);
    assert_eq!(
        endpoint.outbound.recv().await,
        Some(ClientMessage::execute(raw, "site-3"))
    );
    let updates = drain(&mut rx);
    assert_eq!(
        lines(&updates),
        vec![(LineKind::Command, "php artisan migrate".to_string())]
    );
    assert_eq!(updates.last(), Some(&status(Connectivity::Connected, true)));

    assert!(!terminal.submit("ls").await);
    assert!(drain(&mut rx).is_empty());

    endpoint
        .emit(ServerEvent::CommandOutput {
            data: "Migrating...\nMigrated.\n".into(),
            stream: OutputStream::Stdout,
        })
        .await
        .unwrap();
    endpoint.emit(ServerEvent::CommandCompleted).await.unwrap();
    assert!(terminal.pump().await);
    assert!(terminal.pump().await);

    let updates = drain(&mut rx);
    assert_eq!(
        lines(&updates),
        vec![
            (LineKind::Stdout, "Migrating...".to_string()),
            (LineKind::Stdout, "Migrated.".to_string()),
            (LineKind::Success, "Command completed".to_string()),
        ]
    );
    assert!(updates.contains(&status(Connectivity::Connected, false)));
    assert_eq!(updates.last(), Some(&TerminalUpdate::Focus));
}

#[tokio::test]
async fn switching_target_closes_the_old_channel() {
    let (mut terminal, connector, mut rx) = terminal_with(Credential::new("tok"));
    terminal.switch_target(Target::new("site-4")).await;
    let mut first = connector.take_endpoint();
    first.emit(ChannelEvent::Open).await.unwrap();
    terminal.pump().await;
    terminal.submit("uptime").await;
    drain(&mut rx);

    terminal
        .switch_target(Target::new("site-5").with_environment("node"))
        .await;

    assert_eq!(
        first.outbound.recv().await,
        Some(ClientMessage::execute("uptime", "site-4"))
    );
    assert_eq!(first.outbound.recv().await, None);
    assert_eq!(connector.opened(), 2);

    let updates = drain(&mut rx);
    assert!(matches!(
        &updates[0],
        TerminalUpdate::Reset { target, .. } if target.id == "site-5"
    ));
    assert!(lines(&updates).is_empty());
    let session = terminal.session().unwrap();
    assert_eq!(session.target().id, "site-5");
    assert!(session.transcript().is_empty());
    assert!(session.history().is_empty());
    assert!(!session.is_executing());
    assert_eq!(session.connectivity(), Connectivity::Connecting);
}

#[tokio::test]
async fn quick_action_sends_the_raw_command() {
    let (mut terminal, mut endpoint, mut rx) =
        open_terminal(Target::new("site-6").with_environment("node")).await;
    let action = terminal
        .quick_actions()
        .iter()
        .find(|a| a.id == "npm-ci")
        .cloned()
        .unwrap();

    assert!(!terminal.run_quick_action("does-not-exist").await);
    assert!(terminal.run_quick_action("npm-ci").await);

    assert_eq!(
        endpoint.outbound.recv().await,
        Some(ClientMessage::execute(action.command.clone(), "site-6"))
    );
    assert_eq!(lines(&drain(&mut rx)).len(), 1);
}

#[tokio::test]
async fn backend_hangup_disconnects_and_frees_input() {
    let (mut terminal, endpoint, mut rx) = open_terminal(Target::new("site-7")).await;
    terminal.submit("tail -f storage/logs/laravel.log").await;
    drain(&mut rx);

    drop(endpoint);
    assert!(terminal.pump().await);

    let updates = drain(&mut rx);
    assert_eq!(
        lines(&updates),
        vec![(
            LineKind::Error,
            "Disconnected from terminal server: channel closed".to_string()
        )]
    );
    assert!(updates.contains(&status(Connectivity::Disconnected, false)));
    assert_eq!(updates.last(), Some(&TerminalUpdate::Focus));
    assert!(!terminal.has_channel());
}

#[tokio::test]
async fn history_recall_reaches_the_display() {
    let (mut terminal, endpoint, mut rx) = open_terminal(Target::new("site-8")).await;
    for command in ["ls", "pwd"] {
        terminal.submit(command).await;
        endpoint.emit(ServerEvent::CommandCompleted).await.unwrap();
        terminal.pump().await;
    }
    drain(&mut rx);

    terminal.recall_previous();
    terminal.recall_previous();
    terminal.recall_next();
    terminal.recall_next();
    terminal.recall_next();

    assert_eq!(
        drain(&mut rx),
        vec![
            TerminalUpdate::Recall(Some("pwd".into())),
            TerminalUpdate::Recall(Some("ls".into())),
            TerminalUpdate::Recall(Some("pwd".into())),
            TerminalUpdate::Recall(None),
        ]
    );
}

#[tokio::test]
async fn run_loop_stops_on_quit_and_closes_the_channel() {
    let (terminal, mut endpoint, _rx) = open_terminal(Target::new("site-9")).await;
    let (inputs_tx, inputs_rx) = mpsc::channel(8);
    inputs_tx
        .send(OperatorInput::Submit("whoami".into()))
        .await
        .unwrap();
    inputs_tx.send(OperatorInput::Quit).await.unwrap();

    terminal.run(inputs_rx).await;

    assert_eq!(
        endpoint.outbound.recv().await,
        Some(ClientMessage::execute("whoami", "site-9"))
    );
    assert_eq!(endpoint.outbound.recv().await, None);
}
