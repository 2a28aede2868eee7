//! # tenant-shell
//!
//! Interactive remote command sessions against a sandboxed tenant
//! environment: one authenticated WebSocket channel per target, one command
//! in flight at a time, output streamed back into a classified transcript.
//!
//! ```rust,no_run
//! use tenant_shell::{
//!     ChannelOptions, Credential, OperatorInput, QuickActionCatalog, Target, Terminal,
//!     WsConnector,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
//!     let mut terminal = Terminal::new(
//!         WsConnector::new(ChannelOptions::new("https://panel.example.com")),
//!         Credential::new("bearer-token"),
//!         QuickActionCatalog::builtin(),
//!         updates_tx,
//!     );
//!     terminal
//!         .switch_target(Target::new("site-42").with_environment("laravel"))
//!         .await;
//!
//!     let (inputs_tx, inputs_rx) = mpsc::channel(16);
//!     inputs_tx
//!         .send(OperatorInput::Submit("php artisan about".into()))
//!         .await
//!         .unwrap();
//!     tokio::spawn(terminal.run(inputs_rx));
//!
//!     while let Some(update) = updates_rx.recv().await {
//!         println!("{update:?}");
//!     }
//! }
//! ```

pub mod channel;
pub mod config;
pub mod credentials;
pub mod display;
pub mod error;
pub mod history;
pub mod logging;
pub mod normalize;
pub mod protocol;
pub mod quick_actions;
pub mod session;
pub mod terminal;
pub mod transcript;

pub use channel::{ChannelEndpoint, ChannelHandle, ChannelOptions, Connector, WsConnector};
pub use credentials::{resolve_credential, Credential, CredentialStore};
pub use display::format_command;
pub use error::{Result, ShellError};
pub use history::{History, Recall};
pub use normalize::{normalize, strip_control, OutputLine};
pub use protocol::{ChannelEvent, ClientMessage, OutputStream, ServerEvent, Target};
pub use quick_actions::{QuickAction, QuickActionCatalog};
pub use session::{ConnectRequest, Connectivity, Effect, Session};
pub use terminal::{OperatorInput, Terminal, TerminalUpdate};
pub use transcript::{LineKind, TerminalLine, Transcript};
