mod console;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use tenant_shell::config::Config;
use tenant_shell::logging::{init_logging, EventEmitter};
use tenant_shell::{resolve_credential, QuickActionCatalog, Terminal, WsConnector};

const INPUT_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::parse();
    init_logging(&cfg)?;

    let catalog = match &cfg.quick_actions {
        Some(path) => QuickActionCatalog::load(path)
            .with_context(|| format!("failed to load quick actions from {}", path.display()))?,
        None => QuickActionCatalog::builtin(),
    };

    let store = cfg.credential_store();
    let credential = resolve_credential(cfg.token.as_deref(), store.as_ref());
    if credential.is_none() {
        warn!(
            target = "tenant_shell::main",
            store = ?store.as_ref().map(|s| s.path().display().to_string()),
            "no terminal credential available"
        );
    }

    let options = cfg.channel_options();
    info!(
        target = "tenant_shell::main",
        url = %options.base_url,
        target_id = %cfg.target.id,
        "starting terminal"
    );

    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let renderer = tokio::spawn(console::render(
        updates_rx,
        EventEmitter::new(cfg.json_output),
    ));

    let (inputs_tx, inputs_rx) = mpsc::channel(INPUT_CAPACITY);
    console::spawn_stdin_reader(inputs_tx);

    let mut terminal = Terminal::new(WsConnector::new(options), credential, catalog, updates_tx);
    terminal.switch_target(cfg.target.clone()).await;

    tokio::select! {
        _ = terminal.run(inputs_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!(target = "tenant_shell::main", "interrupted");
        }
    }

    renderer.await.context("renderer task failed")?;
    Ok(())
}
