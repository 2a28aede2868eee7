use std::io::{self, Write};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::terminal::TerminalUpdate;

/// Install the global subscriber. Logs go to stderr; stdout belongs to the transcript.
pub fn init_logging(cfg: &Config) -> Result<()> {
    let filter =
        EnvFilter::try_new(cfg.log_level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(true)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Writes machine-readable update records to stdout, one JSON object per line.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    json_output: bool,
}

impl EventEmitter {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    pub fn enabled(&self) -> bool {
        self.json_output
    }

    pub fn emit<T: Serialize>(&self, event_type: &str, payload: T) {
        if !self.json_output {
            return;
        }

        let line = record(event_type, payload);
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }

    pub fn emit_update(&self, update: &TerminalUpdate) {
        let (event_type, payload) = update_payload(update);
        self.emit(event_type, payload);
    }
}

/// Record type and payload for one terminal update.
pub fn update_payload(update: &TerminalUpdate) -> (&'static str, Value) {
    match update {
        TerminalUpdate::Reset {
            target,
            quick_actions,
        } => (
            "reset",
            json!({ "target": target, "quick_actions": quick_actions }),
        ),
        TerminalUpdate::Line(line) => ("line", json!(line)),
        TerminalUpdate::Recall(input) => ("recall", json!({ "input": input })),
        TerminalUpdate::Focus => ("focus", json!({})),
        TerminalUpdate::Status {
            connectivity,
            executing,
        } => (
            "status",
            json!({ "connectivity": connectivity, "executing": executing }),
        ),
    }
}

fn record<T: Serialize>(event_type: &str, payload: T) -> serde_json::Value {
    json!({
        "ts": Utc::now().to_rfc3339(),
        "type": event_type,
        "payload": payload,
    })
}
