//! Line-oriented operator console: stdin in, styled transcript out.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use crossterm::style::Stylize;
use tokio::sync::mpsc;
use tracing::debug;

use tenant_shell::logging::EventEmitter;
use tenant_shell::{Connectivity, LineKind, OperatorInput, Target, TerminalLine, TerminalUpdate};

const PROMPT: &str = "> ";

/// Map one console line to an operator input. Lines starting with `:` are
/// console commands; everything else is a command for the remote shell.
pub fn parse_line(line: &str) -> Result<OperatorInput> {
    let Some(rest) = line.trim_start().strip_prefix(':') else {
        return Ok(OperatorInput::Submit(line.to_string()));
    };
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    if parts.next().is_some() {
        bail!("too many arguments for :{name}");
    }

    match (name, arg) {
        ("target", Some(descriptor)) => {
            Ok(OperatorInput::SwitchTarget(descriptor.parse::<Target>()?))
        }
        ("target", None) => bail!("usage: :target ID[:KIND]"),
        ("quick", Some(id)) => Ok(OperatorInput::QuickAction(id.to_string())),
        ("quick", None) => bail!("usage: :quick ID"),
        ("prev", None) => Ok(OperatorInput::HistoryPrevious),
        ("next", None) => Ok(OperatorInput::HistoryNext),
        ("quit", None) | ("q", None) => Ok(OperatorInput::Quit),
        _ => bail!("unknown console command :{name}"),
    }
}

/// Read stdin on a dedicated thread so a pending read never holds up shutdown.
pub fn spawn_stdin_reader(inputs: mpsc::Sender<OperatorInput>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_line(&line) {
                Ok(input) => {
                    let quit = input == OperatorInput::Quit;
                    if inputs.blocking_send(input).is_err() || quit {
                        return;
                    }
                }
                Err(error) => eprintln!("{}", error.to_string().red()),
            }
        }
        debug!(target = "tenant_shell::console", "stdin closed");
        let _ = inputs.blocking_send(OperatorInput::Quit);
    });
}

/// Render updates until the terminal drops its sender.
pub async fn render(
    mut updates: mpsc::UnboundedReceiver<TerminalUpdate>,
    emitter: EventEmitter,
) {
    while let Some(update) = updates.recv().await {
        if emitter.enabled() {
            emitter.emit_update(&update);
            continue;
        }
        let mut stdout = io::stdout().lock();
        match update {
            TerminalUpdate::Focus => {
                let _ = write!(stdout, "{PROMPT}");
            }
            other => {
                if let Some(text) = render_update(&other) {
                    let _ = writeln!(stdout, "{text}");
                }
            }
        }
        let _ = stdout.flush();
    }
}

pub fn render_update(update: &TerminalUpdate) -> Option<String> {
    match update {
        TerminalUpdate::Reset {
            target,
            quick_actions,
        } => {
            let mut text = format!("== {} ({}) ==", target.id, target.environment_label())
                .bold()
                .to_string();
            if !quick_actions.is_empty() {
                let ids: Vec<&str> = quick_actions.iter().map(|a| a.id.as_str()).collect();
                text.push('\n');
                text.push_str(&format!("quick actions: {}", ids.join(", ")).dim().to_string());
            }
            Some(text)
        }
        TerminalUpdate::Line(line) => Some(render_line(line)),
        TerminalUpdate::Recall(Some(entry)) => Some(format!("{}{}", PROMPT, entry).dim().to_string()),
        TerminalUpdate::Recall(None) => Some(PROMPT.dim().to_string()),
        TerminalUpdate::Status {
            connectivity,
            executing,
        } => {
            let label = if *executing {
                format!("[{}, executing]", connectivity.as_str())
            } else {
                format!("[{}]", connectivity.as_str())
            };
            Some(match connectivity {
                Connectivity::Connected => label.green().to_string(),
                Connectivity::Connecting => label.yellow().to_string(),
                Connectivity::Disconnected => label.red().to_string(),
            })
        }
        TerminalUpdate::Focus => None,
    }
}

fn render_line(line: &TerminalLine) -> String {
    let content = line.content.as_str();
    match line.kind {
        LineKind::Command => format!("$ {content}").bold().to_string(),
        LineKind::Stdout => content.to_string(),
        LineKind::Stderr => content.red().to_string(),
        LineKind::Info => content.cyan().to_string(),
        LineKind::Success => content.green().to_string(),
        LineKind::Error => content.red().bold().to_string(),
    }
}
