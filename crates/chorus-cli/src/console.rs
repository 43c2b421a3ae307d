//! Line commands read while sessions are held.

use chorus_gateway::{BroadcastOutcome, PresencePatch, SessionOrchestrator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Set(PresencePatch),
    Remove(String),
    Status,
    Leave,
}

pub const HELP: &str =
    "commands: mic|camera|deafen|stream on|off, remove <credential>, status, leave";

pub fn parse(line: &str) -> Result<ConsoleCommand, String> {
    let mut words = line.split_whitespace();
    let command = words.next().ok_or_else(|| HELP.to_string())?;
    let argument = words.next();

    match (command, argument) {
        ("leave" | "quit" | "exit", None) => Ok(ConsoleCommand::Leave),
        ("status", None) => Ok(ConsoleCommand::Status),
        ("remove", Some(raw)) => Ok(ConsoleCommand::Remove(raw.to_string())),
        (flag @ ("mic" | "camera" | "deafen" | "stream"), Some(value)) => {
            let on = match value {
                "on" => true,
                "off" => false,
                other => return Err(format!("expected on or off, got {other:?}")),
            };
            let mut patch = PresencePatch::default();
            match flag {
                "mic" => patch.mic = Some(on),
                "camera" => patch.camera = Some(on),
                "deafen" => patch.deafen = Some(on),
                _ => patch.stream = Some(on),
            }
            Ok(ConsoleCommand::Set(patch))
        }
        _ => Err(HELP.to_string()),
    }
}

/// Serve console commands until `leave`, Ctrl-C, or stdin closing.
///
/// With `interactive` off only Ctrl-C ends the hold.
pub async fn run(orchestrator: &SessionOrchestrator, interactive: bool) {
    if !interactive {
        wait_for_ctrl_c().await;
        return;
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = wait_for_ctrl_c() => return,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Console closed, waiting for Ctrl-C");
                wait_for_ctrl_c().await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Console read failed, waiting for Ctrl-C");
                wait_for_ctrl_c().await;
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse(&line) {
            Ok(ConsoleCommand::Leave) => return,
            Ok(ConsoleCommand::Status) => print_status(orchestrator).await,
            Ok(ConsoleCommand::Set(patch)) => match orchestrator.broadcast_settings(patch).await {
                BroadcastOutcome::NoLiveSessions => println!("no live sessions"),
                BroadcastOutcome::Dispatched {
                    succeeded,
                    failed,
                    skipped,
                } => println!("updated {succeeded}, failed {failed}, skipped {skipped}"),
            },
            Ok(ConsoleCommand::Remove(raw)) => {
                if orchestrator.remove_credential(&raw).await {
                    println!("removed");
                } else {
                    println!("no such credential");
                }
            }
            Err(message) => println!("{message}"),
        }
    }
}

async fn print_status(orchestrator: &SessionOrchestrator) {
    let live = orchestrator.live_credentials().await;
    let options = orchestrator.options().await;
    println!(
        "{} live of {} registered; mic={} camera={} deafen={} stream={}",
        live.len(),
        orchestrator.credentials().await.len(),
        options.mic,
        options.camera,
        options.deafen,
        options.stream
    );
    for credential in live {
        println!("  {}  {}", credential, orchestrator.display_name(&credential).await);
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
