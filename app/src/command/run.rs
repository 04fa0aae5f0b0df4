//! Live discussion command.
//!
//! Starts a session on the configured roster, prints each new message as
//! snapshots arrive and accepts moderator commands on stdin until the turn
//! limit, `/quit` or Ctrl+C.

use std::collections::HashSet;
use std::path::PathBuf;

use futures::StreamExt;
use roundtable_config::Config;
use roundtable_core::MessageKind;
use roundtable_session::{SessionController, SessionError, StatusSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use uuid::Uuid;

use super::console::{ConsoleCommand, HELP};

#[derive(Debug, Clone)]
pub struct RunInput {
    pub topic: String,
    /// Stop after this many completed turns
    pub turns: Option<u64>,
    pub rate: Option<f64>,
    /// Config file to use instead of `~/roundtable/config.json`
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct RunStrategy;

impl super::CommandStrategy for RunStrategy {
    type Input = RunInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = match &input.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        if config.agents.is_empty() {
            anyhow::bail!("No agents configured. Add at least one entry under \"agents\".");
        }

        let controller = super::build_controller(&config)?;
        if let Some(rate) = input.rate {
            controller.set_rate(rate).await?;
        }

        let started = controller.start(input.topic.as_str()).await?;
        info!(
            "Session {} started",
            started.session_id.map(|id| id.to_string()).unwrap_or_default()
        );
        println!("=== Roundtable: {} ===", input.topic);
        println!("Seats: {}", controller.roster().join(", "));
        println!("Type text to join in, /help for commands, Ctrl+C to end.\n");

        let mut updates = controller.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut printed = HashSet::new();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C");
                    break;
                }
                update = updates.next() => {
                    let Some(snapshot) = update else {
                        break;
                    };
                    print_new_messages(&snapshot, &mut printed);
                    if !snapshot.running {
                        break;
                    }
                    if input.turns.is_some_and(|limit| snapshot.turn_count >= limit) {
                        info!("Reached {} turns", snapshot.turn_count);
                        break;
                    }
                }
                line = lines.next_line(), if stdin_open => {
                    match line? {
                        None => stdin_open = false,
                        Some(line) => {
                            if !handle_line(&controller, &line).await {
                                break;
                            }
                        }
                    }
                }
            }
        }

        let last = controller.stop().await;
        print_new_messages(&last, &mut printed);
        println!(
            "\nSession ended. Total turns: {}, messages: {}",
            last.turn_count,
            controller.history().await.len()
        );
        Ok(())
    }
}

fn print_new_messages(snapshot: &StatusSnapshot, printed: &mut HashSet<Uuid>) {
    for message in &snapshot.messages {
        if !printed.insert(message.id) {
            continue;
        }
        match message.kind {
            MessageKind::Agent => println!("{}: {}\n", message.sender, message.content),
            MessageKind::Injected => println!("» {}: {}\n", message.sender, message.content),
            MessageKind::Summary => {}
        }
    }
}

fn print_status(snapshot: &StatusSnapshot) {
    println!(
        "Turns: {}, rate: {}, speaking: {}",
        snapshot.turn_count,
        snapshot.rate,
        snapshot.current_speaker.as_deref().unwrap_or("-")
    );
    for agent in snapshot.agents.values() {
        let reason = agent
            .reason
            .as_deref()
            .map(|reason| format!(" ({reason})"))
            .unwrap_or_default();
        println!("  {} [{}] {}{reason}", agent.name, agent.model, agent.state);
    }
}

/// Apply one console line. Returns `false` when the user asked to quit.
async fn handle_line(controller: &SessionController, line: &str) -> bool {
    let command = match ConsoleCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(message) => {
            eprintln!("{message}");
            return true;
        }
    };

    let result: Result<(), SessionError> = match command {
        ConsoleCommand::Quit => return false,
        ConsoleCommand::Help => {
            println!("{HELP}");
            Ok(())
        }
        ConsoleCommand::Status => {
            print_status(&controller.status());
            Ok(())
        }
        ConsoleCommand::Say(text) => controller
            .inject_message(text, "moderator")
            .await
            .map(|_| ()),
        ConsoleCommand::Pause(name) => controller.pause_agent(&name, None).await.map(|_| ()),
        ConsoleCommand::Resume(name) => controller.resume_agent(&name, None).await.map(|_| ()),
        ConsoleCommand::Stop(name) => controller.stop_agent(&name, None).await.map(|_| ()),
        ConsoleCommand::Finish(name) => controller.finish_agent(&name, None).await.map(|_| ()),
        ConsoleCommand::Restart(name) => controller.restart_agent(&name, None).await.map(|_| ()),
        ConsoleCommand::Interrupt => controller.interrupt().await.map(|interrupted| {
            if !interrupted {
                println!("No turn in progress");
            }
        }),
        ConsoleCommand::Topic(topic) => controller.switch_context(topic).await.map(|_| ()),
        ConsoleCommand::Rate(rate) => controller.set_rate(rate).await.map(|_| ()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }
    true
}
