use chrono::{ DateTime, Local };
use log::{ error, info };
use std::error::Error;
use std::sync::Arc;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{ broadcast, watch };

use crate::models::chat::ChatEntry;
use crate::session::{ SessionController, SessionEvent, SessionState };

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Retry,
    Reset,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Command {
        match line.trim() {
            "/retry" => Command::Retry,
            "/reset" => Command::Reset,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Send(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

/// Drops control characters so backend text cannot drive the terminal.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

pub fn render_entry(entry: &ChatEntry) -> String {
    let time = DateTime::from_timestamp(entry.timestamp, 0)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    format!("[{}] {}: {}", time, entry.role.label(), sanitize(&entry.content))
}

/// Line-based chat surface over stdin/stdout.
pub async fn run_terminal(
    controller: Arc<SessionController>,
    new_conversation: bool
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let renderer = tokio::spawn(
        render(controller.clone(), controller.subscribe_state(), controller.subscribe_events())
    );

    if new_conversation {
        controller.reset_conversation().await?;
    } else {
        controller.initialize().await?;
    }
    println!("Type a message and press Enter. Commands: /retry, /reset, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Quit => {
                break;
            }
            Command::Retry => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Err(e) = controller.initialize().await {
                        error!("Retry failed: {}", e);
                    }
                });
            }
            Command::Reset => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    if let Err(e) = controller.reset_conversation().await {
                        error!("Reset failed: {}", e);
                    }
                });
            }
            Command::Send(text) => {
                let controller = controller.clone();
                tokio::spawn(async move {
                    let outcome = controller.send_message(&text).await;
                    info!("Send finished: {:?}", outcome);
                });
            }
        }
    }

    controller.dispose();
    renderer.abort();
    Ok(())
}

async fn render(
    controller: Arc<SessionController>,
    mut states: watch::Receiver<SessionState>,
    mut events: broadcast::Receiver<SessionEvent>
) {
    let mut printed = 0usize;
    let mut was_typing = false;

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                match state {
                    SessionState::Loading => println!("Loading..."),
                    SessionState::Ready { is_typing, .. } => {
                        if is_typing && !was_typing {
                            println!("Assistant is typing...");
                        }
                        was_typing = is_typing;
                    }
                    SessionState::Error { message } => {
                        was_typing = false;
                        println!("! {}", message);
                    }
                }
            }
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::ScrollToNewest { .. }) | Err(RecvError::Lagged(_)) => {
                        let transcript = controller.transcript();
                        if transcript.len() < printed {
                            println!("--- new conversation ---");
                            printed = 0;
                        }
                        for entry in &transcript[printed..] {
                            println!("{}", render_entry(entry));
                        }
                        printed = transcript.len();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}
