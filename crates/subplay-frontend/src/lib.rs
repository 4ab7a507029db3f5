//! Terminal display layer.
//!
//! Backend events are forwarded to the calling thread and folded into a
//! [`view::DisplayState`], which decides what gets printed. User input is read
//! line by line on a separate thread and forwarded to the backend as commands.

use std::io::BufRead;
use std::path::PathBuf;

use subplay_bridge::{MessageFromBackend, MessageToBackend};
use tokio::sync::mpsc;

use crate::commands::Command;
use crate::view::DisplayState;

pub mod commands;
pub mod formatting;
pub mod view;

#[derive(Clone)]
pub struct BackendBridge {
    pub to_backend: mpsc::Sender<MessageToBackend>,
}

impl BackendBridge {
    /// Sends a command from a thread outside any async runtime. Returns false
    /// once the backend is gone.
    pub fn send_blocking(&self, message: MessageToBackend) -> bool {
        self.to_backend.blocking_send(message).is_ok()
    }
}

/// What the display loop reacts to.
enum Event {
    Backend(MessageFromBackend),
    /// A command handled without the backend.
    Local(Command),
    /// The backend dropped its sender.
    Closed,
}

/// Reads commands from standard input until `quit` or end of input.
fn read_commands(bridge: BackendBridge, events: std::sync::mpsc::Sender<Event>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read input: {e}");
                break;
            }
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e:#}");
                continue;
            }
        };

        let quit = command == Command::Quit;
        match command.to_message() {
            Some(message) => {
                if !bridge.send_blocking(message) {
                    return;
                }
            }
            None => {
                let _ = events.send(Event::Local(command));
            }
        }
        if quit {
            return;
        }
    }

    // end of input closes the player like `quit`
    bridge.send_blocking(MessageToBackend::Shutdown);
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

/// Runs the display loop on the current thread until the backend shuts down.
pub fn run(
    mut rx: mpsc::Receiver<MessageFromBackend>,
    tx: mpsc::Sender<MessageToBackend>,
    initial_folder: Option<PathBuf>,
) -> anyhow::Result<()> {
    let bridge = BackendBridge { to_backend: tx };
    if let Some(folder) = initial_folder {
        bridge.send_blocking(MessageToBackend::OpenFolder(folder));
    }

    let (events_tx, events_rx) = std::sync::mpsc::channel();
    let input_bridge = bridge.clone();
    let input_events = events_tx.clone();
    std::thread::Builder::new()
        .name("input".to_string())
        .spawn(move || read_commands(input_bridge, input_events))?;
    drop(bridge);

    std::thread::Builder::new()
        .name("events".to_string())
        .spawn(move || {
            while let Some(message) = rx.blocking_recv() {
                if events_tx.send(Event::Backend(message)).is_err() {
                    return;
                }
            }
            let _ = events_tx.send(Event::Closed);
        })?;

    println!("{}", commands::HELP);
    let mut state = DisplayState::default();
    for event in events_rx {
        match event {
            Event::Backend(message) => print_lines(state.apply(message)),
            Event::Local(Command::List) => print_lines(state.render_playlist()),
            Event::Local(_) => println!("{}", commands::HELP),
            Event::Closed => break,
        }
    }

    Ok(())
}
