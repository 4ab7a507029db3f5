//! Line commands typed by the user.

use std::path::PathBuf;

use anyhow::{Context, bail};
use subplay_bridge::MessageToBackend;

pub const HELP: &str = "\
commands:
  open <dir>     load the audio files of a folder
  play <n>       play playlist entry n
  pause          pause or resume
  next, prev     skip forward or back
  stop           stop playback
  volume <0-1>   set the output volume
  list           show the playlist
  config         show the active configuration
  quit           exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(PathBuf),
    /// 1-based playlist position.
    Play(usize),
    TogglePause,
    Next,
    Previous,
    Stop,
    Volume(f32),
    List,
    Config,
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Empty lines yield `None`.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (name, argument) = match line.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "open" | "o" => {
                if argument.is_empty() {
                    bail!("usage: open <dir>");
                }
                Command::Open(PathBuf::from(argument))
            }
            "play" | "p" => {
                let position: usize = argument
                    .parse()
                    .with_context(|| format!("invalid playlist position {argument:?}"))?;
                if position == 0 {
                    bail!("playlist positions start at 1");
                }
                Command::Play(position)
            }
            "pause" | "space" => Command::TogglePause,
            "next" | "n" => Command::Next,
            "prev" | "previous" => Command::Previous,
            "stop" | "s" => Command::Stop,
            "volume" | "vol" => {
                let volume: f32 = argument
                    .parse()
                    .with_context(|| format!("invalid volume {argument:?}"))?;
                if !(0.0..=1.0).contains(&volume) {
                    bail!("volume must be between 0 and 1");
                }
                Command::Volume(volume)
            }
            "list" | "ls" => Command::List,
            "config" => Command::Config,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("unknown command {other:?}, type `help`"),
        };
        Ok(Some(command))
    }

    /// The backend message for this command, if it needs the backend.
    pub fn to_message(&self) -> Option<MessageToBackend> {
        match self {
            Command::Open(directory) => Some(MessageToBackend::OpenFolder(directory.clone())),
            Command::Play(position) => Some(MessageToBackend::PlayIndex(position - 1)),
            Command::TogglePause => Some(MessageToBackend::TogglePause),
            Command::Next => Some(MessageToBackend::Next),
            Command::Previous => Some(MessageToBackend::Previous),
            Command::Stop => Some(MessageToBackend::Stop),
            Command::Volume(volume) => Some(MessageToBackend::SetVolume(*volume)),
            Command::Config => Some(MessageToBackend::ConfigurationRequest),
            Command::Quit => Some(MessageToBackend::Shutdown),
            Command::List | Command::Help => None,
        }
    }
}
