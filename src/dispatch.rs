// src/dispatch.rs - One command vocabulary for gestures and UI controls
use std::fmt;

use crate::player::{Player, PlayerError};
use crate::tracking::GestureSymbol;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Play,
    Pause,
    TogglePlay,
    Forward,
    Rewind,
    MuteToggle,
    Restart,
    Next,
    Previous,
    /// Jump to a point given as a fraction of the whole video.
    Seek(f64),
    SetVolume(u8),
}

impl Command {
    pub fn from_gesture(symbol: GestureSymbol) -> Option<Command> {
        match symbol {
            GestureSymbol::Play => Some(Command::Play),
            GestureSymbol::Pause => Some(Command::Pause),
            GestureSymbol::Forward => Some(Command::Forward),
            GestureSymbol::Rewind => Some(Command::Rewind),
            GestureSymbol::MuteToggle => Some(Command::MuteToggle),
            GestureSymbol::Restart => Some(Command::Restart),
            GestureSymbol::Next => Some(Command::Next),
            GestureSymbol::Previous => Some(Command::Previous),
            GestureSymbol::Unknown | GestureSymbol::None => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Play => write!(f, "play"),
            Command::Pause => write!(f, "pause"),
            Command::TogglePlay => write!(f, "play/pause"),
            Command::Forward => write!(f, "forward"),
            Command::Rewind => write!(f, "rewind"),
            Command::MuteToggle => write!(f, "mute"),
            Command::Restart => write!(f, "restart"),
            Command::Next => write!(f, "next"),
            Command::Previous => write!(f, "previous"),
            Command::Seek(ratio) => write!(f, "seek {:.0}%", ratio * 100.0),
            Command::SetVolume(v) => write!(f, "volume {}", v),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Applied,
    /// Nothing to act on, e.g. no video loaded. Shown to the user, not an error.
    Advisory(PlayerError),
    Failed(PlayerError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn message(&self) -> Option<String> {
        match self {
            Outcome::Applied => None,
            Outcome::Advisory(e) | Outcome::Failed(e) => Some(e.to_string()),
        }
    }
}

impl From<Result<(), PlayerError>> for Outcome {
    fn from(result: Result<(), PlayerError>) -> Self {
        match result {
            Ok(()) => Outcome::Applied,
            Err(e) if e.is_advisory() => Outcome::Advisory(e),
            Err(e) => Outcome::Failed(e),
        }
    }
}

pub fn dispatch(player: &mut Player, command: Command) -> Outcome {
    let result = match command {
        Command::Play => player.play(),
        Command::Pause => player.pause(),
        Command::TogglePlay => player.toggle_play(),
        Command::Forward => player.forward(),
        Command::Rewind => player.rewind(),
        Command::MuteToggle => player.toggle_mute(),
        Command::Restart => player.restart(),
        Command::Next => player.play_next(false),
        Command::Previous => player.play_previous(),
        Command::Seek(ratio) => player.seek_ratio(ratio),
        Command::SetVolume(volume) => {
            player.set_volume(volume);
            Ok(())
        }
    };
    Outcome::from(result)
}
