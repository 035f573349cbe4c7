//! Gesture-controlled video player.
//!
//! A camera (or the keyboard simulator) yields hand landmarks every tick.
//! Each hand is reduced to a five-finger extension vector and matched
//! against a fixed table:
//!
//! | Fingers (T I M R P) | Gesture  | Action                   |
//! |---------------------|----------|--------------------------|
//! | `0 1 1 1 1`         | Play     | start playback           |
//! | `0 0 0 0 0`         | Pause    | pause playback           |
//! | `0 1 0 0 0`         | Forward  | skip ahead one step      |
//! | `1 0 0 0 0`         | Rewind   | skip back one step       |
//! | `0 1 1 0 0`         | Mute     | toggle mute              |
//! | `0 1 0 0 1`         | Restart  | jump to the first frame  |
//! | `0 1 1 1 0`         | Next     | next playlist entry      |
//! | `0 0 1 1 1`         | Previous | previous playlist entry  |
//!
//! A held pose fires once, then again only after the cooldown has elapsed.
//! Gestures and on-screen controls go through the same [`dispatch()`] path.

pub mod app;
pub mod config;
pub mod controller;
pub mod data;
pub mod debounce;
pub mod dispatch;
pub mod mediapipe_bridge;
pub mod player;
pub mod tracking;
pub mod ui;
pub mod video;

pub use config::PlayerConfig;
pub use controller::{run_loop, GestureController, TickReport};
pub use dispatch::{dispatch, Command, Outcome};
pub use player::{Player, PlayerError};
pub use tracking::{FingerVector, GestureSymbol, PoseClassifier};
