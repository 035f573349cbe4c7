// src/player.rs - Playback and playlist state machine
use image::DynamicImage;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::PlayerConfig;

/// A seekable stream of decoded frames.
///
/// `current_frame_index` is the index of the frame the next
/// `read_next_frame` call returns.
pub trait MediaSource {
    fn current_frame_index(&self) -> usize;
    fn total_frame_count(&self) -> usize;
    fn fps(&self) -> f64;
    fn seek(&mut self, frame_index: usize);
    /// `None` at end of stream.
    fn read_next_frame(&mut self) -> Option<DynamicImage>;
}

pub trait MediaOpener {
    fn open(&mut self, path: &Path) -> anyhow::Result<Box<dyn MediaSource>>;
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no video loaded")]
    NoMediaLoaded,
    #[error("playlist is empty")]
    EmptyPlaylist,
    #[error("playlist has no entry {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("could not open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },
}

impl PlayerError {
    /// Advisories are "nothing to do" notices rather than failures.
    pub fn is_advisory(&self) -> bool {
        matches!(self, PlayerError::NoMediaLoaded | PlayerError::EmptyPlaylist)
    }
}

/// High-level state, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Empty,
    Paused,
    Playing,
}

pub struct Player {
    opener: Box<dyn MediaOpener>,
    media: Option<Box<dyn MediaSource>>,
    playlist: Vec<PathBuf>,
    current_index: Option<usize>,
    is_playing: bool,
    is_muted: bool,
    volume: u8,
    seek_step_secs: f64,
    /// Set when end-of-media could not move on to another entry.
    finished: bool,
}

impl Player {
    pub fn new(opener: Box<dyn MediaOpener>, config: &PlayerConfig) -> Self {
        Self {
            opener,
            media: None,
            playlist: Vec::new(),
            current_index: None,
            is_playing: false,
            is_muted: false,
            volume: config.initial_volume.min(100),
            seek_step_secs: config.seek_step_secs,
            finished: false,
        }
    }

    // ── read accessors ──────────────────────────────────────────────────

    pub fn is_loaded(&self) -> bool {
        self.media.is_some()
    }

    /// True once playback ran off the end of the last entry, or the next
    /// entry failed to open. Cleared whenever playback starts again.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted
    }

    /// Slider volume, kept intact while muted.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// What the listener hears: 0 while muted.
    pub fn effective_volume(&self) -> u8 {
        if self.is_muted { 0 } else { self.volume }
    }

    pub fn state(&self) -> PlaybackState {
        match (self.is_loaded(), self.is_playing) {
            (false, _) => PlaybackState::Empty,
            (true, false) => PlaybackState::Paused,
            (true, true) => PlaybackState::Playing,
        }
    }

    pub fn playlist(&self) -> &[PathBuf] {
        &self.playlist
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_index.map(|i| self.playlist[i].as_path())
    }

    pub fn position(&self) -> usize {
        self.media.as_ref().map(|m| m.current_frame_index()).unwrap_or(0)
    }

    pub fn total_frames(&self) -> usize {
        self.media.as_ref().map(|m| m.total_frame_count()).unwrap_or(0)
    }

    pub fn fps(&self) -> f64 {
        self.media.as_ref().map(|m| m.fps()).unwrap_or(0.0)
    }

    pub fn current_time_secs(&self) -> f64 {
        seconds(self.position(), self.fps())
    }

    pub fn total_time_secs(&self) -> f64 {
        seconds(self.total_frames(), self.fps())
    }

    pub fn progress(&self) -> f32 {
        match self.total_frames() {
            0 => 0.0,
            total => (self.position() as f32 / total as f32).min(1.0),
        }
    }

    // ── loading ─────────────────────────────────────────────────────────

    fn open(&mut self, path: &Path) -> Result<Box<dyn MediaSource>, PlayerError> {
        self.opener.open(path).map_err(|e| {
            warn!("Failed to open {}: {:#}", path.display(), e);
            PlayerError::Open {
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            }
        })
    }

    /// Opens a single file chosen by the user. It joins the playlist if it is
    /// not already there and is left paused.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> Result<(), PlayerError> {
        let path = path.as_ref();
        let media = self.open(path)?;

        let index = match self.playlist.iter().position(|p| p == path) {
            Some(index) => index,
            None => {
                self.playlist.push(path.to_path_buf());
                self.playlist.len() - 1
            }
        };
        self.install(media, index, false);
        Ok(())
    }

    /// Loads a playlist entry and starts playing it.
    pub fn load_from_playlist(&mut self, index: usize) -> Result<(), PlayerError> {
        self.load_entry(index, true)
    }

    fn load_entry(&mut self, index: usize, autoplay: bool) -> Result<(), PlayerError> {
        let path = self.playlist.get(index).cloned().ok_or(PlayerError::IndexOutOfRange {
            index,
            len: self.playlist.len(),
        })?;
        let media = self.open(&path)?;
        self.install(media, index, autoplay);
        Ok(())
    }

    fn install(&mut self, media: Box<dyn MediaSource>, index: usize, autoplay: bool) {
        info!(
            "Loaded {} ({} frames @ {:.2} fps)",
            self.playlist[index].display(),
            media.total_frame_count(),
            media.fps()
        );
        self.media = Some(media);
        self.current_index = Some(index);
        self.is_playing = autoplay;
        self.finished = false;
    }

    /// Appends new paths, skipping ones already present. When nothing is
    /// selected (an empty playlist, or an earlier auto-load that failed), the
    /// first added entry is loaded paused. Returns how many entries were added.
    pub fn add_to_playlist<I, P>(&mut self, paths: I) -> Result<usize, PlayerError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let first_new = self.playlist.len();
        let mut added = 0;
        for path in paths {
            let path = path.into();
            if self.playlist.contains(&path) {
                continue;
            }
            self.playlist.push(path);
            added += 1;
        }

        if self.current_index.is_none() && added > 0 {
            self.load_entry(first_new, false)?;
        }
        Ok(added)
    }

    /// Drops the media handle. The playlist is kept.
    pub fn release(&mut self) {
        if self.media.take().is_some() {
            info!("Released media handle");
        }
        self.current_index = None;
        self.is_playing = false;
    }

    // ── transport ───────────────────────────────────────────────────────

    fn media_mut(&mut self) -> Result<&mut Box<dyn MediaSource>, PlayerError> {
        self.media.as_mut().ok_or(PlayerError::NoMediaLoaded)
    }

    pub fn play(&mut self) -> Result<(), PlayerError> {
        self.media_mut()?;
        self.is_playing = true;
        self.finished = false;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlayerError> {
        self.media_mut()?;
        self.is_playing = false;
        Ok(())
    }

    pub fn toggle_play(&mut self) -> Result<(), PlayerError> {
        if self.is_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn toggle_mute(&mut self) -> Result<(), PlayerError> {
        self.media_mut()?;
        self.is_muted = !self.is_muted;
        Ok(())
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    fn seek_step(&self) -> usize {
        (self.fps() * self.seek_step_secs).max(0.0) as usize
    }

    pub fn forward(&mut self) -> Result<(), PlayerError> {
        let step = self.seek_step();
        let media = self.media_mut()?;
        let target = media.current_frame_index().saturating_add(step);
        seek_clamped(media, target);
        Ok(())
    }

    pub fn rewind(&mut self) -> Result<(), PlayerError> {
        let step = self.seek_step();
        let media = self.media_mut()?;
        let target = media.current_frame_index().saturating_sub(step);
        seek_clamped(media, target);
        Ok(())
    }

    /// Back to the first frame and playing. One frame is read and thrown away
    /// so a stale decoded frame is not shown.
    pub fn restart(&mut self) -> Result<(), PlayerError> {
        let media = self.media_mut()?;
        media.seek(0);
        let _ = media.read_next_frame();
        self.is_playing = true;
        self.finished = false;
        Ok(())
    }

    pub fn seek_frame(&mut self, frame_index: usize) -> Result<(), PlayerError> {
        seek_clamped(self.media_mut()?, frame_index);
        Ok(())
    }

    /// `ratio` is clamped into [0, 1] before being mapped onto the frame range.
    pub fn seek_ratio(&mut self, ratio: f64) -> Result<(), PlayerError> {
        let media = self.media_mut()?;
        let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
        let target = (ratio * media.total_frame_count() as f64).round() as usize;
        seek_clamped(media, target);
        Ok(())
    }

    // ── playlist navigation ─────────────────────────────────────────────

    /// Moves to the next entry. A manual advance (`auto == false`) wraps to
    /// the first entry; an end-of-media advance stops on the last one.
    pub fn play_next(&mut self, auto: bool) -> Result<(), PlayerError> {
        if self.playlist.is_empty() {
            return Err(PlayerError::EmptyPlaylist);
        }

        let next = match self.current_index {
            None => 0,
            Some(i) if i + 1 < self.playlist.len() => i + 1,
            Some(_) if auto => {
                info!("End of playlist");
                self.is_playing = false;
                self.finished = true;
                return Ok(());
            }
            Some(_) => 0,
        };
        self.load_from_playlist(next)
    }

    /// Moves to the previous entry, wrapping to the last one.
    pub fn play_previous(&mut self) -> Result<(), PlayerError> {
        let len = self.playlist.len();
        if len == 0 {
            return Err(PlayerError::EmptyPlaylist);
        }

        let previous = match self.current_index {
            Some(i) if i > 0 => i - 1,
            _ => len - 1,
        };
        self.load_from_playlist(previous)
    }

    /// Pulls the next frame while playing. At end of media this advances the
    /// playlist without wrapping.
    pub fn advance(&mut self) -> Result<Option<DynamicImage>, PlayerError> {
        if !self.is_playing {
            return Ok(None);
        }
        let Some(media) = self.media.as_mut() else {
            self.is_playing = false;
            return Ok(None);
        };

        match media.read_next_frame() {
            Some(frame) => Ok(Some(frame)),
            None => {
                let result = self.play_next(true);
                if result.is_err() {
                    self.is_playing = false;
                    self.finished = true;
                }
                result.map(|_| None)
            }
        }
    }
}

fn seconds(frames: usize, fps: f64) -> f64 {
    if fps > 0.0 { frames as f64 / fps } else { 0.0 }
}

fn seek_clamped(media: &mut Box<dyn MediaSource>, frame_index: usize) {
    let last = media.total_frame_count().saturating_sub(1);
    media.seek(frame_index.min(last));
}
