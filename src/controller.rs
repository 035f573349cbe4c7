// src/controller.rs - Per-tick pipeline: classify, debounce, dispatch, advance playback
use image::DynamicImage;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::PlayerConfig;
use crate::data::GestureLog;
use crate::debounce::DebounceGate;
use crate::dispatch::{dispatch, Command, Outcome};
use crate::player::{Player, PlayerError};
use crate::tracking::{Observation, PerformanceMetrics, PoseClassifier};

/// Everything one tick produced. Frames are handed over by value to whoever
/// renders them.
#[derive(Debug)]
pub struct TickReport {
    pub observation: Observation,
    /// The command a gesture fired this tick, if the gate let it through.
    pub fired: Option<(Command, Outcome)>,
    pub video_frame: Option<DynamicImage>,
    pub preview: Option<DynamicImage>,
    pub playback_error: Option<PlayerError>,
}

pub struct GestureController {
    classifier: PoseClassifier,
    gate: DebounceGate,
    player: Player,
    log: GestureLog,
    metrics: PerformanceMetrics,
    status: String,
    running: bool,
}

impl GestureController {
    pub fn new(classifier: PoseClassifier, player: Player, config: &PlayerConfig) -> Self {
        Self {
            classifier,
            gate: DebounceGate::new(config.cooldown()),
            player,
            log: GestureLog::new(&config.output_directory, None),
            metrics: PerformanceMetrics::new(),
            status: "Ready - add videos to the playlist".to_string(),
            running: true,
        }
    }

    /// Runs one classify → admit → dispatch pass, then pulls the next video
    /// frame. `now` is seconds since the session started.
    pub fn on_tick(&mut self, now: f64) -> TickReport {
        let start = Instant::now();

        let observation = self.classifier.observe();
        let preview = self.classifier.take_preview();

        let mut fired = None;
        if self.gate.admit(observation.symbol, now) {
            if let Some(command) = Command::from_gesture(observation.symbol) {
                info!("Gesture {} -> {}", observation.symbol, command);
                let outcome = dispatch(&mut self.player, command);
                self.log.record(
                    now,
                    observation.symbol,
                    observation.fingers,
                    command,
                    &outcome,
                    self.player.position(),
                );
                self.update_status(command, &outcome);
                fired = Some((command, outcome));
            }
        }

        let (video_frame, playback_error) = match self.player.advance() {
            Ok(frame) => (frame, None),
            Err(e) => {
                warn!("Playback stopped: {}", e);
                self.status = e.to_string();
                (None, Some(e))
            }
        };

        self.metrics.record(start.elapsed().as_secs_f32());

        TickReport {
            observation,
            fired,
            video_frame,
            preview,
            playback_error,
        }
    }

    /// Buttons, sliders and keyboard shortcuts come through here.
    pub fn on_ui_command(&mut self, command: Command) -> Outcome {
        debug!("UI command {}", command);
        let outcome = dispatch(&mut self.player, command);
        self.update_status(command, &outcome);
        outcome
    }

    fn update_status(&mut self, command: Command, outcome: &Outcome) {
        self.status = match outcome.message() {
            None => format!("{}", command),
            Some(message) => message,
        };
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// For playlist edits and loads, which report their own errors.
    pub fn player_mut(&mut self) -> &mut Player {
        &mut self.player
    }

    pub fn gate(&self) -> &DebounceGate {
        &self.gate
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.gate.set_cooldown(cooldown);
    }

    pub fn log(&self) -> &GestureLog {
        &self.log
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn source_name(&self) -> String {
        self.classifier.source_name()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Releases the media handle. Call once the last tick has finished.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.player.release();
        info!("Session ended after {} gestures", self.log.entries().len());
    }
}

/// Drives `controller` at a fixed interval until `running` is cleared or,
/// with `stop_when_finished`, until the playlist has played out. A paused
/// player keeps ticking so gestures can resume it. Returns the tick count.
pub fn run_loop(
    controller: &mut GestureController,
    interval: Duration,
    running: &AtomicBool,
    stop_when_finished: bool,
) -> u64 {
    let started = Instant::now();
    let mut ticks = 0u64;

    while running.load(Ordering::SeqCst) {
        let tick_start = Instant::now();
        let now = started.elapsed().as_secs_f64();
        let tick = panic::catch_unwind(AssertUnwindSafe(|| controller.on_tick(now)));
        ticks += 1;

        match tick {
            Ok(report) => {
                if let Some(e) = report.playback_error {
                    warn!("Tick {}: {}", ticks, e);
                }
            }
            // A panicking tick is dropped; the next one starts fresh
            Err(_) => error!("Tick {} panicked, skipping it", ticks),
        }

        let player = controller.player();
        if stop_when_finished && (player.is_finished() || !player.is_loaded()) {
            info!("Playlist finished, stopping driver");
            break;
        }

        if let Some(remaining) = interval.checked_sub(tick_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    controller.shutdown();
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::tests::{player_with, FakeOpener};
    use crate::tracking::tests::ScriptedHands;
    use crate::tracking::{FingerVector, GestureSymbol, HandLandmarks, LandmarkSource};
    use std::collections::VecDeque;

    fn with_source(source: Box<dyn LandmarkSource>, opener: FakeOpener) -> GestureController {
        let mut config = PlayerConfig::default();
        config.gesture_cooldown_secs = 1.2;
        config.output_directory = std::env::temp_dir();
        GestureController::new(PoseClassifier::new(source), player_with(opener), &config)
    }

    fn controller(poses: &[Option<GestureSymbol>], opener: FakeOpener) -> GestureController {
        with_source(Box::new(ScriptedHands::poses(poses)), opener)
    }

    /// Panics on its first read, then reports no hands.
    struct PanicOnceHands {
        calls: usize,
    }

    impl LandmarkSource for PanicOnceHands {
        fn next_landmarks(&mut self) -> anyhow::Result<Vec<HandLandmarks>> {
            self.calls += 1;
            if self.calls == 1 {
                panic!("detector crashed");
            }
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "panics once".to_string()
        }
    }

    fn fired(report: &TickReport) -> Option<Command> {
        report.fired.as_ref().map(|(command, _)| *command)
    }

    #[test]
    fn held_play_fires_once_per_cooldown() {
        let play = Some(GestureSymbol::Play);
        let mut ctl = controller(&[play, play, play, play], FakeOpener::with_frames(1000));
        ctl.player_mut().add_to_playlist(["a.mp4"]).unwrap();

        assert_eq!(fired(&ctl.on_tick(0.0)), Some(Command::Play));
        assert!(ctl.player().is_playing());
        assert_eq!(fired(&ctl.on_tick(0.5)), None);
        assert_eq!(fired(&ctl.on_tick(1.0)), None);
        assert_eq!(fired(&ctl.on_tick(1.3)), Some(Command::Play));
        assert_eq!(ctl.log().entries().len(), 2);
    }

    #[test]
    fn play_gesture_without_media_is_logged_advisory() {
        let mut ctl = controller(&[Some(GestureSymbol::Play)], FakeOpener::with_frames(10));
        let report = ctl.on_tick(0.0);

        assert!(matches!(report.fired, Some((Command::Play, Outcome::Advisory(_)))));
        assert!(!ctl.player().is_playing());
        assert_eq!(ctl.status(), "no video loaded");
        assert_eq!(ctl.log().entries()[0].result, "no video loaded");
    }

    #[test]
    fn unknown_pose_and_missing_hand_fire_nothing() {
        let open_hand = HandLandmarks::posed(FingerVector::from_bits([1, 1, 1, 1, 1]));
        let hands = ScriptedHands {
            script: VecDeque::from(vec![Ok(vec![open_hand.clone()]), Ok(Vec::new()), Ok(vec![open_hand])]),
        };
        let mut ctl = with_source(Box::new(hands), FakeOpener::with_frames(10));
        ctl.player_mut().add_to_playlist(["a.mp4"]).unwrap();
        ctl.player_mut().play().unwrap();

        let unknown = ctl.on_tick(0.0);
        assert_eq!(unknown.observation.symbol, GestureSymbol::Unknown);
        assert!(unknown.fired.is_none());

        let missing = ctl.on_tick(2.0);
        assert_eq!(missing.observation.symbol, GestureSymbol::None);
        assert!(missing.fired.is_none());

        assert!(ctl.on_tick(4.0).fired.is_none());
        assert!(ctl.log().entries().is_empty());
        assert_eq!(ctl.gate().last_accepted(), None);
        assert!(ctl.player().is_playing());
    }

    #[test]
    fn playing_ticks_hand_out_frames() {
        let mut ctl = controller(&[Some(GestureSymbol::Play)], FakeOpener::with_frames(3));
        ctl.player_mut().add_to_playlist(["a.mp4"]).unwrap();

        let first = ctl.on_tick(0.0);
        assert!(first.video_frame.is_some());
        assert_eq!(ctl.player().position(), 1);
    }

    #[test]
    fn gesture_next_wraps_but_end_of_media_does_not() {
        let next = Some(GestureSymbol::Next);
        let mut ctl = controller(&[next, None, None, None], FakeOpener::with_frames(1));
        ctl.player_mut().add_to_playlist(["a.mp4", "b.mp4", "c.mp4"]).unwrap();
        ctl.player_mut().load_from_playlist(2).unwrap();
        ctl.player_mut().pause().unwrap();

        // NEXT on the last entry wraps to the first and starts playing it
        let report = ctl.on_tick(0.0);
        assert_eq!(fired(&report), Some(Command::Next));
        assert_eq!(ctl.player().current_index(), Some(0));
        assert!(report.video_frame.is_some());

        ctl.player_mut().load_from_playlist(2).unwrap();
        assert!(ctl.on_tick(0.1).video_frame.is_some());
        ctl.on_tick(0.2);
        assert!(!ctl.player().is_playing());
        assert_eq!(ctl.player().current_index(), Some(2));
    }

    #[test]
    fn ui_commands_share_dispatch() {
        let mut ctl = controller(&[], FakeOpener::with_frames(100));
        assert!(matches!(ctl.on_ui_command(Command::Play), Outcome::Advisory(_)));

        ctl.player_mut().add_to_playlist(["a.mp4"]).unwrap();
        assert!(ctl.on_ui_command(Command::TogglePlay).is_applied());
        assert!(ctl.player().is_playing());
        assert!(ctl.on_ui_command(Command::Seek(1.5)).is_applied());
        assert_eq!(ctl.player().position(), 99);
    }

    #[test]
    fn cleared_flag_runs_no_ticks() {
        let mut ctl = controller(&[Some(GestureSymbol::Play)], FakeOpener::with_frames(10));
        let running = AtomicBool::new(false);
        assert_eq!(run_loop(&mut ctl, Duration::ZERO, &running, false), 0);
        assert!(!ctl.is_running());
    }

    #[test]
    fn loop_stops_when_playlist_finishes() {
        let mut ctl = controller(&[], FakeOpener::with_frames(2));
        ctl.player_mut().add_to_playlist(["a.mp4", "b.mp4"]).unwrap();
        ctl.player_mut().load_from_playlist(0).unwrap();

        let running = AtomicBool::new(true);
        let ticks = run_loop(&mut ctl, Duration::ZERO, &running, true);
        // 2 frames of a, the hand-over tick, 2 frames of b, then the stop tick
        assert_eq!(ticks, 6);
        assert!(!ctl.player().is_loaded());
        assert_eq!(ctl.player().playlist().len(), 2);
    }

    #[test]
    fn pause_gesture_does_not_end_headless_session() {
        let mut ctl = controller(&[Some(GestureSymbol::Pause)], FakeOpener::with_frames(100));
        ctl.player_mut().add_to_playlist(["a.mp4", "b.mp4"]).unwrap();
        ctl.player_mut().play().unwrap();

        let running = AtomicBool::new(true);
        let ticks = std::thread::scope(|scope| {
            scope.spawn(|| {
                std::thread::sleep(Duration::from_millis(50));
                running.store(false, Ordering::SeqCst);
            });
            run_loop(&mut ctl, Duration::from_millis(1), &running, true)
        });

        assert!(ticks > 1, "stopped after {} ticks", ticks);
        assert_eq!(ctl.log().entries()[0].command, Command::Pause);
        assert!(!ctl.player().is_finished());
    }

    #[test]
    fn panicking_tick_does_not_stop_the_loop() {
        let mut ctl = with_source(Box::new(PanicOnceHands { calls: 0 }), FakeOpener::with_frames(1));
        ctl.player_mut().add_to_playlist(["a.mp4"]).unwrap();
        ctl.player_mut().play().unwrap();

        let running = AtomicBool::new(true);
        // the panicking tick, the single frame, then end of playlist
        assert_eq!(run_loop(&mut ctl, Duration::ZERO, &running, true), 3);
        assert!(!ctl.is_running());
    }
}
