// src/tracking.rs - Hand landmarks, finger pose classification and landmark sources
use anyhow::Result;
use image::DynamicImage;
use nalgebra::Vector3;
use serde::Serialize;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::config::{LandmarkSourceKind, PlayerConfig};
use crate::mediapipe_bridge::MediaPipeWrapper;
use crate::video::Webcam;

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;
pub const LANDMARK_COUNT: usize = 21;

/// Bone pairs used when drawing a hand skeleton.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC), (THUMB_CMC, THUMB_MCP), (THUMB_MCP, THUMB_IP), (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP), (INDEX_MCP, INDEX_PIP), (INDEX_PIP, INDEX_DIP), (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP), (MIDDLE_MCP, MIDDLE_PIP), (MIDDLE_PIP, MIDDLE_DIP), (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP), (RING_MCP, RING_PIP), (RING_PIP, RING_DIP), (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP), (PINKY_MCP, PINKY_PIP), (PINKY_PIP, PINKY_DIP), (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

/// One detected hand: 21 points in normalized image coordinates
/// (x to the right, y increasing downward, both in 0..1).
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: [Vector3<f64>; LANDMARK_COUNT],
}

impl HandLandmarks {
    /// Builds a landmark set from detector output. Returns `None` when the
    /// detector produced fewer than 21 points.
    pub fn from_points(points: &[Vector3<f64>]) -> Option<Self> {
        if points.len() < LANDMARK_COUNT {
            return None;
        }
        let mut set = [Vector3::zeros(); LANDMARK_COUNT];
        set.copy_from_slice(&points[..LANDMARK_COUNT]);
        Some(Self { points: set })
    }

    pub fn from_raw(raw: &[[f64; 3]]) -> Option<Self> {
        let points: Vec<Vector3<f64>> = raw.iter()
            .map(|lm| Vector3::new(lm[0], lm[1], lm[2]))
            .collect();
        Self::from_points(&points)
    }

    /// Synthesizes an upright right hand holding the given pose.
    pub fn posed(fingers: FingerVector) -> Self {
        let mut points = [Vector3::zeros(); LANDMARK_COUNT];
        points[WRIST] = Vector3::new(0.5, 0.85, 0.0);

        // Thumb folds sideways, so only x moves
        let [thumb, index, middle, ring, pinky] = fingers.extended();
        points[THUMB_CMC] = Vector3::new(0.44, 0.78, 0.0);
        points[THUMB_MCP] = Vector3::new(0.40, 0.72, 0.0);
        points[THUMB_IP] = Vector3::new(0.37, 0.66, 0.0);
        points[THUMB_TIP] = Vector3::new(if thumb { 0.31 } else { 0.42 }, 0.62, 0.0);

        let columns = [
            (INDEX_MCP, 0.43, index),
            (MIDDLE_MCP, 0.50, middle),
            (RING_MCP, 0.56, ring),
            (PINKY_MCP, 0.62, pinky),
        ];
        for (mcp, x, extended) in columns {
            points[mcp] = Vector3::new(x, 0.62, 0.0);
            points[mcp + 1] = Vector3::new(x, 0.50, 0.0);
            if extended {
                points[mcp + 2] = Vector3::new(x, 0.42, 0.0);
                points[mcp + 3] = Vector3::new(x, 0.35, 0.0);
            } else {
                points[mcp + 2] = Vector3::new(x, 0.55, 0.0);
                points[mcp + 3] = Vector3::new(x, 0.58, 0.0);
            }
        }

        Self { points }
    }

    pub fn point(&self, index: usize) -> &Vector3<f64> {
        &self.points[index]
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }
}

/// Extended (true) or curled (false) state of thumb, index, middle, ring and pinky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerVector([bool; 5]);

impl FingerVector {
    pub const fn new(extended: [bool; 5]) -> Self {
        Self(extended)
    }

    /// Any non-zero entry counts as extended.
    pub const fn from_bits(bits: [u8; 5]) -> Self {
        Self([bits[0] != 0, bits[1] != 0, bits[2] != 0, bits[3] != 0, bits[4] != 0])
    }

    pub fn bits(&self) -> [u8; 5] {
        self.0.map(u8::from)
    }

    pub fn extended(&self) -> [bool; 5] {
        self.0
    }

    /// Every one of the 32 possible poses, thumb as the most significant bit.
    pub fn all() -> impl Iterator<Item = FingerVector> {
        (0u8..32).map(|n| {
            FingerVector([
                n & 0b10000 != 0,
                n & 0b01000 != 0,
                n & 0b00100 != 0,
                n & 0b00010 != 0,
                n & 0b00001 != 0,
            ])
        })
    }
}

impl fmt::Display for FingerVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.bits() {
            write!(f, "{}", bit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GestureSymbol {
    Play,
    Pause,
    Forward,
    Rewind,
    MuteToggle,
    Restart,
    Next,
    Previous,
    /// A hand was seen but its pose matches nothing in the table.
    Unknown,
    /// No hand this tick.
    None,
}

impl GestureSymbol {
    pub const ACTIONABLE: [GestureSymbol; 8] = [
        GestureSymbol::Play,
        GestureSymbol::Pause,
        GestureSymbol::Forward,
        GestureSymbol::Rewind,
        GestureSymbol::MuteToggle,
        GestureSymbol::Restart,
        GestureSymbol::Next,
        GestureSymbol::Previous,
    ];

    pub fn is_actionable(self) -> bool {
        !matches!(self, GestureSymbol::Unknown | GestureSymbol::None)
    }

    /// The pose that produces this symbol, if any.
    pub fn pose(self) -> Option<FingerVector> {
        let bits = match self {
            GestureSymbol::Play => [0, 1, 1, 1, 1],
            GestureSymbol::Pause => [0, 0, 0, 0, 0],
            GestureSymbol::Forward => [0, 1, 0, 0, 0],
            GestureSymbol::Rewind => [1, 0, 0, 0, 0],
            GestureSymbol::MuteToggle => [0, 1, 1, 0, 0],
            GestureSymbol::Restart => [0, 1, 0, 0, 1],
            GestureSymbol::Next => [0, 1, 1, 1, 0],
            GestureSymbol::Previous => [0, 0, 1, 1, 1],
            GestureSymbol::Unknown | GestureSymbol::None => return None,
        };
        Some(FingerVector::from_bits(bits))
    }

    pub fn label(self) -> &'static str {
        match self {
            GestureSymbol::Play => "Play",
            GestureSymbol::Pause => "Pause",
            GestureSymbol::Forward => "Forward",
            GestureSymbol::Rewind => "Rewind",
            GestureSymbol::MuteToggle => "Mute/Unmute",
            GestureSymbol::Restart => "Restart",
            GestureSymbol::Next => "Next",
            GestureSymbol::Previous => "Previous",
            GestureSymbol::Unknown => "Unknown",
            GestureSymbol::None => "No hand",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            GestureSymbol::Play => "Open palm",
            GestureSymbol::Pause => "Closed fist",
            GestureSymbol::Forward => "Index finger",
            GestureSymbol::Rewind => "Thumb out",
            GestureSymbol::MuteToggle => "Peace sign",
            GestureSymbol::Restart => "Rock sign",
            GestureSymbol::Next => "Three fingers",
            GestureSymbol::Previous => "Middle, ring, pinky",
            GestureSymbol::Unknown | GestureSymbol::None => "",
        }
    }
}

impl fmt::Display for GestureSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Reads which fingers are extended.
///
/// The thumb is compared horizontally: on the mirrored camera image an
/// extended thumb tip sits left of its IP joint. The other four fingers are
/// extended when the tip is above (smaller y than) the PIP joint.
pub fn classify(hand: &HandLandmarks) -> FingerVector {
    let thumb = hand.point(THUMB_TIP).x < hand.point(THUMB_IP).x;
    let up = |tip: usize, pip: usize| hand.point(tip).y < hand.point(pip).y;

    FingerVector::new([
        thumb,
        up(INDEX_TIP, INDEX_PIP),
        up(MIDDLE_TIP, MIDDLE_PIP),
        up(RING_TIP, RING_PIP),
        up(PINKY_TIP, PINKY_PIP),
    ])
}

/// Exact-match lookup; anything outside the table is `Unknown`.
pub fn name_gesture(fingers: FingerVector) -> GestureSymbol {
    match fingers.bits() {
        [0, 1, 1, 1, 1] => GestureSymbol::Play,
        [0, 0, 0, 0, 0] => GestureSymbol::Pause,
        [0, 1, 0, 0, 0] => GestureSymbol::Forward,
        [1, 0, 0, 0, 0] => GestureSymbol::Rewind,
        [0, 1, 1, 0, 0] => GestureSymbol::MuteToggle,
        [0, 1, 0, 0, 1] => GestureSymbol::Restart,
        [0, 1, 1, 1, 0] => GestureSymbol::Next,
        [0, 0, 1, 1, 1] => GestureSymbol::Previous,
        _ => GestureSymbol::Unknown,
    }
}

/// What the classifier saw on one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub symbol: GestureSymbol,
    pub fingers: Option<FingerVector>,
    pub hand: Option<HandLandmarks>,
}

impl Observation {
    pub fn none() -> Self {
        Self {
            symbol: GestureSymbol::None,
            fingers: None,
            hand: None,
        }
    }
}

/// Classifies every hand in order; the last one processed wins.
pub fn observe_hands(hands: Vec<HandLandmarks>) -> Observation {
    let mut observation = Observation::none();
    for hand in hands {
        let fingers = classify(&hand);
        observation = Observation {
            symbol: name_gesture(fingers),
            fingers: Some(fingers),
            hand: Some(hand),
        };
    }
    observation
}

/// Produces the hands visible in the next captured frame.
pub trait LandmarkSource {
    fn next_landmarks(&mut self) -> Result<Vec<HandLandmarks>>;

    /// The camera frame behind the last `next_landmarks` call, handed over by value.
    fn take_preview(&mut self) -> Option<DynamicImage> {
        None
    }

    fn describe(&self) -> String;
}

pub struct PoseClassifier {
    source: Box<dyn LandmarkSource>,
}

impl PoseClassifier {
    pub fn new(source: Box<dyn LandmarkSource>) -> Self {
        info!("Pose classifier using {}", source.describe());
        Self { source }
    }

    /// Pulls one set of hands from the source and names the pose. A failing
    /// source counts as "no hand" for this tick.
    pub fn observe(&mut self) -> Observation {
        match self.source.next_landmarks() {
            Ok(hands) => {
                let observation = observe_hands(hands);
                if observation.symbol == GestureSymbol::Unknown {
                    if let Some(fingers) = observation.fingers {
                        debug!("Unrecognized pose {}", fingers);
                    }
                }
                observation
            }
            Err(e) => {
                debug!("Landmark source unavailable this tick: {:#}", e);
                Observation::none()
            }
        }
    }

    pub fn take_preview(&mut self) -> Option<DynamicImage> {
        self.source.take_preview()
    }

    pub fn source_name(&self) -> String {
        self.source.describe()
    }
}

/// Shared slot the UI writes the currently held simulated pose into.
#[derive(Debug, Clone, Default)]
pub struct PoseHandle(Rc<Cell<Option<FingerVector>>>);

impl PoseHandle {
    pub fn hold(&self, pose: Option<FingerVector>) {
        self.0.set(pose);
    }

    pub fn held(&self) -> Option<FingerVector> {
        self.0.get()
    }
}

/// Keyboard-driven stand-in for a camera: emits a synthetic hand for
/// whatever pose is currently held.
pub struct SimulatedHands {
    pose: PoseHandle,
}

impl SimulatedHands {
    pub fn new(pose: PoseHandle) -> Self {
        Self { pose }
    }
}

impl LandmarkSource for SimulatedHands {
    fn next_landmarks(&mut self) -> Result<Vec<HandLandmarks>> {
        Ok(self.pose.held().map(HandLandmarks::posed).into_iter().collect())
    }

    fn describe(&self) -> String {
        "simulated hands (keys 1-9)".to_string()
    }
}

/// Webcam frames run through the hand detector.
pub struct CameraHands {
    webcam: Webcam,
    detector: MediaPipeWrapper,
    preview: Option<DynamicImage>,
}

impl CameraHands {
    pub fn new(webcam: Webcam, detector: MediaPipeWrapper) -> Self {
        Self {
            webcam,
            detector,
            preview: None,
        }
    }
}

impl LandmarkSource for CameraHands {
    fn next_landmarks(&mut self) -> Result<Vec<HandLandmarks>> {
        let frame = self.webcam.read_frame()?;
        let hands = self.detector.process(&frame)?;
        self.preview = Some(frame);
        Ok(hands)
    }

    fn take_preview(&mut self) -> Option<DynamicImage> {
        self.preview.take()
    }

    fn describe(&self) -> String {
        format!("camera {}", self.webcam.index())
    }
}

/// Builds the configured landmark source. A camera that cannot be opened
/// falls back to simulated hands; the pose handle is returned whenever the
/// simulator is in use.
pub fn open_landmark_source(config: &PlayerConfig) -> (Box<dyn LandmarkSource>, Option<PoseHandle>) {
    if config.landmark_source == LandmarkSourceKind::Camera {
        let camera = Webcam::open(config.camera_index)
            .and_then(|webcam| Ok(CameraHands::new(webcam, MediaPipeWrapper::new(config.max_hands)?)));
        match camera {
            Ok(hands) => return (Box::new(hands), None),
            Err(e) => warn!("Camera unavailable, using simulated hands: {:#}", e),
        }
    }

    let pose = PoseHandle::default();
    (Box::new(SimulatedHands::new(pose.clone())), Some(pose))
}

/// Rolling timing of the tick loop.
#[derive(Debug, Clone, Default)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    frame_times: VecDeque<f32>,
}

impl PerformanceMetrics {
    const WINDOW: usize = 30;

    pub fn new() -> Self {
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            frame_times: VecDeque::with_capacity(Self::WINDOW),
        }
    }

    pub fn record(&mut self, elapsed_secs: f32) {
        self.frame_times.push_front(elapsed_secs);
        if self.frame_times.len() > Self::WINDOW {
            self.frame_times.pop_back();
        }

        self.avg_processing_time = self.frame_times.iter().sum::<f32>()
            / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed script of landmark results, one per tick.
    pub(crate) struct ScriptedHands {
        pub script: VecDeque<Result<Vec<HandLandmarks>>>,
    }

    impl ScriptedHands {
        pub fn poses(poses: &[Option<GestureSymbol>]) -> Self {
            let script = poses.iter()
                .map(|p| Ok(p.and_then(|s| s.pose()).map(HandLandmarks::posed).into_iter().collect()))
                .collect();
            Self { script }
        }
    }

    impl LandmarkSource for ScriptedHands {
        fn next_landmarks(&mut self) -> Result<Vec<HandLandmarks>> {
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[test]
    fn known_patterns_match_table() {
        let table = [
            ([0, 1, 1, 1, 1], GestureSymbol::Play),
            ([0, 0, 0, 0, 0], GestureSymbol::Pause),
            ([0, 1, 0, 0, 0], GestureSymbol::Forward),
            ([1, 0, 0, 0, 0], GestureSymbol::Rewind),
            ([0, 1, 1, 0, 0], GestureSymbol::MuteToggle),
            ([0, 1, 0, 0, 1], GestureSymbol::Restart),
            ([0, 1, 1, 1, 0], GestureSymbol::Next),
            ([0, 0, 1, 1, 1], GestureSymbol::Previous),
        ];
        for (bits, symbol) in table {
            assert_eq!(name_gesture(FingerVector::from_bits(bits)), symbol, "{:?}", bits);
        }
    }

    #[test]
    fn remaining_patterns_are_unknown() {
        let all: Vec<_> = FingerVector::all().collect();
        assert_eq!(all.len(), 32);

        let unknown = all.iter()
            .filter(|fv| name_gesture(**fv) == GestureSymbol::Unknown)
            .count();
        assert_eq!(unknown, 24);
        assert!(all.iter().all(|fv| name_gesture(*fv) != GestureSymbol::None));
    }

    #[test]
    fn pose_table_round_trips_through_landmarks() {
        for symbol in GestureSymbol::ACTIONABLE {
            let pose = symbol.pose().unwrap();
            let hand = HandLandmarks::posed(pose);
            assert_eq!(classify(&hand), pose);
            assert_eq!(name_gesture(classify(&hand)), symbol);
        }
    }

    #[test]
    fn thumb_uses_horizontal_comparison() {
        let mut hand = HandLandmarks::posed(FingerVector::from_bits([0, 0, 0, 0, 0]));
        // Raising the thumb tip vertically must not count as extended
        hand.points[THUMB_TIP].y = 0.1;
        assert_eq!(classify(&hand).bits()[0], 0);

        hand.points[THUMB_TIP].x = hand.points[THUMB_IP].x - 0.05;
        assert_eq!(classify(&hand).bits()[0], 1);
    }

    #[test]
    fn finger_at_same_height_as_pip_is_curled() {
        let mut hand = HandLandmarks::posed(FingerVector::from_bits([0, 1, 0, 0, 0]));
        hand.points[INDEX_TIP].y = hand.points[INDEX_PIP].y;
        assert_eq!(classify(&hand).bits()[1], 0);
    }

    #[test]
    fn no_hands_is_none() {
        let observation = observe_hands(Vec::new());
        assert_eq!(observation.symbol, GestureSymbol::None);
        assert!(observation.fingers.is_none());
    }

    #[test]
    fn last_hand_wins() {
        let hands = vec![
            HandLandmarks::posed(GestureSymbol::Play.pose().unwrap()),
            HandLandmarks::posed(GestureSymbol::Pause.pose().unwrap()),
        ];
        assert_eq!(observe_hands(hands).symbol, GestureSymbol::Pause);
    }

    #[test]
    fn short_detector_output_is_rejected() {
        let raw = vec![[0.5, 0.5, 0.0]; 12];
        assert!(HandLandmarks::from_raw(&raw).is_none());
        let raw = vec![[0.5, 0.5, 0.0]; 21];
        assert!(HandLandmarks::from_raw(&raw).is_some());
    }

    #[test]
    fn failing_source_reads_as_no_hand() {
        let mut script = VecDeque::new();
        script.push_back(Err(anyhow::anyhow!("camera unplugged")));
        let mut classifier = PoseClassifier::new(Box::new(ScriptedHands { script }));
        assert_eq!(classifier.observe().symbol, GestureSymbol::None);
    }

    #[test]
    fn simulated_hands_follow_held_pose() {
        let pose = PoseHandle::default();
        let mut classifier = PoseClassifier::new(Box::new(SimulatedHands::new(pose.clone())));
        assert_eq!(classifier.observe().symbol, GestureSymbol::None);

        pose.hold(GestureSymbol::Next.pose());
        assert_eq!(classifier.observe().symbol, GestureSymbol::Next);

        pose.hold(Some(FingerVector::from_bits([1, 1, 1, 1, 1])));
        assert_eq!(classifier.observe().symbol, GestureSymbol::Unknown);
    }

    #[test]
    fn simulated_config_hands_out_pose_handle() {
        let mut config = PlayerConfig::default();
        config.landmark_source = LandmarkSourceKind::Simulated;

        let (source, pose) = open_landmark_source(&config);
        let pose = pose.unwrap();
        let mut classifier = PoseClassifier::new(source);
        pose.hold(GestureSymbol::Pause.pose());
        assert_eq!(classifier.observe().symbol, GestureSymbol::Pause);
    }

    #[test]
    fn finger_vector_display() {
        assert_eq!(FingerVector::from_bits([0, 1, 1, 0, 0]).to_string(), "01100");
    }

    #[test]
    fn metrics_average_window() {
        let mut metrics = PerformanceMetrics::new();
        metrics.record(0.01);
        metrics.record(0.03);
        assert!((metrics.avg_processing_time - 0.02).abs() < 1e-6);
        assert!((metrics.avg_fps - 50.0).abs() < 1e-3);
    }
}
