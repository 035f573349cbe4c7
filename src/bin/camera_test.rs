use gesture_player::config::PlayerConfig;
use gesture_player::mediapipe_bridge::MediaPipeWrapper;
use gesture_player::tracking::{CameraHands, PoseClassifier};
use gesture_player::video::{list_cameras, Webcam};

const PROBE_FRAMES: usize = 30;

fn main() {
    tracing_subscriber::fmt::init();

    println!("Testing camera access...\n");

    let cameras = list_cameras();
    println!("Found {} camera(s):", cameras.len());
    for (i, name) in cameras.iter().enumerate() {
        println!("  [{}] {}", i, name);
    }

    let config = PlayerConfig::load();
    let mut webcam = match Webcam::open(config.camera_index) {
        Ok(webcam) => {
            println!("✓ Camera {} opened", config.camera_index);
            webcam
        }
        Err(e) => {
            println!("✗ Failed to open camera: {:#}", e);
            println!("\nPossible causes:");
            println!("1. Camera is being used by another app");
            println!("2. Camera permissions not granted");
            println!("3. No camera connected");
            std::process::exit(1);
        }
    };

    match webcam.read_frame() {
        Ok(frame) => println!("✓ Frame captured successfully ({}x{})", frame.width(), frame.height()),
        Err(e) => {
            println!("✗ Failed to capture frame: {:#}", e);
            std::process::exit(1);
        }
    }

    let detector = match MediaPipeWrapper::new(config.max_hands) {
        Ok(detector) => detector,
        Err(e) => {
            println!("✗ Hand detector unavailable: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut classifier = PoseClassifier::new(Box::new(CameraHands::new(webcam, detector)));
    println!("\nClassifying {} frames, hold a pose in front of the camera:", PROBE_FRAMES);
    for i in 0..PROBE_FRAMES {
        let observation = classifier.observe();
        let fingers = observation.fingers.map(|f| f.to_string()).unwrap_or_else(|| "-----".to_string());
        println!("  frame {:2}: {} {}", i + 1, fingers, observation.symbol.label());
    }
}
