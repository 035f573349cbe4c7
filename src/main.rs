// src/main.rs
use anyhow::Result;
use eframe::egui;
use gesture_player::app::GesturePlayerApp;
use gesture_player::config::PlayerConfig;
use gesture_player::controller::{run_loop, GestureController};
use gesture_player::player::Player;
use gesture_player::tracking::{open_landmark_source, PoseClassifier};
use gesture_player::video::{list_cameras, FfmpegOpener};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use tracing::{error, info, warn};

fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = PlayerConfig::load();

    let cameras = list_cameras();
    info!("Found {} camera(s)", cameras.len());
    for (i, name) in cameras.iter().enumerate() {
        info!("  [{}] {}", i, name);
    }

    let mut args = std::env::args().skip(1);
    let result = match args.next().as_deref() {
        Some("--headless") => run_headless(config, args.map(PathBuf::from).collect()),
        _ => run_gui(config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Plays the given files through the gesture pipeline without a window,
/// until the playlist finishes.
fn run_headless(config: PlayerConfig, files: Vec<PathBuf>) -> Result<()> {
    if files.is_empty() {
        anyhow::bail!("usage: gesture_player --headless <video>...");
    }

    let (source, simulated) = open_landmark_source(&config);
    if simulated.is_some() {
        warn!("Headless mode without a camera; gestures will not fire");
    }

    let player = Player::new(Box::new(FfmpegOpener), &config);
    let mut controller = GestureController::new(PoseClassifier::new(source), player, &config);

    // The first entry is loaded paused as soon as it joins the empty playlist
    controller.player_mut().add_to_playlist(files)?;
    controller.player_mut().play()?;

    let running = AtomicBool::new(true);
    let ticks = run_loop(&mut controller, config.tick_interval(), &running, true);
    info!("Headless session finished after {} ticks", ticks);

    if !controller.log().entries().is_empty() {
        let path = controller.log().export_csv()?;
        info!("Gesture log written to {}", path.display());
    }
    Ok(())
}

fn run_gui(config: PlayerConfig) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1000.0, 700.0]),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "Gesture Player",
        options,
        Box::new(move |cc| {
            configure_fonts(&cc.egui_ctx, &config);
            cc.egui_ctx.set_visuals(create_visuals());

            Box::new(GesturePlayerApp::new(cc, config))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Error running application: {}", e))
}

fn configure_fonts(ctx: &egui::Context, config: &PlayerConfig) {
    let Some(font_path) = config.font_path.as_ref() else {
        return;
    };

    let font_data = match std::fs::read(font_path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Could not load font {}: {}", font_path.display(), e);
            return;
        }
    };

    let mut fonts = egui::FontDefinitions::default();
    fonts.font_data.insert(
        "Custom".to_owned(),
        egui::FontData::from_owned(font_data),
    );
    fonts.families.entry(egui::FontFamily::Proportional)
        .or_default()
        .insert(0, "Custom".to_owned());

    ctx.set_fonts(fonts);
}

fn create_visuals() -> egui::Visuals {
    let mut visuals = egui::Visuals::dark();

    visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(30, 30, 35);
    visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(45, 45, 52);
    visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(55, 55, 65);
    visuals.widgets.active.bg_fill = egui::Color32::from_rgb(70, 130, 240);

    visuals.widgets.noninteractive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
    visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
    visuals.widgets.active.rounding = egui::Rounding::same(8.0);

    visuals.window_rounding = egui::Rounding::same(12.0);
    visuals.menu_rounding = egui::Rounding::same(8.0);

    visuals
}
