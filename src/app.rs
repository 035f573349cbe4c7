// src/app.rs
use crate::config::{LandmarkSourceKind, PlayerConfig};
use crate::controller::GestureController;
use crate::dispatch::Command;
use crate::player::{PlaybackState, Player};
use crate::tracking::{self, FingerVector, GestureSymbol, Observation, PoseClassifier, PoseHandle};
use crate::ui::{format_time, UIComponents, VideoWidget};
use crate::video::{scan_media_dir, FfmpegOpener};

use eframe::egui;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

const POSE_KEYS: [egui::Key; 9] = [
    egui::Key::Num1,
    egui::Key::Num2,
    egui::Key::Num3,
    egui::Key::Num4,
    egui::Key::Num5,
    egui::Key::Num6,
    egui::Key::Num7,
    egui::Key::Num8,
    egui::Key::Num9,
];

/// Key 9 holds a pose that names no gesture.
fn pose_for_key(slot: usize) -> Option<FingerVector> {
    match GestureSymbol::ACTIONABLE.get(slot) {
        Some(symbol) => symbol.pose(),
        None => Some(FingerVector::from_bits([1, 1, 1, 1, 1])),
    }
}

pub struct GesturePlayerApp {
    // Core components
    controller: GestureController,
    simulated_pose: Option<PoseHandle>,
    started: Instant,
    last_tick: Option<Instant>,

    // Latest tick output
    observation: Observation,
    video: VideoWidget,
    preview: VideoWidget,

    // UI State
    show_settings: bool,
    show_about: bool,
    show_guide: bool,
    ui_components: UIComponents,

    // Settings
    config: PlayerConfig,
}

impl GesturePlayerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: PlayerConfig) -> Self {
        let (source, simulated_pose) = tracking::open_landmark_source(&config);
        let classifier = PoseClassifier::new(source);
        let player = Player::new(Box::new(FfmpegOpener), &config);
        let mut controller = GestureController::new(classifier, player, &config);
        if simulated_pose.is_some() {
            controller.set_status("No camera - hold keys 1-9 to simulate gestures");
        }

        Self {
            controller,
            simulated_pose,
            started: Instant::now(),
            last_tick: None,
            observation: Observation::none(),
            video: VideoWidget::new("video", "Open a video to start"),
            preview: VideoWidget::new("camera", "No camera preview"),
            show_settings: false,
            show_about: false,
            show_guide: true,
            ui_components: UIComponents::new(&cc.egui_ctx, config.logo_path.as_deref()),
            config,
        }
    }

    fn tick(&mut self, ctx: &egui::Context) {
        let now = Instant::now();
        if let Some(last) = self.last_tick {
            if now.duration_since(last) < self.config.tick_interval() {
                return;
            }
        }
        self.last_tick = Some(now);

        if let Some(pose) = &self.simulated_pose {
            let held = ctx.input(|i| POSE_KEYS.iter().position(|key| i.key_down(*key)));
            pose.hold(held.and_then(pose_for_key));
        }

        let report = self.controller.on_tick(self.started.elapsed().as_secs_f64());

        if let Some(frame) = report.video_frame {
            self.video.update_frame(ctx, frame);
        } else if !self.controller.player().is_loaded() {
            self.video.clear();
        }
        if let Some(frame) = report.preview {
            self.preview.update_frame(ctx, frame);
        }
        self.observation = report.observation;
    }

    fn run(&mut self, command: Command) {
        self.controller.on_ui_command(command);
    }

    fn video_filter(&self) -> Vec<&str> {
        self.config.media_extensions.iter().map(String::as_str).collect()
    }

    fn open_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Video", self.video_filter().as_slice())
            .pick_file()
        else {
            return;
        };

        match self.controller.player_mut().open_file(&path) {
            Ok(()) => {
                let name = file_label(&path);
                self.controller.set_status(format!("Opened {}", name));
            }
            Err(e) => self.controller.set_status(e.to_string()),
        }
    }

    fn add_files(&mut self) {
        if let Some(paths) = rfd::FileDialog::new()
            .add_filter("Video", self.video_filter().as_slice())
            .pick_files()
        {
            self.add_to_playlist(paths);
        }
    }

    fn add_folder(&mut self) {
        let Some(dir) = rfd::FileDialog::new().pick_folder() else {
            return;
        };

        match scan_media_dir(&dir, |p| self.config.is_media_file(p)) {
            Ok(paths) if paths.is_empty() => {
                self.controller.set_status(format!("No videos in {}", dir.display()));
            }
            Ok(paths) => self.add_to_playlist(paths),
            Err(e) => {
                warn!("Folder scan failed: {:#}", e);
                self.controller.set_status(format!("{:#}", e));
            }
        }
    }

    fn add_to_playlist(&mut self, paths: Vec<PathBuf>) {
        match self.controller.player_mut().add_to_playlist(paths) {
            Ok(added) => self.controller.set_status(format!("Added {} video(s) to playlist", added)),
            Err(e) => self.controller.set_status(e.to_string()),
        }
    }

    fn export_log(&mut self) {
        match self.controller.log().export_csv() {
            Ok(path) => {
                info!("Gesture log exported to {}", path.display());
                self.controller.set_status(format!("Exported {}", path.display()));
            }
            Err(e) => {
                warn!("Export failed: {:#}", e);
                self.controller.set_status(format!("Export failed: {:#}", e));
            }
        }
    }

    fn render_header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            egui::menu::bar(ui, |ui| {
                ui.horizontal(|ui| {
                    if let Some(logo) = self.ui_components.logo_texture.as_ref() {
                        ui.image((logo.id(), egui::vec2(40.0, 40.0)));
                    }
                    ui.heading("Gesture Player");
                });

                ui.separator();

                if ui.button("📂 Open Video").clicked() {
                    self.open_file();
                }
                if ui.button("➕ Add Files").clicked() {
                    self.add_files();
                }
                if ui.button("📁 Add Folder").clicked() {
                    self.add_folder();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("ℹ About").clicked() {
                        self.show_about = !self.show_about;
                    }
                    if ui.button("⚙ Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                    ui.toggle_value(&mut self.show_guide, "✋ Guide");
                });
            });
            ui.add_space(8.0);
        });
    }

    fn render_playlist(&mut self, ctx: &egui::Context) {
        let mut selected = None;

        egui::SidePanel::left("playlist")
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Playlist");
                ui.separator();

                let player = self.controller.player();
                if player.playlist().is_empty() {
                    ui.label(
                        egui::RichText::new("Empty - add files or a folder")
                            .color(self.ui_components.theme.text_secondary),
                    );
                    return;
                }

                egui::ScrollArea::vertical().show(ui, |ui| {
                    for (index, path) in player.playlist().iter().enumerate() {
                        let current = player.current_index() == Some(index);
                        let label = format!("{}. {}", index + 1, file_label(path));
                        if ui.selectable_label(current, label).clicked() {
                            selected = Some(index);
                        }
                    }
                });
            });

        if let Some(index) = selected {
            if let Err(e) = self.controller.player_mut().load_from_playlist(index) {
                self.controller.set_status(e.to_string());
            }
        }
    }

    fn render_gesture_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("gestures")
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Hand");
                self.render_hand_view(ui);

                ui.add_space(8.0);
                self.ui_components.draw_gesture_indicator(
                    ui,
                    self.observation.symbol,
                    self.observation.fingers,
                );
                ui.label(
                    egui::RichText::new(format!("Source: {}", self.controller.source_name()))
                        .small()
                        .color(self.ui_components.theme.text_secondary),
                );
                ui.label(
                    egui::RichText::new(format!(
                        "Cooldown: {:.1} s",
                        self.controller.gate().cooldown().as_secs_f64()
                    ))
                    .small()
                    .color(self.ui_components.theme.text_secondary),
                );

                if self.show_guide {
                    ui.separator();
                    self.render_guide(ui);
                }

                ui.separator();
                ui.heading("Recent Gestures");
                for entry in self.controller.log().recent(8) {
                    ui.label(format!(
                        "{} {} → {} ({})",
                        entry.time.format("%H:%M:%S"),
                        entry.symbol.label(),
                        entry.command,
                        entry.result
                    ));
                }
                if ui.button("Export to CSV").clicked() {
                    self.export_log();
                }
            });
    }

    fn render_hand_view(&self, ui: &mut egui::Ui) {
        let size = egui::vec2(ui.available_width(), ui.available_width() * 0.75);
        let rect = if self.simulated_pose.is_some() {
            let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
            ui.painter().rect_filled(rect, egui::Rounding::same(4.0), self.ui_components.theme.surface);
            rect
        } else {
            self.preview.show(ui, size, false)
        };

        if let Some(hand) = &self.observation.hand {
            self.ui_components.draw_hand_overlay(ui.painter(), rect, hand);
        }
    }

    fn render_guide(&self, ui: &mut egui::Ui) {
        ui.heading("Gesture Guide");
        egui::Grid::new("guide").striped(true).show(ui, |ui| {
            for (slot, symbol) in GestureSymbol::ACTIONABLE.iter().enumerate() {
                if self.simulated_pose.is_some() {
                    ui.label(format!("[{}]", slot + 1));
                }
                ui.label(symbol.label());
                ui.label(symbol.hint());
                ui.monospace(symbol.pose().map(|p| p.to_string()).unwrap_or_default());
                ui.end_row();
            }
        });
    }

    fn render_controls(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(8.0);

            let (loaded, playing, muted, current, total, mut progress, mut volume) = {
                let player = self.controller.player();
                (
                    player.is_loaded(),
                    player.is_playing(),
                    player.is_muted(),
                    player.current_time_secs(),
                    player.total_time_secs(),
                    player.progress(),
                    player.volume(),
                )
            };

            ui.horizontal(|ui| {
                ui.label(format_time(current));
                let slider_width = (ui.available_width() - 60.0).max(100.0);
                ui.spacing_mut().slider_width = slider_width;
                let response = ui.add_enabled(
                    loaded,
                    egui::Slider::new(&mut progress, 0.0..=1.0).show_value(false),
                );
                if response.changed() {
                    self.run(Command::Seek(progress as f64));
                }
                ui.label(format_time(total));
            });

            ui.horizontal(|ui| {
                if ui.add_sized([40.0, 32.0], egui::Button::new("⏮")).clicked() {
                    self.run(Command::Previous);
                }
                if ui.add_sized([40.0, 32.0], egui::Button::new("⏪")).clicked() {
                    self.run(Command::Rewind);
                }
                let play_label = if playing { "⏸" } else { "▶" };
                if ui
                    .add_sized(
                        [56.0, 32.0],
                        egui::Button::new(play_label).fill(self.ui_components.theme.primary),
                    )
                    .clicked()
                {
                    self.run(Command::TogglePlay);
                }
                if ui.add_sized([40.0, 32.0], egui::Button::new("⏩")).clicked() {
                    self.run(Command::Forward);
                }
                if ui.add_sized([40.0, 32.0], egui::Button::new("⏭")).clicked() {
                    self.run(Command::Next);
                }
                if ui.add_sized([40.0, 32.0], egui::Button::new("⟲")).clicked() {
                    self.run(Command::Restart);
                }

                ui.separator();

                let mute_label = if muted { "🔇" } else { "🔊" };
                if ui.button(mute_label).clicked() {
                    self.run(Command::MuteToggle);
                }
                if ui.add(egui::Slider::new(&mut volume, 0..=100).show_value(false)).changed() {
                    self.run(Command::SetVolume(volume));
                }
                ui.label(volume_readout(self.controller.player()));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(path) = self.controller.player().current_path() {
                        ui.label(file_label(path));
                    }
                });
            });
            ui.add_space(8.0);
        });
    }

    fn render_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let state = match self.controller.player().state() {
                    PlaybackState::Empty => "⏹ No video",
                    PlaybackState::Paused => "⏸ Paused",
                    PlaybackState::Playing => "▶ Playing",
                };
                ui.label(state);
                ui.separator();
                ui.label(self.controller.status());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let metrics = self.controller.metrics();
                    ui.label(format!(
                        "{:.0} fps · {:.1} ms/tick",
                        metrics.avg_fps,
                        metrics.avg_processing_time * 1000.0
                    ));
                });
            });
        });
    }

    fn render_main_content(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let dimmed = is_dimmed(self.controller.player());
            ui.centered_and_justified(|ui| {
                let size = ui.available_size();
                self.video.show(ui, size, dimmed);
            });
        });
    }
}

impl eframe::App for GesturePlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.tick(ctx);

        self.render_header(ctx);
        self.render_status_bar(ctx);
        self.render_controls(ctx);
        self.render_playlist(ctx);
        self.render_gesture_panel(ctx);

        if self.show_settings {
            self.render_settings_window(ctx);
        }
        if self.show_about {
            self.render_about_window(ctx);
        }

        self.render_main_content(ctx);

        ctx.request_repaint_after(self.config.tick_interval());
    }
}

impl GesturePlayerApp {
    fn render_settings_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("Settings")
            .open(&mut self.show_settings)
            .resizable(true)
            .default_size([380.0, 360.0])
            .show(ctx, |ui| {
                ui.heading("Gestures");
                ui.add_space(6.0);

                ui.label("Cooldown between repeated gestures:");
                if ui
                    .add(
                        egui::Slider::new(&mut self.config.gesture_cooldown_secs, 0.2..=5.0)
                            .suffix(" s")
                            .step_by(0.1),
                    )
                    .changed()
                {
                    self.controller.set_cooldown(self.config.cooldown());
                }

                ui.separator();
                ui.heading("Input (applies on next launch)");

                egui::ComboBox::from_label("Landmark source")
                    .selected_text(format!("{:?}", self.config.landmark_source))
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut self.config.landmark_source, LandmarkSourceKind::Camera, "Camera");
                        ui.selectable_value(&mut self.config.landmark_source, LandmarkSourceKind::Simulated, "Simulated");
                    });
                ui.add(egui::Slider::new(&mut self.config.camera_index, 0..=4).text("Camera index"));
                ui.add(
                    egui::Slider::new(&mut self.config.seek_step_secs, 0.5..=30.0)
                        .text("Seek step")
                        .suffix(" s"),
                );

                ui.separator();
                ui.heading("Output");
                ui.label("Gesture logs are exported to:");
                ui.label(self.config.output_directory.display().to_string());
                if ui.button("Browse...").clicked() {
                    if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                        self.config.output_directory = dir;
                    }
                }

                ui.add_space(10.0);
                if ui.button("💾 Save Settings").clicked() {
                    match self.config.save() {
                        Ok(()) => self.controller.set_status("Settings saved"),
                        Err(e) => {
                            warn!("Saving settings failed: {:#}", e);
                            self.controller.set_status(format!("Saving settings failed: {:#}", e));
                        }
                    }
                }
            });
    }

    fn render_about_window(&mut self, ctx: &egui::Context) {
        egui::Window::new("About")
            .open(&mut self.show_about)
            .resizable(false)
            .default_size([360.0, 240.0])
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("Gesture Player");
                    ui.label(format!("Version {}", env!("CARGO_PKG_VERSION")));
                    ui.add_space(16.0);
                    ui.label("Control video playback with hand poses");
                    ui.label("in front of your camera.");
                });
            });
    }
}

impl Drop for GesturePlayerApp {
    fn drop(&mut self) {
        self.controller.shutdown();
    }
}

/// Reads 0 while muted; the slider keeps the volume to restore.
fn volume_readout(player: &Player) -> String {
    format!("Volume {}%", player.effective_volume())
}

/// Muted or nearly silent video is drawn dimmed.
fn is_dimmed(player: &Player) -> bool {
    player.effective_volume() < 10
}

fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::tests::{player_with, FakeOpener};
    use crate::tracking::name_gesture;

    #[test]
    fn number_keys_map_to_table_order() {
        for (slot, symbol) in GestureSymbol::ACTIONABLE.iter().enumerate() {
            let pose = pose_for_key(slot).unwrap();
            assert_eq!(name_gesture(pose), *symbol);
        }
        assert_eq!(name_gesture(pose_for_key(8).unwrap()), GestureSymbol::Unknown);
    }

    #[test]
    fn muted_player_reads_zero_and_dims() {
        let mut player = player_with(FakeOpener::with_frames(10));
        player.add_to_playlist(["a.mp4"]).unwrap();
        player.set_volume(70);
        assert_eq!(volume_readout(&player), "Volume 70%");
        assert!(!is_dimmed(&player));

        player.toggle_mute().unwrap();
        assert_eq!(volume_readout(&player), "Volume 0%");
        assert!(is_dimmed(&player));
        assert_eq!(player.volume(), 70);

        player.toggle_mute().unwrap();
        player.set_volume(5);
        assert!(is_dimmed(&player));
    }

    #[test]
    fn file_label_uses_file_name() {
        assert_eq!(file_label(std::path::Path::new("/videos/clip.mp4")), "clip.mp4");
    }
}
