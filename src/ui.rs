// src/ui.rs - Theme, widgets and drawing helpers for the player window
use eframe::egui::{self, Color32, Pos2, Rect, Stroke, Vec2};
use image::DynamicImage;
use std::path::Path;
use tracing::warn;
use usvg::TreeParsing;

use crate::tracking::{FingerVector, GestureSymbol, HandLandmarks, HAND_CONNECTIONS};

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color32,
    pub secondary: Color32,
    pub background: Color32,
    pub surface: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    pub text_primary: Color32,
    pub text_secondary: Color32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: Color32::from_rgb(70, 130, 240),
            secondary: Color32::from_rgb(255, 152, 0),
            background: Color32::from_rgb(20, 20, 25),
            surface: Color32::from_rgb(30, 30, 35),
            error: Color32::from_rgb(244, 67, 54),
            warning: Color32::from_rgb(255, 152, 0),
            success: Color32::from_rgb(76, 175, 80),
            text_primary: Color32::WHITE,
            text_secondary: Color32::from_rgb(200, 200, 200),
        }
    }
}

pub struct UIComponents {
    pub logo_texture: Option<egui::TextureHandle>,
    pub theme: Theme,
}

impl UIComponents {
    pub fn new(ctx: &egui::Context, logo_path: Option<&Path>) -> Self {
        let mut components = Self {
            logo_texture: None,
            theme: Theme::default(),
        };

        if let Some(path) = logo_path {
            match load_svg_as_rgba(path, 256) {
                Ok(logo_rgba) => {
                    let color_image = egui::ColorImage::from_rgba_unmultiplied([256, 256], &logo_rgba);
                    components.logo_texture = Some(ctx.load_texture("logo", color_image, Default::default()));
                }
                Err(e) => warn!("Could not load logo {}: {}", path.display(), e),
            }
        }

        components
    }

    pub fn symbol_color(&self, symbol: GestureSymbol) -> Color32 {
        match symbol {
            GestureSymbol::None => self.theme.text_secondary,
            GestureSymbol::Unknown => self.theme.warning,
            _ => self.theme.success,
        }
    }

    /// Big label for the current symbol plus one dot per finger.
    pub fn draw_gesture_indicator(
        &self,
        ui: &mut egui::Ui,
        symbol: GestureSymbol,
        fingers: Option<FingerVector>,
    ) {
        ui.label(
            egui::RichText::new(symbol.label())
                .size(24.0)
                .color(self.symbol_color(symbol)),
        );

        ui.horizontal(|ui| {
            let names = ["T", "I", "M", "R", "P"];
            let extended = fingers.map(|f| f.extended()).unwrap_or([false; 5]);
            for (name, up) in names.iter().zip(extended) {
                let (rect, _) = ui.allocate_exact_size(Vec2::new(22.0, 22.0), egui::Sense::hover());
                let fill = match (fingers.is_some(), up) {
                    (false, _) => self.theme.surface,
                    (true, true) => self.theme.primary,
                    (true, false) => Color32::from_rgb(60, 60, 68),
                };
                ui.painter().circle_filled(rect.center(), 10.0, fill);
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    *name,
                    egui::FontId::proportional(11.0),
                    self.theme.text_primary,
                );
            }
        });
    }

    /// Draws the hand skeleton over `rect`, which shows the camera image the
    /// landmarks were detected on.
    pub fn draw_hand_overlay(&self, painter: &egui::Painter, rect: Rect, hand: &HandLandmarks) {
        let to_screen = |index: usize| {
            let p = hand.point(index);
            Pos2::new(
                rect.left() + p.x as f32 * rect.width(),
                rect.top() + p.y as f32 * rect.height(),
            )
        };

        for (from, to) in HAND_CONNECTIONS {
            painter.line_segment([to_screen(from), to_screen(to)], Stroke::new(2.0, self.theme.primary));
        }
        for index in 0..hand.points().len() {
            painter.circle_filled(to_screen(index), 3.5, self.theme.secondary);
        }
    }
}

/// `M:SS`, as shown under the progress bar.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

fn load_svg_as_rgba(path: &Path, size: u32) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let svg_data = std::fs::read_to_string(path)?;
    let opt = usvg::Options::default();
    let tree = usvg::Tree::from_str(&svg_data, &opt)?;

    let pixmap_size = tree.size.to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size, size)
        .ok_or("Invalid logo size")?;

    let scale = size as f32 / pixmap_size.width().max(pixmap_size.height()) as f32;
    let transform = resvg::tiny_skia::Transform::from_scale(scale, scale);

    resvg::Tree::from_usvg(&tree).render(transform, &mut pixmap.as_mut());

    Ok(pixmap.data().to_vec())
}

/// Displays the latest frame of a stream, letterboxed to its aspect ratio.
pub struct VideoWidget {
    name: String,
    texture: Option<egui::TextureHandle>,
    aspect_ratio: f32,
    placeholder: &'static str,
}

impl VideoWidget {
    pub fn new(name: &str, placeholder: &'static str) -> Self {
        Self {
            name: name.to_string(),
            texture: None,
            aspect_ratio: 16.0 / 9.0,
            placeholder,
        }
    }

    pub fn update_frame(&mut self, ctx: &egui::Context, frame: DynamicImage) {
        let size = [frame.width() as usize, frame.height() as usize];
        if size[1] > 0 {
            self.aspect_ratio = size[0] as f32 / size[1] as f32;
        }
        let rgba = frame.into_rgba8();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());

        match self.texture.as_mut() {
            Some(texture) => texture.set(color_image, Default::default()),
            None => self.texture = Some(ctx.load_texture(&self.name, color_image, Default::default())),
        }
    }

    pub fn clear(&mut self) {
        self.texture = None;
    }

    /// Returns the rect the image was drawn into.
    pub fn show(&self, ui: &mut egui::Ui, max_size: Vec2, dimmed: bool) -> Rect {
        let mut size = Vec2::new(max_size.x, max_size.x / self.aspect_ratio);
        if size.y > max_size.y {
            size = Vec2::new(max_size.y * self.aspect_ratio, max_size.y);
        }
        let (rect, _response) = ui.allocate_exact_size(size, egui::Sense::hover());

        if let Some(texture) = &self.texture {
            let tint = if dimmed { Color32::from_gray(180) } else { Color32::WHITE };
            ui.painter().image(
                texture.id(),
                rect,
                Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                tint,
            );
        } else {
            ui.painter().rect_filled(rect, egui::Rounding::same(4.0), Color32::from_rgb(50, 50, 55));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                self.placeholder,
                egui::FontId::proportional(16.0),
                Color32::from_rgb(150, 150, 155),
            );
        }
        rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_time_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.9), "0:09");
        assert_eq!(format_time(75.0), "1:15");
        assert_eq!(format_time(3600.0), "60:00");
    }

    #[test]
    fn format_time_handles_garbage() {
        assert_eq!(format_time(-4.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
