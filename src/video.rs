// src/video.rs - Webcam capture and ffmpeg-backed video files
use std::path::{Path, PathBuf};
use anyhow::{Result, Context};
use image::{DynamicImage, ImageBuffer};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::process::Command;
use std::fs;
use tracing::{debug, info, warn};

use crate::player::{MediaOpener, MediaSource};

pub struct Webcam {
    camera: Camera,
    index: u32,
}

impl Webcam {
    pub fn open(index: u32) -> Result<Self> {
        debug!("Attempting to open camera index {}", index);

        use nokhwa::utils::{CameraFormat, FrameFormat, Resolution};

        let format = CameraFormat::new(
            Resolution::new(640, 480),
            FrameFormat::MJPEG,
            30,
        );

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(format));

        let camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| anyhow::anyhow!("Failed to open camera {}: {}", index, e))?;

        info!("Camera {} opened", index);
        Ok(Self { camera, index })
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Captures one frame, mirrored horizontally so the user sees
    /// themselves as in a mirror.
    pub fn read_frame(&mut self) -> Result<DynamicImage> {
        if !self.camera.is_stream_open() {
            self.camera.open_stream()
                .map_err(|e| anyhow::anyhow!("Failed to open camera stream: {}", e))?;
        }

        let frame = self.camera.frame()
            .map_err(|e| anyhow::anyhow!("Failed to capture frame: {}", e))?;

        let decoded = frame.decode_image::<RgbFormat>()
            .map_err(|e| anyhow::anyhow!("Failed to decode frame: {}", e))?;

        let width = decoded.width();
        let height = decoded.height();
        let rgb_data = decoded.into_vec();

        let mut rgba_data = Vec::with_capacity((width * height * 4) as usize);
        for chunk in rgb_data.chunks(3) {
            rgba_data.extend_from_slice(chunk);
            rgba_data.push(255);
        }

        let img = ImageBuffer::from_raw(width, height, rgba_data)
            .ok_or_else(|| anyhow::anyhow!("Failed to create image buffer"))?;

        let flipped = image::imageops::flip_horizontal(&img);
        Ok(DynamicImage::ImageRgba8(flipped))
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        if self.camera.is_stream_open() {
            let _ = self.camera.stop_stream();
            debug!("Camera {} stream stopped", self.index);
        }
    }
}

/// Lists the cameras the system reports, for diagnostics.
pub fn list_cameras() -> Vec<String> {
    match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
        Ok(cameras) => cameras.iter().map(|c| c.human_name()).collect(),
        Err(e) => {
            warn!("Failed to query cameras: {}", e);
            Vec::new()
        }
    }
}

/// Probed stream properties of a video file.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: usize,
}

impl VideoInfo {
    /// Parses `ffprobe -of csv=p=0` output for
    /// `stream=width,height,r_frame_rate,nb_read_frames`.
    pub fn parse(probe: &str) -> Result<Self> {
        let parts: Vec<&str> = probe.trim().split(',').collect();
        if parts.len() < 4 {
            return Err(anyhow::anyhow!("Invalid video format or corrupted file"));
        }

        let width = parts[0].trim().parse()
            .map_err(|_| anyhow::anyhow!("Invalid video width"))?;
        let height = parts[1].trim().parse()
            .map_err(|_| anyhow::anyhow!("Invalid video height"))?;
        let fps = parse_frame_rate(parts[2].trim())?;
        let frame_count: usize = parts[3].trim().parse()
            .map_err(|_| anyhow::anyhow!("Invalid frame count"))?;

        if frame_count == 0 {
            return Err(anyhow::anyhow!("Video has no frames"));
        }

        Ok(Self { width, height, fps, frame_count })
    }
}

fn parse_frame_rate(text: &str) -> Result<f64> {
    let fps = match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().map_err(|_| anyhow::anyhow!("Invalid frame rate format"))?;
            let den: f64 = den.parse().map_err(|_| anyhow::anyhow!("Invalid frame rate format"))?;
            if den == 0.0 { 0.0 } else { num / den }
        }
        None => text.parse().unwrap_or(30.0),
    };
    // Some containers report 0/0; fall back to a sane rate
    Ok(if fps.is_finite() && fps > 0.0 { fps } else { 30.0 })
}

fn path_arg(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("Path is not valid UTF-8: {}", path.display()))
}

/// Decodes a whole video up front into memory via ffmpeg.
pub struct VideoFileReader {
    path: PathBuf,
    info: VideoInfo,
    current_frame: usize,
    frames_cache: Vec<DynamicImage>,
}

impl VideoFileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(anyhow::anyhow!("Video file does not exist: {}", path.display()));
        }

        if let Err(e) = fs::File::open(&path) {
            return Err(anyhow::anyhow!("Cannot read video file (permission denied): {}", e));
        }

        if Command::new("ffprobe").arg("-version").output().is_err() {
            return Err(anyhow::anyhow!("FFmpeg is not installed or not in PATH. Please install FFmpeg to play videos."));
        }

        let output = Command::new("ffprobe")
            .args([
                "-v", "error",
                "-select_streams", "v:0",
                "-count_frames",
                "-show_entries", "stream=width,height,r_frame_rate,nb_read_frames",
                "-of", "csv=p=0",
                path_arg(&path)?,
            ])
            .output()
            .context("Failed to run ffprobe")?;

        let info = VideoInfo::parse(&String::from_utf8_lossy(&output.stdout))?;

        let mut reader = Self {
            path,
            info,
            current_frame: 0,
            frames_cache: Vec::new(),
        };
        reader.load_all_frames()?;
        Ok(reader)
    }

    fn load_all_frames(&mut self) -> Result<()> {
        info!("Loading video frames from: {}", self.path.display());

        let temp_dir = std::env::temp_dir().join(format!("gesture_player_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&temp_dir)
            .with_context(|| format!("Cannot create temporary directory {}", temp_dir.display()))?;

        let pattern = temp_dir.join("frame_%05d.png");
        let status = Command::new("ffmpeg")
            .args([
                "-v", "error",
                "-i", path_arg(&self.path)?,
                "-vf", "scale=960:-2",
                path_arg(&pattern)?,
            ])
            .status()
            .context("Failed to extract frames with ffmpeg");

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                let _ = fs::remove_dir_all(&temp_dir);
                return Err(e);
            }
        };

        if !status.success() {
            let _ = fs::remove_dir_all(&temp_dir);
            return Err(anyhow::anyhow!("FFmpeg frame extraction failed. The video format may be unsupported."));
        }

        self.frames_cache.clear();
        for i in 1..=self.info.frame_count {
            let frame_path = temp_dir.join(format!("frame_{:05}.png", i));
            if !frame_path.exists() {
                continue;
            }
            match image::open(&frame_path) {
                Ok(img) => self.frames_cache.push(img),
                Err(e) => warn!("Failed to load frame {}: {}", i, e),
            }
        }

        let _ = fs::remove_dir_all(&temp_dir);

        if self.frames_cache.is_empty() {
            return Err(anyhow::anyhow!("No frames could be loaded from the video"));
        }

        info!("Loaded {} frames", self.frames_cache.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}

impl MediaSource for VideoFileReader {
    fn current_frame_index(&self) -> usize {
        self.current_frame
    }

    // Counts decoded frames, which can differ from the probed count
    fn total_frame_count(&self) -> usize {
        self.frames_cache.len()
    }

    fn fps(&self) -> f64 {
        self.info.fps
    }

    fn seek(&mut self, frame_index: usize) {
        self.current_frame = frame_index.min(self.frames_cache.len());
    }

    fn read_next_frame(&mut self) -> Option<DynamicImage> {
        let frame = self.frames_cache.get(self.current_frame).cloned()?;
        self.current_frame += 1;
        Some(frame)
    }
}

/// Opens files through [`VideoFileReader`].
#[derive(Debug, Default)]
pub struct FfmpegOpener;

impl MediaOpener for FfmpegOpener {
    fn open(&mut self, path: &Path) -> Result<Box<dyn MediaSource>> {
        Ok(Box::new(VideoFileReader::open(path)?))
    }
}

/// Media files directly inside `dir`, sorted by file name.
pub fn scan_media_dir(dir: &Path, is_media: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && is_media(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
