use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{DetectorSettings, DEFAULT_DETECTOR_MODEL};
use crate::display::{DEFAULT_SURFACE_HEIGHT, DEFAULT_SURFACE_WIDTH};
use crate::ingest::camera::{DEFAULT_CAMERA_DEVICE, DEFAULT_CAMERA_FPS};
use crate::ingest::CameraConfig;
use crate::recognize::{LbphParams, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_RECOGNIZER_MODEL};

const DEFAULT_FACES_DIR: &str = "../Faces";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AstraConfigFile {
    faces_dir: Option<PathBuf>,
    recognizer_model: Option<PathBuf>,
    confidence_threshold: Option<f64>,
    max_frames: Option<u64>,
    detector: Option<DetectorConfigFile>,
    lbph: Option<LbphConfigFile>,
    camera: Option<CameraConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model: Option<PathBuf>,
    min_face_size: Option<u32>,
    score_threshold: Option<f64>,
    pyramid_scale_factor: Option<f32>,
    window_step: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct LbphConfigFile {
    radius: Option<u32>,
    neighbors: Option<u32>,
    grid_x: Option<u32>,
    grid_y: Option<u32>,
    threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    path: Option<PathBuf>,
    width: Option<u32>,
    height: Option<u32>,
    font: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AstraConfig {
    pub faces_dir: PathBuf,
    pub recognizer_model: PathBuf,
    pub confidence_threshold: f64,
    /// Upper bound on capture loop ticks; `None` runs until interrupted.
    pub max_frames: Option<u64>,
    pub detector: DetectorSettings,
    pub lbph: LbphParams,
    pub camera: CameraConfig,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySettings {
    /// Image file that receives the latest frame; `None` discards frames.
    pub path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    /// TrueType font for captions.
    pub font: Option<PathBuf>,
}

impl Default for AstraConfig {
    fn default() -> Self {
        // An empty file section always resolves to the compiled-in defaults.
        Self::from_file(AstraConfigFile::default())
    }
}

impl AstraConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ASTRA_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AstraConfigFile) -> Self {
        let default_detector = DetectorSettings::default();
        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector.backend.unwrap_or(default_detector.backend),
            model_path: detector
                .model
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECTOR_MODEL)),
            min_face_size: detector
                .min_face_size
                .unwrap_or(default_detector.min_face_size),
            score_threshold: detector
                .score_threshold
                .unwrap_or(default_detector.score_threshold),
            pyramid_scale_factor: detector
                .pyramid_scale_factor
                .unwrap_or(default_detector.pyramid_scale_factor),
            window_step: detector.window_step.unwrap_or(default_detector.window_step),
        };

        let default_lbph = LbphParams::default();
        let lbph = file.lbph.unwrap_or_default();
        let lbph = LbphParams {
            radius: lbph.radius.unwrap_or(default_lbph.radius),
            neighbors: lbph.neighbors.unwrap_or(default_lbph.neighbors),
            grid_x: lbph.grid_x.unwrap_or(default_lbph.grid_x),
            grid_y: lbph.grid_y.unwrap_or(default_lbph.grid_y),
            threshold: lbph.threshold.unwrap_or(default_lbph.threshold),
        };

        let camera = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };

        let display = file.display.unwrap_or_default();
        let display = DisplaySettings {
            path: display.path,
            width: display.width.unwrap_or(DEFAULT_SURFACE_WIDTH),
            height: display.height.unwrap_or(DEFAULT_SURFACE_HEIGHT),
            font: display.font,
        };

        Self {
            faces_dir: file
                .faces_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FACES_DIR)),
            recognizer_model: file
                .recognizer_model
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RECOGNIZER_MODEL)),
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            max_frames: file.max_frames,
            detector,
            lbph,
            camera,
            display,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = env_nonempty("ASTRA_FACES_DIR") {
            self.faces_dir = PathBuf::from(dir);
        }
        if let Some(model) = env_nonempty("ASTRA_DETECTOR_MODEL") {
            self.detector.model_path = PathBuf::from(model);
        }
        if let Some(model) = env_nonempty("ASTRA_RECOGNIZER_MODEL") {
            self.recognizer_model = PathBuf::from(model);
        }
        if let Some(device) = env_nonempty("ASTRA_CAMERA_DEVICE") {
            self.camera.device = device;
        }
        if let Some(path) = env_nonempty("ASTRA_DISPLAY_PATH") {
            self.display.path = Some(PathBuf::from(path));
        }
        if let Some(threshold) = env_nonempty("ASTRA_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("ASTRA_CONFIDENCE_THRESHOLD must be a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.confidence_threshold.is_finite() {
            return Err(anyhow!("confidence threshold must be a finite number"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(anyhow!("display surface must be non-zero in both dimensions"));
        }
        if self.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero when set"));
        }
        self.lbph
            .validate()
            .map_err(|e| anyhow!("invalid lbph settings: {}", e))?;
        Ok(())
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<AstraConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
