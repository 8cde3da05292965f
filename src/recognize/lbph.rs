//! Local Binary Pattern Histogram recognizer.
//!
//! Each training face is reduced to a spatial histogram: the face is encoded
//! as circular local binary patterns, the pattern image is split into a
//! `grid_x` x `grid_y` grid, and a pattern histogram is kept per cell.
//! Prediction is nearest neighbour under the symmetric chi-square distance.
//!
//! Histograms are stored as integer counts plus the cell area, so a model
//! reloaded from disk reproduces the same distances bit for bit.

use std::f32::consts::PI;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::LabelIndex;
use crate::training::TrainingSample;

use super::{Prediction, Recognizer};

pub const DEFAULT_RECOGNIZER_MODEL: &str = "../Models/face_recognizer.json";

const MODEL_FORMAT: &str = "astra-lbph";
const MODEL_VERSION: u32 = 1;
const MAX_NEIGHBORS: u32 = 16;
const MAX_GRID_CELLS: u32 = 4096;
/// Interpolated neighbours within this distance of the center count as equal.
const PATTERN_TOLERANCE: f32 = 1e-3;

/// LBPH parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LbphParams {
    pub radius: u32,
    pub neighbors: u32,
    pub grid_x: u32,
    pub grid_y: u32,
    /// Predictions farther than this are rejected (`Prediction::label == None`).
    pub threshold: f64,
}

impl Default for LbphParams {
    fn default() -> Self {
        Self {
            radius: 1,
            neighbors: 8,
            grid_x: 8,
            grid_y: 8,
            threshold: f64::MAX,
        }
    }
}

impl LbphParams {
    pub fn validate(&self) -> Result<()> {
        if self.radius == 0 {
            return Err(Error::TrainingFailure("radius must be >= 1".to_string()));
        }
        if self.neighbors == 0 || self.neighbors > MAX_NEIGHBORS {
            return Err(Error::TrainingFailure(format!(
                "neighbors must be in 1..={}",
                MAX_NEIGHBORS
            )));
        }
        if self.grid_x == 0 || self.grid_y == 0 {
            return Err(Error::TrainingFailure("grid must be at least 1x1".to_string()));
        }
        match self.grid_x.checked_mul(self.grid_y) {
            Some(cells) if cells <= MAX_GRID_CELLS => Ok(()),
            _ => Err(Error::TrainingFailure(format!(
                "grid {}x{} exceeds {} cells",
                self.grid_x, self.grid_y, MAX_GRID_CELLS
            ))),
        }
    }

    /// Histogram length of one face. Only meaningful after `validate`.
    fn histogram_len(&self) -> usize {
        self.bins() * self.grid_x as usize * self.grid_y as usize
    }

    fn bins(&self) -> usize {
        1usize << self.neighbors
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct SpatialHistogram {
    /// Pixels per grid cell; every cell of one face has the same area.
    cell_area: u32,
    counts: Vec<u32>,
}

impl SpatialHistogram {
    fn normalized(&self) -> Vec<f64> {
        let area = self.cell_area.max(1) as f64;
        self.counts.iter().map(|&c| c as f64 / area).collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSample {
    label: u32,
    histogram: SpatialHistogram,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    format: String,
    version: u32,
    params: LbphParams,
    #[serde(default)]
    label_names: Vec<String>,
    #[serde(default)]
    index_fingerprint: Option<String>,
    samples: Vec<StoredSample>,
}

/// Trained LBPH state.
#[derive(Clone, Debug)]
pub struct LbphRecognizer {
    params: LbphParams,
    labels: Vec<u32>,
    histograms: Vec<SpatialHistogram>,
    normalized: Vec<Vec<f64>>,
    label_names: Vec<String>,
    index_fingerprint: Option<String>,
}

impl LbphRecognizer {
    pub fn new(params: LbphParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            labels: Vec::new(),
            histograms: Vec::new(),
            normalized: Vec::new(),
            label_names: Vec::new(),
            index_fingerprint: None,
        })
    }

    pub fn params(&self) -> &LbphParams {
        &self.params
    }

    /// Number of enrolled faces.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Replace the enrolled faces with `samples`.
    ///
    /// On error the previously enrolled faces are kept.
    pub fn train(&mut self, samples: &[TrainingSample]) -> Result<()> {
        let enrolled = self.histograms_for(samples)?;
        self.labels.clear();
        self.histograms.clear();
        self.normalized.clear();
        self.enroll(enrolled);
        Ok(())
    }

    /// Add `samples` to the enrolled faces.
    ///
    /// Faces too small for the configured radius and grid are skipped with a
    /// warning; it is an error if none remain.
    pub fn update(&mut self, samples: &[TrainingSample]) -> Result<()> {
        let enrolled = self.histograms_for(samples)?;
        self.enroll(enrolled);
        Ok(())
    }

    fn histograms_for(&self, samples: &[TrainingSample]) -> Result<Vec<(u32, SpatialHistogram)>> {
        if samples.is_empty() {
            return Err(Error::EmptyTrainingSet);
        }
        let mut enrolled = Vec::with_capacity(samples.len());
        for sample in samples {
            match spatial_histogram(&sample.face, &self.params) {
                Ok(histogram) => enrolled.push((sample.label, histogram)),
                Err(err) => {
                    log::warn!("skipping training face for label {}: {}", sample.label, err);
                }
            }
        }
        if enrolled.is_empty() {
            return Err(Error::TrainingFailure(
                "no usable face samples".to_string(),
            ));
        }
        Ok(enrolled)
    }

    fn enroll(&mut self, enrolled: Vec<(u32, SpatialHistogram)>) {
        let added = enrolled.len();
        for (label, histogram) in enrolled {
            self.labels.push(label);
            self.normalized.push(histogram.normalized());
            self.histograms.push(histogram);
        }
        log::debug!("lbph: enrolled {} faces ({} total)", added, self.len());
    }

    /// Record the label index this model was trained against.
    pub fn set_label_index(&mut self, index: &LabelIndex) {
        self.label_names = index.names().to_vec();
        self.index_fingerprint = Some(index.fingerprint());
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn index_fingerprint(&self) -> Option<&str> {
        self.index_fingerprint.as_deref()
    }

    /// True when `index` matches the index recorded at training time.
    ///
    /// Models saved without an index record are assumed to match.
    pub fn matches_index(&self, index: &LabelIndex) -> bool {
        match &self.index_fingerprint {
            Some(fingerprint) => *fingerprint == index.fingerprint(),
            None => true,
        }
    }

    /// Persist the model as JSON. Writes to a temporary file and renames it into place.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let save_failure = |reason: String| Error::ModelSaveFailure {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| save_failure(e.to_string()))?;
        }

        let file = ModelFile {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            params: self.params,
            label_names: self.label_names.clone(),
            index_fingerprint: self.index_fingerprint.clone(),
            samples: self
                .labels
                .iter()
                .zip(&self.histograms)
                .map(|(&label, histogram)| StoredSample {
                    label,
                    histogram: histogram.clone(),
                })
                .collect(),
        };

        let tmp_path = path.with_extension("tmp");
        {
            let out = File::create(&tmp_path).map_err(|e| save_failure(e.to_string()))?;
            let mut writer = BufWriter::new(out);
            serde_json::to_writer(&mut writer, &file).map_err(|e| save_failure(e.to_string()))?;
            writer.flush().map_err(|e| save_failure(e.to_string()))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| save_failure(e.to_string()))?;

        log::info!("recognizer model saved to {}", path.display());
        Ok(())
    }

    /// Load a model written by `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let load_failure = |reason: String| Error::ModelLoadFailure {
            path: path.to_path_buf(),
            reason,
        };

        let input = File::open(path).map_err(|e| load_failure(e.to_string()))?;
        let file: ModelFile = serde_json::from_reader(BufReader::new(input))
            .map_err(|e| load_failure(e.to_string()))?;

        if file.format != MODEL_FORMAT {
            return Err(load_failure(format!("unexpected model format '{}'", file.format)));
        }
        if file.version != MODEL_VERSION {
            return Err(load_failure(format!(
                "unsupported model version {}",
                file.version
            )));
        }
        file.params
            .validate()
            .map_err(|e| load_failure(e.to_string()))?;

        let expected_len = file.params.histogram_len();
        let mut model = Self::new(file.params)?;
        for sample in file.samples {
            if sample.histogram.counts.len() != expected_len {
                return Err(load_failure(format!(
                    "histogram for label {} has {} bins, expected {}",
                    sample.label,
                    sample.histogram.counts.len(),
                    expected_len
                )));
            }
            model.labels.push(sample.label);
            model.normalized.push(sample.histogram.normalized());
            model.histograms.push(sample.histogram);
        }
        model.label_names = file.label_names;
        model.index_fingerprint = file.index_fingerprint;

        log::info!(
            "recognizer model loaded successfully from {} ({} faces)",
            path.display(),
            model.len()
        );
        Ok(model)
    }
}

impl Recognizer for LbphRecognizer {
    fn predict(&self, face: &GrayImage) -> Result<Prediction> {
        if self.is_empty() {
            return Err(Error::TrainingFailure(
                "recognizer has no enrolled faces".to_string(),
            ));
        }
        let query = spatial_histogram(face, &self.params)?.normalized();

        let mut best: Option<(u32, f64)> = None;
        for (label, hist) in self.labels.iter().zip(&self.normalized) {
            let distance = chi_square(hist, &query);
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((*label, distance));
            }
        }

        let (label, distance) = best.unwrap_or((0, f64::INFINITY));
        let label = (distance < self.params.threshold).then_some(label);
        Ok(Prediction { label, distance })
    }
}

/// Symmetric chi-square distance: 2 * sum((a - b)^2 / (a + b)).
fn chi_square(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| *x + *y > f64::EPSILON)
        .map(|(x, y)| {
            let diff = x - y;
            2.0 * diff * diff / (x + y)
        })
        .sum()
}

/// Circular LBP codes with bilinear interpolation of the sample points.
///
/// The output is `(width - 2r) x (height - 2r)`, one code per interior pixel.
fn lbp_codes(src: &GrayImage, params: &LbphParams) -> Result<(Vec<u16>, u32, u32)> {
    let r = params.radius;
    let (width, height) = src.dimensions();
    if width <= 2 * r || height <= 2 * r {
        return Err(Error::InvalidFace(format!(
            "{}x{} face is too small for radius {}",
            width, height, r
        )));
    }
    let out_w = width - 2 * r;
    let out_h = height - 2 * r;
    let mut codes = vec![0u16; (out_w * out_h) as usize];

    let px = |x: i64, y: i64| src.get_pixel(x as u32, y as u32)[0] as f32;

    for n in 0..params.neighbors {
        let angle = 2.0 * PI * n as f32 / params.neighbors as f32;
        let x = r as f32 * angle.cos();
        let y = -(r as f32) * angle.sin();
        let fx = x.floor();
        let fy = y.floor();
        let cx = x.ceil();
        let cy = y.ceil();
        let tx = x - fx;
        let ty = y - fy;
        let w1 = (1.0 - tx) * (1.0 - ty);
        let w2 = tx * (1.0 - ty);
        let w3 = (1.0 - tx) * ty;
        let w4 = tx * ty;
        let (fx, fy, cx, cy) = (fx as i64, fy as i64, cx as i64, cy as i64);

        for i in r..height - r {
            for j in r..width - r {
                let (yi, xj) = (i as i64, j as i64);
                let t = w1 * px(xj + fx, yi + fy)
                    + w2 * px(xj + cx, yi + fy)
                    + w3 * px(xj + fx, yi + cy)
                    + w4 * px(xj + cx, yi + cy);
                let center = px(xj, yi);
                if t > center || (t - center).abs() < PATTERN_TOLERANCE {
                    let idx = ((i - r) * out_w + (j - r)) as usize;
                    codes[idx] |= 1 << n;
                }
            }
        }
    }

    Ok((codes, out_w, out_h))
}

fn spatial_histogram(face: &GrayImage, params: &LbphParams) -> Result<SpatialHistogram> {
    let (codes, width, height) = lbp_codes(face, params)?;
    let cell_w = width / params.grid_x;
    let cell_h = height / params.grid_y;
    if cell_w == 0 || cell_h == 0 {
        return Err(Error::InvalidFace(format!(
            "{}x{} pattern image cannot be split into a {}x{} grid",
            width, height, params.grid_x, params.grid_y
        )));
    }

    let bins = params.bins();
    let mut counts = vec![0u32; params.histogram_len()];
    for gy in 0..params.grid_y {
        for gx in 0..params.grid_x {
            let cell = (gy * params.grid_x + gx) as usize;
            let hist = &mut counts[cell * bins..(cell + 1) * bins];
            for y in gy * cell_h..(gy + 1) * cell_h {
                let row = (y * width) as usize;
                for x in gx * cell_w..(gx + 1) * cell_w {
                    hist[codes[row + x as usize] as usize] += 1;
                }
            }
        }
    }

    Ok(SpatialHistogram {
        cell_area: cell_w * cell_h,
        counts,
    })
}
