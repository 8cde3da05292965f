//! Enrollment: turn per-person footage into training samples and a trained model.
//!
//! Layout of the faces directory:
//!
//! ```text
//! Faces/
//!   alice/  clip1.mp4  clip2.mp4
//!   bob/    clip.webm
//! ```
//!
//! Every regular file inside a person directory is opened as a video source.
//! Files that cannot be opened are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::detect::DetectorBackend;
use crate::error::{Error, Result};
use crate::index::{person_directories, LabelIndex};
use crate::ingest::VideoSource;
use crate::recognize::{LbphParams, LbphRecognizer};

/// A cropped grayscale face and the label of the person it belongs to.
#[derive(Clone, Debug)]
pub struct TrainingSample {
    pub face: GrayImage,
    pub label: u32,
}

/// Walk the faces directory and collect one sample per detected face per frame.
///
/// Labels follow `LabelIndex::build` ordering. Returns an empty vector when
/// nothing was detected; `train` rejects that.
pub fn load_training_data<D>(directory: impl AsRef<Path>, detector: &mut D) -> Result<Vec<TrainingSample>>
where
    D: DetectorBackend + ?Sized,
{
    let mut samples = Vec::new();

    for (label, (name, person_dir)) in person_directories(directory.as_ref())?
        .into_iter()
        .enumerate()
    {
        let label = label as u32;
        log::info!("processing folder: {}", name);

        for video_path in footage_files(&person_dir)? {
            let mut source = match VideoSource::open(&video_path) {
                Ok(source) => source,
                Err(err) => {
                    log::warn!("could not open video {}: {}", video_path.display(), err);
                    continue;
                }
            };

            let before = samples.len();
            loop {
                let frame = match source.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(err) => {
                        log::warn!(
                            "stopped decoding {} after {} frames: {}",
                            video_path.display(),
                            source.frames_read(),
                            err
                        );
                        break;
                    }
                };
                if frame.is_empty() {
                    continue;
                }

                let gray = frame.to_gray();
                let regions = match detector.detect(&gray) {
                    Ok(regions) => regions,
                    Err(err) => {
                        log::warn!(
                            "{} frame {}: {}",
                            video_path.display(),
                            frame.sequence,
                            err
                        );
                        continue;
                    }
                };
                for region in regions {
                    match region.crop(&gray) {
                        Ok(face) => samples.push(TrainingSample { face, label }),
                        Err(err) => log::debug!("skipping region: {}", err),
                    }
                }
            }
            log::debug!(
                "{}: {} faces from {} frames",
                video_path.display(),
                samples.len() - before,
                source.frames_read()
            );
        }
    }

    log::info!("total detected faces from all frames: {}", samples.len());
    Ok(samples)
}

/// Train a fresh LBPH model from `samples`.
pub fn train(samples: &[TrainingSample], params: LbphParams) -> Result<LbphRecognizer> {
    if samples.is_empty() {
        return Err(Error::EmptyTrainingSet);
    }
    let mut model = LbphRecognizer::new(params)?;
    model.train(samples)?;
    Ok(model)
}

/// Full enrollment: build the index, load footage, train, and record the index in the model.
///
/// Persisting is left to the caller so a failed save does not discard the trained state.
pub fn enroll<D>(
    faces_dir: impl AsRef<Path>,
    detector: &mut D,
    params: LbphParams,
) -> Result<(LabelIndex, LbphRecognizer)>
where
    D: DetectorBackend + ?Sized,
{
    let faces_dir = faces_dir.as_ref();
    let index = LabelIndex::build(faces_dir)?;
    let samples = load_training_data(faces_dir, detector)?;
    let mut model = train(&samples, params)?;
    model.set_label_index(&index);
    log::info!(
        "training complete: {} faces across {} people",
        model.len(),
        index.len()
    );
    Ok((index, model))
}

fn footage_files(person_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(person_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
