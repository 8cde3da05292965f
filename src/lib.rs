//! Astra face recognition
//!
//! Captures webcam frames, finds faces with a cascade detector, identifies
//! them with an LBPH recognizer trained from a directory of per-person
//! footage, and shows annotated frames on a display sink.
//!
//! # Module Structure
//!
//! - `index`: label index derived from the faces directory
//! - `ingest`: camera and training footage sources
//! - `detect`: face detector backends
//! - `recognize`: LBPH recognizer and the per-frame recognition decision
//! - `training`: enrollment from footage
//! - `display`: frame scaling, annotation, display sinks
//! - `session`: camera lifecycle and the capture modes
//! - `config`, `cli`: runtime configuration and the `astra` binary

pub mod cli;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod index;
pub mod ingest;
pub mod recognize;
pub mod session;
pub mod training;

pub use config::{AstraConfig, DisplaySettings};
pub use detect::{build_detector, DetectorBackend, DetectorSettings, StubBackend};
pub use display::{AnnotationStyle, Annotator, DisplaySink, FileSink, NullSink};
pub use error::{Error, Result};
pub use frame::{FaceRegion, Frame};
pub use index::LabelIndex;
pub use ingest::{CameraConfig, CameraSource, VideoSource};
pub use recognize::{
    confidence_from_distance, decide, Decision, Identity, LbphParams, LbphRecognizer, Prediction,
    Recognizer, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use session::{LoopSummary, RecognitionSession, StopReason, Tick};
pub use training::{enroll, load_training_data, train, TrainingSample};
