//! Recognition session: camera, detector, recognizer and label index bound
//! together for the capture modes.
//!
//! The camera is opened on first use and held until `close`, the end of a
//! capture loop, or drop. Closing releases the camera before the recognizer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use image::RgbImage;

use crate::config::AstraConfig;
use crate::detect::{build_detector, DetectorBackend};
use crate::display::{present_scaled, AnnotationStyle, Annotator, DisplaySink};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::index::LabelIndex;
use crate::ingest::{CameraConfig, CameraSource};
use crate::recognize::{decide, Decision, Identity, LbphRecognizer, Recognizer};

/// Outcome of one capture tick.
#[derive(Clone, Debug)]
pub enum Tick {
    /// The camera returned an empty read.
    NoFrame,
    /// A frame was read and a decision made. `frame` is the color frame as
    /// presented, annotated when a face was identified.
    Decided { decision: Decision, frame: RgbImage },
}

impl Tick {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Tick::NoFrame => None,
            Tick::Decided { decision, .. } => decision.identity(),
        }
    }
}

/// Why a capture loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    FrameLimit,
    CameraUnavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub frames: u64,
    pub empty_reads: u64,
    pub identified: u64,
    /// Frames dropped after a detection or recognition failure.
    pub failed: u64,
    pub stop_reason: StopReason,
}

pub struct RecognitionSession {
    // Field order matters: the camera drops before the recognizer.
    camera: Option<CameraSource>,
    recognizer: Option<Box<dyn Recognizer>>,
    detector: Box<dyn DetectorBackend>,
    camera_config: CameraConfig,
    index: LabelIndex,
    threshold: f64,
    annotator: Annotator,
}

impl RecognitionSession {
    pub fn new(
        camera_config: CameraConfig,
        detector: Box<dyn DetectorBackend>,
        recognizer: Box<dyn Recognizer>,
        index: LabelIndex,
        threshold: f64,
    ) -> Self {
        Self {
            camera: None,
            recognizer: Some(recognizer),
            detector,
            camera_config,
            index,
            threshold,
            annotator: Annotator::new(),
        }
    }

    /// Build a session from configuration: label index from the faces
    /// directory, the configured detector, and the saved recognizer model.
    pub fn load(config: &AstraConfig) -> Result<Self> {
        let index = LabelIndex::build(&config.faces_dir)?;
        let detector = build_detector(&config.detector)?;
        let recognizer = LbphRecognizer::load(&config.recognizer_model)?;
        if !recognizer.matches_index(&index) {
            log::warn!(
                "recognizer model {} was trained on labels {:?}; faces directory now lists {:?}",
                config.recognizer_model.display(),
                recognizer.label_names(),
                index.names()
            );
        }
        log::info!(
            "session ready: {} identities, detector '{}', threshold {}",
            index.len(),
            detector.name(),
            config.confidence_threshold
        );

        let annotator = match &config.display.font {
            Some(path) => Annotator::with_font_file(path)?,
            None => Annotator::new(),
        };
        Ok(Self::new(
            config.camera.clone(),
            detector,
            Box::new(recognizer),
            index,
            config.confidence_threshold,
        )
        .with_annotator(annotator))
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn index(&self) -> &LabelIndex {
        &self.index
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_camera_open(&self) -> bool {
        self.camera.as_ref().is_some_and(CameraSource::is_open)
    }

    pub fn is_closed(&self) -> bool {
        self.recognizer.is_none()
    }

    /// One tick: returns the identity on a confident match, otherwise shows
    /// the frame as captured and returns `None`.
    pub fn recognize<S: DisplaySink + ?Sized>(&mut self, sink: &mut S) -> Result<Option<Identity>> {
        let Some((decision, frame)) = self.next_decision()? else {
            return Ok(None);
        };
        match decision.into_identity() {
            Some(identity) => Ok(Some(identity)),
            None => {
                present_scaled(sink, &frame.to_rgb())?;
                Ok(None)
            }
        }
    }

    /// One tick: annotates a confident match and always shows the frame.
    pub fn capture_frame<S: DisplaySink + ?Sized>(&mut self, sink: &mut S) -> Result<Tick> {
        self.tick(sink, AnnotationStyle::SINGLE)
    }

    /// Repeat ticks until `stop` is set, `max_frames` ticks have run, or the
    /// camera fails. Detection and recognition failures drop the frame and the
    /// loop moves on. The camera is released on every exit.
    pub fn run_capture_loop<S: DisplaySink + ?Sized>(
        &mut self,
        sink: &mut S,
        stop: &AtomicBool,
        max_frames: Option<u64>,
    ) -> Result<LoopSummary> {
        let interval = frame_interval(self.camera_config.target_fps);
        let mut summary = LoopSummary {
            ticks: 0,
            frames: 0,
            empty_reads: 0,
            identified: 0,
            failed: 0,
            stop_reason: StopReason::Interrupted,
        };

        let result = loop {
            if stop.load(Ordering::SeqCst) {
                summary.stop_reason = StopReason::Interrupted;
                break Ok(());
            }
            if max_frames.is_some_and(|limit| summary.ticks >= limit) {
                summary.stop_reason = StopReason::FrameLimit;
                break Ok(());
            }

            let started = Instant::now();
            summary.ticks += 1;
            match self.tick(sink, AnnotationStyle::LOOP) {
                Ok(Tick::NoFrame) => summary.empty_reads += 1,
                Ok(tick) => {
                    summary.frames += 1;
                    if tick.identity().is_some() {
                        summary.identified += 1;
                    }
                }
                Err(Error::CameraUnavailable { device, reason }) => {
                    log::error!("capture loop: camera {} unavailable: {}", device, reason);
                    summary.stop_reason = StopReason::CameraUnavailable;
                    break Ok(());
                }
                Err(err @ (Error::DetectionFailure(_) | Error::InvalidFace(_))) => {
                    log::warn!("capture loop: frame {} skipped: {}", summary.ticks, err);
                    summary.failed += 1;
                }
                Err(err) => break Err(err),
            }

            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        };

        self.release_camera();
        log::info!(
            "capture loop stopped ({:?}): {} ticks, {} frames, {} identified, {} failed",
            summary.stop_reason,
            summary.ticks,
            summary.frames,
            summary.identified,
            summary.failed
        );
        result.map(|()| summary)
    }

    /// Release the camera, then the recognizer. Safe to call more than once.
    pub fn close(&mut self) {
        self.release_camera();
        if self.recognizer.take().is_some() {
            log::debug!("session: recognizer released");
        }
    }

    fn release_camera(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.release();
        }
    }

    fn tick<S: DisplaySink + ?Sized>(&mut self, sink: &mut S, style: AnnotationStyle) -> Result<Tick> {
        let Some((decision, frame)) = self.next_decision()? else {
            return Ok(Tick::NoFrame);
        };
        let mut color = frame.to_rgb();
        if let Decision::Identified(identity) = &decision {
            let caption = format!("{} - {:.6}", identity.name, identity.confidence);
            self.annotator
                .annotate(&mut color, identity.region, &caption, style);
        }
        present_scaled(sink, &color)?;
        Ok(Tick::Decided {
            decision,
            frame: color,
        })
    }

    fn next_decision(&mut self) -> Result<Option<(Decision, Frame)>> {
        if self.recognizer.is_none() {
            return Err(Error::SessionClosed);
        }
        let Some(frame) = self.read_frame()? else {
            log::warn!("session: empty frame from camera, skipping tick");
            return Ok(None);
        };
        let recognizer = self.recognizer.as_deref().ok_or(Error::SessionClosed)?;
        let decision = decide(
            &frame,
            &mut *self.detector,
            recognizer,
            &self.index,
            self.threshold,
        )?;
        Ok(Some((decision, frame)))
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.camera.is_none() {
            let mut camera = CameraSource::new(self.camera_config.clone())?;
            camera.connect()?;
            self.camera = Some(camera);
        }
        match self.camera.as_mut() {
            Some(camera) => camera.next_frame(),
            None => Err(Error::CameraUnavailable {
                device: self.camera_config.device.clone(),
                reason: "camera not open".to_string(),
            }),
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(1) / target_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use crate::display::NullSink;
    use crate::frame::FaceRegion;
    use crate::recognize::{LbphParams, Prediction};
    use crate::training::TrainingSample;
    use image::{GrayImage, Luma, Rgb};

    struct FixedRecognizer(Prediction);

    impl Recognizer for FixedRecognizer {
        fn predict(&self, _face: &GrayImage) -> Result<Prediction> {
            Ok(self.0)
        }
    }

    fn session(device: &str, label: u32, distance: f64) -> RecognitionSession {
        let camera = CameraConfig {
            device: device.to_string(),
            target_fps: 1000,
            width: 32,
            height: 24,
        };
        RecognitionSession::new(
            camera,
            Box::new(StubBackend::new()),
            Box::new(FixedRecognizer(Prediction {
                label: Some(label),
                distance,
            })),
            LabelIndex::from_names(["alice", "bob"]),
            0.2,
        )
    }

    #[test]
    fn camera_opens_lazily() -> Result<()> {
        let mut session = session("stub://test", 0, 70.0);
        assert!(!session.is_camera_open());

        let mut sink = NullSink::new((32, 24));
        session.capture_frame(&mut sink)?;
        assert!(session.is_camera_open());
        Ok(())
    }

    #[test]
    fn recognize_returns_identity_without_presenting() -> Result<()> {
        let mut session = session("stub://test", 0, 70.0);
        let mut sink = NullSink::new((32, 24));

        let identity = session.recognize(&mut sink)?.expect("identity");
        assert_eq!(identity.name, "alice");
        assert!((identity.confidence - 0.30).abs() < 1e-9);
        assert_eq!(sink.frames_presented(), 0);
        Ok(())
    }

    #[test]
    fn recognize_presents_frame_when_unmatched() -> Result<()> {
        let mut session = session("stub://test", 1, 95.0);
        let mut sink = NullSink::new((32, 24));

        assert!(session.recognize(&mut sink)?.is_none());
        assert_eq!(sink.frames_presented(), 1);
        Ok(())
    }

    #[test]
    fn capture_frame_annotates_match() -> Result<()> {
        let mut session = session("stub://test", 0, 70.0);
        let mut sink = NullSink::new((32, 24));

        let tick = session.capture_frame(&mut sink)?;
        let Tick::Decided { decision, frame } = tick else {
            panic!("expected a decided tick");
        };
        assert_eq!(decision.identity().map(|i| i.name.as_str()), Some("alice"));
        assert_eq!(*frame.get_pixel(0, 0), Rgb([0, 0, 255]));
        assert_eq!(sink.frames_presented(), 1);
        Ok(())
    }

    #[test]
    fn empty_read_is_not_fatal() -> Result<()> {
        let mut session = session("stub://empty", 0, 70.0);
        let mut sink = NullSink::new((32, 24));

        assert!(matches!(session.capture_frame(&mut sink)?, Tick::NoFrame));
        assert!(session.recognize(&mut sink)?.is_none());
        assert_eq!(sink.frames_presented(), 0);
        Ok(())
    }

    #[test]
    fn loop_stops_at_frame_limit_and_releases_camera() -> Result<()> {
        let mut session = session("stub://test", 0, 70.0);
        let mut sink = NullSink::new((32, 24));
        let stop = AtomicBool::new(false);

        let summary = session.run_capture_loop(&mut sink, &stop, Some(3))?;
        assert_eq!(summary.stop_reason, StopReason::FrameLimit);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.identified, 3);
        assert_eq!(sink.frames_presented(), 3);
        assert!(!session.is_camera_open());
        Ok(())
    }

    #[test]
    fn loop_honors_stop_flag() -> Result<()> {
        let mut session = session("stub://test", 0, 70.0);
        let mut sink = NullSink::new((32, 24));
        let stop = AtomicBool::new(true);

        let summary = session.run_capture_loop(&mut sink, &stop, None)?;
        assert_eq!(summary.stop_reason, StopReason::Interrupted);
        assert_eq!(summary.ticks, 0);
        Ok(())
    }

    #[test]
    fn loop_halts_without_camera() -> Result<()> {
        let mut session = session("stub://unavailable", 0, 70.0);
        let mut sink = NullSink::new((32, 24));
        let stop = AtomicBool::new(false);

        let summary = session.run_capture_loop(&mut sink, &stop, None)?;
        assert_eq!(summary.stop_reason, StopReason::CameraUnavailable);
        assert_eq!(summary.frames, 0);
        assert!(!session.is_camera_open());
        Ok(())
    }

    #[test]
    fn loop_counts_empty_reads() -> Result<()> {
        let mut session = session("stub://empty", 0, 70.0);
        let mut sink = NullSink::new((32, 24));
        let stop = AtomicBool::new(false);

        let summary = session.run_capture_loop(&mut sink, &stop, Some(2))?;
        assert_eq!(summary.empty_reads, 2);
        assert_eq!(summary.frames, 0);
        Ok(())
    }

    #[test]
    fn loop_continues_past_face_cut_off_at_edge() -> Result<()> {
        let face = GrayImage::from_fn(48, 48, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let mut model = LbphRecognizer::new(LbphParams::default())?;
        model.train(&[TrainingSample { face, label: 0 }])?;

        let camera = CameraConfig {
            device: "stub://test".to_string(),
            target_fps: 1000,
            width: 64,
            height: 48,
        };
        // Clamps to a 6x40 strip, too narrow for the 8x8 grid.
        let detector = StubBackend::with_regions(vec![FaceRegion::new(58, 0, 40, 40)]);
        let mut session = RecognitionSession::new(
            camera,
            Box::new(detector),
            Box::new(model),
            LabelIndex::from_names(["alice"]),
            0.2,
        );
        let mut sink = NullSink::new((64, 48));
        let stop = AtomicBool::new(false);

        let summary = session.run_capture_loop(&mut sink, &stop, Some(5))?;
        assert_eq!(summary.stop_reason, StopReason::FrameLimit);
        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.failed, 5);
        assert_eq!(summary.frames, 0);
        assert!(!session.is_camera_open());
        Ok(())
    }

    #[test]
    fn loop_propagates_unknown_label() {
        let mut session = session("stub://test", 7, 10.0);
        let mut sink = NullSink::new((32, 24));
        let stop = AtomicBool::new(false);

        let result = session.run_capture_loop(&mut sink, &stop, Some(5));
        assert!(matches!(result, Err(Error::UnknownLabel(7))));
        assert!(!session.is_camera_open());
    }

    #[test]
    fn close_is_idempotent() -> Result<()> {
        let mut session = session("stub://test", 0, 70.0);
        let mut sink = NullSink::new((32, 24));
        session.capture_frame(&mut sink)?;

        session.close();
        assert!(!session.is_camera_open());
        assert!(session.is_closed());
        session.close();

        assert!(matches!(
            session.capture_frame(&mut sink),
            Err(Error::SessionClosed)
        ));
        assert!(!session.is_camera_open());
        Ok(())
    }
}
