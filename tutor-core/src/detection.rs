//! # Detection Loop Module
//!
//! Runs the full per-frame cycle: detect, smooth, hit-test, diff, notify.
//!
//! ## Architecture
//! - **`DetectionEngine`**: synchronous, owns all per-run state (smoothing
//!   history and the sounding-note baseline). One call per frame.
//! - **`DetectionWorker`**: a dedicated thread driving the engine from a
//!   frame channel. At most one detector call is ever in flight, so the
//!   frame rate is throttled by inference latency.
//! - **Communication**: crossbeam channels for frames in, reports out and
//!   the shutdown signal.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::FrameReport;
use crate::config::EngineConfig;
use crate::error::{ConfigError, DetectorError};
use crate::hand::{HandObservation, Handedness};
use crate::keyboard::KeyboardLayout;
use crate::note::NoteName;
use crate::note_state::{NoteStateMachine, NoteTransitions};
use crate::press::{EngagedNote, PressDetector};
use crate::smoothing::LandmarkSmoother;

/// An external hand-pose model.
///
/// Given a video frame it returns zero or more hands. No ordering between
/// calls is assumed.
pub trait PoseDetector {
    type Frame;

    fn estimate_hands(&mut self, frame: &Self::Frame) -> Result<Vec<HandObservation>, DetectorError>;
}

/// Receives note transitions as they happen.
pub trait NoteListener {
    fn on_note_start(&mut self, note: NoteName, finger: u8, hand: Handedness);
    fn on_note_end(&mut self, note: NoteName, finger: u8, hand: Handedness);
}

/// Fire-and-forget note playback.
pub trait AudioSink {
    fn play(&mut self, note: NoteName);
}

/// Availability of hand detection, for the UI to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorStatus {
    Loading,
    Ready,
    /// The model failed to load. Only hand detection is disabled.
    Unavailable(String),
}

impl NoteTransitions {
    /// Invokes the callbacks for every transition, ends first.
    pub fn dispatch(&self, listener: &mut dyn NoteListener) {
        for ended in &self.ended {
            listener.on_note_end(ended.note, ended.finger_number(), ended.hand);
        }
        for started in &self.started {
            listener.on_note_start(started.note, started.finger_number(), started.hand);
        }
    }
}

/// The detection state owned by a single loop.
#[derive(Debug)]
pub struct DetectionEngine {
    layout: KeyboardLayout,
    smoother: LandmarkSmoother,
    press: PressDetector,
    notes: NoteStateMachine,
    frame: u64,
}

impl DetectionEngine {
    /// Builds an engine with the generated keyboard layout from `config`.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = KeyboardLayout::from_spec(&config.layout)?;
        Ok(Self::with_layout(config, layout))
    }

    /// Builds an engine around a hand-made keyboard layout.
    pub fn with_layout(config: &EngineConfig, layout: KeyboardLayout) -> Self {
        Self {
            layout,
            smoother: LandmarkSmoother::new(config.smoothing_alpha),
            press: PressDetector::from_config(config),
            notes: NoteStateMachine::new(),
            frame: 0,
        }
    }

    pub fn layout(&self) -> &KeyboardLayout {
        &self.layout
    }

    pub fn sounding(&self) -> impl Iterator<Item = &EngagedNote> {
        self.notes.sounding()
    }

    /// Runs one cycle on the detector's output for a frame.
    ///
    /// Smoothing always runs before hit testing; the baseline is replaced
    /// only after the transitions have been computed.
    pub fn process(&mut self, raw_hands: &[HandObservation]) -> FrameReport {
        self.frame += 1;
        let captured_at = Instant::now();

        let hands = self.smoother.smooth(raw_hands);
        let engaged = self.press.detect(&hands, &self.layout);
        let transitions = self.notes.advance(&engaged);
        let sounding = self.notes.sounding().copied().collect();

        FrameReport {
            frame: self.frame,
            captured_at,
            hands,
            engaged,
            transitions,
            sounding,
        }
    }

    /// Like [`process`](Self::process), but absorbs a failed inference.
    ///
    /// A failed frame counts as a frame with no hands, so anything that was
    /// sounding ends instead of getting stuck.
    pub fn process_detection(
        &mut self,
        detection: Result<Vec<HandObservation>, DetectorError>,
    ) -> FrameReport {
        match detection {
            Ok(hands) => self.process(&hands),
            Err(e) => {
                warn!("Dropping frame {}: {}", self.frame + 1, e);
                self.process(&[])
            }
        }
    }

    /// Runs one cycle and notifies the listener and audio sink.
    pub fn process_and_notify(
        &mut self,
        raw_hands: &[HandObservation],
        listener: &mut dyn NoteListener,
        audio: &mut dyn AudioSink,
    ) -> FrameReport {
        let report = self.process(raw_hands);
        report.transitions.dispatch(listener);
        for started in &report.transitions.started {
            audio.play(started.note);
        }
        report
    }

    /// Ends every sounding note and forgets hand history.
    ///
    /// Called when the loop stops so that a later restart begins with
    /// every note silent.
    pub fn stop(&mut self) -> NoteTransitions {
        self.smoother.reset();
        NoteTransitions {
            started: Vec::new(),
            ended: self.notes.release_all(),
        }
    }
}

/// Messages sent from the detection thread to its owner.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Status(DetectorStatus),
    Frame(FrameReport),
    /// The loop stopped; these notes were released.
    Stopped(NoteTransitions),
}

/// Detection thread management structure.
///
/// Handles the dedicated detection thread and provides a way to shut it
/// down gracefully.
#[derive(Debug)]
pub struct DetectionWorker {
    shutdown_tx: Sender<()>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    /// Starts the detection thread.
    ///
    /// This function:
    /// 1. Builds the engine from `config` (fails fast on a bad layout)
    /// 2. Spawns a thread that constructs the detector with `make_detector`
    /// 3. Processes the newest available frame, one at a time, until shut
    ///    down or the frame channel closes
    ///
    /// # Arguments
    /// * `config` - Engine configuration
    /// * `make_detector` - Loads the pose model on the detection thread
    /// * `frames` - Incoming video frames
    /// * `reports` - Status, per-frame reports and the final release
    /// * `audio` - Plays every started note within the cycle
    pub fn spawn<D, F>(
        config: &EngineConfig,
        make_detector: F,
        frames: Receiver<D::Frame>,
        reports: Sender<WorkerMessage>,
        mut audio: Box<dyn AudioSink + Send>,
    ) -> Result<Self>
    where
        D: PoseDetector + 'static,
        D::Frame: Send + 'static,
        F: FnOnce() -> Result<D, DetectorError> + Send + 'static,
    {
        let mut engine = DetectionEngine::new(config)?;
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let thread_handle = thread::Builder::new()
            .name("hand-detection".to_string())
            .spawn(move || {
                info!("Detection thread starting");
                let _ = reports.send(WorkerMessage::Status(DetectorStatus::Loading));

                let mut detector = match make_detector() {
                    Ok(detector) => detector,
                    Err(e) => {
                        warn!("Hand detection unavailable: {}", e);
                        let _ = reports.send(WorkerMessage::Status(DetectorStatus::Unavailable(
                            e.to_string(),
                        )));
                        return;
                    }
                };
                let _ = reports.send(WorkerMessage::Status(DetectorStatus::Ready));

                loop {
                    crossbeam_channel::select! {
                        recv(frames) -> msg => match msg {
                            Ok(mut frame) => {
                                let mut skipped = 0usize;
                                while let Ok(newer) = frames.try_recv() {
                                    frame = newer;
                                    skipped += 1;
                                }
                                if skipped > 0 {
                                    debug!(skipped, "skipped stale frames");
                                }

                                let detection = detector.estimate_hands(&frame);

                                // Shutdown arrived while the detector was busy:
                                // let the call finish, discard its result.
                                if shutdown_rx.try_recv().is_ok() {
                                    info!("Shutdown during inference, discarding frame");
                                    break;
                                }

                                let report = engine.process_detection(detection);
                                for started in &report.transitions.started {
                                    audio.play(started.note);
                                }
                                if reports.send(WorkerMessage::Frame(report)).is_err() {
                                    warn!("Report channel closed");
                                    break;
                                }
                            }
                            Err(_) => {
                                info!("Frame channel closed");
                                break;
                            }
                        },
                        recv(shutdown_rx) -> _ => {
                            info!("Received shutdown signal");
                            break;
                        },
                    }
                }

                let released = engine.stop();
                if !released.ended.is_empty() {
                    info!("Releasing {} sounding notes", released.ended.len());
                }
                let _ = reports.send(WorkerMessage::Stopped(released));
                info!("Detection thread finished");
            })?;

        Ok(Self {
            shutdown_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Stops the loop and waits for the thread to exit.
    ///
    /// An in-flight detector call is allowed to complete; its result is
    /// thrown away.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown();
        if let Some(handle) = self.thread_handle.take() {
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("detection thread panicked"))?;
        }
        Ok(())
    }

    fn shutdown(&self) {
        let _ = self.shutdown_tx.try_send(());
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
