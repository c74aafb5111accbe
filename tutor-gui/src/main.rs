//! # Piano Tutor - Virtual Keyboard GUI
//!
//! Main GUI application for the camera piano tutor. It shows the virtual
//! keyboard overlay, highlights every sounding note and keeps a log of the
//! practice session.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Detection Thread**: `DetectionWorker` from the core, fed pointer
//!   frames from a simulated hand tracker
//! - **Communication**: Crossbeam channels for frames in and reports out
//! - **Updates**: 60 FPS continuous updates via subscription system

mod pointer_detector;
mod ui;
mod widgets;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use iced::{self, Element, Subscription, Task, Theme};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tutor_core::{
    FrameReport,
    config::EngineConfig,
    detection::{AudioSink, DetectionWorker, DetectorStatus, WorkerMessage},
    hand::Handedness,
    keyboard::{self, KeyRegion, KeyboardLayout},
    note::NoteName,
    note_state::{NoteEvent, NoteTransitions},
    press::PressDetector,
    score::{self, Score},
    session::{PerformanceLog, PracticeMode},
};

use pointer_detector::{PointerDetector, PointerFrame};
use ui::main_display::create_main_view;

const CONFIG_PATH: &str = "tutor_config.json";
const SESSION_PATH: &str = "practice_session.json";
/// Frames waiting for the detector before new ones are dropped.
const FRAME_QUEUE: usize = 4;
/// Lines kept in the on-screen event log.
const EVENT_LOG_LEN: usize = 12;

/// Main entry point for the piano tutor application.
pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter("tutor_gui=info,tutor_core=info")
        .init();

    info!("Starting piano tutor");
    let result = iced::application("Piano Tutor", TutorApp::update, TutorApp::view)
        .subscription(TutorApp::subscription)
        .theme(TutorApp::theme)
        .run();
    info!(?result, "Application finished");
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    // Simulated hand tracker input, in video pixel space
    PointerMoved(Option<keyboard::Point>),
    PointerPressed(bool),

    // Session controls
    SetPracticeMode(PracticeMode),
    ResetSession,
    ExportSession,

    // Program
    SaveConfig,
    LoadConfig,
    Exit,

    // Continuous update message
    Tick,
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub detector_status: DetectorStatus,
    pub last_report: Option<FrameReport>,
    pub regions: Vec<KeyRegion>,
    pub frame_size: (f32, f32),
    /// The picture is shown flipped, as a mirror.
    pub mirrored_video: bool,
    pub press: PressDetector,
    pub current_note: Option<NoteName>,
    pub event_log: VecDeque<String>,
    pub practice_mode: PracticeMode,
    pub played_count: usize,
}

/// Plays notes by logging them; the synthesizer lives outside this app.
struct LoggingAudio;

impl AudioSink for LoggingAudio {
    fn play(&mut self, note: NoteName) {
        info!(%note, frequency = note.frequency(), "play");
    }
}

struct TutorApp {
    config: EngineConfig,
    worker: Option<DetectionWorker>,
    frame_sender: Option<Sender<PointerFrame>>,
    report_receiver: Option<Receiver<WorkerMessage>>,
    pointer: PointerFrame,
    session: PerformanceLog,
    /// Piece the session is scored against.
    exercise: Option<Score>,

    // Single source of truth for all display data
    display_data: AppDisplayData,
}

impl Default for TutorApp {
    fn default() -> Self {
        let config = match EngineConfig::load(CONFIG_PATH) {
            Ok(config) => {
                info!("Loaded config from {}", CONFIG_PATH);
                config
            }
            Err(e) => {
                debug!("Using default config ({})", e);
                EngineConfig::default()
            }
        };

        let exercise = match score::default_exercise() {
            Ok(score) => Some(score),
            Err(e) => {
                error!("Could not load the default exercise: {}", e);
                None
            }
        };

        let mut app = Self {
            display_data: AppDisplayData {
                detector_status: DetectorStatus::Loading,
                last_report: None,
                regions: Vec::new(),
                frame_size: (config.layout.frame_width, config.layout.frame_height),
                mirrored_video: config.mirrored_video,
                press: PressDetector::from_config(&config),
                current_note: None,
                event_log: VecDeque::with_capacity(EVENT_LOG_LEN),
                practice_mode: PracticeMode::default(),
                played_count: 0,
            },
            config,
            worker: None,
            frame_sender: None,
            report_receiver: None,
            pointer: PointerFrame::default(),
            session: PerformanceLog::default(),
            exercise,
        };
        app.start_session();
        app.start_detection();
        app
    }
}

impl TutorApp {
    /// Restarts the session clock and lays the exercise out as expected notes.
    fn start_session(&mut self) {
        self.session.reset();
        if let Some(exercise) = &self.exercise {
            self.session.expect_score(exercise, Handedness::Right);
            debug!(expected = self.session.expected().len(), "Exercise loaded");
        }
    }

    /// Starts the detection thread for the current config.
    ///
    /// This function:
    /// 1. Rebuilds the keyboard layout shown in the overlay
    /// 2. Creates crossbeam channels for frames and reports
    /// 3. Spawns a `DetectionWorker` around the pointer detector
    ///
    /// A config the engine rejects leaves hand tracking unavailable; the
    /// rest of the window keeps working.
    fn start_detection(&mut self) {
        let layout = match KeyboardLayout::from_spec(&self.config.layout) {
            Ok(layout) => layout,
            Err(e) => {
                error!("Invalid keyboard layout: {}", e);
                self.display_data.detector_status = DetectorStatus::Unavailable(e.to_string());
                return;
            }
        };
        self.display_data.regions = layout.regions().to_vec();
        self.display_data.frame_size = (self.config.layout.frame_width, self.config.layout.frame_height);
        self.display_data.mirrored_video = self.config.mirrored_video;
        self.display_data.press = PressDetector::from_config(&self.config);

        let (frame_tx, frame_rx) = crossbeam_channel::bounded(FRAME_QUEUE);
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        let mirrored = self.config.mirrored_video;

        match DetectionWorker::spawn(
            &self.config,
            move || Ok(PointerDetector::new(mirrored)),
            frame_rx,
            report_tx,
            Box::new(LoggingAudio),
        ) {
            Ok(worker) => {
                self.worker = Some(worker);
                self.frame_sender = Some(frame_tx);
                self.report_receiver = Some(report_rx);
            }
            Err(e) => {
                error!("Could not start detection: {:#}", e);
                self.display_data.detector_status = DetectorStatus::Unavailable(e.to_string());
            }
        }
    }

    /// Stops the detection thread and applies its final note releases.
    fn stop_detection(&mut self) {
        self.frame_sender = None;
        if let Some(worker) = self.worker.take() {
            info!("Shutting down detection worker...");
            if let Err(e) = worker.stop() {
                warn!("Detection worker did not stop cleanly: {:#}", e);
            }
        }
        self.drain_reports();
        self.report_receiver = None;
    }

    fn drain_reports(&mut self) {
        let Some(receiver) = &self.report_receiver else {
            return;
        };
        // Collect first to avoid borrowing conflicts
        let messages: Vec<WorkerMessage> = receiver.try_iter().collect();
        for message in messages {
            match message {
                WorkerMessage::Status(status) => {
                    info!(?status, "Detector status");
                    self.display_data.detector_status = status;
                }
                WorkerMessage::Frame(report) => {
                    self.apply_transitions(&report.transitions, report.captured_at);
                    self.display_data.last_report = Some(report);
                }
                WorkerMessage::Stopped(released) => {
                    self.apply_transitions(&released, Instant::now());
                    self.display_data.last_report = None;
                }
            }
        }
    }

    /// Feeds note transitions to the session log and the on-screen log.
    /// `at` is when the detection cycle ran, not when the report arrived.
    fn apply_transitions(&mut self, transitions: &NoteTransitions, at: Instant) {
        if transitions.is_empty() {
            return;
        }
        self.session.record_transitions(transitions, at);

        for event in transitions.clone().into_events() {
            let line = match event {
                NoteEvent::Started(n) => format!("start {}  {} hand, finger {}", n.note, n.hand, n.finger_number()),
                NoteEvent::Ended(n) => format!("end   {}  {} hand, finger {}", n.note, n.hand, n.finger_number()),
            };
            if self.display_data.event_log.len() == EVENT_LOG_LEN {
                self.display_data.event_log.pop_front();
            }
            self.display_data.event_log.push_back(line);
        }

        self.display_data.current_note = self.session.current_note();
        self.display_data.played_count = self.session.played().len();
    }

    fn send_frame(&mut self) {
        let Some(sender) = &self.frame_sender else {
            return;
        };
        match sender.try_send(self.pointer) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Detector busy, dropping frame"),
            Err(TrySendError::Disconnected(_)) => {
                warn!("Detection thread is gone");
                self.frame_sender = None;
            }
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PointerMoved(position) => {
                self.pointer.position = position;
            }
            Message::PointerPressed(pressed) => {
                self.pointer.pressed = pressed;
            }
            Message::SetPracticeMode(mode) => {
                info!(?mode, "Practice mode");
                self.session.set_mode(mode);
                self.display_data.practice_mode = mode;
            }
            Message::ResetSession => {
                self.start_session();
                self.display_data.event_log.clear();
                self.display_data.current_note = None;
                self.display_data.played_count = 0;
            }
            Message::ExportSession => match save_json(&self.session.feedback_request(), SESSION_PATH) {
                Ok(()) => info!("Session saved to {}", SESSION_PATH),
                Err(e) => error!("Error saving session: {:#}", e),
            },
            Message::SaveConfig => match self.config.save(CONFIG_PATH) {
                Ok(()) => info!("Config saved to {}", CONFIG_PATH),
                Err(e) => error!("Error saving config: {}", e),
            },
            Message::LoadConfig => match EngineConfig::load(CONFIG_PATH) {
                Ok(config) => {
                    info!("Config loaded, restarting detection");
                    self.stop_detection();
                    self.config = config;
                    self.display_data.detector_status = DetectorStatus::Loading;
                    self.start_detection();
                }
                Err(e) => error!("Error loading config: {}", e),
            },
            Message::Exit => {
                info!("Exit requested - starting cleanup...");
                self.stop_detection();
                return iced::exit();
            }
            Message::Tick => {
                self.send_frame();
                self.drain_reports();
            }
        }
        Task::none()
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    /// Returns a timer subscription that fires every 16ms (60 FPS); each
    /// tick is one "camera frame".
    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(std::time::Duration::from_millis(16)).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Writes any serializable value as pretty JSON.
fn save_json<T: serde::Serialize>(value: &T, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let json_string = serde_json::to_string_pretty(value)?;
    fs::write(path, json_string).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
