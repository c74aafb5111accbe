// Drives `DetectionWorker` on its own thread with a scripted detector.

use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

use tutor_core::config::EngineConfig;
use tutor_core::detection::{AudioSink, DetectionWorker, DetectorStatus, PoseDetector, WorkerMessage};
use tutor_core::error::DetectorError;
use tutor_core::hand::{Finger, HandObservation, Handedness, Keypoint, Keypoint3D, LANDMARK_COUNT};
use tutor_core::keyboard::KeyboardLayout;
use tutor_core::note::NoteName;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Frames carry the detector's answer directly; `None` simulates a failed call.
struct ScriptedDetector;

impl PoseDetector for ScriptedDetector {
    type Frame = Option<Vec<HandObservation>>;

    fn estimate_hands(&mut self, frame: &Self::Frame) -> Result<Vec<HandObservation>, DetectorError> {
        frame
            .clone()
            .ok_or_else(|| DetectorError::Inference("scripted failure".into()))
    }
}

struct ChannelAudio(Sender<NoteName>);

impl AudioSink for ChannelAudio {
    fn play(&mut self, note: NoteName) {
        let _ = self.0.send(note);
    }
}

fn index_on(layout: &KeyboardLayout, name: &str) -> HandObservation {
    let at = layout.region(name.parse().unwrap()).unwrap().centroid();
    let mut keypoints = vec![Keypoint { x: -500.0, y: -500.0 }; LANDMARK_COUNT];
    let mut keypoints_3d = vec![Keypoint3D::default(); LANDMARK_COUNT];
    keypoints[Finger::Index.tip_index()] = Keypoint { x: at.x, y: at.y };
    keypoints_3d[Finger::Index.tip_index()].z = 0.1;
    HandObservation {
        handedness: Handedness::Left,
        keypoints,
        keypoints_3d,
    }
}

fn next_frame(reports: &Receiver<WorkerMessage>) -> tutor_core::FrameReport {
    loop {
        match reports.recv_timeout(TIMEOUT).expect("worker went quiet") {
            WorkerMessage::Frame(report) => return report,
            WorkerMessage::Status(_) => continue,
            WorkerMessage::Stopped(_) => panic!("worker stopped early"),
        }
    }
}

#[test]
fn worker_reports_status_frames_and_final_release() {
    let config = EngineConfig::default();
    let layout = KeyboardLayout::from_spec(&config.layout).unwrap();
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
    let (report_tx, report_rx) = crossbeam_channel::unbounded();
    let (audio_tx, audio_rx) = crossbeam_channel::unbounded();

    let worker = DetectionWorker::spawn(
        &config,
        || Ok(ScriptedDetector),
        frame_rx,
        report_tx,
        Box::new(ChannelAudio(audio_tx)),
    )
    .unwrap();

    assert!(matches!(
        report_rx.recv_timeout(TIMEOUT).unwrap(),
        WorkerMessage::Status(DetectorStatus::Loading)
    ));
    assert!(matches!(
        report_rx.recv_timeout(TIMEOUT).unwrap(),
        WorkerMessage::Status(DetectorStatus::Ready)
    ));

    frame_tx.send(Some(vec![index_on(&layout, "E4")])).unwrap();
    let report = next_frame(&report_rx);
    assert_eq!(report.transitions.started.len(), 1);
    assert_eq!(report.transitions.started[0].hand, Handedness::Right);
    assert_eq!(audio_rx.recv_timeout(TIMEOUT).unwrap(), "E4".parse::<NoteName>().unwrap());

    frame_tx.send(Some(vec![index_on(&layout, "E4")])).unwrap();
    assert!(next_frame(&report_rx).transitions.is_empty());

    worker.stop().unwrap();

    let released = report_rx
        .try_iter()
        .find_map(|msg| match msg {
            WorkerMessage::Stopped(released) => Some(released),
            _ => None,
        })
        .expect("no Stopped message");
    assert_eq!(released.ended.len(), 1);
    assert_eq!(released.ended[0].note, "E4".parse::<NoteName>().unwrap());
}

#[test]
fn failed_inference_releases_like_an_empty_frame() {
    let config = EngineConfig::default();
    let layout = KeyboardLayout::from_spec(&config.layout).unwrap();
    let (frame_tx, frame_rx) = crossbeam_channel::unbounded();
    let (report_tx, report_rx) = crossbeam_channel::unbounded();
    let (audio_tx, _audio_rx) = crossbeam_channel::unbounded();

    let worker = DetectionWorker::spawn(
        &config,
        || Ok(ScriptedDetector),
        frame_rx,
        report_tx,
        Box::new(ChannelAudio(audio_tx)),
    )
    .unwrap();

    frame_tx.send(Some(vec![index_on(&layout, "C4")])).unwrap();
    assert_eq!(next_frame(&report_rx).sounding.len(), 1);

    frame_tx.send(None).unwrap();
    let report = next_frame(&report_rx);
    assert_eq!(report.transitions.ended.len(), 1);
    assert!(report.sounding.is_empty());

    worker.stop().unwrap();
}

#[test]
fn unavailable_detector_is_reported_and_thread_exits() {
    let (_frame_tx, frame_rx) = crossbeam_channel::unbounded();
    let (report_tx, report_rx) = crossbeam_channel::unbounded();
    let (audio_tx, _audio_rx) = crossbeam_channel::unbounded();

    let worker = DetectionWorker::spawn(
        &EngineConfig::default(),
        || -> Result<ScriptedDetector, DetectorError> {
            Err(DetectorError::Initialization("model file missing".into()))
        },
        frame_rx,
        report_tx,
        Box::new(ChannelAudio(audio_tx)),
    )
    .unwrap();

    assert!(matches!(
        report_rx.recv_timeout(TIMEOUT).unwrap(),
        WorkerMessage::Status(DetectorStatus::Loading)
    ));
    match report_rx.recv_timeout(TIMEOUT).unwrap() {
        WorkerMessage::Status(DetectorStatus::Unavailable(reason)) => {
            assert!(reason.contains("model file missing"));
        }
        other => panic!("unexpected message {:?}", other),
    }

    worker.stop().unwrap();
}

#[test]
fn invalid_config_fails_before_spawning() {
    let mut config = EngineConfig::default();
    config.smoothing_alpha = 1.5;
    let (_frame_tx, frame_rx) = crossbeam_channel::unbounded();
    let (report_tx, _report_rx) = crossbeam_channel::unbounded();
    let (audio_tx, _audio_rx) = crossbeam_channel::unbounded();

    let result = DetectionWorker::spawn(
        &config,
        || Ok(ScriptedDetector),
        frame_rx,
        report_tx,
        Box::new(ChannelAudio(audio_tx)),
    );
    assert!(result.is_err());
}
