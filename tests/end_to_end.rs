use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;

use gesturehub::app::{Command, GestureApp};
use gesturehub::config::{ConfigManager, SensorConfig};
use gesturehub::connection::{ConnectionLifecycle, ConnectionState, LifecycleSettings};
use gesturehub::error::{InferenceError, TransportError};
use gesturehub::inference::labels::default_gestures;
use gesturehub::inference::{run_inference_worker, InferenceWorker, InputTensor, LabelSet, Model, WorkerSettings};
use gesturehub::transport::{Notification, Peer, SimulatedTransport, SimulatorHandle};
use gesturehub::types::{ActiveRequest, CancelToken};

const SENSOR_ID: &str = "24:6F:28:AA:BB:CC";

/// Records the tensor it was given and answers with fixed scores.
struct RecordingModel {
    seen: Arc<Mutex<Option<InputTensor>>>,
    scores: Vec<f32>,
}

impl Model for RecordingModel {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
        *self.seen.lock().unwrap() = Some(input.clone());
        Ok(self.scores.clone())
    }
}

fn one_hot(index: usize) -> Vec<f32> {
    let mut scores = vec![0.0; 16];
    scores[index] = 1.0;
    scores
}

fn settings() -> WorkerSettings {
    WorkerSettings {
        labels: LabelSet::new(default_gestures()),
        target_length: 180,
        confidence_threshold: 0.08,
    }
}

fn streaming_lifecycle() -> (ConnectionLifecycle, SimulatorHandle) {
    let (transport, handle) = SimulatedTransport::new(1024);
    let transport = transport.with_peer(Peer::new(SENSOR_ID, "ESP32_MPU6050"));
    let mut lifecycle =
        ConnectionLifecycle::new(Box::new(transport), LifecycleSettings::from(&SensorConfig::default()));
    lifecycle.start_scan().unwrap();
    lifecycle.connect(SENSOR_ID, &CancelToken::new()).unwrap();
    (lifecycle, handle)
}

#[test]
fn constant_session_reaches_model_as_identical_rows() {
    let (mut lifecycle, handle) = streaming_lifecycle();

    for _ in 0..90 {
        assert!(handle.push_raw([0.0, 0.0, 1.0, 0.0, 0.0, 0.0]));
    }
    let session = lifecycle.disconnect().unwrap();
    assert_eq!(session.samples.len(), 90);
    assert_eq!(lifecycle.state(), &ConnectionState::Idle);

    let seen = Arc::new(Mutex::new(None));
    let model = RecordingModel {
        seen: Arc::clone(&seen),
        scores: one_hot(4),
    };
    let worker = InferenceWorker::with_model(settings(), Box::new(model));
    let report = worker
        .classify_session(session.session_id, &session.samples, session.dropped_frames)
        .unwrap();

    assert_eq!(report.raw_samples, 90);
    assert_eq!(report.result.label, "swipe_up");
    assert!(report.result.recognized);

    let tensor = seen.lock().unwrap().take().unwrap();
    assert_eq!(tensor.shape(), [1, 180, 6]);
    let rows: Vec<&[f32]> = tensor.data().chunks(6).collect();
    assert_eq!(rows.len(), 180);
    assert!(rows.iter().all(|row| *row == rows[0]));
    assert!((rows[0][2] - 9.81).abs() < 1e-4);
}

#[test]
fn flat_output_is_gated_to_no_motion() {
    let (mut lifecycle, handle) = streaming_lifecycle();
    handle.push_raw([0.1, 0.2, 0.3, 1.0, 2.0, 3.0]);
    let session = lifecycle.disconnect().unwrap();

    let model = RecordingModel {
        seen: Arc::new(Mutex::new(None)),
        scores: vec![1.0 / 16.0; 16],
    };
    let worker = InferenceWorker::with_model(settings(), Box::new(model));
    let report = worker
        .classify_session(session.session_id, &session.samples, 0)
        .unwrap();
    assert!(!report.result.recognized);
    assert_eq!(report.result.label, "No recognized motion");
}

#[test]
fn second_connect_while_streaming_is_rejected() {
    let (mut lifecycle, handle) = streaming_lifecycle();
    handle.push_raw([1.0; 6]);

    let err = lifecycle.connect(SENSOR_ID, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, TransportError::Busy(_)));

    let session = lifecycle.disconnect().unwrap();
    assert_eq!(session.samples.len(), 1);
}

#[test]
fn connect_failure_returns_to_idle() {
    let (transport, _) = SimulatedTransport::new(8);
    let transport = transport
        .with_peer(Peer::new(SENSOR_ID, "ESP32_MPU6050"))
        .failing_connect(SENSOR_ID);
    let mut lifecycle =
        ConnectionLifecycle::new(Box::new(transport), LifecycleSettings::from(&SensorConfig::default()));
    lifecycle.start_scan().unwrap();

    assert!(lifecycle.connect(SENSOR_ID, &CancelToken::new()).is_err());
    assert_eq!(lifecycle.state(), &ConnectionState::Idle);
}

#[test]
fn malformed_frames_do_not_stop_the_stream() {
    let (mut lifecycle, handle) = streaming_lifecycle();

    for i in 0..30 {
        if i % 10 == 0 {
            handle.push(Notification::Value(vec![0xAB; 23]));
        } else {
            handle.push_raw([i as f32; 6]);
        }
    }
    handle.push(Notification::Empty);

    let session = lifecycle.disconnect().unwrap();
    assert_eq!(session.samples.len(), 27);
    assert_eq!(session.dropped_frames, 4);
}

#[test]
fn blocked_connect_is_cancelled_from_another_thread() {
    let (transport, handle) = SimulatedTransport::new(8);
    let transport = transport
        .with_peer(Peer::new(SENSOR_ID, "ESP32_MPU6050"))
        .with_connect_delay(Duration::from_secs(30));
    let mut lifecycle =
        ConnectionLifecycle::new(Box::new(transport), LifecycleSettings::from(&SensorConfig::default()));
    lifecycle.start_scan().unwrap();

    let active = ActiveRequest::new();
    let canceller = {
        let active = active.clone();
        thread::spawn(move || {
            while !active.cancel() {
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    let started = Instant::now();
    let token = active.begin();
    let err = lifecycle.connect(SENSOR_ID, &token).unwrap_err();
    active.finish();
    canceller.join().unwrap();

    assert!(matches!(err, TransportError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(lifecycle.state(), &ConnectionState::Idle);
    assert!(!handle.is_connected());
}

#[test]
fn console_flow_disconnect_then_classify() {
    let (transport, handle) = SimulatedTransport::new(1024);
    let transport = transport.with_peer(Peer::new(SENSOR_ID, "ESP32_MPU6050"));

    let (task_sender, task_receiver) = bounded(4);
    let shutdown = Arc::new(AtomicBool::new(false));
    let model = RecordingModel {
        seen: Arc::new(Mutex::new(None)),
        scores: one_hot(0),
    };
    let worker = InferenceWorker::with_model(settings(), Box::new(model));
    let worker_handle = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || run_inference_worker(worker, task_receiver, shutdown))
    };

    let mut app = GestureApp::new(
        ConfigManager::new(),
        Box::new(transport),
        task_sender,
        ActiveRequest::new(),
    );
    app.execute(Command::Scan);
    app.update();
    app.execute(Command::Connect("0".to_string()));
    assert!(app.lifecycle.is_streaming());

    for _ in 0..90 {
        handle.push_raw([0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }
    app.execute(Command::Disconnect);
    app.execute(Command::Classify);

    let deadline = Instant::now() + Duration::from_secs(5);
    while app.state.session.last_report.is_none() && Instant::now() < deadline {
        app.update();
        thread::sleep(Duration::from_millis(10));
    }

    let report = app.state.session.last_report.clone().unwrap();
    assert_eq!(report.raw_samples, 90);
    assert_eq!(report.result.label, "circle_cw");
    assert!(app.state.session.finished_session.is_none());

    app.shutdown();
    shutdown.store(true, Ordering::Relaxed);
    worker_handle.join().unwrap();
}
