use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use paddy_scout::client::{FrameAnalysis, PredictOutcome};
use paddy_scout::video::{
    FrameWorker, MjpegFileSource, Pacing, SessionEvent, SyntheticSource, VideoSession,
};
use paddy_scout::video::source::snapshot_jpeg;
use paddy_scout::{Detection, FrameStatistics, ImageUpload, InferenceClient, PlantClass};

/// Answers every frame with one weed and counts calls.
#[derive(Clone)]
struct CountingClient {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    /// Calls with these 1-based numbers fail.
    failing: Arc<Mutex<Vec<usize>>>,
}

impl CountingClient {
    fn new(delay: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay,
            failing: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceClient for CountingClient {
    fn predict(&self, _upload: &ImageUpload) -> Result<PredictOutcome> {
        Err(anyhow!("not used"))
    }

    fn process_frame(&self, jpeg: &[u8]) -> Result<FrameAnalysis> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        std::thread::sleep(self.delay);
        if self.failing.lock().unwrap().contains(&call) {
            return Err(anyhow!("server responded with 502"));
        }
        let detections = vec![Detection::new(
            PlantClass::Weed,
            0.7,
            [40.0, 40.0, 10.0, 10.0],
        )];
        Ok(FrameAnalysis {
            statistics: FrameStatistics::from_detections(&detections),
            detections,
        })
    }
}

fn session(client: CountingClient) -> VideoSession {
    let source = SyntheticSource::new("stub://east_field", 10).unwrap();
    let worker = FrameWorker::spawn(client).unwrap();
    VideoSession::new(Box::new(source), worker, 1, Duration::from_secs(5))
}

fn wait_for_display(session: &mut VideoSession) -> SessionEvent {
    for _ in 0..100 {
        if let Some(event) = session.pump(Duration::from_millis(50)).into_iter().next() {
            return event;
        }
    }
    panic!("no frame result arrived");
}

#[test]
fn same_timestamp_within_tolerance_calls_service_once() {
    let client = CountingClient::new(Duration::ZERO);
    let mut session = session(client.clone());
    session.start();

    let first = session.time_update(1.0);
    assert_eq!(first, Some(SessionEvent::Dispatched { timestamp_s: 1.0 }));
    assert!(matches!(
        wait_for_display(&mut session),
        SessionEvent::Displayed {
            from_cache: false,
            ..
        }
    ));

    let replay = session.time_update(1.02);
    assert!(matches!(
        replay,
        Some(SessionEvent::Displayed {
            from_cache: true,
            ..
        })
    ));
    assert_eq!(client.calls(), 1);
    assert!(session.overlay().unwrap().is_some());
    session.close().unwrap();
}

#[test]
fn duplicate_update_while_in_flight_is_dropped() {
    let client = CountingClient::new(Duration::from_millis(200));
    let mut session = session(client.clone());
    session.start();

    session.time_update(2.0);
    assert_eq!(
        session.time_update(2.01),
        Some(SessionEvent::Dropped { timestamp_s: 2.01 })
    );
    wait_for_display(&mut session);
    assert_eq!(client.calls(), 1);
    session.close().unwrap();
}

#[test]
fn results_arriving_after_stop_are_not_rendered() {
    let client = CountingClient::new(Duration::from_millis(150));
    let mut session = session(client.clone());
    session.start();
    session.time_update(0.5);
    session.stop();

    std::thread::sleep(Duration::from_millis(300));
    assert!(session.pump(Duration::from_millis(100)).is_empty());
    assert!(session.sampler().entries().is_empty());
    assert!(session.current().is_none());
    assert_eq!(session.time_update(0.6), None);
    session.close().unwrap();
}

#[test]
fn lockstep_playback_analyzes_every_frame_and_allows_review() {
    let client = CountingClient::new(Duration::ZERO);
    client.failing.lock().unwrap().push(3);
    let mut session = session(client.clone());
    let stop = AtomicBool::new(false);

    let mut failures = Vec::new();
    let summary = session
        .run_playback(Pacing::Lockstep, &stop, |event| {
            if let SessionEvent::Failed { message } = event {
                failures.push(message.clone());
            }
        });

    assert_eq!(summary.frames_seen, 50);
    assert_eq!(summary.dispatched, 50);
    assert_eq!(summary.failed, 1);
    assert!(!summary.interrupted);
    assert_eq!(failures, vec!["server responded with 502".to_string()]);
    assert_eq!(session.sampler().entries().len(), 49);
    assert!(!session.sampler().is_running());

    // Review walks the cache without new calls.
    let calls = client.calls();
    let before = session.current().map(|e| e.timestamp_s);
    assert!(session.prev().is_some());
    let after = session.current().map(|e| e.timestamp_s);
    assert!(after < before);
    assert!(session.next().is_some());
    assert_eq!(client.calls(), calls);
    session.close().unwrap();
}

#[test]
fn interrupted_playback_stops_early() {
    let client = CountingClient::new(Duration::ZERO);
    let mut session = session(client);
    let stop = AtomicBool::new(true);
    let summary = session.run_playback(Pacing::RealTime, &stop, |_| {});
    assert!(summary.interrupted);
    assert_eq!(summary.frames_seen, 0);
    session.close().unwrap();
}

#[test]
fn restart_clears_cache() {
    let client = CountingClient::new(Duration::ZERO);
    let mut session = session(client.clone());
    session.start();
    session.time_update(1.0);
    wait_for_display(&mut session);
    session.stop();
    assert_eq!(session.sampler().entries().len(), 1);

    session.start();
    assert!(session.sampler().entries().is_empty());
    session.time_update(1.0);
    wait_for_display(&mut session);
    assert_eq!(client.calls(), 2);
    session.close().unwrap();
}

fn mjpeg_session(client: CountingClient, data: Vec<u8>, timeout: Duration) -> VideoSession {
    let source = MjpegFileSource::from_bytes("plot.mjpeg".to_string(), data, 10).unwrap();
    let worker = FrameWorker::spawn(client).unwrap();
    VideoSession::new(Box::new(source), worker, 1, timeout)
}

fn jpeg(shade: u8) -> Vec<u8> {
    snapshot_jpeg(&RgbImage::from_pixel(16, 16, Rgb([shade, 120, shade]))).unwrap()
}

#[test]
fn unreadable_frame_is_reported_and_playback_continues() {
    let mut data = jpeg(20);
    data.extend_from_slice(&[0xFF, 0xD8, 0x00, 0x00, 0xFF, 0xD9]);
    data.extend_from_slice(&jpeg(200));

    let client = CountingClient::new(Duration::ZERO);
    let mut session = mjpeg_session(client.clone(), data, Duration::from_secs(5));
    assert_eq!(session.source().frame_count(), 3);

    let stop = AtomicBool::new(false);
    let mut failures = Vec::new();
    let summary = session.run_playback(Pacing::Lockstep, &stop, |event| {
        if let SessionEvent::Failed { message } = event {
            failures.push(message.clone());
        }
    });

    assert_eq!(summary.frames_seen, 3);
    assert_eq!(summary.dispatched, 2);
    assert_eq!(summary.failed, 1);
    assert!(failures[0].contains("decode frame 1"), "{failures:?}");
    assert_eq!(client.calls(), 2);
    assert_eq!(session.sampler().entries().len(), 2);
    assert!(!session.sampler().is_running());
    session.close().unwrap();
}

#[test]
fn slow_results_time_out_without_ending_playback() {
    let data = [jpeg(10), jpeg(90)].concat();
    let client = CountingClient::new(Duration::from_millis(1500));
    let mut session = mjpeg_session(client, data, Duration::ZERO);

    let stop = AtomicBool::new(false);
    let summary = session.run_playback(Pacing::Lockstep, &stop, |_| {});

    assert_eq!(summary.frames_seen, 2);
    assert_eq!(summary.dispatched, 2);
    assert_eq!(summary.failed, 2);
    assert!(session.sampler().entries().is_empty());
    assert_eq!(session.sampler().in_flight(), 0);
    assert!(!session.sampler().is_running());
    session.close().unwrap();
}
