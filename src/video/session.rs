//! Video page controller.
//!
//! Owns the source, the sampler and the worker. All state changes happen on
//! the thread that drives the session; the worker only posts results back.

use anyhow::Result;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::sampler::{Completion, FrameCacheEntry, FrameRequest, FrameSampler, Sample};
use super::source::{snapshot_jpeg, VideoSource};
use super::worker::{FrameJob, FrameWorker};
use crate::render::DetectionRenderer;

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A cache entry is now on screen.
    Displayed {
        index: usize,
        timestamp_s: f64,
        from_cache: bool,
    },
    Dispatched { timestamp_s: f64 },
    Dropped { timestamp_s: f64 },
    Failed { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// Advance at the source frame rate; frames arriving while busy are dropped.
    RealTime,
    /// Wait for each dispatched frame before advancing.
    Lockstep,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub frames_seen: usize,
    pub dispatched: usize,
    pub cache_hits: usize,
    pub dropped: usize,
    pub failed: usize,
    pub interrupted: bool,
}

impl PlaybackSummary {
    fn count(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Displayed {
                from_cache: true, ..
            } => self.cache_hits += 1,
            SessionEvent::Displayed { .. } => {}
            SessionEvent::Dispatched { .. } => self.dispatched += 1,
            SessionEvent::Dropped { .. } => self.dropped += 1,
            SessionEvent::Failed { .. } => self.failed += 1,
        }
    }
}

pub struct VideoSession {
    source: Box<dyn VideoSource>,
    sampler: FrameSampler,
    worker: FrameWorker,
    renderer: DetectionRenderer,
    /// Upper bound on waiting for one frame in lockstep and drain.
    request_timeout: Duration,
}

impl VideoSession {
    pub fn new(
        source: Box<dyn VideoSource>,
        worker: FrameWorker,
        max_in_flight: usize,
        request_timeout: Duration,
    ) -> Self {
        let sampler = FrameSampler::for_frame_rate(max_in_flight, source.fps());
        Self {
            source,
            sampler,
            worker,
            renderer: DetectionRenderer::new(),
            request_timeout,
        }
    }

    pub fn source(&self) -> &dyn VideoSource {
        self.source.as_ref()
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    pub fn start(&mut self) {
        log::info!("video processing started for {}", self.source.name());
        self.sampler.start();
    }

    pub fn stop(&mut self) {
        log::info!(
            "video processing stopped; {} frames cached",
            self.sampler.entries().len()
        );
        self.sampler.stop();
    }

    /// Handle a playback time update. A frame that cannot be read or sent is
    /// reported as `Failed` and playback carries on.
    pub fn time_update(&mut self, timestamp_s: f64) -> Option<SessionEvent> {
        let event = match self.sampler.on_time_update(timestamp_s) {
            Sample::Stopped => return None,
            Sample::Cached(index) => SessionEvent::Displayed {
                index,
                timestamp_s: self.sampler.entries()[index].timestamp_s,
                from_cache: true,
            },
            Sample::Dispatch(request) => {
                match self.submit(request) {
                    Ok(()) => SessionEvent::Dispatched { timestamp_s },
                    Err(err) => {
                        self.sampler.abandon(request.token);
                        log::warn!("frame at {:.2}s not sent: {:#}", timestamp_s, err);
                        SessionEvent::Failed {
                            message: format!("{:#}", err),
                        }
                    }
                }
            }
            Sample::InFlight | Sample::Busy => SessionEvent::Dropped { timestamp_s },
        };
        Some(event)
    }

    /// Apply worker results. Waits up to `wait` for the first one.
    pub fn pump(&mut self, wait: Duration) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let mut next = if wait.is_zero() {
            self.worker.try_recv()
        } else {
            self.worker.recv_timeout(wait)
        };
        while let Some(result) = next {
            match self
                .sampler
                .complete(result.token, result.outcome, result.processing_time_ms)
            {
                Completion::Applied(index) => {
                    let timestamp_s = self.sampler.entries()[index].timestamp_s;
                    log::debug!(
                        "frame at {:.2}s processed in {} ms",
                        timestamp_s,
                        result.processing_time_ms
                    );
                    events.push(SessionEvent::Displayed {
                        index,
                        timestamp_s,
                        from_cache: false,
                    });
                }
                Completion::Stale => log::debug!("discarding stale frame result"),
                Completion::Failed(err) => {
                    log::warn!("frame processing failed: {:#}", err);
                    events.push(SessionEvent::Failed {
                        message: format!("{:#}", err),
                    });
                }
            }
            next = self.worker.try_recv();
        }
        events
    }

    /// Seek to the previous cached frame.
    pub fn prev(&mut self) -> Option<SessionEvent> {
        let timestamp_s = self.sampler.prev()?;
        self.displayed_at_cursor(timestamp_s)
    }

    /// Seek to the next cached frame.
    pub fn next(&mut self) -> Option<SessionEvent> {
        let timestamp_s = self.sampler.next()?;
        self.displayed_at_cursor(timestamp_s)
    }

    /// The cache entry currently on screen.
    pub fn current(&self) -> Option<&FrameCacheEntry> {
        self.sampler.cursor().and_then(|index| self.sampler.entry(index))
    }

    /// The current frame with its detections drawn on it.
    pub fn overlay(&mut self) -> Result<Option<RgbImage>> {
        let Some(entry) = self.current() else {
            return Ok(None);
        };
        let timestamp_s = entry.timestamp_s;
        let detections = entry.detections.clone();
        let mut frame = self.source.frame_at(timestamp_s)?;
        self.renderer.render(&mut frame, &detections);
        Ok(Some(frame))
    }

    /// Play the whole source once, then stop the session. Frame failures are
    /// counted and passed to `on_event`; they never end playback.
    pub fn run_playback<F>(
        &mut self,
        pacing: Pacing,
        stop: &AtomicBool,
        on_event: F,
    ) -> PlaybackSummary
    where
        F: FnMut(&SessionEvent),
    {
        self.start();
        let summary = self.play(pacing, stop, on_event);
        self.stop();
        summary
    }

    fn play<F>(&mut self, pacing: Pacing, stop: &AtomicBool, mut on_event: F) -> PlaybackSummary
    where
        F: FnMut(&SessionEvent),
    {
        let mut summary = PlaybackSummary::default();
        let frame_interval = Duration::from_secs_f64(1.0 / self.source.fps());

        for index in 0..self.source.frame_count() {
            if stop.load(Ordering::SeqCst) {
                summary.interrupted = true;
                break;
            }
            let tick = Instant::now();
            let timestamp_s = self.source.timestamp_of(index);
            summary.frames_seen += 1;

            let mut events = Vec::new();
            if let Some(event) = self.time_update(timestamp_s) {
                let dispatched = matches!(event, SessionEvent::Dispatched { .. });
                events.push(event);
                if dispatched && pacing == Pacing::Lockstep {
                    events.extend(self.wait_idle(stop));
                }
            }
            events.extend(self.pump(Duration::ZERO));
            for event in &events {
                summary.count(event);
                on_event(event);
            }

            if pacing == Pacing::RealTime {
                if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        }

        if !summary.interrupted {
            for event in self.wait_idle(stop) {
                summary.count(&event);
                on_event(&event);
            }
        }
        summary
    }

    fn submit(&mut self, request: FrameRequest) -> Result<()> {
        let frame = self.source.frame_at(request.timestamp_s)?;
        let jpeg = snapshot_jpeg(&frame)?;
        self.worker.submit(FrameJob {
            token: request.token,
            jpeg,
        })
    }

    /// Drain results until nothing is in flight. Requests still outstanding
    /// at the deadline are expired and reported as one failure.
    fn wait_idle(&mut self, stop: &AtomicBool) -> Vec<SessionEvent> {
        let deadline = Instant::now() + self.request_timeout + Duration::from_secs(1);
        let mut events = Vec::new();
        while self.sampler.in_flight() > 0 {
            if stop.load(Ordering::SeqCst) {
                break;
            }
            if Instant::now() >= deadline {
                let expired = self.sampler.expire_in_flight();
                log::warn!("gave up on {} frame request(s) after timeout", expired);
                events.push(SessionEvent::Failed {
                    message: "timed out waiting for frame results".to_string(),
                });
                break;
            }
            events.extend(self.pump(Duration::from_millis(50)));
        }
        events
    }

    fn displayed_at_cursor(&self, timestamp_s: f64) -> Option<SessionEvent> {
        Some(SessionEvent::Displayed {
            index: self.sampler.cursor()?,
            timestamp_s,
            from_cache: true,
        })
    }

    /// Shut the worker down.
    pub fn close(self) -> Result<()> {
        self.worker.stop()
    }
}
