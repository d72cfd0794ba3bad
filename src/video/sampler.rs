//! Timestamp-keyed frame cache and request bookkeeping for video playback.
//!
//! The sampler never touches the network. It decides, per time update,
//! whether cached detections can be replayed or a new frame request should
//! be dispatched, and it validates completions against the session
//! generation so results from a stopped session are never applied.

use anyhow::Error;
use std::collections::VecDeque;

use crate::client::FrameAnalysis;
use crate::detect::{Detection, FrameStatistics};

/// Two timestamps closer than this address the same frame.
pub const FRAME_MATCH_TOLERANCE_S: f64 = 0.04;
/// Processing times kept for the rolling metrics.
pub const METRICS_WINDOW: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct FrameCacheEntry {
    pub timestamp_s: f64,
    pub detections: Vec<Detection>,
    pub statistics: FrameStatistics,
    pub processing_time_ms: u64,
}

/// Identifies a dispatched request. `generation` changes on every start/stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestToken {
    pub generation: u64,
    pub seq: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRequest {
    pub token: RequestToken,
    pub timestamp_s: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Processing,
}

/// What to do with a time update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// Session not running; nothing to do.
    Stopped,
    /// Replay the cache entry at this index.
    Cached(usize),
    /// Snapshot the frame and send it.
    Dispatch(FrameRequest),
    /// A request for this timestamp is already outstanding.
    InFlight,
    /// Too many requests outstanding; update dropped.
    Busy,
}

#[derive(Debug)]
pub enum Completion {
    /// Stored at this cache index.
    Applied(usize),
    /// From an earlier generation, or unknown; discarded.
    Stale,
    Failed(Error),
}

#[derive(Clone, Debug, Default)]
pub struct ProcessingMetrics {
    window: VecDeque<u64>,
}

impl ProcessingMetrics {
    pub fn record(&mut self, processing_time_ms: u64) {
        if self.window.len() == METRICS_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(processing_time_ms);
    }

    pub fn average_ms(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<u64>() as f64 / self.window.len() as f64)
    }

    /// Frames per second the service sustains at the average processing time.
    pub fn fps(&self) -> Option<f64> {
        self.average_ms()
            .filter(|avg| *avg > 0.0)
            .map(|avg| 1000.0 / avg)
    }

    pub fn samples(&self) -> usize {
        self.window.len()
    }

    fn clear(&mut self) {
        self.window.clear();
    }
}

pub struct FrameSampler {
    max_in_flight: usize,
    /// Two timestamps closer than this share a cache entry.
    tolerance_s: f64,
    running: bool,
    generation: u64,
    seq: u64,
    /// Sorted by timestamp.
    cache: Vec<FrameCacheEntry>,
    in_flight: Vec<FrameRequest>,
    cursor: Option<usize>,
    metrics: ProcessingMetrics,
}

impl FrameSampler {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
            tolerance_s: FRAME_MATCH_TOLERANCE_S,
            running: false,
            generation: 0,
            seq: 0,
            cache: Vec::new(),
            in_flight: Vec::new(),
            cursor: None,
            metrics: ProcessingMetrics::default(),
        }
    }

    /// Sampler for a source of known frame rate. The match tolerance is
    /// capped at half a frame interval so neighbouring frames never share an
    /// entry (at 25 fps frames are exactly `FRAME_MATCH_TOLERANCE_S` apart).
    pub fn for_frame_rate(max_in_flight: usize, fps: f64) -> Self {
        let mut sampler = Self::new(max_in_flight);
        if fps.is_finite() && fps > 0.0 {
            sampler.tolerance_s = FRAME_MATCH_TOLERANCE_S.min(0.5 / fps);
        }
        sampler
    }

    /// Begin a session: clears the cache, cursor and metrics.
    pub fn start(&mut self) {
        self.generation += 1;
        self.running = true;
        self.cache.clear();
        self.in_flight.clear();
        self.cursor = None;
        self.metrics.clear();
    }

    /// End the session. Outstanding requests become stale; the cache is kept
    /// for review.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.running = false;
        self.in_flight.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> SamplerState {
        if self.in_flight.is_empty() {
            SamplerState::Idle
        } else {
            SamplerState::Processing
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn on_time_update(&mut self, timestamp_s: f64) -> Sample {
        if !self.running {
            return Sample::Stopped;
        }
        if let Some(index) = self.lookup(timestamp_s) {
            self.cursor = Some(index);
            return Sample::Cached(index);
        }
        if self
            .in_flight
            .iter()
            .any(|req| self.same_frame(req.timestamp_s, timestamp_s))
        {
            return Sample::InFlight;
        }
        if self.in_flight.len() >= self.max_in_flight {
            return Sample::Busy;
        }
        self.seq += 1;
        let request = FrameRequest {
            token: RequestToken {
                generation: self.generation,
                seq: self.seq,
            },
            timestamp_s,
        };
        self.in_flight.push(request);
        Sample::Dispatch(request)
    }

    /// Apply a finished request.
    pub fn complete(
        &mut self,
        token: RequestToken,
        outcome: anyhow::Result<FrameAnalysis>,
        processing_time_ms: u64,
    ) -> Completion {
        if token.generation != self.generation {
            return Completion::Stale;
        }
        let Some(pos) = self.in_flight.iter().position(|req| req.token == token) else {
            return Completion::Stale;
        };
        let request = self.in_flight.remove(pos);
        match outcome {
            Ok(analysis) => {
                self.metrics.record(processing_time_ms);
                let index = self.insert(FrameCacheEntry {
                    timestamp_s: request.timestamp_s,
                    detections: analysis.detections,
                    statistics: analysis.statistics,
                    processing_time_ms,
                });
                self.cursor = Some(index);
                Completion::Applied(index)
            }
            Err(err) => Completion::Failed(err),
        }
    }

    /// Forget a request that could not be sent.
    pub fn abandon(&mut self, token: RequestToken) {
        self.in_flight.retain(|req| req.token != token);
    }

    /// Give up on every outstanding request. Late results are then stale.
    pub fn expire_in_flight(&mut self) -> usize {
        let expired = self.in_flight.len();
        self.in_flight.clear();
        expired
    }

    /// Cache entry within tolerance of `timestamp_s`, closest first.
    pub fn lookup(&self, timestamp_s: f64) -> Option<usize> {
        self.cache
            .iter()
            .enumerate()
            .filter(|(_, entry)| self.same_frame(entry.timestamp_s, timestamp_s))
            .min_by(|(_, a), (_, b)| {
                let da = (a.timestamp_s - timestamp_s).abs();
                let db = (b.timestamp_s - timestamp_s).abs();
                da.total_cmp(&db)
            })
            .map(|(index, _)| index)
    }

    pub fn entry(&self, index: usize) -> Option<&FrameCacheEntry> {
        self.cache.get(index)
    }

    pub fn entries(&self) -> &[FrameCacheEntry] {
        &self.cache
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Step back one cached frame; returns the timestamp to seek to.
    pub fn prev(&mut self) -> Option<f64> {
        let index = match self.cursor {
            Some(0) | None => return None,
            Some(index) => index - 1,
        };
        self.cursor = Some(index);
        Some(self.cache[index].timestamp_s)
    }

    /// Step forward one cached frame; returns the timestamp to seek to.
    pub fn next(&mut self) -> Option<f64> {
        let index = match self.cursor {
            None if !self.cache.is_empty() => 0,
            Some(index) if index + 1 < self.cache.len() => index + 1,
            _ => return None,
        };
        self.cursor = Some(index);
        Some(self.cache[index].timestamp_s)
    }

    pub fn metrics(&self) -> &ProcessingMetrics {
        &self.metrics
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn insert(&mut self, entry: FrameCacheEntry) -> usize {
        let index = self
            .cache
            .partition_point(|existing| existing.timestamp_s < entry.timestamp_s);
        self.cache.insert(index, entry);
        index
    }

    fn same_frame(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.tolerance_s
    }
}
