use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::sampler::RequestToken;
use crate::client::{FrameAnalysis, InferenceClient};

pub struct FrameJob {
    pub token: RequestToken,
    pub jpeg: Vec<u8>,
}

pub struct FrameResult {
    pub token: RequestToken,
    pub outcome: Result<FrameAnalysis>,
    pub processing_time_ms: u64,
}

/// Background thread that sends frames to `/process-frame` one at a time.
pub struct FrameWorker {
    jobs: Option<Sender<FrameJob>>,
    results: Receiver<FrameResult>,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl FrameWorker {
    pub fn spawn<C: InferenceClient + 'static>(client: C) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel::<FrameJob>();
        let (results_tx, results_rx) = mpsc::channel::<FrameResult>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();

        let join = std::thread::Builder::new()
            .name("frame-worker".to_string())
            .spawn(move || {
                for job in jobs_rx {
                    if shutdown_thread.load(Ordering::SeqCst) {
                        break;
                    }
                    let started = Instant::now();
                    let outcome = client.process_frame(&job.jpeg);
                    let processing_time_ms = started.elapsed().as_millis() as u64;
                    let result = FrameResult {
                        token: job.token,
                        outcome,
                        processing_time_ms,
                    };
                    if results_tx.send(result).is_err() {
                        break;
                    }
                }
                log::debug!("frame worker exiting");
            })?;

        Ok(Self {
            jobs: Some(jobs_tx),
            results: results_rx,
            shutdown,
            join: Some(join),
        })
    }

    pub fn submit(&self, job: FrameJob) -> Result<()> {
        self.jobs
            .as_ref()
            .ok_or_else(|| anyhow!("frame worker stopped"))?
            .send(job)
            .map_err(|_| anyhow!("frame worker stopped"))
    }

    pub fn try_recv(&self) -> Option<FrameResult> {
        match self.results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<FrameResult> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Stop accepting jobs and wait for the in-flight request to finish.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.jobs.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("frame worker thread panicked"))?;
        }
        Ok(())
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.jobs.take();
    }
}
