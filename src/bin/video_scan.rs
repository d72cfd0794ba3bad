//! video_scan - Run weed detection over a video.
//!
//! Frames are sampled during playback and sent to `/process-frame`. Results
//! are cached by timestamp, so seeking back to an analyzed moment replays the
//! cached detections instead of calling the service again. After playback the
//! cached frames can be stepped through with `p` / `n`.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use paddy_scout::report;
use paddy_scout::video::{open_source, FrameWorker, Pacing, SessionEvent, VideoSession};
use paddy_scout::{AppConfig, HttpInferenceClient};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "video_scan",
    about = "Detect paddy and weeds in a video, caching results per frame"
)]
struct Args {
    /// MJPEG video file, or stub://<name> for a generated clip
    #[arg(value_name = "VIDEO")]
    video: String,

    /// Detection service base URL (overrides config)
    #[arg(long, value_name = "URL")]
    service_url: Option<String>,

    /// Playback frame rate for the video file
    #[arg(long)]
    fps: Option<u32>,

    /// Analyze every frame instead of playing in real time
    #[arg(long)]
    every_frame: bool,

    /// Step through analyzed frames after playback (p = previous, n = next,
    /// s = save overlay, q = quit)
    #[arg(long)]
    review: bool,

    /// Directory for overlays saved during review
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(&args.ui, is_tty, stdout_is_tty);

    let mut cfg = AppConfig::load()?;
    if let Some(url) = args.service_url {
        cfg.service_url = url;
    }
    if let Some(fps) = args.fps {
        cfg.video.fps = fps;
    }

    let source = {
        let _stage = ui.stage("Open video");
        open_source(&args.video, cfg.video.fps)?
    };
    println!(
        "video_scan: {} ({} frames, {:.1}s, {}x{})",
        source.name(),
        source.frame_count(),
        source.duration_secs(),
        source.dimensions().0,
        source.dimensions().1
    );

    let client = HttpInferenceClient::from_config(&cfg)?;
    let worker = FrameWorker::spawn(client)?;
    let mut session = VideoSession::new(
        source,
        worker,
        cfg.video.max_in_flight,
        cfg.request_timeout,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let pacing = if args.every_frame {
        Pacing::Lockstep
    } else {
        Pacing::RealTime
    };
    let progress = ui.frames(session.source().frame_count() as u64);
    let summary = {
        let mut lines = Vec::new();
        let summary = session.run_playback(pacing, &stop, |event| match event {
            SessionEvent::Dispatched { timestamp_s } => {
                progress.advance(&format!("sent {:.2}s", timestamp_s))
            }
            SessionEvent::Dropped { .. } => progress.advance("busy"),
            SessionEvent::Displayed {
                index,
                from_cache: false,
                ..
            } => lines.push(*index),
            SessionEvent::Displayed { .. } => progress.advance("cached"),
            SessionEvent::Failed { message } => progress.println(&format!("error: {}", message)),
        });
        progress.finish();
        for index in lines {
            if let Some(entry) = session.sampler().entry(index) {
                println!(
                    "{}",
                    report::frame_summary(entry, session.sampler().metrics())
                );
            }
        }
        summary
    };

    println!();
    println!(
        "frames: {} seen, {} analyzed, {} cached, {} skipped, {} failed{}",
        summary.frames_seen,
        summary.dispatched,
        summary.cache_hits,
        summary.dropped,
        summary.failed,
        if summary.interrupted {
            " (interrupted)"
        } else {
            ""
        }
    );

    if args.review && !session.sampler().entries().is_empty() {
        review(&mut session, &args.out_dir)?;
    }

    session.close()
}

fn review(session: &mut VideoSession, out_dir: &std::path::Path) -> Result<()> {
    println!("review: p = previous, n = next, s = save overlay, q = quit");
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let moved = match line?.trim() {
            "p" => session.prev(),
            "n" => session.next(),
            "s" => {
                save_overlay(session, out_dir)?;
                continue;
            }
            "q" => break,
            other => {
                println!("unknown command {:?}", other);
                continue;
            }
        };
        match (moved, session.current()) {
            (Some(_), Some(entry)) => {
                println!(
                    "{}",
                    report::frame_summary(entry, session.sampler().metrics())
                );
            }
            _ => println!("no more analyzed frames in that direction"),
        }
    }
    Ok(())
}

fn save_overlay(session: &mut VideoSession, out_dir: &std::path::Path) -> Result<()> {
    let Some(timestamp_s) = session.current().map(|entry| entry.timestamp_s) else {
        println!("no frame selected");
        return Ok(());
    };
    let Some(frame) = session.overlay()? else {
        return Ok(());
    };
    let path = out_dir.join(format!("frame_{:08.3}.png", timestamp_s));
    frame.save(&path)?;
    println!("overlay written to {}", path.display());
    Ok(())
}
