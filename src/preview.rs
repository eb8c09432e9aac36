//! Live preview: pumps frames from a [`VideoStream`] on a worker thread and keeps an overlay
//! with the stream's resolution and measured frame rate.

use std::{
    fmt,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam::channel::{bounded, Sender, TryRecvError};

use crate::media::VideoStream;

const FPS_WINDOW: Duration = Duration::from_millis(1000);

/// Counts frames and recomputes the rate once a window of at least one second has passed.
#[derive(Debug, Clone)]
pub struct FrameRateMeter {
    frames: u32,
    window_start: Instant,
    fps: Option<f64>,
}

impl FrameRateMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            window_start: now,
            fps: None,
        }
    }

    /// Records a frame. Returns the new estimate when the window was recomputed.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < FPS_WINDOW {
            return None;
        }

        let fps = f64::from(self.frames) * 1000.0 / elapsed.as_millis() as f64;
        self.frames = 0;
        self.window_start = now;
        self.fps = Some(fps);
        Some(fps)
    }

    /// The last estimate, `None` until a full window has passed.
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }
}

/// What the preview shows on top of the video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub frames: u64,
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)?;
        match self.fps {
            Some(fps) => write!(f, " @ {:.1} fps", fps),
            None => f.write_str(" @ -- fps"),
        }
    }
}

/// A running preview. Dropping it stops the stream.
pub struct Preview {
    stop_sender: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    overlay: Arc<Mutex<Overlay>>,
    /// Why the frame pump stopped on its own.
    failure: Arc<Mutex<Option<String>>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Preview {
    /// Starts pumping frames from `stream` on a new thread.
    pub fn start(mut stream: Box<dyn VideoStream>) -> Self {
        let (width, height) = stream.resolution();
        let overlay = Arc::new(Mutex::new(Overlay {
            width,
            height,
            fps: None,
            frames: 0,
        }));
        let failure = Arc::new(Mutex::new(None));
        let (tx, rx) = bounded(1);

        let shared = overlay.clone();
        let failed = failure.clone();
        let worker = thread::spawn(move || {
            let mut meter = FrameRateMeter::new(Instant::now());
            loop {
                match rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                if let Err(e) = stream.next_frame() {
                    log::error!("preview stream failed: {}", e);
                    *lock(&failed) = Some(e.to_string());
                    break;
                }

                let fps = meter.tick(Instant::now());
                let mut overlay = lock(&shared);
                overlay.frames += 1;
                if let Some(fps) = fps {
                    overlay.fps = Some(fps);
                    log::debug!("preview: {}", *overlay);
                }
            }
            log::debug!("preview thread exit...");
        });

        Self {
            stop_sender: Some(tx),
            worker: Some(worker),
            overlay,
            failure,
        }
    }

    pub fn overlay(&self) -> Overlay {
        *lock(&self.overlay)
    }

    /// The stream error that ended the preview, if it ended that way.
    pub fn failure(&self) -> Option<String> {
        lock(&self.failure).clone()
    }

    /// Whether the frame pump is still running.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, |w| !w.is_finished())
    }

    /// Stops the stream and waits for the worker to release it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_sender.take() {
            // the worker may already be gone
            let _ = tx.try_send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("preview thread panicked");
            }
        }
    }
}

impl Drop for Preview {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preview")
            .field("overlay", &self.overlay())
            .finish()
    }
}
