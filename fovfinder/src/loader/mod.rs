//! Background image loading
//!
//! Survey images are fetched on a worker thread so the session stays
//! responsive. The session polls the loader on a fixed cadence; the worker
//! hands its single result back through a oneshot channel.
//!
//! # State Machine
//!
//! ```text
//! Idle ──request──▶ Requesting ──poll──▶ Polling ──poll──▶ Ready(path)
//!                                          │   ▲
//!                                          └───┘ (worker still running)
//!                                          │
//!                                          └──poll──▶ Failed(error)
//! ```
//!
//! `Ready` and `Failed` are reported once; the loader is then free for the
//! next request.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::imagery::FetchError;

/// Cadence between polls once the first check has been made.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Delay before the first poll after a request.
pub const DEFAULT_FIRST_POLL_DELAY: Duration = Duration::from_secs(1);

/// Errors from starting a load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A previous request has not been reported yet.
    #[error("an image is already being fetched")]
    AlreadyLoading,

    #[error("failed to start image fetch worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Polling cadence.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Delay before the first poll (default: 1s).
    pub first_poll_delay: Duration,
    /// Delay between subsequent polls (default: 500ms).
    pub poll_interval: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            first_poll_delay: DEFAULT_FIRST_POLL_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Loader state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No request outstanding.
    Idle,
    /// Worker started, not yet polled.
    Requesting,
    /// Polled at least once, worker still running.
    Polling,
    /// Last request produced a file.
    Ready(PathBuf),
    /// Last request failed.
    Failed(String),
}

impl LoadState {
    /// Short status for display.
    pub fn display_status(&self) -> &'static str {
        match self {
            LoadState::Idle => "Idle",
            LoadState::Requesting | LoadState::Polling => "Fetching...",
            LoadState::Ready(_) => "Ready",
            LoadState::Failed(_) => "Failed",
        }
    }
}

/// Result of a single poll.
#[derive(Debug)]
pub enum LoadPoll {
    /// Nothing was requested.
    Idle,
    /// The worker is still running.
    Pending,
    /// The worker saved an image at this path.
    Ready(PathBuf),
    /// The worker failed.
    Failed(FetchError),
}

/// One in-flight fetch.
#[derive(Debug)]
struct LoadHandle {
    receiver: oneshot::Receiver<Result<PathBuf, FetchError>>,
    started: Instant,
    polls: u32,
}

/// Runs one image fetch at a time on a worker thread.
#[derive(Debug)]
pub struct ImageLoader {
    config: LoaderConfig,
    state: LoadState,
    handle: Option<LoadHandle>,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

impl ImageLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            state: LoadState::Idle,
            handle: None,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Whether a request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.handle.is_some()
    }

    /// How long to wait before the next poll.
    pub fn next_poll_delay(&self) -> Duration {
        match self.state {
            LoadState::Requesting => self.config.first_poll_delay,
            _ => self.config.poll_interval,
        }
    }

    /// Starts `fetch` on a worker thread and returns immediately.
    ///
    /// Rejected with [`LoadError::AlreadyLoading`] while an earlier request
    /// has not been reported by [`poll`](Self::poll).
    pub fn request<F>(&mut self, fetch: F) -> Result<(), LoadError>
    where
        F: FnOnce() -> Result<PathBuf, FetchError> + Send + 'static,
    {
        if self.handle.is_some() {
            return Err(LoadError::AlreadyLoading);
        }

        let (sender, receiver) = oneshot::channel();
        thread::Builder::new()
            .name("image-fetch".to_string())
            .spawn(move || {
                let result = fetch();
                // Receiver gone means the loader was dropped; nobody to tell
                let _ = sender.send(result);
            })?;

        tracing::debug!("Starting image download");
        self.handle = Some(LoadHandle {
            receiver,
            started: Instant::now(),
            polls: 0,
        });
        self.state = LoadState::Requesting;
        Ok(())
    }

    /// Checks the worker without blocking.
    pub fn poll(&mut self) -> LoadPoll {
        let Some(handle) = self.handle.as_mut() else {
            return LoadPoll::Idle;
        };
        handle.polls += 1;

        let result = match handle.receiver.try_recv() {
            Err(TryRecvError::Empty) => {
                tracing::debug!(polls = handle.polls, "Checking if image has arrived");
                self.state = LoadState::Polling;
                return LoadPoll::Pending;
            }
            Err(TryRecvError::Closed) => Err(FetchError::WorkerLost),
            Ok(result) => result,
        };

        let elapsed_ms = handle.started.elapsed().as_millis() as u64;
        let polls = handle.polls;
        self.handle = None;

        match result {
            Ok(path) => {
                tracing::info!(path = %path.display(), elapsed_ms, polls, "Image fetch finished");
                self.state = LoadState::Ready(path.clone());
                LoadPoll::Ready(path)
            }
            Err(err) => {
                tracing::error!(error = %err, elapsed_ms, polls, "Failed to download sky image");
                self.state = LoadState::Failed(err.to_string());
                LoadPoll::Failed(err)
            }
        }
    }

    /// Blocks, polling on the configured cadence, until the request resolves.
    ///
    /// `on_wait` runs before every sleep.
    pub fn wait(&mut self, mut on_wait: impl FnMut(&LoadState)) -> LoadPoll {
        loop {
            if self.handle.is_none() {
                return LoadPoll::Idle;
            }
            on_wait(&self.state);
            thread::sleep(self.next_poll_delay());
            match self.poll() {
                LoadPoll::Pending => continue,
                done => return done,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn fast_config() -> LoaderConfig {
        LoaderConfig {
            first_poll_delay: Duration::from_millis(5),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn poll_until_done(loader: &mut ImageLoader) -> LoadPoll {
        for _ in 0..1000 {
            match loader.poll() {
                LoadPoll::Pending => thread::sleep(Duration::from_millis(2)),
                done => return done,
            }
        }
        panic!("loader never finished");
    }

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.first_poll_delay, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_idle_poll() {
        let mut loader = ImageLoader::default();
        assert!(matches!(loader.poll(), LoadPoll::Idle));
        assert_eq!(loader.state(), &LoadState::Idle);
    }

    #[test]
    fn test_states_through_success() {
        let mut loader = ImageLoader::new(fast_config());
        let (release, gate) = mpsc::channel::<()>();

        loader
            .request(move || {
                gate.recv().ok();
                Ok(PathBuf::from("/tmp/sky.fits"))
            })
            .unwrap();
        assert_eq!(loader.state(), &LoadState::Requesting);
        assert_eq!(loader.next_poll_delay(), Duration::from_millis(5));

        assert!(matches!(loader.poll(), LoadPoll::Pending));
        assert_eq!(loader.state(), &LoadState::Polling);
        assert!(matches!(loader.poll(), LoadPoll::Pending));

        release.send(()).unwrap();
        match poll_until_done(&mut loader) {
            LoadPoll::Ready(path) => assert_eq!(path, PathBuf::from("/tmp/sky.fits")),
            other => panic!("expected Ready, got {:?}", other),
        }
        assert_eq!(loader.state(), &LoadState::Ready(PathBuf::from("/tmp/sky.fits")));
        assert!(!loader.is_loading());

        // Reported once
        assert!(matches!(loader.poll(), LoadPoll::Idle));
    }

    #[test]
    fn test_failure_reported() {
        let mut loader = ImageLoader::new(fast_config());
        loader
            .request(|| Err(FetchError::Http("HTTP 503".to_string())))
            .unwrap();

        assert!(matches!(poll_until_done(&mut loader), LoadPoll::Failed(FetchError::Http(_))));
        assert!(matches!(loader.state(), LoadState::Failed(msg) if msg.contains("503")));
    }

    #[test]
    fn test_overlapping_request_rejected() {
        let mut loader = ImageLoader::new(fast_config());
        let (release, gate) = mpsc::channel::<()>();
        loader
            .request(move || {
                gate.recv().ok();
                Ok(PathBuf::from("first"))
            })
            .unwrap();

        let second = loader.request(|| Ok(PathBuf::from("second")));
        assert!(matches!(second, Err(LoadError::AlreadyLoading)));

        release.send(()).unwrap();
        assert!(matches!(poll_until_done(&mut loader), LoadPoll::Ready(p) if p == PathBuf::from("first")));

        // Free again once reported
        assert!(loader.request(|| Ok(PathBuf::from("third"))).is_ok());
    }

    #[test]
    fn test_worker_panic_is_worker_lost() {
        let mut loader = ImageLoader::new(fast_config());
        loader
            .request(|| -> Result<PathBuf, FetchError> { panic!("worker died") })
            .unwrap();

        assert!(matches!(poll_until_done(&mut loader), LoadPoll::Failed(FetchError::WorkerLost)));
    }

    #[test]
    fn test_wait_blocks_until_done() {
        let mut loader = ImageLoader::new(fast_config());
        loader.request(|| Ok(PathBuf::from("done"))).unwrap();

        let mut ticks = 0;
        let result = loader.wait(|_| ticks += 1);
        assert!(matches!(result, LoadPoll::Ready(_)));
        assert!(ticks >= 1);
    }

    #[test]
    fn test_display_status() {
        assert_eq!(LoadState::Idle.display_status(), "Idle");
        assert_eq!(LoadState::Polling.display_status(), "Fetching...");
        assert_eq!(LoadState::Failed("x".to_string()).display_status(), "Failed");
    }
}
