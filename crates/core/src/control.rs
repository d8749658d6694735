//! Cooperative cancellation and progress reporting for corpus-wide loops.

use crate::error::{PhonoError, Result};

const DEFAULT_PROGRESS_INTERVAL: usize = 100;

type StopCheck<'a> = Box<dyn Fn() -> bool + Send + Sync + 'a>;
type ProgressCallback<'a> = Box<dyn Fn(usize, usize) + Send + Sync + 'a>;

/// Stop predicate and progress callback polled by long-running analyses.
///
/// The stop predicate is checked once per loop iteration; the progress
/// callback receives `(done, total)` every `interval` iterations and once
/// at the end.
pub struct BatchControl<'a> {
    stop: Option<StopCheck<'a>>,
    progress: Option<ProgressCallback<'a>>,
    interval: usize,
}

impl Default for BatchControl<'_> {
    fn default() -> Self {
        Self {
            stop: None,
            progress: None,
            interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl<'a> BatchControl<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stop<F>(mut self, stop: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'a,
    {
        self.stop = Some(Box::new(stop));
        self
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'a,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn with_interval(mut self, interval: usize) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// `Err(Cancelled)` once the stop predicate fires.
    pub fn check_stop(&self) -> Result<()> {
        match &self.stop {
            Some(stop) if stop() => Err(PhonoError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Report progress if `done` falls on the interval or completes the loop.
    pub fn tick(&self, done: usize, total: usize) {
        if let Some(progress) = &self.progress {
            if done % self.interval == 0 || done == total {
                progress(done, total);
            }
        }
    }

    /// `check_stop` followed by `tick`, for the top of a loop body.
    pub fn step(&self, done: usize, total: usize) -> Result<()> {
        self.check_stop()?;
        self.tick(done, total);
        Ok(())
    }

    /// Same stop predicate, no progress reporting. Used for analyses nested
    /// inside an outer loop that reports its own progress.
    pub fn stop_only(&self) -> BatchControl<'_> {
        BatchControl {
            stop: self
                .stop
                .as_ref()
                .map(|stop| Box::new(move || stop()) as StopCheck<'_>),
            progress: None,
            interval: self.interval,
        }
    }
}
