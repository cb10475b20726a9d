//! Micro-batch accumulator for documents awaiting indexing.
//!
//! Flushes when either the size threshold or the time window is reached,
//! whichever comes first. Generic over the buffered item so it can carry a
//! document's source offset alongside it without a second parallel buffer.

use std::time::{Duration, Instant};

pub struct MicroBatcher<T> {
    buffer: Vec<T>,
    max_size: usize,
    max_wait: Duration,
    batch_started: Option<Instant>,
}

impl<T> MicroBatcher<T> {
    pub fn new(max_size: usize, max_wait: Duration) -> Self {
        Self {
            buffer: Vec::with_capacity(max_size),
            max_size: max_size.max(1),
            max_wait,
            batch_started: None,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.batch_started.is_none() {
            self.batch_started = Some(Instant::now());
        }
        self.buffer.push(item);
    }

    pub fn should_flush(&self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        if self.buffer.len() >= self.max_size {
            return true;
        }
        self.batch_started
            .map(|started| started.elapsed() >= self.max_wait)
            .unwrap_or(false)
    }

    pub fn flush(&mut self) -> Vec<T> {
        self.batch_started = None;
        std::mem::take(&mut self.buffer)
    }

    pub fn try_flush(&mut self) -> Option<Vec<T>> {
        self.should_flush().then(|| self.flush())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
